//! Attempt grading.
//!
//! Objective questions are graded exactly. Essays use a keyword coverage and
//! word overlap heuristic against the model answer, which is meant as a first
//! pass a reviewer can override, not as a final judgement.

use crate::db::models::{AnswerParams, QuestionType, QuestionWithOptions};
use crate::services::misc::{normalize_text, round2};
use crate::Result;
use std::collections::HashSet;

/// Weight of keyword coverage in the essay score, the rest goes to overlap
const KEYWORD_WEIGHT: f64 = 0.6;
const SIMILARITY_WEIGHT: f64 = 0.4;
/// Share of the raw essay score needed to count the answer as correct
const ESSAY_PASS_THRESHOLD: f64 = 0.5;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "for", "from", "has",
    "have", "in", "into", "is", "it", "its", "of", "on", "or", "so", "such", "that", "the",
    "their", "then", "there", "these", "they", "this", "to", "was", "were", "which", "while",
    "will", "with",
];

/// Result of grading a single response
#[derive(Debug, Clone, PartialEq)]
pub struct GradeOutcome {
    pub marks_awarded: f64,
    pub is_correct: Option<bool>,
    pub feedback: Option<String>,
}

impl GradeOutcome {
    fn unanswered() -> Self {
        GradeOutcome {
            marks_awarded: 0.0,
            is_correct: Some(false),
            feedback: Some("Not answered".to_string()),
        }
    }
}

/// Totals of a graded attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttemptScore {
    pub score: f64,
    pub percentage: f64,
    pub passed: bool,
}

pub fn grade_question(
    question: &QuestionWithOptions,
    answer: Option<&AnswerParams>,
) -> Result<GradeOutcome> {
    let answer = match answer {
        Some(a) if !is_blank(a) => a,
        _ => return Ok(GradeOutcome::unanswered()),
    };
    let marks = question.question.marks as f64;

    let outcome = match question.question.kind()? {
        QuestionType::SingleChoice | QuestionType::TrueFalse => {
            let (hits, wrong, correct) = compare_selection(question, &answer.selected_option_ids);
            let is_correct = hits == correct && wrong == 0 && correct == 1;
            GradeOutcome {
                marks_awarded: if is_correct { marks } else { 0.0 },
                is_correct: Some(is_correct),
                feedback: None,
            }
        }
        QuestionType::MultipleChoice => {
            let (hits, wrong, correct) = compare_selection(question, &answer.selected_option_ids);
            let is_correct = hits == correct && wrong == 0;
            let fraction = if correct == 0 {
                0.0
            } else {
                ((hits as f64 - wrong as f64) / correct as f64).max(0.0)
            };
            GradeOutcome {
                marks_awarded: round2(marks * fraction),
                is_correct: Some(is_correct),
                feedback: None,
            }
        }
        QuestionType::ShortAnswer => {
            let given = normalize_text(answer.answer_text.as_deref().unwrap_or_default());
            let expected = normalize_text(question.question.model_answer.as_deref().unwrap_or_default());
            let is_correct = !expected.is_empty() && given == expected;
            GradeOutcome {
                marks_awarded: if is_correct { marks } else { 0.0 },
                is_correct: Some(is_correct),
                feedback: None,
            }
        }
        QuestionType::Essay => grade_essay(
            answer.answer_text.as_deref().unwrap_or_default(),
            question.question.model_answer.as_deref(),
            &question.question.keywords,
            question.question.min_words,
            marks,
        ),
    };

    Ok(outcome)
}

fn is_blank(answer: &AnswerParams) -> bool {
    answer.selected_option_ids.is_empty()
        && answer
            .answer_text
            .as_deref()
            .map_or(true, |t| t.trim().is_empty())
}

/// Returns (selected correct options, selected wrong or unknown options, correct options)
fn compare_selection(question: &QuestionWithOptions, selected: &[String]) -> (usize, usize, usize) {
    let correct: HashSet<&str> = question
        .options
        .iter()
        .filter(|o| o.is_correct)
        .map(|o| o.id.as_str())
        .collect();
    let selected: HashSet<&str> = selected.iter().map(String::as_str).collect();

    let hits = selected.intersection(&correct).count();
    let wrong = selected.len() - hits;
    (hits, wrong, correct.len())
}

pub fn grade_essay(
    answer: &str,
    model_answer: Option<&str>,
    keywords: &[String],
    min_words: Option<i32>,
    marks: f64,
) -> GradeOutcome {
    let answer_words = tokenize(answer);
    if answer_words.is_empty() {
        return GradeOutcome::unanswered();
    }

    let keywords: Vec<&String> = keywords.iter().filter(|k| !k.trim().is_empty()).collect();
    let missing: Vec<&str> = keywords
        .iter()
        .filter(|k| !contains_phrase(&answer_words, k))
        .map(|k| k.trim())
        .collect();
    let coverage = if keywords.is_empty() {
        None
    } else {
        Some((keywords.len() - missing.len()) as f64 / keywords.len() as f64)
    };

    let similarity = model_answer
        .map(tokenize)
        .filter(|words| !words.is_empty())
        .map(|model_words| jaccard(&content_words(&answer_words), &content_words(&model_words)));

    let mut raw = match (coverage, similarity) {
        (Some(c), Some(s)) => KEYWORD_WEIGHT * c + SIMILARITY_WEIGHT * s,
        (Some(c), None) => c,
        (None, Some(s)) => s,
        (None, None) => 0.0,
    };

    if let Some(min) = min_words.filter(|m| *m > 0) {
        let count = answer_words.len() as f64;
        if count < min as f64 {
            raw *= count / min as f64;
        }
    }

    // Epsilon keeps 5.9999.. from dropping half a mark
    let awarded = (raw * marks * 2.0 + 1e-9).floor() / 2.0;
    let feedback = if missing.is_empty() {
        "Covers all expected keywords".to_string()
    } else {
        format!("Missing keywords: {}", missing.join(", "))
    };

    GradeOutcome {
        marks_awarded: awarded.clamp(0.0, marks),
        is_correct: Some(raw >= ESSAY_PASS_THRESHOLD),
        feedback: Some(feedback),
    }
}

pub fn summarize(awarded: &[f64], total_marks: i32, passing_marks: i32) -> AttemptScore {
    let score = round2(awarded.iter().sum());
    let percentage = if total_marks > 0 {
        round2(score / total_marks as f64 * 100.0)
    } else {
        0.0
    };
    AttemptScore {
        score,
        percentage,
        passed: score >= passing_marks as f64,
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn content_words(words: &[String]) -> HashSet<&str> {
    words
        .iter()
        .map(String::as_str)
        .filter(|w| !STOP_WORDS.contains(w))
        .collect()
}

fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Matches a keyword or phrase against the answer, allowing plural endings
fn contains_phrase(words: &[String], phrase: &str) -> bool {
    let phrase = tokenize(phrase);
    if phrase.is_empty() || phrase.len() > words.len() {
        return false;
    }
    words.windows(phrase.len()).any(|window| {
        window
            .iter()
            .zip(&phrase)
            .all(|(word, expected)| word_matches(word, expected))
    })
}

fn word_matches(word: &str, expected: &str) -> bool {
    word == expected
        || word
            .strip_prefix(expected)
            .is_some_and(|suffix| suffix == "s" || suffix == "es")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Question, QuestionOption};

    fn question(kind: QuestionType, marks: i32, options: &[(&str, bool)]) -> QuestionWithOptions {
        let ts = chrono::Utc::now().naive_utc();
        QuestionWithOptions {
            question: Question {
                id: "q1".into(),
                exam_id: "e1".into(),
                question_type: kind.into(),
                text: "Question".into(),
                marks,
                difficulty: "medium".into(),
                model_answer: None,
                keywords: vec![],
                min_words: None,
                position: 1,
                created_at: ts,
                updated_at: ts,
            },
            options: options
                .iter()
                .enumerate()
                .map(|(i, (id, correct))| QuestionOption {
                    id: id.to_string(),
                    question_id: "q1".into(),
                    text: format!("Option {id}"),
                    is_correct: *correct,
                    position: i as i32 + 1,
                })
                .collect(),
        }
    }

    fn pick(ids: &[&str]) -> AnswerParams {
        AnswerParams {
            selected_option_ids: ids.iter().map(|s| s.to_string()).collect(),
            answer_text: None,
        }
    }

    fn text(answer: &str) -> AnswerParams {
        AnswerParams {
            selected_option_ids: vec![],
            answer_text: Some(answer.to_string()),
        }
    }

    #[test]
    fn test_single_choice() {
        let q = question(QuestionType::SingleChoice, 4, &[("a", false), ("b", true), ("c", false)]);

        let right = grade_question(&q, Some(&pick(&["b"]))).unwrap();
        assert_eq!(right.marks_awarded, 4.0);
        assert_eq!(right.is_correct, Some(true));

        let wrong = grade_question(&q, Some(&pick(&["a"]))).unwrap();
        assert_eq!(wrong.marks_awarded, 0.0);
        assert_eq!(wrong.is_correct, Some(false));

        // Selecting every option is not a correct answer
        let all = grade_question(&q, Some(&pick(&["a", "b", "c"]))).unwrap();
        assert_eq!(all.marks_awarded, 0.0);
    }

    #[test]
    fn test_unanswered_scores_zero() {
        let q = question(QuestionType::TrueFalse, 2, &[("t", true), ("f", false)]);
        let none = grade_question(&q, None).unwrap();
        assert_eq!(none, GradeOutcome::unanswered());

        let blank = grade_question(&q, Some(&text("   "))).unwrap();
        assert_eq!(blank.marks_awarded, 0.0);
    }

    #[test]
    fn test_multiple_choice_partial_credit() {
        let q = question(
            QuestionType::MultipleChoice,
            6,
            &[("a", true), ("b", true), ("c", true), ("d", false)],
        );

        let exact = grade_question(&q, Some(&pick(&["a", "b", "c"]))).unwrap();
        assert_eq!(exact.marks_awarded, 6.0);
        assert_eq!(exact.is_correct, Some(true));

        let two_of_three = grade_question(&q, Some(&pick(&["a", "b"]))).unwrap();
        assert_eq!(two_of_three.marks_awarded, 4.0);
        assert_eq!(two_of_three.is_correct, Some(false));

        // two hits and one wrong pick leave a third of the marks
        let with_wrong = grade_question(&q, Some(&pick(&["a", "b", "d"]))).unwrap();
        assert_eq!(with_wrong.marks_awarded, 2.0);

        let only_wrong = grade_question(&q, Some(&pick(&["d"]))).unwrap();
        assert_eq!(only_wrong.marks_awarded, 0.0);
    }

    #[test]
    fn test_short_answer_is_normalized() {
        let mut q = question(QuestionType::ShortAnswer, 3, &[]);
        q.question.model_answer = Some("Alan  Turing".into());

        let right = grade_question(&q, Some(&text("  alan turing "))).unwrap();
        assert_eq!(right.marks_awarded, 3.0);

        let wrong = grade_question(&q, Some(&text("Ada Lovelace"))).unwrap();
        assert_eq!(wrong.marks_awarded, 0.0);
    }

    #[test]
    fn test_essay_full_keyword_coverage() {
        let keywords = vec!["ownership".to_string(), "borrow checker".to_string()];
        let outcome = grade_essay(
            "Rust relies on ownership rules and the borrow checker to prevent data races.",
            None,
            &keywords,
            None,
            10.0,
        );
        assert_eq!(outcome.marks_awarded, 10.0);
        assert_eq!(outcome.is_correct, Some(true));
        assert_eq!(outcome.feedback.as_deref(), Some("Covers all expected keywords"));
    }

    #[test]
    fn test_essay_reports_missing_keywords() {
        let keywords = vec!["mitochondria".to_string(), "ATP".to_string(), "glucose".to_string()];
        let outcome = grade_essay("Mitochondria produce energy from glucose.", None, &keywords, None, 9.0);
        // two of three keywords: 6 marks
        assert_eq!(outcome.marks_awarded, 6.0);
        assert_eq!(outcome.is_correct, Some(true));
        assert_eq!(outcome.feedback.as_deref(), Some("Missing keywords: ATP"));
    }

    #[test]
    fn test_essay_plural_keyword_matches() {
        let keywords = vec!["process".to_string(), "thread".to_string()];
        let outcome = grade_essay("Processes may own several threads.", None, &keywords, None, 4.0);
        assert_eq!(outcome.marks_awarded, 4.0);
    }

    #[test]
    fn test_essay_similarity_to_model_answer() {
        let model = "Photosynthesis converts light energy into chemical energy stored in glucose";
        let same = grade_essay(model, Some(model), &[], None, 5.0);
        assert_eq!(same.marks_awarded, 5.0);

        let unrelated = grade_essay("The stock market closed higher today", Some(model), &[], None, 5.0);
        assert_eq!(unrelated.marks_awarded, 0.0);
        assert_eq!(unrelated.is_correct, Some(false));
    }

    #[test]
    fn test_essay_short_answers_are_scaled_down() {
        let keywords = vec!["ownership".to_string()];
        let outcome = grade_essay("ownership matters", None, &keywords, Some(8), 10.0);
        // two words out of eight required: a quarter of the marks, rounded down to 0.5
        assert_eq!(outcome.marks_awarded, 2.5);
        assert_eq!(outcome.is_correct, Some(false));
    }

    #[test]
    fn test_essay_blends_keywords_and_similarity() {
        let keywords = vec!["ownership".to_string(), "borrowing".to_string()];
        let model = "ownership moves values between owners";
        let outcome = grade_essay("Ownership moves values", Some(model), &keywords, None, 10.0);
        // coverage 1/2, similarity 3/5: 0.6 * 0.5 + 0.4 * 0.6 = 0.54 -> 5.4 marks, floored to 5.0
        assert_eq!(outcome.marks_awarded, 5.0);
        assert_eq!(outcome.is_correct, Some(true));
        assert_eq!(outcome.feedback.as_deref(), Some("Missing keywords: borrowing"));

        // same answer below the length target: 0.54 * 3/6 = 0.27 -> 2.7 marks, floored to 2.5
        let short = grade_essay("Ownership moves values", Some(model), &keywords, Some(6), 10.0);
        assert_eq!(short.marks_awarded, 2.5);
        assert_eq!(short.is_correct, Some(false));
    }

    #[test]
    fn test_summarize() {
        let score = summarize(&[4.0, 2.5, 0.0], 10, 6);
        assert_eq!(score.score, 6.5);
        assert_eq!(score.percentage, 65.0);
        assert!(score.passed);

        let score = summarize(&[1.0], 3, 2);
        assert_eq!(score.percentage, 33.33);
        assert!(!score.passed);
    }
}
