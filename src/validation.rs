use crate::db::models::{ExamParams, QuestionParams, QuestionType};
use chrono::{Duration, NaiveDateTime};

/// Latest date a booking may be scheduled for, counted from now
pub const MAX_BOOKING_DAYS_AHEAD: i64 = 365;

/// Validates password strength: at least one letter and one digit
pub fn validate_password_strength(value: &str) -> Result<(), String> {
    if !value.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain at least one letter".to_string());
    }
    if !value.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit".to_string());
    }
    Ok(())
}

/// Validates phone numbers: 7 to 20 digits with an optional leading `+`
pub fn validate_phone(value: &str) -> Result<(), String> {
    let digits = value.strip_prefix('+').unwrap_or(value);
    if digits.len() < 7 || digits.len() > 20 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err("Phone must be 7 to 20 digits with an optional leading +".to_string());
    }
    Ok(())
}

/// Validates ISO-4217 style currency codes
pub fn validate_currency(value: &str) -> Result<(), String> {
    if value.len() != 3 || !value.chars().all(|c| c.is_ascii_uppercase()) {
        return Err("Currency must be a 3-letter upper-case code".to_string());
    }
    Ok(())
}

/// Cross-field checks the derive validators cannot express
pub fn validate_exam(params: &ExamParams) -> Result<(), String> {
    if params.passing_marks > params.total_marks {
        return Err("passing_marks cannot exceed total_marks".to_string());
    }
    if let Some(currency) = &params.currency {
        validate_currency(currency)?;
    }
    Ok(())
}

/// Validates the option and answer-key layout of a question for its type
pub fn validate_question(params: &QuestionParams) -> Result<(), String> {
    let correct = params.options.iter().filter(|o| o.is_correct).count();

    match params.question_type {
        QuestionType::SingleChoice | QuestionType::MultipleChoice | QuestionType::TrueFalse => {
            if params.options.len() < 2 {
                return Err("Choice questions need at least two options".to_string());
            }
            if params.options.len() > 10 {
                return Err("Choice questions can have at most ten options".to_string());
            }
            match params.question_type {
                QuestionType::TrueFalse if params.options.len() != 2 => {
                    return Err("True/false questions need exactly two options".to_string());
                }
                QuestionType::SingleChoice | QuestionType::TrueFalse if correct != 1 => {
                    return Err("Exactly one option must be marked correct".to_string());
                }
                QuestionType::MultipleChoice if correct == 0 => {
                    return Err("At least one option must be marked correct".to_string());
                }
                _ => {}
            }
        }
        QuestionType::ShortAnswer => {
            if !params.options.is_empty() {
                return Err("Text questions cannot have options".to_string());
            }
            if params.model_answer.as_deref().map_or(true, |a| a.trim().is_empty()) {
                return Err("Short answer questions need a model_answer".to_string());
            }
        }
        QuestionType::Essay => {
            if !params.options.is_empty() {
                return Err("Text questions cannot have options".to_string());
            }
            let has_model = params
                .model_answer
                .as_deref()
                .is_some_and(|a| !a.trim().is_empty());
            let has_keywords = params.keywords.iter().any(|k| !k.trim().is_empty());
            if !has_model && !has_keywords {
                return Err("Essay questions need a model_answer or keywords".to_string());
            }
        }
    }
    Ok(())
}

/// A booking must start at least a minute from now and within a year
pub fn validate_schedule(scheduled_at: NaiveDateTime, now: NaiveDateTime) -> Result<(), String> {
    if scheduled_at < now + Duration::minutes(1) {
        return Err("scheduled_at must be in the future".to_string());
    }
    if scheduled_at > now + Duration::days(MAX_BOOKING_DAYS_AHEAD) {
        return Err(format!(
            "scheduled_at must be within {MAX_BOOKING_DAYS_AHEAD} days"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::OptionParams;

    fn options(flags: &[bool]) -> Vec<OptionParams> {
        flags
            .iter()
            .enumerate()
            .map(|(i, c)| OptionParams {
                text: format!("Option {i}"),
                is_correct: *c,
            })
            .collect()
    }

    fn question(kind: QuestionType, opts: Vec<OptionParams>) -> QuestionParams {
        QuestionParams {
            question_type: kind,
            text: "What?".to_string(),
            marks: 2,
            difficulty: None,
            model_answer: None,
            keywords: vec![],
            min_words: None,
            position: None,
            options: opts,
        }
    }

    #[test]
    fn test_validate_password_strength() {
        assert_eq!(validate_password_strength("abcdefg1"), Ok(()));
        assert_eq!(
            validate_password_strength("12345678"),
            Err("Password must contain at least one letter".to_string())
        );
        assert_eq!(
            validate_password_strength("abcdefgh"),
            Err("Password must contain at least one digit".to_string())
        );
    }

    #[test]
    fn test_validate_phone() {
        assert_eq!(validate_phone("+4915112345678"), Ok(()));
        assert_eq!(validate_phone("5551234"), Ok(()));
        assert!(validate_phone("555-1234").is_err());
        assert!(validate_phone("+12").is_err());
    }

    #[test]
    fn test_validate_currency() {
        assert_eq!(validate_currency("USD"), Ok(()));
        assert!(validate_currency("usd").is_err());
        assert!(validate_currency("EURO").is_err());
    }

    #[test]
    fn test_validate_exam_marks() {
        let mut params = ExamParams {
            category_id: "c1".into(),
            title: "Rust basics".into(),
            description: None,
            duration_minutes: 60,
            total_marks: 50,
            passing_marks: 30,
            price_cents: 0,
            currency: Some("USD".into()),
            max_attempts: 1,
        };
        assert_eq!(validate_exam(&params), Ok(()));

        params.passing_marks = 60;
        assert_eq!(
            validate_exam(&params),
            Err("passing_marks cannot exceed total_marks".to_string())
        );
    }

    #[test]
    fn test_validate_choice_questions() {
        assert_eq!(
            validate_question(&question(QuestionType::SingleChoice, options(&[true, false]))),
            Ok(())
        );
        assert!(validate_question(&question(QuestionType::SingleChoice, options(&[true]))).is_err());
        assert!(
            validate_question(&question(QuestionType::SingleChoice, options(&[true, true]))).is_err()
        );
        assert!(validate_question(&question(
            QuestionType::TrueFalse,
            options(&[true, false, false])
        ))
        .is_err());
        assert_eq!(
            validate_question(&question(
                QuestionType::MultipleChoice,
                options(&[true, true, false])
            )),
            Ok(())
        );
        assert!(validate_question(&question(
            QuestionType::MultipleChoice,
            options(&[false, false])
        ))
        .is_err());
    }

    #[test]
    fn test_validate_text_questions() {
        let mut q = question(QuestionType::ShortAnswer, vec![]);
        assert!(validate_question(&q).is_err());
        q.model_answer = Some("42".into());
        assert_eq!(validate_question(&q), Ok(()));

        let mut essay = question(QuestionType::Essay, vec![]);
        assert!(validate_question(&essay).is_err());
        essay.keywords = vec!["ownership".into()];
        assert_eq!(validate_question(&essay), Ok(()));

        essay.options = options(&[true, false]);
        assert_eq!(
            validate_question(&essay),
            Err("Text questions cannot have options".to_string())
        );
    }

    #[test]
    fn test_validate_schedule() {
        let now = chrono::Utc::now().naive_utc();
        assert_eq!(validate_schedule(now + Duration::days(2), now), Ok(()));
        assert!(validate_schedule(now - Duration::hours(1), now).is_err());
        assert!(validate_schedule(now + Duration::seconds(10), now).is_err());
        assert!(validate_schedule(now + Duration::days(400), now).is_err());
    }
}
