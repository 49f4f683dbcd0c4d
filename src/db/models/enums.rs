//! Status, role and type codes stored as short `varchar` columns.
//!
//! Every enum converts to and from its database code. Unknown codes are
//! reported as [`ApiError::Custom`] instead of panicking, since they can only
//! come from a corrupted row.

use crate::errors::ApiError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

macro_rules! db_codes {
    ($name:ident { $($variant:ident => $code:literal),* $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $code,)*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ApiError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($code => Ok($name::$variant),)*
                    other => Err(ApiError::Custom(format!(
                        "Invalid {} code: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

db_codes!(Role {
    Student => "student",
    Instructor => "instructor",
    Admin => "admin",
});

/// Actions guarded by role checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ManageUsers,
    ManageCategories,
    ManageExams,
    ViewExamAnswers,
    ViewAllBookings,
    ViewAllPayments,
    RefundPayments,
    ViewAnalytics,
    ViewPlatformAnalytics,
    TakeExams,
}

impl Role {
    pub fn has_permission(&self, permission: Permission) -> bool {
        use Permission::*;
        match self {
            Role::Admin => true,
            Role::Instructor => matches!(
                permission,
                ManageExams | ViewExamAnswers | ViewAnalytics | TakeExams
            ),
            Role::Student => matches!(permission, TakeExams),
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Instructor | Role::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    Expired,
}

db_codes!(BookingStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
    Completed => "completed",
    Expired => "expired",
});

impl BookingStatus {
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Pending, Expired)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
        )
    }

    /// Pending and confirmed bookings block a second booking of the same exam
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

db_codes!(PaymentStatus {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
    Refunded => "refunded",
});

impl PaymentStatus {
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Completed) | (Pending, Failed) | (Completed, Refunded)
        )
    }

    /// Pending and completed payments block another payment for the booking
    pub fn is_active(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Completed)
    }

    /// Only settled payments can be billed
    pub fn is_billable(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Refunded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    Wallet,
}

db_codes!(PaymentMethod {
    Card => "card",
    BankTransfer => "bank_transfer",
    Wallet => "wallet",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    TimedOut,
}

db_codes!(AttemptStatus {
    InProgress => "in_progress",
    Submitted => "submitted",
    TimedOut => "timed_out",
});

impl AttemptStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    Essay,
}

db_codes!(QuestionType {
    SingleChoice => "single_choice",
    MultipleChoice => "multiple_choice",
    TrueFalse => "true_false",
    ShortAnswer => "short_answer",
    Essay => "essay",
});

impl QuestionType {
    pub fn has_options(&self) -> bool {
        matches!(
            self,
            QuestionType::SingleChoice | QuestionType::MultipleChoice | QuestionType::TrueFalse
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

db_codes!(Difficulty {
    Easy => "easy",
    Medium => "medium",
    Hard => "hard",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_serde_names() {
        for status in BookingStatus::ALL {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.as_str());
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), *status);
        }
        for kind in QuestionType::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
        assert_eq!(String::from(PaymentMethod::BankTransfer), "bank_transfer");
        assert_eq!(AttemptStatus::TimedOut.to_string(), "timed_out");
    }

    #[test]
    fn test_unknown_code_is_an_error() {
        assert!("superuser".parse::<Role>().is_err());
        assert!("".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_role_permissions() {
        assert!(Role::Admin.has_permission(Permission::ManageUsers));
        assert!(Role::Admin.has_permission(Permission::ViewPlatformAnalytics));

        assert!(Role::Instructor.has_permission(Permission::ManageExams));
        assert!(Role::Instructor.has_permission(Permission::ViewAnalytics));
        assert!(!Role::Instructor.has_permission(Permission::ManageUsers));
        assert!(!Role::Instructor.has_permission(Permission::ManageCategories));
        assert!(!Role::Instructor.has_permission(Permission::RefundPayments));
        assert!(!Role::Instructor.has_permission(Permission::ViewPlatformAnalytics));

        assert!(Role::Student.has_permission(Permission::TakeExams));
        assert!(!Role::Student.has_permission(Permission::ManageExams));
        assert!(!Role::Student.has_permission(Permission::ViewExamAnswers));
        assert!(!Role::Student.has_permission(Permission::ViewAllBookings));
    }

    #[test]
    fn test_booking_transitions() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Pending.can_transition_to(Expired));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Confirmed.can_transition_to(Expired));
        for terminal in [Cancelled, Completed, Expired] {
            assert!(!terminal.is_active());
            for next in BookingStatus::ALL {
                assert!(!terminal.can_transition_to(*next));
            }
        }
    }

    #[test]
    fn test_payment_transitions() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Failed));
        assert!(Completed.can_transition_to(Refunded));

        assert!(!Pending.can_transition_to(Refunded));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Refunded.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Failed));

        assert!(Completed.is_billable());
        assert!(Refunded.is_billable());
        assert!(!Pending.is_billable());
    }
}
