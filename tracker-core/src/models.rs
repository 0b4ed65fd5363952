use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Declares a closed set of snake_case values stored as TEXT and exchanged
/// as JSON strings.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[derive(Serialize, Deserialize, sqlx::Type)]
        #[serde(rename_all = "snake_case")]
        #[sqlx(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "invalid value '{}', expected one of: {}",
                        other,
                        [$($text),+].join(", ")
                    )),
                }
            }
        }
    };
}

text_enum! {
    pub enum TaskStatus {
        #[default]
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
    }
}

text_enum! {
    pub enum Priority {
        Low => "low",
        #[default]
        Medium => "medium",
        High => "high",
    }
}

text_enum! {
    pub enum ExpenseStatus {
        #[default]
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    /// Set exactly while `status` is `completed`.
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Expense {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub amount: f64,
    pub category: String,
    pub status: ExpenseStatus,
    pub expense_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_new_record_state() {
        assert_eq!(TaskStatus::default(), TaskStatus::Pending);
        assert_eq!(Priority::default(), Priority::Medium);
        assert_eq!(ExpenseStatus::default(), ExpenseStatus::Pending);
    }

    #[test]
    fn parses_snake_case_values() {
        assert_eq!("in_progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
        assert_eq!("high".parse::<Priority>(), Ok(Priority::High));
        assert_eq!("rejected".parse::<ExpenseStatus>(), Ok(ExpenseStatus::Rejected));
    }

    #[test]
    fn rejects_unknown_values_with_choices() {
        let err = "done".parse::<TaskStatus>().unwrap_err();
        assert_eq!(
            err,
            "invalid value 'done', expected one of: pending, in_progress, completed"
        );
        assert!("InProgress".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn serde_uses_same_text_as_storage() {
        for status in TaskStatus::ALL {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::Value::String(status.as_str().to_string()));
        }
        let priority: Priority = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(priority, Priority::Low);
    }
}
