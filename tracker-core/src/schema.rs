//! Inbound payloads and their validation.
//!
//! Payloads deserialize leniently and are then checked with `validated`,
//! which trims text fields and reports every bad field at once.

use std::fmt::Display;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use crate::error::{StoreError, StoreResult, ValidationErrors};
use crate::models::{ExpenseStatus, Priority, TaskStatus};

pub const TITLE_MAX_LEN: usize = 200;
pub const DESCRIPTION_MAX_LEN: usize = 5000;
pub const CATEGORY_MAX_LEN: usize = 50;
/// Largest accepted expense amount. Keeps per-category sums well inside f64.
pub const AMOUNT_MAX: f64 = 1_000_000_000.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
}

impl NewTask {
    pub fn validated(self) -> StoreResult<Self> {
        let mut errors = ValidationErrors::new();
        let title = check_title(&mut errors, "title", &self.title);
        let description = check_description(&mut errors, &self.description);
        errors.into_result()?;

        Ok(NewTask {
            title,
            description,
            priority: self.priority,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
    }

    pub fn validated(self) -> StoreResult<Self> {
        if self.is_empty() {
            return Err(empty_patch());
        }

        let mut errors = ValidationErrors::new();
        let title = self
            .title
            .as_deref()
            .map(|t| check_title(&mut errors, "title", t));
        let description = self
            .description
            .as_deref()
            .map(|d| check_description(&mut errors, d));
        errors.into_result()?;

        Ok(TaskPatch {
            title,
            description,
            status: self.status,
            priority: self.priority,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewExpense {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub amount: f64,
    pub category: String,
    pub expense_date: NaiveDate,
}

impl NewExpense {
    pub fn validated(self) -> StoreResult<Self> {
        let mut errors = ValidationErrors::new();
        let title = check_title(&mut errors, "title", &self.title);
        let description = check_description(&mut errors, &self.description);
        let category = check_category(&mut errors, &self.category);
        check_amount(&mut errors, self.amount);
        errors.into_result()?;

        Ok(NewExpense {
            title,
            description,
            amount: self.amount,
            category,
            expense_date: self.expense_date,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExpensePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub status: Option<ExpenseStatus>,
    pub expense_date: Option<NaiveDate>,
}

impl ExpensePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.status.is_none()
            && self.expense_date.is_none()
    }

    pub fn validated(self) -> StoreResult<Self> {
        if self.is_empty() {
            return Err(empty_patch());
        }

        let mut errors = ValidationErrors::new();
        let title = self
            .title
            .as_deref()
            .map(|t| check_title(&mut errors, "title", t));
        let description = self
            .description
            .as_deref()
            .map(|d| check_description(&mut errors, d));
        let category = self
            .category
            .as_deref()
            .map(|c| check_category(&mut errors, c));
        if let Some(amount) = self.amount {
            check_amount(&mut errors, amount);
        }
        errors.into_result()?;

        Ok(ExpensePatch {
            title,
            description,
            amount: self.amount,
            category,
            status: self.status,
            expense_date: self.expense_date,
        })
    }
}

fn empty_patch() -> StoreError {
    StoreError::Validation(ValidationErrors::single(
        "body",
        "at least one field must be provided",
    ))
}

fn check_title(errors: &mut ValidationErrors, field: &str, raw: &str) -> String {
    let title = raw.trim();
    if title.is_empty() {
        errors.add(field, "must not be empty");
    } else if title.chars().count() > TITLE_MAX_LEN {
        errors.add(field, format!("must be at most {TITLE_MAX_LEN} characters"));
    }
    title.to_string()
}

fn check_description(errors: &mut ValidationErrors, raw: &str) -> String {
    let description = raw.trim();
    if description.chars().count() > DESCRIPTION_MAX_LEN {
        errors.add(
            "description",
            format!("must be at most {DESCRIPTION_MAX_LEN} characters"),
        );
    }
    description.to_string()
}

fn check_category(errors: &mut ValidationErrors, raw: &str) -> String {
    let category = raw.trim();
    if category.is_empty() {
        errors.add("category", "must not be empty");
    } else if category.chars().count() > CATEGORY_MAX_LEN {
        errors.add(
            "category",
            format!("must be at most {CATEGORY_MAX_LEN} characters"),
        );
    }
    category.to_string()
}

fn check_amount(errors: &mut ValidationErrors, amount: f64) {
    if !amount.is_finite() {
        errors.add("amount", "must be a finite number");
    } else if amount < 0.0 {
        errors.add("amount", "must not be negative");
    } else if amount > AMOUNT_MAX {
        errors.add("amount", format!("must be at most {AMOUNT_MAX}"));
    }
}

/// Deserializes an optional query parameter, treating `?key=` as absent.
pub fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
