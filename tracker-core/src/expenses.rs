//! Expense queries, mutations and the spending summary.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::{debug, info};

use crate::db::{Database, finish};
use crate::error::{StoreError, StoreResult};
use crate::models::{Expense, ExpenseStatus};
use crate::schema::{ExpensePatch, NewExpense, empty_as_none};

const EXPENSE_COLUMNS: &str =
    "id, title, description, amount, category, status, expense_date, created_at";

/// Filters for an expense listing. `date_start` is inclusive, `date_end`
/// exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExpenseQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<ExpenseStatus>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub date_start: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub date_end: Option<NaiveDate>,
}

impl ExpenseQuery {
    fn push_filters(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        let mut joiner = " WHERE ";
        if let Some(category) = &self.category {
            qb.push(joiner).push("category = ").push_bind(category.clone());
            joiner = " AND ";
        }
        if let Some(status) = self.status {
            qb.push(joiner).push("status = ").push_bind(status);
            joiner = " AND ";
        }
        if let Some(start) = self.date_start {
            qb.push(joiner).push("expense_date >= ").push_bind(start);
            joiner = " AND ";
        }
        if let Some(end) = self.date_end {
            qb.push(joiner).push("expense_date < ").push_bind(end);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseList {
    pub expenses: Vec<Expense>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseSummary {
    pub total: f64,
    /// Keyed by category; serializes in lexicographic key order.
    pub by_category: BTreeMap<String, f64>,
    pub count: i64,
}

/// Rounds to whole cents. Values too large to scale are returned unchanged.
pub fn round_cents(value: f64) -> f64 {
    let cents = value * 100.0;
    if !cents.is_finite() {
        return value;
    }
    cents.round() / 100.0
}

pub fn apply_patch(expense: &mut Expense, patch: ExpensePatch) {
    if let Some(title) = patch.title {
        expense.title = title;
    }
    if let Some(description) = patch.description {
        expense.description = description;
    }
    if let Some(amount) = patch.amount {
        expense.amount = amount;
    }
    if let Some(category) = patch.category {
        expense.category = category;
    }
    if let Some(status) = patch.status {
        expense.status = status;
    }
    if let Some(expense_date) = patch.expense_date {
        expense.expense_date = expense_date;
    }
}

impl Database {
    pub async fn list_expenses(&self, query: &ExpenseQuery) -> StoreResult<ExpenseList> {
        let mut select =
            QueryBuilder::<Sqlite>::new(format!("SELECT {EXPENSE_COLUMNS} FROM expenses"));
        query.push_filters(&mut select);
        select.push(" ORDER BY expense_date DESC, id ASC");

        let expenses = select
            .build_query_as::<Expense>()
            .fetch_all(self.pool())
            .await?;

        Ok(ExpenseList {
            total: expenses.len(),
            expenses,
        })
    }

    pub async fn expense_summary(&self) -> StoreResult<ExpenseSummary> {
        let rows: Vec<(String, f64, i64)> = sqlx::query_as(
            "SELECT category, SUM(amount), COUNT(*) FROM expenses
             GROUP BY category ORDER BY category",
        )
        .fetch_all(self.pool())
        .await?;

        let mut total = 0.0;
        let mut count = 0;
        let mut by_category = BTreeMap::new();
        for (category, sum, n) in rows {
            total += sum;
            count += n;
            by_category.insert(category, round_cents(sum));
        }

        Ok(ExpenseSummary {
            total: round_cents(total),
            by_category,
            count,
        })
    }

    pub async fn get_expense(&self, id: i64) -> StoreResult<Expense> {
        let mut conn = self.pool().acquire().await?;
        fetch_expense(&mut conn, id).await
    }

    pub async fn create_expense(&self, new: NewExpense) -> StoreResult<Expense> {
        let new = new.validated()?;
        let mut tx = self.begin().await?;
        let result = insert_expense(&mut tx, &new, Utc::now()).await;
        let expense = finish(tx, result).await?;

        info!(expense_id = expense.id, category = %expense.category, "expense created");
        Ok(expense)
    }

    pub async fn update_expense(&self, id: i64, patch: ExpensePatch) -> StoreResult<Expense> {
        let patch = patch.validated()?;
        let mut tx = self.begin().await?;
        let result: StoreResult<Expense> = async {
            let mut expense = fetch_expense(&mut tx, id).await?;
            apply_patch(&mut expense, patch);
            write_expense(&mut tx, &expense).await?;
            Ok(expense)
        }
        .await;
        let expense = finish(tx, result).await?;

        debug!(expense_id = id, status = %expense.status, "expense updated");
        Ok(expense)
    }

    pub async fn delete_expense(&self, id: i64) -> StoreResult<()> {
        let mut tx = self.begin().await?;
        let result: StoreResult<()> = async {
            let deleted = sqlx::query("DELETE FROM expenses WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            if deleted == 0 {
                return Err(StoreError::NotFound { entity: "Expense" });
            }
            Ok(())
        }
        .await;
        finish(tx, result).await?;

        info!(expense_id = id, "expense deleted");
        Ok(())
    }

    pub async fn count_expenses(&self) -> StoreResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM expenses")
            .fetch_one(self.pool())
            .await?)
    }
}

async fn fetch_expense(conn: &mut SqliteConnection, id: i64) -> StoreResult<Expense> {
    sqlx::query_as::<_, Expense>(&format!(
        "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(StoreError::NotFound { entity: "Expense" })
}

async fn insert_expense(
    conn: &mut SqliteConnection,
    new: &NewExpense,
    now: DateTime<Utc>,
) -> StoreResult<Expense> {
    let expense = sqlx::query_as::<_, Expense>(&format!(
        "INSERT INTO expenses
         (title, description, amount, category, status, expense_date, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         RETURNING {EXPENSE_COLUMNS}"
    ))
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.amount)
    .bind(&new.category)
    .bind(ExpenseStatus::Pending)
    .bind(new.expense_date)
    .bind(now)
    .fetch_one(conn)
    .await?;

    Ok(expense)
}

async fn write_expense(conn: &mut SqliteConnection, expense: &Expense) -> StoreResult<()> {
    sqlx::query(
        "UPDATE expenses
         SET title = ?, description = ?, amount = ?, category = ?, status = ?, expense_date = ?
         WHERE id = ?",
    )
    .bind(&expense.title)
    .bind(&expense.description)
    .bind(expense.amount)
    .bind(&expense.category)
    .bind(expense.status)
    .bind(expense.expense_date)
    .bind(expense.id)
    .execute(conn)
    .await?;

    Ok(())
}

pub(crate) async fn insert_seed_expense(
    conn: &mut SqliteConnection,
    expense: &Expense,
) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO expenses
         (title, description, amount, category, status, expense_date, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&expense.title)
    .bind(&expense.description)
    .bind(expense.amount)
    .bind(&expense.category)
    .bind(expense.status)
    .bind(expense.expense_date)
    .bind(expense.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AMOUNT_MAX;

    async fn db() -> Database {
        Database::in_memory().await.unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn new_expense(title: &str, amount: f64, category: &str, expense_date: &str) -> NewExpense {
        NewExpense {
            title: title.to_string(),
            description: String::new(),
            amount,
            category: category.to_string(),
            expense_date: date(expense_date),
        }
    }

    #[test]
    fn round_cents_rounds_to_two_places() {
        assert_eq!(round_cents(10.004), 10.0);
        assert_eq!(round_cents(0.1 + 0.2), 0.3);
        assert_eq!(round_cents(12.3456), 12.35);
        assert_eq!(round_cents(1e307), 1e307);
    }

    #[tokio::test]
    async fn created_expense_starts_pending() {
        let db = db().await;
        let expense = db
            .create_expense(new_expense(" Taxi ", 35.0, "travel", "2024-03-01"))
            .await
            .unwrap();

        assert_eq!(expense.title, "Taxi");
        assert_eq!(expense.status, ExpenseStatus::Pending);
        assert_eq!(expense.expense_date, date("2024-03-01"));
        assert_eq!(db.get_expense(expense.id).await.unwrap(), expense);
    }

    #[tokio::test]
    async fn negative_amount_is_rejected() {
        let db = db().await;
        let err = db
            .create_expense(new_expense("Refund", -10.0, "other", "2024-03-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(db.count_expenses().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn oversized_amount_is_rejected_and_summary_stays_finite() {
        let db = db().await;
        let err = db
            .create_expense(new_expense("Yacht", 1e307, "travel", "2024-03-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        for _ in 0..3 {
            db.create_expense(new_expense("Fleet", AMOUNT_MAX, "travel", "2024-03-01"))
                .await
                .unwrap();
        }
        let summary = db.expense_summary().await.unwrap();
        assert_eq!(summary.total, 3.0 * AMOUNT_MAX);
        assert!(summary.by_category["travel"].is_finite());
    }

    #[tokio::test]
    async fn list_filters_and_orders_by_date() {
        let db = db().await;
        db.create_expense(new_expense("Flight", 450.0, "travel", "2024-03-01"))
            .await
            .unwrap();
        db.create_expense(new_expense("Lunch", 20.0, "meals", "2024-03-05"))
            .await
            .unwrap();
        let hotel = db
            .create_expense(new_expense("Hotel", 300.0, "travel", "2024-03-10"))
            .await
            .unwrap();

        let all = db.list_expenses(&ExpenseQuery::default()).await.unwrap();
        let titles: Vec<_> = all.expenses.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["Hotel", "Lunch", "Flight"]);
        assert_eq!(all.total, 3);

        let travel = ExpenseQuery {
            category: Some("travel".into()),
            ..ExpenseQuery::default()
        };
        assert_eq!(db.list_expenses(&travel).await.unwrap().total, 2);

        // Start is inclusive, end exclusive.
        let window = ExpenseQuery {
            date_start: Some(date("2024-03-05")),
            date_end: Some(date("2024-03-10")),
            ..ExpenseQuery::default()
        };
        let listed = db.list_expenses(&window).await.unwrap();
        assert_eq!(listed.total, 1);
        assert_eq!(listed.expenses[0].title, "Lunch");

        db.update_expense(
            hotel.id,
            ExpensePatch {
                status: Some(ExpenseStatus::Approved),
                ..ExpensePatch::default()
            },
        )
        .await
        .unwrap();
        let approved_travel = ExpenseQuery {
            category: Some("travel".into()),
            status: Some(ExpenseStatus::Approved),
            ..ExpenseQuery::default()
        };
        let listed = db.list_expenses(&approved_travel).await.unwrap();
        assert_eq!(listed.total, 1);
        assert_eq!(listed.expenses[0].id, hotel.id);
    }

    #[tokio::test]
    async fn summary_totals_by_sorted_category() {
        let db = db().await;
        let empty = db.expense_summary().await.unwrap();
        assert_eq!(empty.total, 0.0);
        assert_eq!(empty.count, 0);
        assert!(empty.by_category.is_empty());

        for (title, amount, category) in [
            ("Taxi", 35.0, "travel"),
            ("Coffee", 24.5, "meals"),
            ("Lunch", 85.5, "meals"),
            ("Pens", 42.99, "office"),
            ("Flight", 450.0, "travel"),
        ] {
            db.create_expense(new_expense(title, amount, category, "2024-03-01"))
                .await
                .unwrap();
        }

        let summary = db.expense_summary().await.unwrap();
        assert_eq!(summary.count, 5);
        let keys: Vec<_> = summary.by_category.keys().map(String::as_str).collect();
        assert_eq!(keys, ["meals", "office", "travel"]);
        assert_eq!(summary.by_category["meals"], 110.0);
        assert_eq!(summary.by_category["office"], 42.99);
        assert_eq!(summary.by_category["travel"], 485.0);

        let category_sum: f64 = summary.by_category.values().sum();
        assert!((category_sum - summary.total).abs() < 0.01);
        assert_eq!(summary.total, 637.99);
    }

    #[tokio::test]
    async fn update_and_delete_missing_expense() {
        let db = db().await;
        let patch = ExpensePatch {
            amount: Some(1.0),
            ..ExpensePatch::default()
        };
        assert!(matches!(
            db.update_expense(7, patch).await,
            Err(StoreError::NotFound { entity: "Expense" })
        ));
        assert!(matches!(
            db.delete_expense(7).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let db = db().await;
        let expense = db
            .create_expense(new_expense("Keyboard", 89.99, "office", "2024-03-02"))
            .await
            .unwrap();

        let patch = ExpensePatch {
            amount: Some(79.99),
            expense_date: Some(date("2024-03-03")),
            ..ExpensePatch::default()
        };
        let updated = db.update_expense(expense.id, patch).await.unwrap();
        assert_eq!(updated.amount, 79.99);
        assert_eq!(updated.expense_date, date("2024-03-03"));
        assert_eq!(updated.title, "Keyboard");
        assert_eq!(updated.category, "office");
        assert_eq!(updated.created_at, expense.created_at);

        db.delete_expense(expense.id).await.unwrap();
        assert!(matches!(
            db.get_expense(expense.id).await,
            Err(StoreError::NotFound { .. })
        ));
    }
}
