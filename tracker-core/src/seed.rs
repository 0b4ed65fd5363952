//! Demo rows loaded into an empty store at startup.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::info;

use crate::db::{Database, finish};
use crate::error::StoreResult;
use crate::expenses::insert_seed_expense;
use crate::models::{Expense, ExpenseStatus, Priority, Task, TaskStatus};
use crate::tasks::insert_seed_task;

/// Inserts the sample tasks if the table is empty. Returns how many rows
/// were written.
pub async fn seed_tasks(db: &Database) -> StoreResult<usize> {
    if db.count_tasks().await? > 0 {
        return Ok(0);
    }

    let tasks = sample_tasks(Utc::now());
    let mut tx = db.begin().await?;
    let result: StoreResult<()> = async {
        for task in &tasks {
            insert_seed_task(&mut tx, task).await?;
        }
        Ok(())
    }
    .await;
    finish(tx, result).await?;

    info!(count = tasks.len(), "seeded sample tasks");
    Ok(tasks.len())
}

/// Inserts the sample expenses if the table is empty.
pub async fn seed_expenses(db: &Database) -> StoreResult<usize> {
    if db.count_expenses().await? > 0 {
        return Ok(0);
    }

    let now = Utc::now();
    let expenses = sample_expenses(now.date_naive(), now);
    let mut tx = db.begin().await?;
    let result: StoreResult<()> = async {
        for expense in &expenses {
            insert_seed_expense(&mut tx, expense).await?;
        }
        Ok(())
    }
    .await;
    finish(tx, result).await?;

    info!(count = expenses.len(), "seeded sample expenses");
    Ok(expenses.len())
}

fn task(
    title: &str,
    description: &str,
    status: TaskStatus,
    priority: Priority,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
) -> Task {
    Task {
        id: 0,
        title: title.to_string(),
        description: description.to_string(),
        status,
        priority,
        created_at,
        completed_at,
    }
}

pub fn sample_tasks(now: DateTime<Utc>) -> Vec<Task> {
    use Priority::*;
    use TaskStatus::*;

    let days = |n: i64| now - Duration::days(n);

    vec![
        task(
            "Set up CI/CD pipeline",
            "Configure GitHub Actions for automated testing and deployment",
            Completed,
            High,
            days(7),
            Some(days(5)),
        ),
        task(
            "Fix login page styling",
            "Resolve CSS alignment issues on the login form",
            Completed,
            Low,
            days(6),
            Some(days(4)),
        ),
        task(
            "Search indexing optimization",
            "Improve database search query performance with proper indexing",
            Completed,
            Medium,
            days(5),
            Some(days(3)),
        ),
        task(
            "Implement user search feature",
            "Add ability to search users by name and email",
            InProgress,
            High,
            days(4),
            None,
        ),
        task(
            "Deploy to staging environment",
            "Push latest changes to staging for QA testing",
            Pending,
            High,
            days(3),
            None,
        ),
        task(
            "Write API documentation",
            "Document all REST endpoints with request and response examples",
            Pending,
            Medium,
            days(3),
            None,
        ),
        task(
            "Fix search performance issue",
            "Optimize slow search queries on the tasks endpoint",
            InProgress,
            Medium,
            days(2),
            None,
        ),
        task(
            "Update npm dependencies",
            "Upgrade outdated packages and resolve security vulnerabilities",
            Pending,
            Low,
            days(1),
            None,
        ),
        task(
            "Add email notifications",
            "Send email alerts when task status changes",
            Pending,
            Medium,
            days(1),
            None,
        ),
        task(
            "Design new landing page",
            "Create mockups for the redesigned landing page",
            InProgress,
            Low,
            now,
            None,
        ),
    ]
}

pub fn sample_expenses(today: NaiveDate, now: DateTime<Utc>) -> Vec<Expense> {
    use ExpenseStatus::*;

    let rows: [(&str, &str, f64, &str, ExpenseStatus, i64); 15] = [
        ("Flight to NYC", "Round-trip flight for client meeting", 450.00, "travel", Approved, 13),
        ("Hotel - 3 nights", "Hotel stay during NYC client visit", 780.00, "travel", Approved, 12),
        ("Team lunch", "Lunch with engineering team", 85.50, "meals", Approved, 10),
        ("Office supplies", "Notebooks, pens, and sticky notes", 42.99, "office", Approved, 10),
        ("IDE license renewal", "Annual JetBrains subscription", 199.00, "software", Approved, 8),
        ("Taxi to airport", "Taxi from office to JFK", 35.00, "travel", Approved, 7),
        ("Client dinner", "Dinner with prospective client", 156.00, "meals", Pending, 6),
        ("Ergonomic keyboard", "Mechanical keyboard for workstation", 89.99, "office", Pending, 5),
        (
            "Conference registration",
            "Tech conference - budget exceeded",
            350.00,
            "travel",
            Rejected,
            5,
        ),
        ("Team coffee run", "Coffee for afternoon standup", 24.50, "meals", Approved, 3),
        ("AWS monthly bill", "Cloud infrastructure costs", 120.00, "software", Approved, 2),
        (
            "Printer cartridge",
            "Replacement toner - wrong model ordered",
            65.00,
            "office",
            Rejected,
            1,
        ),
        ("Flight to SF", "Upcoming west coast team sync", 520.00, "travel", Pending, 0),
        ("Uber rides", "Various ride-shares for meetings", 48.75, "travel", Approved, 0),
        ("Team building event", "Escape room team activity", 275.00, "other", Approved, 7),
    ];

    rows.into_iter()
        .map(|(title, description, amount, category, status, age)| Expense {
            id: 0,
            title: title.to_string(),
            description: description.to_string(),
            amount,
            category: category.to_string(),
            status,
            expense_date: today - Duration::days(age),
            created_at: now - Duration::days(age),
        })
        .collect()
}
