//! `/api/expenses` endpoints.

use axum::Router;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use tracker_core::expenses::{ExpenseList, ExpenseQuery, ExpenseSummary};
use tracker_core::models::Expense;
use tracker_core::schema::{ExpensePatch, NewExpense};

use crate::api::{ApiResult, AppState, JsonBody, QueryParams};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/expenses", get(list_expenses).post(create_expense))
        .route("/api/expenses/summary", get(expense_summary))
        .route(
            "/api/expenses/{id}",
            get(get_expense).patch(update_expense).delete(delete_expense),
        )
}

async fn list_expenses(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ExpenseQuery>,
) -> ApiResult<Json<ExpenseList>> {
    Ok(Json(state.db.list_expenses(&query).await?))
}

async fn expense_summary(State(state): State<AppState>) -> ApiResult<Json<ExpenseSummary>> {
    Ok(Json(state.db.expense_summary().await?))
}

async fn create_expense(
    State(state): State<AppState>,
    JsonBody(new): JsonBody<NewExpense>,
) -> ApiResult<(StatusCode, Json<Expense>)> {
    let expense = state.db.create_expense(new).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

async fn get_expense(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Expense>> {
    let Path(id) = id?;
    Ok(Json(state.db.get_expense(id).await?))
}

async fn update_expense(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    JsonBody(patch): JsonBody<ExpensePatch>,
) -> ApiResult<Json<Expense>> {
    let Path(id) = id?;
    Ok(Json(state.db.update_expense(id, patch).await?))
}

async fn delete_expense(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = id?;
    state.db.delete_expense(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
