//! Storage and query layer for the task and expense trackers.

pub mod db;
pub mod error;
pub mod expenses;
pub mod models;
pub mod schema;
pub mod seed;
pub mod tasks;

pub use db::Database;
pub use error::{FieldError, StoreError, StoreResult, ValidationErrors};
