use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// REST backend for the task and expense trackers.
#[derive(Parser, Debug)]
#[command(name = "tracker", version, about)]
pub struct Cli {
    /// Host to bind.
    #[arg(long, env = "TRACKER_HOST", default_value = "127.0.0.1", global = true)]
    pub host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, env = "TRACKER_PORT", default_value_t = 8000, global = true)]
    pub port: u16,

    /// Path to the SQLite database file. Defaults to one file per service
    /// under the user's state directory.
    #[arg(long, env = "TRACKER_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Skip loading sample rows into an empty database.
    #[arg(long, global = true)]
    pub no_seed: bool,

    #[command(subcommand)]
    pub service: Service,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Serve /api/tasks.
    Tasks,
    /// Serve /api/expenses.
    Expenses,
}

impl Service {
    pub fn db_file(self) -> &'static str {
        match self {
            Service::Tasks => "tasks.db",
            Service::Expenses => "expenses.db",
        }
    }
}
