/// Command line operations over the habit store
///
/// Each command maps onto one store operation and produces a JSON value for
/// the binary to print. Identifiers and dates arrive as strings and are
/// validated here, before the store is touched.

use clap::Subcommand;
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::domain::{CheckDate, HabitId, OwnerId};
use crate::storage::{HabitStore, Table};
use crate::AppError;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Manage habits
    #[command(subcommand)]
    Habits(HabitCommand),

    /// Record and inspect checks
    #[command(subcommand)]
    Checks(CheckCommand),

    /// Active habits with their latest recent check, plus archived habits
    Overview {
        /// Days of checks to consider
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum HabitCommand {
    /// List active habits, or archived ones with --archived
    List {
        #[arg(long)]
        archived: bool,
    },

    /// Show a habit with its latest checks and next due date
    Show {
        id: String,
        #[arg(long)]
        limit: Option<u32>,
    },

    Create {
        title: String,
    },

    Rename {
        id: String,
        title: String,
    },

    Delete {
        id: String,
    },

    Archive {
        id: String,
    },

    Unarchive {
        id: String,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CheckCommand {
    /// Mark a habit done on a day (YYYY-MM-DD)
    Add { id: String, date: String },

    /// Remove the check of a habit on a day (YYYY-MM-DD)
    Remove { id: String, date: String },

    /// Newest checks of one habit
    Latest {
        id: String,
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Checks of all habits within the last few days
    Recent {
        #[arg(long)]
        days: Option<u32>,
    },
}

/// Acknowledgement for commands that return nothing else
#[derive(Debug, Serialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    fn done(message: String) -> Result<Value, AppError> {
        Ok(serde_json::to_value(Outcome {
            success: true,
            message,
        })?)
    }
}

/// Run one command as `owner`
pub async fn execute<T: Table>(
    store: &HabitStore<T>,
    config: &Config,
    owner: &OwnerId,
    command: Command,
) -> Result<Value, AppError> {
    match command {
        Command::Habits(command) => execute_habit(store, config, owner, command).await,
        Command::Checks(command) => execute_check(store, config, owner, command).await,
        Command::Overview { days } => {
            let days = days.unwrap_or(config.recent_window_days);
            json(store.overview(owner, days).await?)
        }
    }
}

async fn execute_habit<T: Table>(
    store: &HabitStore<T>,
    config: &Config,
    owner: &OwnerId,
    command: HabitCommand,
) -> Result<Value, AppError> {
    match command {
        HabitCommand::List { archived: false } => json(store.list_habits(owner).await?),
        HabitCommand::List { archived: true } => json(store.list_archived_habits(owner).await?),
        HabitCommand::Show { id, limit } => {
            let id = HabitId::parse(&id)?;
            let limit = limit.unwrap_or(config.latest_checks_limit);
            json(store.habit_detail(owner, &id, limit).await?)
        }
        HabitCommand::Create { title } => json(store.create_habit(owner, &title).await?),
        HabitCommand::Rename { id, title } => {
            let id = HabitId::parse(&id)?;
            store.update_habit_title(owner, &id, &title).await?;
            Outcome::done(format!("Renamed habit {id} to '{title}'"))
        }
        HabitCommand::Delete { id } => {
            let id = HabitId::parse(&id)?;
            store.delete_habit(owner, &id).await?;
            Outcome::done(format!("Deleted habit {id}"))
        }
        HabitCommand::Archive { id } => {
            let id = HabitId::parse(&id)?;
            store.archive_habit(owner, &id).await?;
            Outcome::done(format!("Archived habit {id}"))
        }
        HabitCommand::Unarchive { id } => {
            let id = HabitId::parse(&id)?;
            store.unarchive_habit(owner, &id).await?;
            Outcome::done(format!("Restored habit {id}"))
        }
    }
}

async fn execute_check<T: Table>(
    store: &HabitStore<T>,
    config: &Config,
    owner: &OwnerId,
    command: CheckCommand,
) -> Result<Value, AppError> {
    match command {
        CheckCommand::Add { id, date } => {
            let id = HabitId::parse(&id)?;
            let date = CheckDate::parse(&date)?;
            json(store.create_check(owner, &id, date).await?)
        }
        CheckCommand::Remove { id, date } => {
            let id = HabitId::parse(&id)?;
            let date = CheckDate::parse(&date)?;
            store.delete_check(owner, &id, date).await?;
            Outcome::done(format!("Removed check of habit {id} on {date}"))
        }
        CheckCommand::Latest { id, limit } => {
            let id = HabitId::parse(&id)?;
            let limit = limit.unwrap_or(config.latest_checks_limit);
            json(store.list_latest_checks(owner, &id, limit).await?)
        }
        CheckCommand::Recent { days } => {
            let days = days.unwrap_or(config.recent_window_days);
            json(store.list_recent_checks_across_habits(owner, days).await?)
        }
    }
}

fn json<S: Serialize>(value: S) -> Result<Value, AppError> {
    Ok(serde_json::to_value(value)?)
}
