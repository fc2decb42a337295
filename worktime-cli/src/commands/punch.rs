//! `worktime punch-in` / `worktime punch-out`.

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::Args;
use colored::Colorize;

use worktime_core::{punch, TaskRef};

use super::{home_dir, open_local_store};

/// Arguments for `worktime punch-in`.
#[derive(Args, Debug)]
pub struct PunchInArgs {
    /// Project the work belongs to.
    #[arg(long)]
    pub project: String,

    /// Task within the project.
    #[arg(long)]
    pub task: String,
}

impl PunchInArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let store = open_local_store(&home)?;
        let task = TaskRef::new(self.project, self.task);

        let registration =
            punch::punch_in(&store, task.clone(), Utc::now()).context("punch-in failed")?;
        println!(
            "{} punched in on {} at {}",
            "✓".green(),
            task.to_string().bold(),
            registration.start.with_timezone(&Local).format("%H:%M")
        );
        Ok(())
    }
}

/// Arguments for `worktime punch-out`.
#[derive(Args, Debug)]
pub struct PunchOutArgs {
    /// Note stored on the finished registration.
    #[arg(long)]
    pub comment: Option<String>,
}

impl PunchOutArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let store = open_local_store(&home)?;

        let registration =
            punch::punch_out(&store, Utc::now(), self.comment).context("punch-out failed")?;
        let worked = registration
            .duration()
            .map(super::list::format_duration)
            .unwrap_or_default();
        println!(
            "{} punched out of {} after {}",
            "✓".green(),
            registration.task.to_string().bold(),
            worked
        );
        Ok(())
    }
}
