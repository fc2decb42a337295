//! `worktime list`: the paginated registration list.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Local};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use worktime_core::{Config, RegistrationStore, TimeRegistration};
use worktime_list::{ListRow, LoadMoreOutcome, PaginatedListController};

use super::{home_dir, open_local_store};

/// Arguments for `worktime list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Number of pages to load.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: u32,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ListArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let config = Config::load_at(&home).context("failed to load configuration")?;
        let store: Arc<dyn RegistrationStore> = Arc::new(open_local_store(&home)?);
        let total = store.count().context("failed to count registrations")?;

        let mut list = PaginatedListController::new(store, &config.list);
        list.load(true, true).context("failed to load registrations")?;

        let runtime = super::runtime()?;
        runtime.block_on(async {
            for _ in 1..self.pages {
                if !list.has_sentinel() {
                    break;
                }
                if list.load_more_or_reload().await? == LoadMoreOutcome::ReloadRequired {
                    tracing::info!("registrations changed while paging, list reloaded");
                }
            }
            Ok::<_, worktime_list::ListError>(())
        })
        .context("failed to load more registrations")?;

        if self.json {
            return print_json(&list, total);
        }
        print_table(&list, self.pages);
        Ok(())
    }
}

#[derive(Serialize)]
struct ListJson<'a> {
    total: usize,
    loaded: usize,
    more: bool,
    registrations: Vec<&'a TimeRegistration>,
}

fn print_json(list: &PaginatedListController, total: usize) -> Result<()> {
    let payload = ListJson {
        total: total.max(list.window().observed_count),
        loaded: list.effective_loaded_count(),
        more: list.has_sentinel(),
        registrations: list.rows().iter().filter_map(ListRow::as_record).collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize registrations")?
    );
    Ok(())
}

#[derive(Tabled)]
struct RegistrationRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "task")]
    task: String,
    #[tabled(rename = "start")]
    start: String,
    #[tabled(rename = "end")]
    end: String,
    #[tabled(rename = "worked")]
    worked: String,
    #[tabled(rename = "comment")]
    comment: String,
}

fn table_rows(rows: &[ListRow]) -> Vec<RegistrationRow> {
    rows.iter()
        .filter_map(ListRow::as_record)
        .map(|r| RegistrationRow {
            id: r.id.to_string(),
            task: r.task.to_string(),
            start: r.start.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
            end: r
                .end
                .map(|end| end.with_timezone(&Local).format("%H:%M").to_string())
                .unwrap_or_else(|| "ongoing".to_string()),
            worked: r.duration().map(format_duration).unwrap_or_default(),
            comment: r.comment.clone().unwrap_or_default(),
        })
        .collect()
}

pub(crate) fn print_rows(rows: &[ListRow]) {
    let table_rows = table_rows(rows);
    if table_rows.is_empty() {
        println!("No time registrations yet. Run `worktime punch-in` first.");
        return;
    }
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn print_table(list: &PaginatedListController, pages: u32) {
    print_rows(list.rows());
    if list.has_sentinel() {
        let hint = format!(
            "… {} shown, more available (use --pages {})",
            list.effective_loaded_count(),
            pages + 1
        );
        println!("{}", hint.bright_black());
    }
}

pub(crate) fn format_duration(duration: Duration) -> String {
    let minutes = duration.num_minutes().max(0);
    format!("{}h{:02}m", minutes / 60, minutes % 60)
}
