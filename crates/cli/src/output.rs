//! Output formatting for the CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Rows that can be shown in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Build the table for `items`, `None` when there is nothing to show
pub fn table<T: TableDisplay>(items: &[T]) -> Option<Table> {
    if items.is_empty() {
        return None;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(T::headers());
    for item in items {
        table.add_row(item.row());
    }
    Some(table)
}

/// Print a list of items under `title`
pub fn print_list<T: Serialize + TableDisplay>(title: &str, items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            println!("{}", title.bold());
            match table(items) {
                Some(table) => println!("{table}"),
                None => println!("  {}", "none".dimmed()),
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn print_failure(message: &str) {
    println!("{} {}", "✗".red(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message);
}

/// Milliseconds as `1.23s` above a second, `456ms` below
pub fn format_millis(ms: f64) -> String {
    if ms >= 1000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else {
        format!("{:.0}ms", ms)
    }
}
