//! Output formatting utilities

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Pretty-print any serializable value as JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print rows as a rounded table
pub fn print_table<T: Tabled>(rows: Vec<T>) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    println!("{}", Table::new(rows).with(Style::rounded()));
}

/// Print a section heading
pub fn print_heading(title: &str) {
    println!("{}", title.bold());
    println!("{}", "=".repeat(60));
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a probability as a percentage
pub fn format_probability(probability: f64) -> String {
    format!("{:.1}%", probability * 100.0)
}

/// Format a lifetime value in dollars
pub fn format_currency(amount: f64) -> String {
    format!("${:.2}", amount)
}

/// Color a churn risk level or LTV tier.
///
/// High churn risk is bad while a high LTV tier is good, so the caller
/// says which scale the label is on.
pub fn color_label(label: &str, higher_is_better: bool) -> String {
    let good = |s: &str| s.green().to_string();
    let bad = |s: &str| s.red().to_string();
    match label {
        "HIGH" if higher_is_better => good(label),
        "HIGH" => bad(label),
        "MEDIUM" => label.yellow().to_string(),
        "LOW" if higher_is_better => label.yellow().to_string(),
        "LOW" => good(label),
        "ZERO" => label.dimmed().to_string(),
        _ => label.to_string(),
    }
}

/// Color a batch item status
pub fn color_status(ok: bool) -> String {
    if ok {
        "ok".green().to_string()
    } else {
        "failed".red().to_string()
    }
}

/// Format a feature value without trailing zeros
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.4}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_probability() {
        assert_eq!(format_probability(0.0911), "9.1%");
        assert_eq!(format_probability(1.0), "100.0%");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(350.0), "$350.00");
        assert_eq!(format_currency(1234.5), "$1234.50");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(45.0), "45");
        assert_eq!(format_value(0.52), "0.5200");
        assert_eq!(format_value(-1.0), "-1");
    }
}
