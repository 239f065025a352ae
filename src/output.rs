//! Output formatting and styling module.
//!
//! All user-facing CLI output goes through here: colored status lines, the
//! hashing progress bar and the end-of-run summary tables. Diagnostics go
//! through `tracing` instead.

use crate::maintenance::RunSummary;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars for hashing
/// - Summary tables with statistics
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use pctidy::output::OutputFormatter;
    /// OutputFormatter::success("Maintenance finished");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark, on stderr.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    ///
    /// ```no_run
    /// use pctidy::output::OutputFormatter;
    /// OutputFormatter::info("Organizing directory: /home/user/Downloads");
    /// ```
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for hashing; the length is set once candidates are known.
    ///
    /// ```no_run
    /// use pctidy::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_with_message("hashed");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints the files moved per category.
    ///
    /// ```no_run
    /// use pctidy::output::OutputFormatter;
    /// use std::collections::BTreeMap;
    ///
    /// let mut counts = BTreeMap::new();
    /// counts.insert("Documents".to_string(), 15);
    /// counts.insert("Images".to_string(), 8);
    /// OutputFormatter::summary_table(&counts, 23);
    /// ```
    pub fn summary_table(category_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("ORGANIZED");

        let width = category_counts
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(8); // At least "Category" width

        println!("{:<width$} | {}", "Category".bold(), "Files".bold());
        println!("{}", "-".repeat(width + 10));
        for (category, count) in category_counts {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural(*count, "file", "files")
            );
        }
        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files, "file", "files")
        );
    }

    /// Prints the end-of-run summary.
    pub fn run_summary(summary: &RunSummary) {
        if !summary.category_counts.is_empty() {
            Self::summary_table(&summary.category_counts, summary.files_moved);
        }

        Self::header("SUMMARY");
        let verb = if summary.dry_run { "would be " } else { "" };
        println!("Files {}moved:      {}", verb, summary.files_moved.to_string().green());
        if summary.renamed > 0 {
            println!("  renamed to avoid collisions: {}", summary.renamed);
        }
        println!(
            "Duplicates {}deleted: {} in {} {} ({})",
            verb,
            summary.files_deleted.to_string().green(),
            summary.duplicate_groups,
            plural(summary.duplicate_groups, "group", "groups"),
            format_kb(summary.bytes_reclaimed)
        );
        println!(
            "Temp files {}deleted: {} ({} freed)",
            verb,
            summary.temp_files_deleted.to_string().green(),
            format_kb(summary.temp_bytes_freed)
        );
        println!("Skipped:            {}", summary.skipped);
        if summary.has_errors() {
            println!("Errors:             {}", summary.errors.to_string().red());
        } else {
            println!("Errors:             0");
        }
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 { one } else { many }
}

/// Kilobytes with two decimals, e.g. `12.50 KB`.
pub fn format_kb(bytes: u64) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_kb() {
        assert_eq!(format_kb(0), "0.00 KB");
        assert_eq!(format_kb(1024), "1.00 KB");
        assert_eq!(format_kb(1536), "1.50 KB");
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural(1, "file", "files"), "file");
        assert_eq!(plural(0, "file", "files"), "files");
        assert_eq!(plural(7, "group", "groups"), "groups");
    }
}
