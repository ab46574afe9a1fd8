//! Terminal output for the `search` command.
//!
//! Colored answers and source lists, plus a spinner shown while the agent
//! works. The spinner draws to stderr so piped stdout stays clean.

use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::time::Duration;

use crate::models::{DeepSearchResult, Effort, SourceSegment};

/// Check if stdout is a terminal.
pub fn is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// Status icons for different operations.
pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Success => "✓",
        Status::Error => "✗",
        Status::Warning => "⚠",
        Status::Info => "ℹ",
        Status::Search => "🔍",
    }
}

/// Status types for colored output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
    Search,
}

/// Print a styled status message.
pub fn print_status(status: Status, msg: &str) {
    let icon = status_icon(status);
    match status {
        Status::Success => println!("{} {}", icon.green().bold(), msg),
        Status::Error => println!("{} {}", icon.red().bold(), msg),
        Status::Warning => println!("{} {}", icon.yellow().bold(), msg),
        Status::Info => println!("{} {}", icon.cyan().bold(), msg),
        Status::Search => println!("{} {}", icon.yellow(), msg),
    }
}

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", format!("━━━ {} ━━━", title).bold().cyan());
}

/// Print a divider line.
pub fn print_divider() {
    println!("{}", "─".repeat(80).dimmed());
}

/// Print the header of a deep search.
pub fn print_search_header(query: &str, effort: Effort) {
    println!();
    println!(
        "{} Deep search: \"{}\" ({} effort)",
        status_icon(Status::Search).yellow().bold(),
        query.cyan().bold(),
        effort.to_string().yellow()
    );
}

/// Print a deep search result with colors.
pub fn print_result(result: &DeepSearchResult, duration: Duration) {
    print_section("Answer");
    println!();
    println!("{}", result.answer);

    print_section(&format!("Sources ({})", result.sources.len()));
    if result.sources.is_empty() {
        println!("{}", "No sources cited.".dimmed());
    }
    for (idx, source) in result.sources.iter().enumerate() {
        println!(
            "{:>3}. {} {}",
            (idx + 1).to_string().dimmed(),
            source.label.green().bold(),
            source.value.blue()
        );
    }

    println!();
    print_divider();
    println!(
        "{}",
        format!("Finished in {:.1}s", duration.as_secs_f64()).dimmed()
    );
}

/// Render a result as plain text.
pub fn format_plain(result: &DeepSearchResult) -> String {
    let mut out = result.answer.trim_end().to_string();
    out.push('\n');
    if !result.sources.is_empty() {
        out.push_str("\nSources:\n");
        out.push_str(&format_sources(&result.sources));
    }
    out
}

/// Render sources as a numbered list.
pub fn format_sources(sources: &[SourceSegment]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(idx, source)| format!("{}. {}: {}\n", idx + 1, source.label, source.value))
        .collect()
}

/// A loading spinner with message.
pub struct Spinner {
    pb: indicatif::ProgressBar,
}

impl Spinner {
    /// Create a new spinner with the given message.
    pub fn new(msg: &str) -> Self {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_style(Self::style("{spinner:.cyan} {msg}", "⠁⠂⠄⡀⢀⠠⠐⠈ "));
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self { pb }
    }

    fn style(template: &str, ticks: &str) -> indicatif::ProgressStyle {
        indicatif::ProgressStyle::with_template(template)
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner())
            .tick_chars(ticks)
    }

    /// Finish with success message.
    pub fn finish_with_success(&self, msg: &str) {
        self.pb.set_style(Self::style("{spinner:.green} {msg}", "✓ ✗ "));
        self.pb.finish_with_message(msg.to_string());
    }

    /// Finish with error message.
    pub fn finish_with_error(&self, msg: &str) {
        self.pb.set_style(Self::style("{spinner:.red} {msg}", "✗ ✓ "));
        self.pb.finish_with_message(msg.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(label: &str, value: &str) -> SourceSegment {
        SourceSegment {
            label: label.to_string(),
            short_url: String::new(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_format_plain() {
        let result = DeepSearchResult {
            answer: "Rust is memory safe.\n".to_string(),
            sources: vec![
                source("rust-lang", "https://www.rust-lang.org/"),
                source("wikipedia", "https://en.wikipedia.org/wiki/Rust"),
            ],
        };

        assert_eq!(
            format_plain(&result),
            "Rust is memory safe.\n\nSources:\n1. rust-lang: https://www.rust-lang.org/\n2. wikipedia: https://en.wikipedia.org/wiki/Rust\n"
        );
    }

    #[test]
    fn test_format_plain_without_sources() {
        let result = DeepSearchResult::answer_only("No answer generated.");
        assert_eq!(format_plain(&result), "No answer generated.\n");
    }
}
