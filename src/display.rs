//! Colored CLI display utilities for generation output.
//!
//! This module provides functions for printing colored, formatted directive
//! events to the terminal while a generation streams.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::parser::{DirectiveEvent, EventPayload, EventSink, GenerationResult};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Maximum length for truncated display strings.
const DEFAULT_MAX_LEN: usize = 80;

/// Truncate a string to a maximum number of characters, adding ellipsis if
/// truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize, raw_mode: bool) -> String {
    if raw_mode || s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{kept}...")
}

/// First line of a block of text, for one-line summaries.
fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or_default()
}

/// Print the start of a generation.
pub fn print_generation_start(model: &str, prompt: &str, raw_mode: bool) {
    println!(
        "{} {} model={}, prompt={}",
        timestamp().dimmed(),
        "[GENERATE]".blue().bold(),
        model.cyan(),
        truncate(prompt, 60, raw_mode).dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print the aggregate result of a generation.
pub fn print_result(result: &GenerationResult) {
    let ts = timestamp();
    if result.has_errors() {
        println!(
            "{} {} {} file(s) written, {} error(s)",
            ts.dimmed(),
            "[DONE]".yellow().bold(),
            result.total_files,
            result.errors.len()
        );
        for error in &result.errors {
            println!("{} {} {}", ts.dimmed(), "[ERROR]".red().bold(), error.red());
        }
    } else {
        println!(
            "{} {} {} file(s) written",
            ts.dimmed(),
            "[DONE]".green().bold(),
            result.total_files
        );
    }
    let _ = io::stdout().flush();
}

/// Print one directive event.
pub fn print_event(event: &DirectiveEvent, raw_mode: bool) {
    let ts = event.timestamp.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string();
    match &event.payload {
        EventPayload::Message { text } => {
            println!("{} {} {}", ts.dimmed(), "[MESSAGE]".cyan().bold(), text);
        }
        EventPayload::Plan { text } => {
            println!("{} {}", ts.dimmed(), "[PLAN]".magenta().bold());
            for line in text.lines() {
                println!("    {line}");
            }
        }
        EventPayload::FileStart {
            path, description, ..
        } => {
            println!(
                "{} {} {} {}",
                ts.dimmed(),
                "[FILE]".blue().bold(),
                path.cyan(),
                description
                    .as_deref()
                    .map(|d| truncate(d, DEFAULT_MAX_LEN, raw_mode))
                    .unwrap_or_default()
                    .dimmed()
            );
        }
        EventPayload::FileComplete { path, content, .. } => {
            println!(
                "{} {} {} ({} lines)",
                ts.dimmed(),
                "[WROTE]".green().bold(),
                path.cyan(),
                content.lines().count()
            );
        }
        EventPayload::FileError { path, error } => {
            println!(
                "{} {} {} {}",
                ts.dimmed(),
                "[FILE ERROR]".red().bold(),
                path.cyan(),
                error.red()
            );
        }
        EventPayload::ActionStart {
            module,
            action,
            description,
        } => {
            println!(
                "{} {} {}.{} {}",
                ts.dimmed(),
                "[ACTION]".yellow().bold(),
                module,
                action,
                description.as_deref().unwrap_or_default().dimmed()
            );
        }
        EventPayload::ActionComplete {
            module,
            action,
            result,
        } => {
            println!(
                "{} {} {}.{} -> {}",
                ts.dimmed(),
                "[ACTION OK]".green().bold(),
                module,
                action,
                truncate(&result.to_string(), DEFAULT_MAX_LEN, raw_mode).dimmed()
            );
        }
        EventPayload::ActionError {
            module,
            action,
            error,
        } => {
            println!(
                "{} {} {}.{} {}",
                ts.dimmed(),
                "[ACTION ERROR]".red().bold(),
                module,
                action,
                error.red()
            );
        }
        EventPayload::Error { message } => {
            println!("{} {} {}", ts.dimmed(), "[ERROR]".red().bold(), message.red());
        }
        EventPayload::MessageDelta { delta } | EventPayload::PlanStreaming { delta } => {
            print!("{}", delta.dimmed());
        }
        EventPayload::FileContentDelta { path, delta } => {
            tracing::trace!(path = %path, bytes = delta.len(), "File content streamed");
        }
        EventPayload::FileStreaming { path, content } => {
            tracing::trace!(
                path = %path,
                line = %first_line(content),
                "File snapshot streamed"
            );
        }
    }
    let _ = io::stdout().flush();
}

/// Event sink that prints to the terminal.
///
/// Streaming text deltas are shown only when `show_deltas` is set; a
/// completed block always starts on a fresh line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink {
    raw_mode: bool,
    show_deltas: bool,
    mid_line: bool,
}

impl ConsoleSink {
    #[must_use]
    pub fn new(raw_mode: bool, show_deltas: bool) -> Self {
        Self {
            raw_mode,
            show_deltas,
            mid_line: false,
        }
    }
}

impl EventSink for ConsoleSink {
    fn emit(&mut self, event: DirectiveEvent) {
        let is_delta = matches!(
            event.payload,
            EventPayload::MessageDelta { .. } | EventPayload::PlanStreaming { .. }
        );
        if is_delta && !self.show_deltas {
            return;
        }
        if !is_delta && self.mid_line {
            println!();
            self.mid_line = false;
        }
        print_event(&event, self.raw_mode);
        if is_delta {
            self.mid_line = true;
        } else if event.payload.is_terminal() {
            self.mid_line = false;
        }
    }
}
