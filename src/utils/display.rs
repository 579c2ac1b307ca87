//! Terminal rendering for stories and sessions

use crate::error::ErrorKind;
use colored::*;

fn underline(title: &str) -> String {
    "=".repeat(title.chars().count())
}

fn part_heading(index: usize, total: usize) -> String {
    format!("Part {}/{}", index, total)
}

/// Title line followed by every part in order
pub fn print_story(title: &str, parts: &[String]) {
    println!("\n{}", title.bright_cyan().bold());
    println!("{}", underline(title).bright_cyan());

    for (i, part) in parts.iter().enumerate() {
        println!("\n{}", part_heading(i + 1, parts.len()).yellow().bold());
        println!("{}", part);
    }
}

pub fn print_saved(message: &str, session_token: &str) {
    println!("\n{} {}", message.green(), format!("(session {})", session_token).dimmed());
}

pub fn print_failure(kind: ErrorKind, message: &str) {
    eprintln!("{} {}", format!("[{}]", kind).red().bold(), message.red());
}

/// `label: value` line used by progress and health output
pub fn print_status(label: &str, value: &str) {
    println!("{} {}", format!("{}:", label).blue(), value);
}

pub fn print_sessions(sessions: &[String]) {
    if sessions.is_empty() {
        print_status("Stories", "none stored yet");
        return;
    }

    let title = format!("{} stored stories", sessions.len());
    println!("\n{}", title.bright_cyan().bold());
    println!("{}", underline(&title).bright_cyan());
    for session in sessions {
        println!("  {}", session);
    }
}
