use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Display;
use std::time::Duration;

/// Environment switch for debug output and temp file retention.
pub const DEBUG_ENV: &str = "DEPS_DEBUG";

pub fn is_debug() -> bool {
    std::env::var(DEBUG_ENV).is_ok_and(|v| !v.is_empty() && v != "0")
}

pub fn event(message: impl Display) {
    println!("{}", message.to_string().cyan());
}

pub fn success(message: impl Display) {
    println!("{}", format!("✓ {message}").green());
}

pub fn warning(message: impl Display) {
    println!("{}", format!("⚠ {message}").yellow());
}

pub fn error(message: impl Display) {
    eprintln!("{} {}", "Error:".red().bold(), message);
}

pub fn debug(message: impl Display) {
    if is_debug() {
        eprintln!("{}", format!("[DEBUG] {message}").dimmed());
    }
}

/// Blocks for `duration` while showing a spinner.
pub fn wait_with_spinner(message: &str, duration: Duration) {
    if duration.is_zero() {
        return;
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    std::thread::sleep(duration);
    spinner.finish_and_clear();
}
