//! Output functions for consistent CLI formatting
//!
//! Everything here writes to stderr.

use super::context::UiContext;
use console::style;

/// Display a success step
pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        eprintln!("{} {}", style("✔").green(), message);
    } else {
        eprintln!("[OK] {}", message);
    }
}

/// Display a success step with detail
pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    if ctx.use_fancy_output() {
        eprintln!("{} {} ({})", style("✔").green(), message, style(detail).dim());
    } else {
        eprintln!("[OK] {} ({})", message, detail);
    }
}

/// Display a warning step with hint
pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    if ctx.use_fancy_output() {
        eprintln!("{} {} - {}", style("▲").yellow(), message, style(hint).dim());
    } else {
        eprintln!("[WARN] {} - {}", message, hint);
    }
}

/// Display an info step
pub fn step_info(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        eprintln!("{} {}", style("●").cyan(), message);
    } else {
        eprintln!("[INFO] {}", message);
    }
}

/// `(001/003) name status`
pub fn progress_line(index: usize, total: usize, name: &str, status: &str) -> String {
    let width = total.to_string().len().max(3);
    format!("({:0width$}/{:0width$}) {} {}", index, total, name, status, width = width)
}

/// Display one per-file progress line
pub fn progress(ctx: &UiContext, index: usize, total: usize, name: &str, status: &str) {
    let line = progress_line(index, total, name, status);
    if ctx.use_fancy_output() {
        eprintln!("{}", style(line).dim());
    } else {
        eprintln!("{}", line);
    }
}
