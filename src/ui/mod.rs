//! UI module for consistent CLI status output
//!
//! Colored output in interactive terminals, plain prefixed lines in
//! CI/non-interactive environments.
//!
//! # Example
//!
//! ```rust,ignore
//! use repro_fetch::ui::{self, UiContext};
//!
//! let ctx = UiContext::detect();
//! ui::progress(&ctx, 1, 3, "hello_2.10-2_amd64.deb", "cached");
//! ui::step_ok(&ctx, "3 file(s) ready");
//! ```

mod context;
mod output;

pub use context::UiContext;
pub use output::{progress, progress_line, step_info, step_ok, step_ok_detail, step_warn_hint};
