//! Terminal output and prompts
//!
//! Uses `cliclack` for prompts and spinners on a real terminal, with plain
//! output in CI and when stdout is piped.
//!
//! # Example
//!
//! ```rust,ignore
//! use triplog::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect();
//! let email = ui::input(&ctx, "Email", "driver@example.com").await?;
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Signing in...");
//! // ...
//! spinner.stop("Signed in");
//! ```

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_success, remark, section, step_info, step_ok,
    step_ok_detail, step_warn_hint,
};
pub use progress::TaskSpinner;
pub use prompts::{confirm, input, password};
pub use theme::{init_theme, TriplogTheme};
