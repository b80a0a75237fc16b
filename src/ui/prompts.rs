//! Interactive prompts with non-interactive fallback
//!
//! `cliclack` blocks on the terminal, so every prompt runs on the blocking
//! pool.

use super::context::UiContext;
use crate::error::{TriplogError, TriplogResult};

async fn blocking<T, F>(what: &str, prompt: F) -> TriplogResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> std::io::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(prompt)
        .await
        .map_err(|e| TriplogError::User(format!("{} task failed: {}", what, e)))?
        .map_err(|e| TriplogError::User(format!("{} failed: {}", what, e)))
}

/// Prompt for confirmation, returns default if non-interactive or auto-yes
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> TriplogResult<bool> {
    if ctx.auto_yes() {
        println!("  {} (auto-approved)", message);
        return Ok(true);
    }

    if !ctx.is_interactive() {
        return Ok(default);
    }

    let message = message.to_string();
    blocking("Prompt", move || {
        cliclack::confirm(&message).initial_value(default).interact()
    })
    .await
}

/// Prompt for a line of text. Fails when there is no terminal to ask.
pub async fn input(ctx: &UiContext, message: &str, placeholder: &str) -> TriplogResult<String> {
    if !ctx.is_interactive() {
        return Err(TriplogError::User(format!(
            "{} is required in non-interactive mode",
            message
        )));
    }

    let message = message.to_string();
    let placeholder = placeholder.to_string();
    blocking("Input", move || {
        cliclack::input(&message)
            .placeholder(&placeholder)
            .validate(|value: &String| {
                if value.trim().is_empty() {
                    Err("Value is required")
                } else {
                    Ok(())
                }
            })
            .interact()
    })
    .await
}

/// Prompt for a secret without echo
pub async fn password(ctx: &UiContext, message: &str) -> TriplogResult<String> {
    if !ctx.is_interactive() {
        return Err(TriplogError::User(format!(
            "{} is required in non-interactive mode",
            message
        )));
    }

    let message = message.to_string();
    blocking("Password", move || {
        cliclack::password(&message).mask('▪').interact()
    })
    .await
}
