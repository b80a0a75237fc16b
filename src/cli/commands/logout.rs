//! Logout command

use crate::context::AppContext;
use crate::error::TriplogResult;
use crate::ui::{self, UiContext};

/// Execute the logout command. Always succeeds locally.
pub async fn execute(app: &AppContext) -> TriplogResult<()> {
    let ctx = UiContext::detect();
    let was_signed_in = app.manager().is_logged_in().await.signed_in;

    app.manager().logout().await;

    if was_signed_in {
        ui::step_ok(&ctx, "Signed out");
    } else {
        ui::step_info(&ctx, "No active session; local state cleared");
    }
    Ok(())
}
