//! Status command - answer "is the user signed in"

use super::login::format_expiry;
use crate::cli::args::StatusArgs;
use crate::context::AppContext;
use crate::error::TriplogResult;
use crate::ui::{self, UiContext};

/// Execute the status command
pub async fn execute(args: StatusArgs, app: &AppContext) -> TriplogResult<()> {
    let status = app.manager().is_logged_in().await;

    if args.json {
        println!("{}", serde_json::to_string(&status)?);
        return Ok(());
    }

    let ctx = UiContext::detect();
    ui::section(&ctx, "Session");
    ui::key_value_status(
        &ctx,
        "Signed in",
        if status.signed_in { "yes" } else { "no" },
        status.signed_in,
    );
    ui::key_value(&ctx, "Expires", &format_expiry(status.expire_at));
    if let Some(user) = app.tokens().user().filter(|_| status.signed_in) {
        ui::key_value(&ctx, "User", &user.email);
    }
    if !status.signed_in {
        ui::remark(&ctx, "Run: triplog login");
    }
    Ok(())
}
