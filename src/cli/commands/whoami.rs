//! Whoami command - show the signed-in user

use crate::cli::args::{OutputFormat, WhoamiArgs};
use crate::context::AppContext;
use crate::error::TriplogResult;
use crate::ui::{self, UiContext};

/// Execute the whoami command
pub async fn execute(args: WhoamiArgs, app: &AppContext) -> TriplogResult<()> {
    let user = app.manager().current_user().await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&user)?),
        OutputFormat::Plain => println!("{}", user.email),
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            ui::key_value(&ctx, "Email", &user.email);
            ui::key_value(&ctx, "ID", &user.id);
            if let Some(ref name) = user.user_metadata.full_name {
                ui::key_value(&ctx, "Name", name);
            }
            if let Some(ref role) = user.user_metadata.user_role {
                ui::key_value(&ctx, "Role", role);
            }
        }
    }
    Ok(())
}
