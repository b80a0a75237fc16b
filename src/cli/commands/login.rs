//! Login command - password or one-time code sign-in

use crate::cli::args::LoginArgs;
use crate::context::AppContext;
use crate::error::TriplogResult;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the login command
pub async fn execute(args: LoginArgs, app: &AppContext) -> TriplogResult<()> {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "Triplog sign-in");

    let email = match args.email {
        Some(email) => email,
        None => ui::input(&ctx, "Email", "driver@example.com").await?,
    };

    let mut spinner = TaskSpinner::new(&ctx);
    let user = if args.otp {
        let code = match args.code {
            Some(code) => code,
            None => {
                spinner.start("Sending code...");
                if let Err(e) = app.manager().send_otp(&email).await {
                    spinner.stop_error("Could not send code");
                    return Err(e);
                }
                spinner.stop(&format!("Code sent to {}", email));
                ui::input(&ctx, "Code", "123456").await?
            }
        };
        spinner.start("Verifying code...");
        app.manager().verify_otp(&email, code.trim()).await
    } else {
        let password = match args.password {
            Some(password) => password,
            None => ui::password(&ctx, "Password").await?,
        };
        spinner.start("Signing in...");
        app.manager().login_with_password(&email, &password).await
    };

    match user {
        Ok(user) => {
            spinner.stop("Signed in");
            let status = app.manager().is_logged_in().await;
            ui::key_value(&ctx, "User", &user.email);
            ui::key_value(&ctx, "Expires", &format_expiry(status.expire_at));
            ui::outro_success(&ctx, "Session stored");
            Ok(())
        }
        Err(e) => {
            spinner.stop_error("Sign-in failed");
            Err(e)
        }
    }
}

/// Local time of an epoch expiry, `-` when signed out
pub(crate) fn format_expiry(expire_at: i64) -> String {
    if expire_at < 0 {
        return "-".to_string();
    }
    chrono::DateTime::from_timestamp(expire_at, 0)
        .map(|at| {
            at.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| expire_at.to_string())
}
