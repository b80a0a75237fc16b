//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{TriplogError, TriplogResult};
use crate::ui::{self, UiContext};

const VALID_KEYS: &[&str] = &[
    "general.verbose",
    "general.log_format",
    "general.audit_log",
    "api.base_url",
    "api.api_key",
    "api.timeout_secs",
    "auth.refresh_threshold_secs",
    "cache.enabled",
];

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    manager: &ConfigManager,
    config: &Config,
) -> TriplogResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config),
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => {
            // Env overrides stay out of the file
            let stored = if manager.path().exists() {
                manager.load_from_file(manager.path()).await?
            } else {
                Config::default()
            };
            let updated = set_value(stored, &key, &value)?;
            manager.save(&updated).await?;
            ui::step_ok(
                &UiContext::detect(),
                &format!("Set {} = {}", key, display_value(&key, &value)),
            );
        }
    }

    Ok(())
}

fn show_config(config: &Config) {
    let mut redacted = config.clone();
    if !redacted.api.api_key.is_empty() {
        redacted.api.api_key = "***".to_string();
    }
    let toml = toml::to_string_pretty(&redacted)
        .unwrap_or_else(|_| "Error serializing config".to_string());
    println!("{}", toml);
}

async fn init_config(manager: &ConfigManager, force: bool) -> TriplogResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

/// Apply a dot-separated key to a config
fn set_value(mut config: Config, key: &str, value: &str) -> TriplogResult<Config> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "verbose"] => config.general.verbose = parse_bool(value)?,
        ["general", "log_format"] => config.general.log_format = parse_log_format(value)?,
        ["general", "audit_log"] => config.general.audit_log = parse_bool(value)?,

        ["api", "base_url"] => config.api.base_url = value.trim_end_matches('/').to_string(),
        ["api", "api_key"] => config.api.api_key = value.to_string(),
        ["api", "timeout_secs"] => config.api.timeout_secs = parse_number(value)?,

        ["auth", "refresh_threshold_secs"] => {
            config.auth.refresh_threshold_secs = parse_number(value)?
        }

        ["cache", "enabled"] => config.cache.enabled = parse_bool(value)?,

        _ => {
            return Err(TriplogError::User(format!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                VALID_KEYS.join(", ")
            )))
        }
    }

    Ok(config)
}

fn display_value<'a>(key: &str, value: &'a str) -> &'a str {
    if key == "api.api_key" {
        "***"
    } else {
        value
    }
}

fn parse_bool(value: &str) -> TriplogResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(TriplogError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_log_format(value: &str) -> TriplogResult<String> {
    match value {
        "text" | "json" => Ok(value.to_string()),
        _ => Err(TriplogError::User(format!(
            "Invalid log format: {}. Use text/json",
            value
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> TriplogResult<T> {
    value
        .parse()
        .map_err(|_| TriplogError::User(format!("Invalid number: {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_known_keys() {
        let config = set_value(Config::default(), "api.base_url", "https://x.example/").unwrap();
        assert_eq!(config.api.base_url, "https://x.example");

        let config = set_value(config, "auth.refresh_threshold_secs", "120").unwrap();
        assert_eq!(config.auth.refresh_threshold_secs, 120);

        let config = set_value(config, "cache.enabled", "no").unwrap();
        assert!(!config.cache.enabled);
    }

    #[test]
    fn rejects_unknown_key_and_bad_values() {
        let err = set_value(Config::default(), "vm.name", "x").unwrap_err();
        assert!(err.to_string().contains("api.base_url"));

        assert!(set_value(Config::default(), "api.timeout_secs", "soon").is_err());
        assert!(set_value(Config::default(), "general.log_format", "xml").is_err());
        assert!(set_value(Config::default(), "general.audit_log", "maybe").is_err());
    }

    #[test]
    fn api_key_is_masked() {
        assert_eq!(display_value("api.api_key", "secret"), "***");
        assert_eq!(display_value("api.base_url", "https://x"), "https://x");
    }
}
