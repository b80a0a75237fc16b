//! Integration tests for Triplog

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    /// Nothing listens on the discard port
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    /// Binary isolated to a temp config file and state directory
    fn triplog(home: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("triplog");
        cmd.env("TRIPLOG_CONFIG", home.path().join("config.toml"))
            .env("TRIPLOG_STATE_DIR", home.path().join("state"))
            .env_remove("TRIPLOG_API_URL")
            .env_remove("TRIPLOG_API_KEY")
            .env_remove("TRIPLOG_PASSWORD");
        cmd
    }

    #[test]
    fn help_displays() {
        let home = TempDir::new().unwrap();
        triplog(&home)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("trip logging client"));
    }

    #[test]
    fn version_displays() {
        let home = TempDir::new().unwrap();
        triplog(&home)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("triplog"));
    }

    #[test]
    fn config_path() {
        let home = TempDir::new().unwrap();
        triplog(&home)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let home = TempDir::new().unwrap();
        triplog(&home)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[api]"))
            .stdout(predicate::str::contains("refresh_threshold_secs = 300"));
    }

    #[test]
    fn config_set_persists_and_masks_key() {
        let home = TempDir::new().unwrap();
        triplog(&home)
            .args(["config", "set", "api.api_key", "anon-key"])
            .assert()
            .success();
        triplog(&home)
            .args(["config", "set", "api.timeout_secs", "30"])
            .assert()
            .success();

        let stored = std::fs::read_to_string(home.path().join("config.toml")).unwrap();
        assert!(stored.contains("timeout_secs = 30"));
        assert!(stored.contains("anon-key"));

        triplog(&home)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("anon-key").not());
    }

    #[test]
    fn config_set_unknown_key_fails() {
        let home = TempDir::new().unwrap();
        triplog(&home)
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn status_when_signed_out() {
        let home = TempDir::new().unwrap();
        triplog(&home)
            .args(["status", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#"{"signedIn":false,"expireAt":-1}"#));

        triplog(&home)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Signed in: no"));
    }

    #[test]
    fn trips_require_login() {
        let home = TempDir::new().unwrap();
        triplog(&home)
            .args(["--api-url", UNREACHABLE, "trips", "2025-01-01", "2025-01-31"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Not authorized"))
            .stderr(predicate::str::contains("triplog login"));
    }

    #[test]
    fn whoami_requires_login() {
        let home = TempDir::new().unwrap();
        triplog(&home)
            .arg("whoami")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Not authorized"));
    }

    #[test]
    fn logout_when_signed_out_succeeds() {
        let home = TempDir::new().unwrap();
        triplog(&home)
            .arg("logout")
            .assert()
            .success()
            .stdout(predicate::str::contains("No active session"));
    }

    #[test]
    fn login_without_terminal_needs_email() {
        let home = TempDir::new().unwrap();
        triplog(&home)
            .args(["--api-url", UNREACHABLE, "login"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("non-interactive"));
    }

    #[test]
    fn login_against_unreachable_service_times_out() {
        let home = TempDir::new().unwrap();
        triplog(&home)
            .args([
                "--api-url",
                UNREACHABLE,
                "--api-key",
                "anon-key",
                "login",
                "--email",
                "driver@example.com",
                "--password",
                "secret",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Request timed out"))
            .stderr(predicate::str::contains("Network unstable"));

        triplog(&home)
            .args(["status", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""signedIn":false"#));
    }

    #[test]
    fn cache_bump_then_show() {
        let home = TempDir::new().unwrap();
        triplog(&home)
            .args(["cache", "bump", "trip_2025-01-01_2025-01-31"])
            .assert()
            .success()
            .stdout(predicate::str::contains("v2"));

        triplog(&home)
            .args(["cache", "show", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("trip_2025-01-01_2025-01-31\t2"));

        triplog(&home)
            .args(["cache", "reset"])
            .assert()
            .success();

        triplog(&home)
            .args(["cache", "show", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""trip_2025-01-01_2025-01-31": 1"#));
    }

    #[test]
    fn cache_clear_requires_confirmation() {
        let home = TempDir::new().unwrap();
        triplog(&home)
            .args(["cache", "bump", "trip_x"])
            .assert()
            .success();

        triplog(&home)
            .args(["cache", "clear"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Cache left untouched"));

        triplog(&home)
            .args(["cache", "clear", "--yes"])
            .assert()
            .success();

        triplog(&home)
            .args(["cache", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache domains recorded"));
    }

    #[test]
    fn trips_reject_bad_dates() {
        let home = TempDir::new().unwrap();
        triplog(&home)
            .args(["trips", "2025-02-30", "2025-03-01"])
            .assert()
            .failure();
    }
}
