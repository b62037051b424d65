//! Command-line behaviour that needs no network access.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Command isolated from any user configuration.
fn appboot(temp: &TempDir) -> Command {
    let config = temp.path().join("launch.toml");
    if !config.exists() {
        fs::write(&config, "").unwrap();
    }
    let mut cmd = Command::cargo_bin("appboot").unwrap();
    cmd.env_remove("APPBOOT_CONFIG_PATH")
        .env_remove("RUST_LOG")
        .env("APPBOOT_NO_PROGRESS", "1")
        .arg("--config")
        .arg(&config);
    cmd
}

#[test]
fn test_help() {
    let mut cmd = Command::cargo_bin("appboot").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--print-feed"))
        .stdout(predicate::str::contains("--channel"));
}

#[test]
fn test_print_feed_for_platform_and_channel() {
    let temp = TempDir::new().unwrap();
    appboot(&temp)
        .args(["--platform", "win/x86", "--channel", "beta", "--print-feed"])
        .assert()
        .success()
        .stdout("https://feeds.dblsqd.com/MKMMR7HNSP65PquQQbiDIw/public-test-build/win/x86\n");
}

#[test]
fn test_print_feed_unknown_platform_exits_with_feed_code() {
    let temp = TempDir::new().unwrap();
    appboot(&temp)
        .args(["--platform", "unknown", "--print-feed"])
        .assert()
        .code(2)
        .stdout("")
        .stderr(predicate::str::contains("No release feed available for platform 'unknown'"));
}

#[test]
fn test_print_feed_uses_configuration() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("launch.toml"),
        r#"
RELEASE_TYPE = "PTB"

[feed]
base_url = "https://feeds.example.com/acct"
"#,
    )
    .unwrap();

    appboot(&temp)
        .args(["--platform", "mac/arm", "--print-feed"])
        .assert()
        .success()
        .stdout("https://feeds.example.com/acct/public-test-build/mac/arm\n");

    // The command line wins over RELEASE_TYPE
    appboot(&temp)
        .args(["--platform", "mac/arm", "--channel", "stable", "--print-feed"])
        .assert()
        .success()
        .stdout("https://feeds.example.com/acct/release/mac/arm\n");
}

#[test]
fn test_invalid_configuration() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("launch.toml"), "RELEASE_TYPE = [").unwrap();

    appboot(&temp)
        .args(["--platform", "win/x86", "--print-feed"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid launch configuration"));
}

#[test]
fn test_invalid_channel_is_a_usage_error() {
    let temp = TempDir::new().unwrap();
    appboot(&temp)
        .args(["--channel", "nightly", "--print-feed"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown release channel"));
}

#[test]
fn test_feed_transport_failure_exits_with_feed_code() {
    let temp = TempDir::new().unwrap();
    // The client rejects the scheme before opening any connection
    fs::write(
        temp.path().join("launch.toml"),
        format!(
            "download_dir = {:?}\n\n[feed]\nbase_url = \"unsupported://feeds.invalid/\"\n\n[network]\ntimeout_secs = 5\n",
            temp.path().join("downloads").display().to_string()
        ),
    )
    .unwrap();

    appboot(&temp)
        .args(["--platform", "win/x86_64", "-q"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to fetch release feed"));
    assert!(!temp.path().join("downloads").exists());
}
