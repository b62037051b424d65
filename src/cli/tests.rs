use super::*;

#[test]
fn test_parse_defaults() {
    let cli = Cli::try_parse_from(["appboot"]).unwrap();
    assert!(!cli.verbose);
    assert!(!cli.quiet);
    assert!(!cli.print_feed);
    assert_eq!(cli.channel, None);
    assert_eq!(cli.platform, None);

    let config = cli.build_config();
    assert_eq!(config.log_level, "info");
    assert!(!config.no_progress);
    assert_eq!(config.config_path, None);
}

#[test]
fn test_parse_channel_and_platform() {
    let cli = Cli::try_parse_from(["appboot", "--channel", "beta", "--platform", "mac/arm", "--print-feed"])
        .unwrap();
    assert_eq!(cli.channel, Some(ReleaseChannel::Beta));
    assert_eq!(cli.platform, Some(PlatformKey::MacArm));
    assert!(cli.print_feed);

    let cli = Cli::try_parse_from(["appboot", "--platform", "unknown"]).unwrap();
    assert_eq!(cli.platform, Some(PlatformKey::Unknown));
}

#[test]
fn test_parse_rejects_bad_values() {
    assert!(Cli::try_parse_from(["appboot", "--channel", "nightly"]).is_err());
    assert!(Cli::try_parse_from(["appboot", "--platform", "beos/x86"]).is_err());
}

#[test]
fn test_verbose_conflicts_with_quiet() {
    assert!(Cli::try_parse_from(["appboot", "-v", "-q"]).is_err());
}

#[test]
fn test_build_config_levels() {
    let verbose = Cli::try_parse_from(["appboot", "--verbose"]).unwrap().build_config();
    assert_eq!(verbose.log_level, "debug");

    let quiet = Cli::try_parse_from(["appboot", "--quiet"]).unwrap().build_config();
    assert_eq!(quiet.log_level, "error");
    assert!(quiet.no_progress);

    let config = Cli::try_parse_from(["appboot", "--no-progress", "-c", "/etc/appboot/launch.toml"])
        .unwrap()
        .build_config();
    assert!(config.no_progress);
    assert_eq!(config.config_path, Some(PathBuf::from("/etc/appboot/launch.toml")));
}

#[tokio::test]
async fn test_print_feed_unknown_platform() {
    let temp = tempfile::TempDir::new().unwrap();
    let config_path = temp.path().join("launch.toml");
    std::fs::write(&config_path, "").unwrap();

    let cli = Cli::try_parse_from(["appboot", "--platform", "unknown", "--print-feed"]).unwrap();
    let config = CliConfig {
        config_path: Some(config_path),
        ..cli.build_config()
    };
    let err = cli.execute_with_config(config).await.unwrap_err();

    assert_eq!(
        err.downcast_ref::<BootstrapError>(),
        Some(&BootstrapError::NoFeedForPlatform {
            platform: "unknown".to_string()
        })
    );
}
