use super::*;

#[test]
fn timeouts_default_to_config_values() {
    let cli = Cli::try_parse_from(["sessionkit-cli", "whoami"]).unwrap();
    assert_eq!(cli.request_timeout_secs, sessionkit::config::DEFAULT_REQUEST_TIMEOUT_SECS);
    assert_eq!(cli.connect_timeout_secs, sessionkit::config::DEFAULT_CONNECT_TIMEOUT_SECS);
}

#[test]
fn zero_timeouts_are_rejected() {
    assert!(Cli::try_parse_from(["sessionkit-cli", "--request-timeout-secs", "0", "whoami"]).is_err());
    assert!(Cli::try_parse_from(["sessionkit-cli", "--connect-timeout-secs", "0", "whoami"]).is_err());
}

#[test]
fn positive_timeouts_are_accepted() {
    let cli = Cli::try_parse_from(["sessionkit-cli", "--request-timeout-secs", "5", "guard", "/boards"]).unwrap();
    assert_eq!(cli.request_timeout_secs, 5);
    assert!(matches!(cli.command, Command::Guard { path } if path == "/boards"));
}
