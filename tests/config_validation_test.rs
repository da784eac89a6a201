//! Configuration validation tests
//!
//! Tests that verify configuration defaults, parsing and validation.

use redfish_exporter::config::{Config, OverlapMode, ScrapeConfig, ServerConfig};
use redfish_exporter::error::ExporterError;
use redfish_exporter::target::AuthMode;
use secrecy::ExposeSecret;
use std::time::Duration;

fn parse(toml: &str) -> Config {
    config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()
        .expect("build")
        .try_deserialize()
        .expect("deserialize")
}

const VALID: &str = r#"
[scrape]
timeout_seconds = 20
overlap = "cached"

[credentials.lab]
username = "admin"
password = "secret"

[credentials.legacy]
username = "root"
password = "calvin"
auth = "basic"

[[targets]]
address = "10.0.0.10"
credential = "lab"

[[targets]]
address = "https://10.0.0.11"
credential = "legacy"
timeout_seconds = 5
verify_tls = false
"#;

#[test]
fn test_default_server_config() {
    // Given: ServerConfig with default values
    let config = ServerConfig::default();

    // Then: Should listen on all interfaces on the exporter port
    assert_eq!(config.addr, "0.0.0.0");
    assert_eq!(config.port, 9610);
    assert_eq!(config.shutdown_grace_seconds, 5);
}

#[test]
fn test_default_scrape_config() {
    // Given: ScrapeConfig with default values
    let config = ScrapeConfig::default();

    // Then: Defaults reach drives and join overlapping polls
    assert_eq!(config.timeout_seconds, 30);
    assert_eq!(config.max_concurrency, 16);
    assert_eq!(config.request_timeout_seconds, 10);
    assert_eq!(config.max_depth, 5);
    assert_eq!(config.fetch_parallelism, 4);
    assert_eq!(config.session_ttl_seconds, 1800);
    assert_eq!(config.overlap, OverlapMode::Wait);
}

#[test]
fn test_valid_config_resolves_targets() {
    // Given: A configuration with two targets sharing nothing
    let config = parse(VALID);

    // When: Validating and resolving targets
    config.validate().expect("valid");
    let targets = config.targets().expect("targets");

    // Then: Credentials and per-target settings are resolved
    assert_eq!(config.scrape.timeout_seconds, 20);
    assert_eq!(config.scrape.overlap, OverlapMode::Cached);
    assert_eq!(targets.len(), 2);

    assert_eq!(targets[0].address, "10.0.0.10");
    assert_eq!(targets[0].credential.auth, AuthMode::Session);
    assert_eq!(targets[0].credential.password.expose_secret(), "secret");
    assert!(targets[0].verify_tls);
    assert_eq!(targets[0].timeout, None);

    assert_eq!(targets[1].credential.auth, AuthMode::Basic);
    assert_eq!(targets[1].timeout, Some(Duration::from_secs(5)));
    assert!(!targets[1].verify_tls);
}

#[test]
fn test_empty_config_is_valid() {
    // Given: No configuration at all
    let config = parse("");

    // Then: Defaults apply and there are no targets
    config.validate().expect("valid");
    assert!(config.targets().unwrap().is_empty());
    assert_eq!(config.server.port, 9610);
}

#[test]
fn test_unknown_credential_is_rejected() {
    // Given: A target referencing an undeclared credential
    let config = parse(
        r#"
[[targets]]
address = "10.0.0.10"
credential = "nope"
"#,
    );

    // When: Validating
    let err = config.validate().unwrap_err();

    // Then: The error names the credential
    assert!(matches!(err, ExporterError::Config(_)));
    assert!(err.to_string().contains("nope"));
}

#[test]
fn test_duplicate_address_is_rejected() {
    // Given: The same BMC listed twice
    let config = parse(
        r#"
[credentials.lab]
username = "admin"
password = "secret"

[[targets]]
address = "10.0.0.10"
credential = "lab"

[[targets]]
address = "10.0.0.10"
credential = "lab"
"#,
    );

    // Then: Validation fails
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("duplicate target address"));
}

#[test]
fn test_zero_limits_are_rejected() {
    for (key, value) in [
        ("timeout_seconds", 0),
        ("request_timeout_seconds", 0),
        ("max_concurrency", 0),
        ("fetch_parallelism", 0),
        ("max_depth", 0),
    ] {
        // Given: One scrape limit set to zero
        let config = parse(&format!("[scrape]\n{} = {}\n", key, value));

        // Then: Validation fails
        assert!(config.validate().is_err(), "{key} = 0 accepted");
    }
}

#[test]
fn test_zero_target_timeout_is_rejected() {
    // Given: A target with a zero timeout
    let config = parse(
        r#"
[credentials.lab]
username = "admin"
password = "secret"

[[targets]]
address = "10.0.0.10"
credential = "lab"
timeout_seconds = 0
"#,
    );

    // Then: Validation fails
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_auth_mode_fails_to_parse() {
    // Given: An unsupported auth mode
    let result = config::Config::builder()
        .add_source(config::File::from_str(
            "[credentials.lab]\nusername = \"a\"\npassword = \"b\"\nauth = \"kerberos\"\n",
            config::FileFormat::Toml,
        ))
        .build()
        .unwrap()
        .try_deserialize::<Config>();

    // Then: Deserialization rejects it
    assert!(result.is_err());
}

#[test]
fn test_target_labels_are_resolved() {
    // Given: A target with operator labels
    let config = parse(
        r#"
[credentials.lab]
username = "admin"
password = "secret"

[[targets]]
address = "10.0.0.10"
credential = "lab"
labels = { name = "web-01", rack = "r12" }
"#,
    );

    // When: Validating and resolving
    config.validate().expect("valid");
    let targets = config.targets().expect("targets");

    // Then: The labels travel with the target
    assert_eq!(targets[0].labels.get("rack").map(String::as_str), Some("r12"));
    assert_eq!(targets[0].labels.get("name").map(String::as_str), Some("web-01"));
}

#[test]
fn test_reserved_or_invalid_target_labels_are_rejected() {
    for label in ["target", "chassis", "__meta", "bad-name"] {
        // Given: A target label clashing with exported labels or not a label name
        let config = parse(&format!(
            "[credentials.lab]\nusername = \"a\"\npassword = \"b\"\n\n[[targets]]\naddress = \"10.0.0.10\"\ncredential = \"lab\"\nlabels = {{ \"{}\" = \"x\" }}\n",
            label
        ));

        // Then: Validation fails naming the label
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains(label), "{label} accepted");
    }
}
