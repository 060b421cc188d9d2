use std::env;
use std::fs;
use std::io::Write;

use tempfile::NamedTempFile;
use theoriq::{ConfigError, TheoriqConfig};

const AGENT_KEY: &str = "1f1e1d1c1b1a191817161514131211100f0e0d0c0b0a09080706050403020100";

#[test]
fn test_builder_defaults() {
    let config = TheoriqConfig::builder()
        .base_url("https://theoriq.example.com")
        .build()
        .unwrap();

    assert_eq!(config.base_url, "https://theoriq.example.com");
    assert_eq!(config.timeout_secs, 10);
    assert_eq!(config.renew_margin_secs, 300);
    assert!(config.issuer_public_key.is_none());
    assert!(config.agent_private_key.is_none());
    assert!(config.api_key.is_none());
}

#[test]
fn test_config_validation() {
    match TheoriqConfig::builder().build() {
        Err(ConfigError::MissingBaseUrl) => {}
        other => panic!("Expected MissingBaseUrl error, got {:?}", other),
    }

    match TheoriqConfig::builder().base_url("theoriq.example.com").build() {
        Err(ConfigError::InvalidBaseUrl(url)) => assert_eq!(url, "theoriq.example.com"),
        other => panic!("Expected InvalidBaseUrl error, got {:?}", other),
    }

    match TheoriqConfig::builder()
        .base_url("https://theoriq.example.com")
        .timeout_secs(0)
        .build()
    {
        Err(ConfigError::InvalidTimeout) => {}
        other => panic!("Expected InvalidTimeout error, got {:?}", other),
    }

    match TheoriqConfig::builder()
        .base_url("https://theoriq.example.com")
        .renew_margin_secs(-1)
        .build()
    {
        Err(ConfigError::InvalidRenewMargin) => {}
        other => panic!("Expected InvalidRenewMargin error, got {:?}", other),
    }

    match TheoriqConfig::builder()
        .base_url("https://theoriq.example.com")
        .issuer_public_key("abcdef")
        .build()
    {
        Err(ConfigError::InvalidKey(_)) => {}
        other => panic!("Expected InvalidKey error, got {:?}", other),
    }

    match TheoriqConfig::builder()
        .base_url("https://theoriq.example.com")
        .agent_private_key("0x1234")
        .build()
    {
        Err(ConfigError::InvalidKey(_)) => {}
        other => panic!("Expected InvalidKey error, got {:?}", other),
    }

    let config = TheoriqConfig::builder()
        .base_url("https://theoriq.example.com")
        .issuer_public_key("ed25519/0123abcd")
        .agent_private_key(format!("0x{}", AGENT_KEY))
        .build()
        .unwrap();
    assert!(config.validate().is_ok());
}

#[test]
fn test_to_builder_keeps_fields() {
    let config = TheoriqConfig::builder()
        .base_url("https://theoriq.example.com")
        .api_key("tq-key")
        .timeout_secs(3)
        .build()
        .unwrap();

    let copy = config.to_builder().renew_margin_secs(60).build().unwrap();
    assert_eq!(copy.api_key.as_deref(), Some("tq-key"));
    assert_eq!(copy.timeout_secs, 3);
    assert_eq!(copy.renew_margin_secs, 60);
}

#[test]
fn test_endpoint() {
    let config = TheoriqConfig::builder()
        .base_url("https://theoriq.example.com/")
        .build()
        .unwrap();
    assert_eq!(
        config.endpoint("/api/v1alpha2/auth/biscuits/public-key"),
        "https://theoriq.example.com/api/v1alpha2/auth/biscuits/public-key"
    );
}

#[test]
fn test_config_from_json_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "base_url": "https://theoriq.example.com",
            "issuer_public_key": "ed25519/0123abcd",
            "agent_private_key": "{}",
            "timeout_secs": 5
        }}"#,
        AGENT_KEY
    )
    .unwrap();

    let config = TheoriqConfig::from_file(file.path()).unwrap();
    assert_eq!(config.base_url, "https://theoriq.example.com");
    assert_eq!(config.timeout_secs, 5);
    assert_eq!(config.renew_margin_secs, 300);
    assert_eq!(config.agent_private_key.as_deref(), Some(AGENT_KEY));
}

#[test]
fn test_config_from_invalid_json_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();
    match TheoriqConfig::from_file(file.path()) {
        Err(ConfigError::ParseError(_)) => {}
        other => panic!("Expected ParseError, got {:?}", other),
    }

    match TheoriqConfig::from_file("/nonexistent/theoriq.json") {
        Err(ConfigError::IOError(_)) => {}
        other => panic!("Expected IOError, got {:?}", other),
    }
}

#[cfg(feature = "toml")]
#[test]
fn test_config_from_toml_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
base_url = "https://theoriq.example.com"
api_key = "tq-key"
renew_margin_secs = 120
"#
    )
    .unwrap();

    let config = TheoriqConfig::from_toml(file.path()).unwrap();
    assert_eq!(config.api_key.as_deref(), Some("tq-key"));
    assert_eq!(config.renew_margin_secs, 120);
    assert_eq!(config.timeout_secs, 10);
}

// Built with `--no-default-features`, no crate in the stack turns toml back on.
#[cfg(not(feature = "toml"))]
#[test]
fn test_json_only_build_still_loads_files() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{ "base_url": "https://theoriq.example.com" }}"#).unwrap();
    let config = TheoriqConfig::from_file(file.path()).unwrap();
    assert_eq!(config.base_url, "https://theoriq.example.com");

    let mut file = NamedTempFile::new().unwrap();
    write!(file, "base_url = \"https://theoriq.example.com\"").unwrap();
    assert!(matches!(
        TheoriqConfig::from_file(file.path()),
        Err(ConfigError::ParseError(_))
    ));
}

// Each env test uses its own prefix so they can run in parallel.

#[test]
fn test_config_from_env() {
    env::set_var("TQ_ENV_TEST_BASE_URL", "https://theoriq.example.com");
    env::set_var("TQ_ENV_TEST_TIMEOUT_SECS", "7");
    env::set_var("TQ_ENV_TEST_API_KEY", "tq-env-key");

    let config = TheoriqConfig::from_env("TQ_ENV_TEST").unwrap();
    assert_eq!(config.base_url, "https://theoriq.example.com");
    assert_eq!(config.timeout_secs, 7);
    assert_eq!(config.api_key.as_deref(), Some("tq-env-key"));
    assert!(config.agent_private_key.is_none());
}

#[test]
fn test_config_from_env_missing_base_url() {
    env::remove_var("TQ_ENV_MISSING_BASE_URL");
    match TheoriqConfig::from_env("TQ_ENV_MISSING") {
        Err(ConfigError::EnvVarError(_)) => {}
        other => panic!("Expected EnvVarError, got {:?}", other),
    }
}

#[test]
fn test_config_from_env_invalid_timeout() {
    env::set_var("TQ_ENV_BAD_BASE_URL", "https://theoriq.example.com");
    env::set_var("TQ_ENV_BAD_TIMEOUT_SECS", "soon");
    match TheoriqConfig::from_env("TQ_ENV_BAD") {
        Err(ConfigError::InvalidTimeout) => {}
        other => panic!("Expected InvalidTimeout, got {:?}", other),
    }
}

#[test]
fn test_config_from_env_or_file() {
    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("agent_key");
    fs::write(&key_path, format!("{}\n", AGENT_KEY)).unwrap();

    env::set_var("TQ_FILE_TEST_BASE_URL", "https://theoriq.example.com");
    env::set_var("TQ_FILE_TEST_AGENT_PRIVATE_KEY_FILE", key_path.to_str().unwrap());

    let config = TheoriqConfig::from_env_or_file("TQ_FILE_TEST").unwrap();
    assert_eq!(config.agent_private_key.as_deref(), Some(AGENT_KEY));

    // plain from_env ignores the _FILE indirection
    let config = TheoriqConfig::from_env("TQ_FILE_TEST").unwrap();
    assert!(config.agent_private_key.is_none());
}

#[test]
fn test_config_from_env_or_file_missing_file() {
    env::set_var("TQ_NOFILE_TEST_BASE_URL", "https://theoriq.example.com");
    env::set_var("TQ_NOFILE_TEST_API_KEY_FILE", "/nonexistent/api_key");
    match TheoriqConfig::from_env_or_file("TQ_NOFILE_TEST") {
        Err(ConfigError::IOError(_)) => {}
        other => panic!("Expected IOError, got {:?}", other),
    }
}
