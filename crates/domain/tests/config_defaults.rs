use cr_domain::config::{Config, ConfigSeverity, EngineKind};

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 4000);
}

#[test]
fn default_webhook_targets_local_backend() {
    let config = Config::default();
    assert_eq!(config.webhook.base_url, "http://localhost:3000");
    assert_eq!(config.webhook.workers, 4);
}

#[test]
fn explicit_server_section_parses() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 8080
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
    // Unconfigured sections still get defaults.
    assert_eq!(config.pairing.wait_timeout_ms, 60_000);
}

#[test]
fn default_cors_allows_only_localhost() {
    let config = Config::default();
    assert!(config
        .server
        .cors
        .allowed_origins
        .contains(&"http://localhost:*".to_string()));
    assert!(config
        .server
        .cors
        .allowed_origins
        .contains(&"http://127.0.0.1:*".to_string()));
}

#[test]
fn engine_driver_parses() {
    let toml_str = r#"
[engine]
driver = "loopback"
auto_pair = true
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.engine.driver, EngineKind::Loopback);
    assert!(config.engine.auto_pair);
}

#[test]
fn default_config_validates_clean() {
    let issues = Config::default().validate();
    assert!(
        !issues.iter().any(|i| i.severity == ConfigSeverity::Error),
        "default config should have no errors: {issues:?}"
    );
}

#[test]
fn bad_webhook_url_is_an_error() {
    let toml_str = r#"
[webhook]
base_url = "not a url"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let issues = config.validate();
    assert!(issues.iter().any(|i| i.severity == ConfigSeverity::Error));
}

#[test]
fn zero_workers_is_an_error() {
    let toml_str = r#"
[webhook]
workers = 0
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert!(config
        .validate()
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error));
}

#[test]
fn wildcard_all_interfaces_host_warns() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert!(config
        .validate()
        .iter()
        .any(|i| i.severity == ConfigSeverity::Warning));
}
