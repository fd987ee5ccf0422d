use fabkit_core::{DeploymentSystem, KnownHost};
use fabkit_settings::{Config, ConfigError, SettingsError};
use std::net::Ipv4Addr;
use std::path::PathBuf;

#[test]
fn test_toml_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config.connection.command_timeout_ms = 1500;
    config.discovery.max_parallel = 8;
    config.backup.output_directory = PathBuf::from("/srv/backups");
    config.network.known_hosts.push(KnownHost {
        ip: Ipv4Addr::new(192, 168, 30, 250),
        label: "Test bench".to_string(),
    });

    config.save_to_file(&path).unwrap();
    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_json_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    let config = Config::default();
    config.save_to_file(&path).unwrap();
    assert_eq!(Config::load_from_file(&path).unwrap(), config);
}

#[test]
fn test_partial_toml_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[connection]\nport = 12200\n\n[discovery]\nmax_parallel = 4\n",
    )
    .unwrap();

    let config = Config::load_from_file(&path).unwrap();
    assert_eq!(config.connection.port, 12200);
    assert_eq!(config.connection.command_timeout_ms, 3000);
    assert_eq!(config.discovery.max_parallel, 4);
    assert_eq!(
        config.network.role_ip(DeploymentSystem::Wmc, "Robot"),
        Some(Ipv4Addr::new(192, 168, 30, 20))
    );
    assert_eq!(config.session_config().port, 12200);
}

#[test]
fn test_network_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[[network.systems]]
system = "WMC"
subnet = "10.1.30.0/24"

[[network.systems.devices]]
role = "Robot"
ip = "10.1.30.20"
"#,
    )
    .unwrap();

    let config = Config::load_from_file(&path).unwrap();
    assert_eq!(config.network.systems.len(), 1);
    assert!(config.network.known_hosts.is_empty());
    assert_eq!(
        config.network.role_ip(DeploymentSystem::Wmc, "Robot"),
        Some(Ipv4Addr::new(10, 1, 30, 20))
    );
    assert_eq!(config.network.system_of(Ipv4Addr::new(10, 1, 30, 7)), DeploymentSystem::Wmc);
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[connection]\nport = 0\n").unwrap();

    let err = Config::load_from_file(&path).unwrap_err();
    assert!(matches!(
        err,
        SettingsError::Config(ConfigError::ValueOutOfRange { .. })
    ));
}

#[test]
fn test_malformed_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[connection\nport = ").unwrap();

    assert!(matches!(
        Config::load_from_file(&path).unwrap_err(),
        SettingsError::TomlDe(_)
    ));
}

#[test]
fn test_load_or_default_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_or_default(&dir.path().join("missing.toml")).unwrap();
    assert_eq!(config, Config::default());
}
