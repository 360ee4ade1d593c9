use std::io::Write;
use tempfile::NamedTempFile;
use tunestream::config::ServerConfig;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_sample_config() {
    let config = ServerConfig::from_file("tunestream.yaml");
    assert!(config.is_ok(), "Failed to load sample config: {:?}", config.err());

    let config = config.unwrap();
    assert_eq!(config.listen_address, "127.0.0.1:3000");
    assert_eq!(config.media_url_prefix, "/music/");
    assert_eq!(config.audio_max_age_secs, 31536000);
    assert!(config.shuffle_catalog);

    let preload = config.preload.expect("sample config has a preload section");
    assert_eq!(preload.capacity, 10);
    assert_eq!(preload.base_url, "http://127.0.0.1:3000");
}

#[test]
fn test_load_minimal_config() {
    let file = write_config(
        r#"
media_root: "/srv/music"
"#,
    );

    let config = ServerConfig::from_file(file.path()).unwrap();
    assert_eq!(config.media_root.to_str(), Some("/srv/music"));
    // Defaults are applied
    assert_eq!(config.listen_address, "127.0.0.1:3000");
    assert_eq!(config.static_max_age_secs, 3600);
    assert_eq!(config.catalog_max_age_secs, 300);
    assert!(config.metrics_enabled);
    assert!(config.preload.is_none());
    assert_eq!(config.preload_or_default().capacity, 10);
}

#[test]
fn test_load_invalid_prefix() {
    let file = write_config(
        r#"
media_url_prefix: "music"
"#,
    );
    assert!(ServerConfig::from_file(file.path()).is_err());
}

#[test]
fn test_load_invalid_address() {
    let file = write_config(
        r#"
listen_address: "not an address"
"#,
    );
    assert!(ServerConfig::from_file(file.path()).is_err());
}

#[test]
fn test_load_invalid_preload() {
    let file = write_config(
        r#"
preload:
  capacity: 0
"#,
    );
    assert!(ServerConfig::from_file(file.path()).is_err());
}

#[test]
fn test_load_malformed_yaml() {
    let file = write_config("listen_address: [unterminated");
    assert!(ServerConfig::from_file(file.path()).is_err());
}

#[test]
fn test_load_nonexistent_file() {
    let config = ServerConfig::from_file("nonexistent.yaml");
    assert!(config.is_err(), "Should fail when file doesn't exist");
}
