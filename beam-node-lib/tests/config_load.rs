use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use beam_node_lib::load_from_path;

fn tmp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_nanos();
    std::env::temp_dir().join(format!("beam-node-{nanos}-{name}.toml"))
}

#[test]
fn loads_minimal_config() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let path = tmp_path("minimal");
    let toml = r#"
name = "client@127.0.0.1"
cookie = "secret"
"#;
    fs::write(&path, toml)?;

    let cfg = load_from_path(&path)?;
    assert_eq!(cfg.name, "client@127.0.0.1");
    assert_eq!(cfg.connect_timeout_ms, 5_000);
    assert_eq!(cfg.subscriber_capacity, 256);
    Ok(())
}

#[test]
fn loads_overridden_timeouts_and_capacity() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let path = tmp_path("overrides");
    let toml = r#"
name = "client@127.0.0.1"
cookie = "secret"
connect_timeout_ms = 1500
subscriber_capacity = 32
"#;
    fs::write(&path, toml)?;

    let cfg = load_from_path(&path)?;
    assert_eq!(cfg.connect_timeout_ms, 1500);
    assert_eq!(cfg.subscriber_capacity, 32);
    Ok(())
}

#[test]
fn rejects_a_name_without_host_part() {
    let path = tmp_path("bad-name");
    fs::write(&path, "name = \"client\"\ncookie = \"secret\"\n").ok();
    assert!(load_from_path(&path).is_err());
}
