use std::fs;
use std::path::Path;

use super::NodeConfig;
use crate::error::{Error, Result};

pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<NodeConfig> {
    let text = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read config file: {e}")))?;
    let cfg: NodeConfig =
        toml::from_str(&text).map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;

    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &NodeConfig) -> Result<()> {
    if cfg.name.is_empty() {
        return Err(Error::Config("node name must not be empty".into()));
    }
    if !cfg.name.contains('@') {
        return Err(Error::Config(format!(
            "node name {:?} must be of the form name@host",
            cfg.name
        )));
    }
    if cfg.cookie.is_empty() {
        return Err(Error::Config("cookie must not be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_a_valid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"name = "client@127.0.0.1""#).unwrap();
        writeln!(file, r#"cookie = "secret""#).unwrap();

        let cfg = load_from_path(file.path()).unwrap();
        assert_eq!(cfg.name, "client@127.0.0.1");
        assert_eq!(cfg.cookie, "secret");
    }

    #[test]
    fn rejects_a_name_without_host_part() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"name = "client""#).unwrap();
        writeln!(file, r#"cookie = "secret""#).unwrap();

        assert!(load_from_path(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        assert!(matches!(
            load_from_path("/nonexistent/path.toml"),
            Err(Error::Config(_))
        ));
    }
}
