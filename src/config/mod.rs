pub use cliprelay_core::config::*;

use anyhow::{Context, Result};
use cliprelay_core::SEGMENT_ID_LEN;
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = Config::from_toml(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    for warning in config.validate() {
        tracing::warn!("{warning}");
    }

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./cliprelay.toml",
        "~/.config/cliprelay/config.toml",
        "/etc/cliprelay/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Reject configurations the relay cannot run with.
pub fn validate_config(config: &Config) -> Result<()> {
    let producer = &config.producer;
    let consumer = &config.consumer;

    if producer.segment_duration_ms == 0 {
        anyhow::bail!("producer.segment_duration_ms cannot be 0");
    }

    if producer.source == CaptureSourceKind::Command && producer.command.is_none() {
        anyhow::bail!("producer.source is 'command' but no producer.command is set");
    }

    if consumer.max_response_bytes < SEGMENT_ID_LEN {
        anyhow::bail!(
            "consumer.max_response_bytes must be at least {SEGMENT_ID_LEN} (the segment id length)"
        );
    }

    if consumer.read_idle_ms == 0 {
        anyhow::bail!("consumer.read_idle_ms cannot be 0");
    }

    if consumer.buffer_poll_ms == 0 {
        anyhow::bail!("consumer.buffer_poll_ms cannot be 0");
    }

    if consumer.reconnect_max_ms == 0 {
        anyhow::bail!("consumer.reconnect_max_ms cannot be 0");
    }

    if consumer.sink == SinkKind::Command && consumer.player_command.is_none() {
        anyhow::bail!("consumer.sink is 'command' but no consumer.player_command is set");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_valid_file() {
        let file = write_config(
            r#"
            [producer]
            port = 14000
            device = "USB Camera"

            [consumer]
            server = "10.0.0.5:14000"
            "#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.producer.port, 14000);
        assert_eq!(config.producer.device.as_deref(), Some("USB Camera"));
        assert_eq!(config.consumer.server, "10.0.0.5:14000");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_config(Path::new("/nonexistent/cliprelay.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn parse_error_has_context() {
        let file = write_config("[producer\nport = ");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn rejects_cap_below_id_length() {
        let file = write_config("[consumer]\nmax_response_bytes = 8\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("max_response_bytes"));
    }

    #[test]
    fn rejects_zero_segment_duration() {
        let file = write_config("[producer]\nsegment_duration_ms = 0\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn rejects_command_sink_without_player() {
        let file = write_config("[consumer]\nsink = \"command\"\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("player_command"));
    }

    #[test]
    fn explicit_path_wins_over_defaults() {
        let file = write_config("[producer]\nport = 15000\n");
        let config = load_config_or_default(Some(file.path())).unwrap();
        assert_eq!(config.producer.port, 15000);
    }

    #[test]
    fn default_config_passes_hard_checks() {
        validate_config(&Config::default()).unwrap();
    }
}
