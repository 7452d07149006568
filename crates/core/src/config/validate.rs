use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Every engine timeout is non-zero
/// - The OnlyOffice server URL is an http(s) URL
/// - The event channel has room for at least one event
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let engines = &config.engines;
    let timeouts = [
        ("engines.ffmpeg.timeout_secs", engines.ffmpeg.timeout_secs),
        (
            "engines.libreoffice.timeout_secs",
            engines.libreoffice.timeout_secs,
        ),
        (
            "engines.onlyoffice.timeout_secs",
            engines.onlyoffice.timeout_secs,
        ),
        (
            "engines.onlyoffice.health_timeout_secs",
            engines.onlyoffice.health_timeout_secs,
        ),
        ("engines.library.timeout_secs", engines.library.timeout_secs),
        ("engines.image.timeout_secs", engines.image.timeout_secs),
    ];
    for (key, value) in timeouts {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!("{} cannot be 0", key)));
        }
    }

    // OnlyOffice validation
    let url = reqwest::Url::parse(&engines.onlyoffice.server_url).map_err(|e| {
        ConfigError::ValidationError(format!(
            "engines.onlyoffice.server_url is not a valid URL: {}",
            e
        ))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::ValidationError(format!(
            "engines.onlyoffice.server_url must use http or https, got {}",
            url.scheme()
        )));
    }

    if config.orchestrator.event_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.event_capacity cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let mut config = Config::default();
        config.engines.libreoffice.timeout_secs = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("engines.libreoffice.timeout_secs"));
    }

    #[test]
    fn test_validate_malformed_server_url_fails() {
        let mut config = Config::default();
        config.engines.onlyoffice.server_url = "not a url".to_string();
        assert!(validate_config(&config).is_err());

        config.engines.onlyoffice.server_url = "ftp://office.local".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn test_validate_zero_event_capacity_fails() {
        let mut config = Config::default();
        config.orchestrator.event_capacity = 0;
        assert!(validate_config(&config).is_err());
    }
}
