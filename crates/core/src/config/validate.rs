use super::{
    types::{Config, TranscriptionBackend},
    ConfigError,
};

/// Validate configuration.
///
/// Rejects settings that would only fail once a job runs: an empty worker
/// pool, an unusable render resolution, or a model routed to a backend
/// that is not configured.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.engine.workers == 0 {
        return Err(ConfigError::ValidationError(
            "engine.workers must be at least 1".to_string(),
        ));
    }

    if !(36..=600).contains(&config.tools.render_dpi) {
        return Err(ConfigError::ValidationError(format!(
            "tools.render_dpi must be between 36 and 600, got {}",
            config.tools.render_dpi
        )));
    }

    let configured = config.providers.configured();
    if !configured.contains(&config.providers.default.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "providers.default is '{}' but [providers.{}] is not configured",
            config.providers.default, config.providers.default
        )));
    }

    if config.models.transcription_backend == TranscriptionBackend::WhisperApi
        && config.providers.openai.is_none()
    {
        return Err(ConfigError::ValidationError(
            "models.transcription_backend = \"whisper_api\" requires [providers.openai]"
                .to_string(),
        ));
    }

    if let Some(limit) = config.limits.max_cost_per_job {
        if !limit.is_finite() || limit < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "limits.max_cost_per_job must be a non-negative amount, got {}",
                limit
            )));
        }
    }

    if config.study.language.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "study.language cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use tokio_test::assert_ok;

    fn valid() -> Config {
        load_config_from_str(
            r#"
[providers.openrouter]
api_key = "sk-or"

[providers.openai]
api_key = "sk"
"#,
        )
        .unwrap()
    }

    fn message(config: &Config) -> String {
        match validate_config(config) {
            Err(ConfigError::ValidationError(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert_ok!(validate_config(&valid()));
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = valid();
        config.server.port = 0;
        assert!(message(&config).contains("server.port"));
    }

    #[test]
    fn test_validate_zero_workers_fails() {
        let mut config = valid();
        config.engine.workers = 0;
        assert!(message(&config).contains("engine.workers"));
    }

    #[test]
    fn test_validate_render_dpi_range() {
        let mut config = valid();
        config.tools.render_dpi = 1200;
        assert!(message(&config).contains("render_dpi"));
        config.tools.render_dpi = 36;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_default_provider_must_be_configured() {
        let mut config = valid();
        config.providers.default = "ollama".to_string();
        assert!(message(&config).contains("[providers.ollama]"));
    }

    #[test]
    fn test_validate_whisper_requires_openai() {
        let mut config = valid();
        config.providers.openai = None;
        assert!(message(&config).contains("whisper_api"));

        config.models.transcription_backend = TranscriptionBackend::Chat;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_negative_cost_limit_fails() {
        let mut config = valid();
        config.limits.max_cost_per_job = Some(-1.0);
        assert!(message(&config).contains("max_cost_per_job"));
        config.limits.max_cost_per_job = Some(0.0);
        assert!(validate_config(&config).is_ok());
    }
}
