//! Production configuration validation
//!
//! Security checks for production deployments.

use super::config::{AppConfig, SessionBackend};
use anyhow::Result;
use tracing::warn;

fn is_production() -> bool {
    super::loader::environment_name().to_lowercase() == "production"
}

/// Collect configuration problems that matter in production
pub fn production_warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.server.host == "0.0.0.0" {
        warnings.push(
            "Server is binding to all interfaces (0.0.0.0). \
             Consider binding to 127.0.0.1 and using a reverse proxy."
                .to_string(),
        );
    }

    if config.session.backend == SessionBackend::Memory {
        warnings.push(
            "Chat sessions use the in-memory store; they are lost on restart and \
             not shared between instances. Set [session] backend = \"redis\"."
                .to_string(),
        );
    }

    if config.session.backend == SessionBackend::Redis
        && config.session.redis_url.starts_with("redis://")
        && !config.session.redis_url.contains('@')
    {
        warnings.push(
            "Redis connection appears to have no authentication. Consider enabling Redis AUTH."
                .to_string(),
        );
    }

    if config.llm.api_key.is_empty() {
        warnings.push(
            "No LLM API key configured; classification and generation will fall back."
                .to_string(),
        );
    }

    warnings
}

/// Validate configuration for production security
pub fn validate_production_config(config: &AppConfig) -> Result<()> {
    if !is_production() {
        return Ok(());
    }

    for warning in production_warnings(config) {
        warn!("SECURITY WARNING: {}", warning);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_warn_about_memory_store_and_key() {
        let warnings = production_warnings(&AppConfig::default());
        assert!(warnings.iter().any(|w| w.contains("in-memory store")));
        assert!(warnings.iter().any(|w| w.contains("API key")));
    }

    #[test]
    fn test_authenticated_redis_is_quiet() {
        let mut config = AppConfig::default();
        config.session.backend = SessionBackend::Redis;
        config.session.redis_url = "redis://:pw@cache:6379".to_string();
        config.llm.api_key = "sk-test".to_string();
        assert!(production_warnings(&config).is_empty());
    }
}
