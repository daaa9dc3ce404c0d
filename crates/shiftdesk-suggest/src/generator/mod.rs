//! Text generators backing shift suggestions.

pub mod failover;
pub mod openai_compatible;
pub mod registry;

use shiftdesk_core::config::{GeneratorEndpoint, SuggestConfig};
use shiftdesk_core::error::{Result, ShiftdeskError};
use shiftdesk_core::traits::TextGenerator;
use std::sync::Arc;

pub use failover::FailoverGenerator;
pub use openai_compatible::OpenAiCompatibleGenerator;

/// Build the configured generator chain.
///
/// Returns `None` when suggestions are switched off (`provider = "none"` or empty).
/// With fallbacks configured, the chain is wrapped in a [`FailoverGenerator`].
pub fn create_generator(config: &SuggestConfig) -> Result<Option<Arc<dyn TextGenerator>>> {
    let provider = config.provider.trim();
    if provider.is_empty() || provider.eq_ignore_ascii_case("none") {
        return Ok(None);
    }

    let primary = GeneratorEndpoint {
        provider: provider.to_string(),
        endpoint: config.endpoint.clone(),
        api_key: config.api_key.clone(),
        model: config.model.clone(),
    };

    let mut chain = vec![build_one(&primary, config)?];
    for fallback in &config.fallbacks {
        chain.push(build_one(fallback, config)?);
    }

    if chain.len() == 1 {
        let only = chain.remove(0);
        tracing::info!("🧠 Suggestion generator: {}", only.name());
        Ok(Some(Arc::from(only)))
    } else {
        let failover = FailoverGenerator::new(chain);
        tracing::info!(
            "🧠 Suggestion generator: {} (+{} fallback)",
            failover.name(),
            failover.chain_len() - 1
        );
        Ok(Some(Arc::new(failover)))
    }
}

fn build_one(endpoint: &GeneratorEndpoint, config: &SuggestConfig) -> Result<Box<dyn TextGenerator>> {
    if endpoint.provider.starts_with("custom:") {
        return Ok(Box::new(OpenAiCompatibleGenerator::custom(endpoint, config)));
    }
    let profile = registry::get_profile(&endpoint.provider).ok_or_else(|| {
        ShiftdeskError::Config(format!(
            "Unknown suggestion provider '{}'. Known: {}",
            endpoint.provider,
            registry::known_providers().join(", ")
        ))
    })?;
    Ok(Box::new(OpenAiCompatibleGenerator::from_profile(
        profile, endpoint, config,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_provider() {
        let cfg = SuggestConfig {
            provider: "none".into(),
            ..Default::default()
        };
        assert!(create_generator(&cfg).unwrap().is_none());
    }

    #[test]
    fn test_chain_with_fallbacks() {
        let cfg = SuggestConfig {
            provider: "ollama".into(),
            fallbacks: vec![GeneratorEndpoint {
                provider: "custom:http://localhost:9000/v1".into(),
                endpoint: String::new(),
                api_key: String::new(),
                model: "m".into(),
            }],
            ..Default::default()
        };
        let generator = create_generator(&cfg).unwrap().unwrap();
        assert_eq!(generator.name(), "ollama");
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let cfg = SuggestConfig {
            provider: "mystery".into(),
            ..Default::default()
        };
        assert!(matches!(
            create_generator(&cfg),
            Err(ShiftdeskError::Config(_))
        ));
    }
}
