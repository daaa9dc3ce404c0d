//! Generator registry: maps provider names to endpoint configurations.
//!
//! Every supported backend speaks the OpenAI chat-completions dialect; they
//! differ only by base URL, auth style and where the key comes from.

/// How to attach auth credentials to requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// No authentication required (local servers).
    None,
}

#[derive(Debug, Clone)]
pub struct GeneratorProfile {
    pub name: &'static str,
    pub base_url: &'static str,
    pub chat_path: &'static str,
    pub models_path: &'static str,
    /// Environment variables tried in order for the API key.
    pub env_keys: &'static [&'static str],
    pub auth_style: AuthStyle,
    /// Environment variable overriding the base URL (e.g., OLLAMA_HOST).
    pub base_url_env: Option<&'static str>,
}

static PROFILES: &[GeneratorProfile] = &[
    GeneratorProfile {
        name: "openai",
        base_url: "https://api.openai.com/v1",
        chat_path: "/chat/completions",
        models_path: "/models",
        env_keys: &["OPENAI_API_KEY"],
        auth_style: AuthStyle::Bearer,
        base_url_env: None,
    },
    GeneratorProfile {
        name: "openrouter",
        base_url: "https://openrouter.ai/api/v1",
        chat_path: "/chat/completions",
        models_path: "/models",
        env_keys: &["OPENROUTER_API_KEY"],
        auth_style: AuthStyle::Bearer,
        base_url_env: None,
    },
    GeneratorProfile {
        name: "groq",
        base_url: "https://api.groq.com/openai/v1",
        chat_path: "/chat/completions",
        models_path: "/models",
        env_keys: &["GROQ_API_KEY"],
        auth_style: AuthStyle::Bearer,
        base_url_env: None,
    },
    GeneratorProfile {
        name: "deepseek",
        base_url: "https://api.deepseek.com",
        chat_path: "/chat/completions",
        models_path: "/models",
        env_keys: &["DEEPSEEK_API_KEY"],
        auth_style: AuthStyle::Bearer,
        base_url_env: None,
    },
    GeneratorProfile {
        name: "ollama",
        base_url: "http://localhost:11434/v1",
        chat_path: "/chat/completions",
        models_path: "/models",
        env_keys: &[],
        auth_style: AuthStyle::None,
        base_url_env: Some("OLLAMA_HOST"),
    },
    GeneratorProfile {
        name: "llamacpp",
        base_url: "http://localhost:8080/v1",
        chat_path: "/chat/completions",
        models_path: "/models",
        env_keys: &[],
        auth_style: AuthStyle::None,
        base_url_env: Some("LLAMACPP_HOST"),
    },
];

/// Look up a provider by name (case-insensitive).
pub fn get_profile(name: &str) -> Option<&'static GeneratorProfile> {
    PROFILES.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

pub fn known_providers() -> Vec<&'static str> {
    PROFILES.iter().map(|p| p.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(get_profile("OpenAI").map(|p| p.name), Some("openai"));
        assert_eq!(get_profile("ollama").map(|p| p.auth_style), Some(AuthStyle::None));
        assert!(get_profile("nonexistent").is_none());
        assert!(known_providers().contains(&"groq"));
    }
}
