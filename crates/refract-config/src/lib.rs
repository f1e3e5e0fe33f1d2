//! # Refract Config
//!
//! Unified single-file configuration management for Refract.
//! A single `refract.yaml` can configure the engine, target platform
//! catalog, verification rules, service backends, event bus sizing, and
//! observability settings.

mod loader;

pub use loader::{load_config, ConfigError};

use std::collections::HashMap;

use serde::Deserialize;

/// Top-level configuration schema for Refract.
#[derive(Debug, Clone, Deserialize)]
pub struct RefractConfig {
    /// Config schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    /// Target platform catalog; defaults cover the common platforms.
    #[serde(default = "default_target_catalog")]
    pub targets: HashMap<String, TargetProfile>,
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub event_bus: EventBusSettings,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for RefractConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
            engine: EngineConfig::default(),
            targets: default_target_catalog(),
            verification: VerificationConfig::default(),
            services: ServicesConfig::default(),
            event_bus: EventBusSettings::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl RefractConfig {
    /// Profile for one target, falling back to a conservative default for
    /// platforms absent from the catalog.
    pub fn target_profile(&self, target: &str) -> TargetProfile {
        self.targets.get(target).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            environment: default_env(),
        }
    }
}

fn default_app_name() -> String {
    "refract".to_string()
}

fn default_env() -> String {
    "development".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Remediation retries per target before escalation.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Bound on every external service call.
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            stage_timeout_secs: default_stage_timeout(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_stage_timeout() -> u64 {
    30
}

/// Per-platform generation and verification constraints.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetProfile {
    pub max_chars: usize,
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default)]
    pub require_paragraph_breaks: bool,
}

impl Default for TargetProfile {
    fn default() -> Self {
        Self {
            max_chars: 2000,
            min_chars: default_min_chars(),
            style: default_style(),
            require_paragraph_breaks: false,
        }
    }
}

fn default_min_chars() -> usize {
    50
}

fn default_style() -> String {
    "clear and direct".to_string()
}

/// Built-in platform catalog; any entry can be overridden in refract.yaml.
pub fn default_target_catalog() -> HashMap<String, TargetProfile> {
    let mut targets = HashMap::new();
    targets.insert(
        "twitter".to_string(),
        TargetProfile {
            max_chars: 280,
            min_chars: 50,
            style: "punchy, hook-first, no hashtag stuffing".to_string(),
            require_paragraph_breaks: false,
        },
    );
    targets.insert(
        "linkedin".to_string(),
        TargetProfile {
            max_chars: 3000,
            min_chars: 100,
            style: "professional, insight-led, short paragraphs".to_string(),
            require_paragraph_breaks: true,
        },
    );
    targets.insert(
        "instagram".to_string(),
        TargetProfile {
            max_chars: 2200,
            min_chars: 50,
            style: "visual-first caption, conversational".to_string(),
            require_paragraph_breaks: false,
        },
    );
    targets.insert(
        "facebook".to_string(),
        TargetProfile {
            max_chars: 5000,
            min_chars: 50,
            style: "approachable, community-oriented".to_string(),
            require_paragraph_breaks: false,
        },
    );
    targets.insert(
        "blog".to_string(),
        TargetProfile {
            max_chars: 20000,
            min_chars: 400,
            style: "long-form, structured with headings".to_string(),
            require_paragraph_breaks: true,
        },
    );
    targets.insert(
        "newsletter".to_string(),
        TargetProfile {
            max_chars: 10000,
            min_chars: 200,
            style: "personal, direct address to the reader".to_string(),
            require_paragraph_breaks: true,
        },
    );
    targets
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    /// Review score a candidate must carry to pass the gate.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
    /// Keywords expected in every variant, merged with brand keywords.
    #[serde(default)]
    pub required_keywords: Vec<String>,
    /// When true, missing keywords hard-fail instead of advising.
    #[serde(default)]
    pub keywords_required: bool,
    /// Phrases that hard-fail any variant, merged with brand forbidden words.
    #[serde(default)]
    pub forbidden_phrases: Vec<String>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            score_threshold: default_score_threshold(),
            required_keywords: Vec::new(),
            keywords_required: false,
            forbidden_phrases: Vec::new(),
        }
    }
}

fn default_score_threshold() -> f32 {
    80.0
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServicesConfig {
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub image: ImageSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Environment variable holding the API key; never the key itself.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_service_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_service_timeout(),
        }
    }
}

impl GenerationSettings {
    /// Resolve the API key from the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_api_key_env() -> String {
    "REFRACT_API_KEY".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.4
}

fn default_service_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub placeholder_url: Option<String>,
    #[serde(default = "default_service_timeout")]
    pub timeout_secs: u64,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            placeholder_url: None,
            timeout_secs: default_service_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventBusSettings {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_max_subscribers")]
    pub max_subscribers: usize,
    #[serde(default = "default_history_ttl")]
    pub history_ttl_secs: u64,
}

impl Default for EventBusSettings {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            history_limit: default_history_limit(),
            max_subscribers: default_max_subscribers(),
            history_ttl_secs: default_history_ttl(),
        }
    }
}

fn default_channel_capacity() -> usize {
    256
}

fn default_history_limit() -> usize {
    256
}

fn default_max_subscribers() -> usize {
    1024
}

fn default_history_ttl() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_covers_common_platforms() {
        let config = RefractConfig::default();
        for platform in ["twitter", "linkedin", "instagram", "facebook", "blog", "newsletter"] {
            assert!(config.targets.contains_key(platform), "missing {}", platform);
        }
        assert_eq!(config.targets["twitter"].max_chars, 280);
        assert!(config.targets["blog"].require_paragraph_breaks);
    }

    #[test]
    fn test_unknown_target_gets_conservative_default_profile() {
        let config = RefractConfig::default();
        let profile = config.target_profile("mastodon");
        assert_eq!(profile.max_chars, 2000);
        assert_eq!(profile.min_chars, 50);
    }

    #[test]
    fn test_defaults_match_engine_contract() {
        let config = RefractConfig::default();
        assert_eq!(config.engine.max_retries, 3);
        assert_eq!(config.verification.score_threshold, 80.0);
        assert!(!config.verification.keywords_required);
    }
}
