//! Request knobs and environment-driven settings.
//!
//! [`LlmConfig`] holds per-call sampling options. [`Settings`] is the
//! process-level configuration read from the environment (optionally seeded
//! from a `.env` file), and knows how to build an [`ExecCtx`] from it.

use crate::backend::OpenAiBackend;
use crate::error::{FlowError, Result};
use crate::exec_ctx::ExecCtx;
use std::sync::Arc;
use std::time::Duration;

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_ORGANIZATION: &str = "OPENAI_ORGANIZATION";
pub const ENV_FAST_MODEL: &str = "LLM_FLOWS_FAST_MODEL";
pub const ENV_LARGE_MODEL: &str = "LLM_FLOWS_LARGE_MODEL";
pub const ENV_TIMEOUT_SECS: &str = "LLM_FLOWS_TIMEOUT_SECS";
pub const ENV_MAX_STEPS: &str = "LLM_FLOWS_MAX_STEPS";
pub const ENV_WEATHER_BASE_URL: &str = "WEATHER_BASE_URL";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_FAST_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LARGE_MODEL: &str = "gpt-4o";
pub const DEFAULT_WEATHER_BASE_URL: &str = "https://api.open-meteo.com";

/// Sampling options for a single model request.
///
/// Unset options are left out of the request so the provider default applies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmConfig {
    /// Temperature (0.0 = deterministic, higher = more varied).
    pub temperature: Option<f64>,

    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,

    /// Sampling seed, for providers that support best-effort determinism.
    pub seed: Option<u64>,
}

impl LlmConfig {
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Process-level configuration.
#[derive(Clone)]
pub struct Settings {
    /// Provider API key, sent as a bearer token.
    pub api_key: Option<String>,
    pub base_url: String,
    pub organization: Option<String>,
    /// Model for the cheap single-shot flows (takeaway, classification, appointment).
    pub fast_model: String,
    /// Model for summarization and chat.
    pub large_model: String,
    /// HTTP timeout. Streaming responses can take several seconds to start.
    pub timeout: Duration,
    /// Step budget for the chat loop.
    pub max_steps: u32,
    pub weather_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            organization: None,
            fast_model: DEFAULT_FAST_MODEL.to_string(),
            large_model: DEFAULT_LARGE_MODEL.to_string(),
            timeout: Duration::from_secs(30),
            max_steps: crate::agent::DEFAULT_MAX_STEPS,
            weather_base_url: DEFAULT_WEATHER_BASE_URL.to_string(),
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("organization", &self.organization)
            .field("fast_model", &self.fast_model)
            .field("large_model", &self.large_model)
            .field("timeout", &self.timeout)
            .field("max_steps", &self.max_steps)
            .field("weather_base_url", &self.weather_base_url)
            .finish()
    }
}

impl Settings {
    /// Read settings from the process environment, loading `.env` first if present.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let timeout = match get(ENV_TIMEOUT_SECS) {
            Some(raw) => Duration::from_secs(parse_number(ENV_TIMEOUT_SECS, &raw)?),
            None => defaults.timeout,
        };
        let max_steps = match get(ENV_MAX_STEPS) {
            Some(raw) => parse_number(ENV_MAX_STEPS, &raw)?,
            None => defaults.max_steps,
        };
        if max_steps == 0 {
            return Err(FlowError::InvalidConfig(format!(
                "{} must be at least 1",
                ENV_MAX_STEPS
            )));
        }

        Ok(Self {
            api_key: get(ENV_API_KEY),
            base_url: get(ENV_BASE_URL).unwrap_or(defaults.base_url),
            organization: get(ENV_ORGANIZATION),
            fast_model: get(ENV_FAST_MODEL).unwrap_or(defaults.fast_model),
            large_model: get(ENV_LARGE_MODEL).unwrap_or(defaults.large_model),
            timeout,
            max_steps,
            weather_base_url: get(ENV_WEATHER_BASE_URL).unwrap_or(defaults.weather_base_url),
        })
    }

    /// The OpenAI-compatible backend these settings describe.
    pub fn backend(&self) -> OpenAiBackend {
        let mut backend = OpenAiBackend::new();
        if let Some(ref key) = self.api_key {
            backend = backend.with_api_key(key);
        }
        if let Some(ref org) = self.organization {
            backend = backend.with_organization(org);
        }
        backend
    }

    /// Build an execution context pointed at the configured provider.
    pub fn exec_ctx(&self) -> Result<ExecCtx> {
        ExecCtx::builder(&self.base_url)
            .backend(Arc::new(self.backend()))
            .timeout(self.timeout)
            .build()
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| FlowError::InvalidConfig(format!("{}={:?}: {}", key, raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_env_empty() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert!(settings.api_key.is_none());
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.fast_model, "gpt-4o-mini");
        assert_eq!(settings.large_model, "gpt-4o");
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert_eq!(settings.max_steps, 5);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            (ENV_API_KEY, "sk-test"),
            (ENV_BASE_URL, "http://localhost:8080/v1"),
            (ENV_LARGE_MODEL, "gpt-4.1"),
            (ENV_TIMEOUT_SECS, "90"),
            (ENV_MAX_STEPS, "2"),
        ]))
        .unwrap();
        assert_eq!(settings.api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.large_model, "gpt-4.1");
        assert_eq!(settings.timeout, Duration::from_secs(90));
        assert_eq!(settings.max_steps, 2);
    }

    #[test]
    fn test_blank_values_are_unset() {
        let settings = Settings::from_lookup(lookup(&[(ENV_API_KEY, "  ")])).unwrap();
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_bad_number_is_invalid_config() {
        let err = Settings::from_lookup(lookup(&[(ENV_TIMEOUT_SECS, "soon")])).unwrap_err();
        assert!(matches!(err, FlowError::InvalidConfig(_)));
    }

    #[test]
    fn test_zero_steps_rejected() {
        let err = Settings::from_lookup(lookup(&[(ENV_MAX_STEPS, "0")])).unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_STEPS));
    }

    #[test]
    fn test_debug_redacts_key() {
        let settings = Settings {
            api_key: Some("sk-secret-value".into()),
            ..Settings::default()
        };
        let out = format!("{:?}", settings);
        assert!(!out.contains("sk-secret-value"));
    }

    #[test]
    fn test_exec_ctx_uses_openai_backend() {
        let settings = Settings::from_lookup(lookup(&[(ENV_BASE_URL, "https://api.openai.com/v1")]))
            .unwrap();
        let ctx = settings.exec_ctx().unwrap();
        assert_eq!(ctx.backend.name(), "openai");
        assert_eq!(ctx.base_url, "https://api.openai.com");
    }

    #[test]
    fn test_llm_config_builders() {
        let config = LlmConfig::default().with_temperature(0.2).with_max_tokens(64);
        assert_eq!(config.temperature, Some(0.2));
        assert_eq!(config.max_tokens, Some(64));
        assert!(config.seed.is_none());
    }
}
