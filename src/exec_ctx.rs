//! Execution context shared across calls and chat turns.
//!
//! [`ExecCtx`] carries the HTTP client, model backend, endpoint, prompt
//! variables, cancellation handle, and optional event handler. Build it once
//! and share it (behind an `Arc` for streamed chat turns).

use crate::backend::{Backend, OpenAiBackend};
use crate::error::{FlowError, Result};
use crate::events::EventHandler;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

/// Shared execution context.
///
/// # Example
///
/// ```
/// use llm_flows::ExecCtx;
///
/// let ctx = ExecCtx::builder("https://api.openai.com")
///     .openai_with_key("sk-...")
///     .var("audience", "support engineers")
///     .build()
///     .unwrap();
/// assert_eq!(ctx.backend.name(), "openai");
/// ```
pub struct ExecCtx {
    /// HTTP client, also used by tools that call external services.
    pub client: Client,
    /// Provider base URL without the API path (e.g. `https://api.openai.com`).
    pub base_url: String,
    /// Model backend. Default: [`OpenAiBackend`] without a key.
    pub backend: Arc<dyn Backend>,
    /// Variables substituted into prompt `{key}` placeholders.
    pub vars: HashMap<String, String>,
    /// Optional cancellation flag, checked before every model request.
    pub cancellation: Option<Arc<AtomicBool>>,
    /// Optional observer for lifecycle events and tokens.
    pub event_handler: Option<Arc<dyn EventHandler>>,
}

impl ExecCtx {
    pub fn builder(base_url: impl Into<String>) -> ExecCtxBuilder {
        ExecCtxBuilder {
            client: None,
            base_url: base_url.into(),
            backend: None,
            vars: HashMap::new(),
            cancellation: None,
            event_handler: None,
            timeout: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
    }

    /// Return [`FlowError::Cancelled`] if cancellation has been requested.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(FlowError::Cancelled);
        }
        Ok(())
    }

    pub fn cancel_flag(&self) -> Option<&AtomicBool> {
        self.cancellation.as_deref()
    }
}

impl std::fmt::Debug for ExecCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecCtx")
            .field("base_url", &self.base_url)
            .field("backend", &self.backend.name())
            .field("vars_count", &self.vars.len())
            .field("has_cancellation", &self.cancellation.is_some())
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// Builder for [`ExecCtx`].
pub struct ExecCtxBuilder {
    client: Option<Client>,
    base_url: String,
    backend: Option<Arc<dyn Backend>>,
    vars: HashMap<String, String>,
    cancellation: Option<Arc<AtomicBool>>,
    event_handler: Option<Arc<dyn EventHandler>>,
    timeout: Option<Duration>,
}

impl ExecCtxBuilder {
    /// Use a preconfigured HTTP client. Its own timeout applies.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Use the OpenAI-compatible backend with bearer authentication.
    pub fn openai_with_key(mut self, api_key: impl Into<String>) -> Self {
        self.backend = Some(Arc::new(OpenAiBackend::new().with_api_key(api_key)));
        self
    }

    pub fn vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = vars;
        self
    }

    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn cancellation(mut self, cancel: Option<Arc<AtomicBool>>) -> Self {
        self.cancellation = cancel;
        self
    }

    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Request timeout for the default client. Default: 30 seconds.
    ///
    /// Ignored when a custom client is supplied via [`client`](Self::client).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<ExecCtx> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .timeout(self.timeout.unwrap_or(Duration::from_secs(30)))
                .build()?,
        };
        Ok(ExecCtx {
            client,
            base_url: normalize_base_url(&self.base_url),
            backend: self
                .backend
                .unwrap_or_else(|| Arc::new(OpenAiBackend::new())),
            vars: self.vars,
            cancellation: self.cancellation,
            event_handler: self.event_handler,
        })
    }
}

/// Strip API path suffixes so backends can append their own.
/// e.g. `https://api.openai.com/v1` -> `https://api.openai.com`
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    for suffix in &["/v1/chat/completions", "/v1"] {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url_strips_v1() {
        assert_eq!(normalize_base_url("https://api.openai.com/v1"), "https://api.openai.com");
        assert_eq!(normalize_base_url("https://api.openai.com/v1/"), "https://api.openai.com");
    }

    #[test]
    fn test_normalize_base_url_strips_full_path() {
        assert_eq!(
            normalize_base_url("http://localhost:8000/v1/chat/completions"),
            "http://localhost:8000"
        );
    }

    #[test]
    fn test_normalize_base_url_preserves_clean() {
        assert_eq!(normalize_base_url("http://localhost:8000"), "http://localhost:8000");
    }

    #[test]
    fn test_default_backend_is_openai() {
        let ctx = ExecCtx::builder("https://api.openai.com").build().unwrap();
        assert_eq!(ctx.backend.name(), "openai");
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_cancellation_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = ExecCtx::builder("http://unused")
            .cancellation(Some(flag.clone()))
            .build()
            .unwrap();
        assert!(ctx.check_cancelled().is_ok());
        flag.store(true, Ordering::Relaxed);
        assert!(matches!(ctx.check_cancelled(), Err(FlowError::Cancelled)));
    }

    #[test]
    fn test_vars_collected() {
        let ctx = ExecCtx::builder("http://unused")
            .var("team", "support")
            .var("tone", "brief")
            .build()
            .unwrap();
        assert_eq!(ctx.vars.len(), 2);
        assert_eq!(ctx.vars["team"], "support");
    }
}
