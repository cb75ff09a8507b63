//! Text generation collaborator used by the narrative stage.
//!
//! A [`TextGenerator`] turns a prompt into prose. Generators report
//! [`TextGenError::Unavailable`] when they have no credential; the narrative
//! stage answers that with a deterministic fallback. Any other failure is
//! [`TextGenError::Fatal`] and aborts the run.

use std::sync::Arc;

use tracing::{debug, warn};

use insightflow_shared::{TextGenerationConfig, env_lookup, find_api_key_with};

/// Prefix marking text produced without a provider.
pub const FALLBACK_PREFIX: &str = "DETERMINISTIC FALLBACK SUMMARY: ";

/// Why a generator could not produce text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextGenError {
    /// No credential configured; callers fall back to deterministic text.
    #[error("text generation unavailable: {0}")]
    Unavailable(String),

    /// Configured but broken or unimplemented; fatal to the run.
    #[error("{0}")]
    Fatal(String),
}

/// Produces natural-language text from a prompt.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, TextGenError>;
}

/// Generator configured from environment credentials.
///
/// No provider integration ships yet: with a credential present every call
/// is [`TextGenError::Fatal`], without one it is [`TextGenError::Unavailable`].
#[derive(Clone)]
pub struct EnvTextGenerator {
    config: TextGenerationConfig,
    lookup: Arc<VarLookup>,
}

/// Resolves a variable name to its value.
type VarLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

impl EnvTextGenerator {
    /// Generator reading credentials from the process environment.
    pub fn new(config: TextGenerationConfig) -> Self {
        Self::with_lookup(config, env_lookup)
    }

    /// Generator reading credentials through `lookup` instead of the environment.
    pub fn with_lookup(
        config: TextGenerationConfig,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            config,
            lookup: Arc::new(lookup),
        }
    }
}

impl std::fmt::Debug for EnvTextGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvTextGenerator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TextGenerator for EnvTextGenerator {
    fn generate(&self, prompt: &str) -> Result<String, TextGenError> {
        let Some(_api_key) = find_api_key_with(&self.config, |name| (self.lookup)(name)) else {
            warn!(
                envs = ?self.config.api_key_envs,
                "no text generation credential found, using deterministic fallback"
            );
            return Err(TextGenError::Unavailable(format!(
                "none of {} is set",
                self.config.api_key_envs.join(", ")
            )));
        };

        debug!(
            model = %self.config.model,
            max_tokens = self.config.max_tokens,
            prompt_len = prompt.len(),
            "text generation requested"
        );
        // TODO: call the provider's completion API with model/max_tokens once an integration is chosen.
        Err(TextGenError::Fatal(format!(
            "text generation provider for model '{}' is not implemented",
            self.config.model
        )))
    }
}

/// Deterministic stand-in for generated text: the first `max_chars`
/// characters of the prompt on one line, behind [`FALLBACK_PREFIX`].
pub fn fallback_summary(prompt: &str, max_chars: usize) -> String {
    let short: String = prompt
        .chars()
        .take(max_chars)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    format!("{FALLBACK_PREFIX}{short}")
}
