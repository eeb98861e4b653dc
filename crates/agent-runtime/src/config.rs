//! Provider selection from the environment

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    provider::{GenerationOptions, LlmProvider},
};

use crate::gemini::{self, GeminiProvider};
use crate::openai::{self, OpenAiProvider};

/// Backend families the runtime knows about
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Ollama,
    /// Recognised but not implemented
    Anthropic,
}

impl ProviderKind {
    fn default_model(self) -> &'static str {
        match self {
            ProviderKind::Gemini => gemini::DEFAULT_MODEL,
            ProviderKind::OpenAi => openai::DEFAULT_MODEL,
            ProviderKind::Ollama => openai::DEFAULT_OLLAMA_MODEL,
            ProviderKind::Anthropic => "claude-3-5-sonnet-latest",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAi),
            "ollama" => Ok(ProviderKind::Ollama),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            other => Err(AgentError::Config(format!("Unknown provider '{other}'"))),
        }
    }
}

/// Runtime configuration
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub provider: ProviderKind,
    pub options: GenerationOptions,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub ollama_host: String,
    pub ollama_port: u16,
    pub request_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            options: GenerationOptions::default(),
            gemini_api_key: None,
            openai_api_key: None,
            openai_base_url: None,
            ollama_host: "http://localhost".into(),
            ollama_port: 11434,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let provider = match var("AGENT_PROVIDER") {
            Some(name) => name.parse()?,
            None => defaults.provider,
        };

        let mut options = GenerationOptions {
            model: var("AGENT_MODEL").unwrap_or_else(|| provider.default_model().into()),
            ..GenerationOptions::default()
        };
        if let Some(t) = var("AGENT_TEMPERATURE") {
            options.temperature = parse_number("AGENT_TEMPERATURE", &t)?;
        }
        if let Some(m) = var("AGENT_MAX_TOKENS") {
            options.max_tokens = parse_number("AGENT_MAX_TOKENS", &m)?;
        }

        let ollama_port = match var("OLLAMA_PORT") {
            Some(p) => parse_number("OLLAMA_PORT", &p)?,
            None => defaults.ollama_port,
        };
        let request_timeout = match var("AGENT_REQUEST_TIMEOUT_SECS") {
            Some(s) => Duration::from_secs(parse_number("AGENT_REQUEST_TIMEOUT_SECS", &s)?),
            None => defaults.request_timeout,
        };

        Ok(Self {
            provider,
            options,
            gemini_api_key: var("GEMINI_API_KEY"),
            openai_api_key: var("OPENAI_API_KEY"),
            openai_base_url: var("OPENAI_BASE_URL"),
            ollama_host: var("OLLAMA_HOST").unwrap_or(defaults.ollama_host),
            ollama_port,
            request_timeout,
        })
    }

    /// Construct the configured backend
    ///
    /// Fails before any request is made when the backend is unimplemented
    /// or its key is missing.
    pub fn build_provider(&self) -> Result<Arc<dyn LlmProvider>> {
        let options = self.options.clone();
        let timeout = self.request_timeout;

        let provider: Arc<dyn LlmProvider> = match self.provider {
            ProviderKind::Gemini => Arc::new(GeminiProvider::new(
                self.gemini_api_key.clone().unwrap_or_default(),
                options,
                timeout,
            )?),
            ProviderKind::OpenAi => {
                let provider = OpenAiProvider::new(
                    self.openai_api_key.clone().unwrap_or_default(),
                    options,
                    timeout,
                )?;
                Arc::new(match &self.openai_base_url {
                    Some(url) => provider.with_base_url(url),
                    None => provider,
                })
            }
            ProviderKind::Ollama => Arc::new(OpenAiProvider::ollama(
                &self.ollama_host,
                self.ollama_port,
                options,
                timeout,
            )?),
            ProviderKind::Anthropic => {
                return Err(AgentError::Config(
                    "The anthropic provider is not implemented yet".into(),
                ));
            }
        };

        tracing::info!(provider = provider.name(), model = provider.model(), "Provider configured");
        Ok(provider)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AgentError::Config(format!("{key} has an invalid value: '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<RuntimeConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        RuntimeConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.provider, ProviderKind::Gemini);
        assert_eq!(config.options.model, gemini::DEFAULT_MODEL);
        assert_eq!(config.ollama_port, 11434);
        assert_eq!(config.request_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_ollama_from_vars() {
        let config = config(&[
            ("AGENT_PROVIDER", "Ollama"),
            ("OLLAMA_HOST", "http://gpu-box"),
            ("OLLAMA_PORT", "8080"),
            ("AGENT_MAX_TOKENS", "1024"),
        ])
        .unwrap();
        assert_eq!(config.provider, ProviderKind::Ollama);
        assert_eq!(config.options.model, openai::DEFAULT_OLLAMA_MODEL);
        assert_eq!(config.options.max_tokens, 1024);

        let provider = config.build_provider().unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_bad_values_are_config_errors() {
        assert!(matches!(config(&[("AGENT_PROVIDER", "palm")]), Err(AgentError::Config(_))));
        assert!(matches!(config(&[("OLLAMA_PORT", "lots")]), Err(AgentError::Config(_))));
    }

    #[test]
    fn test_unimplemented_and_keyless_backends_fail_fast() {
        let anthropic = config(&[("AGENT_PROVIDER", "anthropic")]).unwrap();
        assert!(matches!(anthropic.build_provider(), Err(AgentError::Config(_))));

        let gemini = config(&[("AGENT_PROVIDER", "gemini")]).unwrap();
        assert!(matches!(gemini.build_provider(), Err(AgentError::Config(_))));

        let openai = config(&[("AGENT_PROVIDER", "openai"), ("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(openai.build_provider().unwrap().model(), openai::DEFAULT_MODEL);
    }
}
