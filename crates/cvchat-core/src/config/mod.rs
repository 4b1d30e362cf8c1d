mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

use crate::vault::{Secret, VaultProvider};

/// Secret keys consulted for the OpenAI API key, in priority order.
pub const OPENAI_KEY_VARS: [&str; 2] = ["CVCHAT_OPENAI_API_KEY", "OPENAI_API_KEY"];

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Resolve credentials through the vault.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault backend fails.
    pub async fn resolve_secrets(&mut self, vault: &dyn VaultProvider) -> anyhow::Result<()> {
        for key in OPENAI_KEY_VARS {
            if let Some(val) = vault.get_secret(key).await? {
                self.secrets.openai_api_key = Some(Secret::new(val));
                break;
            }
        }
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.document.chunk_size == 0 {
            bail!("document.chunk_size must be greater than 0");
        }
        if self.document.chunk_overlap >= self.document.chunk_size {
            bail!(
                "document.chunk_overlap ({}) must be less than document.chunk_size ({})",
                self.document.chunk_overlap,
                self.document.chunk_size
            );
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be greater than 0");
        }
        if self.llm.max_tokens == 0 {
            bail!("llm.max_tokens must be greater than 0");
        }
        if self.llm.provider == ProviderKind::OpenAi && self.secrets.openai_api_key.is_none() {
            bail!(
                "llm.provider is \"openai\" but no API key found; set {} or {}",
                OPENAI_KEY_VARS[0],
                OPENAI_KEY_VARS[1]
            );
        }
        Ok(())
    }
}
