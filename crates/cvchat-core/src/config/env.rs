use std::str::FromStr;

use super::Config;

/// Parse `key` into `slot`, keeping the current value and warning when the
/// variable is set but malformed.
fn override_parsed<T: FromStr>(key: &str, slot: &mut T) {
    if let Ok(v) = std::env::var(key) {
        match v.trim().parse::<T>() {
            Ok(parsed) => *slot = parsed,
            Err(_) => tracing::warn!("ignoring invalid {key} value: {v}"),
        }
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CVCHAT_LLM_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.to_lowercase())) {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid CVCHAT_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("CVCHAT_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("CVCHAT_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("CVCHAT_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        override_parsed("CVCHAT_LLM_MAX_TOKENS", &mut self.llm.max_tokens);
        override_parsed("CVCHAT_CHUNK_SIZE", &mut self.document.chunk_size);
        override_parsed("CVCHAT_CHUNK_OVERLAP", &mut self.document.chunk_overlap);
        override_parsed("CVCHAT_RETRIEVAL_TOP_K", &mut self.retrieval.top_k);
        override_parsed(
            "CVCHAT_RETRIEVAL_CONDENSE_QUESTION",
            &mut self.retrieval.condense_question,
        );
        override_parsed(
            "CVCHAT_SESSION_RESET_HISTORY",
            &mut self.session.reset_history_on_process,
        );
    }
}
