mod repl;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use cvchat_core::Session;
use cvchat_core::config::{Config, ProviderKind};
use cvchat_core::vault::EnvVaultProvider;
use cvchat_llm::any::AnyProvider;
use cvchat_llm::ollama::OllamaProvider;
use cvchat_llm::openai::OpenAiProvider;

/// Ask questions about PDF résumés.
#[derive(Debug, Parser)]
#[command(name = "cvchat", version, about)]
struct Cli {
    /// Configuration file (defaults to $CVCHAT_CONFIG, then config/default.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// PDF files to process before reading questions
    #[arg(value_name = "PDF")]
    documents: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    init_subscriber();
    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = Config::load(&config_path)?;
    config.resolve_secrets(&EnvVaultProvider).await?;
    config.validate()?;

    let provider = create_provider(&config)?;
    health_check(&provider).await;
    tracing::info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        embedding_model = %config.llm.embedding_model,
        "provider ready"
    );

    let mut session = Session::from_config(provider.clone(), provider, &config);
    let max_file_size = config.document.max_file_size;

    if !cli.documents.is_empty() {
        repl::process_paths(&mut session, &cli.documents, max_file_size).await?;
    }

    tracing::info!("type a question, /help for commands");
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    repl::run(&mut session, max_file_size, stdin, &mut stdout).await
}

async fn health_check(provider: &AnyProvider) {
    if let AnyProvider::Ollama(ollama) = provider {
        match ollama.health_check().await {
            Ok(()) => tracing::info!("ollama health check passed"),
            Err(e) => tracing::warn!("ollama health check failed: {e:#}"),
        }
    }
}

fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    match config.llm.provider {
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            &config.llm.base_url,
            config.llm.model.clone(),
            config.llm.embedding_model.clone(),
        )?)),
        ProviderKind::OpenAi => {
            let api_key = config
                .secrets
                .openai_api_key
                .as_ref()
                .context("OpenAI API key not found (set CVCHAT_OPENAI_API_KEY or OPENAI_API_KEY)")?;
            let provider = OpenAiProvider::new(
                api_key.expose().to_owned(),
                config.llm.base_url.clone(),
                config.llm.model.clone(),
                config.llm.max_tokens,
                config.llm.embedding_model.clone(),
            )?;
            Ok(AnyProvider::OpenAi(provider))
        }
    }
}

fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("CVCHAT_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

/// Logs go to stderr so stdout carries only answers.
fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
