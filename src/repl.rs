use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use cvchat_core::{Session, SessionError};
use cvchat_llm::{EmbeddingProvider, LlmProvider, Message, Role};
use cvchat_memory::document::UploadedDocument;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const HELP: &str = "\
Type a question to ask about the processed documents.

Commands:
  /process <pdf>...  extract, chunk and index the given PDFs (replaces the current set)
  /history           show this conversation
  /help              show this message
  exit, quit         leave";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Process(Vec<PathBuf>),
    History,
    Help,
    Exit,
    Empty,
    Unknown(String),
}

#[must_use]
pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }
    if trimmed == "exit" || trimmed == "quit" {
        return Command::Exit;
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Ask(trimmed.to_owned());
    };

    let mut parts = rest.split_whitespace();
    match parts.next() {
        Some("process") => Command::Process(parts.map(PathBuf::from).collect()),
        Some("history") => Command::History,
        Some("help") => Command::Help,
        _ => Command::Unknown(trimmed.to_owned()),
    }
}

/// Read every path into an upload, preserving order.
///
/// # Errors
///
/// Returns an error naming the first file that cannot be read.
pub async fn load_documents(
    paths: &[PathBuf],
    max_file_size: u64,
) -> anyhow::Result<Vec<UploadedDocument>> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let doc = UploadedDocument::load(path, max_file_size)
            .await
            .with_context(|| format!("failed to load {}", path.display()))?;
        documents.push(doc);
    }
    Ok(documents)
}

/// Load and process `paths`, returning the chunk count.
///
/// # Errors
///
/// Returns an error if a file cannot be read or processing fails.
pub async fn process_paths<E: EmbeddingProvider, L: LlmProvider>(
    session: &mut Session<E, L>,
    paths: &[PathBuf],
    max_file_size: u64,
) -> anyhow::Result<usize> {
    let documents = load_documents(paths, max_file_size).await?;
    let chunks = session.process(documents).await?;
    Ok(chunks)
}

fn write_history(history: &[Message], out: &mut impl Write) -> std::io::Result<()> {
    if history.is_empty() {
        return writeln!(out, "(no questions yet)");
    }
    for message in history {
        let speaker = match message.role {
            Role::User => "you",
            Role::Assistant => "bot",
            Role::System => continue,
        };
        writeln!(out, "{speaker}: {}", message.content)?;
    }
    Ok(())
}

fn display_names(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| {
            p.file_name().map_or_else(
                || p.display().to_string(),
                |n| n.to_string_lossy().into_owned(),
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Line-oriented question loop. Answers and command output go to `out`;
/// failures are reported through tracing and the loop continues.
///
/// # Errors
///
/// Returns an error only if reading input or writing output fails.
pub async fn run<E, L, R, W>(
    session: &mut Session<E, L>,
    max_file_size: u64,
    input: R,
    out: &mut W,
) -> anyhow::Result<()>
where
    E: EmbeddingProvider,
    L: LlmProvider,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    write!(out, "> ")?;
    out.flush()?;

    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Command::Empty => {}
            Command::Exit => break,
            Command::Help => writeln!(out, "{HELP}")?,
            Command::History => write_history(session.history(), out)?,
            Command::Unknown(cmd) => writeln!(out, "unknown command: {cmd} (try /help)")?,
            Command::Process(paths) if paths.is_empty() => {
                writeln!(out, "usage: /process <pdf>...")?;
            }
            Command::Process(paths) => {
                match process_paths(session, &paths, max_file_size).await {
                    Ok(chunks) => {
                        writeln!(out, "processed {} into {chunks} chunks", display_names(&paths))?;
                    }
                    Err(e) => tracing::error!("processing failed: {e:#}"),
                }
            }
            Command::Ask(question) => match session.ask(&question).await {
                Ok(answer) => writeln!(out, "{answer}")?,
                Err(SessionError::NotReady) => {
                    tracing::warn!("no documents processed yet, use /process <pdf>...");
                }
                Err(e) => tracing::error!("{e}"),
            },
        }
        write!(out, "> ")?;
        out.flush()?;
    }
    writeln!(out)?;
    Ok(())
}
