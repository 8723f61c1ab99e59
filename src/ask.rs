//! Query commands: `ask`, `chat`, and `search`.
//!
//! Each command opens the configured index, builds a [`QueryPipeline`]
//! from the configured providers and prints results to stdout. A failed
//! query is rendered as `error (<state>/<kind>): <message>` so scripts can
//! tell an empty index from a provider outage.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};

use quarry_core::error::QueryError;
use quarry_core::models::{QueryResult, SearchHit};
use quarry_core::pipeline::QueryPipeline;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::file_store::FileStore;
use crate::generation::create_generator;

const EXCERPT_CHARS: usize = 200;

/// Build the query pipeline described by `config`, optionally overriding
/// `retrieval.k`.
pub fn build_pipeline(config: &Config, k: Option<usize>) -> Result<QueryPipeline> {
    let store = FileStore::open(&config.index.path, config.index.metric)
        .context("Failed to open index")?;
    let embedder = create_provider(&config.embedding)?;
    let generator = create_generator(&config.generation)?;
    Ok(QueryPipeline::new(embedder, Arc::new(store), generator)
        .with_k(k.unwrap_or(config.retrieval.k))
        .with_template(config.generation.template()?))
}

/// One-line rendering of a failed query.
pub fn describe_failure(err: &QueryError) -> String {
    format!("error ({}/{}): {}", err.state(), err.kind(), err)
}

/// Run `quarry ask`. Returns `false` if the query failed.
pub fn run_ask(config: &Config, question: &str, k: Option<usize>, json: bool) -> Result<bool> {
    let pipeline = build_pipeline(config, k)?;
    match pipeline.query(question) {
        Ok(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", render_answer(&result));
            }
            Ok(true)
        }
        Err(e) => {
            eprintln!("{}", describe_failure(&e));
            Ok(false)
        }
    }
}

/// Run `quarry search`: retrieval only, no generation.
pub fn run_search(config: &Config, question: &str, k: Option<usize>, json: bool) -> Result<bool> {
    let pipeline = build_pipeline(config, k)?;
    match pipeline.retrieve(question) {
        Ok(hits) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                print!("{}", render_hits(&hits));
            }
            Ok(true)
        }
        Err(e) => {
            eprintln!("{}", describe_failure(&e));
            Ok(false)
        }
    }
}

/// Run `quarry chat` on stdin/stdout.
pub fn run_chat(config: &Config, k: Option<usize>) -> Result<()> {
    let pipeline = build_pipeline(config, k)?;
    let interactive = atty::is(atty::Stream::Stdin);
    if interactive {
        eprintln!("Ask a question (type 'quit' or 'exit' to leave).");
    }
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    chat_loop(&pipeline, stdin.lock(), stdout.lock(), interactive)
}

/// Answer questions line by line until `quit`, `exit`, or end of input.
/// Failures are printed and the loop carries on.
pub fn chat_loop<R: BufRead, W: Write>(
    pipeline: &QueryPipeline,
    input: R,
    mut output: W,
    prompt: bool,
) -> Result<()> {
    let mut lines = input.lines();
    loop {
        if prompt {
            eprint!("> ");
            let _ = std::io::stderr().flush();
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("quit") || question.eq_ignore_ascii_case("exit") {
            break;
        }

        match pipeline.query(question) {
            Ok(result) => write!(output, "{}", render_answer(&result))?,
            Err(e) => writeln!(output, "{}", describe_failure(&e))?,
        }
        writeln!(output)?;
        output.flush()?;
    }
    Ok(())
}

fn render_answer(result: &QueryResult) -> String {
    let mut out = format!("Answer: {}\n", result.answer);
    if !result.sources.is_empty() {
        out.push_str("\nSources:\n");
        out.push_str(&render_hits(&result.sources));
    }
    out
}

fn render_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results.\n".to_string();
    }
    let mut out = String::new();
    for hit in hits {
        out.push_str(&format!(
            "{}. [{:.2}] {}\n",
            hit.rank,
            hit.score,
            hit.chunk.citation()
        ));
        out.push_str(&format!("    excerpt: \"{}\"\n", excerpt(&hit.chunk.text)));
    }
    out
}

/// First [`EXCERPT_CHARS`] characters on one line, with an ellipsis if cut.
fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
        format!("{}...", cut)
    }
}
