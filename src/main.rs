//! Diagnostic command line for the engine: tokenize a message, validate
//! it, or list the suggestions at its end, printing JSON to stdout.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use tac_engine::context::EngineContext;

#[derive(Parser)]
#[command(name = "tac-engine")]
#[command(about = "Tokenizer and suggestion engine for TAC aviation weather messages")]
struct Args {
    /// Directory of JSON grammar documents
    #[arg(long, global = true, default_value = "grammars")]
    grammar_dir: PathBuf,

    /// Override log level (otherwise RUST_LOG or "info")
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Disable ANSI colors in stderr output
    #[arg(long, global = true)]
    no_color: bool,

    /// Also write a debug-level session log to the cache directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Tokenize a message and print the token stream
    Tokenize {
        /// The message text
        message: String,
        /// Grammar name; detected from the message when omitted
        #[arg(long)]
        grammar: Option<String>,
        /// Grammar standard (defaults to "wmo")
        #[arg(long)]
        standard: Option<String>,
    },
    /// Validate a message: tokens, errors, and missing required tokens
    Check {
        message: String,
        #[arg(long)]
        grammar: Option<String>,
        #[arg(long)]
        standard: Option<String>,
    },
    /// Print the suggestions at the end of a message
    Suggest {
        message: String,
        #[arg(long)]
        grammar: Option<String>,
        #[arg(long)]
        standard: Option<String>,
    },
    /// List the registered grammar names
    Grammars,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = tac_engine::logging::init_logger(
        args.no_color,
        args.log_level.as_deref(),
        args.log_file,
    )
    .context("failed to initialize logging")?;

    let ctx = EngineContext::new();
    let loaded = ctx
        .load_grammar_dir(&args.grammar_dir)
        .with_context(|| format!("failed to load grammars from {}", args.grammar_dir.display()))?;
    tracing::debug!(loaded, dir = %args.grammar_dir.display(), "grammars loaded");

    match args.command {
        Command::Tokenize {
            message,
            grammar,
            standard,
        } => {
            let name = resolve_grammar(&ctx, grammar, &message)?;
            let tokens = ctx.tokenize(&name, standard.as_deref(), &message)?;
            println!("{}", serde_json::to_string_pretty(&tokens)?);
        }
        Command::Check {
            message,
            grammar,
            standard,
        } => {
            let name = resolve_grammar(&ctx, grammar, &message)?;
            let report = ctx.validate_message(&name, standard.as_deref(), &message)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Suggest {
            message,
            grammar,
            standard,
        } => {
            let name = resolve_grammar(&ctx, grammar, &message)?;
            let grammar = ctx
                .grammars()
                .get(&name, standard.as_deref())
                .with_context(|| format!("no grammar registered for \"{name}\""))?;
            let suggestions = ctx.suggest_at_end(Some(&grammar), &message).await;
            println!("{}", serde_json::to_string_pretty(&suggestions)?);
        }
        Command::Grammars => {
            for name in ctx.grammars().names() {
                println!("{name}");
            }
        }
    }

    Ok(())
}

/// Explicit `--grammar` wins; otherwise the message identifier decides.
fn resolve_grammar(
    ctx: &EngineContext,
    grammar: Option<String>,
    message: &str,
) -> anyhow::Result<String> {
    if let Some(name) = grammar {
        return Ok(name);
    }
    match ctx.detect_grammar(message).and_then(|g| g.name().map(str::to_string)) {
        Some(name) => Ok(name),
        None => bail!("could not detect a grammar from the message; pass --grammar"),
    }
}
