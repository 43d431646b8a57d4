use std::io;

use clap::{CommandFactory, Parser};
use colored::*;
use tracing_subscriber::EnvFilter;

use answer_overlay::backend::{HttpBackend, SaveOutcome};
use answer_overlay::cli::{Args, Command};
use answer_overlay::config::{load_config, OverlayConfig};
use answer_overlay::error::OverlayError;
use answer_overlay::terminal::{render_field, render_transcript};
use answer_overlay::web;
use answer_overlay::workspace::{FieldSpec, Workspace};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("answer_overlay=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Register `question` if the config doesn't know it, so ad-hoc ids work.
fn ensure_field(
    workspace: &mut Workspace,
    config: &OverlayConfig,
    question: &str,
) -> Result<(), OverlayError> {
    if workspace.field(question).is_none() {
        workspace.register(FieldSpec::new(question).progress_width(config.layout.progress_width))?;
    }
    Ok(())
}

async fn evaluate(
    workspace: &mut Workspace,
    backend: &HttpBackend,
    config: &OverlayConfig,
    question: &str,
    answer: &str,
) -> Result<(), OverlayError> {
    ensure_field(workspace, config, question)?;
    workspace.input(question, answer)?;
    workspace.evaluate(backend, question).await
}

fn print_save_outcome(outcome: SaveOutcome) -> Result<(), OverlayError> {
    match outcome {
        SaveOutcome::Status(message) => println!("{}", message.bright_green()),
        SaveOutcome::Artifact { filename, bytes } => {
            std::fs::write(&filename, &bytes)?;
            println!(
                "{}",
                format!("Saved {} bytes to {}", bytes.len(), filename).bright_green()
            );
        }
    }
    Ok(())
}

async fn run(args: Args) -> Result<(), OverlayError> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(url) = args.backend.clone() {
        config.backend.base_url = url;
    }
    let bar_width = args.bar_width.max(1);

    match args.command {
        Command::Serve { port } => {
            web::serve(port)
                .await
                .map_err(|e| OverlayError::Io(io::Error::other(e.to_string())))?;
        }
        Command::Completions { shell } => {
            let mut cmd = Args::command();
            clap_complete::generate(shell, &mut cmd, "answer-overlay", &mut io::stdout());
        }
        Command::Evaluate { question, answer } => {
            let backend = HttpBackend::new(&config.backend);
            let mut workspace = Workspace::from_config(&config)?;
            evaluate(&mut workspace, &backend, &config, &question, &answer).await?;
            if let Some(field) = workspace.field(&question) {
                print!("{}", render_field(field, bar_width));
            }
        }
        Command::Discuss {
            question,
            answer,
            item,
        } => {
            let backend = HttpBackend::new(&config.backend);
            let mut workspace = Workspace::from_config(&config)?;
            evaluate(&mut workspace, &backend, &config, &question, &answer).await?;
            if let Some(field) = workspace.field(&question) {
                print!("{}", render_field(field, bar_width));
            }
            workspace
                .select_item(&backend, &question, item.saturating_sub(1))
                .await?;
            println!();
            print!("{}", render_transcript(workspace.transcript()));
        }
        Command::Chat { message } => {
            let backend = HttpBackend::new(&config.backend);
            let mut workspace = Workspace::from_config(&config)?;
            let report = workspace.send_chat(&backend, &message).await?;
            print!("{}", render_transcript(workspace.transcript()));
            for field in workspace.fields().filter(|f| !f.panel.items.is_empty()) {
                print!("{}", render_field(field, bar_width));
            }
            for target in &report.ignored {
                eprintln!("{}", format!("  (no destination for '{target}')").dimmed());
            }
        }
        Command::Save { answers } => {
            let backend = HttpBackend::new(&config.backend);
            let mut workspace = Workspace::from_config(&config)?;
            for (question, text) in answers {
                ensure_field(&mut workspace, &config, &question)?;
                workspace.input(&question, text)?;
            }
            let outcome = workspace.save(&backend).await?;
            print_save_outcome(outcome)?;
        }
        Command::Load => {
            let backend = HttpBackend::new(&config.backend);
            let mut workspace = Workspace::from_config(&config)?;
            workspace.load(&backend).await?;
            for (question, text) in &workspace.answers() {
                println!("{} {}", format!("[{question}]").bold(), text);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("{} {}", "error:".bright_red().bold(), e);
        std::process::exit(1);
    }
}
