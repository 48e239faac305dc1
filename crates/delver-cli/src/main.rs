//! `delver` command-line entry point.

mod config;

use clap::{Parser, Subcommand};
use config::DelverConfig;
use delver_agent::InferenceClient;
use delver_core::Role;
use delver_orchestrator::clarification::format_question_list;
use delver_orchestrator::{ConversationDriver, ResearchEvent, ResearchManager, ResearchQuery};
use delver_session::ConversationStage;
use futures_util::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;
use tracing_subscriber::EnvFilter;

type Input = Lines<BufReader<Stdin>>;

#[derive(Parser)]
#[command(name = "delver", about = "Delver: multi-stage web research agent")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "delver.toml")]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Research one query and print the report
    Research {
        query: String,
        /// Skip the clarifying questions
        #[arg(long)]
        no_clarify: bool,
    },
    /// Interactive research chat
    Chat,
}

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = DelverConfig::load(&cli.config).await?;
    info!(
        provider = ?config.model.provider,
        model = %config.model.model_id,
        "Starting Delver"
    );

    let client = InferenceClient::new(config.model)?;
    let manager = Arc::new(
        ResearchManager::new(Arc::new(client)).with_include_date(config.research.include_date),
    );
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    match cli.command {
        Commands::Research { query, no_clarify } => {
            research(&manager, query, no_clarify, &mut input).await?;
        }
        Commands::Chat => chat(manager, &mut input).await?,
    }

    Ok(())
}

async fn research(
    manager: &ResearchManager,
    query: String,
    no_clarify: bool,
    input: &mut Input,
) -> anyhow::Result<()> {
    let mut request = ResearchQuery::new(query.clone());

    if !no_clarify {
        let questions = manager.get_clarifying_questions(&query).await?;
        if !questions.is_empty() {
            println!("{}", format_question_list(questions.as_slice()));
            println!("\nAnswer each question on its own line (empty line to finish):");
            let answers = read_answers(input, questions.len()).await?;
            request = ResearchQuery::from_answers(query, &questions, &answers);
        }
    }

    let mut events = manager.run(request);
    while let Some(event) = events.next().await {
        match event? {
            ResearchEvent::Report(report) => {
                println!("\n{}\n", report.markdown_report);
                if !report.follow_up_questions.is_empty() {
                    println!("Follow-up questions:");
                    for question in &report.follow_up_questions {
                        println!("- {question}");
                    }
                }
            }
            status => eprintln!("{status}"),
        }
    }
    Ok(())
}

async fn chat(manager: Arc<ResearchManager>, input: &mut Input) -> anyhow::Result<()> {
    let driver = ConversationDriver::new(manager);
    let mut transcript = Vec::new();
    let mut state = driver.start_session();

    println!("Delver research chat. Ask a question, Ctrl-D to quit.");
    loop {
        let message = if state.stage == ConversationStage::AwaitingAnswers {
            println!("(one answer per line, empty line to finish)");
            read_answers(input, state.questions.len()).await?
        } else {
            print!("> ");
            std::io::stdout().flush()?;
            match input.next_line().await? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => line,
                None => break,
            }
        };

        let mut updates = driver.turn(message, transcript.clone(), state.clone());
        let mut shown = String::new();
        while let Some(update) = updates.next().await {
            match update {
                Ok(update) => {
                    if let Some(reply) = update
                        .transcript
                        .last()
                        .filter(|m| m.role == Role::Assistant)
                    {
                        show_progress(&mut shown, &reply.content)?;
                    }
                    transcript = update.transcript;
                    state = update.state;
                }
                Err(e) => eprintln!("error: {e}"),
            }
        }
        println!();
    }
    Ok(())
}

/// Read up to `max` lines, stopping early at an empty line or EOF.
async fn read_answers(input: &mut Input, max: usize) -> anyhow::Result<String> {
    let mut answers = Vec::new();
    while answers.len() < max {
        match input.next_line().await? {
            Some(line) if !line.trim().is_empty() => answers.push(line),
            _ => break,
        }
    }
    Ok(answers.join("\n"))
}

/// Print only what changed since the last update of the same reply.
fn show_progress(shown: &mut String, content: &str) -> std::io::Result<()> {
    match content.strip_prefix(shown.as_str()) {
        Some(rest) if !shown.is_empty() => print!("{rest}"),
        _ => print!("\n{content}"),
    }
    std::io::stdout().flush()?;
    *shown = content.to_string();
    Ok(())
}
