mod answer;
mod config;
mod literal;
mod logparse;
mod runner;

use agent::Result;
use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(about = "Ask a research question and decode the structured answer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Research a query; prompts for one on stdin when omitted
    Ask {
        query: Option<String>,

        #[command(flatten)]
        args: config::ModelArgs,
    },
    /// Recover structured records from a log of raw responses
    ParseLog {
        /// Log file, stdin when omitted
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Ask { query, args } => ask(query, config::Config::try_from(args)?).await,
        Command::ParseLog { path } => parse_log(path),
    }
}

async fn ask(query: Option<String>, config: config::Config) -> Result<()> {
    let llm = agent::llm::Retrying::new(
        agent::llm::OpenAI::new(&config.model),
        config.timeout,
        config.max_retries,
    );
    let runner = runner::Runner::new(llm, config.output_file.clone(), config.max_iterations)
        .with_transcript(config.verbose);

    let query = match query {
        Some(query) => query,
        None => prompt("What can i help you research? ")?,
    };

    let raw = runner.ask(&query).await?;
    println!("{}", raw);

    if let Some(path) = &config.log_file {
        let mut log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(log, "{}", raw)?;
    }

    println!("...............................\n");

    match runner.decode(&raw) {
        Ok(answer) => println!("{}", serde_json::to_string_pretty(&answer)?),
        Err(e) => {
            error!(error = %e, raw = %raw.output, "model output does not match the answer schema");
            println!("Error parsing response: {} Raw Response - {}", e, raw);
        }
    }

    Ok(())
}

fn prompt(text: &str) -> Result<String> {
    print!("{}", text);
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn parse_log(path: Option<PathBuf>) -> Result<()> {
    let blob = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut blob = String::new();
            std::io::stdin().read_to_string(&mut blob)?;
            blob
        }
    };

    let recovery = logparse::parse_log(&blob);
    for record in &recovery.records {
        println!("{}", serde_json::to_string(record)?);
    }

    eprintln!(
        "recovered {} records, skipped {} lines",
        recovery.records.len(),
        recovery.issues.len()
    );
    Ok(())
}
