mod app;
mod cache;
mod chain;
mod config;
mod embeddings;
mod errors;
mod llm;
mod page;
mod retriever;
mod server;
mod service;
mod session;
mod utils;
mod vector_db;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::sync::Arc;

use config::Settings;
use service::{Neo4jOpenAiConnector, QaService};
use utils::{ANSWER_WIDTH, normalize_input, wrap_text};

#[derive(Parser)]
#[command(name = "filing-qa", about = "Question answering over SEC 10-K filings")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the single-page Q&A form (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Ask questions from the terminal
    Ask {
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: String,
    },
}

async fn ask_loop(service: &QaService, api_key: &str) -> Result<()> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        anyhow::bail!("Please enter your OpenAI API key to continue.");
    }

    let store = service
        .initialize_vector_store(api_key)
        .await
        .map_err(|e| anyhow::anyhow!("Error initializing vector store: {}", e))?;
    let chain = service
        .initialize_qa_chain(&store, api_key)
        .await
        .map_err(|e| anyhow::anyhow!("Error initializing QA chain: {}", e))?;

    println!("Ask about any company's 10-K filing (Ctrl+D to exit)");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let question = normalize_input(&line);
        if question.is_empty() {
            continue;
        }

        print!("Searching for relevant information...");
        std::io::stdout().flush()?;
        match service.get_answer(&question, &chain).await {
            Ok(answer) => println!("\r\nAnswer:\n{}\n", wrap_text(&answer.answer, ANSWER_WIDTH)),
            Err(e) => eprintln!("\rError getting answer: {}\n", e),
        }
    }

    Ok(())
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let retrieval = settings.retrieval.clone();
    let server_settings = settings.server.clone();

    let connector = Arc::new(Neo4jOpenAiConnector::new(settings));
    let service = Arc::new(QaService::new(connector, retrieval));

    match cli.command {
        Some(Command::Ask { api_key }) => ask_loop(&service, &api_key).await,
        Some(Command::Serve { host, port }) => {
            let host = host.unwrap_or(server_settings.host);
            let port = port.unwrap_or(server_settings.port);
            server::run(service, &host, port).await?;
            Ok(())
        }
        None => {
            server::run(service, &server_settings.host, server_settings.port).await?;
            Ok(())
        }
    }
}
