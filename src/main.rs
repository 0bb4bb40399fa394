use anyhow::Result;
use clap::{Parser, Subcommand};
use nl2sql::config::AppConfig;
use nl2sql::{logging, App};
use std::collections::HashMap;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "nl2sql")]
#[command(about = "Ask questions about a PostgreSQL database in plain language")]
#[command(version)]
struct Args {
    /// PostgreSQL connection string (or set DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// LLM API key (or set GROQ_API_KEY env var)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Model name (or set LLM_MODEL env var)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a question to SQL, run it and print the result as JSON
    Ask {
        /// The question in natural language
        question: String,
    },
    /// Print the prompt that would be sent to the model
    Prompt {
        /// The question in natural language
        question: String,
    },
    /// Print the introspected schema as JSON
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init();

    let args = Args::parse();

    let mut vars: HashMap<String, String> = std::env::vars().collect();
    if let Some(url) = args.database_url {
        vars.insert("DATABASE_URL".to_string(), url);
    }
    if let Some(key) = args.api_key {
        vars.insert("GROQ_API_KEY".to_string(), key);
    }
    if let Some(model) = args.model {
        vars.insert("LLM_MODEL".to_string(), model);
    }

    let config = AppConfig::from_vars(&vars)?;
    let app = App::bootstrap(&config).await?;

    match args.command {
        Commands::Ask { question } => match app.service.ask(&question).await {
            Ok(response) => {
                info!("{}", response.explanation);
                println!("{}", serde_json::to_string_pretty(&response)?);
            }
            Err(e) => {
                error!("Request failed ({}): {}", e.status_code(), e);
                return Err(e.into());
            }
        },
        Commands::Prompt { question } => {
            println!("{}", app.service.preview_prompt(&question)?);
        }
        Commands::Schema => {
            let schema = app.service.catalog().snapshot();
            println!("{}", serde_json::to_string_pretty(&*schema)?);
        }
    }

    Ok(())
}
