//! llmops-gateway — command-line driver for the gateway.
//!
//! Reads configuration from the environment (see [`llmops_gateway::config`]),
//! sends one chat request or prints a health report.

use std::io::{self, IsTerminal, Read};

use clap::{Parser, Subcommand};
use llmops_gateway::{ChatGateway, ChatRequest, Gateway, GatewayConfig, Message};

/// LLM gateway CLI
#[derive(Parser)]
#[command(name = "llmops-gateway")]
#[command(version)]
#[command(about = "Caching, instrumented LLM gateway")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the active provider and cache status
    Health,

    /// Ask a question
    Chat {
        /// User message (or omit to read from stdin)
        message: Option<String>,
        /// Model or deployment override
        #[arg(short, long)]
        model: Option<String>,
        /// Sampling temperature
        #[arg(short, long)]
        temperature: Option<f32>,
        /// Maximum output tokens
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Department tag for run records
        #[arg(short, long, env = "GATEWAY_DEPARTMENT")]
        department: Option<String>,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: info for the gateway; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,llmops_gateway=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let config = GatewayConfig::from_env()?;
    let gateway = Gateway::from_config(&config).await?;

    match args.command {
        Command::Health => {
            let report = gateway.health().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_healthy() {
                std::process::exit(1);
            }
        }

        Command::Chat {
            message,
            model,
            temperature,
            max_tokens,
            department,
            json,
        } => {
            let message = resolve_text(message, "chat")?;
            let mut request = ChatRequest::new(vec![Message::user(message)]);
            request.model = model;
            request.temperature = temperature;
            request.max_tokens = max_tokens;
            if let Some(department) = department {
                request = request.metadata("department", department);
            }

            let response = ask(&gateway, &request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", response.content);
            }
        }
    }

    Ok(())
}

async fn ask(
    gateway: &dyn ChatGateway,
    request: &ChatRequest,
) -> llmops_gateway::Result<llmops_gateway::ChatResponse> {
    gateway.handle(request).await
}

/// Resolve text input from an optional CLI argument and/or stdin.
///
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → error
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_is_pipe = !io::stdin().is_terminal();
    let stdin_text = if stdin_is_pipe {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    } else {
        None
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass text as argument or via stdin)").into())
        }
    }
}
