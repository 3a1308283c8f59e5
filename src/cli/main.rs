use clap::{Parser, Subcommand};
use reqwest::{Client, Response};
use serde_json::json;
use std::error::Error;

#[derive(Parser)]
#[command(name = "dlq-cli")]
#[command(about = "Dead-letter queue manager CLI", long_about = None)]
struct Cli {
    #[arg(short, long, env = "DLQ_MANAGER_ENDPOINT", default_value = "http://localhost:8080")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every dead-lettered message (non-destructive)
    List,

    /// Peek a single page of dead-lettered messages
    Page {
        #[arg(short, long, default_value = "0")]
        from_sequence: i64,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Lock a batch of dead-lettered messages without completing them
    Leased,

    /// Complete (remove) the first dead-lettered message with this identifier
    Complete {
        #[arg(value_name = "MESSAGE_ID")]
        message_id: String,
    },

    /// Remove every dead-lettered message. This cannot be undone.
    Drain {
        /// Confirm the drain
        #[arg(long)]
        yes: bool,
    },

    /// Publish a body back onto the primary queue
    Resubmit {
        #[arg(short, long)]
        message_id: Option<String>,

        #[arg(short, long)]
        body: String,
    },

    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let client = Client::new();

    let response = match cli.command {
        Commands::List => {
            client
                .get(format!("{}/v1/dlq/messages", cli.endpoint))
                .send()
                .await?
        }

        Commands::Page {
            from_sequence,
            limit,
        } => {
            let mut url = format!(
                "{}/v1/dlq/messages/page?from_sequence={}",
                cli.endpoint, from_sequence
            );
            if let Some(limit) = limit {
                url.push_str(&format!("&limit={}", limit));
            }
            client.get(&url).send().await?
        }

        Commands::Leased => {
            client
                .get(format!("{}/v1/dlq/messages/leased", cli.endpoint))
                .send()
                .await?
        }

        Commands::Complete { message_id } => {
            client
                .post(format!("{}/v1/dlq/messages/complete", cli.endpoint))
                .json(&json!({ "message_id": message_id }))
                .send()
                .await?
        }

        Commands::Drain { yes } => {
            if !yes {
                eprintln!("Draining permanently removes every dead-lettered message.");
                eprintln!("Re-run with --yes to confirm.");
                std::process::exit(2);
            }
            client
                .post(format!("{}/v1/dlq/drain", cli.endpoint))
                .send()
                .await?
        }

        Commands::Resubmit { message_id, body } => {
            client
                .post(format!("{}/v1/queue/resubmit", cli.endpoint))
                .json(&json!({ "message_id": message_id, "body": body }))
                .send()
                .await?
        }

        Commands::Health => {
            client
                .get(format!("{}/health", cli.endpoint))
                .send()
                .await?
        }
    };

    print_response(response).await
}

async fn print_response(response: Response) -> Result<(), Box<dyn Error>> {
    let status = response.status();
    let text = response.text().await?;
    if let Some(rendered) = render_body(&text) {
        println!("{}", rendered);
    }

    if !status.is_success() {
        eprintln!("Request failed with status {}", status);
        std::process::exit(1);
    }
    Ok(())
}

/// Pretty-print JSON bodies. Rejections and timeouts come back as plain
/// text or an empty body, which are shown as-is.
fn render_body(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(body) => serde_json::to_string_pretty(&body).ok(),
        Err(_) => Some(text.to_string()),
    }
}
