use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use url::Url;

#[derive(Parser)]
#[command(name = "config-cli")]
#[command(about = "Management CLI for the config push server", long_about = None)]
struct Cli {
    #[arg(short, long, env = "CONFIG_SERVER_URL", default_value = "http://localhost:8888")]
    url: Url,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all labels
    List,
    /// Show the current config of a label
    Get { label: String },
    /// Show archived versions of a label, or one version
    History {
        label: String,
        #[arg(long)]
        version: Option<u64>,
    },
    /// Create a label from a JSON file of entries
    Create { label: String, file: PathBuf },
    /// Upsert entries from a JSON file into a label
    Patch { label: String, file: PathBuf },
    /// Replace a label's entries with a JSON file
    Put { label: String, file: PathBuf },
    /// Report the version a client has applied
    Feedback {
        label: String,
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        client_version: u64,
    },
    /// Print change notifications for a label as they arrive
    Watch { label: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url;

    match cli.command {
        Commands::List => {
            let res = client.get(endpoint(&base, &["config"])?).send().await?;
            print_response(res).await?;
        }
        Commands::Get { label } => {
            let res = client.get(endpoint(&base, &["config", &label])?).send().await?;
            print_response(res).await?;
        }
        Commands::History { label, version } => {
            let url = match version {
                Some(v) => endpoint(&base, &["config", &label, "history", &v.to_string()])?,
                None => endpoint(&base, &["config", &label, "history"])?,
            };
            print_response(client.get(url).send().await?).await?;
        }
        Commands::Create { label, file } => {
            let entries = read_entries(&file)?;
            let res = client
                .post(endpoint(&base, &["config", &label])?)
                .json(&entries)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Patch { label, file } => {
            let entries = read_entries(&file)?;
            let res = client
                .patch(endpoint(&base, &["config", &label])?)
                .json(&entries)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Put { label, file } => {
            let entries = read_entries(&file)?;
            let res = client
                .put(endpoint(&base, &["config", &label])?)
                .json(&entries)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Feedback {
            label,
            client_id,
            client_version,
        } => {
            let res = client
                .post(endpoint(&base, &["config", "feedback"])?)
                .json(&json!({
                    "label": label,
                    "clientId": client_id,
                    "clientVersion": client_version,
                    "lastUpdateTime": Utc::now(),
                }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Watch { label } => {
            let mut res = client
                .get(endpoint(&base, &["config", "notification", &label])?)
                .send()
                .await?;
            if !res.status().is_success() {
                return print_response(res).await;
            }
            eprintln!("Watching {label}, Ctrl+C to stop");
            while let Some(chunk) = res.chunk().await? {
                print!("{}", String::from_utf8_lossy(&chunk));
            }
            eprintln!("Stream closed by server");
        }
    }

    Ok(())
}

fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, Box<dyn std::error::Error>> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| "server URL cannot be a base")?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn read_entries(path: &PathBuf) -> Result<Value, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;
    if !value.is_array() {
        return Err(format!("{} must contain a JSON array of entries", path.display()).into());
    }
    Ok(value)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if !text.is_empty() {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }
    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }

    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
