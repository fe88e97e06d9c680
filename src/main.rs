//! resilio command line
//!
//! Companion tooling for the counseling model: a terminal chat against the
//! inference server, plus the merge, zip and hub upload steps used to ship
//! the model.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use resilio::chat::{
    self, ChatClient, ChatClientError, ChatParams, HealthStatus, History, ReplExit,
};
use resilio::hub::{self, HubClient, HubError, RetryPolicy};
use resilio::{archive, merge};

#[derive(Debug, Parser)]
#[command(name = "resilio", about = "Mental health counseling model tooling", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Chat with the inference server from the terminal
    Chat {
        /// Inference server base URL
        #[arg(long, env = "INFERENCE_URL", default_value = "http://localhost:8001")]
        url: String,
        /// Maximum new tokens per reply
        #[arg(long, default_value_t = 512)]
        max_length: u32,
        /// Sampling temperature
        #[arg(long, default_value_t = 0.7)]
        temperature: f32,
        /// Nucleus sampling probability
        #[arg(long, default_value_t = 0.9)]
        top_p: f32,
        /// Seconds to wait for a reply
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },
    /// Upload a model folder to the hub, retrying each file
    Upload {
        /// Target repository, e.g. `user/model`
        #[arg(long)]
        repo: String,
        /// Folder to upload
        #[arg(long, default_value = "merged_mental_health_model")]
        folder: PathBuf,
        /// Hub access token
        #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
        token: Option<String>,
        /// Attempts per file
        #[arg(long, default_value_t = 5)]
        max_retries: u32,
        /// Hub base URL
        #[arg(long, default_value = "https://huggingface.co")]
        endpoint: String,
        /// Branch to commit to
        #[arg(long, default_value = "main")]
        revision: String,
        /// Seconds allowed per hub call; file transfers add time per byte
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },
    /// Zip a model folder
    Zip {
        /// Folder to archive
        #[arg(long, default_value = "merged_mental_health_model")]
        folder: PathBuf,
        /// Archive path; defaults to `<folder>.zip`
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Merge a LoRA adapter into its base model
    Merge {
        /// Base model directory or hub model id
        #[arg(long, default_value = "mistralai/Mistral-7B-Instruct-v0.3")]
        base: String,
        /// Adapter directory (`adapter_config.json` + `adapter_model.safetensors`)
        #[arg(long)]
        adapter: PathBuf,
        /// Output directory
        #[arg(long, default_value = "merged_mental_health_model")]
        output: PathBuf,
        /// Hub access token for gated base models
        #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Chat {
            url,
            max_length,
            temperature,
            top_p,
            timeout,
        } => {
            let params = ChatParams {
                max_length,
                temperature,
                top_p,
            };
            run_chat(&url, params, Duration::from_secs(timeout)).await
        }
        Command::Upload {
            repo,
            folder,
            token,
            max_retries,
            endpoint,
            revision,
            timeout,
        } => {
            let client = HubClient::new(&endpoint, &repo, &revision, token)?
                .with_timeout(Duration::from_secs(timeout));
            let policy = RetryPolicy {
                max_retries,
                ..RetryPolicy::default()
            };
            run_upload(&client, folder, &policy).await
        }
        Command::Zip { folder, output } => {
            let output = output.unwrap_or_else(|| archive::default_output(&folder));
            println!("Zipping folder '{}' to '{}'...", folder.display(), output.display());
            match archive::zip_folder(&folder, &output) {
                Ok(summary) => {
                    println!(
                        "✅ Done! Created {} ({} files)",
                        output.display(),
                        summary.files
                    );
                    Ok(ExitCode::SUCCESS)
                }
                Err(archive::ArchiveError::MissingFolder(path)) => {
                    eprintln!("❌ Folder not found: {}", path.display());
                    Ok(ExitCode::FAILURE)
                }
                Err(e) => Err(e).context("Failed to build archive"),
            }
        }
        Command::Merge {
            base,
            adapter,
            output,
            token,
        } => run_merge(base, adapter, output, token).await,
    }
}

async fn run_chat(url: &str, params: ChatParams, timeout: Duration) -> anyhow::Result<ExitCode> {
    let client = ChatClient::new(url, timeout, params)?;

    match client.health().await {
        Ok(HealthStatus::Online) => info!("Connected to {}", client.base_url()),
        Ok(HealthStatus::NotReady(status)) => {
            println!("⚠️  Server at {} answered {} on /health; continuing anyway", url, status);
        }
        Err(ChatClientError::Connect) | Err(ChatClientError::Timeout) => {
            eprintln!("❌ Cannot reach the inference server at {}", url);
            eprintln!("\nPlease ensure:");
            eprintln!("  1. The inference server is running (inference-server)");
            eprintln!("  2. The URL is correct (--url or INFERENCE_URL)");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e).context("Health check failed"),
    }

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    let mut history = History::default();
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    match chat::run_repl(stdin, &mut stdout, &client, &mut history, interrupt).await? {
        // The stdin reader thread would hold the runtime open until Enter
        ReplExit::Interrupted => std::process::exit(130),
        ReplExit::Quit | ReplExit::EndOfInput => Ok(ExitCode::SUCCESS),
    }
}

async fn run_upload(
    client: &HubClient,
    folder: PathBuf,
    policy: &RetryPolicy,
) -> anyhow::Result<ExitCode> {
    let report = match hub::upload_folder(client, &folder, policy).await {
        Ok(report) => report,
        Err(HubError::MissingFolder(path)) => {
            eprintln!("Folder not found: {}", path.display());
            return Ok(ExitCode::from(2));
        }
        Err(e) => return Err(e).context("Upload failed"),
    };

    if report.is_success() {
        println!("\nAll files uploaded successfully.");
        return Ok(ExitCode::SUCCESS);
    }

    println!("\nThe following files failed to upload:");
    for (path, error) in &report.failed {
        println!("   {} ({})", path, error);
    }
    println!(
        "\nSuggestions: retry the command, try from a different network, or upload from a cloud VM with a stable connection."
    );
    Ok(ExitCode::FAILURE)
}

async fn run_merge(
    base: String,
    adapter_dir: PathBuf,
    output: PathBuf,
    token: Option<String>,
) -> anyhow::Result<ExitCode> {
    println!("📦 Base model: {}", base);
    println!("🔧 Adapter: {}", adapter_dir.display());

    let report = tokio::task::spawn_blocking(move || -> Result<_, merge::MergeError> {
        let adapter = merge::LoraAdapter::load(&adapter_dir)?;
        info!(
            "Adapter has {} weight pairs, scale {}",
            adapter.len(),
            adapter.config.scale()
        );
        let base_dir = merge::resolve_base(&base, token)?;
        merge::merge_model(&base_dir, &adapter, &output).map(|report| (report, output))
    })
    .await
    .context("Merge task panicked")?;

    match report {
        Ok((report, output)) => {
            println!("✅ Merge complete: {} tensors updated", report.merged_tensors);
            println!("   Output: {}", output.display());
            println!(
                "   Total model size: {:.2} GB",
                report.output_bytes as f64 / (1024.0 * 1024.0 * 1024.0)
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(merge::MergeError::IncompatibleAdapter(reason)) => {
            eprintln!("❌ Incompatible adapter: {}", reason);
            eprintln!("\n   Ensure the adapter was trained on exactly this base model.");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e).context("Merge failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_upload_defaults() {
        let cli = Cli::try_parse_from(["resilio", "upload", "--repo", "me/model", "--token", "t"]).unwrap();
        match cli.command {
            Command::Upload {
                repo,
                folder,
                max_retries,
                endpoint,
                revision,
                timeout,
                ..
            } => {
                assert_eq!(repo, "me/model");
                assert_eq!(folder, PathBuf::from("merged_mental_health_model"));
                assert_eq!(max_retries, 5);
                assert_eq!(endpoint, "https://huggingface.co");
                assert_eq!(revision, "main");
                assert_eq!(timeout, 60);
            }
            other => panic!("Expected upload, got {:?}", other),
        }
    }

    #[test]
    fn test_chat_flags() {
        let cli = Cli::try_parse_from([
            "resilio",
            "chat",
            "--url",
            "http://gpu-box:8001",
            "--temperature",
            "0.3",
        ])
        .unwrap();
        match cli.command {
            Command::Chat {
                url,
                temperature,
                max_length,
                timeout,
                ..
            } => {
                assert_eq!(url, "http://gpu-box:8001");
                assert_eq!(temperature, 0.3);
                assert_eq!(max_length, 512);
                assert_eq!(timeout, 60);
            }
            other => panic!("Expected chat, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_requires_adapter() {
        assert!(Cli::try_parse_from(["resilio", "merge"]).is_err());
    }
}
