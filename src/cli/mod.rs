//! Command-line interface for callarchive.
//!
//! - `callarchive run` - archive new conversations (one pass)
//! - `callarchive status` - show the checkpoint
//! - `callarchive config` - show resolved configuration

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::adapters::{ConversationClient, DocsClient, DriveClient, GoogleAuth};
use crate::adapters::google::ServiceAccountKey;
use crate::checkpoint::{self, CheckpointStore};
use crate::config::{self, Credentials, ResolvedConfig};
use crate::core::{Orchestrator, RunLock, RunOptions, Services};
use crate::domain::{ItemOutcome, RunReport};

/// callarchive - archive agent calls to Drive and a shared Doc
#[derive(Parser, Debug)]
#[command(name = "callarchive")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (skips discovery)
    #[arg(long, env = "CALLARCHIVE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub credentials: CredentialArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Secrets and target IDs; usually supplied through the environment
#[derive(Args, Debug, Default)]
pub struct CredentialArgs {
    /// Conversation provider API key
    #[arg(long, env = "ELEVENLABS_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Agent whose conversations are archived
    #[arg(long, env = "AGENT_ID", global = true)]
    pub agent_id: Option<String>,

    /// Google Doc that records are added to
    #[arg(long, env = "GOOGLE_DOC_ID", global = true)]
    pub doc_id: Option<String>,

    /// Drive folder that audio is uploaded to
    #[arg(long, env = "DRIVE_FOLDER_ID", global = true)]
    pub drive_folder_id: Option<String>,

    /// Service account key (JSON text)
    #[arg(long, env = "GOOGLE_CREDENTIALS_JSON", global = true, hide_env_values = true)]
    pub google_credentials: Option<String>,
}

impl CredentialArgs {
    fn into_credentials(self) -> Result<Credentials> {
        Ok(Credentials::from_parts(
            self.api_key,
            self.agent_id,
            self.doc_id,
            self.drive_folder_id,
            self.google_credentials,
        )?)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Archive new conversations (one pass)
    Run {
        /// Show what would be processed without processing it
        #[arg(long)]
        dry_run: bool,

        /// Stop after N conversations
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show checkpoint status
    Status,

    /// Show resolved configuration
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = config::load_config(self.config.as_deref())?;

        match self.command {
            Commands::Run { dry_run, limit } => {
                let options = RunOptions { dry_run, limit };
                run_pipeline(&config, self.credentials, options).await
            }
            Commands::Status => show_status(&config).await,
            Commands::Config => {
                show_config(&config, &self.credentials);
                Ok(())
            }
        }
    }
}

/// Wire up the real clients and run one pass
async fn run_pipeline(config: &ResolvedConfig, args: CredentialArgs, options: RunOptions) -> Result<()> {
    let credentials = args.into_credentials()?;

    let _lock = if options.dry_run {
        None
    } else {
        Some(RunLock::acquire(&config.lock_path())?)
    };

    let http = config.http_client()?;

    let key = ServiceAccountKey::from_json(&credentials.google_credentials_json)
        .context("Failed to load Google service account credentials")?;
    let auth = Arc::new(
        GoogleAuth::new(key, http.clone()).context("Failed to set up Google authentication")?,
    );
    if !options.dry_run {
        auth.access_token()
            .await
            .context("Google authentication failed")?;
        tracing::info!(account = auth.client_email(), "Authenticated with Google");
    }

    let conversations = Arc::new(ConversationClient::new(
        &credentials.provider(config),
        &config.work_dir,
        http.clone(),
    ));
    let services = Services {
        source: conversations.clone(),
        audio: conversations,
        artifacts: Arc::new(DriveClient::new(
            config.drive_upload_url.clone(),
            auth.clone(),
            http.clone(),
        )),
        sink: Arc::new(DocsClient::new(
            config.docs_url.clone(),
            credentials.document_id.clone(),
            auth,
            http,
        )),
    };

    let store: Box<dyn CheckpointStore> = if options.dry_run {
        Box::new(
            checkpoint::snapshot(config.checkpoint_backend, &config.checkpoint_path)
                .await
                .with_context(|| {
                    format!(
                        "Failed to read checkpoint: {}",
                        config.checkpoint_path.display()
                    )
                })?,
        )
    } else {
        checkpoint::open(config.checkpoint_backend, &config.checkpoint_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to open checkpoint: {}",
                    config.checkpoint_path.display()
                )
            })?
    };

    let mut orchestrator = Orchestrator::new(
        services,
        store,
        credentials.agent_id.clone(),
        credentials.drive_folder_id.clone(),
    );

    let report = orchestrator.run(options).await?;
    print_report(&report);

    Ok(())
}

fn print_report(report: &RunReport) {
    println!();
    println!("Run {}", report.run_id);
    println!("══════════════════════════════════════════════════════════════");
    println!("  Discovered:         {}", report.discovered);
    println!("  Already processed:  {}", report.already_processed);
    println!("  Pending:            {}", report.pending);

    if report.pending == 0 {
        println!();
        println!("No new conversations.");
        return;
    }

    if report.dry_run {
        println!();
        println!("Dry run - would process:");
        for id in &report.pending_ids {
            println!("  {}", id);
        }
        return;
    }

    println!("  Processed:          {}", report.processed());
    println!("  Skipped:            {}", report.skipped());
    if report.upload_failures() > 0 {
        println!("  Upload failures:    {}", report.upload_failures());
    }
    println!();

    for (id, outcome) in &report.items {
        match outcome {
            ItemOutcome::Processed {
                uploaded,
                record_written,
            } => {
                let mut notes = Vec::new();
                if !uploaded {
                    notes.push("upload failed");
                }
                if !record_written {
                    notes.push("record not written");
                }
                if notes.is_empty() {
                    println!("  [DONE] {}", id);
                } else {
                    println!("  [DONE] {} ({})", id, notes.join(", "));
                }
            }
            ItemOutcome::Skipped { stage, reason } => {
                println!("  [SKIP] {} ({} unavailable: {})", id, stage, reason);
            }
        }
    }
}

/// Show checkpoint status
async fn show_status(config: &ResolvedConfig) -> Result<()> {
    let store = checkpoint::snapshot(config.checkpoint_backend, &config.checkpoint_path)
        .await
        .with_context(|| {
            format!(
                "Failed to read checkpoint: {}",
                config.checkpoint_path.display()
            )
        })?;

    println!();
    println!("Checkpoint");
    println!("══════════════════════════════════════════════════════════════");
    println!("  Backend:    {}", config.checkpoint_backend);
    println!("  Location:   {}", config.checkpoint_path.display());
    println!("  Processed:  {}", store.len());
    println!();

    let lock_path = config.lock_path();
    match RunLock::acquire(&lock_path) {
        Ok(_) => println!("✓ No run in progress"),
        Err(_) => println!("⚠️  A run is in progress (lock: {})", lock_path.display()),
    }

    Ok(())
}

/// Show the resolved configuration (secrets are never printed)
fn show_config(config: &ResolvedConfig, credentials: &CredentialArgs) {
    let set = |v: &Option<String>| if v.is_some() { "set" } else { "NOT SET" };

    println!();
    println!("callarchive configuration");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Endpoints:");
    println!("  Provider:      {}", config.provider_base_url);
    println!("  Drive upload:  {}", config.drive_upload_url);
    println!("  Docs:          {}", config.docs_url);
    println!("  Page size:     {}", config.page_size);
    println!("  HTTP timeout:  {}s", config.http_timeout.as_secs());
    println!();
    println!("Paths:");
    println!("  Checkpoint:    {} ({})", config.checkpoint_path.display(), config.checkpoint_backend);
    println!("  Work dir:      {}", config.work_dir.display());
    println!("  Lock file:     {}", config.lock_path().display());
    println!();
    println!("Credentials:");
    println!("  ELEVENLABS_API_KEY:       {}", set(&credentials.api_key));
    println!(
        "  AGENT_ID:                 {}",
        credentials.agent_id.as_deref().unwrap_or("NOT SET")
    );
    println!(
        "  GOOGLE_DOC_ID:            {}",
        credentials.doc_id.as_deref().unwrap_or("NOT SET")
    );
    println!(
        "  DRIVE_FOLDER_ID:          {}",
        credentials.drive_folder_id.as_deref().unwrap_or("NOT SET")
    );
    println!("  GOOGLE_CREDENTIALS_JSON:  {}", set(&credentials.google_credentials));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "callarchive",
            "run",
            "--dry-run",
            "--limit",
            "3",
            "--agent-id",
            "agent_1",
        ])
        .unwrap();

        assert_eq!(cli.credentials.agent_id.as_deref(), Some("agent_1"));
        match cli.command {
            Commands::Run { dry_run, limit } => {
                assert!(dry_run);
                assert_eq!(limit, Some(3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_missing_credentials_are_reported() {
        let args = CredentialArgs {
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        let err = args.into_credentials().unwrap_err();
        assert!(err.to_string().contains("AGENT_ID"));
    }
}
