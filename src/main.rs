use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use kbforge::agent::{AgentClient, ChatSession};
use kbforge::kb::KnowledgeBaseClient;
use kbforge::pipeline::{IngestionPipeline, IngestionReport, OutcomeStatus};
use kbforge::source::{
    CloudDriveFolder, DriveCredentials, LocalDirectory, ObjectStorageBucket, S3Credentials,
    SourceConnector, UploadedFile, UserUpload, WikiAttachments, WikiCredentials,
};
use kbforge::{Config, StagingArea};

#[derive(Parser, Debug)]
#[command(name = "kbforge")]
#[command(about = "Populate a RAG knowledge base from local and remote document sources")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest supported files under the configured local root
    Local,
    /// Ingest specific files by path, staged as uploads
    Upload {
        /// Files to upload into the knowledge base
        files: Vec<PathBuf>,
    },
    /// Ingest supported objects from the configured storage bucket
    S3,
    /// Ingest supported files from the configured cloud drive
    Drive,
    /// Ingest supported page attachments from the configured wiki
    Wiki,
    /// Ask questions over the knowledge base (interactive)
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", "info"),
    )
    .init();

    let cli = Cli::parse();

    let config = Config::load()?;
    log::info!("Configuration loaded successfully");

    let staging = StagingArea::new(config.staging.root.clone());
    let kb = KnowledgeBaseClient::new(&config.knowledge_base.endpoint, &config.knowledge_base.table)?;
    let pipeline = IngestionPipeline::new(&staging, &kb);

    match cli.command {
        Command::Local => {
            let connector = LocalDirectory::new(config.local.root.clone());
            run_batch(&pipeline, &connector).await?;
        }
        Command::Upload { files } => {
            if files.is_empty() {
                anyhow::bail!("no files given; pass one or more paths to upload");
            }
            let uploads = read_uploads(&files)?;
            let connector = UserUpload::new(uploads);
            run_batch(&pipeline, &connector).await?;
        }
        Command::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .context("no [s3] section in config.toml")?;
            let credentials = s3_credentials_from_env(&s3.access_key_env, &s3.secret_key_env);
            let connector =
                ObjectStorageBucket::connect(&s3.bucket, &s3.region, credentials).await?;
            run_batch(&pipeline, &connector).await?;
        }
        Command::Drive => {
            let drive = config
                .drive
                .as_ref()
                .context("no [drive] section in config.toml")?;
            let blob = std::env::var(&drive.credentials_env).with_context(|| {
                format!("environment variable {} not set", drive.credentials_env)
            })?;
            let credentials = DriveCredentials::from_json(&blob)?;
            let connector =
                CloudDriveFolder::new(&drive.base_url, credentials, drive.folder_id.clone())?;
            run_batch(&pipeline, &connector).await?;
        }
        Command::Wiki => {
            let wiki = config
                .wiki
                .as_ref()
                .context("no [wiki] section in config.toml")?;
            let username = std::env::var(&wiki.username_env).unwrap_or_default();
            let token = std::env::var(&wiki.token_env).unwrap_or_default();
            let credentials = WikiCredentials::new(username, token)?;
            let connector = WikiAttachments::new(&wiki.base_url, credentials)?;
            run_batch(&pipeline, &connector).await?;
        }
        Command::Chat => {
            let agent = AgentClient::new(
                &config.agent.endpoint,
                config.agent.model.clone(),
                config.agent.history_turns,
            )?;
            chat_loop(&agent).await?;
        }
    }

    Ok(())
}

/// Run one ingestion batch and print its report.
async fn run_batch(
    pipeline: &IngestionPipeline<'_>,
    connector: &dyn SourceConnector,
) -> Result<()> {
    let report = pipeline.run(connector).await?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &IngestionReport) {
    println!(
        "Batch {} ({}): {} loaded, {} skipped, {} failed",
        report.batch_id,
        report.source_kind,
        report.loaded(),
        report.skipped(),
        report.failed()
    );

    for outcome in report.outcomes() {
        match &outcome.status {
            OutcomeStatus::Loaded => println!("  ✓ {}", outcome.doc.display_name),
            OutcomeStatus::Skipped { reason } => {
                println!("  - {} ({})", outcome.doc.display_name, reason)
            }
            OutcomeStatus::Failed { error } => {
                println!("  ✗ {}: {}", outcome.doc.display_name, error)
            }
        }
    }
}

/// Read the given paths into in-memory uploads.
fn read_uploads(files: &[PathBuf]) -> Result<Vec<UploadedFile>> {
    files
        .iter()
        .map(|path| {
            let name = path
                .file_name()
                .and_then(|s| s.to_str())
                .with_context(|| format!("path has no file name: {}", path.display()))?
                .to_string();
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(UploadedFile::new(name, bytes))
        })
        .collect()
}

fn s3_credentials_from_env(access_key_env: &str, secret_key_env: &str) -> Option<S3Credentials> {
    let access_key_id = std::env::var(access_key_env).ok()?;
    let secret_access_key = std::env::var(secret_key_env).ok()?;
    Some(S3Credentials {
        access_key_id,
        secret_access_key,
    })
}

/// Interactive ask loop. The chat session lives for the process lifetime
/// and is threaded explicitly through each question.
async fn chat_loop(agent: &AgentClient) -> Result<()> {
    let mut session = ChatSession::new();
    let stdin = std::io::stdin();
    let mut line = String::new();

    println!("Ask a question (empty line to exit):");
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            break;
        }

        match agent.ask(question, &mut session).await {
            Ok(answer) => println!("{answer}\n"),
            Err(e) => log::error!("{e}"),
        }
    }

    Ok(())
}
