use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fivetran_schema_sync::{
    apply::{self, ColumnStep, TableStep},
    save_table_configs, Config, SchemaClient,
};
use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    time::Duration,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Sync connector table/column settings with a folder of JSON descriptors.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Per-request timeout in seconds, overrides FIVETRAN_TIMEOUT_SECS
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write one `<table>.json` per table of the connection
    Export {
        #[arg(long, alias = "connection_id")]
        connection_id: String,

        /// Folder to write descriptors into (created if missing)
        #[arg(long, alias = "folder_name")]
        folder_name: PathBuf,
    },
    /// Push edited descriptors to the connection, then re-export the folder
    Apply {
        #[arg(long, alias = "connection_id")]
        connection_id: String,

        /// Folder holding the descriptors to apply
        #[arg(long, alias = "folder_path")]
        folder_path: PathBuf,

        /// Only log the patches that would be sent
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_target(false)
        .init();

    let args = Args::parse();

    let mut config = Config::from_env().context("loading configuration")?;
    if let Some(secs) = args.timeout_secs {
        if secs == 0 {
            bail!("--timeout-secs must be positive");
        }
        config = config.with_timeout(Duration::from_secs(secs));
    }
    let client = SchemaClient::new(config).context("building HTTP client")?;

    match args.command {
        Command::Export {
            connection_id,
            folder_name,
        } => {
            let written = save_table_configs(&client, &connection_id, &folder_name)
                .await
                .with_context(|| format!("exporting {} into {}", connection_id, folder_name.display()))?;
            info!(files = written.len(), "done");
            Ok(ExitCode::SUCCESS)
        }
        Command::Apply {
            connection_id,
            folder_path,
            dry_run: true,
        } => dry_run(&client, &connection_id, &folder_path).await,
        Command::Apply {
            connection_id,
            folder_path,
            dry_run: false,
        } => {
            let report = apply::apply_table_configs(&client, &connection_id, &folder_path)
                .await
                .with_context(|| format!("applying {} to {}", folder_path.display(), connection_id))?;

            println!("List of failed tables: {}", serde_json::to_string(&report.table_errors)?);
            println!("List of failed columns: {}", serde_json::to_string(&report.column_errors)?);
            println!(
                "List of invalid descriptor files: {}",
                serde_json::to_string(&report.file_errors)?
            );

            if report.is_clean() {
                Ok(ExitCode::SUCCESS)
            } else {
                warn!("apply finished with failures");
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

async fn dry_run(client: &SchemaClient, connection_id: &str, folder: &Path) -> Result<ExitCode> {
    let schema_name = client
        .get_schema_name(connection_id)
        .await
        .context("resolving schema name")?;
    let loaded = apply::load_plans(folder)
        .with_context(|| format!("reading descriptors from {}", folder.display()))?;

    let mut calls = 0;
    for plan in &loaded.plans {
        let table = plan.table.as_str();
        match &plan.table_step {
            TableStep::Skip => info!(table, "table patch not allowed, skipping"),
            TableStep::Patch(patch) => {
                let body = serde_json::to_string(patch)?;
                info!(table, schema = %schema_name, body = %body, "would patch table");
            }
            TableStep::Invalid(message) => warn!(table, error = %message, "table patch invalid"),
        }
        for step in &plan.column_steps {
            match step {
                ColumnStep::Patch { column, patch } => {
                    let body = serde_json::to_string(patch)?;
                    info!(table, column = %column, body = %body, "would patch column");
                }
                ColumnStep::Denied { column } => info!(table, column = %column, "column update not allowed"),
                ColumnStep::Invalid { column, message } => {
                    warn!(table, column = %column, error = %message, "column patch invalid")
                }
            }
        }
        calls += plan.call_count();
    }
    for bad in &loaded.file_errors {
        warn!(path = %bad.path.display(), error = %bad.error, "invalid descriptor");
    }
    info!(tables = loaded.plans.len(), calls, "dry run complete, nothing sent");

    if loaded.file_errors.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
