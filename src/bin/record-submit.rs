use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use distribution_records::client::SubmissionClient;
use distribution_records::config::Config;
use distribution_records::migrate::{read_legacy_rows, write_backup, Migrator};
use distribution_records::normalize::{preview, FormNormalizer, RawForm};
use distribution_records::store::DuckDbStore;
use distribution_records::FormSubmitter;

/// Submit distribution records to an ingestion endpoint.
#[derive(Debug, Parser)]
#[command(name = "record-submit", version)]
struct Cli {
    /// TOML config file. Defaults to the per-user config file if present.
    #[arg(long, global = true, env = "DISTRIBUTION_RECORDS_CONFIG")]
    config: Option<PathBuf>,

    /// Endpoint URL, overriding the config file.
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Normalize one form and submit it.
    Submit {
        /// JSON object of form field ids to values.
        #[arg(long)]
        form: Option<PathBuf>,

        /// A single form field as id=value. Repeat a field id for lists.
        #[arg(long = "field", value_name = "ID=VALUE")]
        fields: Vec<String>,

        /// Print the normalized record instead of submitting it.
        #[arg(long)]
        preview: bool,
    },
    /// Resubmit rows of a legacy records sheet.
    Migrate {
        /// DuckDB file holding the legacy sheet.
        #[arg(long)]
        source: PathBuf,

        #[arg(long, default_value = "records")]
        sheet: String,

        /// Pause between submissions, in milliseconds.
        #[arg(long, default_value_t = 1000)]
        delay_ms: u64,

        /// Transform the first row and print it; submit nothing.
        #[arg(long)]
        dry_run: bool,

        /// Write the legacy rows to this JSON file first (.gz compresses).
        #[arg(long)]
        backup: Option<PathBuf>,
    },
    /// Check that the endpoint is up.
    Health,
    /// List stored records.
    List {
        #[arg(long, default_value_t = 100)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Show one stored record.
    Get { id: String },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config =
        Config::load_or_default(cli.config.as_deref()).context("failed to load config")?;
    if let Some(endpoint) = cli.endpoint {
        config.client.endpoint_url = endpoint;
    }

    match cli.command {
        Command::Submit {
            form,
            fields,
            preview: preview_only,
        } => {
            let form = read_form(form, &fields)?;
            if preview_only {
                let record = FormNormalizer::new()
                    .normalize(&form)
                    .map_err(distribution_records::Error::from)?;
                println!("{}", preview(&record)?);
                return Ok(ExitCode::SUCCESS);
            }
            let submitter = FormSubmitter::from_config(&config)?;
            let ok = match submitter.submit_form(&form) {
                Ok(reply) => reply.success,
                Err(_) => false,
            };
            Ok(if ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Migrate {
            source,
            sheet,
            delay_ms,
            dry_run,
            backup,
        } => {
            let store = DuckDbStore::open(&source)
                .with_context(|| format!("failed to open {}", source.display()))?;
            let rows = read_legacy_rows(&store, &sheet)?;
            if rows.is_empty() {
                tracing::warn!(sheet = %sheet, "no rows to migrate");
                return Ok(ExitCode::SUCCESS);
            }

            let client = SubmissionClient::from_config(&config.client)?;
            if !dry_run {
                client.health().context("endpoint health check failed")?;
            }
            if let Some(path) = backup {
                write_backup(&path, &rows)
                    .with_context(|| format!("failed to write backup {}", path.display()))?;
            }

            let migrator = Migrator::new(&client).delay(Duration::from_millis(delay_ms));
            if dry_run {
                match migrator.dry_run(&rows) {
                    Some(Ok(record)) => println!("{}", serde_json::to_string_pretty(&record)?),
                    Some(Err(e)) => bail!("transform failed: {e}"),
                    None => {}
                }
                return Ok(ExitCode::SUCCESS);
            }

            let summary = migrator.run(&rows);
            println!("success: {}", summary.success);
            println!("errors:  {}", summary.errors);
            println!("total:   {}", summary.total);
            for detail in &summary.details {
                println!("  - {detail}");
            }
            Ok(if summary.errors == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Health => {
            let client = SubmissionClient::from_config(&config.client)?;
            let health = client.health()?;
            println!("{}", serde_json::to_string_pretty(&health)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::List { limit, offset } => {
            let client = SubmissionClient::from_config(&config.client)?;
            let page = client.list_records(limit, offset)?;
            println!("{}", serde_json::to_string_pretty(&page)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Get { id } => {
            let client = SubmissionClient::from_config(&config.client)?;
            match client.get_record(&id)? {
                Some(record) => {
                    println!("{}", serde_json::to_string_pretty(&record)?);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    eprintln!("no record with id {id}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

/// Merge a JSON form file with `id=value` overrides.
fn read_form(path: Option<PathBuf>, fields: &[String]) -> Result<RawForm> {
    let mut form = match path {
        Some(path) => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let value: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("{} is not valid JSON", path.display()))?;
            RawForm::from_json(&value)?
        }
        None => RawForm::new(),
    };
    form.merge(RawForm::from_pairs(fields)?);
    if form.keys().next().is_none() {
        bail!("no form given; pass --form FILE or --field ID=VALUE");
    }
    Ok(form)
}
