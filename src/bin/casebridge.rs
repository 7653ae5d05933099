use std::process::ExitCode;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use casebridge::app::{App, ProgressEvent, ProgressSink, RunOptions, RunResult};
use casebridge::auth::{AuthClient, PlatformAuthClient};
use casebridge::config::ConfigLoader;
use casebridge::domain::{IngestMode, SampleId};
use casebridge::error::CasebridgeError;
use casebridge::insights::InsightsHttpClient;
use casebridge::output::JsonOutput;
use casebridge::select::SampleSelection;
use casebridge::warehouse::ClarityWarehouseClient;

#[derive(Parser)]
#[command(name = "casebridge")]
#[command(about = "Bridge Clarity LIMS sample metadata into Connected Insights case ingestion")]
#[command(version, author)]
struct Cli {
    /// Print machine-readable JSON instead of the interactive summary.
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Build, validate, and upload a case-metadata CSV")]
    Ingest(IngestArgs),
}

#[derive(Args)]
struct IngestArgs {
    /// ICA project id as seen in Base.
    #[arg(long)]
    project_id: Option<String>,

    /// ICA project name, resolved to an id via the project search.
    #[arg(long)]
    project_name: Option<String>,

    /// Sample identifier to query from Clarity; repeatable.
    #[arg(long = "sample-id")]
    sample_ids: Vec<String>,

    /// Clarity LIMS sample project to query on.
    #[arg(long)]
    lims_sample_project: Option<String>,

    /// Output CSV path; defaults to a timestamped name.
    #[arg(long)]
    output_csv: Option<Utf8PathBuf>,

    /// Lenient mode logs validation warnings instead of aborting.
    #[arg(long, value_enum, default_value_t = IngestMode::Strict)]
    mode: IngestMode,

    /// Build and validate the CSV but skip the upload.
    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    config: Option<String>,

    /// ICA base URL; rarely needs configuring.
    #[arg(long)]
    ica_base_url: Option<String>,

    /// Connected Insights domain URL.
    #[arg(long)]
    domain_url: Option<String>,

    /// Illumina platform authentication URL; rarely needs configuring.
    #[arg(long)]
    platform_url: Option<String>,

    /// Connected Insights app name alias; rarely needs configuring.
    #[arg(long)]
    application_name: Option<String>,

    /// API key for the warehouse side.
    #[arg(long)]
    api_key: Option<String>,

    /// File containing the API key.
    #[arg(long)]
    api_key_file: Option<String>,

    /// Username (email) used to log into Connected Insights.
    #[arg(long)]
    username: Option<String>,

    /// Password used to log into Connected Insights.
    #[arg(long)]
    password: Option<String>,

    #[arg(long, default_value_t = 2)]
    poll_interval_secs: u64,

    #[arg(long, default_value_t = 60)]
    max_poll_attempts: u32,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<CasebridgeError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CasebridgeError) -> u8 {
    match error {
        CasebridgeError::InvalidSelection
        | CasebridgeError::NoMatch(_)
        | CasebridgeError::MultipleProjects(_)
        | CasebridgeError::NoUsableFields
        | CasebridgeError::MissingMandatorySchema(_)
        | CasebridgeError::MissingColumn(_)
        | CasebridgeError::ValidationFailed { .. }
        | CasebridgeError::IncompleteRows { .. }
        | CasebridgeError::SchemaConflict(_) => 2,
        CasebridgeError::WarehouseHttp(_)
        | CasebridgeError::WarehouseStatus { .. }
        | CasebridgeError::AuthHttp(_)
        | CasebridgeError::AuthStatus { .. }
        | CasebridgeError::InsightsHttp(_)
        | CasebridgeError::InsightsStatus { .. }
        | CasebridgeError::MissingClarityTable(_)
        | CasebridgeError::IngestionTimeout { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest(args) => run_ingest(args, cli.non_interactive),
    }
}

fn run_ingest(args: IngestArgs, non_interactive: bool) -> miette::Result<()> {
    let resolved = ConfigLoader::resolve(args.config.as_deref()).into_diagnostic()?;

    let base_url = args.ica_base_url.unwrap_or(resolved.ica_base_url);
    let platform_url = args.platform_url.unwrap_or(resolved.platform_url);
    let application_name = args.application_name.unwrap_or(resolved.application_name);
    let domain_url = args
        .domain_url
        .or(resolved.domain_url)
        .ok_or(CasebridgeError::MissingCredentials(
            "Connected Insights domain URL (--domain-url)".to_string(),
        ))
        .into_diagnostic()?;
    let api_key = read_api_key(
        args.api_key,
        args.api_key_file.or(resolved.api_key_file),
    )
    .into_diagnostic()?;
    let username = args
        .username
        .ok_or(CasebridgeError::MissingCredentials(
            "username (--username)".to_string(),
        ))
        .into_diagnostic()?;
    let password = args
        .password
        .ok_or(CasebridgeError::MissingCredentials(
            "password (--password)".to_string(),
        ))
        .into_diagnostic()?;

    let selection = SampleSelection {
        sample_ids: args
            .sample_ids
            .iter()
            .map(|id| id.parse::<SampleId>())
            .collect::<Result<Vec<_>, _>>()
            .into_diagnostic()?,
        lims_project: args.lims_sample_project,
    };
    if selection.is_empty() {
        return Err(CasebridgeError::InvalidSelection.into());
    }
    tracing::info!(selection = %selection.describe(), "generating case metadata");

    let project_id = match (args.project_id, args.project_name) {
        (Some(id), _) => id,
        (None, Some(name)) => {
            ClarityWarehouseClient::resolve_project_id(&base_url, &api_key, &name)
                .into_diagnostic()?
        }
        (None, None) => {
            return Err(CasebridgeError::MissingCredentials(
                "project (--project-id or --project-name)".to_string(),
            )
            .into());
        }
    };

    let warehouse =
        ClarityWarehouseClient::new(&base_url, &api_key, project_id).into_diagnostic()?;
    warehouse.validate_api_key().into_diagnostic()?;
    tracing::info!("pre-flight: API key accepted on ICA");
    warehouse.validate_project().into_diagnostic()?;
    tracing::info!("pre-flight: ICA project is valid and accessible");

    let auth = PlatformAuthClient::new(
        &platform_url,
        &domain_url,
        &application_name,
        &username,
        &password,
    )
    .into_diagnostic()?
    .authenticate()
    .into_diagnostic()?;

    let insights = InsightsHttpClient::new(&domain_url).into_diagnostic()?;
    let app = App::new(warehouse, insights, resolved.schema);
    let options = RunOptions {
        mode: args.mode,
        output_csv: args.output_csv,
        dry_run: args.dry_run,
        poll_interval: Duration::from_secs(args.poll_interval_secs),
        max_poll_attempts: args.max_poll_attempts,
    };

    if non_interactive {
        let result = app
            .run(&auth, &selection, &options, &JsonOutput)
            .into_diagnostic()?;
        JsonOutput::print_run(&result).into_diagnostic()?;
    } else {
        let result = app
            .run(&auth, &selection, &options, &ConsoleSink)
            .into_diagnostic()?;
        print_run_summary(&result);
    }
    Ok(())
}

fn read_api_key(
    api_key: Option<String>,
    api_key_file: Option<String>,
) -> Result<String, CasebridgeError> {
    if let Some(key) = api_key {
        return Ok(key);
    }
    let Some(path) = api_key_file else {
        return Err(CasebridgeError::MissingCredentials(
            "API key (--api-key or --api-key-file)".to_string(),
        ));
    };
    let content = std::fs::read_to_string(&path)
        .map_err(|err| CasebridgeError::Filesystem(format!("reading {path}: {err}")))?;
    Ok(content.trim().to_string())
}

struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn event(&self, event: ProgressEvent) {
        eprintln!("› {}", event.message);
    }
}

fn print_run_summary(result: &RunResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}📋 casebridge summary{reset}");
    println!("{green}✅ Samples written: {}{reset}", result.rows);
    println!("{green}📁 Metadata CSV: {}{reset}", result.output_path);
    if result.rows_with_missing > 0 {
        println!(
            "{yellow}⚠️ Lines with missing fields: {}{reset}",
            result.rows_with_missing
        );
    }
    if result.ambiguous_samples > 0 {
        println!(
            "{yellow}⚠️ Sample ids with multiple records: {}{reset}",
            result.ambiguous_samples
        );
    }
    for warning in &result.validation_warnings {
        println!("{yellow}⚠️ {warning}{reset}");
    }
    match (&result.handle, &result.final_status) {
        (Some(handle), Some(status)) => {
            println!("{cyan}⬆️ Uploaded as {handle}; ingestion status: {status}{reset}");
        }
        _ => println!("{yellow}• Upload skipped (dry run){reset}"),
    }
}
