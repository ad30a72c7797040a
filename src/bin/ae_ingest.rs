use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use ae_ingest::adf;
use ae_ingest::config::ConfigLoader;
use ae_ingest::domain::{ExperimentAccession, PlatformAccession};
use ae_ingest::error::IngestError;
use ae_ingest::fetch::{ArrayExpressClient, ArrayExpressHttpClient};
use ae_ingest::fs_util::open_plain_or_compressed;
use ae_ingest::matrix::{ProcessedDataTable, parse_matrix};
use ae_ingest::metadata::JsonMetadataConverter;
use ae_ingest::model::Platform;
use ae_ingest::output::{InspectReport, JsonOutput, LoadReport, OutputMode, PlatformReport};
use ae_ingest::pipeline::{LoadOptions, Pipeline};
use ae_ingest::resolve::StorePlatformCatalog;
use ae_ingest::store::{JsonExperimentWriter, Store};

#[derive(Parser)]
#[command(name = "ae-ingest")]
#[command(about = "Ingest ArrayExpress-style gene-expression datasets into a local warehouse")]
#[command(version, author)]
struct Cli {
    /// Print results as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    /// Override the warehouse root directory.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Load one experiment (or every experiment in ae-ingest.json)")]
    Load(LoadArgs),
    #[command(about = "Fetch and parse a platform description file")]
    Platform(PlatformArgs),
    #[command(about = "Parse local processed-data files and summarize them")]
    Inspect(InspectArgs),
}

#[derive(Args)]
struct LoadArgs {
    /// Experiment accession, e.g. E-MEXP-297.
    accession: Option<String>,

    #[arg(long)]
    config: Option<String>,

    /// Use this platform from the local catalog instead of acquiring one.
    #[arg(long)]
    platform: Option<String>,

    /// Permit fetching unknown platform description files remotely.
    #[arg(long)]
    acquire_platform: bool,

    /// Run the pipeline without writing the finished record.
    #[arg(long)]
    no_persist: bool,
}

#[derive(Args)]
struct PlatformArgs {
    /// Platform accession, e.g. A-AFFY-6.
    accession: String,

    /// Key probes by reporter identifier instead of composite sequence.
    #[arg(long)]
    use_reporter_ids: bool,
}

#[derive(Args)]
struct InspectArgs {
    /// Processed-data matrix files (plain or gzipped).
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<IngestError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &IngestError) -> u8 {
    match error {
        IngestError::MissingConfig
        | IngestError::ConfigRead(_)
        | IngestError::ConfigParse(_)
        | IngestError::InvalidExperimentAccession(_)
        | IngestError::InvalidPlatformAccession(_)
        | IngestError::SelectedPlatformNotFound(_)
        | IngestError::PlatformAcquisitionDisabled => 2,
        IngestError::RemoteHttp(_)
        | IngestError::RemoteStatus { .. }
        | IngestError::MissingRemoteFile(_)
        | IngestError::MissingMetadata(_)
        | IngestError::MissingProcessedData(_) => 3,
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
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let store = match cli.store {
        Some(path) => {
            let root = Utf8PathBuf::from_path_buf(path)
                .map_err(|_| miette::Report::msg("store path must be valid UTF-8"))?;
            Store::with_root(root)
        }
        None => Store::new().into_diagnostic()?,
    };

    match cli.command {
        Commands::Load(args) => run_load(args, store, output_mode),
        Commands::Platform(args) => run_platform(args, store, output_mode),
        Commands::Inspect(args) => run_inspect(args, output_mode),
    }
}

fn run_load(args: LoadArgs, store: Store, output_mode: OutputMode) -> miette::Result<()> {
    let client = ArrayExpressHttpClient::new().into_diagnostic()?;
    let catalog = StorePlatformCatalog::new(store.clone());
    let writer = JsonExperimentWriter::new(store.clone());
    let pipeline = Pipeline::new(client, JsonMetadataConverter, catalog, writer, store);

    let requests = match args.accession {
        Some(value) => {
            let accession: ExperimentAccession = value.parse().into_diagnostic()?;
            vec![(
                accession,
                LoadOptions {
                    platform: args.platform.clone(),
                    allow_platform_acquisition: args.acquire_platform,
                    persist: !args.no_persist,
                },
            )]
        }
        None => {
            let resolved = ConfigLoader::resolve(args.config.as_deref()).into_diagnostic()?;
            resolved
                .experiments
                .into_iter()
                .map(|request| {
                    let options = LoadOptions {
                        platform: request.platform,
                        allow_platform_acquisition: request.allow_platform_acquisition,
                        persist: !args.no_persist,
                    };
                    (request.accession, options)
                })
                .collect()
        }
    };

    for (accession, options) in requests {
        let outcome = pipeline.load(&accession, &options).into_diagnostic()?;
        let report = LoadReport::from_outcome(&outcome);
        match output_mode {
            OutputMode::Json => JsonOutput::print_load(&report).into_diagnostic()?,
            OutputMode::Text => print_load_summary(&report),
        }
    }
    Ok(())
}

fn run_platform(args: PlatformArgs, store: Store, output_mode: OutputMode) -> miette::Result<()> {
    let accession: PlatformAccession = args.accession.parse().into_diagnostic()?;
    let client = ArrayExpressHttpClient::new().into_diagnostic()?;

    let download_dir = store.platform_download_dir(accession.as_str());
    Store::ensure_dir(&download_dir).into_diagnostic()?;
    let design = client
        .fetch_platform_design(accession.as_str(), download_dir.as_std_path())
        .into_diagnostic()?;
    let probes = adf::parse_adf(
        open_plain_or_compressed(&design.path).into_diagnostic()?,
        args.use_reporter_ids,
    )
    .into_diagnostic()?;
    if probes.is_empty() {
        return Err(IngestError::EmptyPlatform(accession.to_string())).into_diagnostic();
    }

    let mut platform = Platform::named(accession.as_str());
    platform.probes = probes;
    store.save_platform(&platform).into_diagnostic()?;

    let report = PlatformReport {
        platform: platform.name.clone(),
        probes: platform.probes.len(),
    };
    match output_mode {
        OutputMode::Json => JsonOutput::print_platform(&report).into_diagnostic()?,
        OutputMode::Text => {
            println!("{}: {} probes (saved to catalog)", report.platform, report.probes);
        }
    }
    Ok(())
}

fn run_inspect(args: InspectArgs, output_mode: OutputMode) -> miette::Result<()> {
    let mut table = ProcessedDataTable::new();
    for file in &args.files {
        let reader = open_plain_or_compressed(file).into_diagnostic()?;
        parse_matrix(reader, &mut table).into_diagnostic()?;
    }

    let report = InspectReport::from_table(&table);
    match output_mode {
        OutputMode::Json => JsonOutput::print_inspect(&report).into_diagnostic()?,
        OutputMode::Text => {
            println!("samples: {}", report.samples.join(", "));
            println!("probes:  {}", report.probes);
            if report.uses_reporter_ids {
                println!("rows are keyed by reporter identifiers");
            }
        }
    }
    Ok(())
}

fn print_load_summary(report: &LoadReport) {
    println!(
        "{}: {} assays, {} quantitation types, {} vectors",
        report.accession, report.assays, report.quantitation_types, report.vectors
    );
    if let Some(platform) = &report.platform {
        println!("  platform: {platform}");
    }
    if !report.pruned_types.is_empty() {
        println!("  pruned unused types: {}", report.pruned_types.join(", "));
    }
    match &report.persisted_path {
        Some(path) => println!("  persisted: {path}"),
        None => println!("  not persisted (--no-persist)"),
    }
}
