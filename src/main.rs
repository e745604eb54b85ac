use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use mileage_ledger::bootstrap;
use mileage_ledger::config::{Config, ConfigUpdate, DEFAULT_CONFIG_PATH};
use mileage_ledger::geo::round_trip_km;
use mileage_ledger::model::{DATE_FORMAT, DeliveryEntry};
use mileage_ledger::postcode;
use mileage_ledger::session::Session;
use mileage_ledger::workflow::{BatchOutcome, BatchRequest, Progress};
use mileage_ledger::{Result, ToolError};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_tracing(cli.verbose) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|error| ToolError::Logging(error.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Log(args) => execute_log(&cli.config, args),
        Command::Init(args) => execute_init(&cli.config, args),
        Command::Distance(args) => execute_distance(&cli.config, args),
        Command::Config(ConfigCommand::Show) => execute_config_show(&cli.config),
        Command::Config(ConfigCommand::Set(args)) => execute_config_set(&cli.config, args),
    }
}

fn execute_log(config_path: &Path, args: LogArgs) -> Result<()> {
    let session = Session::from_config_file(config_path)?;
    let config = session.config()?;

    let date = args
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive().format(DATE_FORMAT).to_string());
    let entries = if args.entries.is_empty() {
        prompt_entries(args.slots.unwrap_or(config.entry_slots))?
    } else {
        args.entries.iter().map(|raw| parse_entry(raw)).collect()
    };

    let handle = session.submit(BatchRequest::new(date, entries))?;
    for event in handle.events() {
        report(&event);
    }
    let outcome = handle.wait()?;
    summarize(&outcome, &config.excel_path);
    Ok(())
}

fn execute_init(config_path: &Path, args: InitArgs) -> Result<()> {
    let path = match args.path {
        Some(path) => path,
        None => Config::load_or_default(config_path).excel_path,
    };
    let status = bootstrap::ensure_ledger(&path)?;
    if status.created {
        println!("created {}", path.display());
    } else if status.header_written {
        println!("header of {} rewritten", path.display());
    }
    println!("{} delivery row(s) in {}", status.data_rows, path.display());
    Ok(())
}

fn execute_distance(config_path: &Path, args: DistanceArgs) -> Result<()> {
    let session = Session::from_config_file(config_path)?;
    let config = session.config()?;
    let origin = session.origin()?;

    let key = postcode::normalize(&args.destination)
        .unwrap_or_else(|| args.destination.trim().to_string());
    let query = format!("{key}, {}", config.country_name);
    let destination = session
        .geocoder()
        .locate(&query)
        .ok_or_else(|| ToolError::LocationNotFound(query.clone()))?;
    let meters = session
        .router()
        .one_way_meters(origin, destination)
        .ok_or_else(|| ToolError::RouteUnavailable(query.clone()))?;

    println!(
        "{} -> {key}: {:.2} km one-way, {:.2} km round trip",
        config.origin_address,
        meters / 1000.0,
        round_trip_km(meters)
    );
    Ok(())
}

fn execute_config_show(config_path: &Path) -> Result<()> {
    let config = Config::load_or_default(config_path);
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn execute_config_set(config_path: &Path, update: ConfigUpdate) -> Result<()> {
    let session = Session::from_config_file(config_path)?;
    let mut config = session.config()?;
    update.apply(&mut config)?;
    session.save_config(config)?;
    println!("settings saved to {}", config_path.display());
    Ok(())
}

/// Reads postcode/address pairs from standard input, one prompt per field.
fn prompt_entries(slots: usize) -> Result<Vec<DeliveryEntry>> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut entries = Vec::with_capacity(slots);

    for index in 1..=slots {
        let postcode = prompt(&mut lines, &format!("delivery {index} postcode: "))?;
        let address = prompt(&mut lines, &format!("delivery {index} address: "))?;
        entries.push(DeliveryEntry::new(postcode.as_deref(), address.as_deref()));
    }
    Ok(entries)
}

fn prompt<B: BufRead>(lines: &mut io::Lines<B>, label: &str) -> Result<Option<String>> {
    print!("{label}");
    io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(Some(line?)),
        None => Ok(None),
    }
}

/// Parses `POSTCODE`, `POSTCODE|ADDRESS` or `|ADDRESS`.
fn parse_entry(raw: &str) -> DeliveryEntry {
    match raw.split_once('|') {
        Some((postcode, address)) => DeliveryEntry::new(Some(postcode), Some(address)),
        None => DeliveryEntry::new(Some(raw), None),
    }
}

fn report(event: &Progress) {
    match event {
        Progress::Started { entries, .. } => println!("processing {entries} delivery slot(s)"),
        Progress::LookingUpOrigin => println!("looking up origin"),
        Progress::Entry { index, total } => println!("delivery {index}/{total}"),
        Progress::Warning(warning) => eprintln!("warning: {warning}"),
        Progress::Appended {
            row,
            distance_km,
            flagged,
            ..
        } => {
            let note = if *flagged { " (manual review suggested)" } else { "" };
            println!("  row {row}: {distance_km:.2} km{note}");
        }
        Progress::Saving { rows } => println!("saving {rows} row(s)"),
        Progress::Finished { .. } => {}
        Progress::Cancelled { processed } => {
            eprintln!("cancelled after {processed} delivery slot(s)")
        }
    }
}

fn summarize(outcome: &BatchOutcome, path: &Path) {
    println!(
        "{} row(s) appended to {} for {}",
        outcome.appended(),
        path.display(),
        outcome.date.format(DATE_FORMAT)
    );
    if !outcome.warnings.is_empty() {
        println!("{} delivery slot(s) skipped", outcome.warnings.len());
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Log round-trip delivery distances into a mileage spreadsheet."
)]
struct Cli {
    /// Settings file; created with defaults when missing.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Look up deliveries and append them to the ledger.
    Log(LogArgs),
    /// Create the ledger workbook or repair its header.
    Init(InitArgs),
    /// Print the distance from the origin to a single destination.
    Distance(DistanceArgs),
    /// Inspect or change the settings.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(clap::Args)]
struct LogArgs {
    /// Delivery date (dd-mm-yyyy); defaults to today.
    #[arg(long)]
    date: Option<String>,

    /// Delivery as POSTCODE, POSTCODE|ADDRESS or |ADDRESS. Repeatable.
    #[arg(long = "entry", value_name = "ENTRY")]
    entries: Vec<String>,

    /// Number of deliveries to prompt for when no --entry is given.
    #[arg(long)]
    slots: Option<usize>,
}

#[derive(clap::Args)]
struct InitArgs {
    /// Workbook path; defaults to the configured ledger.
    #[arg(long)]
    path: Option<PathBuf>,
}

#[derive(clap::Args)]
struct DistanceArgs {
    /// Destination postcode or address.
    destination: String,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective settings.
    Show,
    /// Change one or more settings and save immediately.
    Set(ConfigUpdate),
}
