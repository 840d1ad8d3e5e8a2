use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;

use torport::signal::INTERRUPT;
use torport::store::{self, DebugStateIterator, Intention, StateIterator, StateStore};
use torport::transaction::MigrationTransaction;
use torport::{migrate, MigrateResult};

#[derive(Parser, Debug)]
#[command(
    name = "torport",
    version,
    about = "Migrates per-torrent resume state between BitTorrent clients"
)]
struct Cli {
    /// Source client name
    #[arg(long, value_name = "name")]
    source: Option<String>,

    /// Source client data directory
    #[arg(long, value_name = "path")]
    source_dir: Option<PathBuf>,

    /// Target client name
    #[arg(long, value_name = "name")]
    target: Option<String>,

    /// Target client data directory
    #[arg(long, value_name = "path")]
    target_dir: Option<PathBuf>,

    /// Maximum number of migration threads
    #[arg(long, value_name = "N")]
    max_threads: Option<usize>,

    /// Do not back up target client data
    #[arg(long)]
    no_backup: bool,

    /// Do not write anything to disk
    #[arg(long)]
    dry_run: bool,

    /// Produce verbose output
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    install_signal_handlers();

    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (source_store, source_dir) = find_store(
        Intention::Export,
        cli.source.as_deref(),
        cli.source_dir.clone(),
    )?;
    let (target_store, target_dir) = find_store(
        Intention::Import,
        cli.target.as_deref(),
        cli.target_dir.clone(),
    )?;

    let worker_count = cli
        .max_threads
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
        .max(1);

    let transaction = MigrationTransaction::from_flags(cli.no_backup, cli.dry_run);

    let boxes = source_store.export(&source_dir, &transaction)?;
    let boxes: Box<dyn StateIterator + '_> = if cli.verbose {
        Box::new(DebugStateIterator::new(boxes))
    } else {
        boxes
    };

    let result = migrate::run_import(
        target_store.as_ref(),
        &target_dir,
        boxes.as_ref(),
        &transaction,
        &INTERRUPT,
        worker_count,
    );

    info!(
        "migration finished: {} succeeded, {} skipped, {} failed",
        result.success_count, result.skip_count, result.fail_count
    );

    let mut should_commit = true;

    if dirty(&result) && !cli.no_backup && !cli.dry_run {
        should_commit = confirm_commit()?;
    }

    if should_commit && !INTERRUPT.is_interrupted() {
        transaction.commit();
    }

    Ok(())
}

fn dirty(result: &MigrateResult) -> bool {
    result.fail_count != 0 || result.skip_count != 0
}

/// Resolves one side of the migration from a client name, a data
/// directory, or both; whichever is missing is guessed.
fn find_store(
    intention: Intention,
    client_name: Option<&str>,
    data_dir: Option<PathBuf>,
) -> Result<(Box<dyn StateStore>, PathBuf), Box<dyn std::error::Error>> {
    let side = match intention {
        Intention::Export => "source",
        Intention::Import => "target",
    };

    let (store, data_dir) = match (client_name, data_dir) {
        (Some(name), data_dir) => {
            let store = store::create(name.parse()?);
            let data_dir = match data_dir {
                Some(dir) => dir,
                None => store.guess_data_dir(intention).ok_or_else(|| {
                    format!("no data directory found for {} torrent client", side)
                })?,
            };
            (store, data_dir)
        }
        (None, Some(data_dir)) => (store::guess_by_data_dir(&data_dir, intention)?, data_dir),
        (None, None) => {
            return Err(format!(
                "{} torrent client name and/or data directory are not specified",
                side
            )
            .into());
        }
    };

    let data_dir = data_dir.canonicalize().unwrap_or(data_dir);

    if !store.is_valid_data_dir(&data_dir, intention) {
        return Err(format!("bad {} data directory: \"{}\"", side, data_dir.display()).into());
    }

    info!("{}: {} (\"{}\")", side, store.client(), data_dir.display());

    Ok((store, data_dir))
}

/// Asks whether a dirty run should still be committed. Interruption,
/// end-of-input, and read errors all decline.
fn confirm_commit() -> Result<bool, Box<dyn std::error::Error>> {
    while !INTERRUPT.is_interrupted() {
        print!("Import is not clean, do you want to commit? [yes/no]: ");
        std::io::stdout().flush()?;

        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer)? == 0 {
            return Ok(false);
        }

        match answer.trim() {
            "yes" => return Ok(true),
            "no" => return Ok(false),
            _ => continue,
        }
    }

    Ok(false)
}

#[cfg(unix)]
fn install_signal_handlers() {
    const SIGINT: i32 = 2;
    const SIGTERM: i32 = 15;

    extern "C" fn handle_signal(_: i32) {
        INTERRUPT.interrupt();
    }

    extern "C" {
        fn signal(sig: i32, handler: extern "C" fn(i32)) -> usize;
    }

    unsafe {
        signal(SIGINT, handle_signal);
        signal(SIGTERM, handle_signal);
    }
}

#[cfg(not(unix))]
fn install_signal_handlers() {}
