//! MultibeamScan - Main entry point
//!
//! 1. Parse the command line, initialize logging
//! 2. Select the time base (menu unless `--time-base` is given)
//! 3. Start generator and sampler against the detector
//! 4. Render the tube table and take console commands until the operator
//!    stops or the generator fails
//! 5. Stop, release the lines, exit with the driver status on failure

use std::io::{self, BufRead, Write};
use std::process;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use multibeam_scan::console::{prompt_time_base, CommandOutcome, Console};
use multibeam_scan::reporter::{ConsoleSink, Reporter, DEFAULT_INTERVAL};
use multibeam_scan::{ScanConfig, ScanEngine, SimulatedBus, TimeBase};

/// How often the main loop checks for a failed generator between lines.
const HALT_POLL: Duration = Duration::from_millis(50);

/// Multibeam activity detector scanner
#[derive(Parser, Debug)]
#[command(name = "scanner")]
#[command(author, version, about = "Multibeam activity detector scanner", long_about = None)]
struct Cli {
    /// Time base menu entry (1: 0.01 ms, 2: 0.1 ms, 3: 1 ms, 4: 10 ms); prompts when omitted
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=4))]
    time_base: Option<u8>,

    /// Table refresh interval in milliseconds [default: 100]
    #[arg(long)]
    refresh_ms: Option<u64>,

    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Do not clear the terminal between table renders
    #[arg(long)]
    no_clear: bool,

    /// Acquisition device name
    #[arg(short, long, default_value = "Dev1")]
    device: String,
}

fn main() {
    let code = match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            1
        }
    };
    process::exit(code);
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stderr, so the table on stdout can be redrawn in place
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut console = Console::new();
    let mut stdout = io::stdout();
    let mut banner = String::new();
    console.print_banner(&mut banner);
    stdout.write_all(banner.as_bytes())?;

    let time_base = match cli.time_base.and_then(TimeBase::from_menu_index) {
        Some(tb) => tb,
        None => prompt_time_base(&mut io::stdin().lock(), &mut stdout).context("time base prompt")?,
    };
    info!("{}", multibeam_scan::console::VERSION);

    let config = ScanConfig::new(&cli.device, time_base);
    let bus = Arc::new(SimulatedBus::demo());
    let mut engine = ScanEngine::new(bus, config);

    if let Err(e) = engine.start() {
        error!("{}", e);
        return Ok(e.exit_code());
    }

    let mut usage = String::new();
    console.print_usage(&mut usage);
    stdout.write_all(usage.as_bytes())?;

    let shared = engine.shared();
    let logs = engine.take_logs().context("log streams of a fresh run")?;
    let refresh = cli.refresh_ms.map_or(DEFAULT_INTERVAL, Duration::from_millis);
    let sink = ConsoleSink::new(io::stdout(), !cli.no_clear);
    let reporter = Reporter::new(Arc::clone(&shared), logs, sink, refresh)
        .spawn()
        .context("spawn reporter")?;

    let lines = spawn_line_reader()?;
    loop {
        if engine.is_halted() {
            break;
        }
        match lines.recv_timeout(HALT_POLL) {
            Ok(line) => {
                let mut reply = String::new();
                let outcome = console.handle_line(&line, &shared, &mut reply);
                stdout.write_all(reply.as_bytes())?;
                if outcome == CommandOutcome::Stop {
                    info!("stop requested");
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                info!("console closed");
                break;
            }
        }
    }

    let result = engine.stop();
    if reporter.join().is_err() {
        warn!("reporter thread panicked");
    }

    Ok(match result {
        Ok(()) => 0,
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    })
}

/// Forward stdin lines to the main loop. The channel disconnects on EOF.
fn spawn_line_reader() -> io::Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new().name("stdin".into()).spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    })?;
    Ok(rx)
}
