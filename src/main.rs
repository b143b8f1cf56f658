use anyhow::{Context, Result};
use clap::Parser;
use talk::config::{Args, Config};
use talk::console::{ConsoleInput, Printer};
use talk::peer::{Finished, run_peer};
use tracing::{error, info};

/// Exit status after Ctrl-C.
const INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let verbose = args.verbose;

    let code = match start(args, verbose).await {
        Ok(finished) => {
            info!("talk finished as {}: {:?}", finished.role(), finished);
            0
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {e:#}");
            1
        }
    };

    // The stdin reader thread may still be blocked on a read
    std::process::exit(code);
}

async fn start(args: Args, verbose: bool) -> Result<Finished> {
    init_logging(verbose)?;
    let config = Config::try_from(args)?;
    info!("Starting talk: {:?}", config);

    ctrlc::set_handler(|| {
        info!("Interrupted");
        std::process::exit(INTERRUPTED);
    })
    .context("Failed to set signal handler")?;

    run_peer(&config, ConsoleInput::stdin(), Printer::Stdout).await
}

/// Logs go to `~/.talk/talk.log`; with `verbose` they are mirrored to stderr.
fn init_logging(verbose: bool) -> Result<()> {
    let home_dir = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let talk_dir = format!("{home_dir}/.talk");
    std::fs::create_dir_all(&talk_dir)
        .with_context(|| format!("Failed to create {talk_dir}"))?;

    let log_path = format!("{talk_dir}/talk.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {log_path}"))?;

    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    if verbose {
        use tracing_subscriber::fmt::writer::MakeWriterExt;
        let writer = std::io::stderr.and(log_file);

        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(writer)
            .init();
    } else {
        // The terminal is the chat window, keep it free of log lines
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(log_file)
            .with_ansi(false)
            .init();
    }
    Ok(())
}
