//! sldprt2stl - Main entry point
//!
//! Settings → directory prompts → discovery → SOLIDWORKS session →
//! conversion loop → session release.

use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use sldprt2stl::cli::Cli;
use sldprt2stl::engine::bridge;
use sldprt2stl::{
    connection_plan, frontend, path_resolver, process_guard, run_batch, sanity, BatchConverter,
    BridgeCommand, BridgeConnector, Result, SettingsStore, TerminalPrompter,
    DEFAULT_ENGINE_VERSIONS,
};

/// Initialize the logger with appropriate settings
fn init_logger() {
    // RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_banner() {
    println!(
        "{} {} on {} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    );
}

/// Keep a double-clicked console window open until the user has read it
fn pause_before_exit() {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return;
    }
    print!("Press Enter to exit...");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    let _ = stdin.lock().read_line(&mut line);
}

/// Main application entry point
fn main() {
    init_logger();
    info!("sldprt2stl starting up");

    // Ctrl+C stops after the current file so SOLIDWORKS still gets shut down
    if let Err(e) = process_guard::init_interrupt_handler() {
        warn!("Failed to install Ctrl+C handler: {}", e);
    }

    let cli = Cli::parse_args();
    debug!("CLI arguments parsed: {:?}", cli);
    print_banner();

    let shell = bridge::default_shell();
    let outcome =
        sanity::run_preflight_checks(&shell).and_then(|script| run(cli, &shell, &script));

    let code = match outcome {
        Ok(()) => 0,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };

    if process_guard::is_interrupted() {
        println!("\nInterrupted by user");
    }

    pause_before_exit();
    std::process::exit(code);
}

fn run(cli: Cli, shell: &str, script: &Path) -> Result<()> {
    let store = SettingsStore::beside_executable();
    let last = store.load();
    if !last.input_directory.is_empty() {
        println!("Loaded last used directories");
    }

    let mut prompter = TerminalPrompter;
    let settings = frontend::choose_directories(&mut prompter, cli.input_dir, &last)?;
    store.save(&settings);

    let output_dir = PathBuf::from(&settings.output_directory);
    let resolver = path_resolver::platform_resolver(shell);
    let converter = BatchConverter::new(&output_dir, resolver.as_ref())
        .with_cancel(process_guard::interrupt_flag());

    let mut connector = BridgeConnector::new(BridgeCommand::powershell(shell, script));
    let plan = connection_plan(DEFAULT_ENGINE_VERSIONS);

    let report = run_batch(
        &mut connector,
        &plan,
        Path::new(&settings.input_directory),
        &converter,
    )?;

    for (path, reason) in &report.failures {
        debug!("Failed: {:?}: {}", path, reason);
    }
    Ok(())
}
