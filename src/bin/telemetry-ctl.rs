//! Toggle interactive-session usage telemetry for the current user.
//!
//! Telemetry is "enabled" when the managed startup snippet is present in
//! the user's interactive-profile startup directory, byte-identical to
//! the template shipped with this binary. Enable writes the snippet,
//! disable removes it, status reports which state the file is in.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

/// The snippet written to the startup directory.
const SNIPPET: &str = include_str!("../../templates/startup.py");

/// Name of the managed file inside the startup directory.
const SNIPPET_FILE: &str = "telemetry.py";

#[derive(Parser)]
#[command(name = "telemetry-ctl")]
#[command(about = "Configure interactive-session usage telemetry.", long_about = None)]
struct Cli {
    /// Enable telemetry.
    #[arg(long)]
    enable: bool,

    /// Disable telemetry.
    #[arg(long)]
    disable: bool,

    /// Check telemetry status.
    #[arg(long)]
    status: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "usage_telemetry=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let selected = [cli.enable, cli.disable, cli.status]
        .iter()
        .filter(|flag| **flag)
        .count();

    if selected == 0 {
        use clap::CommandFactory;
        let _ = Cli::command().print_help();
        println!();
        return ExitCode::SUCCESS;
    }
    if selected > 1 {
        eprintln!("Only one of --enable, --disable, or --status can be used at a time.");
        return ExitCode::FAILURE;
    }

    let Some(snippet_path) = snippet_path() else {
        eprintln!("Could not locate a home directory for the startup snippet.");
        return ExitCode::FAILURE;
    };

    if cli.status {
        return status(&snippet_path);
    }
    if cli.disable {
        return disable(&snippet_path);
    }
    enable(&snippet_path)
}

/// Where the managed snippet lives. `TELEMETRY_PROFILE_DIR` overrides the
/// default per-user interactive-profile startup directory.
fn snippet_path() -> Option<PathBuf> {
    let dir = match std::env::var_os("TELEMETRY_PROFILE_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir()?
            .join(".ipython")
            .join("profile_default")
            .join("startup"),
    };
    Some(dir.join(SNIPPET_FILE))
}

fn status(path: &Path) -> ExitCode {
    match fs::read_to_string(path) {
        Ok(content) if content == SNIPPET => println!("Telemetry enabled."),
        Ok(_) => println!(
            "Telemetry enabled but misconfigured. Run `telemetry-ctl --disable && telemetry-ctl --enable` to fix."
        ),
        Err(_) => println!("Telemetry disabled."),
    }
    ExitCode::SUCCESS
}

fn disable(path: &Path) -> ExitCode {
    if !path.exists() {
        println!("Telemetry already disabled.");
        return ExitCode::SUCCESS;
    }
    match fs::remove_file(path) {
        Ok(()) => {
            println!("Telemetry disabled.");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("Could not remove {}: {error}", path.display());
            ExitCode::FAILURE
        }
    }
}

fn enable(path: &Path) -> ExitCode {
    if path.exists() {
        println!("Telemetry already enabled.");
        return ExitCode::SUCCESS;
    }
    if let Some(parent) = path.parent() {
        if let Err(error) = fs::create_dir_all(parent) {
            eprintln!("Could not create {}: {error}", parent.display());
            return ExitCode::FAILURE;
        }
    }
    match fs::write(path, SNIPPET) {
        Ok(()) => {
            println!("Telemetry enabled.");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("Could not write {}: {error}", path.display());
            ExitCode::FAILURE
        }
    }
}
