//! Shared CLI plumbing
//!
//! - Logging initialization
//! - Operator-facing console output

use anyhow::Result;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use crate::driver::RunReport;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "NOIFGO_LOG";

/// Environment variable that raises the default level to `info`
pub const VERBOSE_ENV: &str = "NOIFGO_VERBOSE";

/// Installs the stderr log subscriber.
///
/// `NOIFGO_LOG` takes an `EnvFilter` directive such as `noifgo=debug`;
/// without it only warnings and errors are shown.
pub fn init_logging() -> Result<()> {
    let default_level = if std::env::var_os(VERBOSE_ENV).is_some() {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "✅".green(), message.green());
}

pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠️".yellow(), message.yellow());
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "❌".red(), message.red());
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ️".blue(), message);
}

/// Prints the outcome of a run for the operator.
pub fn print_report(report: &RunReport) {
    for tag in &report.processed {
        print_info(&format!("devirtualized {}", tag));
    }
    if let Some(err) = &report.error {
        print_error(&err.to_string());
    }

    match &report.build {
        Some(build) if build.success => {
            print_success("Successfully optimized and compiled project");
            if !build.output.is_empty() {
                println!("{}", build.output.trim_end());
            }
        }
        Some(build) => {
            let code = build
                .code
                .map_or_else(|| "a signal".to_string(), |c| format!("exit code {}", c));
            print_error(&format!("Build failed with {}", code));
            if !build.output.is_empty() {
                eprintln!("{}", build.output.trim_end());
            }
        }
        None => print_error("Build did not run"),
    }

    let restore = &report.restore;
    for path in &restore.missing {
        print_warning(&format!("backup of {} not found", path.display()));
    }
    for (path, err) in &restore.failed {
        print_error(&format!("could not restore {}: {}", path.display(), err));
    }
    if !restore.is_complete() {
        print_error(&format!("Restore incomplete: {}", restore));
    } else if !restore.restored.is_empty() {
        print_info(&format!("Restored {} source files", restore.restored.len()));
    }
}
