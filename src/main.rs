/*!
# NoIFGo CLI

Wraps the `go` tool: devirtualizes the marked interfaces of the project,
runs `go` with the given arguments and restores the sources.
*/

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;

use noifgo::cli_common::{self, print_error, print_report};
use noifgo::{Project, ProjectDriver, MARKER_FILE};

const USAGE: &str = "NoIFGo is a go tool wrapper that optimizes source code by replacing interfaces
with their implementations and then using the go tool on the resulting code.

Usage:

        noifgo [args]

The arguments are passed to the go tool unchanged, e.g.

        noifgo build -a -gcflags \"-m -m\"

Mark an interface with a //noifgo:ifdef comment on the line above its
declaration, and every reference to it with //noifgo:{Name,p} (pointer) or
//noifgo:{Name,v} (value) on the line above the reference. The project root
must contain a .noifgo file.";

#[derive(Parser)]
#[command(
    name = "noifgo",
    version = env!("CARGO_PKG_VERSION"),
    about = "Devirtualizes marked Go interfaces, then runs the go tool",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    /// Arguments passed verbatim to `go`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    go_args: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = cli_common::init_logging() {
        eprintln!("{}", e);
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    if cli.go_args.is_empty() {
        println!("{}", USAGE);
        return Ok(ExitCode::SUCCESS);
    }

    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    let project = match Project::locate(&cwd)? {
        Some(project) => project,
        None => {
            print_error(&format!(
                "Could not find the hidden file {} which should be placed in your projects root folder.",
                MARKER_FILE
            ));
            return Ok(ExitCode::FAILURE);
        }
    };
    tracing::info!(
        "project {} ({} resolver, {} strategy)",
        project.root.display(),
        project.settings.resolver.backend,
        project.settings.rewrite.strategy
    );

    let stale = project.stale_backups()?;
    if !stale.is_empty() {
        print_error("Backups from an interrupted run were found; restore them before running again:");
        for path in &stale {
            eprintln!("  {}", path.display());
        }
        return Ok(ExitCode::FAILURE);
    }

    let report = ProjectDriver::for_project(&project).run(&cli.go_args);
    print_report(&report);

    Ok(if report.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
