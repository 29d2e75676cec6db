//! Binary entry point for the pyexpose CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Plan a module from a declaration dump and a binding plan
//! pyexpose build --decls geom.decls.json --plan geom.plan.json
//!
//! # Treat warnings as errors, pin scalar types through a probe namespace
//! pyexpose build --decls d.json --plan p.json --warnings-as-errors --probe-namespace __probe
//! ```
//!
//! Responses are JSON on stdout; logs go to stderr.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use pyexpose::cli::run_build;
use pyexpose::diagnostics::BuildConfig;
use pyexpose::error::ExposeError;
use pyexpose::output::{emit_response, ErrorResponse};

// ============================================================================
// CLI Structure
// ============================================================================

/// Plan Python extension glue for C++ declarations.
#[derive(Parser, Debug)]
#[command(name = "pyexpose", version, about = "Plan Python extension glue for C++ declarations")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the artifacts of one extension module.
    Build {
        /// Declarations document (`{"records": {...}}`).
        #[arg(long)]
        decls: PathBuf,

        /// Binding plan document.
        #[arg(long)]
        plan: PathBuf,

        /// Promote every warning to an error.
        #[arg(long)]
        warnings_as_errors: bool,

        /// Namespace holding `type_<name>` typedefs that pin scalar types.
        #[arg(long)]
        probe_namespace: Option<String>,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level, cli.global.log_json);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "build failed");
            let response = ErrorResponse::from_error(&err);
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();
            ExitCode::from(err.error_code().code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Execute the CLI command.
fn execute(cli: Cli) -> Result<(), ExposeError> {
    match cli.command {
        Command::Build {
            decls,
            plan,
            warnings_as_errors,
            probe_namespace,
        } => {
            let config = BuildConfig {
                warnings_fatal: warnings_as_errors,
                probe_namespace,
                ..BuildConfig::default()
            };
            let response = run_build(&decls, &plan, &config)?;
            emit_response(&response, &mut io::stdout()).map_err(|e| ExposeError::Io {
                path: "<stdout>".to_string(),
                source: e,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn build_flags_parse() {
        let cli = Cli::try_parse_from([
            "pyexpose",
            "build",
            "--decls",
            "d.json",
            "--plan",
            "p.json",
            "--warnings-as-errors",
            "--log-level",
            "debug",
        ])
        .unwrap();
        let Command::Build {
            warnings_as_errors,
            probe_namespace,
            ..
        } = cli.command;
        assert!(warnings_as_errors);
        assert_eq!(probe_namespace, None);
    }
}
