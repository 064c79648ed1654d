//! CLI argument definitions and dispatch.

pub mod trace;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use filterscope_common::config::TraceConfig;

use crate::output::OutputFormat;

/// Print the seccomp filter a program installs.
#[derive(Parser, Debug)]
#[command(name = filterscope_common::constants::BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Executable to launch and supervise.
    pub executable: PathBuf,

    /// Arguments passed to the executable.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Output format for the decoded filter.
    #[arg(
        long,
        value_enum,
        default_value_t = OutputFormat::Text,
        env = filterscope_common::constants::FORMAT_ENV
    )]
    pub format: OutputFormat,
}

impl Cli {
    /// Builds the run configuration from the parsed arguments.
    #[must_use]
    pub fn trace_config(&self) -> TraceConfig {
        TraceConfig::new(&self.executable).with_args(self.args.iter().cloned())
    }
}

/// Runs the parsed command and returns the process exit code.
///
/// # Errors
///
/// Returns an error if the child cannot be launched or supervision fails.
pub fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    trace::execute(&cli.trace_config(), cli.format)
}
