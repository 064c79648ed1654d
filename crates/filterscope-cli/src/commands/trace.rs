//! Launch, intercept, and print.

use std::process::ExitCode;

use filterscope_common::config::TraceConfig;

use crate::output::OutputFormat;

/// Supervises `config.executable` and prints the first filter it installs.
///
/// Exits with success when an install was intercepted, even if the
/// program could only be partly read; exits with failure when the child
/// finished without installing a filter.
///
/// # Errors
///
/// Returns an error if the child cannot be launched, supervision fails,
/// or the report cannot be written.
#[cfg(target_os = "linux")]
pub fn execute(config: &TraceConfig, format: OutputFormat) -> anyhow::Result<ExitCode> {
    use anyhow::Context;
    use filterscope_trace::interceptor::Interceptor;
    use filterscope_trace::tracee::PtraceProcess;

    let process = PtraceProcess::spawn(config)?;
    let outcome = Interceptor::new(process)
        .run()
        .context("supervision failed")?;

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    report(&mut stdout.lock(), &mut stderr.lock(), &outcome, format)
}

/// Supervision needs ptrace, which only exists on Linux.
///
/// # Errors
///
/// Always returns an error on non-Linux platforms.
#[cfg(not(target_os = "linux"))]
pub fn execute(config: &TraceConfig, _format: OutputFormat) -> anyhow::Result<ExitCode> {
    anyhow::bail!(
        "cannot supervise {}: filterscope requires Linux",
        config.executable.display()
    )
}

/// Writes the outcome of a run and picks the exit code for it.
#[cfg(any(target_os = "linux", test))]
fn report<O: std::io::Write, D: std::io::Write>(
    out: &mut O,
    diag: &mut D,
    outcome: &filterscope_trace::interceptor::Outcome,
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    use anyhow::Context;
    use filterscope_trace::interceptor::Outcome;

    use crate::output;

    let code = match outcome {
        Outcome::Captured(capture) => {
            output::write_capture(out, diag, capture, format)
                .context("failed to write filter listing")?;
            ExitCode::SUCCESS
        }
        Outcome::NotFound { exit } => {
            tracing::debug!(%exit, "no filter installed");
            output::write_not_found(diag).context("failed to write report")?;
            ExitCode::FAILURE
        }
    };
    out.flush().context("failed to flush stdout")?;
    Ok(code)
}
