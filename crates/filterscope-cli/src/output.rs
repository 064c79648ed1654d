//! Formatted output for captured filters.
//!
//! The listing goes to `out`; status notices and read failures go to
//! `diag`, so the listing can be piped on its own.

use std::io::{self, Write};

use clap::ValueEnum;
use filterscope_bpf::disasm::DecodedLine;
use filterscope_trace::interceptor::Capture;
use filterscope_trace::signature::InstallCall;
use serde::Serialize;

/// How the decoded filter is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Column-aligned listing.
    Text,
    /// A single JSON document.
    Json,
}

const COLUMN_HEADER: &str = " line  CODE  JT   JF      K";
const RULE: &str = "=================================";

/// JSON form of a capture.
#[derive(Debug, Serialize)]
struct Report {
    call: InstallCall,
    program: u64,
    length: Option<u16>,
    filter_pointer: Option<u64>,
    instructions: Vec<DecodedLine>,
    failure: Option<String>,
}

/// Writes a captured filter.
///
/// # Errors
///
/// Returns an error if either stream cannot be written.
pub fn write_capture<O: Write, D: Write>(
    out: &mut O,
    diag: &mut D,
    capture: &Capture,
    format: OutputFormat,
) -> io::Result<()> {
    writeln!(diag, "# Intercepted {}", capture.install.call)?;
    match format {
        OutputFormat::Text => write_text(out, diag, capture),
        OutputFormat::Json => write_json(out, diag, capture),
    }
}

fn write_text<O: Write, D: Write>(out: &mut O, diag: &mut D, capture: &Capture) -> io::Result<()> {
    let program = match &capture.program {
        Ok(program) => program,
        Err(err) => return writeln!(diag, "Failed to read sock_fprog: {err}"),
    };
    writeln!(out, "# Filter length: {}", program.header.len)?;
    writeln!(out, "# Filter pointer: {:#x}", program.header.filter)?;
    writeln!(out, "{COLUMN_HEADER}")?;
    writeln!(out, "{RULE}")?;
    for line in program.lines() {
        writeln!(out, "{line}")?;
    }
    if let Some(failure) = &program.failure {
        writeln!(diag, "Failed to read filter[{}]: {}", failure.index, failure.error)?;
    }
    Ok(())
}

fn write_json<O: Write, D: Write>(out: &mut O, diag: &mut D, capture: &Capture) -> io::Result<()> {
    let report = match &capture.program {
        Ok(program) => {
            if let Some(failure) = &program.failure {
                writeln!(diag, "Failed to read filter[{}]: {}", failure.index, failure.error)?;
            }
            Report {
                call: capture.install.call,
                program: capture.install.program,
                length: Some(program.header.len),
                filter_pointer: Some(program.header.filter),
                instructions: program.lines(),
                failure: program
                    .failure
                    .as_ref()
                    .map(|f| format!("filter[{}]: {}", f.index, f.error)),
            }
        }
        Err(err) => {
            writeln!(diag, "Failed to read sock_fprog: {err}")?;
            Report {
                call: capture.install.call,
                program: capture.install.program,
                length: None,
                filter_pointer: None,
                instructions: Vec::new(),
                failure: Some(format!("sock_fprog: {err}")),
            }
        }
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)
}

/// Writes the notice for a child that never installed a filter.
///
/// # Errors
///
/// Returns an error if the stream cannot be written.
pub fn write_not_found<D: Write>(diag: &mut D) -> io::Result<()> {
    writeln!(diag, "# No seccomp filter found")
}
