//! System-wide constants.

/// Binary name for the CLI.
pub const BIN_NAME: &str = "filterscope";

/// Environment variable selecting the default output format.
pub const FORMAT_ENV: &str = "FILTERSCOPE_FORMAT";

/// Width of a pointer in the supervised process, in bytes.
///
/// The supervised process is always a native child of the supervisor,
/// so it shares the supervisor's pointer width.
pub const POINTER_SIZE: usize = std::mem::size_of::<usize>();
