use std::error::Error;
use std::fmt;
use std::io;

/// Raised when a cache model can't be built from the given parameters.
///
/// This is always fatal, no model is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A parameter was never given, neither on the command line nor in a config file
    Missing(&'static str),
    /// A parameter was zero or negative
    NonPositive { param: &'static str, value: i64 },
    /// `s + b` leaves no room for a tag in a 64-bit address
    TooManyAddressBits { s: i64, b: i64 },
    /// `2^s * E` is more lines than the simulator will allocate
    TooManyLines { sets: u64, associativity: u64 },
    /// The lines passed validation but the allocator couldn't provide them
    OutOfMemory { lines: usize },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::Missing(param) => {
                write!(f, "missing required parameter -{param}")
            }
            ConfigurationError::NonPositive { param, value } => {
                write!(f, "parameter -{param} must be positive, got {value}")
            }
            ConfigurationError::TooManyAddressBits { s, b } => {
                write!(f, "set index bits ({s}) plus block offset bits ({b}) must be at most 63")
            }
            ConfigurationError::TooManyLines { sets, associativity } => {
                write!(f, "{sets} sets of {associativity} lines is too large to simulate")
            }
            ConfigurationError::OutOfMemory { lines } => {
                write!(f, "couldn't allocate {lines} cache lines")
            }
        }
    }
}

impl Error for ConfigurationError {}

/// Raised by the trace reader. The cache model itself never fails.
#[derive(Debug)]
pub enum TraceError {
    /// A line which isn't a valid record, `line` is 1-based
    Malformed { line: usize, content: String },
    Io(io::Error),
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceError::Malformed { line, content } => {
                write!(f, "malformed trace record on line {line}: {content:?}")
            }
            TraceError::Io(e) => write!(f, "couldn't read the trace: {e}"),
        }
    }
}

impl Error for TraceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TraceError::Io(e) => Some(e),
            TraceError::Malformed { .. } => None,
        }
    }
}

impl From<io::Error> for TraceError {
    fn from(value: io::Error) -> Self {
        TraceError::Io(value)
    }
}
