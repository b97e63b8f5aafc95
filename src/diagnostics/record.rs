//! Diagnostic records and their kinds

use std::fmt;

/// Severity of a diagnostic record; each kind owns exactly one sink
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Error,
    Warning,
    Info,
}

impl DiagnosticKind {
    pub const ALL: [Self; 3] = [Self::Error, Self::Warning, Self::Info];

    /// Level label written into every sink line
    pub fn level(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warning => "WARN",
            Self::Info => "INFO",
        }
    }

    /// File name of the append-only sink for this kind
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Error => "errors.log",
            Self::Warning => "warnings.log",
            Self::Info => "info.log",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.level())
    }
}

/// One diagnostic submitted by a producer
///
/// The error variant may carry no payload at all; the consumer accepts it
/// and writes nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    Error(Option<String>),
    Warning(String),
    Info(String),
}

impl Diagnostic {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Self::Error(_) => DiagnosticKind::Error,
            Self::Warning(_) => DiagnosticKind::Warning,
            Self::Info(_) => DiagnosticKind::Info,
        }
    }

    /// The message to persist, or `None` for an empty error
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Error(message) => message.as_deref(),
            Self::Warning(message) | Self::Info(message) => Some(message),
        }
    }
}
