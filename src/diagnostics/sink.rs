//! Append-only file sinks owned by the diagnostics consumer

use crate::diagnostics::record::DiagnosticKind;
use crate::diagnostics::DiagnosticsError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs::OpenOptions;
use std::path::Path;
use std::str::FromStr;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Line layout used by the sinks
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// `time=... level=... msg="..."`
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected text or json)")),
        }
    }
}

/// Render a single sink line, newline-terminated
pub fn render_line(
    format: LogFormat,
    kind: DiagnosticKind,
    message: &str,
    time: DateTime<Utc>,
) -> String {
    let time = time.to_rfc3339_opts(SecondsFormat::Millis, true);
    match format {
        LogFormat::Text => {
            format!(
                "time={time} level={} msg={}\n",
                kind.level(),
                quote_if_needed(message)
            )
        }
        LogFormat::Json => {
            let line = serde_json::json!({
                "time": time,
                "level": kind.level(),
                "msg": message,
            });
            format!("{line}\n")
        }
    }
}

fn quote_if_needed(value: &str) -> String {
    let bare = !value.is_empty()
        && value
            .chars()
            .all(|c| !c.is_whitespace() && !c.is_control() && c != '"' && c != '=');
    if bare {
        value.to_string()
    } else {
        format!("{value:?}")
    }
}

/// The three open sinks
pub struct SinkSet {
    error: File,
    warning: File,
    info: File,
}

impl SinkSet {
    /// Open (creating if absent) every sink under `dir` in append mode
    pub fn open(dir: &Path) -> Result<Self, DiagnosticsError> {
        std::fs::create_dir_all(dir).map_err(|source| DiagnosticsError::SinkOpen {
            path: dir.to_path_buf(),
            source,
        })?;

        Ok(Self {
            error: open_append(&dir.join(DiagnosticKind::Error.file_name()))?,
            warning: open_append(&dir.join(DiagnosticKind::Warning.file_name()))?,
            info: open_append(&dir.join(DiagnosticKind::Info.file_name()))?,
        })
    }

    /// Append one rendered line to the sink for `kind`
    pub async fn write(&mut self, kind: DiagnosticKind, line: &str) -> std::io::Result<()> {
        let file = match kind {
            DiagnosticKind::Error => &mut self.error,
            DiagnosticKind::Warning => &mut self.warning,
            DiagnosticKind::Info => &mut self.info,
        };
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

fn open_append(path: &Path) -> Result<File, DiagnosticsError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| DiagnosticsError::SinkOpen {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(File::from_std(file))
}

#[cfg(test)]
impl SinkSet {
    /// Sinks backed by read-only handles, for exercising write failures
    pub(crate) fn read_only(dir: &Path) -> Self {
        let open = |kind: DiagnosticKind| {
            let path = dir.join(kind.file_name());
            std::fs::write(&path, "").unwrap();
            File::from_std(std::fs::File::open(path).unwrap())
        };
        Self {
            error: open(DiagnosticKind::Error),
            warning: open(DiagnosticKind::Warning),
            info: open(DiagnosticKind::Info),
        }
    }
}
