use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing_appender::rolling;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    prelude::*,
};

/// Installs the global subscriber, filtered through `RUST_LOG`.
///
/// Each run logs to its own `<data_dir>/weave/logs/<timestamp>.log`; without a
/// data directory output goes to stderr instead.
pub fn init_tracing() -> io::Result<()> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let log_file = dirs::data_dir().map(|data_dir| log_file_path(&data_dir, &timestamp));

    let writer = match &log_file {
        Some(path) => {
            let (dir, name) = split_log_path(path)?;
            std::fs::create_dir_all(dir)?;
            BoxMakeWriter::new(rolling::never(dir, name))
        }
        None => BoxMakeWriter::new(io::stderr),
    };

    let to_file = log_file.is_some();
    let layer = fmt::Layer::new()
        .with_writer(writer)
        .with_ansi(!to_file)
        .with_target(true)
        .with_file(to_file)
        .with_line_number(to_file)
        .with_span_events(if to_file { FmtSpan::CLOSE } else { FmtSpan::NONE });

    tracing_subscriber::registry()
        .with(layer)
        .with(EnvFilter::from_default_env())
        .try_init()
        .map_err(io::Error::other)?;

    match &log_file {
        Some(path) => tracing::debug!(
            target: "weave::utils::tracing",
            path = %path.display(),
            "Logging to file"
        ),
        None => tracing::debug!(target: "weave::utils::tracing", "Logging to stderr"),
    }
    Ok(())
}

fn log_file_path(data_dir: &Path, timestamp: &str) -> PathBuf {
    data_dir
        .join("weave")
        .join("logs")
        .join(format!("{timestamp}.log"))
}

fn split_log_path(path: &Path) -> io::Result<(&Path, &std::ffi::OsStr)> {
    match (path.parent(), path.file_name()) {
        (Some(dir), Some(name)) => Ok((dir, name)),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid log path {}", path.display()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_files_live_under_weave_logs() {
        let path = log_file_path(Path::new("/data"), "20240101_120000");

        assert_eq!(path, PathBuf::from("/data/weave/logs/20240101_120000.log"));
        let (dir, name) = split_log_path(&path).expect("split log path");
        assert_eq!(dir, Path::new("/data/weave/logs"));
        assert_eq!(name, "20240101_120000.log");
    }
}
