//! Logging setup
//!
//! Everything goes to the configured log file and is echoed to stderr at the
//! same level.

use std::path::{Path, PathBuf};

use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::Error;
use crate::Result;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level when set. The returned guard
/// flushes the file writer on drop, so keep it alive until exit.
pub fn init(config: &Config) -> Result<WorkerGuard> {
    let (dir, file_name) = split_log_path(&config.log_file)?;
    std::fs::create_dir_all(&dir)?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()));

    subscriber(env_filter, non_blocking, std::io::stderr)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))?;

    Ok(guard)
}

/// Registry writing every event that passes `filter` to both writers.
fn subscriber<F, E>(filter: EnvFilter, file: F, stderr: E) -> impl Subscriber + Send + Sync
where
    F: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    E: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(file).with_ansi(false))
        .with(fmt::layer().with_writer(stderr))
}

/// Directory and file name of the log path; a bare name lives in the
/// working directory.
fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf)> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Config(format!("Invalid log file path: {:?}", path)))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, PathBuf::from(file_name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_stderr_follows_configured_level() {
        let file = Captured::default();
        let stderr = Captured::default();
        let (f, e) = (file.clone(), stderr.clone());
        let subscriber = subscriber(
            EnvFilter::new(crate::config::LogLevel::Info.as_filter()),
            move || f.clone(),
            move || e.clone(),
        );

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Posted the APOD");
            tracing::debug!("raw payload");
        });

        for output in [file.text(), stderr.text()] {
            assert!(output.contains("Posted the APOD"));
            assert!(!output.contains("raw payload"));
        }
    }

    #[test]
    fn test_split_bare_name() {
        let (dir, name) = split_log_path(Path::new("spacebot.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, PathBuf::from("spacebot.log"));
    }

    #[test]
    fn test_split_nested_path() {
        let (dir, name) = split_log_path(Path::new("/var/log/spacebot/bot.log")).unwrap();
        assert_eq!(dir, PathBuf::from("/var/log/spacebot"));
        assert_eq!(name, PathBuf::from("bot.log"));
    }

    #[test]
    fn test_split_rejects_directory_only() {
        assert!(split_log_path(Path::new("/")).is_err());
    }
}
