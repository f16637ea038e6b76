//! Shared logging setup for the migrator binaries.
//!
//! Every binary logs to two places: a size-capped rolling file under the
//! install root and stderr. Stdout is left alone so that commands with a
//! machine-readable contract (the allocator's last line) stay parseable.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "migrator=info,migrator_dispatch=info";
const VERBOSE_LOG_FILTER: &str = "migrator=debug,migrator_dispatch=debug";
const MAX_LOG_FILES: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Logging configuration shared by migrator binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Directory for the rolling log file. `None` logs to stderr only.
    pub log_dir: Option<&'a Path>,
}

/// Initialize tracing with an optional rolling file writer and stderr output.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let base_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };
    let console_filter = if config.verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        base_filter()
    };

    let file_layer = match config.log_dir {
        Some(dir) => {
            let writer = SharedRollingWriter::open(dir, config.app_name)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(base_filter()),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Log directory below an install root: `{install_root}/logs`
pub fn logs_dir(install_root: &Path) -> PathBuf {
    install_root.join("logs")
}

struct RollingFile {
    dir: PathBuf,
    base_name: String,
    file: File,
    size: u64,
}

impl RollingFile {
    fn open(dir: &Path, app_name: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let base_name = sanitize_name(app_name);
        let (file, size) = open_append(&dir.join(format!("{base_name}.log")))?;
        let mut rolling = Self {
            dir: dir.to_path_buf(),
            base_name,
            file,
            size,
        };
        if rolling.size > MAX_LOG_FILE_SIZE {
            rolling.roll()?;
        }
        Ok(rolling)
    }

    fn path(&self, index: usize) -> PathBuf {
        if index == 0 {
            self.dir.join(format!("{}.log", self.base_name))
        } else {
            self.dir.join(format!("{}.log.{}", self.base_name, index))
        }
    }

    /// Shift `name.log.N` to `name.log.N+1`, dropping the oldest, then reopen.
    fn roll(&mut self) -> io::Result<()> {
        let _ = self.file.flush();

        let oldest = self.path(MAX_LOG_FILES - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (0..MAX_LOG_FILES - 1).rev() {
            let src = self.path(index);
            if src.exists() {
                fs::rename(&src, self.path(index + 1))?;
            }
        }

        let (file, size) = open_append(&self.path(0))?;
        self.file = file;
        self.size = size;
        Ok(())
    }

    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size + buf.len() as u64 > MAX_LOG_FILE_SIZE {
            self.roll()?;
        }
        let written = self.file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }
}

fn open_append(path: &Path) -> io::Result<(File, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let size = file.metadata()?.len();
    Ok((file, size))
}

#[derive(Clone)]
struct SharedRollingWriter {
    inner: Arc<Mutex<RollingFile>>,
}

impl SharedRollingWriter {
    fn open(dir: &Path, app_name: &str) -> Result<Self> {
        let rolling = RollingFile::open(dir, app_name)
            .with_context(|| format!("Failed to open log file in {}", dir.display()))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(rolling)),
        })
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, RollingFile>> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedRollingWriter {
    type Writer = SharedRollingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Write for SharedRollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock()?.write_chunk(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.file.flush()
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}
