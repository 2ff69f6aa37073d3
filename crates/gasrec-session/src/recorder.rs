//! Per-session output directory and append-only channel logs.
//!
//! Each tick appends one line to each of the four channel logs. Writes are
//! open-append-close with no handle retained across ticks, so a crash leaves
//! the logs consistent through the last fully written tick.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use gasrec_foundation::{SessionError, Tick};

use crate::convert::text_log_to_npy;

/// The four recorded channels, in log order.
pub const CHANNELS: [&str; 4] = ["timestamps", "ga-mac", "oxygen", "dose"];

pub const MONITOR_LOG: &str = "log-monitor.txt";

/// The per-run output directory, named by start timestamp. The path never
/// changes after creation.
pub struct SessionDir {
    path: PathBuf,
}

impl SessionDir {
    /// Create `<datadir>/<YYYY-MM-DD-HH-MM-SS>/`. Fails fast if a directory
    /// of that name already exists; a prior recording is never overwritten.
    pub fn create(datadir: &Path) -> Result<Self, SessionError> {
        let name = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S").to_string();
        Self::create_named(datadir, &name)
    }

    pub fn create_named(datadir: &Path, name: &str) -> Result<Self, SessionError> {
        let path = datadir.join(name);
        std::fs::create_dir(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                SessionError::SessionDirectoryExists { path: path.clone() }
            } else {
                SessionError::CreateDirectory {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;

        let dir = Self { path };
        // Touch the channel logs up front so an interrupted first tick still
        // leaves all four present and equal-length (empty).
        for channel in CHANNELS {
            dir.append_line(channel, None)?;
        }
        Ok(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn monitor_log(&self) -> PathBuf {
        self.path.join(MONITOR_LOG)
    }

    pub fn channel_log(&self, channel: &str) -> PathBuf {
        self.path.join(format!("{}.txt", channel))
    }

    /// Append one synchronized record across the four channel logs.
    ///
    /// Staged so the tick is all-or-none: every log is opened before any is
    /// written, and a mid-write failure truncates already-written logs back
    /// to their pre-tick length.
    pub fn append_tick(&self, tick: &Tick) -> Result<(), SessionError> {
        let lines: [(&'static str, String); 4] = [
            ("timestamps", format!("{}", tick.timestamp)),
            ("ga-mac", format!("{}", tick.sample.mac)),
            ("oxygen", format!("{}", tick.sample.o2)),
            ("dose", format!("{}", tick.sample.dose)),
        ];

        let mut opened = Vec::with_capacity(4);
        for (channel, line) in &lines {
            let path = self.channel_log(channel);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| SessionError::ChannelWrite {
                    channel: *channel,
                    source: e,
                })?;
            let len = file
                .metadata()
                .map_err(|e| SessionError::ChannelWrite {
                    channel: *channel,
                    source: e,
                })?
                .len();
            opened.push((*channel, path, file, len, line));
        }

        for i in 0..opened.len() {
            let result = {
                let (channel, _, file, _, line) = &mut opened[i];
                writeln!(file, "{}", line)
                    .and_then(|_| file.flush())
                    .map_err(|e| (*channel, e))
            };
            if let Err((channel, e)) = result {
                self.roll_back(&opened[..i]);
                return Err(SessionError::ChannelWrite { channel, source: e });
            }
        }
        Ok(())
    }

    fn roll_back(&self, written: &[(&'static str, PathBuf, std::fs::File, u64, &String)]) {
        for (channel, path, _, len, _) in written {
            if let Err(e) =
                OpenOptions::new().write(true).open(path).and_then(|f| f.set_len(*len))
            {
                tracing::error!("Could not roll back channel log {}: {}", channel, e);
            }
        }
    }

    fn append_line(&self, channel: &str, line: Option<&str>) -> Result<(), SessionError> {
        let path = self.channel_log(channel);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SessionError::ChannelWrite {
                channel: channel_name(channel),
                source: e,
            })?;
        if let Some(line) = line {
            writeln!(file, "{}", line).map_err(|e| SessionError::ChannelWrite {
                channel: channel_name(channel),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Best-effort per-tick snapshot of the vendor artifacts. The export is
    /// copied, not moved, so the capture process keeps appending to it.
    pub fn snapshot_artifacts(&self, csv: &Path, raw: &Path) -> Result<(), SessionError> {
        for src in [csv, raw] {
            let Some(name) = src.file_name() else { continue };
            std::fs::copy(src, self.path.join(name)).map_err(|e| SessionError::ArtifactCopy {
                path: src.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Move the vendor artifacts in as the authoritative last snapshot.
    /// An absent artifact is tolerated; the capture process may never have
    /// produced output.
    pub fn adopt_artifacts(&self, csv: &Path, raw: &Path) {
        for src in [csv, raw] {
            if let Err(e) = self.move_in(src) {
                tracing::warn!("Final artifact move failed: {}", e);
            }
        }
    }

    /// Convert each channel log to an NPY array.
    ///
    /// Conversion failures are reported per channel and never roll back
    /// channels that already converted; the text logs always stay on disk.
    pub fn convert_channels(&self) -> Result<(), SessionError> {
        let mut failed = Vec::new();
        for channel in CHANNELS {
            let txt = self.channel_log(channel);
            let npy = self.path.join(format!("{}.npy", channel));
            match text_log_to_npy(&txt, &npy) {
                Ok(n) => tracing::info!("Converted {}: {} values", txt.display(), n),
                Err(e) => {
                    tracing::error!("Conversion failed for {}: {}", txt.display(), e);
                    failed.push(channel_name(channel));
                }
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(SessionError::Conversion { channels: failed })
        }
    }

    /// Session-end handoff: artifact move followed by channel conversion.
    pub fn finalize(&self, csv: &Path, raw: &Path) -> Result<(), SessionError> {
        self.adopt_artifacts(csv, raw);
        self.convert_channels()
    }

    fn move_in(&self, src: &Path) -> Result<(), SessionError> {
        let Some(name) = src.file_name() else {
            return Ok(());
        };
        let dest = self.path.join(name);
        match std::fs::rename(src, &dest) {
            Ok(()) => Ok(()),
            // Datadir may sit on another filesystem; fall back to copy+remove.
            Err(_) => {
                std::fs::copy(src, &dest).map_err(|e| SessionError::ArtifactMove {
                    path: src.to_path_buf(),
                    source: e,
                })?;
                std::fs::remove_file(src).map_err(|e| SessionError::ArtifactMove {
                    path: src.to_path_buf(),
                    source: e,
                })
            }
        }
    }
}

fn channel_name(channel: &str) -> &'static str {
    CHANNELS
        .iter()
        .find(|c| **c == channel)
        .copied()
        .unwrap_or("unknown")
}
