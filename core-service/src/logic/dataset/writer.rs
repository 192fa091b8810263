use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;

use super::record::PredictionRecord;

const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10 MB

/// Append-only JSONL writer with size-based rotation
pub struct JsonlWriter {
    file: Mutex<Option<File>>,
    base_dir: PathBuf,
    max_file_size: u64,
}

impl JsonlWriter {
    pub fn from_path(base_dir: PathBuf) -> io::Result<Self> {
        Self::with_max_size(base_dir, MAX_FILE_SIZE)
    }

    pub fn with_max_size(base_dir: PathBuf, max_file_size: u64) -> io::Result<Self> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self {
            file: Mutex::new(None),
            base_dir,
            max_file_size,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Append one record, rotating when the current file is full
    pub fn append(&self, record: &PredictionRecord) -> io::Result<()> {
        let mut file_guard = self.file.lock();

        // Reopen the latest file after a restart
        if file_guard.is_none() {
            *file_guard = Some(match self.find_latest_log_file()? {
                Some(path) => {
                    let f = OpenOptions::new().create(true).append(true).open(&path)?;
                    if f.metadata()?.len() < self.max_file_size {
                        f
                    } else {
                        self.create_new_file()?
                    }
                }
                None => self.create_new_file()?,
            });
        }

        let should_rotate = match file_guard.as_ref() {
            Some(f) => f.metadata()?.len() >= self.max_file_size,
            None => false,
        };
        if should_rotate {
            *file_guard = Some(self.create_new_file()?);
        }

        if let Some(file) = file_guard.as_mut() {
            let json = serde_json::to_string(record)?;
            writeln!(file, "{}", json)?;
        }

        Ok(())
    }

    /// (file count, total size in MB, latest file name)
    pub fn get_stats(&self) -> io::Result<(usize, f32, Option<String>)> {
        let mut size = 0u64;
        let paths = self.log_files()?;
        for path in &paths {
            if let Ok(meta) = fs::metadata(path) {
                size += meta.len();
            }
        }

        let latest_file = paths
            .last()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(str::to_string);

        Ok((paths.len(), size as f32 / 1024.0 / 1024.0, latest_file))
    }

    fn create_new_file(&self) -> io::Result<File> {
        // Sub-second suffix keeps names unique (and ordered) under fast rotation
        let now = Utc::now();
        let filename = format!(
            "predictions-{}-{:06}.jsonl",
            now.format("%Y-%m-%d-%H%M%S"),
            now.timestamp_subsec_micros()
        );
        let path = self.base_dir.join(filename);

        OpenOptions::new().create(true).append(true).open(path)
    }

    /// Sorted by name; the timestamp makes this chronological
    fn log_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(&self.base_dir)?
            .filter_map(|res| res.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map_or(false, |ext| ext == "jsonl"))
            .collect::<Vec<_>>();
        entries.sort();
        Ok(entries)
    }

    fn find_latest_log_file(&self) -> io::Result<Option<PathBuf>> {
        Ok(self.log_files()?.pop())
    }
}
