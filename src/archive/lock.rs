use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

pub const LOCK_FILE: &str = ".archive.lock";
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Advisory exclusive lock over one archive root's manifest and catalog.
/// Released when dropped.
#[derive(Debug)]
pub struct ArchiveLock {
    file: File,
}

impl ArchiveLock {
    pub fn acquire(archive_root: &Path, timeout: Duration) -> Result<Self> {
        fs::create_dir_all(archive_root)
            .with_context(|| format!("failed to create {}", archive_root.display()))?;
        let path = archive_root.join(LOCK_FILE);
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        let started = Instant::now();
        loop {
            if FileExt::try_lock_exclusive(&file).is_ok() {
                return Ok(Self { file });
            }
            if started.elapsed() >= timeout {
                anyhow::bail!(
                    "timed out after {}s waiting for archive lock {}",
                    timeout.as_secs(),
                    path.display()
                );
            }
            thread::sleep(Duration::from_millis(50));
        }
    }
}

impl Drop for ArchiveLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
