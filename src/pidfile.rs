//! Process lock (spec §6): a single advisory `flock` on a PID file,
//! acquired at startup and released on shutdown. Failure to acquire is a
//! fatal startup error.

use std::fs::OpenOptions;
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use log::info;
use nix::fcntl::{flock, FlockArg};

pub struct PidFile {
    path: PathBuf,
    file: std::fs::File,
}

impl PidFile {
    /// Acquire the lock, truncate the file, and write the current PID.
    /// Returns an error if another instance already holds the lock.
    pub fn acquire(path: &Path) -> io::Result<PidFile> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .mode(0o644)
            .open(path)?;

        flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock)
            .map_err(|e| io::Error::new(io::ErrorKind::WouldBlock, format!("{}", e)))?;

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", std::process::id())?;

        info!("acquired pid lock at {:?}", path);
        Ok(PidFile {
            path: path.to_path_buf(),
            file,
        })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = flock(self.file.as_raw_fd(), FlockArg::UnlockNonblock);
        let _ = std::fs::remove_file(&self.path);
    }
}
