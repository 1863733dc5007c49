//! Output Writer: appends formatted lines to a single output's file, lazily
//! opening it on first write, and performs numbered rotation when the
//! configured maximum size is reached.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use log::warn;

use crate::config::Output;

const FILE_MODE: u32 = 0o640;

pub struct Writer {
    path: PathBuf,
    max_size: u64,
    rotations: u32,
    file: Option<File>,
    size: u64,
}

impl Writer {
    pub fn new(output: &Output) -> Self {
        Writer {
            path: output.path.clone(),
            max_size: output.max_size,
            rotations: output.rotations,
            file: None,
            size: 0,
        }
    }

    /// Append `line` (without a trailing newline) and rotate if the running
    /// size has crossed the configured maximum. Errors are logged and
    /// otherwise swallowed: the writer always continues in degraded mode
    /// rather than aborting the process, per spec §7.
    pub fn write_line(&mut self, line: &[u8]) {
        if let Err(e) = self.try_write(line) {
            warn!("write to {:?} failed: {}", self.path, e);
        }
    }

    pub fn close(&mut self) {
        self.file = None;
    }

    fn ensure_open(&mut self) -> io::Result<()> {
        if self.file.is_some() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(FILE_MODE)
            .open(&self.path)?;
        self.size = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn try_write(&mut self, line: &[u8]) -> io::Result<()> {
        self.ensure_open()?;
        let file = self.file.as_mut().expect("just opened");
        file.write_all(line)?;
        file.write_all(b"\n")?;
        self.size += line.len() as u64 + 1;

        if self.size >= self.max_size {
            if let Err(e) = self.rotate() {
                warn!("rotation of {:?} failed: {}", self.path, e);
            }
        }
        Ok(())
    }

    fn generation_path(&self, n: u32) -> PathBuf {
        generation_path(&self.path, n)
    }

    /// `P -> P.1 -> P.2 -> ... -> P.N`, oldest generation discarded.
    fn rotate(&mut self) -> io::Result<()> {
        self.file = None;

        let oldest = self.generation_path(self.rotations);
        remove_ignoring_missing(&oldest)?;

        for i in (2..=self.rotations).rev() {
            let src = self.generation_path(i - 1);
            let dst = self.generation_path(i);
            rename_ignoring_missing_source(&src, &dst)?;
        }

        fs::rename(&self.path, self.generation_path(1))?;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(FILE_MODE)
            .open(&self.path)?;
        self.size = 0;
        self.file = Some(file);
        Ok(())
    }
}

fn generation_path(base: &Path, n: u32) -> PathBuf {
    let mut os = base.as_os_str().to_owned();
    os.push(format!(".{}", n));
    PathBuf::from(os)
}

fn remove_ignoring_missing(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn rename_ignoring_missing_source(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
