//! Background writer for configuration snapshots.
//!
//! The Metropolis loop hands over an owned copy of the lattice and carries
//! on; a worker thread writes it to disk. Only the newest queued snapshot is
//! written, since every write replaces the previous file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use crate::error::{Result, SimError};
use crate::io::write_xyz;
use crate::lattice::LatticeConfig;

struct Snapshot {
    time: u64,
    config: LatticeConfig,
}

pub struct SnapshotWriter {
    path: PathBuf,
    sender: Option<Sender<Snapshot>>,
    handle: Option<JoinHandle<Result<usize>>>,
}

impl SnapshotWriter {
    pub fn spawn<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let (sender, receiver) = mpsc::channel::<Snapshot>();
        let target = path.clone();

        let handle = thread::spawn(move || -> Result<usize> {
            let mut written = 0;
            while let Ok(mut snapshot) = receiver.recv() {
                while let Ok(newer) = receiver.try_recv() {
                    snapshot = newer;
                }
                write_atomically(&target, &snapshot.config)?;
                log::debug!("snapshot at t = {} written to {}", snapshot.time, target.display());
                written += 1;
            }
            Ok(written)
        });

        Self {
            path,
            sender: Some(sender),
            handle: Some(handle),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue a copy of `config`. Does not wait for the write.
    pub fn submit(&mut self, time: u64, config: &LatticeConfig) -> Result<()> {
        let sent = match &self.sender {
            Some(sender) => sender
                .send(Snapshot {
                    time,
                    config: config.clone(),
                })
                .is_ok(),
            None => false,
        };
        if sent {
            return Ok(());
        }
        // the worker only hangs up after a failed write
        self.join()?;
        Err(SimError::Snapshot("writer stopped unexpectedly".to_string()))
    }

    /// Flush pending snapshots and return how many files were written.
    pub fn finish(mut self) -> Result<usize> {
        self.join()
    }

    fn join(&mut self) -> Result<usize> {
        self.sender = None;
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| SimError::Snapshot("writer thread panicked".to_string()))?,
            None => Ok(0),
        }
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        if let Err(e) = self.join() {
            log::warn!("snapshot writer for {}: {e}", self.path.display());
        }
    }
}

fn write_atomically(path: &Path, config: &LatticeConfig) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    write_xyz(&tmp, config)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::read_xyz;
    use crate::lattice::uniform_config;
    use nalgebra::Vector3;

    #[test]
    fn test_last_snapshot_wins() {
        let path = std::env::temp_dir().join(format!("rust_spinmc_snap_{}.xyz", std::process::id()));
        let mut writer = SnapshotWriter::spawn(&path);

        let mut config = uniform_config([2, 2, 2], 3, Vector3::z()).unwrap();
        writer.submit(1, &config).unwrap();
        config.set([1, 1, 1], Vector3::x()).unwrap();
        writer.submit(2, &config).unwrap();

        let written = writer.finish().unwrap();
        assert!((1..=2).contains(&written));
        assert_eq!(read_xyz(&path).unwrap(), config);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_failure_is_reported() {
        let path = std::env::temp_dir()
            .join("rust_spinmc_missing_dir")
            .join("nested")
            .join("snap.xyz");
        let mut writer = SnapshotWriter::spawn(&path);
        let config = uniform_config([2, 2, 2], 1, Vector3::x()).unwrap();
        let _ = writer.submit(1, &config);
        assert!(writer.finish().is_err());
    }
}
