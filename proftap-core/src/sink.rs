//! Paired profile/heap output files.
//!
//! Both files of a pair are derived from one label and one timestamp and are
//! created and released together; a failure creating the second file removes
//! the first so no partial pair ever escapes.

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use crate::error::ProftapError;

/// One write-only output file of a capture session.
#[derive(Debug)]
struct Sink {
    file: File,
    path: PathBuf,
}

impl Sink {
    fn create(path: PathBuf) -> Result<Self, ProftapError> {
        match File::create(&path) {
            Ok(file) => Ok(Self { file, path }),
            Err(source) => Err(ProftapError::SinkCreate { path, source }),
        }
    }

    fn close(&mut self) -> Result<(), ProftapError> {
        self.file
            .sync_all()
            .map_err(|source| ProftapError::SinkClose {
                path: self.path.clone(),
                source,
            })
    }
}

/// The two output streams of one capture session: CPU profile and heap
/// snapshot. Created together, closed together.
#[derive(Debug)]
pub struct SinkPair {
    profile: Sink,
    heap: Sink,
}

impl SinkPair {
    /// Create `<label>_<stamp>.profile` and `<label>_<stamp>.heap` in `dir`.
    ///
    /// If the heap file cannot be created after the profile file already was,
    /// the profile file is closed and removed before the error is returned.
    pub fn create(dir: &Path, label: &str, stamp: &str) -> Result<Self, ProftapError> {
        let profile = Sink::create(dir.join(format!("{label}_{stamp}.profile")))?;
        match Sink::create(dir.join(format!("{label}_{stamp}.heap"))) {
            Ok(heap) => Ok(Self { profile, heap }),
            Err(err) => {
                let orphan = profile.path.clone();
                drop(profile);
                let _ = fs::remove_file(orphan);
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn profile_path(&self) -> &Path {
        &self.profile.path
    }

    #[must_use]
    pub fn heap_path(&self) -> &Path {
        &self.heap.path
    }

    pub(crate) fn profile_file(&mut self) -> &mut File {
        &mut self.profile.file
    }

    pub(crate) fn heap_file(&mut self) -> &mut File {
        &mut self.heap.file
    }

    /// Flush both sinks to disk. Both attempts always run; the profile sink's
    /// error wins when both fail. On `Ok` the pair may be dropped to release
    /// the descriptors.
    pub fn close(&mut self) -> Result<(), ProftapError> {
        let profile = self.profile.close();
        let heap = self.heap.close();
        profile?;
        heap
    }

    /// Rebuild a pair from raw parts. Test injection seam for close-failure
    /// scenarios that real tmpfs files cannot produce.
    #[cfg(test)]
    pub(crate) fn from_parts(profile: (File, PathBuf), heap: (File, PathBuf)) -> Self {
        Self {
            profile: Sink {
                file: profile.0,
                path: profile.1,
            },
            heap: Sink {
                file: heap.0,
                path: heap.1,
            },
        }
    }
}
