use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::common::datastructures::{FileId, FileKind, Tag};
use crate::error::ProofError;
use crate::pdp::tag::{policy_for, split_blocks, BlockPolicy};
use crate::utils::log_msg;

const FILES_DIR: &str = "files";
const SPACE_DIR: &str = "space";
const TAG_EXT: &str = "tag";

fn missing(err: io::Error, what: &Path) -> ProofError {
    if err.kind() == io::ErrorKind::NotFound {
        ProofError::StorageMissing(what.display().to_string())
    } else {
        ProofError::Io(err)
    }
}

/// On-disk layout shared with the scheduler: raw object at
/// `<dir>/<fileID>`, its tag beside it at `<dir>/<fileID>.tag`, with
/// service and filler objects in separate directories. Deletion by the
/// cleanup worker can race any read here, so absence is always the
/// recoverable `StorageMissing`.
pub struct StorageManager {
    files_dir: PathBuf,
    space_dir: PathBuf,
}

impl StorageManager {
    pub fn new(base: &Path) -> io::Result<Self> {
        let files_dir = base.join(FILES_DIR);
        let space_dir = base.join(SPACE_DIR);
        fs::create_dir_all(&files_dir)?;
        fs::create_dir_all(&space_dir)?;
        Ok(Self { files_dir, space_dir })
    }

    fn dir_for(&self, kind: FileKind) -> &Path {
        match kind {
            FileKind::Service => &self.files_dir,
            FileKind::Space => &self.space_dir,
        }
    }

    pub fn file_path(&self, id: &FileId, kind: FileKind) -> PathBuf {
        self.dir_for(kind).join(id.as_str())
    }

    pub fn tag_path(&self, id: &FileId, kind: FileKind) -> PathBuf {
        self.dir_for(kind).join(format!("{}.{}", id, TAG_EXT))
    }

    pub fn store_file(&self, id: &FileId, kind: FileKind, data: &[u8]) -> io::Result<()> {
        fs::write(self.file_path(id, kind), data)
    }

    pub fn read_file(&self, id: &FileId, kind: FileKind) -> Result<Vec<u8>, ProofError> {
        let path = self.file_path(id, kind);
        fs::read(&path).map_err(|e| missing(e, &path))
    }

    /// Read and split one stored object by its kind's sizing policy.
    pub fn read_blocks(
        &self,
        id: &FileId,
        kind: FileKind,
    ) -> Result<(Vec<Vec<u8>>, BlockPolicy), ProofError> {
        let data = self.read_file(id, kind)?;
        let policy = policy_for(kind, data.len() as u64);
        let blocks = split_blocks(&data, kind, &policy)?;
        Ok((blocks, policy))
    }

    /// Replace the tag atomically: a reader sees the old tag or the new
    /// one, never a torn write. Regeneration therefore invalidates the
    /// prior tag in one step.
    pub fn save_tag(&self, id: &FileId, kind: FileKind, tag: &Tag) -> Result<(), ProofError> {
        let path = self.tag_path(id, kind);
        let tmp = path.with_extension("tag.tmp");
        let raw = serde_json::to_vec(tag)
            .map_err(|e| ProofError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn load_tag(&self, id: &FileId, kind: FileKind) -> Result<Tag, ProofError> {
        let path = self.tag_path(id, kind);
        let raw = fs::read(&path).map_err(|e| missing(e, &path))?;
        serde_json::from_slice(&raw)
            .map_err(|e| ProofError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Remove one object and its tag. Returns whether anything existed.
    pub fn remove(&self, id: &FileId, kind: FileKind) -> Result<bool, ProofError> {
        let mut removed = false;
        for path in [self.file_path(id, kind), self.tag_path(id, kind)] {
            match fs::remove_file(&path) {
                Ok(()) => removed = true,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(ProofError::Io(e)),
            }
        }
        if removed {
            log_msg("INFO", "STORE", None, &format!("removed {} ({:?})", id, kind));
        }
        Ok(removed)
    }
}
