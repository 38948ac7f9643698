//! C6: local content-addressed, gzip-compressed file-version store, plus
//! the per-remote local index (`<RemoteId>.json`) that the sync engine
//! advances.

use std::{
  collections::HashMap,
  fs,
  io::{Read, Write},
  path::{Path, PathBuf},
};

use anyhow::Result;
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};

use crate::{error::Error, hash, urlish::Urlish};

const FILES_DIR: &str = "files";
const CURRENT_FILE: &str = "current";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileEntry {
  /// ScriptId -> FileVersionId captured after that script ran.
  pub chain: HashMap<String, String>,
  /// FileVersionId of the pre-sync content, or "" if the file did not
  /// exist before tracking began.
  pub original: String,
  /// ScriptId at which this machine first began tracking this file.
  pub newin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalIndex {
  pub remote: Urlish,
  pub revision: i64,
  pub at: String,
  pub files: HashMap<String, FileEntry>,
}

impl LocalIndex {
  fn fresh(remote: Urlish) -> Self {
    Self {
      remote,
      revision: -1,
      at: String::new(),
      files: HashMap::new(),
    }
  }

  /// Per the distilled spec's `up_to_date`: `revision == -1` (set by
  /// rollback/desync to force a resync) must never read as caught up.
  pub fn up_to_date(&self, remote_revision: u64) -> bool {
    self.revision >= 0 && self.revision as u64 >= remote_revision
  }
}

/// Owns the on-disk state for one remote: the local index JSON, the
/// content-addressed blob directory, and the `current` pointer file that
/// records which remote this local directory was last synced against.
pub struct SnapshotStore {
  /// The state directory (holds `current`, `<RemoteId>.json`, `files/`).
  local_dir: PathBuf,
  pub remote_id: String,
  pub index: LocalIndex,
}

impl SnapshotStore {
  pub fn local_files_home(local_dir: &Path) -> PathBuf {
    local_dir
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_else(|| local_dir.to_path_buf())
  }

  fn index_path(local_dir: &Path, remote_id: &str) -> PathBuf {
    local_dir.join(format!("{}.json", remote_id))
  }

  pub fn index_file_path(&self) -> PathBuf {
    Self::index_path(&self.local_dir, &self.remote_id)
  }

  /// Load the local index for `remote_id` if present, otherwise create a
  /// fresh one scoped to `remote` (used on first sync against a remote).
  pub fn open(local_dir: &Path, remote_id: &str, remote: &Urlish) -> Result<Self> {
    fs::create_dir_all(local_dir)?;
    fs::create_dir_all(local_dir.join(FILES_DIR))?;

    let path = Self::index_path(local_dir, remote_id);
    let index = if path.exists() {
      let bytes = fs::read(&path)?;
      serde_json::from_slice(&bytes)
        .map_err(|e| Error::IndexCorrupt(format!("{}: {}", path.display(), e)))?
    } else {
      LocalIndex::fresh(remote.clone())
    };

    Ok(Self {
      local_dir: local_dir.to_path_buf(),
      remote_id: remote_id.to_string(),
      index,
    })
  }

  /// The RemoteId last recorded in `<local_dir>/current`, if any.
  pub fn read_current(local_dir: &Path) -> Result<Option<String>> {
    let path = local_dir.join(CURRENT_FILE);
    if !path.exists() {
      return Ok(None);
    }
    Ok(Some(fs::read_to_string(path)?.trim().to_string()))
  }

  /// The urlish stored in an existing local index, for commands invoked
  /// without an explicit remote argument.
  pub fn read_stored_remote(local_dir: &Path, remote_id: &str) -> Result<Urlish> {
    let path = Self::index_path(local_dir, remote_id);
    let bytes = fs::read(&path).map_err(|_| Error::NotInitialized)?;
    let index: LocalIndex = serde_json::from_slice(&bytes)
      .map_err(|e| Error::IndexCorrupt(format!("{}: {}", path.display(), e)))?;
    Ok(index.remote)
  }

  /// Rewritten only at the successful end of `sync`, never at the start of
  /// a remote switch, so a failed switch leaves recovery state intact.
  pub fn write_current(&self) -> Result<()> {
    fs::write(self.local_dir.join(CURRENT_FILE), &self.remote_id)?;
    Ok(())
  }

  pub fn persist(&self) -> Result<()> {
    let path = Self::index_path(&self.local_dir, &self.remote_id);
    let bytes = serde_json::to_vec(&self.index)?;
    fs::write(path, bytes)?;
    Ok(())
  }

  fn blob_path(&self, version_id: &str) -> PathBuf {
    self.local_dir.join(FILES_DIR).join(format!("{}.gz", version_id))
  }

  fn local_path(&self, filename: &str) -> PathBuf {
    Self::local_files_home(&self.local_dir).join(filename)
  }

  pub fn script_scratch_path(&self) -> PathBuf {
    self.local_dir.join("script.py")
  }

  pub fn local_dir(&self) -> &Path {
    &self.local_dir
  }

  fn write_blob(&self, version_id: &str, mut source: impl Read) -> Result<()> {
    let file = fs::File::create(self.blob_path(version_id))?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    std::io::copy(&mut source, &mut encoder)?;
    encoder.finish()?;
    Ok(())
  }

  fn read_blob_into(&self, version_id: &str, mut sink: impl Write) -> Result<()> {
    let file = fs::File::open(self.blob_path(version_id))?;
    let mut decoder = GzDecoder::new(file);
    std::io::copy(&mut decoder, &mut sink)?;
    Ok(())
  }

  /// Called after a script has been applied: capture the live content of
  /// `filename` under the FileVersionId for the current `at`.
  pub fn record_file(&mut self, filename: &str) -> Result<()> {
    let at = self.index.at.clone();
    let vid = hash::file_version_id(&self.remote_id, filename, &at);
    let path = self.local_path(filename);
    if path.exists() {
      self.write_blob(&vid, fs::File::open(&path)?)?;
      self
        .index
        .files
        .entry(filename.to_string())
        .or_default()
        .chain
        .insert(at.clone(), vid);
    } else {
      self
        .index
        .files
        .entry(filename.to_string())
        .or_default()
        .chain
        .insert(at.clone(), String::new());
    }
    self.persist()
  }

  /// Called before a script that first introduces `filename` to tracking:
  /// snapshot its pre-script content as `original`.
  pub fn record_original(&mut self, filename: &str, added_in: &str) -> Result<()> {
    let vid = hash::file_version_id(&self.remote_id, filename, added_in);
    let path = self.local_path(filename);
    let chain = self
      .index
      .files
      .get(filename)
      .map(|e| e.chain.clone())
      .unwrap_or_default();

    let original = if path.exists() {
      self.write_blob(&vid, fs::File::open(&path)?)?;
      vid
    } else {
      String::new()
    };

    self.index.files.insert(
      filename.to_string(),
      FileEntry {
        chain,
        original,
        newin: added_in.to_string(),
      },
    );
    self.persist()
  }

  /// Restore `filename` to the given `version` (a ScriptId in `chain`), or
  /// to `original` when `version` is `None`.
  pub fn restore_version(&self, filename: &str, version: Option<&str>) -> Result<()> {
    let entry = self
      .index
      .files
      .get(filename)
      .ok_or_else(|| Error::MissingFile(filename.to_string()))?;

    let version_id = match version {
      None => entry.original.clone(),
      Some(v) => entry
        .chain
        .get(v)
        .cloned()
        .ok_or_else(|| Error::MissingFile(format!("{}@{}", filename, v)))?,
    };

    let path = self.local_path(filename);
    if version_id.is_empty() {
      match fs::remove_file(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
      }
    } else {
      if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
      }
      self.read_blob_into(&version_id, fs::File::create(&path)?)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::TempDir;

  fn store(dir: &TempDir) -> SnapshotStore {
    let remote = Urlish::parse("alice@example.com:cfg").unwrap();
    let local_dir = dir.path().join("state");
    SnapshotStore::open(&local_dir, "remote1", &remote).unwrap()
  }

  #[test]
  fn record_and_restore_original_round_trips() {
    let dir = TempDir::new().unwrap();
    let mut s = store(&dir);
    let home = SnapshotStore::local_files_home(s.local_dir());
    fs::write(home.join("x"), b"hello\n").unwrap();

    s.record_original("x", "s1").unwrap();
    assert_ne!(s.index.files["x"].original, "");

    fs::write(home.join("x"), b"changed\n").unwrap();
    s.restore_version("x", None).unwrap();
    assert_eq!(fs::read(home.join("x")).unwrap(), b"hello\n");
  }

  #[test]
  fn record_original_of_absent_file_is_empty_sentinel() {
    let dir = TempDir::new().unwrap();
    let mut s = store(&dir);
    s.record_original("missing", "s1").unwrap();
    assert_eq!(s.index.files["missing"].original, "");

    // restoring "" deletes (no-op if already absent)
    s.restore_version("missing", None).unwrap();
  }

  #[test]
  fn record_file_then_restore_by_script_id() {
    let dir = TempDir::new().unwrap();
    let mut s = store(&dir);
    let home = SnapshotStore::local_files_home(s.local_dir());
    s.index.at = "s1".to_string();
    fs::write(home.join("x"), b"after s1\n").unwrap();
    s.record_file("x").unwrap();

    fs::write(home.join("x"), b"after s2\n").unwrap();
    s.restore_version("x", Some("s1")).unwrap();
    assert_eq!(fs::read(home.join("x")).unwrap(), b"after s1\n");
  }

  #[test]
  fn up_to_date_never_treats_negative_revision_as_caught_up() {
    let remote = Urlish::parse("alice@example.com:cfg").unwrap();
    let mut idx = LocalIndex::fresh(remote);
    idx.revision = -1;
    assert!(!idx.up_to_date(0));
    idx.revision = 5;
    assert!(idx.up_to_date(5));
    assert!(!idx.up_to_date(6));
  }
}
