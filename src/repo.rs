//! C5: typed view of the remote append-only doubly-linked script chain
//! plus its index.

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{
  error::Error,
  hash,
  locks::{ReadLockGuard, WriteLockGuard},
  transport::Transport,
  urlish::Urlish,
};

const INDEX_FILE: &str = "index.json";
const SCRIPTS_DIR: &str = "scripts";
const LOCKS_DIR: &str = "locks";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptEntry {
  pub name: String,
  pub files: Vec<String>,
  #[serde(default)]
  pub prev: String,
  #[serde(default)]
  pub next: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteIndex {
  pub version: u32,
  pub revision: u64,
  pub start: String,
  pub end: String,
  pub scripts: HashMap<String, ScriptEntry>,
}

impl RemoteIndex {
  fn empty() -> Self {
    Self {
      version: 1,
      revision: 0,
      start: String::new(),
      end: String::new(),
      scripts: HashMap::new(),
    }
  }
}

pub struct Repository<T: Transport> {
  transport: T,
  root: String,
  opened: bool,
  pub index: RemoteIndex,
}

impl<T: Transport> Repository<T> {
  pub fn new(transport: T, urlish: &Urlish) -> Self {
    Self {
      transport,
      root: urlish.path.clone(),
      opened: false,
      index: RemoteIndex::empty(),
    }
  }

  pub fn open(&mut self) -> Result<()> {
    if self.opened {
      return Ok(());
    }
    if !self.transport.exists(&self.root)? {
      self.transport.mkdir(&self.root)?;
    }
    self.transport.chdir(&self.root)?;
    self.opened = true;
    Ok(())
  }

  pub fn close(&mut self) {
    self.opened = false;
  }

  /// Initialize a fresh, empty repository. Idempotent only in the sense
  /// that it refuses to clobber an existing one.
  pub fn new_repo(&mut self) -> Result<()> {
    self.open()?;
    if self.transport.exists(INDEX_FILE)? {
      return Err(Error::AlreadyInitialized.into());
    }
    self.transport.mkdir(LOCKS_DIR)?;
    self.transport.mkdir(SCRIPTS_DIR)?;
    self.index = RemoteIndex::empty();
    self.write_index()?;
    Ok(())
  }

  /// Refresh the in-memory index from the remote under a read lock.
  pub fn update(&mut self) -> Result<()> {
    self.open()?;
    let mut _lock = ReadLockGuard::acquire(&mut self.transport)?;
    let bytes = _lock.transport().read_file(INDEX_FILE)?;
    self.index = serde_json::from_slice(&bytes)
      .map_err(|e| Error::IndexCorrupt(format!("index.json: {}", e)))?;
    Ok(())
  }

  pub fn get_script(&self, id: Option<&str>) -> Result<&ScriptEntry> {
    let id = id.unwrap_or(&self.index.start);
    self
      .index
      .scripts
      .get(id)
      .ok_or_else(|| Error::IndexCorrupt(format!("no such script: {}", id)).into())
  }

  pub fn download_script(&mut self, id: Option<&str>) -> Result<String> {
    let id = id.unwrap_or(&self.index.start).to_string();
    let mut _lock = ReadLockGuard::acquire(&mut self.transport)?;
    let bytes = _lock.transport().read_file(&format!("{}/{}.py", SCRIPTS_DIR, id))?;
    String::from_utf8(bytes).map_err(|e| Error::IndexCorrupt(format!("script body not utf-8: {}", e)).into())
  }

  pub fn get_revision(&self) -> u64 {
    self.index.revision
  }

  /// Append a new script to the tail of the chain under a write lock.
  /// The index is flushed first, then the script body, per the ordering
  /// invariant: readers must never follow `next` to a script whose body
  /// does not yet exist.
  pub fn append_script(&mut self, mut entry: ScriptEntry, contents: &str) -> Result<String> {
    let id = hash::script_id(contents);
    if self.index.scripts.contains_key(&id) {
      return Err(Error::AlreadyPresent(id).into());
    }

    let mut _lock = WriteLockGuard::acquire(&mut self.transport)?;
    entry.prev = self.index.end.clone();
    entry.next = String::new();
    self.index.revision += 1;
    if !self.index.end.is_empty() {
      if let Some(tail) = self.index.scripts.get_mut(&self.index.end) {
        tail.next = id.clone();
      }
    }
    self.index.end = id.clone();
    if self.index.start.is_empty() {
      self.index.start = id.clone();
    }
    self.index.scripts.insert(id.clone(), entry);

    Self::write_index_locked(&self.index, _lock.transport())?;
    _lock
      .transport()
      .write_file(&format!("{}/{}.py", SCRIPTS_DIR, id), contents.as_bytes())?;
    log::info!("appended script {}", id);
    Ok(id)
  }

  /// ScriptIds in chain order starting from `start` (or `from`), following
  /// `next`, bounded defensively by the declared script count so a
  /// malformed cyclic chain cannot hang iteration.
  pub fn iterate_from(&self, from: Option<&str>) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = from.unwrap_or(&self.index.start).to_string();
    let bound = self.index.scripts.len() + 1;
    for _ in 0..bound {
      if cur.is_empty() {
        break;
      }
      out.push(cur.clone());
      cur = match self.index.scripts.get(&cur) {
        Some(e) => e.next.clone(),
        None => break,
      };
    }
    out
  }

  fn write_index(&mut self) -> Result<()> {
    let mut _lock = WriteLockGuard::acquire(&mut self.transport)?;
    Self::write_index_locked(&self.index, _lock.transport())
  }

  fn write_index_locked(index: &RemoteIndex, transport: &mut T) -> Result<()> {
    let bytes = serde_json::to_vec(index)?;
    transport.write_file(INDEX_FILE, &bytes)
  }
}
