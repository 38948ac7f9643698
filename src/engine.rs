//! C7: the sync engine. Ties the repository log (C5), the lock manager
//! (C4, via C5), and the snapshot store (C6) into the `sync`/`rollback`/
//! `desync`/`append` state machine.

use std::{fs, path::Path};

use anyhow::Result;

use crate::{
  error::Error,
  hash,
  repo::{Repository, ScriptEntry},
  snapshot::SnapshotStore,
  subprocess,
  transport::Transport,
  urlish::Urlish,
};

/// `sync`'s step loop runs until caught up unless bounded.
pub const UNBOUNDED: i64 = -1;

pub struct Engine<T: Transport> {
  connect: Box<dyn FnMut(&Urlish) -> Result<T>>,
  remote: Urlish,
  repo: Repository<T>,
  store: SnapshotStore,
}

impl<T: Transport> Engine<T> {
  pub fn open(
    local_dir: &Path,
    remote: Urlish,
    mut connect: impl FnMut(&Urlish) -> Result<T> + 'static,
  ) -> Result<Self> {
    let remote_id = hash::remote_id(&remote.host, &remote.path);
    let store = SnapshotStore::open(local_dir, &remote_id, &remote)?;
    let transport = connect(&remote)?;
    let repo = Repository::new(transport, &remote);
    Ok(Self {
      connect: Box::new(connect),
      remote,
      repo,
      store,
    })
  }

  pub fn init(&mut self) -> Result<()> {
    self.repo.new_repo()
  }

  pub fn at(&self) -> &str {
    &self.store.index.at
  }

  pub fn remote(&self) -> &Urlish {
    &self.remote
  }

  /// See the distilled state-machine description: remote switch, refresh,
  /// empty-remote shortcut, fast-forward attempt, then the per-script step
  /// loop, finishing with the `current` pointer rewrite.
  pub fn sync(
    &mut self,
    mut fastforward: bool,
    remote_override: Option<&Urlish>,
    max_iterations: i64,
  ) -> Result<()> {
    if let Some(ov) = remote_override {
      let new_remote_id = hash::remote_id(&ov.host, &ov.path);
      if new_remote_id != self.store.remote_id {
        if !self.store.index.at.is_empty() {
          return Err(Error::DesyncFirst(self.store.remote_id.clone()).into());
        }
        self.repo.close();
        let local_dir = self.store.local_dir().to_path_buf();
        let new_store = SnapshotStore::open(&local_dir, &new_remote_id, ov)?;
        let new_transport = (self.connect)(ov)?;
        self.repo = Repository::new(new_transport, ov);
        self.store = new_store;
        self.remote = ov.clone();
        fastforward = false;
      }
    }

    self.repo.update()?;
    if self.store.index.up_to_date(self.repo.get_revision()) {
      return Ok(());
    }

    if self.repo.index.end.is_empty() {
      self.store.write_current()?;
      self.store.persist()?;
      return Ok(());
    }

    if fastforward {
      let tail_id = self.repo.index.end.clone();
      let tail = self.repo.get_script(Some(&tail_id))?.clone();
      let can_fast_forward = tail.files.iter().all(|f| {
        self
          .store
          .index
          .files
          .get(f)
          .map_or(false, |e| e.chain.contains_key(&tail_id))
      });
      if can_fast_forward {
        for f in &tail.files {
          self.store.restore_version(f, Some(&tail_id))?;
        }
        log::info!("fastforwarding to {}", tail_id);
        self.store.index.at = tail_id;
        self.store.index.revision = self.repo.get_revision() as i64;
        self.store.write_current()?;
        self.store.persist()?;
        return Ok(());
      }
    }

    let mut iterations: i64 = 0;
    loop {
      if max_iterations >= 0 && iterations >= max_iterations {
        break;
      }

      let next_id = if self.store.index.at.is_empty() {
        self.repo.index.start.clone()
      } else {
        self.repo.get_script(Some(&self.store.index.at))?.next.clone()
      };
      if next_id.is_empty() {
        break;
      }

      let entry = self.repo.get_script(Some(&next_id))?.clone();
      for f in &entry.files {
        let needs_original = match self.store.index.files.get(f) {
          None => true,
          Some(e) => e.newin == next_id,
        };
        if needs_original {
          self.store.record_original(f, &next_id)?;
        }
      }

      let body = self.repo.download_script(Some(&next_id))?;
      let script_path = self.store.script_scratch_path();
      fs::write(&script_path, body)?;
      subprocess::make_executable(&script_path)?;

      let home = SnapshotStore::local_files_home(self.store.local_dir());
      log::info!("running {}", entry.name);
      let status = subprocess::run(&home, &script_path)?;

      if !status.success() {
        self.store.index.at = next_id.clone();
        self.store.persist()?;
        log::warn!("script {} failed, rolling back one step", next_id);
        self.rollback(1)?;
        return Err(Error::ScriptFailed.into());
      }

      for f in &entry.files {
        self.store.record_file(f)?;
      }
      self.store.index.at = next_id.clone();
      self.store.persist()?;
      iterations += 1;

      if self.store.index.at == self.repo.index.end {
        break;
      }
    }

    self.store.index.revision = self.repo.get_revision() as i64;
    self.store.write_current()?;
    self.store.persist()?;
    log::info!("synced to {}", self.remote);
    Ok(())
  }

  pub fn rollback(&mut self, count: u32) -> Result<()> {
    self.repo.update()?;

    let mut target = self.store.index.at.clone();
    for _ in 0..count {
      if target.is_empty() {
        return self.desync();
      }
      target = self.repo.get_script(Some(&target))?.prev.clone();
    }
    if target.is_empty() {
      return self.desync();
    }

    let filenames: Vec<String> = self.store.index.files.keys().cloned().collect();
    for f in &filenames {
      self.store.restore_version(f, Some(&target))?;
    }
    self.store.index.at = target;
    self.store.index.revision = -1;
    self.store.persist()?;
    log::info!("rolled back to {}", self.store.index.at);
    Ok(())
  }

  pub fn desync(&mut self) -> Result<()> {
    let filenames: Vec<String> = self.store.index.files.keys().cloned().collect();
    for f in &filenames {
      self.store.restore_version(f, None)?;
    }
    self.store.index.at = String::new();
    self.store.index.revision = -1;
    self.store.persist()?;
    log::info!("desynced");
    Ok(())
  }

  pub fn append(
    &mut self,
    script_text: &str,
    name: &str,
    files: Vec<String>,
    run_now: bool,
  ) -> Result<String> {
    let entry = ScriptEntry {
      name: name.to_string(),
      files,
      prev: String::new(),
      next: String::new(),
    };
    self.repo.update()?;
    let id = self.repo.append_script(entry, script_text)?;
    if run_now {
      self.sync(true, None, UNBOUNDED)?;
    }
    Ok(id)
  }

  pub fn is_tracked(&self, filename: &str) -> bool {
    self.store.index.files.contains_key(filename)
  }
}
