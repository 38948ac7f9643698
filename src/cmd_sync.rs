use anyhow::Result;
use structopt::StructOpt;

use crate::{cli::GlobalOpts, engine::UNBOUNDED, error::Error, snapshot::SnapshotStore, urlish::Urlish};

/// Advance local state by replaying new scripts from the remote.
#[derive(Debug, StructOpt)]
pub struct SyncCmd {
  #[structopt(flatten)]
  global: GlobalOpts,

  /// Switch to this remote before syncing; requires a prior `desync`.
  remote: Option<String>,

  /// Disable the fast-forward optimization.
  #[structopt(long = "no-ff")]
  no_ff: bool,

  /// Maximum scripts to apply this run (-1 for unbounded).
  #[structopt(short = "c", long = "count", default_value = "-1")]
  count: i64,
}

impl SyncCmd {
  pub fn run(&self) -> Result<()> {
    let local_dir = self.global.local_dir();
    let current_remote_id = SnapshotStore::read_current(&local_dir)?;

    let (opened_against, override_remote) = match (&self.remote, current_remote_id) {
      (Some(r), Some(id)) => (
        SnapshotStore::read_stored_remote(&local_dir, &id)?,
        Some(Urlish::parse(r)?),
      ),
      (Some(r), None) => (Urlish::parse(r)?, None),
      (None, Some(id)) => (SnapshotStore::read_stored_remote(&local_dir, &id)?, None),
      (None, None) => return Err(Error::NotInitialized.into()),
    };

    let mut engine = self.global.open_engine(opened_against)?;
    match engine.sync(!self.no_ff, override_remote.as_ref(), self.count_or_unbounded()) {
      Ok(()) => {
        println!("synced to {}", engine.remote());
        Ok(())
      }
      Err(e) => {
        if let Some(Error::ScriptFailed) = e.downcast_ref::<Error>() {
          println!("err: one of the scripts failed.");
        }
        Err(e)
      }
    }
  }

  fn count_or_unbounded(&self) -> i64 {
    if self.count < 0 {
      UNBOUNDED
    } else {
      self.count
    }
  }
}
