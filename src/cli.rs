//! C8: CLI-wide options shared by every subcommand, and the `Context` they
//! resolve into (auth parameters, local state directory, connected engine).

use std::path::PathBuf;

use anyhow::Result;
use structopt::StructOpt;

use crate::{
  auth::AuthParams, engine::Engine, error::Error, snapshot::SnapshotStore, transport::Ssh2Transport,
  urlish::Urlish,
};

#[derive(Debug, StructOpt)]
pub struct GlobalOpts {
  /// Username to authenticate as. Defaults to the OS login.
  #[structopt(short = "u", long)]
  pub username: Option<String>,

  /// Password for authentication.
  #[structopt(short = "p", long)]
  pub password: Option<String>,

  /// Allow an interactive password prompt when agent auth fails.
  #[structopt(long, conflicts_with = "no-interactive")]
  pub interactive: bool,

  /// Never prompt; fail instead.
  #[structopt(long = "no-interactive")]
  pub no_interactive: bool,

  /// Local state directory (default: user home directory).
  #[structopt(long)]
  pub local: Option<PathBuf>,
}

impl GlobalOpts {
  pub fn local_dir(&self) -> PathBuf {
    match &self.local {
      Some(p) => p.clone(),
      None => dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".confchain"),
    }
  }

  pub fn auth(&self) -> AuthParams {
    AuthParams::new(self.password.clone(), !self.no_interactive)
  }

  /// Build an `Engine<Ssh2Transport>` for `remote`, connecting lazily via
  /// SSH each time the engine needs a fresh transport (initial open, and
  /// again on a remote switch).
  pub fn open_engine(&self, remote: Urlish) -> Result<Engine<Ssh2Transport>> {
    let local_dir = self.local_dir();
    let username = self.username.clone();
    let auth = self.auth();
    Engine::open(&local_dir, remote, move |u| {
      let user = username.clone().unwrap_or_else(|| u.user.clone());
      let auth = AuthParams::new(auth.password.clone(), auth.interactive);
      Ssh2Transport::connect(&u.host, 22, &user, move |sess, who| auth.authenticate(sess, who))
    })
  }

  /// Open an engine against whatever remote the `current` pointer names.
  /// Used by commands (`desync`, `rollback`, `add`, `update`) that operate
  /// on the already-synced remote rather than taking one as an argument.
  pub fn open_current_engine(&self) -> Result<Engine<Ssh2Transport>> {
    let local_dir = self.local_dir();
    let remote_id = SnapshotStore::read_current(&local_dir)?.ok_or(Error::NotInitialized)?;
    let remote = SnapshotStore::read_stored_remote(&local_dir, &remote_id)?;
    self.open_engine(remote)
  }
}
