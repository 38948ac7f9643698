//! Centralized error taxonomy. Every collaborator in the crate surfaces
//! failures through this enum, wrapped in `anyhow::Error` at the call site.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
  #[error("repo is locked; try again later")]
  Busy,

  #[error("could not authenticate with any of the configured methods")]
  AuthFailed,

  #[error("remote i/o error: {0}")]
  RemoteIo(String),

  #[error("no local index for this remote; run `sync` first")]
  NotInitialized,

  #[error("already initialized; manually delete the remote folder to re-init")]
  AlreadyInitialized,

  #[error("repo is synced to {0}; desync before switching remotes")]
  DesyncFirst(String),

  #[error("one of the scripts failed")]
  ScriptFailed,

  #[error("no such file tracked: {0}")]
  MissingFile(String),

  #[error("bad urlish {0:?}: {1}")]
  BadUrlish(String, &'static str),

  #[error("index corrupt: {0}")]
  IndexCorrupt(String),

  #[error("script with identical contents already present in chain: {0}")]
  AlreadyPresent(String),
}
