use std::{fs, path::PathBuf};

use anyhow::Result;
use structopt::StructOpt;

use crate::cli::GlobalOpts;

/// Append a user-supplied script to the remote chain.
#[derive(Debug, StructOpt)]
pub struct AddCmd {
  #[structopt(flatten)]
  global: GlobalOpts,

  /// Path to the script file to upload.
  script: PathBuf,

  /// Filenames (repo-relative) this script declares it touches.
  files: Vec<String>,

  /// Run `sync` immediately after appending.
  #[structopt(long)]
  apply: bool,

  /// Human-readable name for the script; defaults to its filename.
  #[structopt(short = "n", long)]
  name: Option<String>,
}

impl AddCmd {
  pub fn run(&self) -> Result<()> {
    let text = fs::read_to_string(&self.script)?;
    let name = self.name.clone().unwrap_or_else(|| {
      self
        .script
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "script".to_string())
    });

    let mut engine = self.global.open_current_engine()?;
    let id = engine.append(&text, &name, self.files.clone(), self.apply)?;
    println!("appended {}", id);
    if self.apply {
      println!("synced to {}", engine.remote());
    }
    Ok(())
  }
}
