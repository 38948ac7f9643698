use std::fs;

use anyhow::Result;
use structopt::StructOpt;

use crate::{cli::GlobalOpts, snapshot::SnapshotStore, template};

/// Auto-generate a create-or-update script from the current contents of
/// the given files and append it.
#[derive(Debug, StructOpt)]
pub struct UpdateCmd {
  #[structopt(flatten)]
  global: GlobalOpts,

  /// Filenames (repo-relative, resolved against the local home directory).
  files: Vec<String>,

  /// Human-readable name for the generated script.
  #[structopt(short = "n", long)]
  name: Option<String>,
}

impl UpdateCmd {
  pub fn run(&self) -> Result<()> {
    let mut engine = self.global.open_current_engine()?;
    let local_dir = self.global.local_dir();
    let home = SnapshotStore::local_files_home(&local_dir);

    let mut script = String::from("#!/bin/sh\nset -e\n");
    for f in &self.files {
      let contents = fs::read(home.join(f))?;
      let creating = !engine.is_tracked(f);
      script.push_str(&template::build_step(f, &contents, creating));
    }

    let name = self
      .name
      .clone()
      .unwrap_or_else(|| format!("update {}", self.files.join(", ")));
    let id = engine.append(&script, &name, self.files.clone(), false)?;
    println!("appended {}", id);
    Ok(())
  }
}
