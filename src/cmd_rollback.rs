use anyhow::Result;
use structopt::StructOpt;

use crate::cli::GlobalOpts;

/// Step local state backward, restoring snapshots as it goes.
#[derive(Debug, StructOpt)]
pub struct RollbackCmd {
  #[structopt(flatten)]
  global: GlobalOpts,

  /// Number of scripts to roll back.
  #[structopt(default_value = "1")]
  times: u32,
}

impl RollbackCmd {
  pub fn run(&self) -> Result<()> {
    let mut engine = self.global.open_current_engine()?;
    engine.rollback(self.times)?;
    if engine.at().is_empty() {
      println!("rolled back to pristine state");
    } else {
      println!("rolled back to {}", engine.at());
    }
    Ok(())
  }
}
