use anyhow::Result;
use structopt::StructOpt;

use crate::cli::GlobalOpts;

/// Restore every tracked file to its pre-sync content and clear local state.
#[derive(Debug, StructOpt)]
pub struct DesyncCmd {
  #[structopt(flatten)]
  global: GlobalOpts,
}

impl DesyncCmd {
  pub fn run(&self) -> Result<()> {
    let mut engine = self.global.open_current_engine()?;
    engine.desync()?;
    println!("desynced from {}", engine.remote());
    Ok(())
  }
}
