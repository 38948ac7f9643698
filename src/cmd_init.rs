use anyhow::Result;
use structopt::StructOpt;

use crate::{cli::GlobalOpts, urlish::Urlish};

/// Initialize an empty remote repository.
#[derive(Debug, StructOpt)]
pub struct InitCmd {
  #[structopt(flatten)]
  global: GlobalOpts,

  /// Remote locator, `[user@]host:path`.
  remote: String,
}

impl InitCmd {
  pub fn run(&self) -> Result<()> {
    let remote = Urlish::parse(&self.remote)?;
    let mut engine = self.global.open_engine(remote.clone())?;
    engine.init()?;
    println!("initialized {}", remote);
    Ok(())
  }
}
