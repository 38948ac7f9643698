mod auth;
mod cli;
mod cmd_add;
mod cmd_desync;
mod cmd_init;
mod cmd_rollback;
mod cmd_sync;
mod cmd_update;
mod engine;
mod error;
mod hash;
mod locks;
mod repo;
mod snapshot;
mod subprocess;
mod template;
mod transport;
mod urlish;

use anyhow::Result;
use cmd_add::AddCmd;
use cmd_desync::DesyncCmd;
use cmd_init::InitCmd;
use cmd_rollback::RollbackCmd;
use cmd_sync::SyncCmd;
use cmd_update::UpdateCmd;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Opt {
  #[structopt(subcommand)]
  subcommand: Subcmd,
}

#[derive(Debug, StructOpt)]
enum Subcmd {
  Init(InitCmd),
  Sync(SyncCmd),
  Desync(DesyncCmd),
  Rollback(RollbackCmd),
  Add(AddCmd),
  Update(UpdateCmd),
}

fn main() -> Result<()> {
  pretty_env_logger::init_timed();
  let opt = Opt::from_args();
  match &opt.subcommand {
    Subcmd::Init(cmd) => cmd.run(),
    Subcmd::Sync(cmd) => cmd.run(),
    Subcmd::Desync(cmd) => cmd.run(),
    Subcmd::Rollback(cmd) => cmd.run(),
    Subcmd::Add(cmd) => cmd.run(),
    Subcmd::Update(cmd) => cmd.run(),
  }
}
