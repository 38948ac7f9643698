//! C8: subprocess runner. Scripts are opaque executables; no interpreter is
//! assumed and no sandboxing is attempted.

use std::path::Path;

use anyhow::Result;

#[cfg(unix)]
pub fn make_executable(path: &Path) -> Result<()> {
  use std::os::unix::fs::PermissionsExt;
  let mut perms = std::fs::metadata(path)?.permissions();
  perms.set_mode(0o755);
  std::fs::set_permissions(path, perms)?;
  Ok(())
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> Result<()> {
  Ok(())
}

/// Run `script_path` with `working_dir` as its current directory.
pub fn run(working_dir: &Path, script_path: &Path) -> Result<std::process::ExitStatus> {
  log::info!("running {}", script_path.display());
  let status = std::process::Command::new(script_path)
    .current_dir(working_dir)
    .status()?;
  log::info!("script {} exited with {}", script_path.display(), status);
  Ok(status)
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn executable_script_runs_and_touches_file() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("s.sh");
    std::fs::write(&script, "#!/bin/sh\necho -n hi > out\n").unwrap();
    make_executable(&script).unwrap();
    let status = run(dir.path(), &script).unwrap();
    assert!(status.success());
    assert_eq!(std::fs::read(dir.path().join("out")).unwrap(), b"hi");
  }

  #[test]
  fn nonzero_exit_is_reported() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("s.sh");
    std::fs::write(&script, "#!/bin/sh\nexit 3\n").unwrap();
    make_executable(&script).unwrap();
    let status = run(dir.path(), &script).unwrap();
    assert_eq!(status.code(), Some(3));
  }
}
