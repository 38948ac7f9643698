//! C8: script template generator for the `update` command. Deliberately the
//! simplest generator that satisfies the command surface: no diffing, the
//! file's current bytes are inlined base64 into a heredoc.

use std::path::Path;

const MARKER: &str = "CONFCHAIN_EOF";

/// One file's write step, without the script header. Used standalone by
/// `build`, or concatenated by callers generating one script for several
/// files.
pub fn build_step(filename: &str, contents: &[u8], creating: bool) -> String {
  let encoded = base64::encode(contents);
  let mut step = String::new();
  if creating {
    if let Some(parent) = Path::new(filename).parent() {
      if !parent.as_os_str().is_empty() {
        step.push_str(&format!("mkdir -p '{}'\n", parent.display()));
      }
    }
  }
  step.push_str(&format!(
    "base64 -d > '{}' <<'{}'\n{}\n{}\n",
    filename, MARKER, encoded, MARKER
  ));
  step
}

/// A complete single-file create-or-update script.
pub fn build(filename: &str, contents: &[u8], creating: bool) -> String {
  format!("#!/bin/sh\nset -e\n{}", build_step(filename, contents, creating))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn create_script_makes_parent_dir() {
    let s = build("sub/dir/x", b"hi", true);
    assert!(s.starts_with("#!/bin/sh\n"));
    assert!(s.contains("mkdir -p 'sub/dir'"));
    assert!(s.contains("base64 -d > 'sub/dir/x'"));
  }

  #[test]
  fn update_script_skips_mkdir() {
    let s = build("x", b"hi", false);
    assert!(!s.contains("mkdir"));
  }

  #[test]
  fn top_level_file_has_no_mkdir() {
    let s = build("x", b"hi", true);
    assert!(!s.contains("mkdir"));
  }

  #[test]
  fn steps_concatenate_under_one_header() {
    let script = format!(
      "#!/bin/sh\nset -e\n{}{}",
      build_step("a", b"1", true),
      build_step("b", b"2", false)
    );
    assert_eq!(script.matches("#!/bin/sh").count(), 1);
  }
}
