//! Stable content/identity hashes: RemoteId, ScriptId, FileVersionId.
//!
//! A single fixed digest (SHA-512, hex-encoded) is used everywhere. All
//! inputs are UTF-8 byte strings, fed to the digest in a fixed order per
//! identifier kind.

use sha2::{Digest, Sha512};

/// `hash(host || path)`, both right-trimmed of trailing whitespace and
/// slashes. Identifies a remote independent of its current content.
pub fn remote_id(host: &str, path: &str) -> String {
  let host = host.trim_end();
  let path = path.trim_end().trim_end_matches('/');
  let mut h = Sha512::new();
  h.update(host.as_bytes());
  h.update(path.as_bytes());
  hex::encode(h.finalize())
}

/// `hash(script contents)`. Identity of a script entry in the chain.
pub fn script_id(contents: &str) -> String {
  let mut h = Sha512::new();
  h.update(contents.as_bytes());
  hex::encode(h.finalize())
}

/// `hash(RemoteId || filename || ScriptId)`. Identity of one file's
/// snapshot at one point in the chain, scoped to a remote.
///
/// `script_id` is `""` for the pre-sync ("original") state.
pub fn file_version_id(remote_id: &str, filename: &str, script_id: &str) -> String {
  let mut h = Sha512::new();
  h.update(remote_id.as_bytes());
  h.update(filename.as_bytes());
  h.update(script_id.as_bytes());
  hex::encode(h.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn remote_id_ignores_trailing_slashes_and_whitespace() {
    assert_eq!(
      remote_id("example.com", "cfg/mine"),
      remote_id("example.com  ", "cfg/mine///")
    );
  }

  #[test]
  fn remote_id_distinguishes_host_and_path() {
    assert_ne!(
      remote_id("example.com", "cfg/mine"),
      remote_id("example.org", "cfg/mine")
    );
  }

  #[test]
  fn file_version_id_is_deterministic() {
    let a = file_version_id("r1", "x", "s1");
    let b = file_version_id("r1", "x", "s1");
    assert_eq!(a, b);
  }

  #[test]
  fn file_version_id_distinguishes_position() {
    let a = file_version_id("r1", "x", "s1");
    let b = file_version_id("r1", "x", "s2");
    let c = file_version_id("r1", "y", "s1");
    assert_ne!(a, b);
    assert_ne!(a, c);
  }

  #[test]
  fn script_id_matches_python_sha512_of_utf8_contents() {
    // sha512 hex digest of the literal bytes "hello\n"
    let got = script_id("hello\n");
    assert_eq!(got.len(), 128);
  }
}
