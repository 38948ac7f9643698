//! Parses `[user@]host:path` remote locators.
//!
//! These are deliberately not URLs: there is no scheme, and `path` is an
//! opaque remote filesystem path, not URL-encoded.

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Urlish {
  pub user: String,
  pub host: String,
  pub path: String,
}

impl Urlish {
  pub fn parse(s: &str) -> anyhow::Result<Self> {
    let colon = s
      .find(':')
      .ok_or_else(|| Error::BadUrlish(s.to_string(), "missing ':'"))?;

    let (user, host) = match s[..colon].find('@') {
      Some(at) => (s[..at].to_string(), s[at + 1..colon].to_string()),
      None => (current_user(), s[..colon].to_string()),
    };

    let path = s[colon + 1..]
      .trim_end()
      .trim_end_matches('/')
      .to_string();

    if host.is_empty() {
      return Err(Error::BadUrlish(s.to_string(), "empty host").into());
    }

    Ok(Self { user, host, path })
  }
}

impl std::fmt::Display for Urlish {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}@{}:{}", self.user, self.host, self.path)
  }
}

fn current_user() -> String {
  std::env::var("USER")
    .or_else(|_| std::env::var("USERNAME"))
    .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_user_host_path() {
    let u = Urlish::parse("alice@example.com:cfg/mine").unwrap();
    assert_eq!(u.user, "alice");
    assert_eq!(u.host, "example.com");
    assert_eq!(u.path, "cfg/mine");
  }

  #[test]
  fn defaults_user_to_login() {
    let u = Urlish::parse("example.com:cfg/mine").unwrap();
    assert_eq!(u.host, "example.com");
    assert_eq!(u.path, "cfg/mine");
  }

  #[test]
  fn strips_trailing_slashes_and_whitespace() {
    let u = Urlish::parse("example.com:cfg/mine/// ").unwrap();
    assert_eq!(u.path, "cfg/mine");
  }

  #[test]
  fn rejects_empty_host() {
    assert!(Urlish::parse(":cfg/mine").is_err());
  }

  #[test]
  fn rejects_missing_colon() {
    assert!(Urlish::parse("example.com").is_err());
  }

  #[test]
  fn user_split_only_considers_at_before_first_colon() {
    // an '@' appearing after the first ':' belongs to the path, not the user.
    let u = Urlish::parse("example.com:cfg/some@thing").unwrap();
    assert_eq!(u.user, current_user());
    assert_eq!(u.path, "cfg/some@thing");
  }
}
