//! C8: authentication collaborator. Out of scope in depth — this negotiates
//! credentials against a live `ssh2::Session` in priority order: explicit
//! password, then the first available agent identity, then (unless
//! non-interactive) a password prompt.

use anyhow::Result;

use crate::error::Error;

pub struct AuthParams {
  pub password: Option<String>,
  pub interactive: bool,
}

impl AuthParams {
  pub fn new(password: Option<String>, interactive: bool) -> Self {
    Self {
      password,
      interactive,
    }
  }

  pub fn authenticate(&self, sess: &mut ssh2::Session, user: &str) -> Result<()> {
    if let Some(password) = &self.password {
      if sess.userauth_password(user, password).is_ok() {
        return Ok(());
      }
      log::warn!("password authentication failed, falling back");
    }

    if try_agent(sess, user) {
      return Ok(());
    }

    if self.interactive {
      let password = rpassword_prompt(&format!("Password for {}: ", user))?;
      sess
        .userauth_password(user, &password)
        .map_err(|_| Error::AuthFailed)?;
      return Ok(());
    }

    Err(Error::AuthFailed.into())
  }
}

fn try_agent(sess: &mut ssh2::Session, user: &str) -> bool {
  let mut agent = match sess.agent() {
    Ok(a) => a,
    Err(_) => return false,
  };
  if agent.connect().is_err() {
    return false;
  }
  if agent.list_identities().is_err() {
    return false;
  }
  for identity in agent.identities().into_iter().flatten() {
    if agent.userauth(user, &identity).is_ok() {
      return true;
    }
  }
  false
}

fn rpassword_prompt(prompt: &str) -> Result<String> {
  use std::io::Write;
  eprint!("{}", prompt);
  std::io::stderr().flush().ok();
  let mut line = String::new();
  std::io::stdin().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}
