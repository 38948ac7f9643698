//! C3: remote filesystem transport.
//!
//! The engine and repository log only ever see this trait, never `ssh2`
//! directly, so they can be exercised in tests against an in-memory fake.

use std::io::{Read, Write};

use anyhow::Result;

use crate::error::Error;

pub trait Transport {
  /// Change the session's working directory, used as the repo root.
  fn chdir(&mut self, path: &str) -> Result<()>;

  /// `true` if `path` (relative to the current directory) exists.
  fn exists(&mut self, path: &str) -> Result<bool>;

  fn mkdir(&mut self, path: &str) -> Result<()>;

  fn rmdir(&mut self, path: &str) -> Result<()>;

  /// Names of direct children of `path`, with no leading path component.
  fn listdir(&mut self, path: &str) -> Result<Vec<String>>;

  fn read_file(&mut self, path: &str) -> Result<Vec<u8>>;

  fn write_file(&mut self, path: &str, contents: &[u8]) -> Result<()>;
}

pub struct Ssh2Transport {
  sftp: ssh2::Sftp,
  cwd: String,
}

impl Ssh2Transport {
  /// Connect, authenticate via `authenticate`, and return a transport
  /// rooted at the session's home directory.
  pub fn connect(
    host: &str,
    port: u16,
    user: &str,
    authenticate: impl FnOnce(&mut ssh2::Session, &str) -> Result<()>,
  ) -> Result<Self> {
    log::debug!("connecting to {}:{}", host, port);
    let tcp = std::net::TcpStream::connect((host, port))
      .map_err(|e| Error::RemoteIo(format!("connect {}:{}: {}", host, port, e)))?;
    let mut sess = ssh2::Session::new().map_err(|e| Error::RemoteIo(e.to_string()))?;
    sess.set_tcp_stream(tcp);
    sess
      .handshake()
      .map_err(|e| Error::RemoteIo(format!("ssh handshake: {}", e)))?;

    authenticate(&mut sess, user)?;
    if !sess.authenticated() {
      return Err(Error::AuthFailed.into());
    }

    let sftp = sess.sftp().map_err(|e| Error::RemoteIo(e.to_string()))?;
    Ok(Self {
      sftp,
      cwd: String::new(),
    })
  }

  fn resolve(&self, path: &str) -> std::path::PathBuf {
    std::path::Path::new(&self.cwd).join(path)
  }
}

impl Transport for Ssh2Transport {
  fn chdir(&mut self, path: &str) -> Result<()> {
    self.cwd = path.to_string();
    Ok(())
  }

  fn exists(&mut self, path: &str) -> Result<bool> {
    log::debug!("stat {}", path);
    match self.sftp.stat(&self.resolve(path)) {
      Ok(_) => Ok(true),
      Err(e) if e.code() == ssh2::ErrorCode::SFTP(2) => Ok(false), // SSH_FX_NO_SUCH_FILE
      Err(e) => Err(Error::RemoteIo(e.to_string()).into()),
    }
  }

  fn mkdir(&mut self, path: &str) -> Result<()> {
    log::debug!("mkdir {}", path);
    self
      .sftp
      .mkdir(&self.resolve(path), 0o755)
      .map_err(|e| Error::RemoteIo(format!("mkdir {}: {}", path, e)).into())
  }

  fn rmdir(&mut self, path: &str) -> Result<()> {
    log::debug!("rmdir {}", path);
    self
      .sftp
      .rmdir(&self.resolve(path))
      .map_err(|e| Error::RemoteIo(format!("rmdir {}: {}", path, e)).into())
  }

  fn listdir(&mut self, path: &str) -> Result<Vec<String>> {
    log::debug!("listdir {}", path);
    let entries = self
      .sftp
      .readdir(&self.resolve(path))
      .map_err(|e| Error::RemoteIo(format!("listdir {}: {}", path, e)))?;
    Ok(
      entries
        .into_iter()
        .filter_map(|(p, _)| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect(),
    )
  }

  fn read_file(&mut self, path: &str) -> Result<Vec<u8>> {
    log::debug!("open {} for read", path);
    let mut f = self
      .sftp
      .open(&self.resolve(path))
      .map_err(|e| Error::RemoteIo(format!("open {}: {}", path, e)))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)
      .map_err(|e| Error::RemoteIo(format!("read {}: {}", path, e)))?;
    Ok(buf)
  }

  fn write_file(&mut self, path: &str, contents: &[u8]) -> Result<()> {
    log::debug!("open {} for write", path);
    let mut f = self
      .sftp
      .create(&self.resolve(path))
      .map_err(|e| Error::RemoteIo(format!("create {}: {}", path, e)))?;
    f.write_all(contents)
      .map_err(|e| Error::RemoteIo(format!("write {}: {}", path, e)))?;
    Ok(())
  }
}

/// In-memory fake of a remote filesystem, for exercising the lock manager,
/// repository log, and sync engine without a real SSH server.
#[cfg(test)]
pub mod tests {
  use super::*;
  use std::collections::BTreeMap;

  enum Node {
    Dir(BTreeMap<String, Node>),
    File(Vec<u8>),
  }

  pub struct MemoryTransport {
    root: Node,
    cwd: String,
  }

  impl MemoryTransport {
    pub fn new() -> Self {
      Self {
        root: Node::Dir(BTreeMap::new()),
        cwd: String::new(),
      }
    }

    fn segments(&self, path: &str) -> Vec<String> {
      self
        .cwd
        .split('/')
        .chain(path.split('/'))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
    }

    fn dir_mut(&mut self, segs: &[String]) -> Result<&mut BTreeMap<String, Node>> {
      let mut node = &mut self.root;
      for seg in segs {
        match node {
          Node::Dir(children) => {
            node = children
              .get_mut(seg)
              .ok_or_else(|| Error::RemoteIo(format!("no such directory: {}", seg)))?;
          }
          Node::File(_) => return Err(Error::RemoteIo("not a directory".into()).into()),
        }
      }
      match node {
        Node::Dir(children) => Ok(children),
        Node::File(_) => Err(Error::RemoteIo("not a directory".into()).into()),
      }
    }
  }

  impl Transport for MemoryTransport {
    fn chdir(&mut self, path: &str) -> Result<()> {
      self.cwd = path.to_string();
      Ok(())
    }

    fn exists(&mut self, path: &str) -> Result<bool> {
      let segs = self.segments(path);
      if segs.is_empty() {
        return Ok(true);
      }
      let (parent, name) = segs.split_at(segs.len() - 1);
      match self.dir_mut(parent) {
        Ok(children) => Ok(children.contains_key(&name[0])),
        Err(_) => Ok(false),
      }
    }

    fn mkdir(&mut self, path: &str) -> Result<()> {
      let segs = self.segments(path);
      let (parent, name) = segs.split_at(segs.len() - 1);
      let children = self.dir_mut(parent)?;
      if children.contains_key(&name[0]) {
        return Err(Error::RemoteIo(format!("{} already exists", path)).into());
      }
      children.insert(name[0].clone(), Node::Dir(BTreeMap::new()));
      Ok(())
    }

    fn rmdir(&mut self, path: &str) -> Result<()> {
      let segs = self.segments(path);
      let (parent, name) = segs.split_at(segs.len() - 1);
      let children = self.dir_mut(parent)?;
      match children.remove(&name[0]) {
        Some(Node::Dir(_)) => Ok(()),
        Some(other) => {
          children.insert(name[0].clone(), other);
          Err(Error::RemoteIo(format!("{} is not a directory", path)).into())
        }
        None => Err(Error::RemoteIo(format!("{} does not exist", path)).into()),
      }
    }

    fn listdir(&mut self, path: &str) -> Result<Vec<String>> {
      let segs = self.segments(path);
      let children = self.dir_mut(&segs)?;
      Ok(children.keys().cloned().collect())
    }

    fn read_file(&mut self, path: &str) -> Result<Vec<u8>> {
      let segs = self.segments(path);
      let (parent, name) = segs.split_at(segs.len() - 1);
      let children = self.dir_mut(parent)?;
      match children.get(&name[0]) {
        Some(Node::File(data)) => Ok(data.clone()),
        _ => Err(Error::RemoteIo(format!("{} does not exist", path)).into()),
      }
    }

    fn write_file(&mut self, path: &str, contents: &[u8]) -> Result<()> {
      let segs = self.segments(path);
      let (parent, name) = segs.split_at(segs.len() - 1);
      let children = self.dir_mut(parent)?;
      children.insert(name[0].clone(), Node::File(contents.to_vec()));
      Ok(())
    }
  }
}
