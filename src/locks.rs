//! C4: remote read/write locks via directory presence under `locks/`.
//!
//! Acquisition is immediate success or immediate `Busy` — locks never
//! block. Guards release on drop so every exit path (including error
//! propagation with `?`) releases the lock.

use anyhow::Result;

use crate::{error::Error, transport::Transport};

const LOCKS_DIR: &str = "locks";
const WRITE_LOCK: &str = "write_lock";
const READ_LOCK_PREFIX: &str = "read_lock_";
/// Bound on retries when two readers race for the same slot index.
const READ_LOCK_RETRY_BOUND: usize = 8;

pub struct ReadLockGuard<'t, T: Transport + ?Sized> {
  transport: &'t mut T,
  dir: String,
}

impl<'t, T: Transport + ?Sized> ReadLockGuard<'t, T> {
  /// Reborrow of the transport held by this guard, for issuing I/O while
  /// the lock is held without re-borrowing through the owner.
  pub fn transport(&mut self) -> &mut T {
    self.transport
  }

  pub fn acquire(transport: &'t mut T) -> Result<Self> {
    for _ in 0..READ_LOCK_RETRY_BOUND {
      let entries = listdir(transport)?;
      if entries.iter().any(|e| e == WRITE_LOCK) {
        log::warn!("read lock busy: write lock held");
        return Err(Error::Busy.into());
      }
      let mut n = 0usize;
      loop {
        let candidate = format!("{}{}", READ_LOCK_PREFIX, n);
        if !entries.iter().any(|e| e == &candidate) {
          let dir = format!("{}/{}", LOCKS_DIR, candidate);
          match transport.mkdir(&dir) {
            Ok(()) => {
              log::info!("acquired read lock {}", candidate);
              return Ok(Self { transport, dir });
            }
            Err(_) => break, // raced with another reader on this slot; retry
          }
        }
        n += 1;
      }
    }
    log::warn!("read lock busy: exhausted {} slot retries", READ_LOCK_RETRY_BOUND);
    Err(Error::Busy.into())
  }
}

impl<'t, T: Transport + ?Sized> Drop for ReadLockGuard<'t, T> {
  fn drop(&mut self) {
    if let Err(e) = self.transport.rmdir(&self.dir) {
      log::error!("failed to release read lock {}: {}", self.dir, e);
    } else {
      log::info!("released read lock {}", self.dir);
    }
  }
}

pub struct WriteLockGuard<'t, T: Transport + ?Sized> {
  transport: &'t mut T,
}

impl<'t, T: Transport + ?Sized> WriteLockGuard<'t, T> {
  /// Reborrow of the transport held by this guard, for issuing I/O while
  /// the lock is held without re-borrowing through the owner.
  pub fn transport(&mut self) -> &mut T {
    self.transport
  }

  pub fn acquire(transport: &'t mut T) -> Result<Self> {
    let entries = listdir(transport)?;
    if !entries.is_empty() {
      log::warn!("write lock busy: {} entries present under locks/", entries.len());
      return Err(Error::Busy.into());
    }
    let dir = format!("{}/{}", LOCKS_DIR, WRITE_LOCK);
    transport.mkdir(&dir).map_err(|_| {
      log::warn!("write lock busy: lost the mkdir race");
      Error::Busy
    })?;
    log::info!("acquired write lock");
    Ok(Self { transport })
  }
}

impl<'t, T: Transport + ?Sized> Drop for WriteLockGuard<'t, T> {
  fn drop(&mut self) {
    let dir = format!("{}/{}", LOCKS_DIR, WRITE_LOCK);
    if let Err(e) = self.transport.rmdir(&dir) {
      log::error!("failed to release write lock: {}", e);
    } else {
      log::info!("released write lock");
    }
  }
}

fn listdir<T: Transport + ?Sized>(transport: &mut T) -> Result<Vec<String>> {
  transport.listdir(LOCKS_DIR)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transport::tests::MemoryTransport;

  #[test]
  fn write_lock_excludes_everything() {
    let mut t = MemoryTransport::new();
    t.mkdir(LOCKS_DIR).unwrap();
    let guard = WriteLockGuard::acquire(&mut t).unwrap();
    drop(guard);
    assert!(t.listdir(LOCKS_DIR).unwrap().is_empty());
  }

  #[test]
  fn write_lock_fails_when_read_lock_present() {
    let mut t = MemoryTransport::new();
    t.mkdir(LOCKS_DIR).unwrap();
    let _r = ReadLockGuard::acquire(&mut t).unwrap();
    assert!(WriteLockGuard::acquire(&mut t).is_err());
  }

  #[test]
  fn read_lock_fails_when_write_lock_present() {
    let mut t = MemoryTransport::new();
    t.mkdir(LOCKS_DIR).unwrap();
    let _w = WriteLockGuard::acquire(&mut t).unwrap();
    assert!(ReadLockGuard::acquire(&mut t).is_err());
  }

  #[test]
  fn read_locks_stack_with_increasing_indices() {
    let mut t = MemoryTransport::new();
    t.mkdir(LOCKS_DIR).unwrap();
    let r0 = ReadLockGuard::acquire(&mut t).unwrap();
    assert_eq!(r0.dir, "locks/read_lock_0");
    let r1 = ReadLockGuard::acquire(&mut t).unwrap();
    assert_eq!(r1.dir, "locks/read_lock_1");
    drop(r0);
    let r0_again = ReadLockGuard::acquire(&mut t).unwrap();
    assert_eq!(r0_again.dir, "locks/read_lock_0");
  }
}
