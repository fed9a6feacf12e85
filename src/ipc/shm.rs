use std::io;
use std::ptr;
use tracing::debug;
use tracing::warn;

use crate::consts;
use crate::error::Exception;
use crate::proc::Owner;

/// Size of the little-endian payload length stored at the segment start.
const HEADER: usize = size_of::<u64>();

/// System V shared-memory transport.
///
/// Only the key is reserved before the fork. The child creates the segment
/// exclusively, sized to fit its payload, and the parent removes it after
/// reading.
#[derive(Debug)]
pub(crate) struct ShmIpc {
  owner: Owner,
  key: libc::key_t,
  live: bool,
}

impl ShmIpc {
  pub(crate) fn create() -> Result<Self, Exception> {
    for _ in 0..consts::IPC_SHM_KEY_ATTEMPTS {
      let key: libc::key_t = (rand::random::<u32>() & consts::IPC_SHM_KEY_MASK) as libc::key_t;

      if key == libc::IPC_PRIVATE || segment(key).is_ok() {
        continue;
      }

      debug!(target: "splinter", key, "ipc shm key reserved");

      return Ok(Self {
        owner: Owner::current(),
        key,
        live: true,
      });
    }

    Err(Exception::setup("failed to find an unused shared memory key"))
  }

  pub(crate) fn put(&mut self, payload: &[u8]) -> Result<(), Exception> {
    let size: usize = HEADER + payload.len();
    let flags: libc::c_int = libc::IPC_CREAT | libc::IPC_EXCL | 0o600;

    // SAFETY: `shmget` has no memory-safety preconditions.
    let id: libc::c_int = unsafe { libc::shmget(self.key, size, flags) };

    if id == -1 {
      return Err(error("failed to create shared memory segment"));
    }

    let addr: *mut u8 = attach(id, 0)?;
    let header: [u8; HEADER] = (payload.len() as u64).to_le_bytes();

    // SAFETY: The segment was created with room for the header and payload.
    unsafe {
      ptr::copy_nonoverlapping(header.as_ptr(), addr, HEADER);
      ptr::copy_nonoverlapping(payload.as_ptr(), addr.add(HEADER), payload.len());
    }

    detach(addr)
  }

  pub(crate) fn pop(&mut self) -> Result<Vec<u8>, Exception> {
    if !self.live {
      return Err(Exception::sysinv("IPC segment already consumed"));
    }

    self.live = false;

    let id: libc::c_int = match segment(self.key) {
      Ok(id) => id,
      Err(error) if error.raw_os_error() == Some(libc::ENOENT) => return Ok(Vec::new()),
      Err(error) => {
        return Err(Exception::transport(format_args!(
          "failed to open shared memory segment: {error}"
        )));
      }
    };

    let payload: Result<Vec<u8>, Exception> = read(id);

    remove(id);

    payload
  }

  pub(crate) fn cleanup(&mut self) {
    if !self.live || !self.owner.is_current() {
      return;
    }

    self.live = false;

    if let Ok(id) = segment(self.key) {
      remove(id);
    }
  }
}

impl Drop for ShmIpc {
  fn drop(&mut self) {
    self.cleanup();
  }
}

// -----------------------------------------------------------------------------
// Segment Helpers
// -----------------------------------------------------------------------------

fn segment(key: libc::key_t) -> io::Result<libc::c_int> {
  // SAFETY: `shmget` has no memory-safety preconditions.
  match unsafe { libc::shmget(key, 0, 0) } {
    -1 => Err(io::Error::last_os_error()),
    id => Ok(id),
  }
}

fn read(id: libc::c_int) -> Result<Vec<u8>, Exception> {
  // SAFETY: An all-zero `shmid_ds` is a valid output buffer.
  let mut stat: libc::shmid_ds = unsafe { std::mem::zeroed() };

  // SAFETY: `stat` is a valid, writable `shmid_ds`.
  if unsafe { libc::shmctl(id, libc::IPC_STAT, &mut stat) } == -1 {
    return Err(error("failed to stat shared memory segment"));
  }

  let capacity: usize = stat.shm_segsz as usize;

  if capacity < HEADER {
    return Err(Exception::transport("truncated shared memory segment"));
  }

  let addr: *mut u8 = attach(id, libc::SHM_RDONLY)?;
  let mut header: [u8; HEADER] = [0; HEADER];

  // SAFETY: The segment is at least `HEADER` bytes long.
  unsafe { ptr::copy_nonoverlapping(addr, header.as_mut_ptr(), HEADER) };

  let length: usize = u64::from_le_bytes(header) as usize;

  if length > capacity - HEADER {
    detach(addr)?;
    return Err(Exception::transport("shared memory payload exceeds segment"));
  }

  let mut payload: Vec<u8> = vec![0; length];

  // SAFETY: `length` bytes follow the header within the segment.
  unsafe { ptr::copy_nonoverlapping(addr.add(HEADER), payload.as_mut_ptr(), length) };

  detach(addr)?;

  Ok(payload)
}

fn attach(id: libc::c_int, flags: libc::c_int) -> Result<*mut u8, Exception> {
  // SAFETY: A null address lets the kernel choose the mapping.
  let addr: *mut libc::c_void = unsafe { libc::shmat(id, ptr::null(), flags) };

  if addr as isize == -1 {
    return Err(error("failed to attach shared memory segment"));
  }

  Ok(addr.cast())
}

fn detach(addr: *mut u8) -> Result<(), Exception> {
  // SAFETY: `addr` was returned by a successful `shmat`.
  if unsafe { libc::shmdt(addr.cast_const().cast()) } == -1 {
    return Err(error("failed to detach shared memory segment"));
  }

  Ok(())
}

fn remove(id: libc::c_int) {
  // SAFETY: `IPC_RMID` ignores the buffer argument.
  if unsafe { libc::shmctl(id, libc::IPC_RMID, ptr::null_mut()) } == -1 {
    warn!(
      target: "splinter",
      id,
      error = %io::Error::last_os_error(),
      "failed to remove shared memory segment",
    );
  } else {
    debug!(target: "splinter", id, "ipc shm segment removed");
  }
}

#[cold]
fn error(message: &'static str) -> Exception {
  Exception::transport(format_args!("{message}: {}", io::Error::last_os_error()))
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
