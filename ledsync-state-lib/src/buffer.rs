//! Shared scratch buffer
//!
//! Request handling and serialization share one output buffer. A caller must
//! hold it exclusively; a second caller waits for a bounded time and is then
//! rejected instead of queueing forever.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use log::warn;

/// Initial capacity of the scratch buffer.
pub const SCRATCH_CAPACITY: usize = 4096;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Who holds the buffer, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BufferOwner {
    StateRequest = 1,
    StateRead = 2,
    LiveLeds = 3,
    Preset = 4,
}

impl BufferOwner {
    const fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::StateRequest),
            2 => Some(Self::StateRead),
            3 => Some(Self::LiveLeds),
            4 => Some(Self::Preset),
            _ => None,
        }
    }
}

/// Errors from [`ScratchBuffer::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// The buffer stayed held for the whole wait.
    Busy {
        requested: BufferOwner,
        /// Holder at the time of giving up, if it was still known
        holder: Option<BufferOwner>,
    },
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Busy {
                requested,
                holder: Some(holder),
            } => write!(f, "buffer busy: {requested:?} blocked by {holder:?}"),
            Self::Busy { requested, holder: None } => write!(f, "buffer busy: {requested:?} timed out"),
        }
    }
}

impl std::error::Error for BufferError {}

#[derive(Debug)]
pub struct ScratchBuffer {
    data: Mutex<Vec<u8>>,
    holder: AtomicU8,
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScratchBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Mutex::new(Vec::with_capacity(SCRATCH_CAPACITY)),
            holder: AtomicU8::new(0),
        }
    }

    /// Take the buffer, waiting at most `timeout`. The buffer is handed out empty.
    pub fn acquire(&self, owner: BufferOwner, timeout: Duration) -> Result<ScratchGuard<'_>, BufferError> {
        let deadline = Instant::now() + timeout;
        loop {
            let locked = match self.data.try_lock() {
                Ok(data) => Some(data),
                // a panic mid-write leaves nothing worth keeping; the buffer is cleared below
                Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => None,
            };
            if let Some(mut data) = locked {
                data.clear();
                self.holder.store(owner as u8, Ordering::Release);
                return Ok(ScratchGuard {
                    data,
                    holder: &self.holder,
                });
            }

            if Instant::now() >= deadline {
                let holder = BufferOwner::from_id(self.holder.load(Ordering::Acquire));
                warn!("Scratch buffer busy: {owner:?} gave up waiting for {holder:?}");
                return Err(BufferError::Busy {
                    requested: owner,
                    holder,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Current holder, if any.
    #[must_use]
    pub fn holder(&self) -> Option<BufferOwner> {
        BufferOwner::from_id(self.holder.load(Ordering::Acquire))
    }
}

/// Exclusive access to the scratch buffer; released on drop.
pub struct ScratchGuard<'a> {
    data: MutexGuard<'a, Vec<u8>>,
    holder: &'a AtomicU8,
}

impl Deref for ScratchGuard<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl DerefMut for ScratchGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

impl Drop for ScratchGuard<'_> {
    fn drop(&mut self) {
        self.holder.store(0, Ordering::Release);
    }
}
