use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;

use crate::Buffer;

/// Thread-safe pool of scratch buffers for staged loop execution.
///
/// An invocation checks one buffer out at entry and the guard checks it back
/// in when dropped, so the buffer returns to the pool on every exit path,
/// early failure included.
pub struct ScratchPool {
    free: Mutex<Vec<Buffer>>,
}

impl ScratchPool {
    pub fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    /// Check out a buffer of at least `bytes` bytes, recycling a pooled one
    /// when it is big enough.
    pub fn acquire(self: &Arc<Self>, bytes: usize) -> Result<ScratchGuard> {
        let recycled = {
            let mut free = self.free.lock();
            match free.iter().position(|b| b.len() >= bytes) {
                Some(i) => Some(free.swap_remove(i)),
                None => None,
            }
        };
        let buf = match recycled {
            Some(b) => b,
            None => Buffer::allocate(bytes)?,
        };
        Ok(ScratchGuard {
            buf: Some(buf),
            pool: Arc::clone(self),
        })
    }

    /// Number of buffers currently sitting in the pool.
    pub fn idle_count(&self) -> usize {
        self.free.lock().len()
    }
}

impl Default for ScratchPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Checked-out scratch buffer; returns to its pool on drop.
pub struct ScratchGuard {
    buf: Option<Buffer>,
    pool: Arc<ScratchPool>,
}

impl ScratchGuard {
    pub fn as_ptr(&self) -> *mut u8 {
        self.buf.as_ref().expect("scratch buffer present").as_ptr()
    }

    pub fn len(&self) -> usize {
        self.buf.as_ref().expect("scratch buffer present").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        if let Some(b) = self.buf.take() {
            self.pool.free.lock().push(b);
        }
    }
}

/* ------------------------------------------------------------------------- */
/*                                     Tests                                 */
/* ------------------------------------------------------------------------- */
