mod pool;

pub use pool::{ScratchGuard, ScratchPool};

use anyhow::Result;
use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// Allocation alignment for every buffer; large enough for any element type
/// the loops touch.
pub const BUFFER_ALIGN: usize = 16;

/// A heap allocation shared between array views. The bytes start zeroed;
/// element interpretation is the owner's business.
pub struct Buffer {
    ptr: NonNull<u8>,
    len: usize,
    layout: Layout,
}

// The buffer itself is plain bytes; synchronization of concurrent writers is
// the caller's contract (one invocation never shares its outputs).
unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

impl Buffer {
    /// Allocate `len` zeroed bytes aligned to [`BUFFER_ALIGN`].
    pub fn allocate(len: usize) -> Result<Self> {
        let layout = Layout::from_size_align(len.max(1), BUFFER_ALIGN)?;
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr)
            .ok_or_else(|| anyhow::anyhow!("buffer allocation of {} bytes failed", len))?;
        Ok(Self { ptr, len, layout })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base pointer of the allocation.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

/* ------------------------------------------------------------------------- */
/*                                     Tests                                 */
/* ------------------------------------------------------------------------- */
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_is_aligned_and_zeroed() {
        let buf = Buffer::allocate(64).unwrap();
        assert_eq!(buf.len(), 64);
        assert_eq!(buf.as_ptr() as usize % BUFFER_ALIGN, 0);
        let bytes = unsafe { std::slice::from_raw_parts(buf.as_ptr(), 64) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn zero_len_allocation() {
        let buf = Buffer::allocate(0).unwrap();
        assert_eq!(buf.len(), 0);
        assert!(buf.is_empty());
    }
}
