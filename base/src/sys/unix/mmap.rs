// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The libc side of file backed mappings.

use std::mem;
use std::ptr::null_mut;

use libc::c_int;
use libc::c_void;
use libc::PROT_READ;
use libc::PROT_WRITE;

use crate::descriptor::AsRawDescriptor;
use crate::Access;
use crate::Error as ErrnoError;
use crate::MmapError as Error;
use crate::MmapResult as Result;
use crate::Protection;

impl From<Protection> for c_int {
    #[inline(always)]
    fn from(p: Protection) -> Self {
        let mut value = 0;
        if p.read {
            value |= PROT_READ
        }
        if p.write {
            value |= PROT_WRITE;
        }
        value
    }
}

impl From<Access> for c_int {
    #[inline(always)]
    fn from(a: Access) -> Self {
        match a {
            Access::Shared => libc::MAP_SHARED,
            Access::Private => libc::MAP_PRIVATE,
        }
    }
}

/// A region of memory mapped from a descriptor. The region is unmapped when this is dropped.
#[derive(Debug)]
pub struct MemoryMapping {
    addr: *mut u8,
    size: usize,
}

// SAFETY:
// Send and Sync aren't automatically inherited for the raw address pointer.
// Accessing that pointer is only done through the stateless interface which
// allows the object to be shared by multiple threads without a decrease in
// safety.
unsafe impl Send for MemoryMapping {}
// SAFETY: See safety comments for impl Send
unsafe impl Sync for MemoryMapping {}

impl MemoryMapping {
    /// Maps the first `size` bytes of `fd` with an address chosen by the kernel.
    ///
    /// # Arguments
    /// * `fd` - File descriptor to mmap from.
    /// * `size` - Size of memory region in bytes.
    /// * `prot` - Protection (e.g. readable/writable) of the memory region.
    /// * `access` - Whether writes are shared with the file or kept private.
    pub fn from_descriptor(
        fd: &dyn AsRawDescriptor,
        size: usize,
        prot: Protection,
        access: Access,
    ) -> Result<MemoryMapping> {
        // SAFETY:
        // Safe because we let the kernel pick the address, so no existing memory is replaced.
        unsafe { MemoryMapping::try_mmap(size, prot.into(), access.into(), fd) }
    }

    /// # Safety
    ///
    /// The caller must not pass a fixed address; the kernel is always free to choose one.
    unsafe fn try_mmap(
        size: usize,
        prot: c_int,
        flags: c_int,
        fd: &dyn AsRawDescriptor,
    ) -> Result<MemoryMapping> {
        let addr = libc::mmap(null_mut(), size, prot, flags, fd.as_raw_descriptor(), 0);
        if addr == libc::MAP_FAILED {
            return Err(Error::SystemCallFailed(ErrnoError::last()));
        }
        Ok(MemoryMapping {
            addr: addr as *mut u8,
            size,
        })
    }

    /// Adopts a region previously released by `into_raw_parts`.
    ///
    /// # Safety
    ///
    /// `addr`..`addr+size` must be a live mapping created by `mmap` that nothing else owns.
    pub unsafe fn from_raw_parts(addr: *mut u8, size: usize) -> MemoryMapping {
        MemoryMapping { addr, size }
    }

    /// Gives up ownership of the region without unmapping it.
    pub fn into_raw_parts(self) -> (*mut u8, usize) {
        let parts = (self.addr, self.size);
        mem::forget(self);
        parts
    }

    /// Returns a pointer to the beginning of the memory region. Should only be
    /// used for passing this region to code that requires a raw pointer.
    pub fn as_ptr(&self) -> *mut u8 {
        self.addr
    }

    /// Returns the size of the memory region in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Calls msync with MS_SYNC on the whole mapping.
    pub fn msync(&self) -> Result<()> {
        // SAFETY:
        // Safe because we own the region and msync doesn't modify it.
        let ret = unsafe { libc::msync(self.addr as *mut c_void, self.size, libc::MS_SYNC) };
        if ret != -1 {
            Ok(())
        } else {
            Err(Error::SystemCallFailed(ErrnoError::last()))
        }
    }

    /// Unmaps the region. If munmap fails the region is abandoned: it is never accessed or
    /// unmapped again.
    pub fn unmap(self) -> Result<()> {
        let (addr, size) = self.into_raw_parts();
        // SAFETY:
        // Safe because we owned the region and ownership was just given up.
        let ret = unsafe { libc::munmap(addr as *mut c_void, size) };
        if ret != -1 {
            Ok(())
        } else {
            Err(Error::SystemCallFailed(ErrnoError::last()))
        }
    }
}

impl Drop for MemoryMapping {
    fn drop(&mut self) {
        // SAFETY:
        // This is safe because we mmap the area at addr ourselves, and nobody
        // else is holding a reference to it.
        unsafe {
            libc::munmap(self.addr as *mut c_void, self.size);
        }
    }
}
