// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::cmp::min;
use std::mem::size_of;
use std::ptr::copy_nonoverlapping;
use std::ptr::read_unaligned;
use std::ptr::write_unaligned;
use std::slice;

use remain::sorted;
use serde::Deserialize;
use serde::Serialize;
use zerocopy::FromBytes;
use zerocopy::IntoBytes;

use crate::descriptor::AsRawDescriptor;
use crate::platform::mmap::MemoryMapping as PlatformMmap;

#[sorted]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("requested memory out of range")]
    InvalidAddress,
    #[error("invalid argument provided when creating mapping")]
    InvalidArgument,
    #[error("requested memory range spans past the end of the region: offset={0} count={1} region_size={2}")]
    InvalidRange(usize, usize, usize),
    #[error("mapping is not readable")]
    NotReadable,
    #[error("mapping is not writable")]
    NotWritable,
    #[error("mmap related system call failed: {0}")]
    SystemCallFailed(#[source] crate::Error),
}
pub type Result<T> = std::result::Result<T, Error>;

/// Memory access type for a mapping.
#[derive(Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize, Debug)]
pub struct Protection {
    pub(crate) read: bool,
    pub(crate) write: bool,
}

impl Protection {
    /// Returns Protection allowing no access. Not a valid protection for a file mapping, but
    /// useful as a starting point for `set_read`/`set_write`.
    #[inline(always)]
    pub fn none() -> Protection {
        Protection::default()
    }

    /// Returns Protection allowing read/write access.
    #[inline(always)]
    pub fn read_write() -> Protection {
        Protection {
            read: true,
            write: true,
        }
    }

    /// Returns Protection allowing read access.
    #[inline(always)]
    pub fn read() -> Protection {
        Protection {
            read: true,
            ..Default::default()
        }
    }

    /// Returns Protection allowing write access.
    #[inline(always)]
    pub fn write() -> Protection {
        Protection {
            write: true,
            ..Default::default()
        }
    }

    /// Adds read access.
    #[inline(always)]
    pub fn set_read(self) -> Protection {
        Protection { read: true, ..self }
    }

    /// Adds write access.
    #[inline(always)]
    pub fn set_write(self) -> Protection {
        Protection {
            write: true,
            ..self
        }
    }

    #[inline(always)]
    pub fn is_readable(&self) -> bool {
        self.read
    }

    #[inline(always)]
    pub fn is_writable(&self) -> bool {
        self.write
    }

    /// True if neither read nor write access is allowed.
    #[inline(always)]
    pub fn is_none(&self) -> bool {
        !self.read && !self.write
    }

}

/// Whether writes through a mapping reach the backing file.
#[derive(Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize, Debug)]
pub enum Access {
    /// Writes are visible to other mappers and are carried back to the file.
    #[default]
    Shared,
    /// Writes are copy-on-write and stay in this process.
    Private,
}

/// A file backed memory mapping that knows its own size and protection. Every accessor is
/// bounds checked against the mapping and refuses access the protection does not allow.
#[derive(Debug)]
pub struct MemoryMapping {
    pub(crate) mapping: PlatformMmap,
    protection: Protection,
}

impl MemoryMapping {
    /// Returns a pointer to the beginning of the memory region.
    pub fn as_ptr(&self) -> *mut u8 {
        self.mapping.as_ptr()
    }

    /// Returns the size of the memory region in bytes.
    pub fn size(&self) -> usize {
        self.mapping.size()
    }

    fn check_readable(&self) -> Result<()> {
        if self.protection.read {
            Ok(())
        } else {
            Err(Error::NotReadable)
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.protection.write {
            Ok(())
        } else {
            Err(Error::NotWritable)
        }
    }

    pub(crate) fn range_end(&self, offset: usize, count: usize) -> Result<usize> {
        let mem_end = offset.checked_add(count).ok_or(Error::InvalidAddress)?;
        if mem_end > self.size() {
            return Err(Error::InvalidRange(offset, count, self.size()));
        }
        Ok(mem_end)
    }

    /// Views the whole mapping as a byte slice.
    pub fn as_slice(&self) -> Result<&[u8]> {
        self.check_readable()?;
        // SAFETY:
        // The region is owned by self, is `size()` bytes long, is readable and stays mapped for
        // the lifetime of the returned borrow.
        Ok(unsafe { slice::from_raw_parts(self.as_ptr(), self.size()) })
    }

    /// Views the whole mapping as a mutable byte slice.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        self.check_writable()?;
        // SAFETY:
        // As in `as_slice`, and the exclusive borrow of self rules out aliasing through safe code.
        Ok(unsafe { slice::from_raw_parts_mut(self.as_ptr(), self.size()) })
    }

    /// Copies `buf` into the mapping at `offset`, truncating at the end of the mapping. Returns
    /// the number of bytes copied.
    pub fn write_slice(&mut self, buf: &[u8], offset: usize) -> Result<usize> {
        self.check_writable()?;
        match self.size().checked_sub(offset) {
            Some(size_past_offset) => {
                let bytes_copied = min(size_past_offset, buf.len());
                // SAFETY:
                // The bytes_copied equation above ensures we don't copy bytes out of range of
                // either buf or this mapping. The exclusive borrow of self means no slice of the
                // mapping is alive, so buf can't overlap it.
                unsafe {
                    copy_nonoverlapping(buf.as_ptr(), self.as_ptr().add(offset), bytes_copied);
                }
                Ok(bytes_copied)
            }
            None => Err(Error::InvalidAddress),
        }
    }

    /// Copies from the mapping at `offset` into `buf`, stopping at the end of the mapping.
    /// Returns the number of bytes copied.
    pub fn read_slice(&self, buf: &mut [u8], offset: usize) -> Result<usize> {
        self.check_readable()?;
        match self.size().checked_sub(offset) {
            Some(size_past_offset) => {
                let bytes_copied = min(size_past_offset, buf.len());
                // SAFETY:
                // The bytes_copied equation above ensures we don't copy bytes out of range of
                // either buf or this mapping.
                unsafe {
                    copy_nonoverlapping(self.as_ptr().add(offset), buf.as_mut_ptr(), bytes_copied);
                }
                Ok(bytes_copied)
            }
            None => Err(Error::InvalidAddress),
        }
    }

    /// Writes an object to the memory region at the specified offset.
    /// Returns Ok(()) if the object fits, or Err if it extends past the end.
    pub fn write_obj<T: IntoBytes>(&mut self, val: T, offset: usize) -> Result<()> {
        self.check_writable()?;
        self.range_end(offset, size_of::<T>())?;
        // SAFETY:
        // This is safe because we checked the bounds above.
        unsafe {
            write_unaligned(self.as_ptr().add(offset) as *mut T, val);
        }
        Ok(())
    }

    /// Reads an object from the memory region at the given offset.
    /// Another mapper of a shared file may change the bytes mid-read, which is fine because any
    /// bit pattern is a valid `T`.
    pub fn read_obj<T: FromBytes>(&self, offset: usize) -> Result<T> {
        self.check_readable()?;
        self.range_end(offset, size_of::<T>())?;
        // SAFETY:
        // This is safe because by definition FromBytes types can have their bits set arbitrarily
        // and still be valid, and we checked the bounds above.
        unsafe { Ok(read_unaligned(self.as_ptr().add(offset) as *const T)) }
    }

    /// Flushes the mapping to the backing file with MS_SYNC.
    pub fn msync(&self) -> Result<()> {
        self.mapping.msync()
    }

    /// Unmaps the region, reporting munmap failure. After a failure the region is abandoned
    /// and never touched again.
    pub fn unmap(self) -> Result<()> {
        self.mapping.unmap()
    }

    /// Releases ownership of the region without unmapping it.
    pub fn into_raw_parts(self) -> (*mut u8, usize) {
        self.mapping.into_raw_parts()
    }

    /// Adopts a region released by `into_raw_parts`.
    ///
    /// # Safety
    ///
    /// `addr`..`addr+size` must be a live mapping created with at least `protection` that
    /// nothing else owns.
    pub unsafe fn from_raw_parts(
        addr: *mut u8,
        size: usize,
        protection: Protection,
    ) -> MemoryMapping {
        MemoryMapping {
            mapping: PlatformMmap::from_raw_parts(addr, size),
            protection,
        }
    }
}

pub struct MemoryMappingBuilder<'a> {
    pub(crate) descriptor: Option<&'a dyn AsRawDescriptor>,
    pub(crate) size: usize,
    pub(crate) protection: Option<Protection>,
    pub(crate) access: Option<Access>,
}

/// Builds a MemoryMapping object from the specified arguments.
impl<'a> MemoryMappingBuilder<'a> {
    /// Creates a new builder specifying size of the memory region in bytes.
    pub fn new(size: usize) -> MemoryMappingBuilder<'a> {
        MemoryMappingBuilder {
            descriptor: None,
            size,
            protection: None,
            access: None,
        }
    }

    /// Build the memory mapping from the given descriptor, starting at offset zero.
    pub fn from_descriptor(
        mut self,
        descriptor: &'a dyn AsRawDescriptor,
    ) -> MemoryMappingBuilder<'a> {
        self.descriptor = Some(descriptor);
        self
    }

    /// Protection (e.g. readable/writable) of the memory region.
    ///
    /// Default: Read/write
    pub fn protection(mut self, protection: Protection) -> MemoryMappingBuilder<'a> {
        self.protection = Some(protection);
        self
    }

    /// Visibility of writes to the memory region.
    ///
    /// Default: Shared
    pub fn access(mut self, access: Access) -> MemoryMappingBuilder<'a> {
        self.access = Some(access);
        self
    }

    pub fn build(self) -> Result<MemoryMapping> {
        let descriptor = self.descriptor.ok_or(Error::InvalidArgument)?;
        if self.size == 0 {
            return Err(Error::InvalidArgument);
        }
        let protection = self.protection.unwrap_or_else(Protection::read_write);
        if protection.is_none() {
            return Err(Error::InvalidArgument);
        }
        let access = self.access.unwrap_or_default();
        Ok(MemoryMapping {
            mapping: PlatformMmap::from_descriptor(descriptor, self.size, protection, access)?,
            protection,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Write;

    use super::*;

    fn file_with(contents: &[u8]) -> File {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[test]
    fn protection_helpers() {
        assert!(Protection::none().is_none());
        assert!(Protection::read().is_readable());
        assert!(!Protection::read().is_writable());
        assert_eq!(Protection::read().set_write(), Protection::read_write());
    }

    #[test]
    fn build_requires_descriptor() {
        assert!(matches!(
            MemoryMappingBuilder::new(4096).build(),
            Err(Error::InvalidArgument)
        ));
    }

    #[test]
    fn build_rejects_empty_and_inaccessible() {
        let file = file_with(&[0; 16]);
        assert!(matches!(
            MemoryMappingBuilder::new(0).from_descriptor(&file).build(),
            Err(Error::InvalidArgument)
        ));
        assert!(matches!(
            MemoryMappingBuilder::new(16)
                .from_descriptor(&file)
                .protection(Protection::none())
                .build(),
            Err(Error::InvalidArgument)
        ));
    }

    #[test]
    fn read_write_obj() {
        let file = file_with(&[0; 64]);
        let mut m = MemoryMappingBuilder::new(64)
            .from_descriptor(&file)
            .build()
            .unwrap();
        m.write_obj(0x1122_3344_5566_7788u64, 3).unwrap();
        assert_eq!(m.read_obj::<u64>(3).unwrap(), 0x1122_3344_5566_7788);
        assert!(matches!(
            m.read_obj::<u64>(60),
            Err(Error::InvalidRange(60, 8, 64))
        ));
        assert!(matches!(
            m.write_obj(1u8, usize::MAX),
            Err(Error::InvalidAddress)
        ));
    }

    #[test]
    fn slices_truncate_at_end() {
        let file = file_with(b"0123456789");
        let mut m = MemoryMappingBuilder::new(10)
            .from_descriptor(&file)
            .access(Access::Private)
            .build()
            .unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(m.read_slice(&mut buf, 6).unwrap(), 4);
        assert_eq!(&buf[..4], b"6789");
        assert_eq!(m.write_slice(b"abcdef", 8).unwrap(), 2);
        assert_eq!(m.as_slice().unwrap(), b"01234567ab");
        assert!(matches!(
            m.read_slice(&mut buf, 11),
            Err(Error::InvalidAddress)
        ));
    }

    #[test]
    fn protection_is_enforced() {
        let file = file_with(&[7; 8]);
        let mut read_only = MemoryMappingBuilder::new(8)
            .from_descriptor(&file)
            .protection(Protection::read())
            .build()
            .unwrap();
        assert_eq!(read_only.read_obj::<u8>(0).unwrap(), 7);
        assert!(matches!(
            read_only.write_obj(1u8, 0),
            Err(Error::NotWritable)
        ));
        assert!(matches!(read_only.as_mut_slice(), Err(Error::NotWritable)));

        let mut write_only = MemoryMappingBuilder::new(8)
            .from_descriptor(&file)
            .protection(Protection::write())
            .build()
            .unwrap();
        write_only.write_obj(1u8, 0).unwrap();
        assert!(matches!(write_only.as_slice(), Err(Error::NotReadable)));
    }

    #[test]
    fn raw_parts_round_trip() {
        let file = file_with(&[5; 32]);
        let m = MemoryMappingBuilder::new(32)
            .from_descriptor(&file)
            .protection(Protection::read())
            .access(Access::Private)
            .build()
            .unwrap();
        let (addr, size) = m.into_raw_parts();
        // SAFETY: the parts came from `into_raw_parts` above.
        let m = unsafe { MemoryMapping::from_raw_parts(addr, size, Protection::read()) };
        assert_eq!(m.size(), 32);
        assert_eq!(m.as_slice().unwrap(), &[5; 32]);
        m.unmap().unwrap();
    }
}
