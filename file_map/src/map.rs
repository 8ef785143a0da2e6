// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::mem::size_of;
use std::path::Path;
use std::path::PathBuf;

use base::fstat;
use base::open_or_create;
use base::set_len;
use base::AsRawDescriptor;
use base::IntoRawDescriptor;
use base::MemoryMapping;
use base::MemoryMappingBuilder;
use base::MmapError;
use base::Protection;
use base::RawDescriptor;
use base::SafeDescriptor;
use log::debug;
use log::error;
use zerocopy::FromBytes;
use zerocopy::IntoBytes;

use crate::Error;
use crate::Mode;
use crate::Result;
use crate::UnmapError;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum RequestedMode {
    Decoded(Mode),
    Bits(u32),
}

/// What to map: a path, a mode, and the size to give the file if it is empty.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MappingRequest {
    path: PathBuf,
    mode: RequestedMode,
    size_hint: u64,
}

impl MappingRequest {
    /// A request to map `path` read/write and shared, failing if the file is empty.
    pub fn new<P: AsRef<Path>>(path: P) -> MappingRequest {
        MappingRequest {
            path: path.as_ref().to_path_buf(),
            mode: RequestedMode::Decoded(Mode::default()),
            size_hint: 0,
        }
    }

    /// Mode of the mapping.
    ///
    /// Default: read/write, shared
    pub fn mode(mut self, mode: Mode) -> MappingRequest {
        self.mode = RequestedMode::Decoded(mode);
        self
    }

    /// Mode of the mapping in the `mode::bits` encoding. The bits are decoded only after the file
    /// was opened and sized, so an invalid mode is reported after those side effects.
    pub fn mode_bits(mut self, mode: u32) -> MappingRequest {
        self.mode = RequestedMode::Bits(mode);
        self
    }

    /// Length to extend the file to when it is empty. Ignored for non-empty files.
    ///
    /// Default: 0
    pub fn size_hint(mut self, size_hint: u64) -> MappingRequest {
        self.size_hint = size_hint;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_size_hint(&self) -> u64 {
        self.size_hint
    }

    /// Maps the requested file. See [`map`].
    pub fn map(&self) -> Result<FileMapping> {
        map(self)
    }

    fn decode_mode(&self) -> Result<Mode> {
        match self.mode {
            RequestedMode::Decoded(mode) => Ok(mode),
            RequestedMode::Bits(bits) => Mode::from_bits(bits),
        }
    }
}

/// A whole file mapped into memory together with the descriptor it was mapped from.
///
/// The mapping is unmapped and the descriptor closed when this is dropped. Use
/// [`FileMapping::unmap`] to observe munmap errors and keep the descriptor.
#[derive(Debug)]
pub struct FileMapping {
    // Field order matters: the region is unmapped before the descriptor is closed.
    mapping: MemoryMapping,
    descriptor: SafeDescriptor,
    mode: Mode,
    path: PathBuf,
}

/// The pieces of a `FileMapping` after it stopped managing them.
#[derive(Debug)]
pub struct RawParts {
    pub address: *mut u8,
    pub length: usize,
    pub descriptor: RawDescriptor,
}

/// Opens (creating if needed) and maps the whole file named by `request`.
///
/// An empty file is grown to `request`'s size hint first; a non-empty file is mapped at its
/// current size and the hint is ignored. Every failure is logged with the system call that
/// failed, and any descriptor opened along the way is closed before returning.
pub fn map(request: &MappingRequest) -> Result<FileMapping> {
    let path = request.path();

    let descriptor = open_or_create(path).map_err(|e| {
        error!("open {}: {}", path.display(), e);
        Error::OpenFailed(e)
    })?;

    let stat = fstat(&descriptor).map_err(|e| {
        error!("fstat {}: {}", path.display(), e);
        Error::StatFailed(e)
    })?;
    if !stat.is_regular() {
        error!("{}: not a regular file ({:?})", path.display(), stat.kind);
        return Err(Error::NotRegularFile);
    }

    let size = if stat.size == 0 {
        let size_hint = request.get_size_hint();
        if size_hint == 0 {
            error!("{}: cannot map empty file without a size", path.display());
            return Err(Error::EmptyFileNoSize);
        }
        set_len(&descriptor, size_hint).map_err(|e| {
            error!("ftruncate {} to {}: {}", path.display(), size_hint, e);
            Error::ResizeFailed(e)
        })?;
        debug!("padded {} to {} bytes", path.display(), size_hint);
        size_hint
    } else {
        stat.size
    };

    let mode = request.decode_mode().map_err(|e| {
        error!("{}: {}", path.display(), e);
        e
    })?;

    let size = usize::try_from(size).map_err(|_| {
        error!("mmap {}: {} bytes do not fit in memory", path.display(), size);
        Error::MapFailed(base::Error::new(libc::EOVERFLOW))
    })?;
    let mapping = MemoryMappingBuilder::new(size)
        .from_descriptor(&descriptor)
        .protection(mode.protection())
        .access(mode.access())
        .build()
        .map_err(|e| {
            error!("mmap {}: {}", path.display(), e);
            match e {
                MmapError::SystemCallFailed(e) => Error::MapFailed(e),
                _ => Error::MapFailed(base::Error::new(libc::EINVAL)),
            }
        })?;
    debug!(
        "mapped {} ({} bytes, {}) at {:p}",
        path.display(),
        size,
        mode,
        mapping.as_ptr()
    );

    Ok(FileMapping {
        mapping,
        descriptor,
        mode,
        path: path.to_path_buf(),
    })
}

/// Unmaps `mapping`, returning its still-open descriptor. See [`FileMapping::unmap`].
pub fn unmap(mapping: FileMapping) -> std::result::Result<SafeDescriptor, UnmapError> {
    mapping.unmap()
}

/// Unmaps a region previously released with [`FileMapping::into_raw_parts`]. The descriptor is
/// not touched.
///
/// # Safety
///
/// `address` and `length` must come from one `RawParts` whose region has not been unmapped yet,
/// and nothing may access the region afterwards.
pub unsafe fn unmap_raw_parts(address: *mut u8, length: usize) -> Result<()> {
    // The protection is irrelevant to munmap.
    let mapping = MemoryMapping::from_raw_parts(address, length, Protection::none());
    mapping.unmap().map_err(|e| {
        error!("munmap {:p}+{}: {}", address, length, e);
        unmap_error(e)
    })
}

fn unmap_error(e: MmapError) -> Error {
    match e {
        MmapError::SystemCallFailed(e) => Error::UnmapFailed(e),
        _ => Error::UnmapFailed(base::Error::new(libc::EINVAL)),
    }
}

impl FileMapping {
    /// Length of the mapping, which is the size of the file when it was mapped.
    pub fn len(&self) -> usize {
        self.mapping.size()
    }

    /// Always false: empty files are grown or rejected before mapping.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The descriptor the file was mapped from. It stays open while mapped.
    pub fn descriptor(&self) -> &SafeDescriptor {
        &self.descriptor
    }

    /// Raw start of the region, for code that can only take a pointer. Valid for `len()` bytes
    /// until this mapping is dropped or unmapped.
    pub fn as_ptr(&self) -> *mut u8 {
        self.mapping.as_ptr()
    }

    fn access_error(&self, e: MmapError, offset: usize, count: usize) -> Error {
        match e {
            MmapError::NotReadable => Error::AccessDenied("read"),
            MmapError::NotWritable => Error::AccessDenied("write"),
            MmapError::SystemCallFailed(e) => Error::SyncFailed(e),
            MmapError::InvalidAddress
            | MmapError::InvalidArgument
            | MmapError::InvalidRange(..) => Error::OutOfRange {
                offset,
                count,
                size: self.len(),
            },
        }
    }

    /// The whole mapping as bytes. Requires read protection.
    pub fn as_slice(&self) -> Result<&[u8]> {
        self.mapping
            .as_slice()
            .map_err(|e| self.access_error(e, 0, self.len()))
    }

    /// The whole mapping as mutable bytes. Requires write protection.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        let len = self.len();
        match self.mapping.as_mut_slice() {
            Ok(slice) => Ok(slice),
            Err(MmapError::NotWritable) => Err(Error::AccessDenied("write")),
            Err(_) => Err(Error::OutOfRange {
                offset: 0,
                count: len,
                size: len,
            }),
        }
    }

    /// Copies bytes starting at `offset` into `buf`, stopping at the end of the mapping.
    /// Returns how many bytes were copied.
    pub fn read_slice(&self, buf: &mut [u8], offset: usize) -> Result<usize> {
        self.mapping
            .read_slice(buf, offset)
            .map_err(|e| self.access_error(e, offset, buf.len()))
    }

    /// Copies `buf` into the mapping at `offset`, stopping at the end of the mapping.
    /// Returns how many bytes were copied.
    pub fn write_slice(&mut self, buf: &[u8], offset: usize) -> Result<usize> {
        self.mapping
            .write_slice(buf, offset)
            .map_err(|e| self.access_error(e, offset, buf.len()))
    }

    /// Reads a plain data object at `offset`, which need not be aligned.
    pub fn read_obj<T: FromBytes>(&self, offset: usize) -> Result<T> {
        self.mapping
            .read_obj(offset)
            .map_err(|e| self.access_error(e, offset, size_of::<T>()))
    }

    /// Writes a plain data object at `offset`, which need not be aligned.
    pub fn write_obj<T: IntoBytes>(&mut self, val: T, offset: usize) -> Result<()> {
        self.mapping
            .write_obj(val, offset)
            .map_err(|e| self.access_error(e, offset, size_of::<T>()))
    }

    /// Writes dirty pages of a shared mapping back to the file and waits for completion.
    pub fn sync(&self) -> Result<()> {
        self.mapping.msync().map_err(|e| {
            error!("msync {}: {}", self.path.display(), e);
            self.access_error(e, 0, self.len())
        })
    }

    /// Unmaps the file and returns the descriptor it was mapped from, still open.
    ///
    /// If munmap fails the mapping is abandoned: the region is never accessed or unmapped again.
    /// Nothing else is cleaned up; the error hands the descriptor back, still open, and the
    /// caller decides when to close it.
    pub fn unmap(self) -> std::result::Result<SafeDescriptor, UnmapError> {
        let FileMapping {
            mapping,
            descriptor,
            path,
            ..
        } = self;
        match mapping.unmap() {
            Ok(()) => {
                debug!("unmapped {}", path.display());
                Ok(descriptor)
            }
            Err(e) => {
                error!("munmap {}: {}", path.display(), e);
                Err(UnmapError {
                    error: unmap_error(e),
                    descriptor,
                })
            }
        }
    }

    /// Stops managing the region and the descriptor and returns them. The caller becomes
    /// responsible for `unmap_raw_parts` and for closing the descriptor.
    pub fn into_raw_parts(self) -> RawParts {
        let (address, length) = self.mapping.into_raw_parts();
        RawParts {
            address,
            length,
            descriptor: self.descriptor.into_raw_descriptor(),
        }
    }
}

impl AsRawDescriptor for FileMapping {
    fn as_raw_descriptor(&self) -> RawDescriptor {
        self.descriptor.as_raw_descriptor()
    }
}
