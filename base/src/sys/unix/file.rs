// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! File system primitives needed to back a mapping: open, fstat and ftruncate.

use std::fs::OpenOptions;
use std::mem::MaybeUninit;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use libc::off_t;

use crate::descriptor::AsRawDescriptor;
use crate::descriptor::SafeDescriptor;
use crate::Error;
use crate::Result;

/// Permissions given to files created by `open_or_create`, before the umask is applied.
pub const CREATE_MODE: u32 = 0o777;

/// The type of a file system entry, decoded from `st_mode`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FileKind {
    BlockDevice,
    CharDevice,
    Directory,
    Fifo,
    Regular,
    Socket,
    Symlink,
    Unknown,
}

impl FileKind {
    fn from_mode(mode: libc::mode_t) -> FileKind {
        match mode & libc::S_IFMT {
            libc::S_IFBLK => FileKind::BlockDevice,
            libc::S_IFCHR => FileKind::CharDevice,
            libc::S_IFDIR => FileKind::Directory,
            libc::S_IFIFO => FileKind::Fifo,
            libc::S_IFREG => FileKind::Regular,
            libc::S_IFSOCK => FileKind::Socket,
            libc::S_IFLNK => FileKind::Symlink,
            _ => FileKind::Unknown,
        }
    }
}

/// The subset of `struct stat` a mapping cares about.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FileStat {
    pub kind: FileKind,
    pub size: u64,
}

impl FileStat {
    pub fn is_regular(&self) -> bool {
        self.kind == FileKind::Regular
    }
}

/// Opens `path` for reading and writing, creating it with `CREATE_MODE` if it does not exist.
/// The returned descriptor is close-on-exec.
pub fn open_or_create(path: &Path) -> Result<SafeDescriptor> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .mode(CREATE_MODE)
        .open(path)?;
    Ok(SafeDescriptor::from(file))
}

/// Retrieves the type and size of the file behind `descriptor`.
pub fn fstat(descriptor: &dyn AsRawDescriptor) -> Result<FileStat> {
    let mut st = MaybeUninit::<libc::stat>::uninit();
    // SAFETY:
    // Safe because we just got the memory space with exact required amount and passing that on.
    syscall!(unsafe { libc::fstat(descriptor.as_raw_descriptor(), st.as_mut_ptr()) })?;
    // SAFETY:
    // Safe because the kernel guarantees the struct is initialized.
    let st = unsafe { st.assume_init() };
    Ok(FileStat {
        kind: FileKind::from_mode(st.st_mode),
        size: st.st_size as u64,
    })
}

/// Sets the length of the file behind `descriptor` to `len` bytes. Growing a file fills the new
/// region with zeroes.
pub fn set_len(descriptor: &dyn AsRawDescriptor, len: u64) -> Result<()> {
    let len: off_t = len.try_into().map_err(|_| Error::new(libc::EFBIG))?;
    // SAFETY:
    // Safe because ftruncate doesn't touch our memory and we check the return value.
    syscall!(unsafe { libc::ftruncate(descriptor.as_raw_descriptor(), len) })?;
    Ok(())
}
