// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Maps a whole regular file into memory and releases it again.
//!
//! The file is opened read/write (and created if missing), an empty file is grown to the
//! requested size, and the full file is mapped with the protection and access of a [`Mode`].
//! The resulting [`FileMapping`] owns both the mapped region and the descriptor; dropping it
//! releases both, while [`FileMapping::unmap`] releases the region and hands the still-open
//! descriptor back.
//!
//! # Examples
//!
//! ```
//! # let dir = tempfile::tempdir().unwrap();
//! # let path = dir.path().join("new.bin");
//! use file_map::MappingRequest;
//! use file_map::Mode;
//!
//! let mut mapping = MappingRequest::new(&path)
//!     .mode(Mode::read_write_shared())
//!     .size_hint(1024)
//!     .map()
//!     .expect("failed to map file");
//! assert_eq!(mapping.len(), 1024);
//! mapping.write_obj(0xdeadbeefu32, 16).unwrap();
//! let descriptor = mapping.unmap().expect("failed to unmap file");
//! ```

mod map;
pub mod mode;

use base::SafeDescriptor;
use remain::sorted;
use thiserror::Error as ThisError;

pub use map::map;
pub use map::unmap;
pub use map::unmap_raw_parts;
pub use map::FileMapping;
pub use map::MappingRequest;
pub use map::RawParts;
pub use mode::Mode;

/// Every way mapping or unmapping a file can fail. Variants wrapping a `base::Error` carry the
/// OS error reported by the failing system call.
#[sorted]
#[derive(ThisError, Debug)]
pub enum Error {
    #[error("mapping does not allow {0} access")]
    AccessDenied(&'static str),
    #[error("invalid/missing access mode in {0:#x}")]
    BadAccess(u32),
    #[error("cannot map empty file without a size")]
    EmptyFileNoSize,
    #[error("invalid mode `{0}`")]
    InvalidMode(String),
    #[error("mmap failed: {0}")]
    MapFailed(#[source] base::Error),
    #[error("no protection bits set in {0:#x}")]
    NoProtection(u32),
    #[error("not a regular file")]
    NotRegularFile,
    #[error("open failed: {0}")]
    OpenFailed(#[source] base::Error),
    #[error("range offset={offset} count={count} is outside the {size} byte mapping")]
    OutOfRange {
        offset: usize,
        count: usize,
        size: usize,
    },
    #[error("failed to size file: {0}")]
    ResizeFailed(#[source] base::Error),
    #[error("stat failed: {0}")]
    StatFailed(#[source] base::Error),
    #[error("msync failed: {0}")]
    SyncFailed(#[source] base::Error),
    #[error("munmap failed: {0}")]
    UnmapFailed(#[source] base::Error),
}

impl Error {
    /// The OS error code behind this error, if a system call failed.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Error::MapFailed(e)
            | Error::OpenFailed(e)
            | Error::ResizeFailed(e)
            | Error::StatFailed(e)
            | Error::SyncFailed(e)
            | Error::UnmapFailed(e) => Some(e.errno()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A failed [`FileMapping::unmap`]. The region was abandoned and is never touched again. The
/// descriptor is returned still open.
#[derive(ThisError, Debug)]
#[error("failed to unmap file")]
pub struct UnmapError {
    #[source]
    pub error: Error,
    pub descriptor: SafeDescriptor,
}
