// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Safe wrappers for the system interfaces a file backed mapping is built from.

pub mod descriptor;
mod errno;
mod mmap;
pub mod syslog;

pub mod sys;

pub use descriptor::AsRawDescriptor;
pub use descriptor::FromRawDescriptor;
pub use descriptor::IntoRawDescriptor;
pub use descriptor::SafeDescriptor;
pub use errno::errno_result;
pub use errno::Error;
pub use errno::Result;
pub use mmap::Access;
pub use mmap::Error as MmapError;
pub use mmap::MemoryMapping;
pub use mmap::MemoryMappingBuilder;
pub use mmap::Protection;
pub use mmap::Result as MmapResult;
use sys::platform;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        pub use sys::unix;

        pub use unix::fstat;
        pub use unix::open_or_create;
        pub use unix::pagesize;
        pub use unix::set_len;
        pub use unix::FileKind;
        pub use unix::FileStat;
        pub use unix::RawDescriptor;
        pub use unix::CREATE_MODE;
    }
}
