// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fs::File;
use std::ops::Drop;
use std::os::unix::io::AsRawFd;
use std::os::unix::io::FromRawFd;
use std::os::unix::io::IntoRawFd;
use std::os::unix::io::RawFd;

use crate::descriptor::AsRawDescriptor;
use crate::descriptor::IntoRawDescriptor;
use crate::descriptor::SafeDescriptor;

pub type RawDescriptor = RawFd;

impl Drop for SafeDescriptor {
    fn drop(&mut self) {
        // SAFETY:
        // Safe because we own the descriptor and nothing else can observe it after drop.
        let _ = unsafe { libc::close(self.descriptor) };
    }
}

impl From<SafeDescriptor> for File {
    fn from(s: SafeDescriptor) -> File {
        // SAFETY:
        // Safe because we own the SafeDescriptor at this point.
        unsafe { File::from_raw_fd(s.into_raw_descriptor()) }
    }
}

// This enables File to be used as a RawDescriptor source, but does not mean File should be used
// as a generic descriptor container. That should go to SafeDescriptor.
impl AsRawDescriptor for File {
    fn as_raw_descriptor(&self) -> RawDescriptor {
        self.as_raw_fd()
    }
}

impl IntoRawDescriptor for File {
    fn into_raw_descriptor(self) -> RawDescriptor {
        self.into_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::io::Seek;
    use std::io::SeekFrom;
    use std::io::Write;

    use super::*;
    use crate::descriptor::FromRawDescriptor;

    #[test]
    fn file_round_trip() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"abc").unwrap();
        let raw = file.as_raw_descriptor();

        let descriptor = SafeDescriptor::from(file);
        assert_eq!(descriptor.as_raw_descriptor(), raw);

        let mut file = File::from(descriptor);
        assert_eq!(file.as_raw_descriptor(), raw);
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut buf = String::new();
        file.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "abc");
    }

    #[test]
    fn into_raw_descriptor_disarms_close() {
        let descriptor = SafeDescriptor::from(tempfile::tempfile().unwrap());
        let raw = descriptor.into_raw_descriptor();
        // SAFETY: `raw` is still open because `into_raw_descriptor` skipped the close.
        let ret = unsafe { libc::fcntl(raw, libc::F_GETFD) };
        assert!(ret >= 0);
        // SAFETY: we took ownership of `raw` above.
        drop(unsafe { SafeDescriptor::from_raw_descriptor(raw) });
    }
}
