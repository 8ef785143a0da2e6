// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! C interface to `file_map`.
//!
//! Callers fill in `file_map.length` with the size an empty file should be grown to, call
//! `map_file` with one of the `FILE_MAP_*` mode presets (or an OR of one protection and one
//! access bit), and later release the region with `unmap_file`. The descriptor in
//! `file_map.fid` is left open by both calls; closing it is up to the caller.
//!
//! Failures return `FILE_MAP_ERROR` and are described on stderr by the `file_map` diagnostics
//! once logging is initialized, which `map_file` does on first use.

#![allow(non_camel_case_types)]

use std::ffi::CStr;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::panic::catch_unwind;
use std::path::PathBuf;

// The C struct below shares the crate's name, so the crate is always named from the root.
use ::file_map::mode::bits;
use ::file_map::MappingRequest;
use base::syslog;
use libc::c_char;
use libc::c_int;
use libc::c_void;
use libc::size_t;
use log::error;

pub const FILE_MAP_PROT_READ: c_int = bits::PROT_READ as c_int;
pub const FILE_MAP_PROT_WRITE: c_int = bits::PROT_WRITE as c_int;
pub const FILE_MAP_PROT: c_int = bits::PROT as c_int;
pub const FILE_MAP_ACCESS_SHARED: c_int = bits::ACCESS_SHARED as c_int;
pub const FILE_MAP_ACCESS_PRIVATE: c_int = bits::ACCESS_PRIVATE as c_int;
pub const FILE_MAP_ACCESS: c_int = bits::ACCESS as c_int;

pub const FILE_MAP_R_SHARED: c_int = bits::R_SHARED as c_int;
pub const FILE_MAP_W_SHARED: c_int = bits::W_SHARED as c_int;
pub const FILE_MAP_RW_SHARED: c_int = bits::RW_SHARED as c_int;
pub const FILE_MAP_R_PRIVATE: c_int = bits::R_PRIVATE as c_int;
pub const FILE_MAP_W_PRIVATE: c_int = bits::W_PRIVATE as c_int;
pub const FILE_MAP_RW_PRIVATE: c_int = bits::RW_PRIVATE as c_int;

pub const FILE_MAP_OK: c_int = 0;
/// Reserved. Never returned.
pub const FILE_MAP_WARN: c_int = -1;
pub const FILE_MAP_ERROR: c_int = -2;

/// A mapped file as seen from C.
#[repr(C)]
#[derive(Debug)]
pub struct file_map {
    pub address: *mut c_void,
    /// Size hint for empty files on input to `map_file`, mapped length on output.
    pub length: size_t,
    pub fid: c_int,
}

// File names are arbitrary bytes, as they are for open(2).
fn validate_path(path: *const c_char) -> Option<PathBuf> {
    if !path.is_null() {
        // SAFETY: just checked that `path` is not null.
        let path = unsafe { CStr::from_ptr(path) };
        Some(PathBuf::from(OsStr::from_bytes(path.to_bytes())))
    } else {
        None
    }
}

/// Maps the whole file at `filename` into memory.
///
/// On success `map` holds the address, length and open descriptor of the mapping and
/// `FILE_MAP_OK` is returned. On failure `FILE_MAP_ERROR` is returned and `map` is left as it
/// was.
///
/// # Safety
///
/// Function is unsafe due to raw pointer usage - a null pointer could be passed in. Usage of
/// !raw_pointer.is_null() checks should prevent unsafe behavior but the caller should ensure no
/// null pointers are passed.
#[no_mangle]
pub unsafe extern "C" fn map_file(
    map: *mut file_map,
    filename: *const c_char,
    mode: c_int,
) -> c_int {
    catch_unwind(|| {
        // Diagnostics are best effort; a host application may have installed its own logger.
        let _ = syslog::init();

        // SAFETY: `map` is either null or points to a `file_map` owned by the caller.
        let map = match unsafe { map.as_mut() } {
            Some(map) => map,
            None => {
                error!("map_file: null file_map");
                return FILE_MAP_ERROR;
            }
        };
        let path = match validate_path(filename) {
            Some(path) => path,
            None => {
                error!("map_file: null file name");
                return FILE_MAP_ERROR;
            }
        };

        let request = MappingRequest::new(path)
            .mode_bits(mode as u32)
            .size_hint(map.length as u64);
        match request.map() {
            Ok(mapping) => {
                let parts = mapping.into_raw_parts();
                map.address = parts.address as *mut c_void;
                map.length = parts.length;
                map.fid = parts.descriptor;
                FILE_MAP_OK
            }
            Err(_) => FILE_MAP_ERROR,
        }
    })
    .unwrap_or(FILE_MAP_ERROR)
}

/// Unmaps a region mapped by `map_file`. `map.fid` is not closed.
///
/// # Safety
///
/// `map` must be null or point to a `file_map` filled in by a successful `map_file` that has not
/// been unmapped yet. The region must not be accessed after this returns `FILE_MAP_OK`.
#[no_mangle]
pub unsafe extern "C" fn unmap_file(map: *mut file_map) -> c_int {
    catch_unwind(|| {
        // SAFETY: `map` is either null or points to a `file_map` owned by the caller.
        let map = match unsafe { map.as_ref() } {
            Some(map) => map,
            None => {
                error!("unmap_file: null file_map");
                return FILE_MAP_ERROR;
            }
        };
        // SAFETY: the caller guarantees the region came from `map_file` and is still mapped.
        match unsafe { ::file_map::unmap_raw_parts(map.address as *mut u8, map.length) } {
            Ok(()) => FILE_MAP_OK,
            Err(_) => FILE_MAP_ERROR,
        }
    })
    .unwrap_or(FILE_MAP_ERROR)
}

#[cfg(test)]
mod tests {
    use std::ffi::CString;
    use std::fs;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;
    use std::ptr::null;
    use std::ptr::null_mut;
    use std::slice;

    use super::*;

    fn c_path(path: &Path) -> CString {
        CString::new(path.as_os_str().as_bytes()).unwrap()
    }

    fn empty_map(length: usize) -> file_map {
        file_map {
            address: null_mut(),
            length,
            fid: -1,
        }
    }

    fn close(fid: c_int) {
        // SAFETY: `fid` was handed to us by `map_file`.
        assert_eq!(unsafe { libc::close(fid) }, 0);
    }

    #[test]
    fn presets_match_header() {
        assert_eq!(FILE_MAP_R_SHARED, 0x11);
        assert_eq!(FILE_MAP_W_SHARED, 0x12);
        assert_eq!(FILE_MAP_RW_SHARED, 0x13);
        assert_eq!(FILE_MAP_R_PRIVATE, 0x21);
        assert_eq!(FILE_MAP_W_PRIVATE, 0x22);
        assert_eq!(FILE_MAP_RW_PRIVATE, 0x23);
    }

    #[test]
    fn map_write_unmap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.bin");
        let name = c_path(&path);

        let mut map = empty_map(64);
        // SAFETY: both pointers are valid for the duration of the call.
        let status = unsafe { map_file(&mut map, name.as_ptr(), FILE_MAP_RW_SHARED) };
        assert_eq!(status, FILE_MAP_OK);
        assert_eq!(map.length, 64);
        assert!(map.fid >= 0);

        // SAFETY: the region is mapped read/write for `map.length` bytes.
        let region = unsafe { slice::from_raw_parts_mut(map.address as *mut u8, map.length) };
        region[..3].copy_from_slice(b"abc");

        // SAFETY: `map` came from a successful `map_file`.
        assert_eq!(unsafe { unmap_file(&mut map) }, FILE_MAP_OK);
        close(map.fid);

        let contents = fs::read(&path).unwrap();
        assert_eq!(contents.len(), 64);
        assert_eq!(&contents[..3], b"abc");
    }

    #[test]
    fn invalid_modes() {
        let dir = tempfile::tempdir().unwrap();
        let name = c_path(&dir.path().join("modes.bin"));
        for mode in [
            FILE_MAP_ACCESS_SHARED,
            FILE_MAP_ACCESS_PRIVATE,
            FILE_MAP_PROT_READ,
            FILE_MAP_PROT | FILE_MAP_ACCESS,
        ] {
            let mut map = empty_map(16);
            // SAFETY: both pointers are valid for the duration of the call.
            let status = unsafe { map_file(&mut map, name.as_ptr(), mode) };
            assert_eq!(status, FILE_MAP_ERROR);
            assert!(map.address.is_null());
        }
    }

    #[test]
    fn empty_file_without_length() {
        let dir = tempfile::tempdir().unwrap();
        let name = c_path(&dir.path().join("zero.bin"));
        let mut map = empty_map(0);
        // SAFETY: both pointers are valid for the duration of the call.
        let status = unsafe { map_file(&mut map, name.as_ptr(), FILE_MAP_R_PRIVATE) };
        assert_eq!(status, FILE_MAP_ERROR);
    }

    #[test]
    fn non_utf8_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut name = dir.path().as_os_str().as_bytes().to_vec();
        name.extend_from_slice(b"/caf\xe9.bin");
        let c_name = CString::new(name.clone()).unwrap();

        let mut map = empty_map(32);
        // SAFETY: both pointers are valid for the duration of the call.
        let status = unsafe { map_file(&mut map, c_name.as_ptr(), FILE_MAP_RW_PRIVATE) };
        assert_eq!(status, FILE_MAP_OK);
        assert_eq!(map.length, 32);
        // SAFETY: `map` came from a successful `map_file`.
        assert_eq!(unsafe { unmap_file(&mut map) }, FILE_MAP_OK);
        close(map.fid);

        let path = Path::new(OsStr::from_bytes(&name));
        assert_eq!(fs::metadata(path).unwrap().len(), 32);
    }

    #[test]
    fn null_pointers() {
        let name = CString::new("/tmp/unused").unwrap();
        // SAFETY: null pointers are checked before use.
        unsafe {
            assert_eq!(
                map_file(null_mut(), name.as_ptr(), FILE_MAP_RW_SHARED),
                FILE_MAP_ERROR
            );
            let mut map = empty_map(16);
            assert_eq!(
                map_file(&mut map, null(), FILE_MAP_RW_SHARED),
                FILE_MAP_ERROR
            );
            assert_eq!(unmap_file(null_mut()), FILE_MAP_ERROR);
        }
    }
}
