// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Mapping modes: a protection paired with an access kind.
//!
//! A `Mode` can only hold a valid combination. The compact bit encoding used at the C boundary
//! lives in [`bits`] and is decoded with [`Mode::from_bits`].

use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

use base::Access;
use base::Protection;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Bit encoding of a mode: one group for protection (combinable) and one for access (exactly
/// one bit).
pub mod bits {
    pub const PROT_READ: u32 = 0x01;
    pub const PROT_WRITE: u32 = 0x02;
    pub const PROT: u32 = 0x03;
    pub const ACCESS_SHARED: u32 = 0x10;
    pub const ACCESS_PRIVATE: u32 = 0x20;
    pub const ACCESS: u32 = 0x30;

    pub const R_SHARED: u32 = PROT_READ | ACCESS_SHARED;
    pub const W_SHARED: u32 = PROT_WRITE | ACCESS_SHARED;
    pub const RW_SHARED: u32 = PROT_READ | PROT_WRITE | ACCESS_SHARED;
    pub const R_PRIVATE: u32 = PROT_READ | ACCESS_PRIVATE;
    pub const W_PRIVATE: u32 = PROT_WRITE | ACCESS_PRIVATE;
    pub const RW_PRIVATE: u32 = PROT_READ | PROT_WRITE | ACCESS_PRIVATE;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ModeRepr", into = "ModeRepr")]
pub struct Mode {
    protection: Protection,
    access: Access,
}

// Serde goes through this so deserialized modes are validated like `Mode::new`.
#[derive(Serialize, Deserialize)]
struct ModeRepr {
    protection: Protection,
    access: Access,
}

impl TryFrom<ModeRepr> for Mode {
    type Error = Error;

    fn try_from(repr: ModeRepr) -> Result<Mode> {
        Mode::new(repr.protection, repr.access)
    }
}

impl From<Mode> for ModeRepr {
    fn from(mode: Mode) -> ModeRepr {
        ModeRepr {
            protection: mode.protection,
            access: mode.access,
        }
    }
}

impl Mode {
    /// Pairs `protection` with `access`. A mapping nobody may read or write is rejected.
    pub fn new(protection: Protection, access: Access) -> Result<Mode> {
        let mode = Mode { protection, access };
        if protection.is_none() {
            return Err(Error::NoProtection(mode.bits()));
        }
        Ok(mode)
    }

    /// Decodes the bit encoding. Bits outside `bits::PROT | bits::ACCESS` are ignored.
    pub fn from_bits(mode: u32) -> Result<Mode> {
        let mut protection = Protection::none();
        if mode & bits::PROT_READ != 0 {
            protection = protection.set_read();
        }
        if mode & bits::PROT_WRITE != 0 {
            protection = protection.set_write();
        }
        if protection.is_none() {
            return Err(Error::NoProtection(mode));
        }

        let access = match mode & bits::ACCESS {
            bits::ACCESS_SHARED => Access::Shared,
            bits::ACCESS_PRIVATE => Access::Private,
            _ => return Err(Error::BadAccess(mode)),
        };
        Ok(Mode { protection, access })
    }

    /// Encodes this mode with the constants in [`bits`].
    pub fn bits(&self) -> u32 {
        let mut mode = match self.access {
            Access::Shared => bits::ACCESS_SHARED,
            Access::Private => bits::ACCESS_PRIVATE,
        };
        if self.protection.is_readable() {
            mode |= bits::PROT_READ;
        }
        if self.protection.is_writable() {
            mode |= bits::PROT_WRITE;
        }
        mode
    }

    pub fn protection(&self) -> Protection {
        self.protection
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn read_shared() -> Mode {
        Mode {
            protection: Protection::read(),
            access: Access::Shared,
        }
    }

    pub fn write_shared() -> Mode {
        Mode {
            protection: Protection::write(),
            access: Access::Shared,
        }
    }

    pub fn read_write_shared() -> Mode {
        Mode {
            protection: Protection::read_write(),
            access: Access::Shared,
        }
    }

    pub fn read_private() -> Mode {
        Mode {
            protection: Protection::read(),
            access: Access::Private,
        }
    }

    pub fn write_private() -> Mode {
        Mode {
            protection: Protection::write(),
            access: Access::Private,
        }
    }

    pub fn read_write_private() -> Mode {
        Mode {
            protection: Protection::read_write(),
            access: Access::Private,
        }
    }
}

impl Default for Mode {
    fn default() -> Mode {
        Mode::read_write_shared()
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let prot = match (self.protection.is_readable(), self.protection.is_writable()) {
            (true, true) => "rw",
            (true, false) => "r",
            (false, true) => "w",
            (false, false) => "-",
        };
        let access = match self.access {
            Access::Shared => "shared",
            Access::Private => "private",
        };
        write!(f, "{}-{}", prot, access)
    }
}

impl FromStr for Mode {
    type Err = Error;

    /// Parses the names printed by `Display`: `r-shared`, `w-shared`, `rw-shared`,
    /// `r-private`, `w-private` or `rw-private`.
    fn from_str(s: &str) -> Result<Mode> {
        match s.to_ascii_lowercase().as_str() {
            "r-shared" => Ok(Mode::read_shared()),
            "w-shared" => Ok(Mode::write_shared()),
            "rw-shared" => Ok(Mode::read_write_shared()),
            "r-private" => Ok(Mode::read_private()),
            "w-private" => Ok(Mode::write_private()),
            "rw-private" => Ok(Mode::read_write_private()),
            _ => Err(Error::InvalidMode(s.to_owned())),
        }
    }
}
