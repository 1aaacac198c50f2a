// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
use core::fmt;

use uefi::Status;
use uefi::proto::console::gop::PixelFormat as GopPixelFormat;

/// Every way the load-and-handoff path can fail.
///
/// None of these are recoverable: the loader surfaces the diagnostic and
/// halts. The only bounded retry (stale map key) happens inside the handoff
/// sequencer before [`LoadError::StaleMapKey`] is ever produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    /// A firmware protocol, volume or file is not present.
    ResourceUnavailable { what: &'static str, status: Status },
    /// The memory-map buffer is degenerate or smaller than the map.
    BufferTooSmall { capacity: usize, required: usize },
    /// The kernel image violates the ELF64 segment contract.
    MalformedExecutable(&'static str),
    /// The link-time physical range could not be reserved.
    PlacementConflict {
        base: u64,
        pages: usize,
        status: Status,
    },
    /// ExitBootServices rejected the map key twice.
    StaleMapKey { status: Status },
    /// The display mode is neither RGB nor BGR with 8 bits per channel.
    UnsupportedPixelFormat(GopPixelFormat),
    /// Any other firmware call that reported an error.
    Firmware { op: &'static str, status: Status },
}

pub type Result<T> = core::result::Result<T, LoadError>;

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::ResourceUnavailable { what, status } => {
                write!(f, "{what} unavailable: {status:?}")
            }
            LoadError::BufferTooSmall { capacity, required } => write!(
                f,
                "memory map buffer too small: capacity={capacity} required={required}"
            ),
            LoadError::MalformedExecutable(why) => write!(f, "malformed kernel ELF: {why}"),
            LoadError::PlacementConflict {
                base,
                pages,
                status,
            } => write!(
                f,
                "cannot reserve {pages} pages at 0x{base:x}: {status:?}"
            ),
            LoadError::StaleMapKey { status } => {
                write!(f, "ExitBootServices rejected the map key twice: {status:?}")
            }
            LoadError::UnsupportedPixelFormat(fmt) => {
                write!(f, "unimplemented pixel format: {fmt:?}")
            }
            LoadError::Firmware { op, status } => write!(f, "{op} failed: {status:?}"),
        }
    }
}
