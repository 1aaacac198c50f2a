// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
use log::LevelFilter;
use uefi::cstr16;
use uefi::fs::Path;

/// Room for the firmware memory map; fixed at build time, never regrown.
pub const MEMMAP_BUFFER_SIZE: usize = 4096 * 4;

pub const LOG_LEVEL: LevelFilter = if cfg!(feature = "verbose") {
    LevelFilter::Trace
} else {
    LevelFilter::Info
};

pub fn kernel_path() -> &'static Path {
    Path::new(cstr16!(r"\kernel.elf"))
}

#[cfg(feature = "memmap-dump")]
pub fn memmap_path() -> &'static Path {
    Path::new(cstr16!(r"\memmap"))
}
