// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
//! Boot-volume access: the kernel file and the memory-map dump.

use alloc::vec::Vec;

use bifrostload::LoadError;
use log::{error, info};
use uefi::Status;
use uefi::boot;
use uefi::fs::FileSystem;

use crate::config;

/// The file system of the device this image was loaded from.
pub fn open_boot_volume() -> Result<FileSystem, LoadError> {
    match boot::get_image_file_system(boot::image_handle()) {
        Ok(p) => Ok(p.into()),
        Err(e) => Err(LoadError::ResourceUnavailable {
            what: "boot volume",
            status: e.status(),
        }),
    }
}

/// Reads the whole kernel into one pool buffer.
pub fn read_kernel(fs: &mut FileSystem) -> Result<Vec<u8>, LoadError> {
    match fs.read(config::kernel_path()) {
        Ok(bytes) => {
            info!("kernel file: {} bytes", bytes.len());
            Ok(bytes)
        }
        Err(e) => {
            error!("read {} failed: {:?}", config::kernel_path(), e);
            Err(LoadError::ResourceUnavailable {
                what: "kernel file",
                status: Status::NOT_FOUND,
            })
        }
    }
}

#[cfg(feature = "memmap-dump")]
pub fn save_memory_map(fs: &mut FileSystem, map: &bifrostload::MemoryMap<'_>) {
    use alloc::string::String;
    use log::warn;

    let mut csv = String::new();
    if bifrostload::memmap::write_csv(map, &mut csv).is_err() {
        warn!("memory map dump: formatting failed");
        return;
    }
    match fs.write(config::memmap_path(), csv.as_bytes()) {
        Ok(()) => info!("memory map dumped to {} ({} bytes)", config::memmap_path(), csv.len()),
        Err(e) => warn!("memory map dump to {} failed: {:?}", config::memmap_path(), e),
    }
}
