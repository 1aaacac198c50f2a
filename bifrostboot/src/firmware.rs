// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
//! The loader core's firmware seams over real UEFI boot services.
//!
//! GetMemoryMap and ExitBootServices go through the raw boot-services table
//! so the handoff sequencer owns the map key and decides when to retry.

use bifrostload::{MapKey, MapMeta, MemoryMapSource, PageAllocator, ServicesTerminator};
use uefi::boot::{self, AllocateType, MemoryType};
use uefi::{Handle, Status};

pub struct UefiFirmware {
    image: Handle,
}

impl UefiFirmware {
    pub fn new(image: Handle) -> Self {
        UefiFirmware { image }
    }
}

impl MemoryMapSource for UefiFirmware {
    fn get_memory_map(&mut self, buf: &mut [u8]) -> uefi::Result<MapMeta, usize> {
        let st = uefi::table::system_table_raw().ok_or(uefi::Error::new(Status::UNSUPPORTED, 0))?;
        // SAFETY: the entry point installed the system table; boot services are still live.
        let bs = unsafe { st.as_ref().boot_services };
        if bs.is_null() {
            return Err(uefi::Error::new(Status::UNSUPPORTED, 0));
        }

        let mut map_size = buf.len();
        let mut map_key = 0usize;
        let mut descriptor_size = 0usize;
        let mut descriptor_version = 0u32;
        let status = unsafe {
            ((*bs).get_memory_map)(
                &mut map_size,
                buf.as_mut_ptr().cast(),
                &mut map_key,
                &mut descriptor_size,
                &mut descriptor_version,
            )
        };
        if status.is_success() {
            Ok(MapMeta {
                map_size,
                map_key: MapKey(map_key),
                descriptor_size,
                descriptor_version,
            })
        } else {
            // On BUFFER_TOO_SMALL the firmware wrote the size it needs.
            Err(uefi::Error::new(status, map_size))
        }
    }
}

impl PageAllocator for UefiFirmware {
    fn allocate_fixed(&mut self, base: u64, pages: usize) -> uefi::Result {
        boot::allocate_pages(AllocateType::Address(base), MemoryType::LOADER_DATA, pages)
            .map(|_| ())
    }
}

impl ServicesTerminator for UefiFirmware {
    unsafe fn exit_boot_services(&mut self, key: MapKey) -> uefi::Result {
        let st = uefi::table::system_table_raw().ok_or(Status::UNSUPPORTED)?;
        let bs = unsafe { st.as_ref().boot_services };
        if bs.is_null() {
            return Err(Status::UNSUPPORTED.into());
        }
        let status = unsafe { ((*bs).exit_boot_services)(self.image.as_ptr(), key.0) };
        if status.is_success() {
            Ok(())
        } else {
            Err(status.into())
        }
    }
}
