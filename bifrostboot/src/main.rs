// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), no_main)]

extern crate alloc;

mod config;
mod display;
mod firmware;
mod serial;
mod volume;

use core::arch::asm;
use core::convert::Infallible;

use bifrostload::{
    HandoffSequencer, KernelImage, LoadError, MemoryMap, PlacementReservation, load_address_range,
    materialize, read_memory_map,
};
use log::{error, info, warn};
use uefi::boot;
use uefi::prelude::*;

use crate::firmware::UefiFirmware;

#[cfg(not(test))]
#[global_allocator]
static ALLOCATOR: uefi::allocator::Allocator = uefi::allocator::Allocator;

#[cfg(not(test))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    serial::panic_line(info);
    halt()
}

/// Firmware memory-map storage. Kept on the loader stack so capturing the
/// map never needs a pool allocation.
#[repr(C, align(8))]
struct MemoryMapBuffer([u8; config::MEMMAP_BUFFER_SIZE]);

#[cfg_attr(not(test), entry)]
fn main() -> Status {
    serial::init_logger();
    info!(">>> Bifrost loader entry");

    match boot() {
        Ok(never) => match never {},
        Err(err) => die(err),
    }
}

fn boot() -> Result<Infallible, LoadError> {
    let mut firmware = UefiFirmware::new(boot::image_handle());
    let mut storage = MemoryMapBuffer([0; config::MEMMAP_BUFFER_SIZE]);

    let mut fs = volume::open_boot_volume()?;

    {
        let mut map = MemoryMap::new(&mut storage.0);
        read_memory_map(&mut firmware, &mut map)?;
        info!(
            "memory map: {} descriptors, {} bytes, {} free pages",
            map.len(),
            map.map_size(),
            map.conventional_pages()
        );
        #[cfg(feature = "memmap-dump")]
        volume::save_memory_map(&mut fs, &map);
    }

    let kernel_file = volume::read_kernel(&mut fs)?;
    drop(fs);

    let frame_buffer = display::query_frame_buffer()?;

    let image = KernelImage::parse(&kernel_file)?;
    let range = load_address_range(&image)?;
    let mut reservation = PlacementReservation::reserve(range, &mut firmware)?;
    // SAFETY: `reserve` just obtained these pages at exactly `range.first`.
    materialize(&image, range, unsafe { reservation.as_mut_slice() })?;
    let entry = image.entry_point();
    info!("kernel entry: 0x{:x}", entry.addr());
    if !range.contains(entry.addr()) {
        warn!(
            "entry 0x{:x} is outside the loaded range 0x{:x} - 0x{:x}",
            entry.addr(),
            range.first,
            range.last
        );
    }

    // The file buffer goes back to the pool before the final capture.
    drop(kernel_file);

    serial::console_off();
    let sequencer = HandoffSequencer::new(&mut firmware, &mut storage.0);
    // SAFETY: from here on nothing allocates, frees or logs to the console.
    let disabled = unsafe { sequencer.disable_firmware() }?;
    info!(
        "boot services exited after {} attempt(s), {} descriptors handed over",
        disabled.exit_attempts(),
        disabled.memory_map().len()
    );

    // SAFETY: the kernel was materialized at its link address above, and
    // `frame_buffer` lives on this stack, which the kernel inherits.
    unsafe { disabled.hand_off(entry, &frame_buffer) }
}

#[cold]
fn die(err: LoadError) -> ! {
    error!("[fatal] {err}");
    halt()
}

fn halt() -> ! {
    loop {
        unsafe { asm!("hlt") };
    }
}
