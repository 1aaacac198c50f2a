// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
//! Load-and-handoff core of the Bifrost loader.
//!
//! Everything here is firmware-agnostic: the UEFI calls it needs come in
//! through the traits in [`firmware`], so the whole sequence runs on the
//! host under test with recording fakes.
#![cfg_attr(not(test), no_std)]

#[cfg(test)]
extern crate alloc;

pub mod elf;
pub mod error;
pub mod firmware;
pub mod framebuffer;
pub mod handoff;
pub mod materialize;
pub mod memmap;
pub mod placement;

#[cfg(test)]
mod testing;

pub use elf::{AddressRange, EntryPoint, KernelImage, LoadableSegment, load_address_range};
pub use error::{LoadError, Result};
pub use firmware::{MemoryMapSource, PageAllocator, ServicesTerminator};
pub use framebuffer::{FrameBufferConfig, PixelFormat};
pub use handoff::{FirmwareDisabled, HandoffSequencer, HandoffState};
pub use materialize::materialize;
pub use memmap::{MapKey, MapMeta, MemoryMap, read_memory_map};
pub use placement::{PAGE_SIZE, PlacementReservation};
