// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
//! Handoff Sequencer.
//!
//! ```text
//! Preparing -> MapCaptured -> ServicesDisabling -> ServicesDisabled -> HandedOff
//!                                    |                   ^
//!                                    v                   |
//!                                 MapStale --(recapture, retry once)
//! ```
//!
//! Between a capture and the ExitBootServices call that presents its key,
//! nothing here allocates, frees or touches a protocol. Callers must keep
//! their logger off the firmware console for the same window.

use core::mem::transmute;

use log::{debug, error, warn};

use crate::elf::EntryPoint;
use crate::error::{LoadError, Result};
use crate::firmware::{MemoryMapSource, ServicesTerminator};
use crate::framebuffer::FrameBufferConfig;
use crate::memmap::{MemoryMap, read_memory_map};

/// Kernel entry: System V AMD64, whatever the loader itself was built with.
pub type KernelEntry = extern "sysv64" fn(&FrameBufferConfig) -> !;

/// ExitBootServices is presented a key at most this many times.
pub const MAX_EXIT_ATTEMPTS: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffState {
    Preparing,
    MapCaptured,
    ServicesDisabling,
    MapStale,
    ServicesDisabled,
    HandedOff,
}

pub struct HandoffSequencer<'buf, F> {
    firmware: F,
    map: MemoryMap<'buf>,
    state: HandoffState,
    attempts: u8,
}

/// Proof that boot services are gone; the only thing left to do is jump.
pub struct FirmwareDisabled<'buf> {
    map: MemoryMap<'buf>,
    attempts: u8,
}

impl<'buf, F> HandoffSequencer<'buf, F>
where
    F: MemoryMapSource + ServicesTerminator,
{
    pub fn new(firmware: F, buffer: &'buf mut [u8]) -> Self {
        HandoffSequencer {
            firmware,
            map: MemoryMap::new(buffer),
            state: HandoffState::Preparing,
            attempts: 0,
        }
    }

    pub fn state(&self) -> HandoffState {
        self.state
    }

    fn advance(&mut self, next: HandoffState) {
        debug!("[handoff] {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn capture(&mut self) -> Result<()> {
        read_memory_map(&mut self.firmware, &mut self.map)?;
        self.advance(HandoffState::MapCaptured);
        Ok(())
    }

    fn terminate(&mut self) -> core::result::Result<(), uefi::Status> {
        self.advance(HandoffState::ServicesDisabling);
        self.attempts += 1;
        let key = self.map.key();
        // SAFETY: the caller of `disable_firmware` accepted the post-exit contract.
        unsafe { self.firmware.exit_boot_services(key) }.map_err(|e| e.status())
    }

    /// Captures the map and exits boot services, re-capturing exactly once if
    /// the first key is rejected.
    ///
    /// # Safety
    /// On `Ok`, firmware boot services no longer exist: the caller must not
    /// allocate, free, log to the firmware console or open protocols again.
    /// On `Err` after a rejected exit the firmware may be half torn down and
    /// the only sane continuation is to halt.
    pub unsafe fn disable_firmware(mut self) -> Result<FirmwareDisabled<'buf>> {
        self.capture()?;

        while let Err(status) = self.terminate() {
            if self.attempts >= MAX_EXIT_ATTEMPTS {
                error!("[handoff] map key rejected again after recapture ({status:?})");
                return Err(LoadError::StaleMapKey { status });
            }
            self.advance(HandoffState::MapStale);
            warn!(
                "[handoff] map key {:#x} rejected ({:?}), recapturing",
                self.map.key().0,
                status
            );
            self.capture()
                .inspect_err(|e| error!("[handoff] recapture after stale key failed: {e}"))?;
        }

        self.advance(HandoffState::ServicesDisabled);
        Ok(FirmwareDisabled {
            map: self.map,
            attempts: self.attempts,
        })
    }
}

impl<'buf> FirmwareDisabled<'buf> {
    /// The snapshot whose key ExitBootServices accepted.
    pub fn memory_map(&self) -> &MemoryMap<'buf> {
        &self.map
    }

    pub fn exit_attempts(&self) -> u8 {
        self.attempts
    }

    /// Calls the kernel; never returns.
    ///
    /// # Safety
    /// `entry` must be the entry of a kernel already materialized at its
    /// link address, and `config` must stay where it is for the kernel's
    /// lifetime (the loader stack is reused as-is).
    pub unsafe fn hand_off(self, entry: EntryPoint, config: &FrameBufferConfig) -> ! {
        debug!("[handoff] {:?} -> {:?}", HandoffState::ServicesDisabled, HandoffState::HandedOff);
        debug!("[handoff] jumping to 0x{:x}", entry.addr());
        // SAFETY: per the contract above the address holds sysv64 code taking one pointer.
        let kernel: KernelEntry = unsafe { transmute::<usize, KernelEntry>(entry.addr() as usize) };
        kernel(config)
    }
}
