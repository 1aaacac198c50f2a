// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
//! The three boot-services calls the core depends on.
//!
//! Errors are plain `uefi::Error`s so an implementation can forward whatever
//! status the firmware returned; the core decides what each status means.

use crate::memmap::{MapKey, MapMeta};

pub trait MemoryMapSource {
    /// One `GetMemoryMap` call into `buf`.
    ///
    /// On `BUFFER_TOO_SMALL` the error data carries the size the firmware
    /// asked for.
    fn get_memory_map(&mut self, buf: &mut [u8]) -> uefi::Result<MapMeta, usize>;
}

pub trait PageAllocator {
    /// `AllocatePages(AllocateAddress, LoaderData, pages, base)`.
    fn allocate_fixed(&mut self, base: u64, pages: usize) -> uefi::Result;
}

pub trait ServicesTerminator {
    /// `ExitBootServices(image, key)`.
    ///
    /// # Safety
    /// On success no boot service, protocol or pool allocation may be used
    /// again, including through the global allocator.
    unsafe fn exit_boot_services(&mut self, key: MapKey) -> uefi::Result;
}

impl<T: MemoryMapSource + ?Sized> MemoryMapSource for &mut T {
    fn get_memory_map(&mut self, buf: &mut [u8]) -> uefi::Result<MapMeta, usize> {
        (**self).get_memory_map(buf)
    }
}

impl<T: PageAllocator + ?Sized> PageAllocator for &mut T {
    fn allocate_fixed(&mut self, base: u64, pages: usize) -> uefi::Result {
        (**self).allocate_fixed(base, pages)
    }
}

impl<T: ServicesTerminator + ?Sized> ServicesTerminator for &mut T {
    unsafe fn exit_boot_services(&mut self, key: MapKey) -> uefi::Result {
        unsafe { (**self).exit_boot_services(key) }
    }
}
