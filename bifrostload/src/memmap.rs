// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
//! Memory Map Reader.
//!
//! The map lands in a caller-owned buffer; the firmware reports the map key,
//! descriptor stride and version alongside it in the same call.

use core::fmt::{self, Write};
use core::mem::size_of;
use core::ptr;

use log::trace;
use uefi::Status;
use uefi::mem::memory_map::{MemoryDescriptor, MemoryType};

use crate::error::{LoadError, Result};
use crate::firmware::MemoryMapSource;

/// Freshness token for one memory-map snapshot.
///
/// Invalidated by any firmware-side change to the map; it has to be
/// re-captured right before the call that consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MapKey(pub usize);

/// What a single `GetMemoryMap` call reports next to the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MapMeta {
    pub map_size: usize,
    pub map_key: MapKey,
    pub descriptor_size: usize,
    pub descriptor_version: u32,
}

pub struct MemoryMap<'buf> {
    buffer: &'buf mut [u8],
    meta: MapMeta,
}

impl<'buf> MemoryMap<'buf> {
    pub fn new(buffer: &'buf mut [u8]) -> Self {
        Self {
            buffer,
            meta: MapMeta::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes of the buffer the firmware actually wrote.
    pub fn map_size(&self) -> usize {
        self.meta.map_size
    }

    pub fn key(&self) -> MapKey {
        self.meta.map_key
    }

    pub fn descriptor_size(&self) -> usize {
        self.meta.descriptor_size
    }

    pub fn descriptor_version(&self) -> u32 {
        self.meta.descriptor_version
    }

    pub fn len(&self) -> usize {
        if self.meta.descriptor_size == 0 {
            return 0;
        }
        self.meta.map_size / self.meta.descriptor_size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decodes the records at the firmware-reported stride.
    ///
    /// A stride shorter than `MemoryDescriptor` yields nothing rather than
    /// reading past a record.
    pub fn descriptors(&self) -> impl Iterator<Item = MemoryDescriptor> + '_ {
        let stride = self.meta.descriptor_size;
        let count = if stride < size_of::<MemoryDescriptor>() {
            0
        } else {
            self.len()
        };
        let bytes = &self.buffer[..self.meta.map_size.min(self.buffer.len())];
        (0..count).filter_map(move |i| {
            let rec = bytes.get(i * stride..i * stride + size_of::<MemoryDescriptor>())?;
            // SAFETY: `rec` spans a whole descriptor; the buffer carries no alignment promise.
            Some(unsafe { ptr::read_unaligned(rec.as_ptr().cast::<MemoryDescriptor>()) })
        })
    }

    /// Free (`EfiConventionalMemory`) pages in the snapshot.
    pub fn conventional_pages(&self) -> u64 {
        self.descriptors()
            .filter(|d| d.ty == MemoryType::CONVENTIONAL)
            .map(|d| d.page_count)
            .sum()
    }
}

/// Fills `map` with the current memory map in one firmware call.
///
/// There is no regrowth: a map that does not fit is reported as
/// [`LoadError::BufferTooSmall`] and left to the caller.
pub fn read_memory_map<F: MemoryMapSource + ?Sized>(
    fw: &mut F,
    map: &mut MemoryMap<'_>,
) -> Result<()> {
    if map.buffer.is_empty() {
        return Err(LoadError::BufferTooSmall {
            capacity: 0,
            required: 0,
        });
    }

    match fw.get_memory_map(&mut map.buffer[..]) {
        Ok(meta) => {
            map.meta = meta;
            trace!(
                "[memmap] key={:#x} size={} stride={} version={}",
                meta.map_key.0,
                meta.map_size,
                meta.descriptor_size,
                meta.descriptor_version
            );
            Ok(())
        }
        Err(e) if e.status() == Status::BUFFER_TOO_SMALL => Err(LoadError::BufferTooSmall {
            capacity: map.buffer.len(),
            required: *e.data(),
        }),
        Err(e) => Err(LoadError::Firmware {
            op: "GetMemoryMap",
            status: e.status(),
        }),
    }
}

pub fn memory_type_name(ty: MemoryType) -> &'static str {
    match ty {
        MemoryType::RESERVED => "EfiReservedMemoryType",
        MemoryType::LOADER_CODE => "EfiLoaderCode",
        MemoryType::LOADER_DATA => "EfiLoaderData",
        MemoryType::BOOT_SERVICES_CODE => "EfiBootServicesCode",
        MemoryType::BOOT_SERVICES_DATA => "EfiBootServicesData",
        MemoryType::RUNTIME_SERVICES_CODE => "EfiRuntimeServicesCode",
        MemoryType::RUNTIME_SERVICES_DATA => "EfiRuntimeServicesData",
        MemoryType::CONVENTIONAL => "EfiConventionalMemory",
        MemoryType::UNUSABLE => "EfiUnusableMemory",
        MemoryType::ACPI_RECLAIM => "EfiACPIReclaimMemory",
        MemoryType::ACPI_NON_VOLATILE => "EfiACPIMemoryNVS",
        MemoryType::MMIO => "EfiMemoryMappedIO",
        MemoryType::MMIO_PORT_SPACE => "EfiMemoryMappedIOPortSpace",
        MemoryType::PAL_CODE => "EfiPalCode",
        MemoryType::PERSISTENT_MEMORY => "EfiPersistentMemory",
        _ => "InvalidMemoryType",
    }
}

pub const CSV_HEADER: &str = "Index, Type, Type(name), PhysicalStart, NumberOfPages, Attribute\n";

/// Renders the snapshot as the `\memmap` CSV dump.
pub fn write_csv<W: Write>(map: &MemoryMap<'_>, out: &mut W) -> fmt::Result {
    out.write_str(CSV_HEADER)?;
    for (i, d) in map.descriptors().enumerate() {
        writeln!(
            out,
            "{}, {:x}, {}, {:08x}, {:x}, {:x}",
            i,
            d.ty.0,
            memory_type_name(d.ty),
            d.phys_start,
            d.page_count,
            d.att.bits() & 0xfffff
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeMap, descriptor, encode_map};
    use alloc::string::String;
    use alloc::vec;

    #[test]
    fn empty_buffer_is_rejected_without_calling_firmware() {
        let mut fw = FakeMap::new(vec![descriptor(MemoryType::CONVENTIONAL, 0x1000, 4)]);
        let mut buf = [0u8; 0];
        let mut map = MemoryMap::new(&mut buf);

        let err = read_memory_map(&mut fw, &mut map).unwrap_err();
        assert_eq!(
            err,
            LoadError::BufferTooSmall {
                capacity: 0,
                required: 0
            }
        );
        assert_eq!(fw.calls, 0);
    }

    #[test]
    fn undersized_buffer_reports_required_size() {
        let descs = vec![
            descriptor(MemoryType::CONVENTIONAL, 0x1000, 4),
            descriptor(MemoryType::LOADER_DATA, 0x10_0000, 16),
        ];
        let mut fw = FakeMap::new(descs);
        let mut buf = [0u8; 32];
        let mut map = MemoryMap::new(&mut buf);

        let err = read_memory_map(&mut fw, &mut map).unwrap_err();
        assert_eq!(
            err,
            LoadError::BufferTooSmall {
                capacity: 32,
                required: 2 * FakeMap::STRIDE
            }
        );
        assert_eq!(fw.calls, 1);
    }

    #[test]
    fn success_populates_key_stride_and_version() {
        let descs = vec![
            descriptor(MemoryType::BOOT_SERVICES_DATA, 0, 1),
            descriptor(MemoryType::CONVENTIONAL, 0x1000, 0x9f),
            descriptor(MemoryType::CONVENTIONAL, 0x10_0000, 0x700),
        ];
        let mut fw = FakeMap::new(descs);
        fw.key = 0x42;
        let mut buf = [0u8; 4096];
        let mut map = MemoryMap::new(&mut buf);

        read_memory_map(&mut fw, &mut map).unwrap();

        assert_eq!(map.key(), MapKey(0x42));
        assert_eq!(map.descriptor_size(), FakeMap::STRIDE);
        assert_eq!(map.descriptor_version(), 1);
        assert_eq!(map.map_size(), 3 * FakeMap::STRIDE);
        assert_eq!(map.len(), 3);
        assert_eq!(map.conventional_pages(), 0x9f + 0x700);
    }

    #[test]
    fn other_firmware_errors_are_not_sizing_errors() {
        let mut fw = FakeMap::new(vec![]);
        fw.fail_with = Some(Status::INVALID_PARAMETER);
        let mut buf = [0u8; 64];
        let mut map = MemoryMap::new(&mut buf);

        let err = read_memory_map(&mut fw, &mut map).unwrap_err();
        assert_eq!(
            err,
            LoadError::Firmware {
                op: "GetMemoryMap",
                status: Status::INVALID_PARAMETER
            }
        );
    }

    #[test]
    fn descriptors_honor_the_reported_stride() {
        let descs = [
            descriptor(MemoryType::LOADER_CODE, 0x20_0000, 2),
            descriptor(MemoryType::MMIO, 0xfee0_0000, 1),
        ];
        let mut buf = vec![0u8; 256];
        let meta = encode_map(&mut buf, &descs, 64, 7);
        let mut map = MemoryMap::new(&mut buf);
        map.meta = meta;

        let decoded: alloc::vec::Vec<_> = map.descriptors().collect();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].ty, MemoryType::LOADER_CODE);
        assert_eq!(decoded[1].phys_start, 0xfee0_0000);
    }

    #[test]
    fn csv_dump_matches_the_memmap_file_format() {
        let descs = [
            descriptor(MemoryType::CONVENTIONAL, 0x1000, 0x9f),
            descriptor(MemoryType(0x7000_0000), 0xff00_0000, 1),
        ];
        let mut buf = vec![0u8; 256];
        let meta = encode_map(&mut buf, &descs, FakeMap::STRIDE, 1);
        let mut map = MemoryMap::new(&mut buf);
        map.meta = meta;

        let mut out = String::new();
        write_csv(&map, &mut out).unwrap();

        let mut lines = out.lines();
        assert_eq!(
            lines.next(),
            Some("Index, Type, Type(name), PhysicalStart, NumberOfPages, Attribute")
        );
        assert_eq!(lines.next(), Some("0, 7, EfiConventionalMemory, 00001000, 9f, f"));
        assert_eq!(lines.next(), Some("1, 70000000, InvalidMemoryType, ff000000, 1, f"));
        assert_eq!(lines.next(), None);
    }
}
