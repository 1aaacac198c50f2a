// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
//! Executable Segment Analyzer.

use core::mem::{align_of, size_of};

use log::{debug, info};
use xmas_elf::ElfFile;
use xmas_elf::header::{Class, Data, Machine, Type as ElfType};
use xmas_elf::program::{ProgramHeader, ProgramHeader64, Type as PhType};

use crate::error::{LoadError, Result};

/// `e_entry` sits at this byte offset of an ELF64 header.
pub const ENTRY_OFFSET: usize = 24;
const EHDR64_SIZE: usize = 64;
const PH_ALIGN: usize = align_of::<ProgramHeader64>();

/// A fully read kernel file whose header and program-header table have been
/// checked against the buffer.
pub struct KernelImage<'a> {
    bytes: &'a [u8],
    elf: ElfFile<'a>,
}

/// One `PT_LOAD` entry. `mem_size >= file_size` holds for every value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadableSegment {
    pub vaddr: u64,
    pub offset: u64,
    pub file_size: u64,
    pub mem_size: u64,
}

impl LoadableSegment {
    fn from_header(ph: &ProgramHeader<'_>) -> Result<Self> {
        let seg = LoadableSegment {
            vaddr: ph.virtual_addr(),
            offset: ph.offset(),
            file_size: ph.file_size(),
            mem_size: ph.mem_size(),
        };
        if seg.mem_size < seg.file_size {
            return Err(LoadError::MalformedExecutable("segment memsz < filesz"));
        }
        if seg.vaddr.checked_add(seg.mem_size).is_none() {
            return Err(LoadError::MalformedExecutable("segment wraps the address space"));
        }
        Ok(seg)
    }

    pub fn end(&self) -> u64 {
        self.vaddr + self.mem_size
    }

    /// Bytes past the file image that read as zero.
    pub fn zero_fill(&self) -> u64 {
        self.mem_size - self.file_size
    }
}

/// `[first, last)` covering every loadable segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    pub first: u64,
    pub last: u64,
}

impl AddressRange {
    /// Fold identity; what an image without `PT_LOAD` entries produces.
    pub const EMPTY: AddressRange = AddressRange {
        first: u64::MAX,
        last: 0,
    };

    pub fn is_empty(&self) -> bool {
        self.last <= self.first
    }

    pub fn span(&self) -> u64 {
        self.last.saturating_sub(self.first)
    }

    pub fn contains(&self, addr: u64) -> bool {
        (self.first..self.last).contains(&addr)
    }

    fn cover(self, seg: &LoadableSegment) -> Self {
        AddressRange {
            first: self.first.min(seg.vaddr),
            last: self.last.max(seg.end()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint(pub u64);

impl EntryPoint {
    pub fn addr(self) -> u64 {
        self.0
    }
}

impl<'a> KernelImage<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < EHDR64_SIZE {
            return Err(LoadError::MalformedExecutable("shorter than an ELF64 header"));
        }
        // xmas-elf reads headers in place and asserts their alignment.
        if bytes.as_ptr().align_offset(PH_ALIGN) != 0 {
            return Err(LoadError::MalformedExecutable("file buffer not 8-byte aligned"));
        }
        let elf = ElfFile::new(bytes).map_err(LoadError::MalformedExecutable)?;
        if elf.header.pt1.class() != Class::SixtyFour
            || elf.header.pt1.data() != Data::LittleEndian
            || elf.header.pt2.machine().as_machine() != Machine::X86_64
        {
            return Err(LoadError::MalformedExecutable("not a little-endian x86_64 ELF64"));
        }

        let pt2 = &elf.header.pt2;
        let count = pt2.ph_count() as u64;
        let entry_size = pt2.ph_entry_size() as u64;
        if count > 0 && entry_size < size_of::<ProgramHeader64>() as u64 {
            return Err(LoadError::MalformedExecutable("program header entry too small"));
        }
        if pt2.ph_offset() % PH_ALIGN as u64 != 0 || entry_size % PH_ALIGN as u64 != 0 {
            return Err(LoadError::MalformedExecutable("misaligned program headers"));
        }
        let table_end = count
            .checked_mul(entry_size)
            .and_then(|len| len.checked_add(pt2.ph_offset()));
        match table_end {
            Some(end) if end <= bytes.len() as u64 => {}
            _ => return Err(LoadError::MalformedExecutable("program headers past end of file")),
        }

        debug!(
            "[elf] type={} phoff=0x{:x} phnum={}",
            match pt2.type_().as_type() {
                ElfType::Executable => "EXEC",
                ElfType::SharedObject => "DYN",
                _ => "OTHER",
            },
            pt2.ph_offset(),
            count
        );
        Ok(KernelImage { bytes, elf })
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Walks the program-header table once, yielding `PT_LOAD` entries only.
    pub fn loadable_segments(&self) -> impl Iterator<Item = Result<LoadableSegment>> + '_ {
        self.elf
            .program_iter()
            .filter(|ph| ph.get_type().ok() == Some(PhType::Load))
            .map(|ph| LoadableSegment::from_header(&ph))
    }

    pub fn entry_point(&self) -> EntryPoint {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.bytes[ENTRY_OFFSET..ENTRY_OFFSET + 8]);
        EntryPoint(u64::from_le_bytes(raw))
    }
}

/// Minimal `[first, last)` spanning every `PT_LOAD` segment.
///
/// An image without loadable segments comes back as [`AddressRange::EMPTY`];
/// rejecting it is the placement step's job.
pub fn load_address_range(image: &KernelImage<'_>) -> Result<AddressRange> {
    let mut range = AddressRange::EMPTY;
    for seg in image.loadable_segments() {
        let seg = seg?;
        debug!(
            "[elf] PT_LOAD vaddr=0x{:x} off=0x{:x} filesz=0x{:x} memsz=0x{:x}",
            seg.vaddr, seg.offset, seg.file_size, seg.mem_size
        );
        range = range.cover(&seg);
    }
    if !range.is_empty() {
        info!("[elf] load range 0x{:x} - 0x{:x}", range.first, range.last);
    }
    Ok(range)
}
