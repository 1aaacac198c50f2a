// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
//! Recording firmware fakes and an ELF64 writer for the unit tests.

use alloc::collections::VecDeque;
use alloc::vec;
use alloc::vec::Vec;
use core::mem::size_of;
use core::ptr;

use uefi::Status;
use uefi::mem::memory_map::{MemoryAttribute, MemoryDescriptor, MemoryType};

use crate::firmware::{MemoryMapSource, PageAllocator, ServicesTerminator};
use crate::memmap::{MapKey, MapMeta};

pub fn descriptor(ty: MemoryType, phys_start: u64, page_count: u64) -> MemoryDescriptor {
    MemoryDescriptor {
        ty,
        phys_start,
        virt_start: 0,
        page_count,
        att: MemoryAttribute::from_bits_retain(0xf),
    }
}

/// Lays `descs` out in `buf` at `stride` like GetMemoryMap would.
pub fn encode_map(
    buf: &mut [u8],
    descs: &[MemoryDescriptor],
    stride: usize,
    version: u32,
) -> MapMeta {
    assert!(stride >= size_of::<MemoryDescriptor>());
    for (i, d) in descs.iter().enumerate() {
        let rec = &mut buf[i * stride..i * stride + size_of::<MemoryDescriptor>()];
        unsafe { ptr::write_unaligned(rec.as_mut_ptr().cast::<MemoryDescriptor>(), *d) };
    }
    MapMeta {
        map_size: descs.len() * stride,
        map_key: MapKey(0),
        descriptor_size: stride,
        descriptor_version: version,
    }
}

/// GetMemoryMap/ExitBootServices fake.
///
/// Every successful capture hands out a new key; ExitBootServices pops its
/// scripted results and accepts once the script runs dry.
pub struct FakeMap {
    pub descs: Vec<MemoryDescriptor>,
    pub key: usize,
    pub calls: usize,
    pub fail_with: Option<Status>,
    /// Appended to the map after the first capture.
    pub grows_by: Vec<MemoryDescriptor>,
    pub exit_script: VecDeque<Status>,
    pub exit_keys: Vec<MapKey>,
}

impl FakeMap {
    pub const STRIDE: usize = 48;

    pub fn new(descs: Vec<MemoryDescriptor>) -> Self {
        Self {
            descs,
            key: 1,
            calls: 0,
            fail_with: None,
            grows_by: Vec::new(),
            exit_script: VecDeque::new(),
            exit_keys: Vec::new(),
        }
    }

    pub fn rejecting(mut self, times: usize) -> Self {
        self.exit_script.extend(core::iter::repeat_n(Status::INVALID_PARAMETER, times));
        self
    }
}

impl MemoryMapSource for FakeMap {
    fn get_memory_map(&mut self, buf: &mut [u8]) -> uefi::Result<MapMeta, usize> {
        self.calls += 1;
        if let Some(status) = self.fail_with {
            return Err(uefi::Error::new(status, 0));
        }
        let required = self.descs.len() * Self::STRIDE;
        if buf.len() < required {
            return Err(uefi::Error::new(Status::BUFFER_TOO_SMALL, required));
        }
        let mut meta = encode_map(buf, &self.descs, Self::STRIDE, 1);
        meta.map_key = MapKey(self.key);
        self.key += 1;
        if self.calls == 1 {
            let grown = core::mem::take(&mut self.grows_by);
            self.descs.extend(grown);
        }
        Ok(meta)
    }
}

impl ServicesTerminator for FakeMap {
    unsafe fn exit_boot_services(&mut self, key: MapKey) -> uefi::Result {
        self.exit_keys.push(key);
        match self.exit_script.pop_front() {
            Some(status) => Err(status.into()),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct FakePages {
    pub requests: Vec<(u64, usize)>,
    pub refuse: Option<Status>,
}

impl PageAllocator for FakePages {
    fn allocate_fixed(&mut self, base: u64, pages: usize) -> uefi::Result {
        self.requests.push((base, pages));
        match self.refuse {
            Some(status) => Err(status.into()),
            None => Ok(()),
        }
    }
}

pub const PT_LOAD: u32 = 1;
pub const PT_NOTE: u32 = 4;
pub const PT_GNU_STACK: u32 = 0x6474_e551;

const EHDR_SIZE: usize = 64;
const PHDR_SIZE: usize = 56;

struct Segment {
    kind: u32,
    vaddr: u64,
    data: Vec<u8>,
    mem_size: u64,
}

/// Minimal little-endian x86_64 ELF64 writer: header, program headers, then
/// each segment's file bytes.
pub struct ElfBuilder {
    entry: u64,
    machine: u16,
    phdr_padding: usize,
    phdr_entry_size: usize,
    segments: Vec<Segment>,
}

/// 8-byte aligned file image, the way the firmware pool hands it out.
pub struct ElfBytes {
    words: Vec<u64>,
    len: usize,
}

impl ElfBytes {
    pub fn bytes(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
    }
}

impl ElfBuilder {
    pub fn new(entry: u64) -> Self {
        Self {
            entry,
            machine: 0x3e,
            phdr_padding: 0,
            phdr_entry_size: PHDR_SIZE,
            segments: Vec::new(),
        }
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    /// Gap between the ELF header and the program-header table.
    pub fn phdr_padding(mut self, bytes: usize) -> Self {
        self.phdr_padding = bytes;
        self
    }

    pub fn phdr_entry_size(mut self, bytes: usize) -> Self {
        assert!(bytes >= PHDR_SIZE);
        self.phdr_entry_size = bytes;
        self
    }

    pub fn segment(mut self, kind: u32, vaddr: u64, data: &[u8], mem_size: u64) -> Self {
        self.segments.push(Segment {
            kind,
            vaddr,
            data: data.to_vec(),
            mem_size,
        });
        self
    }

    pub fn load(self, vaddr: u64, data: &[u8], mem_size: u64) -> Self {
        self.segment(PT_LOAD, vaddr, data, mem_size)
    }

    pub fn build(&self) -> ElfBytes {
        let phoff = EHDR_SIZE + self.phdr_padding;
        let mut data_off = phoff + self.segments.len() * self.phdr_entry_size;
        let mut out = vec![0u8; data_off];

        out[..4].copy_from_slice(b"\x7fELF");
        out[4] = 2; // ELFCLASS64
        out[5] = 1; // ELFDATA2LSB
        out[6] = 1; // EV_CURRENT
        put16(&mut out, 16, 2); // ET_EXEC
        put16(&mut out, 18, self.machine);
        put32(&mut out, 20, 1);
        put64(&mut out, 24, self.entry);
        put64(&mut out, 32, phoff as u64);
        put16(&mut out, 52, EHDR_SIZE as u16);
        put16(&mut out, 54, self.phdr_entry_size as u16);
        put16(&mut out, 56, self.segments.len() as u16);

        for (i, seg) in self.segments.iter().enumerate() {
            let at = phoff + i * self.phdr_entry_size;
            put32(&mut out, at, seg.kind);
            put32(&mut out, at + 4, 0x7);
            put64(&mut out, at + 8, data_off as u64);
            put64(&mut out, at + 16, seg.vaddr);
            put64(&mut out, at + 24, seg.vaddr);
            put64(&mut out, at + 32, seg.data.len() as u64);
            put64(&mut out, at + 40, seg.mem_size);
            put64(&mut out, at + 48, 0x1000);
            out.extend_from_slice(&seg.data);
            data_off += seg.data.len();
        }

        let len = out.len();
        let mut words = vec![0u64; len.div_ceil(8)];
        unsafe { ptr::copy_nonoverlapping(out.as_ptr(), words.as_mut_ptr().cast::<u8>(), len) };
        ElfBytes { words, len }
    }
}

fn put16(out: &mut [u8], at: usize, v: u16) {
    out[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put32(out: &mut [u8], at: usize, v: u32) {
    out[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

fn put64(out: &mut [u8], at: usize, v: u64) {
    out[at..at + 8].copy_from_slice(&v.to_le_bytes());
}

/// Distinct, non-zero filler so copied bytes are recognisable.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed) | 1).collect()
}
