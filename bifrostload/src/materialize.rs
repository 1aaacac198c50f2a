// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
//! Segment Materializer.

use log::trace;

use crate::elf::{AddressRange, KernelImage, LoadableSegment};
use crate::error::{LoadError, Result};

/// Copies every `PT_LOAD` segment into `dest` and zeroes its `.bss` tail.
///
/// `dest` stands for memory `[range.first, range.first + dest.len())`,
/// normally the slice of a [`PlacementReservation`](crate::PlacementReservation).
/// Nothing past `vaddr + mem_size` of a segment is written.
pub fn materialize(image: &KernelImage<'_>, range: AddressRange, dest: &mut [u8]) -> Result<()> {
    let file = image.bytes();
    for seg in image.loadable_segments() {
        let seg = seg?;
        let (src, dst) = locate(file, range, dest, &seg)?;
        let (copied, tail) = dst.split_at_mut(src.len());
        copied.copy_from_slice(src);
        tail.fill(0);
        trace!(
            "[load] 0x{:x}: copied 0x{:x}, zeroed 0x{:x}",
            seg.vaddr,
            seg.file_size,
            seg.zero_fill()
        );
    }
    Ok(())
}

fn locate<'f, 'd>(
    file: &'f [u8],
    range: AddressRange,
    dest: &'d mut [u8],
    seg: &LoadableSegment,
) -> Result<(&'f [u8], &'d mut [u8])> {
    let src = usize::try_from(seg.offset)
        .ok()
        .zip(usize::try_from(seg.file_size).ok())
        .and_then(|(off, len)| file.get(off..off.checked_add(len)?))
        .ok_or(LoadError::MalformedExecutable("segment file data past end of file"))?;

    let dst = seg
        .vaddr
        .checked_sub(range.first)
        .and_then(|rel| usize::try_from(rel).ok())
        .zip(usize::try_from(seg.mem_size).ok())
        .and_then(|(rel, len)| dest.get_mut(rel..rel.checked_add(len)?))
        .ok_or(LoadError::MalformedExecutable("segment outside the load range"))?;

    Ok((src, dst))
}
