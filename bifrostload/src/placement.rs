// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
//! Placement Allocator.
//!
//! The kernel is position-dependent, so its range is reserved at exactly the
//! linked address or not at all.

use core::slice;

use log::info;

use crate::elf::AddressRange;
use crate::error::{LoadError, Result};
use crate::firmware::PageAllocator;

pub const PAGE_SIZE: u64 = 0x1000;

#[inline]
pub fn pages_for(span: u64) -> usize {
    span.div_ceil(PAGE_SIZE) as usize
}

/// Page-granular physical region at `AddressRange::first`.
///
/// Never freed: ownership moves to the kernel at handoff.
#[derive(Debug, PartialEq, Eq)]
pub struct PlacementReservation {
    base: u64,
    pages: usize,
    len: usize,
}

impl PlacementReservation {
    /// Sizes the reservation without touching firmware.
    pub fn plan(range: AddressRange) -> Result<Self> {
        if range.is_empty() {
            return Err(LoadError::MalformedExecutable("no loadable segments"));
        }
        let span = range.span();
        Ok(PlacementReservation {
            base: range.first,
            pages: pages_for(span),
            len: span as usize,
        })
    }

    pub fn reserve<A: PageAllocator + ?Sized>(range: AddressRange, alloc: &mut A) -> Result<Self> {
        let plan = Self::plan(range)?;
        alloc
            .allocate_fixed(plan.base, plan.pages)
            .map_err(|e| LoadError::PlacementConflict {
                base: plan.base,
                pages: plan.pages,
                status: e.status(),
            })?;
        info!(
            "[place] reserved {} pages at 0x{:x} (0x{:x} bytes used)",
            plan.pages, plan.base, plan.len
        );
        Ok(plan)
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Bytes covered by the load range; the tail of the last page is excluded.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// # Safety
    /// The reservation must have come from [`PlacementReservation::reserve`]
    /// against a firmware that really mapped `[base, base + len)` 1:1.
    pub unsafe fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.base as usize as *mut u8, self.len) }
    }
}
