// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
//! The display description handed to the kernel.
//!
//! Layout is shared with `bifrost-kernel`'s `bootinfo` module; keep both
//! `#[repr(C)]` definitions in lockstep.

use uefi::proto::console::gop::PixelFormat as GopPixelFormat;

use crate::error::{LoadError, Result};

#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PixelFormat {
    RgbResv8BitPerColor = 0,
    BgrResv8BitPerColor = 1,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct FrameBufferConfig {
    pub frame_buffer: *mut u8,
    pub pixels_per_scan_line: u32,
    pub horizontal_resolution: u32,
    pub vertical_resolution: u32,
    pub pixel_format: PixelFormat,
}

impl FrameBufferConfig {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Builds the descriptor from a GOP mode; only 8-bit RGB/BGR modes pass.
    pub fn from_gop_mode(
        frame_buffer: *mut u8,
        resolution: (usize, usize),
        stride: usize,
        format: GopPixelFormat,
    ) -> Result<Self> {
        Ok(FrameBufferConfig {
            frame_buffer,
            pixels_per_scan_line: stride as u32,
            horizontal_resolution: resolution.0 as u32,
            vertical_resolution: resolution.1 as u32,
            pixel_format: pixel_format_from_gop(format)?,
        })
    }

    /// Bytes the kernel may touch: whole scan lines, padding included.
    pub fn size_bytes(&self) -> usize {
        self.pixels_per_scan_line as usize
            * self.vertical_resolution as usize
            * Self::BYTES_PER_PIXEL
    }
}

pub fn pixel_format_from_gop(format: GopPixelFormat) -> Result<PixelFormat> {
    match format {
        GopPixelFormat::Rgb => Ok(PixelFormat::RgbResv8BitPerColor),
        GopPixelFormat::Bgr => Ok(PixelFormat::BgrResv8BitPerColor),
        other => Err(LoadError::UnsupportedPixelFormat(other)),
    }
}
