// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
//! What the loader hands over. Mirrors `bifrostload::framebuffer` field for
//! field; the two must change together.

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
    pub pixels_per_scan_line: u32, // >= horizontal_resolution
    pub horizontal_resolution: u32,
    pub vertical_resolution: u32,
    pub pixel_format: PixelFormat,
}
