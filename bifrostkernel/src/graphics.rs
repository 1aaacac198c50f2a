// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
//! Pixel output on the loader-provided linear frame buffer.

use core::ops::{Add, AddAssign};
use core::ptr::NonNull;

use volatile::VolatilePtr;

use crate::bootinfo::{FrameBufferConfig, PixelFormat};

const BYTES_PER_PIXEL: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl PixelColor {
    pub const WHITE: PixelColor = PixelColor { r: 255, g: 255, b: 255 };
    pub const BLACK: PixelColor = PixelColor { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        PixelColor { r, g, b }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Vector2D<T> {
    pub x: T,
    pub y: T,
}

impl<T> Vector2D<T> {
    pub const fn new(x: T, y: T) -> Self {
        Vector2D { x, y }
    }
}

impl<T: AddAssign> AddAssign for Vector2D<T> {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl<T: Add<Output = T>> Add for Vector2D<T> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Vector2D::new(self.x + rhs.x, self.y + rhs.y)
    }
}

/// Geometry of the surface plus its base; copied out of the boot config so
/// nothing here borrows the loader's stack.
#[derive(Debug)]
pub struct FrameBuffer {
    base: NonNull<u8>,
    stride: usize,
    width: usize,
    height: usize,
}

impl FrameBuffer {
    fn offset_of(&self, x: i32, y: i32) -> Option<usize> {
        let (x, y) = (usize::try_from(x).ok()?, usize::try_from(y).ok()?);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y * self.stride + x) * BYTES_PER_PIXEL)
    }

    fn put(&self, offset: usize, bytes: [u8; 3]) {
        for (i, b) in bytes.into_iter().enumerate() {
            // SAFETY: `offset_of` keeps every pixel inside stride * height.
            unsafe { VolatilePtr::new(self.base.add(offset + i)).write(b) };
        }
    }
}

/// One variant per channel layout the loader accepts.
#[derive(Debug)]
pub enum PixelWriter {
    Rgb(FrameBuffer),
    Bgr(FrameBuffer),
}

impl PixelWriter {
    /// `None` if the loader passed a null frame buffer.
    ///
    /// # Safety
    /// `config` must describe memory that is mapped and writable for
    /// `pixels_per_scan_line * vertical_resolution` pixels of 4 bytes, and
    /// nothing else may write it while the writer is alive.
    pub unsafe fn new(config: &FrameBufferConfig) -> Option<Self> {
        let fb = FrameBuffer {
            base: NonNull::new(config.frame_buffer)?,
            stride: config.pixels_per_scan_line as usize,
            width: config.horizontal_resolution as usize,
            height: config.vertical_resolution as usize,
        };
        Some(match config.pixel_format {
            PixelFormat::RgbResv8BitPerColor => PixelWriter::Rgb(fb),
            PixelFormat::BgrResv8BitPerColor => PixelWriter::Bgr(fb),
        })
    }

    fn frame_buffer(&self) -> &FrameBuffer {
        match self {
            PixelWriter::Rgb(fb) | PixelWriter::Bgr(fb) => fb,
        }
    }

    pub fn width(&self) -> i32 {
        self.frame_buffer().width as i32
    }

    pub fn height(&self) -> i32 {
        self.frame_buffer().height as i32
    }

    /// Off-screen coordinates are dropped.
    pub fn write(&self, x: i32, y: i32, c: PixelColor) {
        let fb = self.frame_buffer();
        let Some(offset) = fb.offset_of(x, y) else {
            return;
        };
        match self {
            PixelWriter::Rgb(_) => fb.put(offset, [c.r, c.g, c.b]),
            PixelWriter::Bgr(_) => fb.put(offset, [c.b, c.g, c.r]),
        }
    }
}

/// Fills `[x0, x1) x [y0, y1)` after clamping it to the surface.
fn fill_span(writer: &PixelWriter, (x0, y0): (i64, i64), (x1, y1): (i64, i64), c: PixelColor) {
    let (w, h) = (i64::from(writer.width()), i64::from(writer.height()));
    for y in y0.max(0)..y1.min(h) {
        for x in x0.max(0)..x1.min(w) {
            // Clamped to the surface, so both fit in i32.
            writer.write(x as i32, y as i32, c);
        }
    }
}

pub fn fill_rectangle(
    writer: &PixelWriter,
    pos: Vector2D<i32>,
    size: Vector2D<i32>,
    c: PixelColor,
) {
    let (left, top) = (i64::from(pos.x), i64::from(pos.y));
    let (right, bottom) = (left + i64::from(size.x), top + i64::from(size.y));
    fill_span(writer, (left, top), (right, bottom), c);
}

/// One-pixel outline.
pub fn draw_rectangle(
    writer: &PixelWriter,
    pos: Vector2D<i32>,
    size: Vector2D<i32>,
    c: PixelColor,
) {
    if size.x <= 0 || size.y <= 0 {
        return;
    }
    let (left, top) = (i64::from(pos.x), i64::from(pos.y));
    let (right, bottom) = (left + i64::from(size.x), top + i64::from(size.y));
    fill_span(writer, (left, top), (right, top + 1), c);
    fill_span(writer, (left, bottom - 1), (right, bottom), c);
    fill_span(writer, (left, top + 1), (left + 1, bottom - 1), c);
    fill_span(writer, (right - 1, top + 1), (right, bottom - 1), c);
}

/// The kernel's drawing context. Built once in `kernel_main` and passed by
/// reference to whatever draws.
pub struct Display {
    writer: PixelWriter,
}

impl Display {
    pub fn new(writer: PixelWriter) -> Self {
        Display { writer }
    }

    pub fn writer(&self) -> &PixelWriter {
        &self.writer
    }

    pub fn clear(&self, c: PixelColor) {
        let size = Vector2D::new(self.writer.width(), self.writer.height());
        fill_rectangle(&self.writer, Vector2D::default(), size, c);
    }
}
