// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
use core::ptr;

use bifrostload::{FrameBufferConfig, LoadError};
use log::info;
use uefi::boot::{self, OpenProtocolAttributes, OpenProtocolParams};
use uefi::proto::console::gop::GraphicsOutput;

/// Reads the current GOP mode into the descriptor handed to the kernel and
/// paints the screen white.
pub fn query_frame_buffer() -> Result<FrameBufferConfig, LoadError> {
    let unavailable = |e: uefi::Error| LoadError::ResourceUnavailable {
        what: "graphics output protocol",
        status: e.status(),
    };
    let handle = boot::get_handle_for_protocol::<GraphicsOutput>().map_err(unavailable)?;
    // Non-exclusive, so the firmware console keeps drawing until handoff.
    let mut gop = unsafe {
        boot::open_protocol::<GraphicsOutput>(
            OpenProtocolParams {
                handle,
                agent: boot::image_handle(),
                controller: None,
            },
            OpenProtocolAttributes::GetProtocol,
        )
    }
    .map_err(unavailable)?;

    let mode = gop.current_mode_info();
    let (width, height) = mode.resolution();
    let mut fb = gop.frame_buffer();
    let base = fb.as_mut_ptr();
    let size = fb.size();
    info!(
        "Resolution: {}x{}, Pixel Format: {:?}, {} pixels/line",
        width,
        height,
        mode.pixel_format(),
        mode.stride()
    );
    let config = FrameBufferConfig::from_gop_mode(
        base,
        (width, height),
        mode.stride(),
        mode.pixel_format(),
    )?;
    info!(
        "Frame Buffer: 0x{:x} - 0x{:x}, Size: {} bytes, kernel view {} bytes",
        base as u64,
        base as u64 + size as u64,
        size,
        config.size_bytes()
    );

    // SAFETY: GOP reports `size` bytes of linear frame buffer at `base`.
    unsafe { ptr::write_bytes(base, 0xff, size) };
    Ok(config)
}
