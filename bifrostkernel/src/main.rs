// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), no_main)]

mod bootinfo;
mod graphics;
mod serial;

use bootinfo::FrameBufferConfig;
use graphics::{Display, PixelColor, PixelWriter, Vector2D, draw_rectangle, fill_rectangle};
use log::{LevelFilter, error, info};

/// Called by the loader with boot services already gone.
#[unsafe(no_mangle)]
pub extern "sysv64" fn kernel_main(config: &FrameBufferConfig) -> ! {
    // SAFETY: the loader's COM1 logger went away with boot services.
    unsafe { serial::init(LevelFilter::Info) };
    info!(target: "handoff", "kernel entered, config at {:p}", config);
    info!(
        target: "fb",
        "{:p} {}x{} stride {} {:?}",
        config.frame_buffer,
        config.horizontal_resolution,
        config.vertical_resolution,
        config.pixels_per_scan_line,
        config.pixel_format
    );

    // SAFETY: the loader describes the GOP frame buffer, identity mapped.
    let Some(writer) = (unsafe { PixelWriter::new(config) }) else {
        error!(target: "fb", "loader passed a null frame buffer");
        halt()
    };
    let display = Display::new(writer);
    draw_demo(&display);
    info!(target: "handoff", "demo drawn, halting");
    halt()
}

fn draw_demo(display: &Display) {
    display.clear(PixelColor::WHITE);
    let w = display.writer();
    let green = PixelColor::new(0, 255, 0);
    fill_rectangle(w, Vector2D::new(100, 100), Vector2D::new(200, 100), green);
    draw_rectangle(w, Vector2D::new(50, 50), Vector2D::new(300, 200), PixelColor::BLACK);
}

fn halt() -> ! {
    loop {
        x86_64::instructions::hlt();
    }
}

#[cfg(not(test))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    serial::panic_line(info);
    halt()
}
