// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
//! COM1 logger (QEMU `-serial stdio`).
//!
//! Records go to the UART through port I/O, which keeps working after
//! ExitBootServices. While the firmware is still ours they are mirrored to
//! the UEFI text console as well. Nothing on this path allocates.

use core::arch::asm;
use core::fmt::{self, Write};
use core::sync::atomic::{AtomicBool, Ordering};

use log::{Log, Metadata, Record};
use spin::Mutex;

use crate::config;

const COM1: u16 = 0x3F8;

static CONSOLE_LIVE: AtomicBool = AtomicBool::new(true);
static SERIAL_LOCK: Mutex<()> = Mutex::new(());
static LOGGER: BootLogger = BootLogger;

#[inline(always)]
unsafe fn outb(port: u16, v: u8) {
    unsafe {
        asm!("out dx, al", in("dx") port, in("al") v, options(nomem, nostack, preserves_flags));
    }
}

#[inline(always)]
unsafe fn inb(port: u16) -> u8 {
    let v: u8;
    unsafe {
        asm!("in al, dx", out("al") v, in("dx") port, options(nomem, nostack, preserves_flags));
    }
    v
}

/// 115200 8N1, FIFOs on.
unsafe fn serial_init() {
    unsafe {
        outb(COM1 + 1, 0x00);
        outb(COM1 + 3, 0x80);
        outb(COM1, 0x01);
        outb(COM1 + 1, 0x00);
        outb(COM1 + 3, 0x03);
        outb(COM1 + 2, 0xC7);
        outb(COM1 + 4, 0x0B);
    }
}

fn serial_putc(c: u8) {
    unsafe {
        // THR empty
        while inb(COM1 + 5) & 0x20 == 0 {}
        outb(COM1, c);
    }
}

struct Com1;

impl Write for Com1 {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            if b == b'\n' {
                serial_putc(b'\r');
            }
            serial_putc(b);
        }
        Ok(())
    }
}

struct BootLogger;

impl Log for BootLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        {
            let _guard = SERIAL_LOCK.lock();
            let _ = writeln!(Com1, "[{:<5}] {}", record.level(), record.args());
        }
        if CONSOLE_LIVE.load(Ordering::Acquire) {
            uefi::system::with_stdout(|out| {
                let _ = writeln!(out, "{}", record.args());
            });
        }
    }

    fn flush(&self) {}
}

pub fn init_logger() {
    unsafe { serial_init() };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(config::LOG_LEVEL);
    }
}

/// From here on only the UART sees log output.
pub fn console_off() {
    CONSOLE_LIVE.store(false, Ordering::Release);
}

/// Lock-free path for the panic handler.
pub fn panic_line(info: &core::panic::PanicInfo) {
    let _ = writeln!(Com1, "[PANIC] {info}");
}
