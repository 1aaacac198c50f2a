// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
//! Kernel log sink on COM1.
//!
//! Boot services are gone by the time the kernel runs, so the UART is the
//! only output besides the frame buffer. Records carry their target
//! (`handoff`, `fb`, ...) so the serial trace reads like the loader's.

use core::fmt::{self, Write};

use log::{LevelFilter, Log, Metadata, Record};
use spin::{Mutex, Once};
use uart_16550::SerialPort;

const COM1: u16 = 0x3F8;

static PORT: Once<Mutex<SerialPort>> = Once::new();
static LOGGER: KernelLogger = KernelLogger;

struct Uart<'a>(&'a mut SerialPort);

impl Write for Uart<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            if b == b'\n' {
                self.0.send(b'\r');
            }
            self.0.send(b);
        }
        Ok(())
    }
}

/// `[LEVEL] target: message`, one line per record.
fn format_record<W: Write>(out: &mut W, record: &Record) -> fmt::Result {
    writeln!(out, "[{:<5}] {}: {}", record.level(), record.target(), record.args())
}

struct KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(port) = PORT.get() {
            let _ = format_record(&mut Uart(&mut port.lock()), record);
        }
    }

    fn flush(&self) {}
}

/// Brings up COM1 and installs the logger.
///
/// # Safety
/// Port 0x3F8 must be a 16550-compatible UART nobody else is driving.
pub unsafe fn init(level: LevelFilter) {
    PORT.call_once(|| {
        let mut port = unsafe { SerialPort::new(COM1) };
        port.init();
        Mutex::new(port)
    });
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

/// Writes the panic report even if the panicking code held the port lock.
pub fn panic_line(info: &core::panic::PanicInfo) {
    let Some(port) = PORT.get() else {
        return;
    };
    // SAFETY: single CPU, and nothing resumes after a panic.
    unsafe { port.force_unlock() };
    let _ = writeln!(Uart(&mut port.lock()), "\n*** KERNEL PANIC ***\n{info}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;
    use std::string::String;

    #[test]
    fn records_are_tagged_with_level_and_target() {
        let mut out = String::new();
        format_record(
            &mut out,
            &Record::builder()
                .level(Level::Info)
                .target("handoff")
                .args(format_args!("entered with fb at {:#x}", 0x8000_0000u64))
                .build(),
        )
        .unwrap();
        assert_eq!(out, "[INFO ] handoff: entered with fb at 0x80000000\n");
    }
}
