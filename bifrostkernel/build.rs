// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Bifrost Project
// build.rs: link the kernel as a fixed-address ELF the loader can place 1:1
use std::env;

/// The loader reserves pages at exactly this address.
const KERNEL_IMAGE_BASE: u64 = 0x10_0000;
const KERNEL_ENTRY: &str = "kernel_main";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let target = env::var("TARGET").unwrap_or_default();
    if target != "x86_64-unknown-none" {
        println!("cargo:warning=Skipping kernel link args for host target: {target}");
        return;
    }

    for arg in [
        format!("--image-base={KERNEL_IMAGE_BASE:#x}"),
        format!("--entry={KERNEL_ENTRY}"),
        "--no-pie".into(),
        "--static".into(),
        "-znorelro".into(),
    ] {
        println!("cargo:rustc-link-arg-bins={arg}");
    }
}
