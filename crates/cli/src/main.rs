// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! benchdash CLI entry point.

fn main() {
    if let Err(e) = benchdash_cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
