// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! Route modules.

pub mod benchmarks;
pub mod health;
pub mod runs;
