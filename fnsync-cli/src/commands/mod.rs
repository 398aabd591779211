// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

pub mod apply;
pub mod destroy;
pub mod list;
pub mod plan;
pub mod validate;
