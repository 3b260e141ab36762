// SPDX-License-Identifier: GPL-3.0-only

//! WGSL sources

/// Vertex and fragment stages shared by every drawable
pub const PRIMITIVE_SHADER: &str = include_str!("primitive.wgsl");

/// Vertex stage entry point in [`PRIMITIVE_SHADER`]
pub const VERTEX_ENTRY: &str = "vs_main";
/// Fragment stage entry point in [`PRIMITIVE_SHADER`]
pub const FRAGMENT_ENTRY: &str = "fs_main";
