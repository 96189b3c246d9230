// SPDX-License-Identifier: MIT OR Apache-2.0
//backend selection.  Exactly one backend is compiled in; each exports an
//`InteropContext` with the same surface.

#[cfg(not(feature = "backend_wgpu"))]
mod nop;
#[cfg(not(feature = "backend_wgpu"))]
pub use nop::*;

#[cfg(feature = "backend_wgpu")]
mod wgpu;

#[cfg(feature = "backend_wgpu")]
pub use wgpu::*;
