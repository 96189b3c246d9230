// SPDX-License-Identifier: MIT OR Apache-2.0
//! The per-image lifecycle contract and the cross-context handle types.
//!
//! A [`SwapImage`] is one GPU-backed drawable surface.  Backends (wgpu today;
//! the design admits Vulkan/D3D-style backends) implement the same contract:
//! wait "available" before a non-first draw, signal "render finished" before
//! handing the image to the consumer, export the image and its semaphore pair
//! at most once per image lifetime.
//!
//! The pool and the presentation cycle are generic over this trait and never
//! touch a native API.

use crate::completion::PresentCompletion;
use std::fmt::Display;

/// Pixel dimensions of a swap image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageSize {
    pub width: u16,
    pub height: u16,
}

impl ImageSize {
    pub const fn new(width: u16, height: u16) -> Self {
        ImageSize { width, height }
    }

    /// Byte size of the image assuming a 4-byte pixel, used for the exported
    /// memory-size field of a [`FrameHandle`].
    pub fn estimated_memory_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * 4
    }
}

impl Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Opaque exported GPU image handle.  Meaningful only to the consumer context
/// that imports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ImageHandle(pub u64);

/// Opaque exported GPU semaphore handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SemaphoreHandle(pub u64);

/// A consumer-side imported image, opaque to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ImportedImage(pub u64);

/// A consumer-side imported semaphore, opaque to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ImportedSemaphore(pub u64);

/**
The exported cross-context description of one frame.

This is what crosses the producer/consumer boundary: the image plus its two
binary semaphores ("available": the producer may write again; "render
complete": the consumer may read), with enough metadata for the consumer to
import the memory.

Export happens lazily, once per image lifetime; after that the same handle is
reused for every present of the image.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandle {
    pub image: ImageHandle,
    pub available: SemaphoreHandle,
    pub render_complete: SemaphoreHandle,
    pub memory_size: u64,
    pub size: ImageSize,
}

/**
One GPU-backed drawable unit.

Lifecycle: *drawing* (exclusively owned by the producer) → *presenting*
(handed to the consumer) → *pending-return* (present completion outstanding)
→ *idle-in-pool* → disposed (dropped).

Disposal is `Drop`: releasing the box releases the backend resources.
*/
pub trait SwapImage: Send + std::fmt::Debug {
    fn size(&self) -> ImageSize;

    /// Called once per draw turn, before the producer writes.  Backends that
    /// export real semaphores wait on "available" here for every use after
    /// the first; the first use of a fresh image has nothing to wait for.
    fn begin_draw(&mut self);

    /// Signals "render finished", exports the image and semaphore pair to the
    /// consumer (lazily, once per image lifetime), and hands the frame off.
    ///
    /// The returned completion settles when the consumer has displayed the
    /// frame (or faulted trying).  Callers never block on it; the pool polls
    /// it on later scans.
    fn present(&mut self, size: ImageSize) -> PresentCompletion;

    /// The exported description of this image, available after the first
    /// present has exported it.
    fn frame_handle(&self) -> Option<FrameHandle>;
}

/**
The graphics side the pool grows from.

One explicit context object per pool; there is intentionally no process-wide
"current context" singleton, which keeps tests able to substitute fakes.
*/
pub trait GpuInteropContext: Send + Sync + std::fmt::Debug {
    /// Creates a backend image of the given size.  Failure here is fatal and
    /// propagates out of [`crate::swapchain::ImagePool::acquire`].
    fn create_image(&self, size: ImageSize) -> Result<Box<dyn SwapImage>, Error>;

    /// Invoked once per render-thread iteration after draining queued
    /// callbacks.
    fn flush(&self);
}

/**
The consumer-facing import surface.

The compositor imports the exported handles into its own context (a one-time,
idempotent operation per consumer context) and then displays frames at its own
pace.  `update_with_semaphores` is the presentation call; its completion is
exactly the "present future" the pool tracks per image.
*/
pub trait Compositor: Send + Sync + std::fmt::Debug {
    fn import_image(&self, handle: ImageHandle, properties: &FrameHandle) -> ImportedImage;

    fn import_semaphore(&self, handle: SemaphoreHandle) -> ImportedSemaphore;

    fn update_with_semaphores(
        &self,
        image: &ImportedImage,
        render_complete: &ImportedSemaphore,
        available: &ImportedSemaphore,
    ) -> PresentCompletion;
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Can't create backend image: {0}")]
    ImageCreation(String),
}
