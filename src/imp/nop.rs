// SPDX-License-Identifier: MIT OR Apache-2.0
//! Software backend used when no GPU backend feature is enabled.  Images are
//! bookkeeping-only; every present resolves immediately.

use crate::completion::PresentCompletion;
use crate::swapchain::swap_image::{
    Error, FrameHandle, GpuInteropContext, ImageHandle, ImageSize, SemaphoreHandle, SwapImage,
};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn next_handle() -> u64 {
    NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug)]
pub struct InteropContext;

impl InteropContext {
    pub async fn new() -> Result<Self, CreateContextError> {
        Ok(InteropContext)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CreateContextError {}

impl GpuInteropContext for InteropContext {
    fn create_image(&self, size: ImageSize) -> Result<Box<dyn SwapImage>, Error> {
        Ok(Box::new(NopSwapImage {
            size,
            handle: FrameHandle {
                image: ImageHandle(next_handle()),
                available: SemaphoreHandle(next_handle()),
                render_complete: SemaphoreHandle(next_handle()),
                memory_size: size.estimated_memory_size(),
                size,
            },
            presented: false,
        }))
    }

    fn flush(&self) {
        //nothing pending to flush
    }
}

#[derive(Debug)]
struct NopSwapImage {
    size: ImageSize,
    handle: FrameHandle,
    presented: bool,
}

impl SwapImage for NopSwapImage {
    fn size(&self) -> ImageSize {
        self.size
    }

    fn begin_draw(&mut self) {}

    fn present(&mut self, _size: ImageSize) -> PresentCompletion {
        self.presented = true;
        PresentCompletion::resolved()
    }

    fn frame_handle(&self) -> Option<FrameHandle> {
        self.presented.then_some(self.handle)
    }
}
