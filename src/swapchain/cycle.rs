// SPDX-License-Identifier: MIT OR Apache-2.0
//! The begin-draw / present / return-to-pool protocol for one frame.
//!
//! [`PresentationCycle::begin_draw`] hands the producer an exclusively-owned
//! image wrapped in a [`DrawTurn`] guard.  Presenting is explicit and
//! at-most-once; returning the image to the pool is implicit on guard drop,
//! which keeps pool bookkeeping correct on every exit path including early
//! returns and panics in the producer's drawing code.

use crate::completion::PresentCompletion;
use crate::swapchain::pool::{ImagePool, PooledImage};
use crate::swapchain::swap_image::{Error, FrameHandle, ImageSize};
use std::sync::Arc;

/// Wraps a pool with the per-frame protocol.
#[derive(Debug, Clone)]
pub struct PresentationCycle {
    pool: Arc<ImagePool>,
}

impl PresentationCycle {
    pub fn new(pool: Arc<ImagePool>) -> Self {
        PresentationCycle { pool }
    }

    pub fn pool(&self) -> &Arc<ImagePool> {
        &self.pool
    }

    /**
    Begins one frame's use of a pooled image.

    Acquires an image of `size`, invokes the backend's begin-draw (the
    "available" wait), and returns the scoped guard.  If the pool has been
    shut down the returned turn is *skipped*: it holds no image, its
    [`DrawTurn::present`] is a no-op returning an already-resolved
    completion, and dropping it returns nothing.  Callers treat a skipped
    turn as "no frame this cycle", not as an error.
    */
    pub fn begin_draw(&self, size: ImageSize) -> Result<DrawTurn, Error> {
        let image = match self.pool.acquire(size)? {
            None => None,
            Some(mut image) => {
                image.begin_draw();
                Some(image)
            }
        };
        Ok(DrawTurn {
            pool: self.pool.clone(),
            image,
            presented: None,
        })
    }
}

/**
Scoped ownership of one image for one frame.

On drop the image goes back to the pool's tracked set.  That is bookkeeping
only - whether the image can actually be *reused* is governed by its present
completion, checked during later pool scans.
*/
#[derive(Debug)]
pub struct DrawTurn {
    pool: Arc<ImagePool>,
    image: Option<PooledImage>,
    presented: Option<PresentCompletion>,
}

impl DrawTurn {
    /// True when the pool was shut down and this turn carries no image.
    pub fn is_skipped(&self) -> bool {
        self.image.is_none()
    }

    pub fn image(&self) -> Option<&PooledImage> {
        self.image.as_ref()
    }

    /// The exported frame description, once the image has been exported by a
    /// present.
    pub fn frame_handle(&self) -> Option<FrameHandle> {
        self.image.as_ref().and_then(|image| image.frame_handle())
    }

    /**
    Presents the frame to the consumer.

    Callable at most once per turn; a second call is a logged no-op that
    returns the first call's completion.  On a skipped turn this returns an
    already-resolved completion.
    */
    pub fn present(&mut self, size: ImageSize) -> PresentCompletion {
        if let Some(previous) = &self.presented {
            logwise::error_sync!("present called twice in one draw turn; ignoring");
            return previous.clone();
        }
        let completion = match &mut self.image {
            None => PresentCompletion::resolved(),
            Some(image) => image.present(size),
        };
        self.presented = Some(completion.clone());
        completion
    }
}

impl Drop for DrawTurn {
    fn drop(&mut self) {
        if let Some(image) = self.image.take() {
            self.pool.release(image);
        }
    }
}
