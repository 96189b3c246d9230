// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
A bounded, self-pruning pool of in-flight swap images.

The pool owns every image that is not currently being drawn into.  Its one
non-obvious rule is the reuse threshold: an image of the right size that is
safe to reuse is only handed back out if at least one *other* such image
exists.  Reusing the sole ready image would couple the producer's next frame
to that image's present finishing - a tight loop that can stall the producer
whenever the consumer (often a UI thread) is slow.  When slack is missing the
pool grows instead.

Locking discipline is coarse but short: the mutex guards the image collection
only.  Backend image creation and disposal happen outside it.
*/

use crate::completion::{CompletionStatus, PresentCompletion};
use crate::swapchain::swap_image::{Error, FrameHandle, GpuInteropContext, ImageSize, SwapImage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How long `dispose_all` waits per image for an outstanding present before
/// giving up and disposing anyway.
pub const DISPOSE_WAIT_BUDGET: Duration = Duration::from_secs(5);

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a pooled image, used for the double-insertion guard on
/// release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(u64);

/**
A backend image plus its last-known presentation status.

While a `PooledImage` is outside the pool it is exclusively owned by the
producer; the pool re-learns about it on [`ImagePool::release`].
*/
#[derive(Debug)]
pub struct PooledImage {
    id: ImageId,
    image: Box<dyn SwapImage>,
    last_present: Option<PresentCompletion>,
}

impl PooledImage {
    fn new(image: Box<dyn SwapImage>) -> Self {
        PooledImage {
            id: ImageId(NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed)),
            image,
            last_present: None,
        }
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn size(&self) -> ImageSize {
        self.image.size()
    }

    pub fn begin_draw(&mut self) {
        self.image.begin_draw()
    }

    /// Presents the image and records the returned completion as its
    /// last-present, which governs when the pool may reuse it.
    pub fn present(&mut self, size: ImageSize) -> PresentCompletion {
        let completion = self.image.present(size);
        self.last_present = Some(completion.clone());
        completion
    }

    pub fn last_present(&self) -> Option<&PresentCompletion> {
        self.last_present.as_ref()
    }

    pub fn frame_handle(&self) -> Option<FrameHandle> {
        self.image.frame_handle()
    }

    /// Safe to hand out for a new draw: no outstanding present, or the
    /// present has settled.  Faulted images are also "ready" in this sense;
    /// the broken check runs first and removes them.
    fn is_ready(&self) -> bool {
        match &self.last_present {
            None => true,
            Some(completion) => completion.status().is_settled(),
        }
    }

    fn is_broken(&self) -> bool {
        matches!(
            self.last_present.as_ref().map(|c| c.status()),
            Some(CompletionStatus::Faulted)
        )
    }
}

#[derive(Debug)]
struct PoolState {
    ///most-recently-added last; scans walk back to front
    images: Vec<PooledImage>,
    shut_down: bool,
}

/**
Owns the set of swap images that are idle or pending-return.

All mutation happens under one short-held mutex; see the module docs for the
reuse policy.
*/
#[derive(Debug)]
pub struct ImagePool {
    context: Arc<dyn GpuInteropContext>,
    state: Mutex<PoolState>,
}

impl ImagePool {
    pub fn new(context: Arc<dyn GpuInteropContext>) -> Self {
        ImagePool {
            context,
            state: Mutex::new(PoolState {
                images: Vec::new(),
                shut_down: false,
            }),
        }
    }

    /**
    Produces an image of `size` that is safe to draw into right now.

    Returns `None` only when the pool has been shut down - callers treat that
    as "no frame this cycle", not an error.  Otherwise the pool either reuses
    a held image (when at least two ready candidates of the right size exist)
    or grows by one.  The returned image leaves the pool's tracked set and is
    exclusively owned by the caller until [`ImagePool::release`].

    Backend image creation failure is fatal and propagates.
    */
    pub fn acquire(&self, size: ImageSize) -> Result<Option<PooledImage>, Error> {
        let mut discarded = Vec::new();
        let reused = {
            let mut state = self.state.lock().unwrap();
            if state.shut_down {
                return Ok(None);
            }
            //scan newest to oldest, pruning as we go
            let mut index = state.images.len();
            while index > 0 {
                index -= 1;
                let image = &state.images[index];
                if image.is_broken() {
                    let broken = state.images.remove(index);
                    logwise::warn_sync!(
                        "Discarding swap image whose present faulted: {fault}",
                        fault = broken
                            .last_present()
                            .and_then(|c| c.fault_message())
                            .unwrap_or_default()
                    );
                    discarded.push(broken);
                } else if image.is_ready() && image.size() != size {
                    let stale = state.images.remove(index);
                    logwise::trace_sync!(
                        "Discarding stale swap image: {have}, requested {want}",
                        have = stale.size().to_string(),
                        want = size.to_string()
                    );
                    discarded.push(stale);
                }
            }
            let candidates: Vec<usize> = state
                .images
                .iter()
                .enumerate()
                .rev()
                .filter(|(_, image)| image.is_ready() && image.size() == size)
                .map(|(position, _)| position)
                .collect();
            //reuse only with slack: a lone ready candidate stays in the pool
            //and we grow instead (see module docs)
            if candidates.len() >= 2 {
                Some(state.images.remove(candidates[0]))
            } else {
                None
            }
        };
        //GPU disposal and creation happen outside the lock
        drop(discarded);
        match reused {
            Some(image) => Ok(Some(image)),
            None => {
                let image = self.context.create_image(size)?;
                Ok(Some(PooledImage::new(image)))
            }
        }
    }

    /**
    Returns an image to the pool's tracked set.

    Guarded against double insertion: if an image with the same identity is
    already tracked, the duplicate is dropped rather than inserted twice.
    After shutdown, released images are disposed instead of re-tracked.
    */
    pub fn release(&self, image: PooledImage) {
        let reject = {
            let mut state = self.state.lock().unwrap();
            if state.shut_down {
                Some(image)
            } else if state.images.iter().any(|held| held.id() == image.id()) {
                logwise::error_sync!("Swap image released twice; ignoring the duplicate");
                Some(image)
            } else {
                state.images.push(image);
                None
            }
        };
        drop(reject);
    }

    /// Number of images currently tracked (idle or pending-return).
    pub fn tracked_images(&self) -> usize {
        self.state.lock().unwrap().images.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().unwrap().shut_down
    }

    /**
    Shuts the pool down and disposes every held image.

    Each image's outstanding present (if any) is awaited first so we never
    free memory the consumer may still be reading - but the wait is bounded
    by [`DISPOSE_WAIT_BUDGET`] per image, and a faulted or timed-out present
    is logged and otherwise ignored.  Subsequent `acquire` calls return
    `None`.
    */
    pub async fn dispose_all(&self) {
        self.dispose_all_with_budget(DISPOSE_WAIT_BUDGET).await
    }

    /// As [`ImagePool::dispose_all`], with an explicit per-image wait budget.
    pub async fn dispose_all_with_budget(&self, budget: Duration) {
        let images = {
            let mut state = self.state.lock().unwrap();
            state.shut_down = true;
            std::mem::take(&mut state.images)
        };
        for image in images {
            if let Some(last_present) = image.last_present() {
                let settled = last_present.wait_with_timeout(budget).await;
                if !settled {
                    let ms = budget.as_millis() as u64;
                    logwise::warn_sync!(
                        "Disposing swap image with an unresolved present after {ms}ms",
                        ms = ms
                    );
                }
            }
            drop(image);
        }
    }
}
