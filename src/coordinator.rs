// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Serializes "producer wants to redraw the backbuffer" against "consumer is
mid-swap".

The two sides call in from different threads on their own schedules.  State
lives in one atomic; transitions are compare-exchange, so no lock is ever
held across a callback, let alone an await point.  Signals that arrive in the
wrong state are silent no-ops by design - a resize that lands twice while a
frame is in flight is normal traffic, not an error.

At most one backbuffer-update request is remembered while busy, and the most
recent one wins; it replays automatically when the swap finishes.
*/

use crate::swapchain::swap_image::{FrameHandle, ImageSize};
use std::fmt::{Debug, Formatter};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};

const IDLE: u8 = 0;
const RENDERING: u8 = 1;
const SWAPPING: u8 = 2;

/// Observable coordinator state, mostly for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Rendering,
    Swapping,
}

/**
The three callbacks a coordinator drives.

* `update_backbuffer` - producer-facing: redraw the backbuffer at this size.
* `swap_backbuffer` - consumer-facing: a frame is ready, import/blit it.
* `request_render` - ask the producer's scheduler for the next frame.

Callbacks are invoked with no coordinator lock held and must not call back
into the same coordinator re-entrantly from within themselves on the same
stack if they take locks of their own; posting to a queue (the usual shape)
is always safe.
*/
pub struct CoordinatorCallbacks {
    pub update_backbuffer: Box<dyn Fn(ImageSize) + Send + Sync>,
    pub swap_backbuffer: Box<dyn Fn(FrameHandle) + Send + Sync>,
    pub request_render: Box<dyn Fn() + Send + Sync>,
}

impl Debug for CoordinatorCallbacks {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorCallbacks").finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct FrameRequestCoordinator {
    state: AtomicU8,
    pending_update: Mutex<Option<ImageSize>>,
    callbacks: CoordinatorCallbacks,
}

impl FrameRequestCoordinator {
    pub fn new(callbacks: CoordinatorCallbacks) -> Self {
        FrameRequestCoordinator {
            state: AtomicU8::new(IDLE),
            pending_update: Mutex::new(None),
            callbacks,
        }
    }

    pub fn current_state(&self) -> CoordinatorState {
        match self.state.load(Ordering::Acquire) {
            IDLE => CoordinatorState::Idle,
            RENDERING => CoordinatorState::Rendering,
            SWAPPING => CoordinatorState::Swapping,
            other => panic!("Invalid coordinator state: {other}"),
        }
    }

    /// `Idle → Rendering`.  Fails (without mutating state) from any other
    /// state.
    pub fn try_start_rendering(&self) -> bool {
        self.transition(IDLE, RENDERING)
    }

    /// `Rendering → Swapping`.
    pub fn try_start_swapping(&self) -> bool {
        self.transition(RENDERING, SWAPPING)
    }

    /// `Swapping → Idle`.
    pub fn try_finish_swapping(&self) -> bool {
        self.transition(SWAPPING, IDLE)
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /**
    Records `size` as the latest pending backbuffer update.

    If the coordinator is idle, rendering starts immediately and the
    producer callback fires with the latest recorded size.  If not, the
    request is merely remembered (superseding any earlier one) and replays
    after the in-flight swap finishes.
    */
    pub fn queue_backbuffer_update(&self, size: ImageSize) {
        //record, transition, and claim under one lock acquisition.  If the
        //claim happened outside it, a concurrent swap-finished replay could
        //steal the recorded size between our transition and our take,
        //leaving us rendering with nothing to render - a permanent wedge.
        let take = {
            let mut pending = self.pending_update.lock().unwrap();
            pending.replace(size);
            if self.try_start_rendering() {
                pending.take()
            } else {
                None
            }
        };
        if let Some(size) = take {
            (self.callbacks.update_backbuffer)(size);
        }
    }

    /**
    Producer-side: a frame is ready.

    Only has effect while rendering; transitions to swapping and invokes the
    consumer's blit/import callback with `frame`.  A late or duplicate
    signal is ignored.
    */
    pub fn signal_backbuffer_updated(&self, frame: FrameHandle) {
        if self.try_start_swapping() {
            (self.callbacks.swap_backbuffer)(frame);
        } else {
            logwise::trace_sync!("Ignoring backbuffer-updated signal outside the rendering state");
        }
    }

    /**
    Consumer-side: the swap is visible.

    Only has effect while swapping; transitions to idle, asks for the next
    render, and replays a pending backbuffer update if one was queued while
    busy.  A late or duplicate signal is ignored.
    */
    pub fn signal_swap_finished(&self) {
        if self.try_finish_swapping() {
            (self.callbacks.request_render)();
            let queued = self.pending_update.lock().unwrap().take();
            if let Some(size) = queued {
                self.queue_backbuffer_update(size);
            }
        } else {
            logwise::trace_sync!("Ignoring swap-finished signal outside the swapping state");
        }
    }
}
