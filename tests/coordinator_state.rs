// SPDX-License-Identifier: MIT OR Apache-2.0
//! The Idle/Rendering/Swapping handshake: legal transitions fire their
//! callbacks, illegal signals are no-ops, and queued updates collapse to the
//! latest size.

use frames_in_flight::coordinator::{CoordinatorCallbacks, CoordinatorState, FrameRequestCoordinator};
use frames_in_flight::swapchain::{FrameHandle, ImageHandle, ImageSize, SemaphoreHandle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct CallLog {
    updates: Mutex<Vec<ImageSize>>,
    swaps: AtomicUsize,
    render_requests: AtomicUsize,
}

fn coordinator() -> (FrameRequestCoordinator, Arc<CallLog>) {
    let log = Arc::new(CallLog::default());
    let update_log = log.clone();
    let swap_log = log.clone();
    let render_log = log.clone();
    let coordinator = FrameRequestCoordinator::new(CoordinatorCallbacks {
        update_backbuffer: Box::new(move |size| {
            update_log.updates.lock().unwrap().push(size);
        }),
        swap_backbuffer: Box::new(move |_frame| {
            swap_log.swaps.fetch_add(1, Ordering::Relaxed);
        }),
        request_render: Box::new(move || {
            render_log.render_requests.fetch_add(1, Ordering::Relaxed);
        }),
    });
    (coordinator, log)
}

fn frame_handle() -> FrameHandle {
    FrameHandle {
        image: ImageHandle(1),
        available: SemaphoreHandle(2),
        render_complete: SemaphoreHandle(3),
        memory_size: 0,
        size: ImageSize::new(100, 100),
    }
}

const A: ImageSize = ImageSize::new(100, 100);
const B: ImageSize = ImageSize::new(200, 200);
const C: ImageSize = ImageSize::new(300, 300);

#[test]
fn update_request_starts_rendering() {
    let (coordinator, log) = coordinator();
    assert_eq!(coordinator.current_state(), CoordinatorState::Idle);
    coordinator.queue_backbuffer_update(A);
    assert_eq!(coordinator.current_state(), CoordinatorState::Rendering);
    assert_eq!(*log.updates.lock().unwrap(), vec![A]);
}

#[test]
fn full_cycle_returns_to_idle() {
    let (coordinator, log) = coordinator();
    coordinator.queue_backbuffer_update(A);
    coordinator.signal_backbuffer_updated(frame_handle());
    assert_eq!(coordinator.current_state(), CoordinatorState::Swapping);
    assert_eq!(log.swaps.load(Ordering::Relaxed), 1);
    coordinator.signal_swap_finished();
    assert_eq!(coordinator.current_state(), CoordinatorState::Idle);
    assert_eq!(log.render_requests.load(Ordering::Relaxed), 1);
}

#[test]
fn out_of_order_signals_are_ignored() {
    let (coordinator, log) = coordinator();

    // nothing is rendering, so neither signal may do anything
    coordinator.signal_backbuffer_updated(frame_handle());
    assert_eq!(coordinator.current_state(), CoordinatorState::Idle);
    assert_eq!(log.swaps.load(Ordering::Relaxed), 0);

    coordinator.signal_swap_finished();
    assert_eq!(coordinator.current_state(), CoordinatorState::Idle);
    assert_eq!(log.render_requests.load(Ordering::Relaxed), 0);
}

#[test]
fn duplicate_swap_finished_is_ignored() {
    let (coordinator, log) = coordinator();
    coordinator.queue_backbuffer_update(A);
    coordinator.signal_backbuffer_updated(frame_handle());
    coordinator.signal_swap_finished();
    coordinator.signal_swap_finished();
    assert_eq!(log.render_requests.load(Ordering::Relaxed), 1);
    assert_eq!(coordinator.current_state(), CoordinatorState::Idle);
}

/// A resize request racing a swap-finished signal must always leave the
/// coordinator rendering the new size.  In particular the finish-side replay
/// must never steal the recorded size out from under the queue side, which
/// would leave the machine in `Rendering` with no update delivered and no
/// signal able to advance it.
#[test]
fn concurrent_resize_and_swap_finish_cannot_wedge() {
    for _ in 0..200 {
        let (coordinator, log) = coordinator();
        coordinator.queue_backbuffer_update(A);
        coordinator.signal_backbuffer_updated(frame_handle());

        std::thread::scope(|scope| {
            scope.spawn(|| coordinator.queue_backbuffer_update(B));
            scope.spawn(|| coordinator.signal_swap_finished());
        });

        // every legal interleaving ends up rendering B
        assert_eq!(coordinator.current_state(), CoordinatorState::Rendering);
        assert_eq!(*log.updates.lock().unwrap(), vec![A, B]);
        assert_eq!(log.render_requests.load(Ordering::Relaxed), 1);
    }
}

#[test]
fn queued_updates_collapse_to_latest() {
    let (coordinator, log) = coordinator();
    coordinator.queue_backbuffer_update(A);
    // two more requests arrive while A is rendering; only the newest matters
    coordinator.queue_backbuffer_update(B);
    coordinator.queue_backbuffer_update(C);
    assert_eq!(*log.updates.lock().unwrap(), vec![A]);

    coordinator.signal_backbuffer_updated(frame_handle());
    coordinator.signal_swap_finished();

    // the queued update replays immediately with the latest size
    assert_eq!(coordinator.current_state(), CoordinatorState::Rendering);
    assert_eq!(*log.updates.lock().unwrap(), vec![A, C]);

    coordinator.signal_backbuffer_updated(frame_handle());
    coordinator.signal_swap_finished();
    assert_eq!(coordinator.current_state(), CoordinatorState::Idle);
    assert_eq!(*log.updates.lock().unwrap(), vec![A, C]);
}
