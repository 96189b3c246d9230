// SPDX-License-Identifier: MIT OR Apache-2.0
//! The draw-turn guard: images come back to the pool on drop, present fires
//! at most once, and a shut-down pool produces skipped turns.

use frames_in_flight::completion;
use frames_in_flight::completion::{CompletionSender, CompletionStatus, PresentCompletion};
use frames_in_flight::swapchain::{
    Error, FrameHandle, GpuInteropContext, ImageSize, ImagePool, PresentationCycle, SwapImage,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct BackendLog {
    draws: AtomicUsize,
    presents: AtomicUsize,
    senders: Mutex<Vec<CompletionSender>>,
}

#[derive(Debug)]
struct FakeContext {
    log: Arc<BackendLog>,
}

impl GpuInteropContext for FakeContext {
    fn create_image(&self, size: ImageSize) -> Result<Box<dyn SwapImage>, Error> {
        Ok(Box::new(FakeImage {
            size,
            log: self.log.clone(),
        }))
    }

    fn flush(&self) {}
}

#[derive(Debug)]
struct FakeImage {
    size: ImageSize,
    log: Arc<BackendLog>,
}

impl SwapImage for FakeImage {
    fn size(&self) -> ImageSize {
        self.size
    }

    fn begin_draw(&mut self) {
        self.log.draws.fetch_add(1, Ordering::Relaxed);
    }

    fn present(&mut self, _size: ImageSize) -> PresentCompletion {
        self.log.presents.fetch_add(1, Ordering::Relaxed);
        let (sender, completion) = completion::completion();
        self.log.senders.lock().unwrap().push(sender);
        completion
    }

    fn frame_handle(&self) -> Option<FrameHandle> {
        None
    }
}

fn cycle() -> (PresentationCycle, Arc<BackendLog>) {
    let log = Arc::new(BackendLog::default());
    let pool = Arc::new(ImagePool::new(Arc::new(FakeContext { log: log.clone() })));
    (PresentationCycle::new(pool), log)
}

const SIZE: ImageSize = ImageSize::new(640, 480);

#[test]
fn begin_draw_reaches_the_image() {
    let (cycle, log) = cycle();
    let turn = cycle.begin_draw(SIZE).unwrap();
    assert!(!turn.is_skipped());
    assert_eq!(turn.image().unwrap().size(), SIZE);
    assert_eq!(log.draws.load(Ordering::Relaxed), 1);
}

#[test]
fn dropping_a_turn_returns_the_image() {
    let (cycle, _log) = cycle();
    let turn = cycle.begin_draw(SIZE).unwrap();
    assert_eq!(cycle.pool().tracked_images(), 0);
    drop(turn);
    assert_eq!(cycle.pool().tracked_images(), 1);
}

#[test]
fn early_return_without_present_still_returns_the_image() {
    let (cycle, log) = cycle();
    {
        let _turn = cycle.begin_draw(SIZE).unwrap();
        // drawing failed; no present happens this frame
    }
    assert_eq!(log.presents.load(Ordering::Relaxed), 0);
    assert_eq!(cycle.pool().tracked_images(), 1);
}

#[test]
fn present_fires_at_most_once() {
    let (cycle, log) = cycle();
    let mut turn = cycle.begin_draw(SIZE).unwrap();
    let first = turn.present(SIZE);
    let second = turn.present(SIZE);
    assert_eq!(log.presents.load(Ordering::Relaxed), 1);

    // both handles observe the same settlement
    log.senders.lock().unwrap().drain(..).for_each(|s| s.resolve());
    assert_eq!(first.status(), CompletionStatus::Complete);
    assert_eq!(second.status(), CompletionStatus::Complete);
}

#[test]
fn shutdown_produces_skipped_turns() {
    let (cycle, log) = cycle();
    test_executors::sleep_on(cycle.pool().dispose_all());

    let mut turn = cycle.begin_draw(SIZE).unwrap();
    assert!(turn.is_skipped());
    assert!(turn.image().is_none());
    assert_eq!(log.draws.load(Ordering::Relaxed), 0);

    // a skipped present settles immediately so callers never hang on it
    let completion = turn.present(SIZE);
    assert_eq!(completion.status(), CompletionStatus::Complete);
    assert_eq!(log.presents.load(Ordering::Relaxed), 0);

    drop(turn);
    assert_eq!(cycle.pool().tracked_images(), 0);
}
