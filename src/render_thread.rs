// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
The producer's execution context: a dedicated thread driving frames at a
fixed cadence.

Each iteration swaps the pending-callback queue under a short lock, runs the
callbacks outside it (so the lock is never held during GPU or application
work), flushes the graphics backend, then sleeps away the remainder of the
~16ms budget.  A panicking callback is caught and logged per-callback; it
neither stops the loop nor drops the callbacks queued after it.
*/

use crate::swapchain::swap_image::GpuInteropContext;
use await_values::{Observer, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Target cadence: one iteration roughly every 16ms.
pub const FRAME_BUDGET: Duration = Duration::from_millis(16);

type RenderCallback = Box<dyn FnOnce() + Send + 'static>;

struct RenderThreadShared {
    running: AtomicBool,
    pending: Mutex<Vec<RenderCallback>>,
}

impl std::fmt::Debug for RenderThreadShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderThreadShared")
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

/**
Drives queued render work on its own thread.

Stopping is explicit via [`RenderThread::stop`] or implicit on drop; either
joins the thread, which exits within one frame budget.
*/
#[derive(Debug)]
pub struct RenderThread {
    shared: Arc<RenderThreadShared>,
    join_handle: Option<std::thread::JoinHandle<()>>,
    reporter: RenderReporter,
}

impl RenderThread {
    pub fn spawn(context: Arc<dyn GpuInteropContext>) -> Self {
        let (reporter_send, reporter) = render_reporter();
        let shared = Arc::new(RenderThreadShared {
            running: AtomicBool::new(true),
            pending: Mutex::new(Vec::new()),
        });
        let thread_shared = shared.clone();
        let join_handle = std::thread::Builder::new()
            .name("frames_in_flight render".to_string())
            .spawn(move || {
                run(thread_shared, context, reporter_send);
            })
            .expect("Failed to spawn render thread");
        RenderThread {
            shared,
            join_handle: Some(join_handle),
            reporter,
        }
    }

    /// Thread-safe enqueue onto the pending-callback queue.  The callback
    /// runs on the render thread during its next iteration.
    pub fn enqueue_render<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.pending.lock().unwrap().push(Box::new(callback));
    }

    pub fn reporter(&self) -> &RenderReporter {
        &self.reporter
    }

    /// Stops the loop and joins the thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    shared: Arc<RenderThreadShared>,
    context: Arc<dyn GpuInteropContext>,
    reporter_send: RenderReporterSend,
) {
    while shared.running.load(Ordering::Acquire) {
        let iteration_start = Instant::now();
        //swap the queue under the lock, execute outside it
        let callbacks = {
            let mut pending = shared.pending.lock().unwrap();
            std::mem::take(&mut *pending)
        };
        for callback in callbacks {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
                callback();
            }));
            if let Err(panic) = outcome {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                logwise::error_sync!("Render callback panicked: {message}", message = message);
            }
        }
        context.flush();
        reporter_send.add_iteration(iteration_start, Instant::now());
        if let Some(remaining) = FRAME_BUDGET.checked_sub(iteration_start.elapsed()) {
            std::thread::sleep(remaining);
        }
    }
}

/**
Timing for one loop iteration.
*/
#[derive(Debug, Clone, Copy)]
struct IterationInfo {
    start: Instant,
    end: Instant,
}

impl IterationInfo {
    fn busy_ms(&self) -> i32 {
        self.end.duration_since(self.start).as_millis() as i32
    }
}

/**
A type clients can use to find out about render-thread activity and perform
frame pacing.
*/
#[derive(Debug, Clone)]
pub struct RenderReporter {
    imp: Arc<RenderReporterImpl>,
    fps: Observer<i32>,
    busy_ms: Observer<i32>,
}

impl RenderReporter {
    /// Iterations the loop has completed so far.  Mostly useful to observe
    /// that the loop is alive.
    pub fn iterations(&self) -> u64 {
        self.imp.iterations.load(Ordering::Relaxed)
    }

    pub fn fps(&self) -> &Observer<i32> {
        &self.fps
    }

    /// Average time spent running callbacks + flush per iteration, over
    /// recent samples.
    pub fn busy_ms(&self) -> &Observer<i32> {
        &self.busy_ms
    }
}

#[derive(Debug)]
struct RenderReporterImpl {
    iterations: AtomicU64,
    fps: Value<i32>,
    busy_ms: Value<i32>,
    history: Mutex<Vec<IterationInfo>>,
}

#[derive(Debug)]
struct RenderReporterSend {
    imp: Arc<RenderReporterImpl>,
}

impl RenderReporterSend {
    fn add_iteration(&self, start: Instant, end: Instant) {
        const MAX_HISTORY: usize = 60;
        self.imp.iterations.fetch_add(1, Ordering::Relaxed);

        let mut history = self.imp.history.lock().unwrap();
        history.push(IterationInfo { start, end });
        while history.len() > MAX_HISTORY {
            history.remove(0);
        }

        if history.len() > 1 {
            let mut total_interval = 0.0;
            for i in 1..history.len() {
                total_interval += history[i]
                    .start
                    .duration_since(history[i - 1].start)
                    .as_secs_f64();
            }
            let avg_interval = total_interval / (history.len() - 1) as f64;
            if avg_interval > 0.0 {
                self.imp.fps.set((1.0 / avg_interval).round() as i32);
            }
        }
        let total_busy_ms: i32 = history.iter().map(|i| i.busy_ms()).sum();
        self.imp.busy_ms.set(total_busy_ms / history.len() as i32);
    }
}

fn render_reporter() -> (RenderReporterSend, RenderReporter) {
    let fps = Value::new(0);
    let busy_ms = Value::new(0);

    let fps_observer = fps.observe();
    let busy_ms_observer = busy_ms.observe();

    let imp = Arc::new(RenderReporterImpl {
        iterations: AtomicU64::new(0),
        fps,
        busy_ms,
        history: Mutex::new(Vec::new()),
    });

    (
        RenderReporterSend { imp: imp.clone() },
        RenderReporter {
            imp,
            fps: fps_observer,
            busy_ms: busy_ms_observer,
        },
    )
}
