// SPDX-License-Identifier: MIT OR Apache-2.0
//! Observable one-shot completion handles.
//!
//! A [`PresentCompletion`] stands for "the consumer is still reading this
//! frame" - the asynchronous tail of a present operation that an external
//! compositor finishes on its own schedule.  The pool never blocks on these;
//! it polls [`PresentCompletion::status`] during its reuse scans and only
//! awaits them (with a bound) during teardown.
//!
//! The handle side is freely cloneable and can be observed from any thread.
//! The [`CompletionSender`] side is single-use by construction: `resolve` and
//! `fault` consume it, so a present can settle at most once.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const PENDING: u8 = 0;
const COMPLETE: u8 = 1;
const FAULTED: u8 = 2;

/// How far along a present operation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionStatus {
    /// The consumer has not finished with the frame.
    Pending,
    /// The consumer displayed the frame.
    Complete,
    /// The consumer-side import or display failed.
    Faulted,
}

impl CompletionStatus {
    /// True for both `Complete` and `Faulted` - the consumer is done with the
    /// frame either way.
    pub fn is_settled(&self) -> bool {
        !matches!(self, CompletionStatus::Pending)
    }
}

#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    fault: Mutex<Option<String>>,
    wake_list: Mutex<Vec<r#continue::Sender<()>>>,
}

impl Shared {
    fn new(state: u8) -> Self {
        Shared {
            state: AtomicU8::new(state),
            fault: Mutex::new(None),
            wake_list: Mutex::new(Vec::new()),
        }
    }
}

/**
The settling side of a present operation.

Held by whoever performs the consumer-side display (a compositor adapter, a
GPU work-done callback).  Consumed on use, so each present settles at most
once.
*/
#[derive(Debug)]
pub struct CompletionSender {
    shared: Arc<Shared>,
}

impl CompletionSender {
    /// The consumer displayed the frame; the image may be reused.
    pub fn resolve(self) {
        self.settle(COMPLETE);
    }

    /// The consumer-side operation failed.  The pool will discard the image on
    /// its next scan.
    pub fn fault(self, message: impl Into<String>) {
        self.shared.fault.lock().unwrap().replace(message.into());
        self.settle(FAULTED);
    }

    fn settle(&self, state: u8) {
        //publish the state before draining wakers, so a woken waiter
        //observes the settled status
        self.shared.state.store(state, Ordering::Release);
        let take = self
            .shared
            .wake_list
            .lock()
            .unwrap()
            .drain(..)
            .collect::<Vec<_>>();
        for sender in take {
            sender.send(());
        }
    }
}

/**
An observable handle to an in-flight present operation.

Cloneable; all clones observe the same settling.  Status checks are
non-blocking - this is what makes the pool's reuse scan cheap.
*/
#[derive(Debug, Clone)]
pub struct PresentCompletion {
    shared: Arc<Shared>,
}

/// Creates a pending completion, returning the settle side and the observe
/// side.
pub fn completion() -> (CompletionSender, PresentCompletion) {
    let shared = Arc::new(Shared::new(PENDING));
    (
        CompletionSender {
            shared: shared.clone(),
        },
        PresentCompletion { shared },
    )
}

impl PresentCompletion {
    /// An already-successful completion.  Used for skipped frames so callers
    /// can treat "no frame this cycle" uniformly.
    pub fn resolved() -> Self {
        PresentCompletion {
            shared: Arc::new(Shared::new(COMPLETE)),
        }
    }

    /// An already-failed completion.
    pub fn faulted(message: impl Into<String>) -> Self {
        let shared = Shared::new(FAULTED);
        shared.fault.lock().unwrap().replace(message.into());
        PresentCompletion {
            shared: Arc::new(shared),
        }
    }

    /// Non-blocking status check.
    pub fn status(&self) -> CompletionStatus {
        match self.shared.state.load(Ordering::Acquire) {
            PENDING => CompletionStatus::Pending,
            COMPLETE => CompletionStatus::Complete,
            FAULTED => CompletionStatus::Faulted,
            other => panic!("Invalid completion state: {other}"),
        }
    }

    /// The fault message, if the completion settled in a faulted state.
    pub fn fault_message(&self) -> Option<String> {
        self.shared.fault.lock().unwrap().clone()
    }

    /// Waits until the completion settles.
    pub async fn wait(&self) {
        loop {
            //insert into the wake list first, then check, so we can't miss
            //a settle between the check and the insert
            let o = {
                let mut wake_list = self.shared.wake_list.lock().unwrap();
                if self.status().is_settled() {
                    Ok(())
                } else {
                    let (s, r) = r#continue::continuation();
                    wake_list.push(s);
                    Err(r)
                }
            };
            match o {
                Ok(()) => return,
                Err(r) => r.await,
            }
        }
    }

    /// Waits until the completion settles, giving up after `timeout`.
    ///
    /// Returns true if the completion settled, false on timeout.  Teardown
    /// paths use this so a consumer that never finishes a present cannot hang
    /// the pool forever.
    pub async fn wait_with_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.status().is_settled() {
            if Instant::now() >= deadline {
                return false;
            }
            portable_async_sleep::async_sleep(Duration::from_millis(10)).await;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settle_is_observable() {
        let (sender, handle) = completion();
        assert_eq!(handle.status(), CompletionStatus::Pending);
        assert!(!handle.status().is_settled());
        sender.resolve();
        assert_eq!(handle.status(), CompletionStatus::Complete);
    }

    #[test]
    fn fault_carries_message() {
        let (sender, handle) = completion();
        let observer = handle.clone();
        sender.fault("device lost");
        assert_eq!(observer.status(), CompletionStatus::Faulted);
        assert_eq!(observer.fault_message().as_deref(), Some("device lost"));
    }

    #[test]
    fn wait_resumes_on_settle() {
        let (sender, handle) = completion();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            sender.resolve();
        });
        test_executors::sleep_on(async move {
            handle.wait().await;
            assert_eq!(handle.status(), CompletionStatus::Complete);
        });
    }

    #[test]
    fn wait_with_timeout_gives_up() {
        let (_sender, handle) = completion();
        test_executors::sleep_on(async move {
            let settled = handle.wait_with_timeout(Duration::from_millis(50)).await;
            assert!(!settled);
        });
    }

    #[test]
    fn presettled_constructors() {
        assert_eq!(
            PresentCompletion::resolved().status(),
            CompletionStatus::Complete
        );
        assert_eq!(
            PresentCompletion::faulted("nope").status(),
            CompletionStatus::Faulted
        );
    }
}
