/*! frames_in_flight is a cross-context presentation layer for GPU renderers.

It solves an unglamorous but persistent problem: a producer that renders
frames and a consumer (compositor) that displays them live on different
threads, often in different GPU contexts, and must exchange images without
anyone blocking on anyone else.  This crate supplies the moving parts:

| Part | What it does |
|------|--------------|
| [`swapchain::ImagePool`] | Reuses swap images whose prior presents have settled, prunes broken and wrongly-sized ones, allocates when reuse would stall |
| [`swapchain::PresentationCycle`] | One acquire/draw/present/release turn with at-most-once present and return-to-pool on drop |
| [`coordinator::FrameRequestCoordinator`] | Idle/Rendering/Swapping handshake between a UI thread and the render thread, latest-wins for queued resizes |
| [`render_thread::RenderThread`] | A dedicated ~60Hz loop running queued render callbacks with per-callback panic isolation |
| [`completion::PresentCompletion`] | An observable one-shot for "the consumer is done with this image" |

The design premise is that presents settle asynchronously: the producer never
waits on a present before starting its next frame, and the pool only hands
back an image once the consumer has genuinely finished with it.  The one
deliberate throttle is the pool's reuse rule, which allocates rather than
reuse the sole ready image, so the consumer always holds at least one
displayable frame while the producer draws.

# Backends

Development targets [wgpu](https://wgpu.rs); the `backend_wgpu` feature (on by
default) provides [`InteropContext`] over a wgpu device/queue pair.  With the
feature off, a software no-op backend takes its place.  Application-specific
backends can implement [`swapchain::GpuInteropContext`] directly, which is
also how the test suite exercises the rest of the crate.
*/

pub mod completion;
pub mod coordinator;
pub mod render_thread;
pub mod swapchain;

mod imp;

pub use imp::{CreateContextError, InteropContext};
#[cfg(feature = "backend_wgpu")]
pub use imp::WgpuSwapImage;

pub use completion::{CompletionSender, CompletionStatus, PresentCompletion, completion};
pub use coordinator::{CoordinatorCallbacks, CoordinatorState, FrameRequestCoordinator};
pub use render_thread::{RenderReporter, RenderThread};
pub use swapchain::{
    Compositor, DrawTurn, GpuInteropContext, ImagePool, ImageSize, PresentationCycle, SwapImage,
};
