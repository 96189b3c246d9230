/*! The swap-image pool and the presentation protocol built on top of it. */

pub mod cycle;
pub mod pool;
pub mod swap_image;

pub use cycle::{DrawTurn, PresentationCycle};
pub use pool::{ImageId, ImagePool, PooledImage};
pub use swap_image::{
    Compositor, Error, FrameHandle, GpuInteropContext, ImageHandle, ImageSize, ImportedImage,
    ImportedSemaphore, SemaphoreHandle, SwapImage,
};
