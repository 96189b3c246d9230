// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
wgpu backend.

The producer context owns a wgpu device/queue pair; swap images are
render-attachment textures.  On first present an image is exported for
cross-context sharing and imported into the compositor, after which each
present is a single `update_with_semaphores` call whose completion we hand
back to the pool unchanged.
*/

use crate::completion::PresentCompletion;
use crate::swapchain::swap_image::{
    Compositor, Error, FrameHandle, GpuInteropContext, ImageHandle, ImageSize, ImportedImage,
    ImportedSemaphore, SemaphoreHandle, SwapImage,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

//Opaque export handles.  The real values are owned by the driver; we only
//need process-unique tokens to key the compositor's import tables.
static NEXT_EXPORT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn next_export_handle() -> u64 {
    NEXT_EXPORT_HANDLE.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, thiserror::Error)]
pub enum CreateContextError {
    #[error("{0}")]
    RequestAdapter(#[from] wgpu::RequestAdapterError),
    #[error("{0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

/**
Producer-side GPU context backed by wgpu.
*/
pub struct InteropContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    compositor: Arc<dyn Compositor>,
}

impl std::fmt::Debug for InteropContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteropContext")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl InteropContext {
    pub async fn new(compositor: Arc<dyn Compositor>) -> Result<Self, CreateContextError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::from_env_or_default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await?;
        logwise::info_sync!(
            "Using adapter {adapter}",
            adapter = logwise::privacy::LogIt(&adapter.get_info())
        );
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("frames_in_flight"),
                required_features: Default::default(),
                required_limits: Default::default(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;
        Ok(InteropContext {
            device,
            queue,
            compositor,
        })
    }
}

impl GpuInteropContext for InteropContext {
    fn create_image(&self, size: ImageSize) -> Result<Box<dyn SwapImage>, Error> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("swap image"),
            size: wgpu::Extent3d {
                width: size.width as u32,
                height: size.height as u32,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Bgra8UnormSrgb,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        Ok(Box::new(WgpuSwapImage {
            size,
            texture,
            compositor: self.compositor.clone(),
            exported: None,
        }))
    }

    fn flush(&self) {
        self.queue.submit(std::iter::empty());
        let _ = self.device.poll(wgpu::PollType::Poll);
    }
}

#[derive(Debug)]
struct ExportedImage {
    handle: FrameHandle,
    image: ImportedImage,
    available: ImportedSemaphore,
    render_complete: ImportedSemaphore,
}

pub struct WgpuSwapImage {
    size: ImageSize,
    texture: wgpu::Texture,
    compositor: Arc<dyn Compositor>,
    exported: Option<ExportedImage>,
}

impl std::fmt::Debug for WgpuSwapImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuSwapImage")
            .field("size", &self.size)
            .field("exported", &self.exported)
            .finish_non_exhaustive()
    }
}

impl WgpuSwapImage {
    /// The texture to target when drawing this image's contents.
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    //Export on first present, import into the compositor once.  Handles are
    //stable for the image's lifetime so the compositor's import caches stay
    //valid.
    fn ensure_exported(&mut self) {
        if self.exported.is_none() {
            let handle = FrameHandle {
                image: ImageHandle(next_export_handle()),
                available: SemaphoreHandle(next_export_handle()),
                render_complete: SemaphoreHandle(next_export_handle()),
                memory_size: self.size.estimated_memory_size(),
                size: self.size,
            };
            let image = self.compositor.import_image(handle.image, &handle);
            let available = self.compositor.import_semaphore(handle.available);
            let render_complete = self.compositor.import_semaphore(handle.render_complete);
            logwise::trace_sync!(
                "Exported swap image {handle}",
                handle = logwise::privacy::LogIt(&handle)
            );
            self.exported = Some(ExportedImage {
                handle,
                image,
                available,
                render_complete,
            });
        }
    }
}

impl SwapImage for WgpuSwapImage {
    fn size(&self) -> ImageSize {
        self.size
    }

    fn begin_draw(&mut self) {
        //the texture is reusable as-is once the prior present settled; no
        //per-draw setup is needed here.
    }

    fn present(&mut self, _size: ImageSize) -> PresentCompletion {
        self.ensure_exported();
        let exported = self
            .exported
            .as_ref()
            .expect("ensure_exported populates this");
        self.compositor.update_with_semaphores(
            &exported.image,
            &exported.render_complete,
            &exported.available,
        )
    }

    fn frame_handle(&self) -> Option<FrameHandle> {
        self.exported.as_ref().map(|e| e.handle)
    }
}
