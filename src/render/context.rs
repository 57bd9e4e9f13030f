// SPDX-License-Identifier: MPL-2.0
//! Surface and device management for one output window.
//!
//! [`DisplayContext`] owns the graphics objects bound to a single window:
//! the surface, the device/queue pair, and the swapchain configuration.
//! Frame delivery is split in two so the shader stage can render in between:
//! [`DisplayContext::current_view`] acquires the swapchain texture and
//! [`DisplayContext::draw`] presents it.

use crate::error::{Error, Result};
use crate::port::view::SharedWindow;
use std::sync::Arc;

struct GpuState {
    window: SharedWindow,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
}

/// Graphics context for one window; at most one is live per presenter.
///
/// All methods take `&mut self`; the owning view serializes access. A second
/// [`init`](DisplayContext::init) tears the previous context down first, and
/// [`close`](DisplayContext::close) is idempotent.
#[derive(Default)]
pub struct DisplayContext {
    gpu: Option<GpuState>,
    /// Swapchain texture acquired by `current_view`, presented by `draw`.
    pending: Option<wgpu::SurfaceTexture>,
}

impl DisplayContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the surface, device, and swapchain for `window`.
    ///
    /// Any previous context is closed first. Each step failing aborts and
    /// leaves the context closed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Graphics`] when surface creation fails (for example
    /// a window whose platform handles are gone), when no adapter accepts
    /// the surface, or when no device is available.
    pub fn init(&mut self, window: SharedWindow) -> Result<()> {
        self.close();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(Arc::clone(&window))
            .map_err(|e| {
                log::error!("Surface creation failed: {e}");
                Error::Graphics(e.to_string())
            })?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|e| {
            log::error!("No suitable GPU adapter: {e}");
            Error::Graphics(e.to_string())
        })?;

        log::debug!("Using GPU: {}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("playhead device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
        }))
        .map_err(|e| {
            log::error!("Device request failed: {e}");
            Error::Graphics(e.to_string())
        })?;

        let caps = surface.get_capabilities(&adapter);
        // Decoded frames are already gamma-corrected; presenting through an
        // sRGB surface would apply gamma twice and darken the video.
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .unwrap_or(caps.formats[0]);

        let (width, height) = window.surface_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        self.gpu = Some(GpuState {
            window,
            surface,
            device,
            queue,
            config,
        });
        Ok(())
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.gpu.is_some()
    }

    /// Format of the swapchain, for building compatible pipelines.
    #[must_use]
    pub fn surface_format(&self) -> Option<wgpu::TextureFormat> {
        self.gpu.as_ref().map(|gpu| gpu.config.format)
    }

    /// Handles for recording GPU work. Cheap clones of internal references.
    #[must_use]
    pub fn device_queue(&self) -> Option<(wgpu::Device, wgpu::Queue)> {
        self.gpu
            .as_ref()
            .map(|gpu| (gpu.device.clone(), gpu.queue.clone()))
    }

    /// Acquires the swapchain texture for this frame and returns a view of
    /// it. Repeated calls before [`draw`](DisplayContext::draw) return views
    /// of the same texture.
    ///
    /// On an outdated or lost surface the swapchain is reconfigured to the
    /// window's current size and the acquire retried once. Returns `None`
    /// when uninitialized or when the surface stays unavailable.
    pub fn current_view(&mut self) -> Option<wgpu::TextureView> {
        let gpu = self.gpu.as_mut()?;

        if self.pending.is_none() {
            let frame = match gpu.surface.get_current_texture() {
                Ok(frame) => frame,
                Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                    let (width, height) = gpu.window.surface_size();
                    gpu.config.width = width.max(1);
                    gpu.config.height = height.max(1);
                    gpu.surface.configure(&gpu.device, &gpu.config);
                    gpu.surface.get_current_texture().ok()?
                }
                Err(e) => {
                    log::warn!("Swapchain texture unavailable: {e}");
                    return None;
                }
            };
            self.pending = Some(frame);
        }

        self.pending
            .as_ref()
            .map(|frame| frame.texture.create_view(&wgpu::TextureViewDescriptor::default()))
    }

    /// Presents the acquired frame (the buffer swap). No-op when nothing
    /// was acquired or the context is uninitialized.
    pub fn draw(&mut self) {
        if let Some(frame) = self.pending.take() {
            frame.present();
        }
    }

    /// Drops the surface, device, and any unpresented frame; idempotent.
    pub fn close(&mut self) {
        self.pending = None;
        self.gpu = None;
    }
}
