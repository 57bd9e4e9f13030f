// SPDX-License-Identifier: MPL-2.0
//! wgpu presentation pipeline for decoded video frames.
//!
//! Three cooperating parts sit behind one "draw a frame" operation:
//!
//! - [`DisplayContext`]: owns the surface, device, and queue for one window
//! - [`YuvRenderer`]: compiles the YUV→RGB programs and manages the plane
//!   textures they sample
//! - [`FramePresenter`]: composes the two and presents one frame per call
//!
//! [`WindowVideoView`] wraps a presenter behind the [`crate::port::VideoView`]
//! contract, creating it lazily from the first rendered frame's layout.
//!
//! The three parts share the view's single lock rather than each holding
//! their own; nothing here calls back out while mutating, so the composition
//! cannot deadlock against itself.

pub mod context;
pub mod facade;
pub mod shader;
pub mod view;

pub use context::DisplayContext;
pub use facade::FramePresenter;
pub use shader::YuvRenderer;
pub use view::WindowVideoView;
