//! Daily photo frame on an IT8951 e-paper panel.
//!
//! - [`pipeline`] turns any photo into a 16-level, panel-sized [`FrameBuffer`]
//! - [`artifact`] stores those frames as grayscale PNGs
//! - [`it8951`] drives the panel controller over SPI
//! - [`slideshow`] keeps the panel showing photos from a [`catalog`]

pub mod artifact;
pub mod catalog;
pub mod config;
pub mod error;
pub mod frame;
pub mod it8951;
pub mod pipeline;
pub mod slideshow;

pub use error::{Error, Result};
pub use frame::{Area, FrameBuffer, PanelGeometry};
