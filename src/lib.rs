//! Still-image capture from an OV7670 camera sensor wired to plain GPIO pins.
//!
//! Bring-up: start the sensor clock (`clock`), optionally pulse reset/power-down and configure
//! the sensor over SCCB (`ov7670`). Capture: a `parallel::CaptureSession` samples the sync,
//! clock and data lines and fills a `frame_buf::FrameBuffer`. Export: `export::write_ppm` writes
//! the finished frame through `nvm`.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod clock;
pub mod color;
pub mod export;
pub mod frame_buf;
pub mod nvm;
pub mod pins;
pub mod probe;

/// Drivers and helper functions for using the OV7670.
pub mod ov7670;

/// Software capture of the parallel data bus.
pub mod parallel;

#[cfg(test)]
mod mock;

pub use frame_buf::{Frame, FrameBuffer};
pub use parallel::{CaptureConfig, CaptureError, CaptureSession};
