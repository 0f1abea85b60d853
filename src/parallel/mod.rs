//! Software capture of the OV7670 parallel data bus.
//!
//! There is no capture peripheral: a `CaptureSession` polls a `SignalPort` for snapshots of
//! VSYNC, HREF, PCLK and D0-D7, feeds them to the `SyncDecoder` and places assembled words in a
//! `FrameBuffer`. Every poll is bounded by a per-edge timeout and an optional cancel flag.

pub mod sampler;
pub mod sync;

use crate::frame_buf::{Frame, FrameBuffer};
use crate::pins::SyncPolarity;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use log::{debug, info, warn};
use sampler::SignalPort;
use sync::{Cursor, Signal, SyncDecoder, SyncEvent, SyncFault, SyncState};

/// Default number of polls allowed without progress on the awaited signal.
pub const DEFAULT_EDGE_TIMEOUT: u32 = 1_000_000;

/// Capture settings.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CaptureConfig {
    /// Triggering edge of each sync signal.
    pub polarity: SyncPolarity,
    /// Maximum number of polls without seeing the awaited edge before giving up.
    pub edge_timeout: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            polarity: SyncPolarity::default(),
            edge_timeout: DEFAULT_EDGE_TIMEOUT,
        }
    }
}

/// Capture errors.
#[derive(Debug, Eq, PartialEq)]
pub enum CaptureError<E> {
    /// Reading the capture lines failed.
    Port(E),
    /// The awaited edge did not arrive within the configured number of polls.
    SyncTimeout { waiting_for: Signal, cursor: Cursor },
    /// The sync signals arrived out of order.
    Sync { fault: SyncFault, cursor: Cursor },
    /// The cancel flag was raised.
    Cancelled { cursor: Cursor },
}

impl<E> CaptureError<E> {
    /// Whether a fresh capture attempt can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SyncTimeout { .. } | Self::Sync { .. })
    }

    /// Decoder position when the capture was aborted.
    pub fn cursor(&self) -> Option<Cursor> {
        match self {
            Self::SyncTimeout { cursor, .. }
            | Self::Sync { cursor, .. }
            | Self::Cancelled { cursor } => Some(*cursor),
            Self::Port(_) => None,
        }
    }
}

impl<E: fmt::Debug> fmt::Display for CaptureError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Port(e) => write!(f, "capture port error: {e:?}"),
            Self::SyncTimeout {
                waiting_for,
                cursor,
            } => write!(f, "timed out waiting for {waiting_for:?} at {cursor}"),
            Self::Sync { fault, cursor } => write!(f, "{fault} at {cursor}"),
            Self::Cancelled { cursor } => write!(f, "capture cancelled at {cursor}"),
        }
    }
}

/// Exclusive owner of the capture lines and the target frame buffer for one sensor.
///
/// The port is moved in, so nothing else can read the pins while the session exists. Use
/// `into_parts` to get them back.
pub struct CaptureSession<'a, 'c, P> {
    port: P,
    buffer: FrameBuffer<'a>,
    decoder: SyncDecoder,
    config: CaptureConfig,
    cancel: Option<&'c AtomicBool>,
}

impl<'a, 'c, P: SignalPort> CaptureSession<'a, 'c, P> {
    /// Creates a session capturing frames with the buffer's geometry.
    pub fn new(port: P, buffer: FrameBuffer<'a>, config: CaptureConfig) -> Self {
        let decoder = SyncDecoder::new(buffer.width(), buffer.height(), config.polarity);
        CaptureSession {
            port,
            buffer,
            decoder,
            config,
            cancel: None,
        }
    }

    /// Abort any capture in progress as soon as `flag` is set.
    pub fn with_cancel(mut self, flag: &'c AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Position of the decoder, for diagnostics.
    pub fn cursor(&self) -> Cursor {
        self.decoder.cursor()
    }

    /// Capture one complete frame. On any error the buffer is left empty.
    pub fn capture(&mut self) -> Result<Frame<'_>, CaptureError<P::Error>> {
        self.run()?;
        Ok(self.completed())
    }

    /// Capture one frame, starting over from the frame sync up to `attempts` times when the
    /// sensor times out or the sync signals are out of order.
    pub fn capture_with_retries(
        &mut self,
        attempts: u8,
    ) -> Result<Frame<'_>, CaptureError<P::Error>> {
        let mut attempt = 1;
        loop {
            match self.run() {
                Ok(()) => return Ok(self.completed()),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!("capture attempt {} failed: {:?}", attempt, e.cursor());
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Get back the port and the frame buffer.
    pub fn into_parts(self) -> (P, FrameBuffer<'a>) {
        (self.port, self.buffer)
    }

    /// The frame filled by the last successful `run`.
    fn completed(&self) -> Frame<'_> {
        // `run` only succeeds once the decoder has placed the last cell
        match self.buffer.frame() {
            Some(frame) => frame,
            None => unreachable!("capture finished with an incomplete frame buffer"),
        }
    }

    /// Drive the decoder until the frame is complete or the capture fails.
    fn run(&mut self) -> Result<(), CaptureError<P::Error>> {
        self.decoder.reset();
        self.buffer.begin();
        debug!(
            "capture start: {}x{}",
            self.buffer.width(),
            self.buffer.height()
        );

        let result = self.poll_frame();
        if let Err(e) = &result {
            // Never leave a partial frame behind
            self.buffer.discard();
            warn!("capture aborted: {:?}", e.cursor());
        } else {
            info!("frame captured: {} words", self.buffer.placed());
        }
        result
    }

    fn poll_frame(&mut self) -> Result<(), CaptureError<P::Error>> {
        let mut idle_polls = 0u32;

        while self.decoder.state() != SyncState::FrameComplete {
            if self.is_cancelled() {
                return Err(CaptureError::Cancelled {
                    cursor: self.decoder.cursor(),
                });
            }

            let sample = self.port.sample().map_err(CaptureError::Port)?;

            match self.decoder.step(sample) {
                Ok(SyncEvent::Idle) => {
                    if idle_polls >= self.config.edge_timeout {
                        return Err(CaptureError::SyncTimeout {
                            waiting_for: self.decoder.waiting_for(),
                            cursor: self.decoder.cursor(),
                        });
                    }
                    idle_polls += 1;
                }
                Ok(SyncEvent::Word { row, col, word }) => {
                    idle_polls = 0;
                    self.buffer.place(row, col, word);
                }
                Ok(SyncEvent::FrameStart) => {
                    idle_polls = 0;
                    debug!("frame sync");
                }
                Ok(SyncEvent::FrameEnd) => debug!("last line released"),
                Ok(SyncEvent::LineStart) | Ok(SyncEvent::HighByte) => idle_polls = 0,
                Err(fault) => {
                    return Err(CaptureError::Sync {
                        fault,
                        cursor: self.decoder.cursor(),
                    })
                }
            }
        }

        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}
