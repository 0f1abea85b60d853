//! Frame and line synchronization state machine.
//!
//! The decoder is fed one `Sample` at a time and reports what happened. It never waits itself;
//! timeouts and cancellation belong to the session driving it.

use super::sampler::{BytePhase, Sample, WordAssembler};
use crate::color::PixelWord;
use crate::pins::SyncPolarity;
use core::fmt;

/// Decoder state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncState {
    /// Waiting for the frame-start edge.
    AwaitingFrame,
    /// Waiting for the next line-start edge.
    AwaitingLine,
    /// Sampling pixel data of the current line.
    InLine,
    /// Every word received, waiting for the last line to be released.
    AwaitingLineEnd,
    /// Every row has been received and the last line released.
    FrameComplete,
}

/// Signal the decoder needs next to make progress.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Signal {
    FrameSync,
    LineSync,
    PixelClock,
}

/// Position of the decoder within the frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Cursor {
    /// Current row, equal to the number of completed lines.
    pub row: u16,
    /// Current column within the row.
    pub column: u16,
    /// Half of the pixel word the next byte fills.
    pub phase: BytePhase,
}

impl Cursor {
    /// Number of lines fully received.
    pub fn completed_lines(&self) -> u16 {
        self.row
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {}, column {}, {:?} byte",
            self.row, self.column, self.phase
        )
    }
}

/// Ordering violations detected while decoding.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncFault {
    /// A frame-start edge arrived before the current frame was complete.
    UnexpectedFrameSync,
    /// Line sync was released before the line was complete (dropped pixel clock edges).
    LineUnderrun { expected: u16, received: u16 },
    /// A pixel clock edge arrived after the last column while the line was still asserted.
    LineOverrun,
}

impl fmt::Display for SyncFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedFrameSync => write!(f, "frame sync in the middle of a frame"),
            Self::LineUnderrun { expected, received } => write!(
                f,
                "line ended after {received} of {expected} pixels"
            ),
            Self::LineOverrun => write!(f, "extra pixel clock edges after the last column"),
        }
    }
}

/// Result of feeding one sample.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncEvent {
    /// Nothing the decoder was waiting for happened.
    Idle,
    FrameStart,
    LineStart,
    /// The high byte of a pixel was latched.
    HighByte,
    /// A complete word for cell (`row`, `col`).
    Word { row: u16, col: u16, word: PixelWord },
    /// The last line was released with the expected number of words.
    FrameEnd,
}

/// Tracks frame and line boundaries from consecutive snapshots of the capture lines.
#[derive(Clone, Debug)]
pub struct SyncDecoder {
    width: u16,
    height: u16,
    polarity: SyncPolarity,
    state: SyncState,
    row: u16,
    column: u16,
    assembler: WordAssembler,
    /// Previous snapshot, used for edge detection.
    previous: Option<Sample>,
    /// Set after the last column of a line until line sync is released.
    trailing: bool,
}

impl SyncDecoder {
    pub fn new(width: u16, height: u16, polarity: SyncPolarity) -> Self {
        SyncDecoder {
            width,
            height,
            polarity,
            state: SyncState::AwaitingFrame,
            row: 0,
            column: 0,
            assembler: WordAssembler::new(),
            previous: None,
            trailing: false,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn cursor(&self) -> Cursor {
        Cursor {
            row: self.row,
            column: self.column,
            phase: self.assembler.phase(),
        }
    }

    /// Signal the decoder is currently waiting on.
    pub fn waiting_for(&self) -> Signal {
        match self.state {
            SyncState::AwaitingFrame => Signal::FrameSync,
            SyncState::AwaitingLine | SyncState::AwaitingLineEnd => Signal::LineSync,
            SyncState::InLine | SyncState::FrameComplete => Signal::PixelClock,
        }
    }

    /// Return to `AwaitingFrame` for a fresh capture. The last snapshot is kept, the lines
    /// keep their levels between captures.
    pub fn reset(&mut self) {
        self.state = SyncState::AwaitingFrame;
        self.row = 0;
        self.column = 0;
        self.assembler.reset();
        self.trailing = false;
    }

    /// Feed the next snapshot.
    pub fn step(&mut self, sample: Sample) -> Result<SyncEvent, SyncFault> {
        // The first snapshot only establishes the line levels
        let previous = match self.previous.replace(sample) {
            Some(previous) => previous,
            None => return Ok(SyncEvent::Idle),
        };

        let frame_edge = self
            .polarity
            .frame_sync
            .is_edge(previous.frame_sync, sample.frame_sync);
        let line_edge = self
            .polarity
            .line_sync
            .is_edge(previous.line_sync, sample.line_sync);
        let clock_edge = self
            .polarity
            .pixel_clock
            .is_edge(previous.pixel_clock, sample.pixel_clock);
        let line_asserted = self.polarity.line_sync.is_asserted(sample.line_sync);

        match self.state {
            SyncState::AwaitingFrame => {
                if frame_edge {
                    self.row = 0;
                    self.column = 0;
                    self.trailing = false;
                    self.state = SyncState::AwaitingLine;
                    return Ok(SyncEvent::FrameStart);
                }
                Ok(SyncEvent::Idle)
            }
            SyncState::AwaitingLine => {
                if frame_edge {
                    return Err(SyncFault::UnexpectedFrameSync);
                }

                if self.trailing {
                    if !line_asserted {
                        self.trailing = false;
                    } else if clock_edge {
                        return Err(SyncFault::LineOverrun);
                    }
                }

                if line_edge {
                    self.column = 0;
                    self.assembler.reset();
                    self.state = SyncState::InLine;

                    // Data may already be valid on the same snapshot as the line start
                    if clock_edge {
                        self.latch(sample.data);
                    }
                    return Ok(SyncEvent::LineStart);
                }
                Ok(SyncEvent::Idle)
            }
            SyncState::InLine => {
                if frame_edge {
                    return Err(SyncFault::UnexpectedFrameSync);
                }
                if !line_asserted {
                    return Err(SyncFault::LineUnderrun {
                        expected: self.width,
                        received: self.column,
                    });
                }
                if clock_edge {
                    return Ok(self.latch(sample.data));
                }
                Ok(SyncEvent::Idle)
            }
            SyncState::AwaitingLineEnd => {
                if frame_edge {
                    return Err(SyncFault::UnexpectedFrameSync);
                }
                if !line_asserted {
                    self.trailing = false;
                    self.state = SyncState::FrameComplete;
                    return Ok(SyncEvent::FrameEnd);
                }
                if clock_edge {
                    return Err(SyncFault::LineOverrun);
                }
                Ok(SyncEvent::Idle)
            }
            SyncState::FrameComplete => Ok(SyncEvent::Idle),
        }
    }

    /// Take one data byte on a pixel clock edge.
    fn latch(&mut self, byte: u8) -> SyncEvent {
        let word = match self.assembler.push(byte) {
            Some(word) => word,
            None => return SyncEvent::HighByte,
        };

        let (row, col) = (self.row, self.column);
        self.column += 1;

        if self.column == self.width {
            self.row += 1;
            self.trailing = true;
            self.state = if self.row == self.height {
                SyncState::AwaitingLineEnd
            } else {
                SyncState::AwaitingLine
            };
        }

        SyncEvent::Word { row, col, word }
    }
}
