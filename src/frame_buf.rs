//! Fixed-size frame buffer filled in scan order by a capture session.

use crate::color::{to_rgb565, to_rgb888, PixelWord};
use core::fmt;
use embedded_graphics::{
    draw_target::DrawTarget,
    geometry::{Dimensions, OriginDimensions, Size},
    image::ImageDrawable,
    pixelcolor::{Rgb565, Rgb888},
    primitives::{PointsIter, Rectangle},
    Pixel,
};

/// Lifecycle of a `FrameBuffer`. A buffer is only readable in the `Complete` state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BufferState {
    /// No capture attempted, or the last one was discarded.
    Empty,
    /// A capture is placing words.
    Filling,
    /// Every cell has been written exactly once.
    Complete,
}

/// Frame buffer construction errors.
#[derive(Debug, Eq, PartialEq)]
pub enum FrameBufferError {
    /// Width or height is zero.
    ZeroSize,
    /// Storage holds fewer words than `width * height`.
    BufferTooSmall { needed: usize, available: usize },
}

impl fmt::Display for FrameBufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroSize => write!(f, "frame width and height must be non-zero"),
            Self::BufferTooSmall { needed, available } => write!(
                f,
                "frame storage too small: {needed} words needed, {available} available"
            ),
        }
    }
}

/// `FrameBuffer` is initialized with caller-owned storage and the frame geometry. The storage is
/// usually a static SRAM region on a microcontroller, or a plain `Vec` on a host.
#[derive(Debug)]
pub struct FrameBuffer<'a> {
    /// Backing memory; only the first `width * height` words are used.
    storage: &'a mut [PixelWord],

    /// Number of columns. Does not change after calling `new`.
    width: u16,

    /// Number of rows. Does not change after calling `new`.
    height: u16,

    /// Number of words placed during the current capture.
    placed: usize,

    state: BufferState,
}

impl<'a> FrameBuffer<'a> {
    /// Creates a new, empty frame buffer.
    pub fn new(
        storage: &'a mut [PixelWord],
        width: u16,
        height: u16,
    ) -> Result<Self, FrameBufferError> {
        if width == 0 || height == 0 {
            return Err(FrameBufferError::ZeroSize);
        }

        let needed = usize::from(width) * usize::from(height);
        if storage.len() < needed {
            return Err(FrameBufferError::BufferTooSmall {
                needed,
                available: storage.len(),
            });
        }

        Ok(FrameBuffer {
            storage,
            width,
            height,
            placed: 0,
            state: BufferState::Empty,
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Total number of cells in the frame.
    pub fn len(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }

    /// Always `false`, a buffer has at least one cell.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    /// Number of words placed so far in the current capture.
    pub fn placed(&self) -> usize {
        self.placed
    }

    /// Start a new capture. Any previous content is invalidated.
    pub fn begin(&mut self) {
        self.placed = 0;
        self.state = BufferState::Filling;
    }

    /// Write the next cell. Cells must be placed exactly once each, in row-major order, while
    /// a capture is in progress.
    ///
    /// # Panics
    ///
    /// Panics on a placement outside of a capture or out of scan order. The decoder guarantees
    /// ordering, so this is a contract violation and never a runtime condition.
    pub fn place(&mut self, row: u16, col: u16, word: PixelWord) {
        assert_eq!(
            self.state,
            BufferState::Filling,
            "placement outside of a capture"
        );

        let index = usize::from(row) * usize::from(self.width) + usize::from(col);
        assert!(
            col < self.width && index == self.placed,
            "out of order placement at ({}, {}), expected cell {}",
            row,
            col,
            self.placed
        );

        self.storage[index] = word;
        self.placed += 1;

        if self.placed == self.len() {
            self.state = BufferState::Complete;
        }
    }

    /// Drop the current content, partially filled or not.
    pub fn discard(&mut self) {
        self.placed = 0;
        self.state = BufferState::Empty;
    }

    /// Read-only view of the frame, only available once every cell has been written.
    pub fn frame(&self) -> Option<Frame<'_>> {
        match self.state {
            BufferState::Complete => Some(Frame {
                width: self.width,
                height: self.height,
                words: &self.storage[..self.len()],
            }),
            _ => None,
        }
    }
}

/// A complete, captured frame.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    width: u16,
    height: u16,
    words: &'a [PixelWord],
}

impl<'a> Frame<'a> {
    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// All words in row-major order.
    pub fn words(&self) -> &'a [PixelWord] {
        self.words
    }

    /// Raw word at column `x`, row `y`.
    pub fn word_at(&self, x: u16, y: u16) -> Option<PixelWord> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.words
            .get(usize::from(y) * usize::from(self.width) + usize::from(x))
            .copied()
    }

    /// Converted color at column `x`, row `y`.
    pub fn pixel_at(&self, x: u16, y: u16) -> Option<Rgb888> {
        self.word_at(x, y).map(to_rgb888)
    }

    /// Iterate over rows, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &'a [PixelWord]> {
        self.words.chunks_exact(usize::from(self.width))
    }
}

impl OriginDimensions for Frame<'_> {
    fn size(&self) -> Size {
        Size::new(self.width.into(), self.height.into())
    }
}

/// Allow a captured frame to be drawn on any RGB565 display.
impl ImageDrawable for Frame<'_> {
    type Color = Rgb565;

    fn draw<D>(&self, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Self::Color>,
    {
        target.fill_contiguous(
            &self.bounding_box(),
            self.words.iter().map(|&word| to_rgb565(word)),
        )
    }

    fn draw_sub_image<D>(&self, target: &mut D, area: &Rectangle) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Self::Color>,
    {
        let area = area.intersection(&self.bounding_box());
        let origin = area.top_left;

        target.draw_iter(area.points().filter_map(|point| {
            let x = u16::try_from(point.x).ok()?;
            let y = u16::try_from(point.y).ok()?;
            let word = self.word_at(x, y)?;
            Some(Pixel(point - origin, to_rgb565(word)))
        }))
    }
}
