//! Binary PPM (P6) export of captured frames.

use crate::color::to_rgb888;
use crate::frame_buf::Frame;
use crate::nvm::{Mem, NonVolatileMemory};
use core::fmt::{self, Write};
use embedded_graphics::pixelcolor::RgbColor;
use heapless::String;
use log::info;

/// Pixels converted per memory write.
const CHUNK_PIXELS: usize = 64;

/// Largest channel value written.
pub const MAX_VALUE: u16 = 255;

/// Width, height and maximum channel value of a binary PPM image.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PpmHeader {
    pub width: u16,
    pub height: u16,
    pub max_value: u16,
}

/// PPM header errors.
#[derive(Debug, Eq, PartialEq)]
pub enum PpmError {
    /// Data does not start with `P6`.
    BadMagic,
    /// A dimension or the maximum value is not a decimal number that fits.
    BadNumber,
    /// Only single byte channels are supported.
    UnsupportedMaxValue(u16),
    /// Data ends inside the header.
    Truncated,
    /// The header does not fit in the formatting buffer.
    Format,
}

impl fmt::Display for PpmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic => write!(f, "not a binary PPM image"),
            Self::BadNumber => write!(f, "malformed number in PPM header"),
            Self::UnsupportedMaxValue(v) => write!(f, "unsupported PPM maximum value {v}"),
            Self::Truncated => write!(f, "truncated PPM header"),
            Self::Format => write!(f, "PPM header too long"),
        }
    }
}

impl PpmHeader {
    pub fn for_frame(frame: &Frame<'_>) -> Self {
        PpmHeader {
            width: frame.width(),
            height: frame.height(),
            max_value: MAX_VALUE,
        }
    }

    /// Number of payload bytes following the header.
    pub fn payload_len(&self) -> usize {
        usize::from(self.width) * usize::from(self.height) * 3
    }

    /// Header text, `P6\n<W> <H>\n255\n`.
    pub fn render(&self) -> Result<String<24>, PpmError> {
        let mut text = String::new();
        write!(text, "P6\n{} {}\n{}\n", self.width, self.height, self.max_value)
            .map_err(|_| PpmError::Format)?;
        Ok(text)
    }

    /// Parse a header, returning it with the offset of the first payload byte. Comments
    /// (`#` to end of line) are skipped.
    pub fn parse(data: &[u8]) -> Result<(PpmHeader, usize), PpmError> {
        let mut pos = 0;

        let magic = next_token(data, &mut pos)?;
        if magic != b"P6" {
            return Err(PpmError::BadMagic);
        }

        let width = parse_number(next_token(data, &mut pos)?)?;
        let height = parse_number(next_token(data, &mut pos)?)?;
        let max_value = parse_number(next_token(data, &mut pos)?)?;
        if max_value == 0 || max_value > MAX_VALUE {
            return Err(PpmError::UnsupportedMaxValue(max_value));
        }

        // Exactly one whitespace byte separates the header from the payload
        match data.get(pos) {
            Some(byte) if byte.is_ascii_whitespace() => pos += 1,
            Some(_) => return Err(PpmError::BadNumber),
            None => return Err(PpmError::Truncated),
        }

        Ok((
            PpmHeader {
                width,
                height,
                max_value,
            },
            pos,
        ))
    }
}

fn next_token<'d>(data: &'d [u8], pos: &mut usize) -> Result<&'d [u8], PpmError> {
    // Skip whitespace and comments
    loop {
        match data.get(*pos) {
            Some(b'#') => {
                while data.get(*pos).is_some_and(|&b| b != b'\n') {
                    *pos += 1;
                }
            }
            Some(byte) if byte.is_ascii_whitespace() => *pos += 1,
            Some(_) => break,
            None => return Err(PpmError::Truncated),
        }
    }

    let start = *pos;
    while data
        .get(*pos)
        .is_some_and(|&b| !b.is_ascii_whitespace() && b != b'#')
    {
        *pos += 1;
    }
    Ok(&data[start..*pos])
}

fn parse_number(token: &[u8]) -> Result<u16, PpmError> {
    core::str::from_utf8(token)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(PpmError::BadNumber)
}

/// Export errors.
#[derive(Debug, Eq, PartialEq)]
pub enum ExportError<E> {
    Header(PpmError),
    Mem(E),
}

impl<E: fmt::Debug> fmt::Display for ExportError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header(e) => write!(f, "{e}"),
            Self::Mem(e) => write!(f, "memory device error: {e:?}"),
        }
    }
}

/// Write `frame` as a binary PPM image. Returns the number of bytes written.
pub fn write_ppm<MEM, E>(
    frame: &Frame<'_>,
    nvm: &mut NonVolatileMemory<MEM>,
) -> Result<usize, ExportError<E>>
where
    MEM: Mem<Error = E>,
{
    let header = PpmHeader::for_frame(frame);
    let text = header.render().map_err(ExportError::Header)?;
    nvm.write(text.as_bytes()).map_err(ExportError::Mem)?;

    let mut chunk = [0u8; CHUNK_PIXELS * 3];
    for row in frame.rows() {
        for words in row.chunks(CHUNK_PIXELS) {
            for (rgb, &word) in chunk.chunks_exact_mut(3).zip(words) {
                let color = to_rgb888(word);
                rgb.copy_from_slice(&[color.r(), color.g(), color.b()]);
            }
            nvm.write(&chunk[..words.len() * 3])
                .map_err(ExportError::Mem)?;
        }
    }

    let total = text.len() + header.payload_len();
    info!("exported {}x{} PPM, {} bytes", header.width, header.height, total);
    Ok(total)
}
