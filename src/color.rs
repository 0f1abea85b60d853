//! RGB565 to 8-bit-per-channel color conversion.
//!
//! Channels are widened by a plain left shift, so a saturated 5-bit channel becomes 248 rather
//! than 255. Exported images depend on this exact mapping.

use embedded_graphics::pixelcolor::{raw::RawU16, Rgb565, Rgb888};

/// One sampled pixel word in 5-6-5 packed format.
pub type PixelWord = u16;

/// Convert a 5-6-5 packed word into an 8-bit-per-channel color.
pub fn to_rgb888(word: PixelWord) -> Rgb888 {
    let red = (((word >> 11) & 0x1F) << 3) as u8;
    let green = (((word >> 5) & 0x3F) << 2) as u8;
    let blue = ((word & 0x1F) << 3) as u8;

    Rgb888::new(red, green, blue)
}

/// Reinterpret a pixel word as an embedded-graphics `Rgb565` color.
pub fn to_rgb565(word: PixelWord) -> Rgb565 {
    Rgb565::from(RawU16::new(word))
}
