use std::path::Path;

use color_eyre::Result;
use image::DynamicImage;

/// A decoded image normalized to tightly packed RGBA8.
///
/// Sources with fewer than four channels are expanded on load: missing color
/// channels are zero-filled and the alpha channel defaults to fully opaque
/// when the source has none.
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Image {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let decoded = image::open(path)?;
        Ok(Self::from_decoded(decoded))
    }

    pub fn load_from_memory(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Self::from_decoded(decoded))
    }

    fn from_decoded(decoded: DynamicImage) -> Self {
        let width = decoded.width();
        let height = decoded.height();

        let pixels = match decoded {
            DynamicImage::ImageLuma8(gray) => expand_pixels(gray.as_raw(), 1),
            DynamicImage::ImageLumaA8(gray) => expand_pixels(gray.as_raw(), 2),
            DynamicImage::ImageRgb8(rgb) => expand_pixels(rgb.as_raw(), 3),
            other => other.into_rgba8().into_raw(),
        };

        log::info!("Image loaded: {}x{}px", width, height);

        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Always `width * height * 4`.
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

/// Widen 1-3 channel pixel data to RGBA8, zero-filling absent color channels.
/// A source without an alpha channel becomes fully opaque.
fn expand_pixels(data: &[u8], channels: usize) -> Vec<u8> {
    debug_assert!(channels >= 1 && channels < 4);

    let mut pixels = Vec::with_capacity(data.len() / channels * 4);
    for src in data.chunks_exact(channels) {
        let mut dst = [0u8, 0, 0, 255];
        match channels {
            1 => dst[0] = src[0],
            2 => {
                dst[0] = src[0];
                dst[3] = src[1];
            }
            _ => dst[..3].copy_from_slice(src),
        }
        pixels.extend_from_slice(&dst);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn encode_png(image: DynamicImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn rgb_source_becomes_opaque_rgba() {
        let rgb = RgbImage::from_raw(
            2,
            2,
            vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100, 110, 120],
        )
        .unwrap();
        let bytes = encode_png(DynamicImage::ImageRgb8(rgb));

        let image = Image::load_from_memory(&bytes).unwrap();
        assert_eq!(image.width(), 2);
        assert_eq!(image.height(), 2);
        assert_eq!(image.byte_len(), 16);
        for pixel in image.pixels().chunks_exact(4) {
            assert_eq!(pixel[3], 255);
        }
        assert_eq!(&image.pixels()[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn gray_source_zero_fills_color_channels() {
        let pixels = expand_pixels(&[7, 200], 1);
        assert_eq!(pixels, vec![7, 0, 0, 255, 200, 0, 0, 255]);
    }

    #[test]
    fn gray_alpha_source_keeps_alpha() {
        let pixels = expand_pixels(&[9, 128], 2);
        assert_eq!(pixels, vec![9, 0, 0, 128]);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Image::load("does/not/exist.png").is_err());
    }

    #[test]
    fn malformed_buffer_is_an_error() {
        assert!(Image::load_from_memory(&[0, 1, 2, 3]).is_err());
    }
}
