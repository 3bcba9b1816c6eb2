//! Color classification: decide whether a page needs the color printer.
//!
//! A page is `black_white` when it carries no chromatic information: either
//! it is stored as a single gray channel, or it is stored as RGB but every
//! pixel has R = G = B. Scanners and PDF renderers routinely emit the latter,
//! so the full scan is required rather than trusting the storage format.
//!
//! Alpha never counts as a color channel: gray+alpha classifies like gray and
//! RGBA like RGB. 16-bit and float RGB are reduced to 8 bits per channel
//! first, so differences below one 8-bit step do not make a page color.

use crate::assignment::ColorClass;
use image::{DynamicImage, ImageResult};

/// Decode an encoded raster (PNG, JPEG) from memory.
pub fn decode(bytes: &[u8]) -> ImageResult<DynamicImage> {
    image::load_from_memory(bytes)
}

/// Classify an encoded raster. Undecodable input is [`ColorClass::Unknown`].
pub fn classify_bytes(bytes: &[u8]) -> ColorClass {
    match decode(bytes) {
        Ok(img) => classify(&img),
        Err(_) => ColorClass::Unknown,
    }
}

/// Classify a decoded raster.
pub fn classify(img: &DynamicImage) -> ColorClass {
    let gray = match img {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLumaA16(_) => true,
        DynamicImage::ImageRgb8(buf) => channels_equal(buf.as_raw(), 3),
        DynamicImage::ImageRgba8(buf) => channels_equal(buf.as_raw(), 4),
        // Deep samples are compared after reduction to 8 bits per channel.
        DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_)
        | DynamicImage::ImageRgb32F(_)
        | DynamicImage::ImageRgba32F(_) => channels_equal(img.to_rgb8().as_raw(), 3),
        _ => return ColorClass::Unknown,
    };

    if gray {
        ColorClass::BlackWhite
    } else {
        ColorClass::Color
    }
}

/// True when the first three samples of every `stride`-wide pixel are equal.
///
/// Runs over the flat sample buffer in fixed-size chunks, which the compiler
/// turns into a vectorised loop; no per-pixel `get_pixel` calls.
fn channels_equal<T: PartialEq>(samples: &[T], stride: usize) -> bool {
    samples
        .chunks_exact(stride)
        .all(|px| px[0] == px[1] && px[1] == px[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format)
            .expect("encode");
        buf
    }

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        encode(img, ImageFormat::Png)
    }

    fn assert_format_classified(format: ImageFormat) {
        let red = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 0, 0])));
        assert_eq!(classify_bytes(&encode(&red, format)), ColorClass::Color, "{format:?}");

        let gray = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([80, 80, 80])));
        assert_eq!(
            classify_bytes(&encode(&gray, format)),
            ColorClass::BlackWhite,
            "{format:?}"
        );
    }

    #[test]
    fn single_channel_is_black_white() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(7, 3, Luma([200])));
        assert_eq!(classify(&img), ColorClass::BlackWhite);
    }

    #[test]
    fn gray_stored_as_rgb_is_black_white() {
        let mut img = RgbImage::new(16, 16);
        for (x, y, px) in img.enumerate_pixels_mut() {
            let v = ((x * 16 + y) % 256) as u8;
            *px = Rgb([v, v, v]);
        }
        assert_eq!(classify(&DynamicImage::ImageRgb8(img)), ColorClass::BlackWhite);
    }

    #[test]
    fn one_tinted_pixel_makes_color() {
        let mut img = RgbImage::from_pixel(32, 32, Rgb([128, 128, 128]));
        img.put_pixel(31, 31, Rgb([128, 128, 129]));
        assert_eq!(classify(&DynamicImage::ImageRgb8(img)), ColorClass::Color);

        let mut img = RgbImage::from_pixel(32, 32, Rgb([0, 0, 0]));
        img.put_pixel(0, 0, Rgb([1, 0, 0]));
        assert_eq!(classify(&DynamicImage::ImageRgb8(img)), ColorClass::Color);
    }

    #[test]
    fn single_pixel_images() {
        let gray = RgbImage::from_pixel(1, 1, Rgb([9, 9, 9]));
        assert_eq!(classify(&DynamicImage::ImageRgb8(gray)), ColorClass::BlackWhite);
        let red = RgbImage::from_pixel(1, 1, Rgb([255, 0, 0]));
        assert_eq!(classify(&DynamicImage::ImageRgb8(red)), ColorClass::Color);
    }

    #[test]
    fn alpha_is_ignored() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([50, 50, 50, 255]));
        img.put_pixel(2, 2, Rgba([50, 50, 50, 0]));
        assert_eq!(classify(&DynamicImage::ImageRgba8(img.clone())), ColorClass::BlackWhite);

        img.put_pixel(3, 3, Rgba([50, 60, 50, 255]));
        assert_eq!(classify(&DynamicImage::ImageRgba8(img)), ColorClass::Color);
    }

    #[test]
    fn sixteen_bit_rgb_is_scanned() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 3, Rgb([10, 20, 30])));
        assert_eq!(classify(&DynamicImage::ImageRgb16(img.to_rgb16())), ColorClass::Color);
    }

    #[test]
    fn sixteen_bit_noise_below_one_step_is_black_white() {
        let mut img = ImageBuffer::<Rgb<u16>, _>::from_pixel(4, 4, Rgb([1000u16, 1000, 1000]));
        img.put_pixel(1, 1, Rgb([1000, 1001, 1000]));
        assert_eq!(classify(&DynamicImage::ImageRgb16(img.clone())), ColorClass::BlackWhite);

        img.put_pixel(2, 2, Rgb([1000, 9000, 1000]));
        assert_eq!(classify(&DynamicImage::ImageRgb16(img)), ColorClass::Color);
    }

    #[test]
    fn float_rgb_is_reduced_before_comparing() {
        let img = ImageBuffer::<Rgb<f32>, _>::from_pixel(2, 2, Rgb([0.5f32, 0.5001, 0.5]));
        assert_eq!(classify(&DynamicImage::ImageRgb32F(img)), ColorClass::BlackWhite);
    }

    #[test]
    fn undecodable_bytes_are_unknown() {
        assert_eq!(classify_bytes(b"definitely not an image"), ColorClass::Unknown);
        assert_eq!(classify_bytes(&[]), ColorClass::Unknown);
        assert_eq!(classify_bytes(b"%PDF-1.7\n"), ColorClass::Unknown);
    }

    #[test]
    fn decodes_png_before_classifying() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(5, 5, Luma([0])));
        assert_eq!(classify_bytes(&png_bytes(&gray)), ColorClass::BlackWhite);

        let color = DynamicImage::ImageRgb8(RgbImage::from_pixel(5, 5, Rgb([0, 128, 255])));
        assert_eq!(classify_bytes(&png_bytes(&color)), ColorClass::Color);
    }

    #[test]
    fn decodes_bmp() {
        assert_format_classified(ImageFormat::Bmp);
    }

    #[test]
    fn decodes_tiff() {
        assert_format_classified(ImageFormat::Tiff);
    }

    #[test]
    fn decodes_webp() {
        assert_format_classified(ImageFormat::WebP);
    }

    #[test]
    fn classification_is_deterministic() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(20, 20, |x, y| {
            Rgb([x as u8, y as u8, (x ^ y) as u8])
        }));
        let bytes = png_bytes(&img);
        let first = classify_bytes(&bytes);
        for _ in 0..3 {
            assert_eq!(classify_bytes(&bytes), first);
        }
    }
}
