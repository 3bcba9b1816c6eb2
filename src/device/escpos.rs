//! ESC/POS raster encoding for receipt printers.
//!
//! Images are flattened onto white, scaled down to the paper width, dithered
//! to one bit per dot (Floyd–Steinberg via [`image::imageops::dither`]) and
//! sent as `GS v 0` raster bands. The job ends with a feed and a full cut.

use super::PrintJob;
use crate::assignment::DeviceIdentity;
use crate::error::DeviceError;
use image::imageops::{self, BiLevel, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use std::io::Write;
use tracing::debug;

const ESC: u8 = 0x1b;
const GS: u8 = 0x1d;

/// `ESC @`: reset the printer.
pub const INIT: [u8; 2] = [ESC, b'@'];

/// Lines fed before cutting so the last band clears the blade.
const FEED_LINES: u8 = 6;

/// Rows per `GS v 0` command; some firmware misbehaves above this.
const MAX_BAND_ROWS: u32 = 960;

/// Encode `image` as a sequence of `GS v 0` raster commands at most
/// `width_dots` wide.
pub fn encode_raster(image: &DynamicImage, width_dots: u32) -> Vec<u8> {
    let bitmap = to_bilevel(image, width_dots);
    let (width, height) = bitmap.dimensions();
    let row_bytes = width.div_ceil(8) as usize;

    let mut out = Vec::with_capacity(row_bytes * height as usize + 16);
    let mut band_start = 0;
    while band_start < height {
        let rows = (height - band_start).min(MAX_BAND_ROWS);
        out.extend_from_slice(&[GS, b'v', b'0', 0]);
        out.extend_from_slice(&(row_bytes as u16).to_le_bytes());
        out.extend_from_slice(&(rows as u16).to_le_bytes());

        for y in band_start..band_start + rows {
            let mut row = vec![0u8; row_bytes];
            for x in 0..width {
                // Dithered pixels are 0 or 255; a set bit burns a dot.
                if bitmap.get_pixel(x, y)[0] < 128 {
                    row[(x / 8) as usize] |= 0x80 >> (x % 8);
                }
            }
            out.extend_from_slice(&row);
        }
        band_start += rows;
    }
    out
}

/// Feed and full-cut sequence.
pub fn cut_sequence() -> [u8; 6] {
    [ESC, b'd', FEED_LINES, GS, b'V', 0]
}

/// Flatten alpha onto white, fit to the paper width and dither to 1 bit.
fn to_bilevel(image: &DynamicImage, width_dots: u32) -> GrayImage {
    let mut gray = if image.color().has_alpha() {
        flatten_on_white(image)
    } else {
        image.to_luma8()
    };

    if gray.width() > width_dots {
        let height = (u64::from(gray.height()) * u64::from(width_dots) / u64::from(gray.width()))
            .max(1) as u32;
        gray = imageops::resize(&gray, width_dots, height, FilterType::Triangle);
    }

    imageops::dither(&mut gray, &BiLevel);
    gray
}

fn flatten_on_white(image: &DynamicImage) -> GrayImage {
    let rgba = image.to_rgba8();
    GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        // Rec. 601 luma, then blend over white by alpha.
        let luma = (299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b)) / 1000;
        let alpha = u32::from(a);
        Luma([((luma * alpha + 255 * (255 - alpha)) / 255) as u8])
    })
}

/// An ESC/POS job writing to any byte sink.
pub struct EscPosJob<W: Write> {
    out: W,
    device: DeviceIdentity,
    width_dots: u32,
    finished: bool,
}

impl<W: Write> EscPosJob<W> {
    /// Start a job: resets the printer before any raster data.
    pub fn start(mut out: W, device: DeviceIdentity, width_dots: u32) -> Result<Self, DeviceError> {
        out.write_all(&INIT)
            .map_err(|source| DeviceError::Io { device, source })?;
        Ok(Self {
            out,
            device,
            width_dots,
            finished: false,
        })
    }

    /// Consume the job and return the sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), DeviceError> {
        let device = self.device;
        self.out
            .write_all(bytes)
            .map_err(|source| DeviceError::Io { device, source })
    }

    fn ensure_open(&self) -> Result<(), DeviceError> {
        if self.finished {
            return Err(DeviceError::Rejected {
                device: self.device,
                detail: "job already cut".into(),
            });
        }
        Ok(())
    }
}

impl<W: Write> PrintJob for EscPosJob<W> {
    fn image(&mut self, image: &DynamicImage) -> Result<(), DeviceError> {
        self.ensure_open()?;
        if image.width() == 0 || image.height() == 0 {
            return Err(DeviceError::Rejected {
                device: self.device,
                detail: "image has no pixels".into(),
            });
        }

        let raster = encode_raster(image, self.width_dots);
        debug!(
            "Sending {}x{} image as {} bytes of raster to {}",
            image.width(),
            image.height(),
            raster.len(),
            self.device
        );
        self.write(&raster)
    }

    fn cut(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.write(&cut_sequence())?;
        let device = self.device;
        self.out
            .flush()
            .map_err(|source| DeviceError::Io { device, source })?;
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    const DEV: DeviceIdentity = DeviceIdentity::new(0x0416, 0x5011);

    #[test]
    fn black_image_sets_every_bit() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 2, Luma([0])));
        let raster = encode_raster(&img, 576);
        // header: GS v 0 m xL xH yL yH
        assert_eq!(&raster[..8], &[GS, b'v', b'0', 0, 2, 0, 2, 0]);
        assert_eq!(&raster[8..], &[0xff; 4]);
    }

    #[test]
    fn white_image_sets_no_bits() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(9, 1, Rgb([255, 255, 255])));
        let raster = encode_raster(&img, 576);
        // 9 dots round up to 2 bytes per row
        assert_eq!(&raster[4..8], &[2, 0, 1, 0]);
        assert_eq!(&raster[8..], &[0, 0]);
    }

    #[test]
    fn wide_images_are_scaled_to_paper() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(1152, 100, Luma([0])));
        let raster = encode_raster(&img, 576);
        assert_eq!(u16::from_le_bytes([raster[4], raster[5]]), 72);
        assert_eq!(u16::from_le_bytes([raster[6], raster[7]]), 50);
    }

    #[test]
    fn tall_images_are_split_into_bands() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 1000, Luma([255])));
        let raster = encode_raster(&img, 576);
        let first_rows = u16::from_le_bytes([raster[6], raster[7]]);
        assert_eq!(first_rows as u32, MAX_BAND_ROWS);
        let second = 8 + MAX_BAND_ROWS as usize;
        assert_eq!(&raster[second..second + 4], &[GS, b'v', b'0', 0]);
        assert_eq!(u16::from_le_bytes([raster[second + 6], raster[second + 7]]), 40);
    }

    #[test]
    fn transparent_pixels_print_as_paper() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 1, Rgba([0, 0, 0, 0])));
        let raster = encode_raster(&img, 576);
        assert_eq!(&raster[8..], &[0]);
    }

    #[test]
    fn job_writes_init_image_then_cut() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 1, Luma([0])));
        let mut job = EscPosJob::start(Vec::new(), DEV, 576).unwrap();
        job.image(&img).unwrap();
        job.cut().unwrap();
        let bytes = job.into_inner();

        assert_eq!(&bytes[..2], &INIT);
        assert!(bytes.ends_with(&cut_sequence()));
        assert_eq!(bytes.len(), 2 + 8 + 1 + 6);
    }

    #[test]
    fn job_rejects_use_after_cut() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 1, Luma([0])));
        let mut job = EscPosJob::start(Vec::new(), DEV, 576).unwrap();
        job.cut().unwrap();
        assert!(matches!(
            job.image(&img),
            Err(DeviceError::Rejected { .. })
        ));
    }
}
