//! Print devices: the boundary between the pipeline and physical printers.
//!
//! A [`PrintDevice`] opens one [`PrintJob`] per page. The job receives the
//! page image and then the end-of-job cut, and is dropped when the dispatch
//! call returns, so no device handle outlives a single page.
//!
//! | Implementation | Transport |
//! |----------------|-----------|
//! | [`UsbLinePrinter`] | ESC/POS raster over a Linux `usblp` node (`/dev/usb/lpN`) |

pub mod escpos;
pub mod usb;

pub use escpos::EscPosJob;
pub use usb::UsbLinePrinter;

use crate::assignment::DeviceIdentity;
use crate::error::DeviceError;
use image::DynamicImage;

/// Something that can print page images on an identified printer.
pub trait PrintDevice: Send + Sync {
    /// Open a job on `device`. Fails with [`DeviceError::NotFound`] when the
    /// printer is not attached.
    fn open(&self, device: &DeviceIdentity) -> Result<Box<dyn PrintJob>, DeviceError>;
}

/// One open print job on one device.
pub trait PrintJob {
    /// Send a raster image.
    fn image(&mut self, image: &DynamicImage) -> Result<(), DeviceError>;

    /// Feed and cut the paper; ends the job.
    fn cut(&mut self) -> Result<(), DeviceError>;
}
