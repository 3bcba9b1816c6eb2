//! Print dispatch: send one page image to one device.
//!
//! This is the boundary where device failures stop. Whatever goes wrong while
//! opening, writing or cutting is logged with its cause and becomes
//! [`DispatchOutcome::DeviceError`]; the caller moves on to the next page.
//! There is no retry here.

use crate::assignment::DeviceIdentity;
use crate::device::PrintDevice;
use crate::error::DeviceError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// What happened to one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    Printed,
    NoAssignment,
    DeviceError,
}

/// Sends page images to a [`PrintDevice`].
#[derive(Clone)]
pub struct Dispatcher {
    device: Arc<dyn PrintDevice>,
}

impl Dispatcher {
    pub fn new(device: Arc<dyn PrintDevice>) -> Self {
        Self { device }
    }

    /// Print `image` on `device`, then cut.
    pub fn dispatch(&self, image: &DynamicImage, device: &DeviceIdentity) -> DispatchOutcome {
        match self.try_dispatch(image, device) {
            Ok(()) => {
                info!("Printed {}x{} page on {}", image.width(), image.height(), device);
                DispatchOutcome::Printed
            }
            Err(e) => {
                error!("Printing error: {}", e);
                DispatchOutcome::DeviceError
            }
        }
    }

    fn try_dispatch(
        &self,
        image: &DynamicImage,
        device: &DeviceIdentity,
    ) -> Result<(), DeviceError> {
        let mut job = self.device.open(device)?;
        job.image(image)?;
        job.cut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::PrintJob;
    use image::{GrayImage, Luma};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
        fail_on_image: bool,
    }

    struct RecordingJob {
        log: Arc<Mutex<Vec<String>>>,
        device: DeviceIdentity,
        fail_on_image: bool,
    }

    impl PrintDevice for Recorder {
        fn open(&self, device: &DeviceIdentity) -> Result<Box<dyn PrintJob>, DeviceError> {
            self.log.lock().unwrap().push(format!("open {device}"));
            Ok(Box::new(RecordingJob {
                log: Arc::clone(&self.log),
                device: *device,
                fail_on_image: self.fail_on_image,
            }))
        }
    }

    impl PrintJob for RecordingJob {
        fn image(&mut self, _image: &DynamicImage) -> Result<(), DeviceError> {
            if self.fail_on_image {
                return Err(DeviceError::Io {
                    device: self.device,
                    source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged"),
                });
            }
            self.log.lock().unwrap().push("image".into());
            Ok(())
        }

        fn cut(&mut self) -> Result<(), DeviceError> {
            self.log.lock().unwrap().push("cut".into());
            Ok(())
        }
    }

    fn page() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([0])))
    }

    #[test]
    fn prints_then_cuts() {
        let recorder = Recorder::default();
        let log = Arc::clone(&recorder.log);
        let d = Dispatcher::new(Arc::new(recorder));
        let dev = DeviceIdentity::new(1, 2);

        assert_eq!(d.dispatch(&page(), &dev), DispatchOutcome::Printed);
        assert_eq!(*log.lock().unwrap(), vec!["open 0x0001:0x0002", "image", "cut"]);
    }

    #[test]
    fn write_failure_becomes_device_error() {
        let recorder = Recorder {
            fail_on_image: true,
            ..Default::default()
        };
        let log = Arc::clone(&recorder.log);
        let d = Dispatcher::new(Arc::new(recorder));

        assert_eq!(
            d.dispatch(&page(), &DeviceIdentity::new(1, 2)),
            DispatchOutcome::DeviceError
        );
        // no cut after a failed image
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn absent_device_becomes_device_error() {
        struct Absent;
        impl PrintDevice for Absent {
            fn open(&self, device: &DeviceIdentity) -> Result<Box<dyn PrintJob>, DeviceError> {
                Err(DeviceError::NotFound { device: *device })
            }
        }
        let d = Dispatcher::new(Arc::new(Absent));
        assert_eq!(
            d.dispatch(&page(), &DeviceIdentity::new(1, 2)),
            DispatchOutcome::DeviceError
        );
    }
}
