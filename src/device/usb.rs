//! USB receipt printers through the Linux `usblp` driver.
//!
//! The kernel exposes each attached USB printer as `/dev/usb/lpN` and lists it
//! under `/sys/class/usbmisc/lpN`, whose `device` link points at the USB
//! interface. The interface's parent holds `idVendor` / `idProduct`, which is
//! how a configured [`DeviceIdentity`] is matched to a device node.

use super::escpos::EscPosJob;
use super::{PrintDevice, PrintJob};
use crate::assignment::DeviceIdentity;
use crate::error::DeviceError;
use std::fs::OpenOptions;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SYSFS_USBMISC: &str = "/sys/class/usbmisc";
const DEV_USB: &str = "/dev/usb";

/// ESC/POS printer reached through a `usblp` device node.
#[derive(Debug, Clone)]
pub struct UsbLinePrinter {
    class_dir: PathBuf,
    dev_dir: PathBuf,
    width_dots: u32,
}

impl UsbLinePrinter {
    pub fn new(width_dots: u32) -> Self {
        Self::with_roots(SYSFS_USBMISC, DEV_USB, width_dots)
    }

    /// Use alternative sysfs class and device directories.
    pub fn with_roots(
        class_dir: impl Into<PathBuf>,
        dev_dir: impl Into<PathBuf>,
        width_dots: u32,
    ) -> Self {
        Self {
            class_dir: class_dir.into(),
            dev_dir: dev_dir.into(),
            width_dots,
        }
    }

    /// Device node of the attached printer matching `device`.
    pub fn locate(&self, device: &DeviceIdentity) -> Result<PathBuf, DeviceError> {
        let not_found = || DeviceError::NotFound { device: *device };

        let entries = std::fs::read_dir(&self.class_dir).map_err(|_| not_found())?;
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name.starts_with("lp"))
            .collect();
        names.sort();

        for name in names {
            let usb_dir = self.class_dir.join(&name).join("device").join("..");
            let vid = read_hex_id(&usb_dir.join("idVendor"));
            let pid = read_hex_id(&usb_dir.join("idProduct"));
            debug!("{}: vid={:?} pid={:?}", name, vid, pid);
            if vid == Some(device.vid) && pid == Some(device.pid) {
                return Ok(self.dev_dir.join(name));
            }
        }

        Err(not_found())
    }
}

impl PrintDevice for UsbLinePrinter {
    fn open(&self, device: &DeviceIdentity) -> Result<Box<dyn PrintJob>, DeviceError> {
        let node = self.locate(device)?;
        info!("Printing on {} via {}", device, node.display());

        let file = OpenOptions::new()
            .write(true)
            .open(&node)
            .map_err(|source| DeviceError::Io {
                device: *device,
                source,
            })?;

        let job = EscPosJob::start(BufWriter::new(file), *device, self.width_dots)?;
        Ok(Box::new(job))
    }
}

fn read_hex_id(path: &Path) -> Option<u16> {
    let raw = std::fs::read_to_string(path).ok()?;
    u16::from_str_radix(raw.trim(), 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};
    use tempfile::TempDir;

    /// Fake sysfs + /dev layout with one printer at `lp1`.
    fn fake_tree(vid: &str, pid: &str) -> (TempDir, UsbLinePrinter) {
        let root = tempfile::tempdir().unwrap();
        let class = root.path().join("usbmisc");
        let dev = root.path().join("dev");
        std::fs::create_dir_all(class.join("lp1/device")).unwrap();
        std::fs::create_dir_all(class.join("hiddev0/device")).unwrap();
        std::fs::create_dir_all(&dev).unwrap();
        std::fs::write(class.join("lp1/idVendor"), format!("{vid}\n")).unwrap();
        std::fs::write(class.join("lp1/idProduct"), format!("{pid}\n")).unwrap();
        std::fs::write(dev.join("lp1"), b"").unwrap();
        let printer = UsbLinePrinter::with_roots(class, dev, 384);
        (root, printer)
    }

    #[test]
    fn locates_matching_printer() {
        let (root, printer) = fake_tree("0416", "5011");
        let node = printer.locate(&DeviceIdentity::new(0x0416, 0x5011)).unwrap();
        assert_eq!(node, root.path().join("dev/lp1"));
    }

    #[test]
    fn other_ids_are_not_found() {
        let (_root, printer) = fake_tree("0416", "5011");
        let err = printer
            .locate(&DeviceIdentity::new(0x0416, 0x5012))
            .unwrap_err();
        assert!(matches!(err, DeviceError::NotFound { .. }));
    }

    #[test]
    fn missing_sysfs_class_is_not_found() {
        let printer = UsbLinePrinter::with_roots("/nonexistent/usbmisc", "/nonexistent/dev", 384);
        assert!(matches!(
            printer.open(&DeviceIdentity::new(1, 2)),
            Err(DeviceError::NotFound { .. })
        ));
    }

    #[test]
    fn job_bytes_reach_the_device_node() {
        let (root, printer) = fake_tree("04b8", "0202");
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 1, Luma([0])));
        {
            let mut job = printer.open(&DeviceIdentity::new(0x04b8, 0x0202)).unwrap();
            job.image(&img).unwrap();
            job.cut().unwrap();
        }
        let written = std::fs::read(root.path().join("dev/lp1")).unwrap();
        assert!(written.starts_with(&crate::device::escpos::INIT));
        assert!(written.ends_with(&crate::device::escpos::cut_sequence()));
    }
}
