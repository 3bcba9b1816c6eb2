//! Printer routing: pick the device bound to a page's color class.

use crate::assignment::{ColorClass, DeviceIdentity, PrinterAssignment};
use crate::error::AssignmentMiss;

/// Resolve the printer for `class`.
///
/// `Unknown` is a miss without looking at the assignment at all; otherwise
/// the bound device is returned, or a miss when the class has no binding.
pub fn resolve(
    class: ColorClass,
    assignments: &PrinterAssignment,
) -> Result<DeviceIdentity, AssignmentMiss> {
    if class == ColorClass::Unknown {
        return Err(AssignmentMiss { class });
    }
    assignments.get(class).ok_or(AssignmentMiss { class })
}

#[cfg(test)]
mod tests {
    use super::*;

    const D: DeviceIdentity = DeviceIdentity::new(0x0416, 0x5011);
    const D2: DeviceIdentity = DeviceIdentity::new(0x0416, 0x5012);

    #[test]
    fn black_white_resolves_to_its_device() {
        let a = PrinterAssignment {
            black_white: Some(D),
            color: None,
        };
        assert_eq!(resolve(ColorClass::BlackWhite, &a), Ok(D));
    }

    #[test]
    fn unbound_class_is_a_miss() {
        let a = PrinterAssignment {
            black_white: Some(D),
            color: None,
        };
        assert_eq!(
            resolve(ColorClass::Color, &a),
            Err(AssignmentMiss {
                class: ColorClass::Color
            })
        );
    }

    #[test]
    fn unknown_is_always_a_miss() {
        let assignments = [
            PrinterAssignment::default(),
            PrinterAssignment {
                black_white: Some(D),
                color: None,
            },
            PrinterAssignment {
                black_white: Some(D),
                color: Some(D2),
            },
        ];
        for a in &assignments {
            assert_eq!(
                resolve(ColorClass::Unknown, a),
                Err(AssignmentMiss {
                    class: ColorClass::Unknown
                })
            );
        }
    }
}
