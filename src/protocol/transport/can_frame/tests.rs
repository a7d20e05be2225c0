//! Conversions between `CanFrame` and `embedded_can::Frame` implementations.
use super::*;
use embedded_can::StandardId;

/// Minimal driver-side frame.
#[derive(Debug)]
struct DriverFrame {
    id: Id,
    remote: bool,
    data: [u8; 8],
    dlc: usize,
}

impl Frame for DriverFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[..data.len()].copy_from_slice(data);
        Some(Self {
            id: id.into(),
            remote: false,
            data: buf,
            dlc: data.len(),
        })
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        Some(Self {
            id: id.into(),
            remote: true,
            data: [0; 8],
            dlc,
        })
    }

    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        self.remote
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.dlc
    }

    fn data(&self) -> &[u8] {
        &self.data[..self.dlc]
    }
}

#[test]
/// An extended driver frame keeps its identifier and payload.
fn test_from_embedded_extended() {
    let ext = ExtendedId::new(0x1A22A555).unwrap();
    let driver = DriverFrame::new(ext, &[0x30, 0x31, 0x32]).unwrap();

    let frame = CanFrame::from_embedded(&driver).expect("extended frame must convert");
    assert_eq!(frame.id, CanId(0x1A22A555));
    assert_eq!(frame.payload(), &[0x30, 0x31, 0x32]);
}

#[test]
/// Standard identifiers and remote frames are not OpenLCB traffic.
fn test_from_embedded_rejects_foreign_frames() {
    let std_frame = DriverFrame::new(StandardId::new(0x123).unwrap(), &[1]).unwrap();
    assert!(CanFrame::from_embedded(&std_frame).is_none());

    let remote = DriverFrame::new_remote(ExtendedId::new(0x1A22A555).unwrap(), 0).unwrap();
    assert!(CanFrame::from_embedded(&remote).is_none());
}

#[test]
/// `to_embedded` produces an extended frame with the valid bytes only.
fn test_to_embedded() {
    let frame = CanFrame::new(CanId(0x19A2877C), &[0x02, 0x2A, 0x00]).unwrap();
    let driver: DriverFrame = frame.to_embedded().unwrap();
    assert!(driver.is_extended());
    assert_eq!(driver.data(), &[0x02, 0x2A, 0x00]);
}

#[test]
/// More than eight bytes never fit in a classic CAN frame.
fn test_new_rejects_long_payload() {
    assert!(CanFrame::new(CanId(0x1A22A555), &[0; 9]).is_none());
}
