//! Wire error codes and the result word reported by a datagram send flow.
//!
//! ```text
//! bits 0..15   wire error code (PERMANENT_ERROR 0x1000, RESEND_OK 0x2000, ...)
//! bit  16      OPERATION_SUCCESS
//! bit  18      DST_NOT_FOUND
//! bit  19      TIMEOUT
//! bits 24..31  flags byte of Datagram Received OK
//! ```
use core::ops::{BitOr, BitOrAssign};

//==================================================================================WIRE CODES
/// Permanent error: the sender must not retry.
pub const PERMANENT_ERROR: u16 = 0x1000;
/// Temporary error: the sender may retry.
pub const RESEND_OK: u16 = 0x2000;
/// Datagram frame received out of sequence (resend OK).
pub const ERROR_OUT_OF_ORDER: u16 = RESEND_OK | 0x0040;
/// Reassembled payload exceeds the datagram maximum.
pub const ERROR_TOO_LONG: u16 = PERMANENT_ERROR;
/// No handler registered for the datagram type byte.
pub const ERROR_NOT_IMPLEMENTED: u16 = PERMANENT_ERROR;

/// Reply pending bit in the Datagram Received OK flags byte.
pub const FLAG_REPLY_PENDING: u8 = 0x80;

/// Give a code without an error class the permanent class.
#[inline]
pub const fn normalize(code: u16) -> u16 {
    if code & (PERMANENT_ERROR | RESEND_OK) == 0 {
        code | PERMANENT_ERROR
    } else {
        code
    }
}

//==================================================================================RESULT WORD
/// Terminal outcome of one outgoing datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DatagramResult(pub u32);

impl DatagramResult {
    pub const PERMANENT_ERROR: Self = Self(PERMANENT_ERROR as u32);
    pub const RESEND_OK: Self = Self(RESEND_OK as u32);
    pub const OPERATION_SUCCESS: Self = Self(0x1_0000);
    pub const DST_NOT_FOUND: Self = Self(0x4_0000);
    pub const TIMEOUT: Self = Self(0x8_0000);
    pub const RESPONSE_FLAGS_SHIFT: u32 = 24;
    pub const OK_REPLY_PENDING: Self = Self((FLAG_REPLY_PENDING as u32) << Self::RESPONSE_FLAGS_SHIFT);

    /// Datagram Received OK with its flags byte.
    pub const fn ok(flags: u8) -> Self {
        Self(Self::OPERATION_SUCCESS.0 | (flags as u32) << Self::RESPONSE_FLAGS_SHIFT)
    }

    /// Rejection carrying a wire code, normalized.
    pub const fn rejected(code: u16) -> Self {
        Self(normalize(code) as u32)
    }

    /// Response timer expired.
    pub const fn timeout() -> Self {
        Self(Self::TIMEOUT.0 | Self::PERMANENT_ERROR.0)
    }

    /// Destination alias could not be resolved.
    pub const fn destination_not_found() -> Self {
        Self(Self::DST_NOT_FOUND.0 | Self::PERMANENT_ERROR.0)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn is_success(self) -> bool {
        self.contains(Self::OPERATION_SUCCESS)
    }

    /// The receiver will send a reply datagram.
    #[inline]
    pub const fn reply_pending(self) -> bool {
        self.is_success() && self.contains(Self::OK_REPLY_PENDING)
    }

    /// Low 16 bits.
    #[inline]
    pub const fn error_code(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Flags byte of Datagram Received OK.
    #[inline]
    pub const fn response_flags(self) -> u8 {
        (self.0 >> Self::RESPONSE_FLAGS_SHIFT) as u8
    }
}

impl BitOr for DatagramResult {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DatagramResult {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<DatagramResult> for u32 {
    fn from(result: DatagramResult) -> Self {
        result.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_permanent_class() {
        assert_eq!(normalize(0x00AA), 0x10AA);
        assert_eq!(normalize(0x2000), 0x2000);
        assert_eq!(normalize(0x55AA), 0x55AA);
        assert_eq!(normalize(0), 0x1000);
    }

    #[test]
    fn result_words() {
        assert_eq!(DatagramResult::ok(0xA5).bits(), 0xA501_0000);
        assert!(DatagramResult::ok(0x80).reply_pending());
        assert!(!DatagramResult::ok(0).reply_pending());
        assert_eq!(DatagramResult::timeout().bits(), 0x8_1000);
        assert_eq!(DatagramResult::destination_not_found().bits(), 0x4_1000);
        assert_eq!(DatagramResult::rejected(0x0040).error_code(), 0x1040);
        assert_eq!(
            DatagramResult::OPERATION_SUCCESS | DatagramResult::OK_REPLY_PENDING,
            DatagramResult::ok(0x80)
        );
        assert_eq!(DatagramResult::ok(0x12).response_flags(), 0x12);
    }
}
