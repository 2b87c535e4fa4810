//! Addresses, opcodes and operands used by One Touch Play.
//!
//! Values follow HDMI 1.4b, Supplement 1 (CEC).

use num_enum::{IntoPrimitive, TryFromPrimitive};

/**
 * The logical addresses defined by CEC 2.0
 *
 * Switches should use UNREGISTERED.
 * Processors should use SPECIFIC.
 */
#[derive(Debug, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive, Clone, Copy)]
#[repr(u8)]
pub enum CecLogicalAddress {
    Tv = 0,
    Record1 = 1,
    Record2 = 2,
    Tuner1 = 3,
    Playback1 = 4,
    Audiosystem = 5,
    Tuner2 = 6,
    Tuner3 = 7,
    Playback2 = 8,
    Record3 = 9,
    Tuner4 = 10,
    Playback3 = 11,
    Backup1 = 12,
    Backup2 = 13,
    Specific = 14,
    /// as initiator address: unregistered, as destination: broadcast
    UnregisteredBroadcast = 15,
}
impl CecLogicalAddress {
    /// Map the low nibble of `v` to an address. Every nibble has a variant.
    pub(crate) fn from_nibble(v: u8) -> Self {
        match Self::try_from(v & 0xf) {
            Ok(a) => a,
            Err(_) => Self::UnregisteredBroadcast,
        }
    }
}

#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Clone, Copy)]
#[repr(u8)]
#[non_exhaustive]
pub enum CecOpcode {
    /* One Touch Play Feature */
    /// Used by a new source to indicate that it has started to transmit a stream.
    /// __Parameters:__ 2byte - physical address of active source
    ActiveSource = 0x82,
    /// Sent by a source device to the TV whenever it enters the active state (alternatively it may send [CecOpcode::TextViewOn]).
    /// The TV should then turn on (if not on).
    ImageViewOn = 0x04,
    /// As [CecOpcode::ImageViewOn], but should also remove any text, menus and PIP windows from the TV’s display.
    TextViewOn = 0x0d,

    /* Power Status Feature */
    /// Used to determine the current power status of a target device.
    GiveDevicePowerStatus = 0x8f,
    /// Used to inform a requesting device of the current power status.
    /// __Parameters:__ [CecPowerStatus]
    ReportPowerStatus = 0x90,
}

// ---  Power Status Operand (pwr_state)  ---
/// Payload of [CecOpcode::ReportPowerStatus]
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Clone, Copy)]
#[repr(u8)]
pub enum CecPowerStatus {
    On = 0,
    Standby = 1,
    InTransitionStandbyToOn = 2,
    InTransitionOnToStandby = 3,
}
impl CecPowerStatus {
    /// The display is on or about to be.
    #[inline]
    pub fn is_on_or_turning_on(self) -> bool {
        matches!(self, Self::On | Self::InTransitionStandbyToOn)
    }
}

/// Primary Device Type Operand (prim_devtype)
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Copy, Clone)]
#[repr(u8)]
pub enum CecPrimDevType {
    TV = 0,
    RECORD = 1,
    TUNER = 3,
    PLAYBACK = 4,
    AUDIOSYSTEM = 5,
    SWITCH = 6,
    PROCESSOR = 7,
}
impl CecPrimDevType {
    /// Everything except the display can act as a source.
    #[inline]
    pub fn is_source(self) -> bool {
        self != Self::TV
    }
}

/// Port id meaning "this device itself" rather than one of its inputs.
pub const CEC_SWITCH_HOME: u8 = 0;

/**
 * A physical address a.b.c.d
 *
 * Each group of 4 bits represent a digit, the most significant 4 bits represent ‘a’.
 * The CEC root device (usually the TV) has address 0.0.0.0.
 * ```
 * # use cec_otp::PhysicalAddress;
 * let p = PhysicalAddress::new(0x3300);
 * assert_eq!(p.to_string(), "3.3.0.0");
 * ```
 */
#[derive(Debug, Eq, PartialEq, Hash, Clone, Copy, Default)]
pub struct PhysicalAddress(u16);
impl PhysicalAddress {
    /// 0.0.0.0
    pub const ROOT: Self = Self(0);

    #[inline]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }
    #[inline]
    pub fn raw(self) -> u16 {
        self.0
    }
    /// wire format as used by [CecOpcode::ActiveSource]
    #[inline]
    pub fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}
impl From<u16> for PhysicalAddress {
    fn from(v: u16) -> Self {
        Self(v)
    }
}
impl std::fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:x}.{:x}.{:x}.{:x}",
            v >> 12,
            (v >> 8) & 0xf,
            (v >> 4) & 0xf,
            v & 0xf
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_nibble_is_an_address() {
        for n in 0..=0xffu8 {
            let a = CecLogicalAddress::from_nibble(n);
            assert_eq!(u8::from(a), n & 0xf);
        }
    }

    #[test]
    fn power_status_on_states() {
        assert!(CecPowerStatus::On.is_on_or_turning_on());
        assert!(CecPowerStatus::InTransitionStandbyToOn.is_on_or_turning_on());
        assert!(!CecPowerStatus::Standby.is_on_or_turning_on());
        assert!(!CecPowerStatus::InTransitionOnToStandby.is_on_or_turning_on());
        assert!(CecPowerStatus::try_from(7u8).is_err());
    }

    #[test]
    fn physical_address_display_and_wire() {
        assert_eq!(PhysicalAddress::new(0x1200).to_string(), "1.2.0.0");
        assert_eq!(PhysicalAddress::new(0xffff).to_string(), "f.f.f.f");
        assert_eq!(PhysicalAddress::new(0x2100).to_be_bytes(), [0x21, 0x00]);
    }

    #[test]
    fn only_tv_is_not_a_source() {
        assert!(!CecPrimDevType::TV.is_source());
        assert!(CecPrimDevType::PLAYBACK.is_source());
        assert!(CecPrimDevType::AUDIOSYSTEM.is_source());
    }
}
