use num_enum::TryFromPrimitiveError;

use crate::{
    error::MessageError,
    protocol::{CecLogicalAddress, CecOpcode, CecPowerStatus, PhysicalAddress},
    sys::{CecMsg, CEC_MAX_MSG_SIZE},
};

/// header + opcode
const CEC_HEADER_LEN: usize = 2;
const CEC_MAX_PARAMS: usize = CEC_MAX_MSG_SIZE - CEC_HEADER_LEN;

/// A CEC message with an opcode, detached from the kernel structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CecMessage {
    source: CecLogicalAddress,
    destination: CecLogicalAddress,
    opcode: u8,
    params: Vec<u8>,
}

impl CecMessage {
    pub fn new(
        source: CecLogicalAddress,
        destination: CecLogicalAddress,
        opcode: CecOpcode,
        params: &[u8],
    ) -> Self {
        Self::from_raw_opcode(source, destination, opcode.into(), params)
    }
    /// build a message with an opcode this crate has no variant for
    pub fn from_raw_opcode(
        source: CecLogicalAddress,
        destination: CecLogicalAddress,
        opcode: u8,
        params: &[u8],
    ) -> Self {
        Self {
            source,
            destination,
            opcode,
            params: params.to_vec(),
        }
    }
    #[inline]
    pub fn source(&self) -> CecLogicalAddress {
        self.source
    }
    #[inline]
    pub fn destination(&self) -> CecLogicalAddress {
        self.destination
    }
    pub fn opcode(&self) -> Result<CecOpcode, TryFromPrimitiveError<CecOpcode>> {
        CecOpcode::try_from(self.opcode)
    }
    #[inline]
    pub fn raw_opcode(&self) -> u8 {
        self.opcode
    }
    #[inline]
    pub fn params(&self) -> &[u8] {
        &self.params
    }
    /// return true if this is a broadcast message
    #[inline]
    pub fn is_broadcast(&self) -> bool {
        self.destination == CecLogicalAddress::UnregisteredBroadcast
    }
    /// Fill a kernel message for [CEC_TRANSMIT](crate::CecDevice::transmit_message).
    pub fn to_raw(&self) -> Result<CecMsg, MessageError> {
        if self.params.len() > CEC_MAX_PARAMS {
            return Err(MessageError::TooLong(self.params.len()));
        }
        let mut msg = CecMsg::init(self.source, self.destination);
        msg.msg[1] = self.opcode;
        msg.len = (CEC_HEADER_LEN + self.params.len()) as u32;
        msg.msg[CEC_HEADER_LEN..msg.len as usize].copy_from_slice(&self.params);
        Ok(msg)
    }
}

impl TryFrom<&CecMsg> for CecMessage {
    type Error = MessageError;
    /// Polls (header only) have no opcode and are rejected.
    fn try_from(msg: &CecMsg) -> Result<Self, Self::Error> {
        let len = (msg.len as usize).min(CEC_MAX_MSG_SIZE);
        if len < CEC_HEADER_LEN {
            return Err(MessageError::TooShort(len));
        }
        Ok(Self {
            source: msg.initiator(),
            destination: msg.destination(),
            opcode: msg.msg[1],
            params: msg.msg[CEC_HEADER_LEN..len].to_vec(),
        })
    }
}

impl std::fmt::Display for CecMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.opcode() {
            Ok(op) => write!(f, "{:?}->{:?} {:?}", self.source, self.destination, op)?,
            Err(_) => write!(
                f,
                "{:?}->{:?} {:#04x}",
                self.source, self.destination, self.opcode
            )?,
        }
        if !self.params.is_empty() {
            write!(f, " {:x?}", self.params)?;
        }
        Ok(())
    }
}

// --- command encoder ---

/// `<Text View On>`: wake the display and drop any menus.
pub fn text_view_on(src: CecLogicalAddress, dst: CecLogicalAddress) -> CecMessage {
    CecMessage::new(src, dst, CecOpcode::TextViewOn, &[])
}

/// `<Image View On>`: wake the display.
pub fn image_view_on(src: CecLogicalAddress, dst: CecLogicalAddress) -> CecMessage {
    CecMessage::new(src, dst, CecOpcode::ImageViewOn, &[])
}

/// `<Active Source>` is always broadcast.
pub fn active_source(src: CecLogicalAddress, path: PhysicalAddress) -> CecMessage {
    CecMessage::new(
        src,
        CecLogicalAddress::UnregisteredBroadcast,
        CecOpcode::ActiveSource,
        &path.to_be_bytes(),
    )
}

pub fn give_device_power_status(src: CecLogicalAddress, dst: CecLogicalAddress) -> CecMessage {
    CecMessage::new(src, dst, CecOpcode::GiveDevicePowerStatus, &[])
}

pub fn report_power_status(
    src: CecLogicalAddress,
    dst: CecLogicalAddress,
    status: CecPowerStatus,
) -> CecMessage {
    CecMessage::new(src, dst, CecOpcode::ReportPowerStatus, &[status.into()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use CecLogicalAddress::*;

    #[test]
    fn active_source_is_broadcast_with_path() {
        let m = active_source(Playback1, PhysicalAddress::new(0x1200));
        assert!(m.is_broadcast());
        assert_eq!(m.opcode(), Ok(CecOpcode::ActiveSource));
        assert_eq!(m.params(), &[0x12, 0x00]);
    }

    #[test]
    fn encoder_opcodes() {
        assert_eq!(text_view_on(Playback1, Tv).raw_opcode(), 0x0d);
        assert_eq!(image_view_on(Playback1, Tv).raw_opcode(), 0x04);
        let q = give_device_power_status(Playback1, Tv);
        assert_eq!(q.raw_opcode(), 0x8f);
        assert!(q.params().is_empty());
        let r = report_power_status(Tv, Playback1, CecPowerStatus::InTransitionStandbyToOn);
        assert_eq!(r.raw_opcode(), 0x90);
        assert_eq!(r.params(), &[2]);
    }

    #[test]
    fn raw_frame_layout() {
        let raw = active_source(Playback2, PhysicalAddress::new(0x3300))
            .to_raw()
            .unwrap();
        assert_eq!(raw.len, 4);
        assert_eq!(&raw.msg[..4], &[0x8f, 0x82, 0x33, 0x00]);
        let back = CecMessage::try_from(&raw).unwrap();
        assert_eq!(back.source(), Playback2);
        assert_eq!(back.params(), &[0x33, 0x00]);
    }

    #[test]
    fn poll_has_no_opcode() {
        let raw = CecMsg::init(Playback1, Tv);
        assert_eq!(CecMessage::try_from(&raw), Err(MessageError::TooShort(1)));
    }

    #[test]
    fn too_many_params() {
        let m = CecMessage::from_raw_opcode(Playback1, Tv, 0x89, &[0; 15]);
        assert_eq!(m.to_raw().unwrap_err(), MessageError::TooLong(15));
    }

    #[test]
    fn unknown_opcode_display() {
        let m = CecMessage::from_raw_opcode(Tv, Playback1, 0x47, b"tv");
        assert!(m.opcode().is_err());
        assert_eq!(m.to_string(), "Tv->Playback1 0x47 [74, 76]");
    }
}
