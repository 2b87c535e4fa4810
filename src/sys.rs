//https://www.kernel.org/doc/html/v4.9/media/uapi/cec/cec-api.html

use bitflags::bitflags;
use nix::{ioctl_read, ioctl_readwrite, ioctl_write_ptr};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::protocol::CecLogicalAddress;

//#define CEC_ADAP_G_PHYS_ADDR    _IOR('a',  1, __u16)
ioctl_read! {
    /// Query physical addresses
    /// Filled by the driver.
    get_phys, b'a',  1, u16
}

//#define CEC_G_MODE              _IOR('a',  8, __u32)
ioctl_read! {
    /// Query mode
    /// Filled by the driver.
    get_mode, b'a',  8, u32
}
//#define CEC_S_MODE              _IOW('a',  9, __u32)
ioctl_write_ptr! {
    /// Select how this filehandle takes part in transmitting and receiving.
    /// If there is an exclusive initiator then only that initiator can call CEC_RECEIVE and CEC_TRANSMIT.
    /// The follower can always call CEC_TRANSMIT.
    set_mode, b'a',  9, u32
}
// ---  The message handling modes  ---
/// Modes for initiator
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Clone, Copy)]
#[repr(u32)]
pub enum CecModeInitiator {
    /// Transmiting not possible (but others can)
    None = 0,
    /// **Default** Shared access
    Send = 1,
    /// Do not allow other senders
    Exclusive = 2,
}
pub const CEC_MODE_INITIATOR_MSK: u32 = 0x0f;
/// Modes for follower
///
/// One Touch Play has to see the [CecOpcode::ReportPowerStatus](crate::CecOpcode::ReportPowerStatus)
/// of the display, so the follower mode must at least be [CecModeFollower::All].
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Clone, Copy)]
#[repr(u32)]
pub enum CecModeFollower {
    /// **Default**: Only retrieve replies to own (this handles) messages
    RepliesOnly = 0x0 << 4,
    /// Retrieve all messages for this device.
    All = 0x1 << 4,
    /// Retrieve all messages and lock this device.
    Exclusive = 0x2 << 4,
    /// Passthrough mode. The CEC framework will pass on most core messages without processing them.
    ExclusivePassthru = 0x3 << 4,
    /// Get all messages sent or received (directed or brodcasted) by this device.
    /// Only possible with [CecModeInitiator::None].
    Monitor = 0xe << 4,
    /// As above but for all messages on the bus.
    MonitorAll = 0xf << 4,
}
pub const CEC_MODE_FOLLOWER_MSK: u32 = 0xf0;

// ---  Transmit/receive a CEC command  ---
//#define CEC_TRANSMIT            _IOWR('a',  5, struct cec_msg)
ioctl_readwrite! {
    /// The transmit queue has enough room for 18 messages (about 1 second worth of 2-byte messages).
    /// If there is no more room it will return EBUSY.
    transmit, b'a',  5, CecMsg
}
//#define CEC_RECEIVE             _IOWR('a',  6, struct cec_msg)
ioctl_readwrite! {
    /// If the file descriptor is in blocking mode and timeout is non-zero and no message
    /// arrived within timeout milliseconds, then it will return ETIMEDOUT.
    receive, b'a',  6, CecMsg
}

pub const CEC_MAX_MSG_SIZE: usize = 16;

/// The raw message as exchanged with the kernel.
#[derive(Debug)]
#[repr(C)]
pub struct CecMsg {
    /// Timestamp in nanoseconds using CLOCK_MONOTONIC. Set by the driver when the message transmission has finished.
    tx_ts: u64,
    /// Timestamp in nanoseconds using CLOCK_MONOTONIC. Set by the driver when the message was received.
    rx_ts: u64,
    /// Length in bytes of the message.
    pub len: u32,
    /// The timeout (in ms) that is used to timeout CEC_RECEIVE.
    /// Set to 0 if you want to wait forever.
    pub timeout: u32,
    /// The framework assigns a sequence number to messages that are sent.
    pub sequence: u32,
    /// No flags are defined yet, so set this to 0.
    flags: u32,
    /// The message payload.
    /// Includes initiator, destination and opcode.
    pub msg: [u8; CEC_MAX_MSG_SIZE],
    /// Only used by CEC_TRANSMIT. We never wait for replies here,
    /// [OneTouchPlayAction](crate::OneTouchPlayAction) does its own timing.
    reply: u8,
    /// The message receive status bits. Set by the driver.
    rx_status: RxStatus,
    /// The message transmit status bits. Set by the driver.
    tx_status: TxStatus,
    /// The number of 'Arbitration Lost' events. Set by the driver.
    tx_arb_lost_cnt: u8,
    /// The number of 'Not Acknowledged' events. Set by the driver.
    tx_nack_cnt: u8,
    /// The number of 'Low Drive Detected' events. Set by the driver.
    tx_low_drive_cnt: u8,
    /// The number of 'Error' events. Set by the driver.
    tx_error_cnt: u8,
}
impl CecMsg {
    /// return the initiator's logical address
    pub fn initiator(&self) -> CecLogicalAddress {
        CecLogicalAddress::from_nibble(self.msg[0] >> 4)
    }
    /// return the destination's logical address
    pub fn destination(&self) -> CecLogicalAddress {
        CecLogicalAddress::from_nibble(self.msg[0])
    }
    /// return true if the kernel reports a successful transmit or receive
    pub fn is_ok(&self) -> bool {
        if !self.tx_status.is_empty() && !self.tx_status.contains(TxStatus::OK) {
            return false;
        }
        if !self.rx_status.is_empty() && !self.rx_status.contains(RxStatus::OK) {
            return false;
        }
        if self.rx_status.is_empty() && self.tx_status.is_empty() {
            return false;
        }
        !self.rx_status.contains(RxStatus::FEATURE_ABORT)
    }
    /// true if the transmit was acknowledged
    pub fn tx_ok(&self) -> bool {
        self.tx_status.contains(TxStatus::OK)
    }
    /// true if the kernel did not report a transmit status yet
    pub fn tx_pending(&self) -> bool {
        self.tx_status.is_empty()
    }
    /// Ok unless the kernel reported a failed transmit.
    ///
    /// A non-blocking transmit returns before the status is known, that counts as sent.
    pub fn tx_result(&self) -> Result<(), CecTxError> {
        if self.tx_ok() || self.tx_pending() {
            Ok(())
        } else {
            Err(CecTxError::from(self))
        }
    }
    pub fn init(from: CecLogicalAddress, to: CecLogicalAddress) -> CecMsg {
        let mut m = Self {
            tx_ts: 0,
            rx_ts: 0,
            len: 1,
            timeout: 0,
            sequence: 0,
            flags: 0,
            msg: [0; CEC_MAX_MSG_SIZE],
            reply: 0,
            rx_status: RxStatus::empty(),
            tx_status: TxStatus::empty(),
            tx_arb_lost_cnt: 0,
            tx_nack_cnt: 0,
            tx_low_drive_cnt: 0,
            tx_error_cnt: 0,
        };
        let f: u8 = from.into();
        let t: u8 = to.into();
        m.msg[0] = f << 4 | t;
        m
    }
}

// ---  cec status field  ---
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TxStatus: u8 {
        const OK          = (1 << 0);
        const ARB_LOST    = (1 << 1);
        const NACK        = (1 << 2);
        const LOW_DRIVE   = (1 << 3);
        const ERROR       = (1 << 4);
        const MAX_RETRIES = (1 << 5);
    }
}
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RxStatus: u8 {
        const OK            = (1 << 0);
        const TIMEOUT       = (1 << 1);
        const FEATURE_ABORT = (1 << 2);
    }
}

/// A transmit the kernel did not get acknowledged.
///
/// Returned as [Error::Transmit](crate::Error::Transmit) by [CecDevice::transmit_message](crate::CecDevice::transmit_message).
#[derive(Debug, Clone, thiserror::Error)]
#[error("transmit failed: {status:?} (arb lost {arb_lost}, nack {nack}, low drive {low_drive}, error {error})")]
pub struct CecTxError {
    pub status: TxStatus,
    pub arb_lost: u8,
    pub nack: u8,
    pub low_drive: u8,
    pub error: u8,
}
impl From<&CecMsg> for CecTxError {
    fn from(msg: &CecMsg) -> Self {
        Self {
            status: msg.tx_status,
            arb_lost: msg.tx_arb_lost_cnt,
            nack: msg.tx_nack_cnt,
            low_drive: msg.tx_low_drive_cnt,
            error: msg.tx_error_cnt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_packs_addresses() {
        let m = CecMsg::init(CecLogicalAddress::Playback1, CecLogicalAddress::Tv);
        assert_eq!(m.msg[0], 0x40);
        assert_eq!(m.len, 1);
        assert_eq!(m.initiator(), CecLogicalAddress::Playback1);
        assert_eq!(m.destination(), CecLogicalAddress::Tv);
    }

    #[test]
    fn fresh_message_is_not_ok() {
        let m = CecMsg::init(CecLogicalAddress::Playback1, CecLogicalAddress::Tv);
        assert!(!m.is_ok());
        assert!(!m.tx_ok());
        assert!(m.tx_pending());
        assert!(m.tx_result().is_ok());
    }

    #[test]
    fn tx_error_copies_counters() {
        let mut m = CecMsg::init(CecLogicalAddress::Playback1, CecLogicalAddress::Tv);
        m.tx_status = TxStatus::NACK | TxStatus::MAX_RETRIES;
        m.tx_nack_cnt = 3;
        let e = m.tx_result().unwrap_err();
        assert_eq!(e.nack, 3);
        assert!(e.status.contains(TxStatus::MAX_RETRIES));
        assert!(!m.is_ok());

        m.tx_status = TxStatus::OK;
        assert!(m.tx_result().is_ok());
    }
}
