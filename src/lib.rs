#![cfg_attr(docsrs, feature(doc_cfg))]
/*!
 * HDMI-CEC One Touch Play on top of the [CEC linux API](https://www.kernel.org/doc/html/v4.9/media/uapi/cec/cec-api.html), in pure rust.
 *
 * A source device wakes the display, claims to be the active source and keeps
 * asking the display for its power status until it reports being on. Displays
 * that drop commands while leaving standby are handled by re-sending the claim
 * a few times before giving up with [ResultCode::Timeout].
 *
 * The protocol logic lives in [OneTouchPlayAction], driven by an
 * [ActionRunner]. The runner never blocks: feed it messages and the time, or let
 * [ActionRunner::run_blocking] (or `tokio::drive` with the `tokio` feature) do that.
 *
 * ```no_run
 * # use cec_otp::*;
 * # fn main() -> std::io::Result<()> {
 * let cec = CecDevice::open("/dev/cec0")?;
 * cec.set_mode(CecModeInitiator::Send, CecModeFollower::All)?;
 * let local = LocalDevice {
 *     logical_address: CecLogicalAddress::Playback1,
 *     physical_address: cec.get_phys()?,
 *     device_type: CecPrimDevType::PLAYBACK,
 * };
 * let mut runner = ActionRunner::new(&cec, local, OneTouchPlayConfig::default());
 * let (tx, rx) = std::sync::mpsc::channel::<ResultCode>();
 * runner.one_touch_play(CecLogicalAddress::Tv, Box::new(tx), std::time::Instant::now());
 * runner.run_blocking()?;
 * println!("{:?}", rx.recv());
 * # Ok(())
 * # }
 * ```
 */
mod action;
mod config;
mod error;
mod message;
mod one_touch_play;
mod protocol;
mod runner;
mod sys;
mod timer;
mod transport;

use std::{
    io::{ErrorKind, Result},
    mem::MaybeUninit,
    os::fd::AsRawFd,
};
use sys::{get_mode, get_phys, receive, set_mode, transmit, CEC_MODE_FOLLOWER_MSK, CEC_MODE_INITIATOR_MSK};
use tracing::debug;

pub use action::{
    from_fn, ActionContext, ActionState, Callback, FeatureAction, FromFn, ResultCode,
};
pub use config::{OneTouchPlayConfig, LOOP_COUNTER_MAX, OTP_TIMEOUT_MS, TIMEOUT_MS};
pub use error::{CallbackError, CecTxError, Error, MessageError};
pub use message::{
    active_source, give_device_power_status, image_view_on, report_power_status, text_view_on,
    CecMessage,
};
pub use one_touch_play::OneTouchPlayAction;
pub use protocol::{
    CecLogicalAddress, CecOpcode, CecPowerStatus, CecPrimDevType, PhysicalAddress,
    CEC_SWITCH_HOME,
};
pub use runner::{ActionRunner, ActiveSource, LocalDevice, RoutingState};
pub use sys::{CecModeFollower, CecModeInitiator, CecMsg, RxStatus, TxStatus};
pub use timer::{TimerEvent, TimerOwner, TimerService, TimerToken};
pub use transport::{Outbox, Receiver, Transport};

#[cfg(feature = "tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
pub mod tokio;

/// A handle on a CEC device.
pub struct CecDevice(std::fs::File);

impl CecDevice {
    /**
     * Open a CEC device. Typically `/dev/cecX`
     * ```no_run
     * # use cec_otp::CecDevice;
     * # fn main() -> std::io::Result<()> {
     * let cec = CecDevice::open("/dev/cec0")?;
     * # Ok(())
     * # }
     * ```
     */
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map(Self)
    }
    /// Change this handles mode.
    ///
    /// The follower has to be at least [CecModeFollower::All] to see the power status reports of the display.
    pub fn set_mode(&self, initiator: CecModeInitiator, follower: CecModeFollower) -> Result<()> {
        let mode = u32::from(initiator) | u32::from(follower);
        unsafe { set_mode(self.0.as_raw_fd(), &mode) }?;
        Ok(())
    }
    pub fn get_mode(&self) -> Result<(CecModeInitiator, CecModeFollower)> {
        let mut mode = 0;
        unsafe { get_mode(self.0.as_raw_fd(), &mut mode) }?;
        let i = CecModeInitiator::try_from(mode & CEC_MODE_INITIATOR_MSK);
        let e = CecModeFollower::try_from(mode & CEC_MODE_FOLLOWER_MSK);
        match (i, e) {
            (Ok(i), Ok(e)) => Ok((i, e)),
            _ => Err(ErrorKind::Other.into()),
        }
    }
    /// Query physical addresses
    /// e.g. 0x3300 -> 3.3.0.0
    pub fn get_phys(&self) -> Result<PhysicalAddress> {
        let mut addr = 0;
        unsafe { get_phys(self.0.as_raw_fd(), &mut addr) }?;
        Ok(PhysicalAddress::new(addr))
    }
    /// send a message and wait until it was acknowledged (or not)
    pub fn transmit_message(&self, msg: &CecMessage) -> std::result::Result<(), Error> {
        let mut raw = msg.to_raw()?;
        self.transmit(&mut raw)?;
        raw.tx_result()?;
        Ok(())
    }
    fn transmit(&self, raw: &mut CecMsg) -> Result<()> {
        unsafe { transmit(self.0.as_raw_fd(), raw) }?;
        Ok(())
    }
    /// receive a single message.
    /// block forever
    #[inline]
    pub fn rec(&self) -> Result<CecMsg> {
        self.rec_for(0)
    }
    /// receive a single message.
    /// block for at most `timeout` ms.
    pub fn rec_for(&self, timeout: u32) -> Result<CecMsg> {
        let mut msg = MaybeUninit::uninit();
        let ptr: *mut CecMsg = msg.as_mut_ptr();
        unsafe { std::ptr::addr_of_mut!((*ptr).timeout).write(timeout) };
        unsafe { receive(self.0.as_raw_fd(), ptr) }?;
        Ok(unsafe { msg.assume_init() })
    }
    /// Like [CecDevice::rec_for], but returns `None` for frames without an opcode or with a bad receive status.
    pub fn rec_message_for(&self, timeout: u32) -> Result<Option<CecMessage>> {
        let raw = self.rec_for(timeout)?;
        if !raw.is_ok() {
            debug!(?raw, "dropping frame");
            return Ok(None);
        }
        Ok(CecMessage::try_from(&raw).ok())
    }
}

impl AsRawFd for CecDevice {
    fn as_raw_fd(&self) -> std::os::unix::prelude::RawFd {
        self.0.as_raw_fd()
    }
}

impl Transport for &CecDevice {
    fn send(&mut self, msg: &CecMessage) -> std::result::Result<(), Error> {
        self.transmit_message(msg)
    }
}

impl Receiver for &CecDevice {
    fn receive(&mut self, timeout_ms: u32) -> Result<Option<CecMessage>> {
        self.rec_message_for(timeout_ms)
    }
}
