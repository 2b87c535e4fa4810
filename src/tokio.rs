/*!
 * Drive One Touch Play from a tokio task.
 *
 * ```no_run
 * # use cec_otp::{tokio::*, *};
 * # async fn run() -> Result<(), Error> {
 * let cec = AsyncCec::open("/dev/cec0")?;
 * cec.set_mode(CecModeInitiator::Send, CecModeFollower::All)?;
 * let local = LocalDevice {
 *     logical_address: CecLogicalAddress::Playback1,
 *     physical_address: cec.get_phys()?,
 *     device_type: CecPrimDevType::PLAYBACK,
 * };
 * let runner = ActionRunner::new(Outbox::new(), local, OneTouchPlayConfig::default());
 * let (handle, requests) = OneTouchPlayHandle::new(8);
 * ::tokio::spawn(async move { drive(&cec, runner, requests).await });
 * let result = handle.one_touch_play(CecLogicalAddress::Tv).await;
 * # Ok(())
 * # }
 * ```
 */
use crate::{
    ActionRunner, Callback, CallbackError, CecLogicalAddress, CecMessage, CecModeFollower,
    CecModeInitiator, CecMsg, Error, Outbox, PhysicalAddress, ResultCode,
};
use nix::libc::O_NONBLOCK;
use std::fs::OpenOptions;
use std::io::Result;
use std::os::unix::fs::OpenOptionsExt;
use tokio::io::{unix::AsyncFd, Interest};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

pub struct AsyncCec(AsyncFd<super::CecDevice>);

impl AsyncCec {
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        /* When the O_NONBLOCK flag is given, the CEC_RECEIVE ioctl
         * will return the EAGAIN error code when no message is available,
         * and CEC_TRANSMIT returns 0 right away.
         */
        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(O_NONBLOCK)
            .open(path)?;
        let a = AsyncFd::with_interest(
            super::CecDevice(f),
            Interest::READABLE | Interest::WRITABLE,
        )?;
        Ok(Self(a))
    }
    pub async fn rec(&self) -> Result<CecMsg> {
        self.0
            .async_io(Interest::READABLE, |inner| inner.rec())
            .await
    }
    /// Wait for the next frame that carries an opcode.
    pub async fn rec_message(&self) -> Result<CecMessage> {
        loop {
            if let Some(msg) = inbound(&self.rec().await?) {
                return Ok(msg);
            }
        }
    }
    /// Queue a message. Whether it was acknowledged is only logged once the kernel knows.
    pub async fn transmit_message(&self, msg: &CecMessage) -> std::result::Result<(), Error> {
        let mut raw = msg.to_raw()?;
        self.0
            .async_io(Interest::WRITABLE, |inner| inner.transmit(&mut raw))
            .await?;
        raw.tx_result()?;
        Ok(())
    }
    pub fn get_mode(&self) -> Result<(CecModeInitiator, CecModeFollower)> {
        self.0.get_ref().get_mode()
    }
    pub fn get_phys(&self) -> Result<PhysicalAddress> {
        self.0.get_ref().get_phys()
    }
    pub fn set_mode(&self, initiator: CecModeInitiator, follower: CecModeFollower) -> Result<()> {
        self.0.get_ref().set_mode(initiator, follower)
    }
}

/// The message in a received frame, if it is one worth dispatching.
///
/// In non-blocking mode transmit results show up on the receive side too,
/// they carry the sequence number of the transmit.
fn inbound(raw: &CecMsg) -> Option<CecMessage> {
    if raw.sequence != 0 {
        if let Err(e) = raw.tx_result() {
            warn!(error = %e, "transmit failed");
        }
        return None;
    }
    CecMessage::try_from(raw).ok()
}

/// A [Callback] that answers a waiting task.
pub struct OneshotCallback(Option<oneshot::Sender<ResultCode>>);

impl OneshotCallback {
    pub fn channel() -> (Self, oneshot::Receiver<ResultCode>) {
        let (tx, rx) = oneshot::channel();
        (Self(Some(tx)), rx)
    }
}

impl Callback for OneshotCallback {
    fn on_complete(&mut self, result: ResultCode) -> std::result::Result<(), CallbackError> {
        match self.0.take() {
            Some(tx) => tx.send(result).map_err(|_| CallbackError::Gone),
            None => Err(CallbackError::Failed("already completed".into())),
        }
    }
}

/// Request for the task running [drive]
pub struct Request {
    target: CecLogicalAddress,
    callback: OneshotCallback,
}

/// Cloneable way to ask the [drive] task for One Touch Play.
#[derive(Clone)]
pub struct OneTouchPlayHandle(mpsc::Sender<Request>);

impl OneTouchPlayHandle {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Request>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self(tx), rx)
    }
    /// `None` if the driver is gone or dropped the request (e.g. a TV can not do One Touch Play)
    pub async fn one_touch_play(&self, target: CecLogicalAddress) -> Option<ResultCode> {
        let (callback, rx) = OneshotCallback::channel();
        self.0.send(Request { target, callback }).await.ok()?;
        rx.await.ok()
    }
}

/// Send everything the runner queued.
async fn flush(cec: &AsyncCec, runner: &mut ActionRunner<Outbox>) {
    let queued: Vec<_> = runner.transport_mut().drain().collect();
    for msg in queued {
        debug!(%msg, "transmit");
        if let Err(e) = cec.transmit_message(&msg).await {
            warn!(error = %e, %msg, "transmit failed");
        }
    }
}

/// Run `runner` against `cec` until every [OneTouchPlayHandle] is dropped.
///
/// Pending actions are dropped on return.
pub async fn drive(
    cec: &AsyncCec,
    mut runner: ActionRunner<Outbox>,
    mut requests: mpsc::Receiver<Request>,
) -> std::result::Result<(), Error> {
    loop {
        flush(cec, &mut runner).await;
        let deadline = runner.next_deadline().map(Instant::from_std);
        tokio::select! {
            msg = cec.rec_message() => {
                let msg = msg?;
                debug!(%msg, "received");
                runner.handle_message(&msg, std::time::Instant::now());
            }
            req = requests.recv() => match req {
                Some(Request { target, callback }) => {
                    runner.one_touch_play(target, Box::new(callback), std::time::Instant::now());
                }
                None => break,
            },
            _ = async { sleep_until(deadline.unwrap_or_else(Instant::now)).await }, if deadline.is_some() => {
                runner.fire_due_timers(std::time::Instant::now());
            }
        }
    }
    runner.clear_actions();
    Ok(())
}
