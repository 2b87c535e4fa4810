use std::{any::Any, time::Duration};

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
    error::CallbackError,
    message::CecMessage,
    protocol::{CecLogicalAddress, PhysicalAddress},
    timer::TimerToken,
};

/// State of a feature action. Timers are tagged with the state they were armed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ActionState {
    /// created, not started yet
    Idle,
    /// `<Give Device Power Status>` was sent, waiting for `<Report Power Status>`
    WaitingForReportPowerStatus,
    /// done, callbacks were invoked
    Finished,
}

/// Outcome handed to a [Callback]
#[derive(Debug, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive, Clone, Copy)]
#[repr(u8)]
pub enum ResultCode {
    Success = 0,
    Timeout = 1,
}

/// Completion listener of an action. Invoked exactly once.
///
/// The receiving side may be gone by the time the action completes, so
/// delivery can fail. A failure is logged and does not stop the other callbacks.
pub trait Callback: Send {
    fn on_complete(&mut self, result: ResultCode) -> Result<(), CallbackError>;
}

impl<C: Callback + ?Sized> Callback for Box<C> {
    fn on_complete(&mut self, result: ResultCode) -> Result<(), CallbackError> {
        (**self).on_complete(result)
    }
}

impl Callback for std::sync::mpsc::Sender<ResultCode> {
    fn on_complete(&mut self, result: ResultCode) -> Result<(), CallbackError> {
        self.send(result).map_err(|_| CallbackError::Gone)
    }
}

/// A [Callback] built from a closure, see [from_fn]
pub struct FromFn<F>(F);

impl<F> Callback for FromFn<F>
where
    F: FnMut(ResultCode) -> Result<(), CallbackError> + Send,
{
    fn on_complete(&mut self, result: ResultCode) -> Result<(), CallbackError> {
        (self.0)(result)
    }
}

/**
 * Turn a closure into a [Callback]
 * ```
 * # use cec_otp::{from_fn, Callback, ResultCode};
 * let mut cb = from_fn(|r| {
 *     println!("one touch play: {:?}", r);
 *     Ok(())
 * });
 * assert!(cb.on_complete(ResultCode::Success).is_ok());
 * ```
 */
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: FnMut(ResultCode) -> Result<(), CallbackError> + Send,
{
    FromFn(f)
}

/// What an action may do to the world around it.
///
/// Implemented by the [ActionRunner](crate::ActionRunner) for the action it is currently dispatching to.
pub trait ActionContext {
    /// hand a message to the transport
    fn send_command(&mut self, msg: CecMessage);
    /// arm the one timer of this action, superseding the previous one
    fn add_timer(&mut self, state: ActionState, delay: Duration) -> TimerToken;
    /// record `source` at `path` as active source and broadcast `<Active Source>`
    fn set_and_broadcast_active_source(&mut self, source: CecLogicalAddress, path: PhysicalAddress);
    fn set_routing_port(&mut self, device: CecLogicalAddress, port: u8);
    fn set_local_active_port(&mut self, device: CecLogicalAddress, port: u8);
}

/// A timed protocol exchange owned by the [ActionRunner](crate::ActionRunner).
pub trait FeatureAction: Send {
    /// Kick off the action. Called once, right after it was registered.
    fn start(&mut self, ctx: &mut dyn ActionContext) -> bool;
    /// Offered every inbound message while live. Return true to consume it.
    fn process_command(&mut self, ctx: &mut dyn ActionContext, msg: &CecMessage) -> bool;
    /// A timer armed in `state` elapsed.
    fn handle_timer_event(&mut self, ctx: &mut dyn ActionContext, state: ActionState);
    fn state(&self) -> ActionState;
    #[inline]
    fn is_finished(&self) -> bool {
        self.state() == ActionState::Finished
    }
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
