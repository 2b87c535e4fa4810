/*!
 * One Touch Play: power on the display and become its active source.
 *
 * In theory a source can send `<Text View On>` and `<Active Source>` in
 * succession, the display has to buffer the `<Active Source>` while it comes
 * out of standby. Some displays do not, and ignore everything until their
 * power status is 'on'. So `<Give Device Power Status>` is sent until the
 * display reports on (or transient to on), repeating `<Text View On>` and
 * `<Active Source>` with every query. After
 * [max_retries](crate::OneTouchPlayConfig::max_retries) unanswered queries the
 * action gives up with [ResultCode::Timeout].
 */
use std::any::Any;

use tracing::{debug, error, info, warn};

use crate::{
    action::{ActionContext, ActionState, Callback, FeatureAction, ResultCode},
    config::OneTouchPlayConfig,
    message::{self, CecMessage},
    protocol::{CecLogicalAddress, CecOpcode, CecPowerStatus, PhysicalAddress, CEC_SWITCH_HOME},
    runner::LocalDevice,
};

pub struct OneTouchPlayAction {
    source: CecLogicalAddress,
    source_path: PhysicalAddress,
    target: CecLogicalAddress,
    state: ActionState,
    power_status_counter: u32,
    callbacks: Vec<Box<dyn Callback>>,
    routing_targets: Vec<CecLogicalAddress>,
    config: OneTouchPlayConfig,
}

impl OneTouchPlayAction {
    /// Returns `None` without a source device, if the device is not a source or without a callback.
    ///
    /// `routing_targets` are the local devices whose routing and active port
    /// follow the claim, usually the source itself and a co-located audio system.
    pub fn create(
        source: Option<&LocalDevice>,
        target: CecLogicalAddress,
        callback: Option<Box<dyn Callback>>,
        routing_targets: Vec<CecLogicalAddress>,
        config: OneTouchPlayConfig,
    ) -> Option<Self> {
        let (source, callback) = match (source, callback) {
            (Some(s), Some(c)) if s.device_type.is_source() => (s, c),
            _ => {
                error!(target_addr = ?target, "one touch play: wrong arguments");
                return None;
            }
        };
        Some(Self {
            source: source.logical_address,
            source_path: source.physical_address,
            target,
            state: ActionState::Idle,
            power_status_counter: 0,
            callbacks: vec![callback],
            routing_targets,
            config,
        })
    }

    #[inline]
    pub fn target(&self) -> CecLogicalAddress {
        self.target
    }
    /// number of retries done so far
    #[inline]
    pub fn power_status_counter(&self) -> u32 {
        self.power_status_counter
    }

    /// Merge another listener into the running action.
    ///
    /// Once the action finished the callback is handed back.
    pub fn add_callback(&mut self, callback: Box<dyn Callback>) -> Result<(), Box<dyn Callback>> {
        if self.state == ActionState::Finished {
            return Err(callback);
        }
        self.callbacks.push(callback);
        Ok(())
    }

    fn broadcast_active_source(&mut self, ctx: &mut dyn ActionContext) {
        ctx.set_and_broadcast_active_source(self.source, self.source_path);
        // only the local records are updated here, which internal input to show
        // is up to whoever requested one touch play
        for device in &self.routing_targets {
            ctx.set_routing_port(*device, CEC_SWITCH_HOME);
            ctx.set_local_active_port(*device, CEC_SWITCH_HOME);
        }
    }

    fn query_device_power_status(&mut self, ctx: &mut dyn ActionContext) {
        self.state = ActionState::WaitingForReportPowerStatus;
        ctx.send_command(message::give_device_power_status(self.source, self.target));
    }

    fn finish(&mut self, result: ResultCode) {
        info!(target_addr = ?self.target, ?result, "one touch play finished");
        self.state = ActionState::Finished;
        for callback in &mut self.callbacks {
            if let Err(e) = callback.on_complete(result) {
                warn!(error = %e, "one touch play: callback failed");
            }
        }
        self.callbacks.clear();
    }
}

impl FeatureAction for OneTouchPlayAction {
    fn start(&mut self, ctx: &mut dyn ActionContext) -> bool {
        info!(target_addr = ?self.target, "one touch play start");
        ctx.send_command(message::text_view_on(self.source, self.target));
        self.broadcast_active_source(ctx);
        self.query_device_power_status(ctx);
        ctx.add_timer(self.state, self.config.initial_timeout());
        true
    }

    fn process_command(&mut self, _ctx: &mut dyn ActionContext, msg: &CecMessage) -> bool {
        if self.state != ActionState::WaitingForReportPowerStatus || msg.source() != self.target {
            return false;
        }
        if msg.opcode() != Ok(CecOpcode::ReportPowerStatus) {
            return false;
        }
        match msg.params().first().map(|s| CecPowerStatus::try_from(*s)) {
            Some(Ok(status)) if status.is_on_or_turning_on() => self.finish(ResultCode::Success),
            Some(Ok(status)) => debug!(?status, "display not on yet"),
            Some(Err(e)) => warn!(status = e.number, "unknown power status"),
            None => warn!("power status report without status"),
        }
        true
    }

    fn handle_timer_event(&mut self, ctx: &mut dyn ActionContext, state: ActionState) {
        if self.state != state || state != ActionState::WaitingForReportPowerStatus {
            return;
        }
        if self.power_status_counter < self.config.max_retries {
            self.power_status_counter += 1;
            warn!(retry = self.power_status_counter, "one touch play retry");
            ctx.send_command(message::text_view_on(self.source, self.target));
            ctx.send_command(message::active_source(self.source, self.source_path));
            self.query_device_power_status(ctx);
            ctx.add_timer(self.state, self.config.retry_timeout());
        } else {
            self.finish(ResultCode::Timeout);
        }
    }

    #[inline]
    fn state(&self) -> ActionState {
        self.state
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
