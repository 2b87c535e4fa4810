use std::{collections::HashMap, io::ErrorKind, time::Instant};

use tracing::{debug, warn};

use crate::{
    action::{ActionContext, ActionState, Callback, FeatureAction},
    config::OneTouchPlayConfig,
    message::{self, CecMessage},
    one_touch_play::OneTouchPlayAction,
    protocol::{CecLogicalAddress, CecPrimDevType, PhysicalAddress},
    timer::{TimerOwner, TimerService, TimerToken},
    transport::{Receiver, Transport},
};

/// A device this host plays on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDevice {
    pub logical_address: CecLogicalAddress,
    pub physical_address: PhysicalAddress,
    pub device_type: CecPrimDevType,
}

/// Input selection of a local device.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RoutingState {
    /// port the active routing path goes through
    pub routing_port: u8,
    /// port the device itself currently shows
    pub local_active_port: u8,
}

/// Who we believe is the active source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveSource {
    pub logical_address: CecLogicalAddress,
    pub physical_address: PhysicalAddress,
}

struct Slot {
    id: TimerOwner,
    action: Box<dyn FeatureAction>,
}

/// everything an action may touch, split from the action list so both can be borrowed at once
struct Core<T> {
    transport: T,
    local: LocalDevice,
    timers: TimerService,
    routing: HashMap<CecLogicalAddress, RoutingState>,
    active_source: Option<ActiveSource>,
}

impl<T: Transport> Core<T> {
    fn send(&mut self, msg: &CecMessage) {
        debug!(%msg, "send");
        if let Err(e) = self.transport.send(msg) {
            warn!(error = %e, %msg, "send failed");
        }
    }
}

struct Ctx<'a, T> {
    core: &'a mut Core<T>,
    owner: TimerOwner,
    now: Instant,
}

impl<T: Transport> ActionContext for Ctx<'_, T> {
    fn send_command(&mut self, msg: CecMessage) {
        self.core.send(&msg);
    }
    fn add_timer(&mut self, state: ActionState, delay: std::time::Duration) -> TimerToken {
        debug!(action = self.owner, ?state, ?delay, "arm timer");
        self.core.timers.arm(self.owner, state, self.now + delay)
    }
    fn set_and_broadcast_active_source(&mut self, source: CecLogicalAddress, path: PhysicalAddress) {
        self.core.active_source = Some(ActiveSource {
            logical_address: source,
            physical_address: path,
        });
        self.core.send(&message::active_source(source, path));
    }
    fn set_routing_port(&mut self, device: CecLogicalAddress, port: u8) {
        self.core.routing.entry(device).or_default().routing_port = port;
    }
    fn set_local_active_port(&mut self, device: CecLogicalAddress, port: u8) {
        self.core.routing.entry(device).or_default().local_active_port = port;
    }
}

/**
 * Runs the feature actions of one local device.
 *
 * Nothing here blocks or sleeps: the caller hands in inbound messages and the
 * current time, and asks [ActionRunner::next_deadline] when to come back.
 * ```
 * # use cec_otp::*;
 * # use std::time::Instant;
 * let local = LocalDevice {
 *     logical_address: CecLogicalAddress::Playback1,
 *     physical_address: PhysicalAddress::new(0x1000),
 *     device_type: CecPrimDevType::PLAYBACK,
 * };
 * let mut runner = ActionRunner::new(Outbox::new(), local, OneTouchPlayConfig::default());
 * let (tx, rx) = std::sync::mpsc::channel::<ResultCode>();
 * assert!(runner.one_touch_play(CecLogicalAddress::Tv, Box::new(tx), Instant::now()));
 * let on = report_power_status(CecLogicalAddress::Tv, CecLogicalAddress::Playback1, CecPowerStatus::On);
 * assert!(runner.handle_message(&on, Instant::now()));
 * assert_eq!(rx.recv().unwrap(), ResultCode::Success);
 * ```
 */
pub struct ActionRunner<T> {
    core: Core<T>,
    audio_system: Option<LocalDevice>,
    actions: Vec<Slot>,
    next_id: TimerOwner,
    config: OneTouchPlayConfig,
}

impl<T: Transport> ActionRunner<T> {
    pub fn new(transport: T, local: LocalDevice, config: OneTouchPlayConfig) -> Self {
        let mut routing = HashMap::new();
        routing.insert(local.logical_address, RoutingState::default());
        Self {
            core: Core {
                transport,
                local,
                timers: TimerService::new(),
                routing,
                active_source: None,
            },
            audio_system: None,
            actions: Vec::new(),
            next_id: 0,
            config,
        }
    }
    /// Register an audio system living on the same host. It follows the active source claims.
    pub fn with_audio_system(mut self, audio_system: LocalDevice) -> Self {
        self.core
            .routing
            .insert(audio_system.logical_address, RoutingState::default());
        self.audio_system = Some(audio_system);
        self
    }

    /// Power on `target` and claim active source.
    ///
    /// If a One Touch Play towards `target` is already running the callback joins it.
    /// Returns false if the local device can not start One Touch Play.
    pub fn one_touch_play(
        &mut self,
        target: CecLogicalAddress,
        callback: Box<dyn Callback>,
        now: Instant,
    ) -> bool {
        let mut callback = callback;
        for slot in &mut self.actions {
            if let Some(otp) = slot.action.as_any_mut().downcast_mut::<OneTouchPlayAction>() {
                if otp.target() == target {
                    match otp.add_callback(callback) {
                        Ok(()) => {
                            debug!(target_addr = ?target, "joined running one touch play");
                            return true;
                        }
                        Err(cb) => callback = cb,
                    }
                }
            }
        }
        let mut routing_targets = vec![self.core.local.logical_address];
        if let Some(audio) = &self.audio_system {
            routing_targets.push(audio.logical_address);
        }
        match OneTouchPlayAction::create(
            Some(&self.core.local),
            target,
            Some(callback),
            routing_targets,
            self.config,
        ) {
            Some(action) => self.add_and_start(Box::new(action), now),
            None => false,
        }
    }

    /// Register `action` and start it.
    pub fn add_and_start(&mut self, mut action: Box<dyn FeatureAction>, now: Instant) -> bool {
        self.next_id += 1;
        let id = self.next_id;
        let mut ctx = Ctx {
            core: &mut self.core,
            owner: id,
            now,
        };
        if !action.start(&mut ctx) {
            self.core.timers.cancel(id);
            return false;
        }
        self.actions.push(Slot { id, action });
        self.reap();
        true
    }

    /// Offer an inbound message to the live actions, oldest first, until one consumes it.
    pub fn handle_message(&mut self, msg: &CecMessage, now: Instant) -> bool {
        let mut handled = false;
        for slot in &mut self.actions {
            let mut ctx = Ctx {
                core: &mut self.core,
                owner: slot.id,
                now,
            };
            if slot.action.process_command(&mut ctx, msg) {
                handled = true;
                break;
            }
        }
        if !handled {
            debug!(%msg, "not handled by any action");
        }
        self.reap();
        handled
    }

    /// Deliver every timer that is due at `now`. Returns how many were delivered.
    pub fn fire_due_timers(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        while let Some(ev) = self.core.timers.pop_due(now) {
            if let Some(slot) = self.actions.iter_mut().find(|s| s.id == ev.owner) {
                let mut ctx = Ctx {
                    core: &mut self.core,
                    owner: ev.owner,
                    now,
                };
                slot.action.handle_timer_event(&mut ctx, ev.state);
                fired += 1;
            }
            self.reap();
        }
        fired
    }

    /// Drop the One Touch Play towards `target`, if any. Its callbacks are not invoked.
    pub fn remove_actions_for(&mut self, target: CecLogicalAddress) -> usize {
        let timers = &mut self.core.timers;
        let before = self.actions.len();
        self.actions.retain_mut(|s| {
            let hit = s
                .action
                .as_any_mut()
                .downcast_mut::<OneTouchPlayAction>()
                .is_some_and(|a| a.target() == target);
            if hit {
                timers.cancel(s.id);
            }
            !hit
        });
        before - self.actions.len()
    }
    /// Drop all actions, e.g. when the device went away.
    pub fn clear_actions(&mut self) {
        for s in self.actions.drain(..) {
            self.core.timers.cancel(s.id);
        }
    }

    /// remove finished actions and whatever timer they left behind
    fn reap(&mut self) {
        let timers = &mut self.core.timers;
        self.actions.retain(|s| {
            if s.action.is_finished() {
                timers.cancel(s.id);
                false
            } else {
                true
            }
        });
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.core.timers.next_deadline()
    }
    pub fn has_actions(&self) -> bool {
        !self.actions.is_empty()
    }
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }
    pub fn pending_timers(&self) -> usize {
        self.core.timers.len()
    }
    pub fn active_source(&self) -> Option<ActiveSource> {
        self.core.active_source
    }
    pub fn routing_state(&self, device: CecLogicalAddress) -> Option<RoutingState> {
        self.core.routing.get(&device).copied()
    }
    pub fn local_device(&self) -> &LocalDevice {
        &self.core.local
    }
    pub fn config(&self) -> &OneTouchPlayConfig {
        &self.config
    }
    pub fn transport(&self) -> &T {
        &self.core.transport
    }
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.core.transport
    }
}

impl<T: Transport + Receiver> ActionRunner<T> {
    /// Receive and dispatch messages and fire timers until no action is left.
    pub fn run_blocking(&mut self) -> std::io::Result<()> {
        while self.has_actions() {
            let timeout = receive_timeout(self.next_deadline(), Instant::now());
            match self.core.transport.receive(timeout) {
                Ok(Some(msg)) => {
                    debug!(%msg, "received");
                    self.handle_message(&msg, Instant::now());
                }
                Ok(None) => {}
                Err(e) if e.kind() == ErrorKind::TimedOut => {}
                Err(e) => {
                    warn!(error = %e, "receive failed");
                    return Err(e);
                }
            }
            self.fire_due_timers(Instant::now());
        }
        Ok(())
    }
}

/// Receive timeout in ms that wakes up at `deadline`.
///
/// 0 blocks forever, so a deadline that already passed still waits 1 ms.
fn receive_timeout(deadline: Option<Instant>, now: Instant) -> u32 {
    match deadline {
        Some(d) => u32::try_from(d.saturating_duration_since(now).as_millis())
            .unwrap_or(u32::MAX)
            .max(1),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        action::ResultCode,
        protocol::{CecOpcode, CecPowerStatus, CEC_SWITCH_HOME},
        transport::Outbox,
    };
    use std::{collections::VecDeque, io, sync::mpsc, time::Duration};

    /// Scripted bus: hands out `inbox` in order, fails once it is empty.
    #[derive(Default)]
    struct FakeBus {
        sent: Vec<CecMessage>,
        inbox: VecDeque<io::Result<Option<CecMessage>>>,
        timeouts: Vec<u32>,
    }

    impl Transport for FakeBus {
        fn send(&mut self, msg: &CecMessage) -> Result<(), crate::Error> {
            self.sent.push(msg.clone());
            Ok(())
        }
    }

    impl Receiver for FakeBus {
        fn receive(&mut self, timeout_ms: u32) -> io::Result<Option<CecMessage>> {
            self.timeouts.push(timeout_ms);
            self.inbox
                .pop_front()
                .unwrap_or_else(|| Err(io::Error::new(io::ErrorKind::BrokenPipe, "bus gone")))
        }
    }

    fn playback() -> LocalDevice {
        LocalDevice {
            logical_address: CecLogicalAddress::Playback1,
            physical_address: PhysicalAddress::new(0x1100),
            device_type: CecPrimDevType::PLAYBACK,
        }
    }

    fn runner() -> ActionRunner<Outbox> {
        ActionRunner::new(Outbox::new(), playback(), OneTouchPlayConfig::default())
    }

    #[test]
    fn timers_of_finished_action_are_cancelled() {
        let t0 = Instant::now();
        let mut r = runner();
        let (tx, rx) = mpsc::channel::<ResultCode>();
        assert!(r.one_touch_play(CecLogicalAddress::Tv, Box::new(tx), t0));
        assert_eq!(r.pending_timers(), 1);

        let on = message::report_power_status(
            CecLogicalAddress::Tv,
            CecLogicalAddress::Playback1,
            CecPowerStatus::On,
        );
        assert!(r.handle_message(&on, t0));
        assert_eq!(rx.try_recv(), Ok(ResultCode::Success));
        assert!(!r.has_actions());
        assert_eq!(r.pending_timers(), 0);
        assert_eq!(r.fire_due_timers(t0 + Duration::from_secs(60)), 0);
    }

    #[test]
    fn claim_updates_records() {
        let audio = LocalDevice {
            logical_address: CecLogicalAddress::Audiosystem,
            device_type: CecPrimDevType::AUDIOSYSTEM,
            ..playback()
        };
        let mut r = runner().with_audio_system(audio);
        let (tx, _rx) = mpsc::channel::<ResultCode>();
        r.one_touch_play(CecLogicalAddress::Tv, Box::new(tx), Instant::now());
        assert_eq!(
            r.active_source(),
            Some(ActiveSource {
                logical_address: CecLogicalAddress::Playback1,
                physical_address: PhysicalAddress::new(0x1100),
            })
        );
        for dev in [CecLogicalAddress::Playback1, CecLogicalAddress::Audiosystem] {
            assert_eq!(
                r.routing_state(dev),
                Some(RoutingState {
                    routing_port: CEC_SWITCH_HOME,
                    local_active_port: CEC_SWITCH_HOME,
                })
            );
        }
        let sent: Vec<_> = r.transport().iter().map(|m| m.opcode().unwrap()).collect();
        assert_eq!(
            sent,
            vec![
                CecOpcode::TextViewOn,
                CecOpcode::ActiveSource,
                CecOpcode::GiveDevicePowerStatus
            ]
        );
    }

    #[test]
    fn tv_can_not_start() {
        let tv = LocalDevice {
            logical_address: CecLogicalAddress::Tv,
            physical_address: PhysicalAddress::ROOT,
            device_type: CecPrimDevType::TV,
        };
        let mut r = ActionRunner::new(Outbox::new(), tv, OneTouchPlayConfig::default());
        let (tx, _rx) = mpsc::channel::<ResultCode>();
        assert!(!r.one_touch_play(CecLogicalAddress::Tv, Box::new(tx), Instant::now()));
        assert!(!r.has_actions());
        assert!(r.transport().is_empty());
    }

    #[test]
    fn removal_cancels_without_callback() {
        let t0 = Instant::now();
        let mut r = runner();
        let (tx, rx) = mpsc::channel::<ResultCode>();
        r.one_touch_play(CecLogicalAddress::Tv, Box::new(tx), t0);
        assert_eq!(r.remove_actions_for(CecLogicalAddress::Audiosystem), 0);
        assert_eq!(r.remove_actions_for(CecLogicalAddress::Tv), 1);
        assert_eq!(r.pending_timers(), 0);
        assert_eq!(r.next_deadline(), None);
        // the sender was dropped with the action
        assert_eq!(rx.try_recv(), Err(mpsc::TryRecvError::Disconnected));
    }

    #[test]
    fn clear_actions_drops_everything() {
        let t0 = Instant::now();
        let mut r = runner();
        let (tx, _rx) = mpsc::channel::<ResultCode>();
        r.one_touch_play(CecLogicalAddress::Tv, Box::new(tx.clone()), t0);
        r.one_touch_play(CecLogicalAddress::Audiosystem, Box::new(tx), t0);
        assert_eq!(r.action_count(), 2);
        r.clear_actions();
        assert!(!r.has_actions());
        assert_eq!(r.pending_timers(), 0);
    }

    #[test]
    fn receive_timeout_never_blocks_forever_with_a_deadline() {
        let t0 = Instant::now();
        assert_eq!(receive_timeout(None, t0), 0);
        assert_eq!(receive_timeout(Some(t0 + Duration::from_millis(2500)), t0), 2500);
        assert_eq!(receive_timeout(Some(t0), t0), 1);
        assert_eq!(receive_timeout(Some(t0), t0 + Duration::from_secs(1)), 1);
    }

    #[test]
    fn run_blocking_until_display_is_on() {
        let on = message::report_power_status(
            CecLogicalAddress::Tv,
            CecLogicalAddress::Playback1,
            CecPowerStatus::On,
        );
        let mut bus = FakeBus::default();
        bus.inbox.push_back(Err(io::ErrorKind::TimedOut.into()));
        bus.inbox.push_back(Ok(None));
        bus.inbox.push_back(Ok(Some(on)));

        let mut r = ActionRunner::new(bus, playback(), OneTouchPlayConfig::default());
        let (tx, rx) = mpsc::channel::<ResultCode>();
        assert!(r.one_touch_play(CecLogicalAddress::Tv, Box::new(tx), Instant::now()));
        r.run_blocking().unwrap();

        assert_eq!(rx.try_recv(), Ok(ResultCode::Success));
        assert!(!r.has_actions());
        let bus = r.transport();
        assert!(bus.inbox.is_empty());
        assert_eq!(bus.timeouts.len(), 3);
        assert!(bus.timeouts.iter().all(|t| (1..=4000).contains(t)));
        assert_eq!(bus.sent.len(), 3);
    }

    #[test]
    fn run_blocking_gives_up_on_receive_error() {
        let mut r = ActionRunner::new(FakeBus::default(), playback(), OneTouchPlayConfig::default());
        let (tx, rx) = mpsc::channel::<ResultCode>();
        r.one_touch_play(CecLogicalAddress::Tv, Box::new(tx), Instant::now());
        let e = r.run_blocking().unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::BrokenPipe);
        assert!(r.has_actions());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn run_blocking_without_actions_returns_at_once() {
        let mut r = ActionRunner::new(FakeBus::default(), playback(), OneTouchPlayConfig::default());
        r.run_blocking().unwrap();
        assert!(r.transport().timeouts.is_empty());
    }
}
