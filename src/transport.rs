use std::collections::VecDeque;

use crate::{error::Error, message::CecMessage};

/// Puts messages on the bus.
pub trait Transport {
    fn send(&mut self, msg: &CecMessage) -> Result<(), Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, msg: &CecMessage) -> Result<(), Error> {
        (**self).send(msg)
    }
}

/// Takes messages off the bus.
pub trait Receiver {
    /// Wait at most `timeout_ms` for the next message, 0 waits forever.
    ///
    /// `Ok(None)` for frames that carry nothing to dispatch (polls, bad receive status).
    /// Nothing arriving in time is an error of kind [TimedOut](std::io::ErrorKind::TimedOut).
    fn receive(&mut self, timeout_ms: u32) -> std::io::Result<Option<CecMessage>>;
}

/// Collects messages instead of sending them.
///
/// Used by the async driver to send after each step, and handy in tests.
#[derive(Debug, Default)]
pub struct Outbox(VecDeque<CecMessage>);

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn drain(&mut self) -> impl Iterator<Item = CecMessage> + '_ {
        self.0.drain(..)
    }
    pub fn iter(&self) -> impl Iterator<Item = &CecMessage> {
        self.0.iter()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Transport for Outbox {
    fn send(&mut self, msg: &CecMessage) -> Result<(), Error> {
        self.0.push_back(msg.clone());
        Ok(())
    }
}
