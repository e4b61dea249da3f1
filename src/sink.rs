use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::doorbell::Doorbell;
use crate::error::Result;
use crate::service::{EventSink, Tracepoint};
use log::debug;

/// Delivers raised events to the loopback daemon: every event-rule trigger
/// matching the event gets a notification.
pub struct LoopbackSink {
    coordinator: Coordinator,
    doorbell: Doorbell,
    raised: u64,
}

impl LoopbackSink {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(LoopbackSink {
            coordinator: Coordinator::open(&config.session)?,
            doorbell: Doorbell::open(&config.session)?,
            raised: 0,
        })
    }

    pub fn get_raised(&self) -> u64 {
        self.raised
    }
}

impl EventSink for LoopbackSink {
    fn raise(&mut self, tracepoint: &Tracepoint, iteration: u64) {
        self.raised += 1;
        let hits = self.coordinator.fire_event_rules(&tracepoint.to_string());
        debug!("{} (iteration {}) matched {} trigger(s)", tracepoint, iteration, hits);
        if hits > 0 {
            self.doorbell.ring();
        }
    }
}
