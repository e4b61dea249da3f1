use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::directory::RingRead;
use crate::doorbell::Doorbell;
use crate::error::{ChannelError, Error, Result};
use crate::model::{Condition, Trigger};
use crate::service::{ChannelStatus, NotificationChannel, NotificationService};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

struct Subscription {
    condition_id: u64,
    /// Per-condition sequence of the next notification this channel expects.
    expected: u64,
}

/// Notification channel on the loopback daemon.
pub struct Subscriber {
    coordinator: Coordinator,
    doorbell: Doorbell,
    cursor: u64,
    subscriptions: Vec<Subscription>,
    poll_interval: Duration,
    interrupt: Option<&'static AtomicBool>,
}

impl Subscriber {
    /// Opens a channel that only sees notifications published from now on.
    pub fn new(config: &Config, interrupt: Option<&'static AtomicBool>) -> Result<Self> {
        let mut coordinator = Coordinator::open(&config.session)?;
        let doorbell = Doorbell::open(&config.session)?;
        let cursor = coordinator.next_sequence();
        debug!("Channel on {} starts at sequence {}", config.session, cursor);
        Ok(Subscriber {
            coordinator,
            doorbell,
            cursor,
            subscriptions: Vec::new(),
            poll_interval: config.poll_interval,
            interrupt,
        })
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn condition_ids(&self) -> Vec<u64> {
        self.subscriptions.iter().map(|s| s.condition_id).collect()
    }

    /// Moves the cursor past an overrun and tells whether any subscribed
    /// condition lost notifications in the skipped range.
    fn skip_overrun(&mut self, resume_at: u64) -> bool {
        let published = self
            .coordinator
            .published_before(&self.condition_ids(), resume_at);
        let mut lost = false;
        for (condition_id, count) in published {
            if let Some(sub) = self
                .subscriptions
                .iter_mut()
                .find(|s| s.condition_id == condition_id)
            {
                if count > sub.expected {
                    debug!(
                        "Condition {} lost {} notification(s)",
                        condition_id,
                        count - sub.expected
                    );
                    lost = true;
                }
                sub.expected = sub.expected.max(count);
            }
        }
        self.cursor = resume_at;
        lost
    }

    fn is_interrupted(&self) -> bool {
        self.interrupt
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

impl NotificationChannel for Subscriber {
    fn subscribe(&mut self, condition: &Condition) -> std::result::Result<(), ChannelError> {
        if !self.coordinator.has_condition(condition.get_id()) {
            return Err(ChannelError::UnknownCondition(condition.get_id()));
        }
        let expected = self
            .coordinator
            .published_before(&[condition.get_id()], self.cursor)
            .first()
            .map(|&(_, count)| count)
            .unwrap_or(0);
        debug!("Subscribed to condition {}", condition.get_id());
        self.subscriptions.push(Subscription {
            condition_id: condition.get_id(),
            expected,
        });
        Ok(())
    }

    fn next_notification(&mut self) -> ChannelStatus {
        loop {
            if self.is_interrupted() {
                return ChannelStatus::Interrupted;
            }

            match self.coordinator.read(self.cursor) {
                RingRead::Record(record) => {
                    if record.get_sequence() != self.cursor {
                        return ChannelStatus::Error(ChannelError::CorruptRecord(self.cursor));
                    }
                    self.cursor += 1;
                    let mut delivered = false;
                    for sub in self
                        .subscriptions
                        .iter_mut()
                        .filter(|s| s.condition_id == record.get_condition_id())
                    {
                        sub.expected = record.get_condition_sequence() + 1;
                        delivered = true;
                    }
                    if delivered {
                        return ChannelStatus::Ok(record.to_notification());
                    }
                }
                RingRead::Overrun { resume_at } => {
                    debug!(
                        "Channel fell behind: {} record(s) overwritten",
                        resume_at - self.cursor
                    );
                    if self.skip_overrun(resume_at) {
                        return ChannelStatus::NotificationsDropped;
                    }
                }
                RingRead::Closed => return ChannelStatus::Closed,
                RingRead::Empty => self.doorbell.wait(self.poll_interval),
            }
        }
    }
}

/// The loopback daemon seen as a notification service.
pub struct LoopbackService {
    config: Config,
    interrupt: Option<&'static AtomicBool>,
}

impl LoopbackService {
    pub fn new(config: Config) -> Self {
        LoopbackService {
            config,
            interrupt: None,
        }
    }

    pub fn with_interrupt(mut self, interrupt: &'static AtomicBool) -> Self {
        self.interrupt = Some(interrupt);
        self
    }
}

impl NotificationService for LoopbackService {
    type Channel = Subscriber;

    fn create_channel(&mut self) -> Result<Subscriber> {
        Subscriber::new(&self.config, self.interrupt).map_err(|e| Error::ChannelCreate {
            message: e.to_string(),
        })
    }

    fn list_triggers(&mut self) -> Result<Vec<Trigger>> {
        let mut coordinator = Coordinator::open(&self.config.session).map_err(|e| {
            Error::ListTriggers {
                message: e.to_string(),
            }
        })?;
        Ok(coordinator.list_triggers())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::unique_path;
    use crate::model::{Action, ConditionType, Evaluation};
    use crate::RING_CAPACITY;

    fn config(tag: &str) -> Config {
        Config {
            session: unique_path(tag),
            poll_interval: Duration::from_millis(10),
        }
    }

    fn add(coordinator: &mut Coordinator, name: &str, pattern: &str) -> Condition {
        let trigger = Trigger::new(name, Condition::event_rule(0, pattern), Action::notify());
        let id = coordinator.add_trigger(&trigger).unwrap();
        Condition::event_rule(id, pattern)
    }

    #[test]
    fn test_subscriber() {
        let config = config("subscriber");
        let mut admin = Coordinator::open(&config.session).unwrap();
        let watched = add(&mut admin, "watched", "p:e");
        add(&mut admin, "ignored", "p:e");

        let mut service = LoopbackService::new(config.clone());
        let names: Vec<String> = service
            .list_triggers()
            .unwrap()
            .iter()
            .map(|t| t.get_name().to_string())
            .collect();
        assert_eq!(names, vec!["watched", "ignored"]);

        let mut channel = service.create_channel().unwrap();
        channel.subscribe(&watched).unwrap();
        assert!(matches!(
            channel.subscribe(&Condition::new(999, ConditionType::EventRuleHit)),
            Err(ChannelError::UnknownCondition(999))
        ));

        let publisher_config = config.clone();
        let handle = std::thread::spawn(move || {
            let mut coordinator = Coordinator::open(&publisher_config.session).unwrap();
            let mut doorbell = Doorbell::open(&publisher_config.session).unwrap();
            // Sleep for a bit to allow the channel to block
            std::thread::sleep(Duration::from_millis(100));
            assert_eq!(coordinator.fire_event_rules("p:e"), 2);
            doorbell.ring();
        });

        match channel.next_notification() {
            ChannelStatus::Ok(n) => {
                assert_eq!(n.condition().get_id(), watched.get_id());
                assert_eq!(n.evaluation().trigger_name().unwrap(), "watched");
            }
            other => panic!("unexpected {other:?}"),
        }
        handle.join().unwrap();

        admin.set_closed(true);
        assert!(matches!(channel.next_notification(), ChannelStatus::Closed));
        drop(channel);
        let _ = admin.close(true);
    }

    #[test]
    fn test_overrun_reports_dropped() {
        let config = config("overrun");
        let mut admin = Coordinator::open(&config.session).unwrap();
        let condition = add(&mut admin, "busy", "p:e");

        let mut channel = Subscriber::new(&config, None).unwrap();
        channel.subscribe(&condition).unwrap();
        for _ in 0..RING_CAPACITY + 3 {
            admin.fire("busy", &Evaluation::SessionRotationOngoing);
        }

        assert!(matches!(
            channel.next_notification(),
            ChannelStatus::NotificationsDropped
        ));
        for _ in 0..RING_CAPACITY {
            assert!(matches!(channel.next_notification(), ChannelStatus::Ok(_)));
        }
        admin.set_closed(true);
        assert!(matches!(channel.next_notification(), ChannelStatus::Closed));
        let _ = admin.close(true);
    }

    #[test]
    fn test_unrelated_overrun_is_not_a_drop() {
        let config = config("unrelated_overrun");
        let mut admin = Coordinator::open(&config.session).unwrap();
        let mine = add(&mut admin, "mine", "p:mine");
        add(&mut admin, "other", "p:other");

        let mut channel = Subscriber::new(&config, None).unwrap();
        channel.subscribe(&mine).unwrap();
        for _ in 0..RING_CAPACITY + 6 {
            admin.fire("other", &Evaluation::SessionRotationOngoing);
        }
        admin.set_closed(true);

        assert!(matches!(channel.next_notification(), ChannelStatus::Closed));
        let _ = admin.close(true);
    }

    #[test]
    fn test_overrun_after_own_notification_delivered() {
        let config = config("mixed_overrun");
        let mut admin = Coordinator::open(&config.session).unwrap();
        let mine = add(&mut admin, "mine", "p:mine");
        add(&mut admin, "other", "p:other");

        let mut channel = Subscriber::new(&config, None).unwrap();
        channel.subscribe(&mine).unwrap();
        admin.fire("mine", &Evaluation::SessionRotationOngoing);
        assert!(matches!(channel.next_notification(), ChannelStatus::Ok(_)));

        for _ in 0..RING_CAPACITY + 2 {
            admin.fire("other", &Evaluation::SessionRotationOngoing);
        }
        admin.fire("mine", &Evaluation::SessionRotationCompleted);

        // Nothing of "mine" was overwritten: the next pull is its record.
        match channel.next_notification() {
            ChannelStatus::Ok(n) => {
                assert_eq!(n.evaluation(), &Evaluation::SessionRotationCompleted)
            }
            other => panic!("unexpected {other:?}"),
        }
        let _ = admin.close(true);
    }

    #[test]
    fn test_interrupt_stops_pull() {
        static FLAG: AtomicBool = AtomicBool::new(false);

        let config = config("interrupt");
        let mut channel = Subscriber::new(&config, Some(&FLAG)).unwrap();
        let handle = std::thread::spawn(|| {
            std::thread::sleep(Duration::from_millis(100));
            FLAG.store(true, Ordering::SeqCst);
        });
        assert!(matches!(
            channel.next_notification(),
            ChannelStatus::Interrupted
        ));
        handle.join().unwrap();
        assert_eq!(channel.subscription_count(), 0);
        let _ = Coordinator::open(&config.session).and_then(|mut c| c.close(true));
    }
}
