use crate::directory::{Directory, RingRead};
use crate::error::{Error, Result};
use crate::model::{Evaluation, Trigger};
use crate::selector::is_notify_eligible;
use log::{debug, warn};
use rufutex::rufutex::SharedFutex;
use rushm::posixaccessor;

/// Handle on the loopback daemon's shared directory.
///
/// Every access to the directory goes through the futex mutex stored in the
/// `<mem_path>_mutex` segment, so several processes can share it.
pub struct Coordinator {
    mem_path: String,
    directory: *mut Directory,
    shm: posixaccessor::POSIXShm<Directory>,
    shm_mutex: posixaccessor::POSIXShm<i32>,
    mutex: SharedFutex,
    closed: bool,
}

impl Coordinator {
    /// Attaches to the directory at `mem_path`, creating and initializing it
    /// when it does not exist yet.
    pub fn open(mem_path: &str) -> Result<Self> {
        let mutex_path = mem_path.to_string() + "_mutex";
        let mut shm_mutex =
            posixaccessor::POSIXShm::<i32>::new(mutex_path, std::mem::size_of::<i32>());
        unsafe {
            shm_mutex.open().map_err(|e| {
                Error::shared_memory(format!("Error opening shared memory for mutex: {e}"))
            })?;
        }
        let ptr_shm = shm_mutex.get_cptr_mut();
        let mutex = SharedFutex::new(ptr_shm);

        let mut shm = posixaccessor::POSIXShm::<Directory>::new(
            mem_path.to_string(),
            std::mem::size_of::<Directory>(),
        );
        unsafe {
            shm.open()
                .map_err(|e| Error::shared_memory(format!("Error opening shared memory: {e}")))?;
        }

        let directory: *mut Directory = shm.get_as_mut();
        if directory.is_null() {
            return Err(Error::shared_memory(
                "Error getting pointer to shared memory",
            ));
        }

        let mut coordinator = Coordinator {
            mem_path: mem_path.to_string(),
            directory,
            shm,
            shm_mutex,
            mutex,
            closed: false,
        };

        coordinator.with_directory(|directory| {
            if !directory.is_initialized() {
                debug!("Initializing trigger directory");
                *directory = Directory::new();
            }
        });
        Ok(coordinator)
    }

    pub fn get_path(&self) -> String {
        self.mem_path.clone()
    }

    fn with_directory<R>(&mut self, f: impl FnOnce(&mut Directory) -> R) -> R {
        self.mutex.lock();
        let ret = unsafe { f(&mut *self.directory) };
        self.mutex.unlock(0);
        ret
    }

    pub fn add_trigger(&mut self, trigger: &Trigger) -> Result<u64> {
        let ret = self.with_directory(|directory| directory.add_trigger(trigger));
        if let Ok(condition_id) = &ret {
            debug!(
                "Trigger {} registered with condition {}",
                trigger.get_name(),
                condition_id
            );
        }
        ret
    }

    pub fn remove_trigger(&mut self, name: &str) -> bool {
        self.with_directory(|directory| directory.remove_trigger(name))
    }

    pub fn list_triggers(&mut self) -> Vec<Trigger> {
        self.with_directory(|directory| directory.triggers().map(|t| t.to_trigger()).collect())
    }

    pub fn has_condition(&mut self, condition_id: u64) -> bool {
        self.with_directory(|directory| directory.has_condition(condition_id))
    }

    /// Publishes one notification for the trigger named `name`. Returns the
    /// sequence number, or `None` when no such trigger exists.
    pub fn fire(&mut self, name: &str, evaluation: &Evaluation) -> Option<u64> {
        self.with_directory(|directory| {
            let trigger = *directory.find_trigger(name)?;
            Some(directory.publish(&trigger, evaluation))
        })
    }

    /// Publishes an event-rule hit for every notify-capable trigger whose
    /// pattern matches `event_name`. Returns the number of notifications.
    pub fn fire_event_rules(&mut self, event_name: &str) -> usize {
        self.with_directory(|directory| {
            let hits: Vec<_> = directory
                .triggers()
                .filter(|t| t.matches_event(event_name))
                .filter(|t| match is_notify_eligible(t.to_trigger().action()) {
                    Ok(eligible) => eligible,
                    Err(e) => {
                        warn!("Ignoring trigger {}: {}", t.get_name(), e);
                        false
                    }
                })
                .copied()
                .collect();

            for trigger in &hits {
                let evaluation = Evaluation::EventRuleHit {
                    trigger_name: Some(trigger.get_name()),
                };
                directory.publish(trigger, &evaluation);
            }
            hits.len()
        })
    }

    pub fn read(&mut self, cursor: u64) -> RingRead {
        self.with_directory(|directory| directory.read(cursor))
    }

    /// Per-condition publish counts before `sequence`, for each of
    /// `condition_ids` whose trigger still exists.
    pub fn published_before(&mut self, condition_ids: &[u64], sequence: u64) -> Vec<(u64, u64)> {
        self.with_directory(|directory| {
            condition_ids
                .iter()
                .filter_map(|&id| Some((id, directory.published_before(id, sequence)?)))
                .collect()
        })
    }

    pub fn next_sequence(&mut self) -> u64 {
        self.with_directory(|directory| directory.next_sequence)
    }

    pub fn set_closed(&mut self, closed: bool) {
        self.with_directory(|directory| directory.closed = u32::from(closed));
    }

    pub fn close(&mut self, unlink: bool) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let ret: std::result::Result<(), String>;
        unsafe {
            ret = self.shm.close(unlink);
        }
        if ret.is_err() {
            return Err(Error::shared_memory("Error closing shared memory"));
        }

        let ret: std::result::Result<(), String>;
        unsafe {
            ret = self.shm_mutex.close(unlink);
        }
        if ret.is_err() {
            return Err(Error::shared_memory(
                "Error closing shared memory for mutex",
            ));
        }
        Ok(())
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if let Err(e) = self.close(false) {
            debug!("{}: {}", self.mem_path, e);
        }
    }
}

#[cfg(test)]
pub(crate) fn unique_path(tag: &str) -> String {
    format!("mptrigger_test_{}_{}", tag, std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, ActionType, Condition, ConditionType};

    #[test]
    fn test_shared_directory() {
        let path = unique_path("coordinator");
        let mut coordinator = Coordinator::open(&path).unwrap();
        let mut coordinator2 = Coordinator::open(&path).unwrap();

        let trigger = Trigger::new(
            "test_trigger",
            Condition::event_rule(0, "trigger_exemple:my_event"),
            Action::notify(),
        );
        let condition_id = coordinator.add_trigger(&trigger).unwrap();

        let listed = coordinator2.list_triggers();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].get_name(), "test_trigger");
        assert_eq!(listed[0].condition().get_id(), condition_id);
        assert!(coordinator2.has_condition(condition_id));

        assert!(coordinator2.remove_trigger("test_trigger"));
        assert!(coordinator.list_triggers().is_empty());

        let ret = coordinator2.close(false);
        assert!(ret.is_ok());
        let _ret = coordinator.close(true);
    }

    #[test]
    fn test_fire_event_rules() {
        let path = unique_path("fire");
        let mut coordinator = Coordinator::open(&path).unwrap();
        let triggers = [
            Trigger::new("notify", Condition::event_rule(0, "p:e"), Action::notify()),
            Trigger::new(
                "group",
                Condition::event_rule(0, "p:*"),
                Action::group(vec![ActionType::Snapshot, ActionType::Notify]),
            ),
            Trigger::new(
                "silent",
                Condition::event_rule(0, "p:e"),
                Action::new(ActionType::StopSession),
            ),
            Trigger::new(
                "usage",
                Condition::new(0, ConditionType::BufferUsageLow),
                Action::notify(),
            ),
        ];
        for trigger in &triggers {
            coordinator.add_trigger(trigger).unwrap();
        }

        let start = coordinator.next_sequence();
        assert_eq!(coordinator.fire_event_rules("p:e"), 2);
        assert_eq!(coordinator.fire_event_rules("q:e"), 0);
        assert_eq!(coordinator.next_sequence(), start + 2);

        match coordinator.read(start) {
            RingRead::Record(record) => {
                let n = record.to_notification();
                assert_eq!(n.evaluation().trigger_name().unwrap(), "notify");
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(coordinator
            .fire("usage", &Evaluation::BufferUsageLow)
            .is_some());
        assert!(coordinator.fire("nope", &Evaluation::BufferUsageLow).is_none());

        let _ret = coordinator.close(true);
    }
}
