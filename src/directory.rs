//! Shared-memory layout of the loopback session daemon.

use crate::error::{Error, Result};
use crate::model::{Action, Condition, ConditionType, Evaluation, Notification, Trigger};
use crate::{MAX_GROUP_ACTIONS, MAX_NAME_SIZE, MAX_TRIGGERS, RING_CAPACITY};

pub(crate) const DIRECTORY_MAGIC: u64 = 0x6d70_7472_6967_0002;

fn read_name(buf: &[u8; MAX_NAME_SIZE]) -> String {
    let vname: Vec<u8> = buf.iter().take_while(|&&c| c != 0).cloned().collect();
    String::from_utf8_lossy(&vname).into_owned()
}

fn write_name(buf: &mut [u8; MAX_NAME_SIZE], name: &str) -> Result<()> {
    if name.len() >= MAX_NAME_SIZE {
        return Err(Error::registry(format!("Name too long: {name}")));
    }
    if name.contains('\0') {
        return Err(Error::registry(format!("Name contains NUL: {name:?}")));
    }
    *buf = [0; MAX_NAME_SIZE];
    buf[..name.len()].copy_from_slice(name.as_bytes());
    Ok(())
}

// C representation
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct TriggerRecord {
    in_use: u32,
    condition_type: i32,
    condition_id: u64,
    published: u64,
    action_type: i32,
    action_count: u32,
    actions: [i32; MAX_GROUP_ACTIONS],
    name: [u8; MAX_NAME_SIZE],
    event_pattern: [u8; MAX_NAME_SIZE],
}

impl TriggerRecord {
    pub const EMPTY: TriggerRecord = TriggerRecord {
        in_use: 0,
        condition_type: 0,
        condition_id: 0,
        published: 0,
        action_type: 0,
        action_count: 0,
        actions: [0; MAX_GROUP_ACTIONS],
        name: [0; MAX_NAME_SIZE],
        event_pattern: [0; MAX_NAME_SIZE],
    };

    pub fn is_used(&self) -> bool {
        self.in_use != 0
    }

    pub fn get_name(&self) -> String {
        read_name(&self.name)
    }

    pub fn get_condition_id(&self) -> u64 {
        self.condition_id
    }

    pub fn condition_type(&self) -> ConditionType {
        ConditionType::from_code(self.condition_type)
    }

    pub fn fill(&mut self, trigger: &Trigger, condition_id: u64) -> Result<()> {
        let action = trigger.action();
        let members: Vec<i32> = action.member_codes().collect();
        if members.len() > MAX_GROUP_ACTIONS {
            return Err(Error::registry(format!(
                "Action group of trigger {} has more than {} actions",
                trigger.get_name(),
                MAX_GROUP_ACTIONS
            )));
        }

        let mut record = TriggerRecord::EMPTY;
        write_name(&mut record.name, trigger.get_name())?;
        write_name(
            &mut record.event_pattern,
            trigger.condition().event_pattern().unwrap_or(""),
        )?;
        record.in_use = 1;
        record.condition_type = trigger.condition().condition_type().code();
        record.condition_id = condition_id;
        record.action_type = action.action_type().code();
        record.action_count = members.len() as u32;
        record.actions[..members.len()].copy_from_slice(&members);
        *self = record;
        Ok(())
    }

    pub fn condition(&self) -> Condition {
        match self.condition_type() {
            ConditionType::EventRuleHit => {
                Condition::event_rule(self.condition_id, &read_name(&self.event_pattern))
            }
            other => Condition::new(self.condition_id, other),
        }
    }

    /// The stored count is handed back as is; a count past the member array
    /// shows up as a group metadata error on the client side.
    pub fn to_trigger(&self) -> Trigger {
        let stored = (self.action_count as usize).min(MAX_GROUP_ACTIONS);
        let action = Action::from_parts(
            self.action_type,
            self.action_count as usize,
            &self.actions[..stored],
        );
        Trigger::new(&self.get_name(), self.condition(), action)
    }

    /// Exact match, or prefix match when the pattern ends with `*`.
    pub fn matches_event(&self, event_name: &str) -> bool {
        if self.condition_type() != ConditionType::EventRuleHit {
            return false;
        }
        let pattern = read_name(&self.event_pattern);
        match pattern.strip_suffix('*') {
            Some(prefix) => event_name.starts_with(prefix),
            None => pattern == event_name,
        }
    }
}

// C representation
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NotificationRecord {
    sequence: u64,
    condition_id: u64,
    condition_sequence: u64,
    condition_type: i32,
    evaluation_type: i32,
    has_trigger_name: u32,
    trigger_name: [u8; MAX_NAME_SIZE],
}

impl NotificationRecord {
    pub const EMPTY: NotificationRecord = NotificationRecord {
        sequence: 0,
        condition_id: 0,
        condition_sequence: 0,
        condition_type: 0,
        evaluation_type: 0,
        has_trigger_name: 0,
        trigger_name: [0; MAX_NAME_SIZE],
    };

    pub fn get_sequence(&self) -> u64 {
        self.sequence
    }

    pub fn get_condition_id(&self) -> u64 {
        self.condition_id
    }

    /// Position of this record among the notifications of its condition.
    pub fn get_condition_sequence(&self) -> u64 {
        self.condition_sequence
    }

    pub fn to_notification(&self) -> Notification {
        let trigger_name = (self.has_trigger_name != 0).then(|| read_name(&self.trigger_name));
        let condition = Condition::new(
            self.condition_id,
            ConditionType::from_code(self.condition_type),
        );
        Notification::new(
            condition,
            Evaluation::from_parts(self.evaluation_type, trigger_name),
        )
    }
}

// C representation
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Directory {
    pub(crate) magic: u64,
    pub(crate) closed: u32,
    pub(crate) reserved: u32,
    pub(crate) last_condition_id: u64,
    pub(crate) next_sequence: u64,
    pub(crate) triggers: [TriggerRecord; MAX_TRIGGERS],
    pub(crate) ring: [NotificationRecord; RING_CAPACITY],
}

/// Outcome of reading the ring at a cursor.
#[derive(Debug, Clone, Copy)]
pub enum RingRead {
    Record(NotificationRecord),
    Empty,
    Closed,
    /// The cursor fell behind; reading resumes at `resume_at`.
    Overrun { resume_at: u64 },
}

impl Directory {
    pub fn new() -> Self {
        Directory {
            magic: DIRECTORY_MAGIC,
            closed: 0,
            reserved: 0,
            last_condition_id: 0,
            next_sequence: 0,
            triggers: [TriggerRecord::EMPTY; MAX_TRIGGERS],
            ring: [NotificationRecord::EMPTY; RING_CAPACITY],
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.magic == DIRECTORY_MAGIC
    }

    pub fn is_closed(&self) -> bool {
        self.closed != 0
    }

    pub fn find_trigger(&self, name: &str) -> Option<&TriggerRecord> {
        self.triggers
            .iter()
            .find(|t| t.is_used() && t.get_name() == name)
    }

    pub fn add_trigger(&mut self, trigger: &Trigger) -> Result<u64> {
        if self.find_trigger(trigger.get_name()).is_some() {
            return Err(Error::registry(format!(
                "Trigger {} already exists",
                trigger.get_name()
            )));
        }
        let slot = self
            .triggers
            .iter()
            .position(|t| !t.is_used())
            .ok_or_else(|| Error::registry("Trigger table is full"))?;

        let condition_id = self.last_condition_id + 1;
        self.triggers[slot].fill(trigger, condition_id)?;
        self.last_condition_id = condition_id;
        Ok(condition_id)
    }

    pub fn remove_trigger(&mut self, name: &str) -> bool {
        match self
            .triggers
            .iter_mut()
            .find(|t| t.is_used() && t.get_name() == name)
        {
            Some(record) => {
                *record = TriggerRecord::EMPTY;
                true
            }
            None => false,
        }
    }

    pub fn triggers(&self) -> impl Iterator<Item = &TriggerRecord> {
        self.triggers.iter().filter(|t| t.is_used())
    }

    pub fn has_condition(&self, condition_id: u64) -> bool {
        self.triggers().any(|t| t.condition_id == condition_id)
    }

    pub fn publish(&mut self, trigger: &TriggerRecord, evaluation: &Evaluation) -> u64 {
        let sequence = self.next_sequence;
        let mut record = NotificationRecord::EMPTY;
        record.sequence = sequence;
        record.condition_id = trigger.condition_id;
        if let Some(stored) = self
            .triggers
            .iter_mut()
            .find(|t| t.is_used() && t.condition_id == trigger.condition_id)
        {
            record.condition_sequence = stored.published;
            stored.published += 1;
        }
        record.condition_type = trigger.condition_type;
        record.evaluation_type = evaluation.type_code();
        if let Ok(name) = evaluation.trigger_name() {
            // Names were validated when the trigger was stored.
            if write_name(&mut record.trigger_name, name).is_ok() {
                record.has_trigger_name = 1;
            }
        }
        self.ring[(sequence % RING_CAPACITY as u64) as usize] = record;
        self.next_sequence = sequence + 1;
        sequence
    }

    /// Number of notifications of `condition_id` published before
    /// `sequence`, or `None` once the trigger is gone.
    pub fn published_before(&self, condition_id: u64, sequence: u64) -> Option<u64> {
        let trigger = self.triggers().find(|t| t.condition_id == condition_id)?;
        let oldest = self.next_sequence.saturating_sub(RING_CAPACITY as u64);
        let retained_after = (sequence.max(oldest)..self.next_sequence)
            .map(|s| &self.ring[(s % RING_CAPACITY as u64) as usize])
            .filter(|record| record.condition_id == condition_id)
            .count() as u64;
        Some(trigger.published.saturating_sub(retained_after))
    }

    pub fn read(&self, cursor: u64) -> RingRead {
        if cursor >= self.next_sequence {
            if self.is_closed() {
                return RingRead::Closed;
            }
            return RingRead::Empty;
        }
        let oldest = self.next_sequence.saturating_sub(RING_CAPACITY as u64);
        if cursor < oldest {
            return RingRead::Overrun { resume_at: oldest };
        }
        RingRead::Record(self.ring[(cursor % RING_CAPACITY as u64) as usize])
    }
}

impl Default for Directory {
    fn default() -> Self {
        Directory::new()
    }
}
