//! Triggers, conditions, actions and notifications as seen by a client.
//!
//! These values are owned by the notification service; a client only holds
//! them transiently while selecting triggers or rendering a notification.

use crate::error::{Error, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    Notify,
    StartSession,
    StopSession,
    RotateSession,
    Snapshot,
    Group,
    Unknown(i32),
}

impl ActionType {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ActionType::Notify,
            1 => ActionType::StartSession,
            2 => ActionType::StopSession,
            3 => ActionType::RotateSession,
            4 => ActionType::Snapshot,
            5 => ActionType::Group,
            other => ActionType::Unknown(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            ActionType::Notify => 0,
            ActionType::StartSession => 1,
            ActionType::StopSession => 2,
            ActionType::RotateSession => 3,
            ActionType::Snapshot => 4,
            ActionType::Group => 5,
            ActionType::Unknown(code) => code,
        }
    }

    /// Parses the command-line spelling used by `trigger-admin`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "notify" => Some(ActionType::Notify),
            "start-session" => Some(ActionType::StartSession),
            "stop-session" => Some(ActionType::StopSession),
            "rotate-session" => Some(ActionType::RotateSession),
            "snapshot" => Some(ActionType::Snapshot),
            "group" => Some(ActionType::Group),
            _ => None,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::Notify => write!(f, "notify"),
            ActionType::StartSession => write!(f, "start-session"),
            ActionType::StopSession => write!(f, "stop-session"),
            ActionType::RotateSession => write!(f, "rotate-session"),
            ActionType::Snapshot => write!(f, "snapshot"),
            ActionType::Group => write!(f, "group"),
            ActionType::Unknown(code) => write!(f, "unknown({code})"),
        }
    }
}

/// A trigger's configured response.
///
/// Group metadata is reported by the service and may be inconsistent (a
/// declared member count the service cannot back with members, or a member
/// of an unknown type); the group accessors surface that as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    action_type: ActionType,
    declared_count: usize,
    members: Vec<ActionType>,
}

impl Action {
    pub fn new(action_type: ActionType) -> Self {
        Action {
            action_type,
            declared_count: 0,
            members: Vec::new(),
        }
    }

    pub fn notify() -> Self {
        Action::new(ActionType::Notify)
    }

    pub fn group(members: Vec<ActionType>) -> Self {
        Action {
            action_type: ActionType::Group,
            declared_count: members.len(),
            members,
        }
    }

    /// Rebuilds an action from the raw fields stored by a service.
    pub(crate) fn from_parts(type_code: i32, declared_count: usize, member_codes: &[i32]) -> Self {
        Action {
            action_type: ActionType::from_code(type_code),
            declared_count,
            members: member_codes.iter().map(|&c| ActionType::from_code(c)).collect(),
        }
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    pub fn group_count(&self) -> Result<usize> {
        if self.action_type != ActionType::Group || self.declared_count > self.members.len() {
            return Err(Error::ActionGroupCount);
        }
        Ok(self.declared_count)
    }

    pub fn group_member_type(&self, index: usize) -> Result<ActionType> {
        match self.members.get(index) {
            Some(ActionType::Unknown(_)) | None => Err(Error::ActionGroupMember { index }),
            Some(member) => Ok(*member),
        }
    }

    pub(crate) fn member_codes(&self) -> impl Iterator<Item = i32> + '_ {
        self.members.iter().map(|m| m.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionType {
    SessionConsumedSize,
    BufferUsageHigh,
    BufferUsageLow,
    SessionRotationOngoing,
    SessionRotationCompleted,
    EventRuleHit,
    Unknown(i32),
}

impl ConditionType {
    pub fn from_code(code: i32) -> Self {
        match code {
            100 => ConditionType::SessionConsumedSize,
            101 => ConditionType::BufferUsageHigh,
            102 => ConditionType::BufferUsageLow,
            103 => ConditionType::SessionRotationOngoing,
            104 => ConditionType::SessionRotationCompleted,
            105 => ConditionType::EventRuleHit,
            other => ConditionType::Unknown(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            ConditionType::SessionConsumedSize => 100,
            ConditionType::BufferUsageHigh => 101,
            ConditionType::BufferUsageLow => 102,
            ConditionType::SessionRotationOngoing => 103,
            ConditionType::SessionRotationCompleted => 104,
            ConditionType::EventRuleHit => 105,
            ConditionType::Unknown(code) => code,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "session-consumed-size" => Some(ConditionType::SessionConsumedSize),
            "buffer-usage-high" => Some(ConditionType::BufferUsageHigh),
            "buffer-usage-low" => Some(ConditionType::BufferUsageLow),
            "session-rotation-ongoing" => Some(ConditionType::SessionRotationOngoing),
            "session-rotation-completed" => Some(ConditionType::SessionRotationCompleted),
            "event-rule-hit" => Some(ConditionType::EventRuleHit),
            _ => None,
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionType::SessionConsumedSize => write!(f, "session-consumed-size"),
            ConditionType::BufferUsageHigh => write!(f, "buffer-usage-high"),
            ConditionType::BufferUsageLow => write!(f, "buffer-usage-low"),
            ConditionType::SessionRotationOngoing => write!(f, "session-rotation-ongoing"),
            ConditionType::SessionRotationCompleted => write!(f, "session-rotation-completed"),
            ConditionType::EventRuleHit => write!(f, "event-rule-hit"),
            ConditionType::Unknown(code) => write!(f, "unknown({code})"),
        }
    }
}

/// Opaque subscription key of a trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    id: u64,
    condition_type: ConditionType,
    event_pattern: Option<String>,
}

impl Condition {
    pub fn new(id: u64, condition_type: ConditionType) -> Self {
        Condition {
            id,
            condition_type,
            event_pattern: None,
        }
    }

    pub fn event_rule(id: u64, pattern: &str) -> Self {
        Condition {
            id,
            condition_type: ConditionType::EventRuleHit,
            event_pattern: Some(pattern.to_string()),
        }
    }

    pub fn get_id(&self) -> u64 {
        self.id
    }

    pub fn condition_type(&self) -> ConditionType {
        self.condition_type
    }

    pub fn event_pattern(&self) -> Option<&str> {
        self.event_pattern.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    name: String,
    condition: Condition,
    action: Action,
}

impl Trigger {
    pub fn new(name: &str, condition: Condition, action: Action) -> Self {
        Trigger {
            name: name.to_string(),
            condition,
            action,
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn action(&self) -> &Action {
        &self.action
    }
}

/// What specifically fired a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    SessionConsumedSize,
    BufferUsageLow,
    BufferUsageHigh,
    SessionRotationOngoing,
    SessionRotationCompleted,
    EventRuleHit { trigger_name: Option<String> },
    Unknown(i32),
}

impl Evaluation {
    pub fn from_parts(type_code: i32, trigger_name: Option<String>) -> Self {
        match ConditionType::from_code(type_code) {
            ConditionType::SessionConsumedSize => Evaluation::SessionConsumedSize,
            ConditionType::BufferUsageHigh => Evaluation::BufferUsageHigh,
            ConditionType::BufferUsageLow => Evaluation::BufferUsageLow,
            ConditionType::SessionRotationOngoing => Evaluation::SessionRotationOngoing,
            ConditionType::SessionRotationCompleted => Evaluation::SessionRotationCompleted,
            ConditionType::EventRuleHit => Evaluation::EventRuleHit { trigger_name },
            ConditionType::Unknown(code) => Evaluation::Unknown(code),
        }
    }

    pub fn type_code(&self) -> i32 {
        match self {
            Evaluation::SessionConsumedSize => ConditionType::SessionConsumedSize.code(),
            Evaluation::BufferUsageLow => ConditionType::BufferUsageLow.code(),
            Evaluation::BufferUsageHigh => ConditionType::BufferUsageHigh.code(),
            Evaluation::SessionRotationOngoing => ConditionType::SessionRotationOngoing.code(),
            Evaluation::SessionRotationCompleted => ConditionType::SessionRotationCompleted.code(),
            Evaluation::EventRuleHit { .. } => ConditionType::EventRuleHit.code(),
            Evaluation::Unknown(code) => *code,
        }
    }

    /// Name of the trigger that fired an event rule.
    pub fn trigger_name(&self) -> Result<&str> {
        match self {
            Evaluation::EventRuleHit {
                trigger_name: Some(name),
            } => Ok(name),
            _ => Err(Error::TriggerName),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    condition: Condition,
    evaluation: Evaluation,
}

impl Notification {
    pub fn new(condition: Condition, evaluation: Evaluation) -> Self {
        Notification {
            condition,
            evaluation,
        }
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn evaluation(&self) -> &Evaluation {
        &self.evaluation
    }
}
