use crate::error::Result;
use crate::model::{Action, ActionType, Trigger};
use log::debug;
use std::io::Write;

pub fn action_group_contains_notify(action_group: &Action) -> Result<bool> {
    let count = action_group.group_count()?;
    for i in 0..count {
        if action_group.group_member_type(i)? == ActionType::Notify {
            return Ok(true);
        }
    }
    Ok(false)
}

/// True when the action is `notify` or a group holding at least one `notify`.
pub fn is_notify_eligible(action: &Action) -> Result<bool> {
    match action.action_type() {
        ActionType::Notify => Ok(true),
        ActionType::Group => action_group_contains_notify(action),
        _ => Ok(false),
    }
}

/// Picks the triggers named `name` whose action can notify, in enumeration
/// order. Same-named triggers that cannot notify are reported on `diag` and
/// skipped.
pub fn select_triggers<'a, W: Write>(
    triggers: &'a [Trigger],
    name: &str,
    diag: &mut W,
) -> Result<Vec<&'a Trigger>> {
    let mut selected = Vec::new();
    for trigger in triggers {
        if trigger.get_name() != name {
            continue;
        }

        if !is_notify_eligible(trigger.action())? {
            writeln!(
                diag,
                "The action of trigger \"{}\" is not \"notify\", skipping.",
                trigger.get_name()
            )?;
            continue;
        }

        debug!(
            "Trigger {} eligible (condition {})",
            trigger.get_name(),
            trigger.condition().get_id()
        );
        selected.push(trigger);
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::Condition;

    fn catalog() -> Vec<Trigger> {
        vec![
            Trigger::new("A", Condition::event_rule(1, "a"), Action::notify()),
            Trigger::new(
                "B",
                Condition::event_rule(2, "b"),
                Action::new(ActionType::StartSession),
            ),
            Trigger::new(
                "C",
                Condition::event_rule(3, "c"),
                Action::group(vec![ActionType::Snapshot, ActionType::Notify]),
            ),
            Trigger::new(
                "D",
                Condition::event_rule(4, "d"),
                Action::group(vec![ActionType::StopSession, ActionType::RotateSession]),
            ),
        ]
    }

    fn select(name: &str) -> (Vec<u64>, String) {
        let triggers = catalog();
        let mut diag = Vec::new();
        let ids = select_triggers(&triggers, name, &mut diag)
            .unwrap()
            .iter()
            .map(|t| t.condition().get_id())
            .collect();
        (ids, String::from_utf8(diag).unwrap())
    }

    #[test]
    fn test_notify_trigger_selected() {
        assert_eq!(select("A"), (vec![1], String::new()));
    }

    #[test]
    fn test_group_with_notify_selected() {
        assert_eq!(select("C"), (vec![3], String::new()));
    }

    #[test]
    fn test_ineligible_triggers_skipped() {
        let (ids, diag) = select("B");
        assert!(ids.is_empty());
        assert_eq!(diag, "The action of trigger \"B\" is not \"notify\", skipping.\n");

        let (ids, diag) = select("D");
        assert!(ids.is_empty());
        assert_eq!(diag.lines().count(), 1);
        assert!(diag.contains("\"D\""));
    }

    #[test]
    fn test_name_match_is_exact() {
        assert_eq!(select("a"), (vec![], String::new()));
        assert_eq!(select("missing"), (vec![], String::new()));
    }

    #[test]
    fn test_duplicate_names_all_selected() {
        let mut triggers = catalog();
        triggers.push(Trigger::new("A", Condition::event_rule(9, "a"), Action::notify()));
        let mut diag = Vec::new();
        let selected = select_triggers(&triggers, "A", &mut diag).unwrap();
        let ids: Vec<u64> = selected.iter().map(|t| t.condition().get_id()).collect();
        assert_eq!(ids, vec![1, 9]);
    }

    #[test]
    fn test_group_metadata_failure_is_fatal() {
        let triggers = vec![Trigger::new(
            "broken",
            Condition::event_rule(1, "x"),
            Action::from_parts(ActionType::Group.code(), 4, &[2]),
        )];
        let mut diag = Vec::new();
        let ret = select_triggers(&triggers, "broken", &mut diag);
        assert!(matches!(ret, Err(Error::ActionGroupCount)));

        let triggers = vec![Trigger::new(
            "broken",
            Condition::event_rule(1, "x"),
            Action::from_parts(ActionType::Group.code(), 2, &[2, -5]),
        )];
        let ret = select_triggers(&triggers, "broken", &mut diag);
        assert!(matches!(ret, Err(Error::ActionGroupMember { index: 1 })));
    }

    #[test]
    fn test_group_scan_stops_at_first_notify() {
        let action = Action::from_parts(ActionType::Group.code(), 2, &[0, -5]);
        assert!(action_group_contains_notify(&action).unwrap());
    }
}
