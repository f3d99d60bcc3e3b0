//! Condition merging with transition-time hysteresis
//!
//! `lastTransitionTime` only moves when a condition's status changes. Reason
//! and message edits are still written, but keep the old timestamp.

use chrono::{DateTime, Utc};
use formation_core::{Condition, ConditionStatus, ResourceStatus, find_condition};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Source of "now" for transition times
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fill in `new`'s transition time from `old` and report whether it differs
///
/// - With an old condition: an unset transition time is inherited; if the
///   condition then differs and its status changed, the time becomes `now`.
/// - Without one: an unset transition time becomes `now`; always a change.
pub fn fill_condition(now: DateTime<Utc>, old: Option<&Condition>, new: &mut Condition) -> bool {
    let Some(old) = old else {
        if new.last_transition_time.is_none() {
            new.last_transition_time = Some(now);
        }
        return true;
    };

    let inherit_time = new.last_transition_time.is_none();
    if inherit_time {
        new.last_transition_time = old.last_transition_time;
    }

    let changed = new != old;
    if changed && inherit_time && new.status != old.status {
        new.last_transition_time = Some(now);
    }
    changed
}

/// Outcome of merging one condition into a list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeResult {
    pub changed: bool,
    /// The condition became `True` (appended as `True`, or flipped to `True`)
    pub transitioned_to_true: bool,
}

/// Replace or append `new` in `conditions`
pub fn merge_condition(conditions: &mut Vec<Condition>, mut new: Condition, now: DateTime<Utc>) -> MergeResult {
    let existing = find_condition(conditions, &new.type_);
    let index = existing.map(|(i, _)| i);
    let old_status = existing.map(|(_, c)| c.status.clone());
    let changed = fill_condition(now, existing.map(|(_, c)| c), &mut new);

    if !changed {
        return MergeResult::default();
    }

    let transitioned_to_true =
        new.status == ConditionStatus::True && old_status != Some(ConditionStatus::True);

    match index {
        Some(i) => conditions[i] = new,
        None => conditions.push(new),
    }

    MergeResult {
        changed: true,
        transitioned_to_true,
    }
}

/// Fill every condition of `new` against `existing`
///
/// Also reports a change when the two lists differ in length, which covers
/// conditions that disappeared.
pub fn fill_new_conditions(now: DateTime<Utc>, existing: &[Condition], new: &mut [Condition]) -> bool {
    let mut updated = false;
    for cond in new.iter_mut() {
        let old = find_condition(existing, &cond.type_).map(|(_, c)| c);
        updated |= fill_condition(now, old, cond);
    }
    updated || existing.len() != new.len()
}

/// Replace `existing` with `new` if any resource's conditions changed
///
/// Each resource is compared independently by name. A resource that appears
/// or disappears counts as a change.
pub fn merge_resource_statuses(
    existing: &mut Vec<ResourceStatus>,
    mut new: Vec<ResourceStatus>,
    now: DateTime<Utc>,
) -> bool {
    let by_name: HashMap<&str, &ResourceStatus> =
        existing.iter().map(|s| (s.name.as_str(), s)).collect();

    let mut changed = existing.len() != new.len();
    for status in new.iter_mut() {
        match by_name.get(status.name.as_str()) {
            Some(old) => {
                changed |= fill_new_conditions(now, &old.conditions, &mut status.conditions);
            }
            None => {
                for cond in status.conditions.iter_mut() {
                    fill_condition(now, None, cond);
                }
                changed = true;
            }
        }
    }

    if changed {
        *existing = new;
    }
    changed
}

/// `True` if any condition is true, else `Unknown` if any is unknown, else `False`
pub fn calculate_condition_any(conditions: &[Condition]) -> ConditionStatus {
    let mut any_unknown = false;
    for cond in conditions {
        match cond.status {
            ConditionStatus::True => return ConditionStatus::True,
            ConditionStatus::Unknown | ConditionStatus::Other(_) => any_unknown = true,
            ConditionStatus::False => {}
        }
    }
    if any_unknown {
        ConditionStatus::Unknown
    } else {
        ConditionStatus::False
    }
}

/// `Unknown` if empty or any is unknown, else `False` if any is false, else `True`
pub fn calculate_condition_all(conditions: &[Condition]) -> ConditionStatus {
    if conditions.is_empty() {
        return ConditionStatus::Unknown;
    }

    let mut any_false = false;
    for cond in conditions {
        match cond.status {
            ConditionStatus::Unknown | ConditionStatus::Other(_) => {
                return ConditionStatus::Unknown;
            }
            ConditionStatus::False => any_false = true,
            ConditionStatus::True => {}
        }
    }
    if any_false {
        ConditionStatus::False
    } else {
        ConditionStatus::True
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use formation_core::ConditionType;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap()
    }

    fn cond(type_: ConditionType, status: ConditionStatus) -> Condition {
        Condition::new(type_, status)
    }

    #[test]
    fn test_fill_new_condition_sets_time() {
        let mut new = cond(ConditionType::Ready, ConditionStatus::False);
        assert!(fill_condition(t(0), None, &mut new));
        assert_eq!(new.last_transition_time, Some(t(0)));
    }

    #[test]
    fn test_fill_keeps_explicit_time_for_new_condition() {
        let mut new =
            cond(ConditionType::Ready, ConditionStatus::False).with_transition_time(t(-50));
        assert!(fill_condition(t(0), None, &mut new));
        assert_eq!(new.last_transition_time, Some(t(-50)));
    }

    #[test]
    fn test_fill_identical_is_not_a_change() {
        let old = cond(ConditionType::Ready, ConditionStatus::True).with_transition_time(t(0));
        let mut new = cond(ConditionType::Ready, ConditionStatus::True);

        assert!(!fill_condition(t(100), Some(&old), &mut new));
        assert_eq!(new.last_transition_time, Some(t(0)));
    }

    #[test]
    fn test_message_change_keeps_transition_time() {
        let old = cond(ConditionType::Error, ConditionStatus::True)
            .with_message("first")
            .with_transition_time(t(0));
        let mut new = cond(ConditionType::Error, ConditionStatus::True).with_message("second");

        assert!(fill_condition(t(100), Some(&old), &mut new));
        assert_eq!(new.message, "second");
        assert_eq!(new.last_transition_time, Some(t(0)));
    }

    #[test]
    fn test_status_change_moves_transition_time() {
        let old = cond(ConditionType::Ready, ConditionStatus::False).with_transition_time(t(0));
        let mut new = cond(ConditionType::Ready, ConditionStatus::True);

        assert!(fill_condition(t(100), Some(&old), &mut new));
        assert_eq!(new.last_transition_time, Some(t(100)));
    }

    #[test]
    fn test_merge_condition_hysteresis() {
        let mut conditions = Vec::new();

        let first = merge_condition(
            &mut conditions,
            cond(ConditionType::Error, ConditionStatus::True).with_message("a"),
            t(0),
        );
        assert!(first.changed);
        assert!(first.transitioned_to_true);

        let second = merge_condition(
            &mut conditions,
            cond(ConditionType::Error, ConditionStatus::True).with_message("b"),
            t(10),
        );
        assert!(second.changed);
        assert!(!second.transitioned_to_true);
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].message, "b");
        assert_eq!(conditions[0].last_transition_time, Some(t(0)));

        let third = merge_condition(
            &mut conditions,
            cond(ConditionType::Error, ConditionStatus::True).with_message("b"),
            t(20),
        );
        assert_eq!(third, MergeResult::default());
    }

    #[test]
    fn test_merge_condition_transition_into_true() {
        let mut conditions = vec![
            cond(ConditionType::Ready, ConditionStatus::False).with_transition_time(t(0)),
        ];

        let result =
            merge_condition(&mut conditions, cond(ConditionType::Ready, ConditionStatus::True), t(5));
        assert!(result.transitioned_to_true);
        assert_eq!(conditions[0].last_transition_time, Some(t(5)));

        let back =
            merge_condition(&mut conditions, cond(ConditionType::Ready, ConditionStatus::False), t(9));
        assert!(back.changed);
        assert!(!back.transitioned_to_true);
    }

    #[test]
    fn test_merge_appends_false_as_change() {
        let mut conditions = Vec::new();
        let result = merge_condition(
            &mut conditions,
            cond(ConditionType::InProgress, ConditionStatus::False),
            t(0),
        );
        assert!(result.changed);
        assert!(!result.transitioned_to_true);
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn test_fill_new_conditions_length_change() {
        let existing = vec![
            cond(ConditionType::Ready, ConditionStatus::True).with_transition_time(t(0)),
            cond(ConditionType::Error, ConditionStatus::False).with_transition_time(t(0)),
        ];
        let mut new = vec![cond(ConditionType::Ready, ConditionStatus::True)];

        assert!(fill_new_conditions(t(10), &existing, &mut new));
        assert_eq!(new[0].last_transition_time, Some(t(0)));
    }

    #[test]
    fn test_fill_new_conditions_unchanged() {
        let existing = vec![cond(ConditionType::Ready, ConditionStatus::True).with_transition_time(t(0))];
        let mut new = vec![cond(ConditionType::Ready, ConditionStatus::True)];
        assert!(!fill_new_conditions(t(10), &existing, &mut new));
    }

    #[test]
    fn test_merge_resource_statuses() {
        let mut existing = vec![ResourceStatus {
            name: "table".to_string(),
            conditions: vec![
                cond(ConditionType::Ready, ConditionStatus::False).with_transition_time(t(0)),
            ],
        }];

        let same = vec![ResourceStatus {
            name: "table".to_string(),
            conditions: vec![cond(ConditionType::Ready, ConditionStatus::False)],
        }];
        assert!(!merge_resource_statuses(&mut existing, same, t(10)));

        let flipped = vec![ResourceStatus {
            name: "table".to_string(),
            conditions: vec![cond(ConditionType::Ready, ConditionStatus::True)],
        }];
        assert!(merge_resource_statuses(&mut existing, flipped, t(20)));
        assert_eq!(existing[0].conditions[0].last_transition_time, Some(t(20)));

        let added = vec![
            existing[0].clone(),
            ResourceStatus {
                name: "app".to_string(),
                conditions: vec![cond(ConditionType::Ready, ConditionStatus::False)],
            },
        ];
        assert!(merge_resource_statuses(&mut existing, added, t(30)));
        assert_eq!(existing.len(), 2);
        assert_eq!(existing[1].conditions[0].last_transition_time, Some(t(30)));

        let removed = vec![existing[0].clone()];
        assert!(merge_resource_statuses(&mut existing, removed, t(40)));
        assert_eq!(existing.len(), 1);
    }

    #[test]
    fn test_calculate_condition_any() {
        use ConditionStatus::*;
        let of = |statuses: &[ConditionStatus]| -> Vec<Condition> {
            statuses.iter().map(|s| cond(ConditionType::Ready, s.clone())).collect()
        };

        assert_eq!(calculate_condition_any(&of(&[False, True, Unknown])), True);
        assert_eq!(calculate_condition_any(&of(&[False, Unknown])), Unknown);
        assert_eq!(calculate_condition_any(&of(&[False, False])), False);
        assert_eq!(calculate_condition_any(&[]), False);
    }

    #[test]
    fn test_calculate_condition_all() {
        use ConditionStatus::*;
        let of = |statuses: &[ConditionStatus]| -> Vec<Condition> {
            statuses.iter().map(|s| cond(ConditionType::Ready, s.clone())).collect()
        };

        assert_eq!(calculate_condition_all(&of(&[True, True])), True);
        assert_eq!(calculate_condition_all(&of(&[True, False])), False);
        assert_eq!(calculate_condition_all(&of(&[False, Unknown])), Unknown);
        assert_eq!(calculate_condition_all(&[]), Unknown);
    }

    #[test]
    fn test_unexpected_status_counts_as_unknown() {
        let odd = vec![cond(ConditionType::Ready, ConditionStatus::Other("Maybe".to_string()))];
        assert_eq!(calculate_condition_any(&odd), ConditionStatus::Unknown);
        assert_eq!(calculate_condition_all(&odd), ConditionStatus::Unknown);
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::new(t(0));
        assert_eq!(clock.now(), t(0));
        clock.advance(chrono::Duration::seconds(5));
        assert_eq!(clock.now(), t(5));
        clock.set(t(100));
        assert_eq!(clock.now(), t(100));
    }
}
