//! Progress rollup: key activities → (progress, status).
//!
//! Weights are "percent of the whole", not relative proportions: the
//! weighted sum is divided by a fixed 100, so activities whose weights total
//! `W < 100` cap the initiative at `W` percent. Only when every weight is zero
//! does the rollup fall back to the unweighted mean.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{InitiativeFields, KeyActivity, PERCENT_MAX, Status, Urgency};

/// Compute `(progress, status)` from a non-empty activity list.
///
/// Returns `None` for an empty list; the caller's own progress value is
/// authoritative in that case.
#[must_use]
pub fn rollup(activities: &[KeyActivity]) -> Option<(u8, Status)> {
    if activities.is_empty() {
        return None;
    }

    let total_weight: u32 = activities.iter().map(|a| u32::from(a.weight)).sum();
    let progress = if total_weight > 0 {
        let weighted: u32 = activities
            .iter()
            .map(|a| u32::from(a.progress) * u32::from(a.weight))
            .sum();
        div_round_half_up(weighted, 100)
    } else {
        let sum: u32 = activities.iter().map(|a| u32::from(a.progress)).sum();
        // len fits: the list came from validated input
        let n = u32::try_from(activities.len()).unwrap_or(u32::MAX);
        div_round_half_up(sum, n)
    };

    let progress = clamp_percent(progress);
    Some((progress, derive_status(progress)))
}

/// `100 → Done`, `1..=99 → OnGoing`, `0 → NotStarted`.
#[must_use]
pub const fn derive_status(progress: u8) -> Status {
    match progress {
        0 => Status::NotStarted,
        p if p >= PERCENT_MAX => Status::Done,
        _ => Status::OnGoing,
    }
}

/// Day thresholds for urgency derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgencyThresholds {
    #[serde(default = "default_high_within_days")]
    pub high_within_days: i64,
    #[serde(default = "default_medium_within_days")]
    pub medium_within_days: i64,
}

const fn default_high_within_days() -> i64 {
    7
}

const fn default_medium_within_days() -> i64 {
    30
}

impl Default for UrgencyThresholds {
    fn default() -> Self {
        Self {
            high_within_days: default_high_within_days(),
            medium_within_days: default_medium_within_days(),
        }
    }
}

/// Urgency from the due date: fewer than 7 days left is `High`, fewer than
/// 30 is `Medium`, otherwise (or with no due date) `Low`. Overdue dates count
/// as `High`.
#[must_use]
pub fn urgency_for(due: Option<NaiveDate>, today: NaiveDate, thresholds: UrgencyThresholds) -> Urgency {
    let Some(due) = due else {
        return Urgency::Low;
    };
    let days = (due - today).num_days();
    if days < thresholds.high_within_days {
        Urgency::High
    } else if days < thresholds.medium_within_days {
        Urgency::Medium
    } else {
        Urgency::Low
    }
}

/// Recompute every derived field of `fields` in place.
///
/// Progress is replaced by the rollup when activities exist. Status follows
/// progress unless an administrator pinned it to `Hold`, `CarryOver` or
/// `Cancelled`.
pub fn refresh(fields: &mut InitiativeFields, today: NaiveDate, thresholds: UrgencyThresholds) {
    if let Some((progress, _)) = rollup(&fields.key_activities) {
        fields.progress = progress;
    }
    fields.progress = clamp_percent(u32::from(fields.progress));
    if !fields.status.is_admin_assigned() {
        fields.status = derive_status(fields.progress);
    }
    fields.urgency = urgency_for(fields.due_date, today, thresholds);
}

/// Round-half-up integer division. `denominator` must be non-zero.
const fn div_round_half_up(numerator: u32, denominator: u32) -> u32 {
    (2 * numerator + denominator) / (2 * denominator)
}

fn clamp_percent(value: u32) -> u8 {
    u8::try_from(value.min(u32::from(PERCENT_MAX))).unwrap_or(PERCENT_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Proposal;

    fn act(name: &str, weight: u8, progress: u8) -> KeyActivity {
        KeyActivity::new(name, weight, progress)
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_list_leaves_progress_to_caller() {
        assert_eq!(rollup(&[]), None);
    }

    #[test]
    fn weighted_partial_completion() {
        let acts = [act("A", 70, 100), act("B", 30, 0)];
        assert_eq!(rollup(&acts), Some((70, Status::OnGoing)));
    }

    #[test]
    fn weighted_full_completion_is_done() {
        let acts = [act("A", 50, 100), act("B", 50, 100)];
        assert_eq!(rollup(&acts), Some((100, Status::Done)));
    }

    #[test]
    fn weights_below_100_cap_progress() {
        let acts = [act("A", 30, 100), act("B", 30, 100)];
        assert_eq!(rollup(&acts), Some((60, Status::OnGoing)));
    }

    #[test]
    fn weighted_rounds_half_up() {
        // 1 * 50 = 50 → 0.5 → 1
        assert_eq!(rollup(&[act("A", 1, 50)]), Some((1, Status::OnGoing)));
        // 1 * 49 = 49 → 0.49 → 0
        assert_eq!(rollup(&[act("A", 1, 49)]), Some((0, Status::NotStarted)));
        // 33*50 + 33*51 = 3333 → 33.33 → 33
        assert_eq!(
            rollup(&[act("A", 33, 50), act("B", 33, 51)]),
            Some((33, Status::OnGoing))
        );
    }

    #[test]
    fn zero_weights_fall_back_to_mean() {
        let acts = [act("A", 0, 50), act("B", 0, 51)];
        // mean 50.5 → 51
        assert_eq!(rollup(&acts), Some((51, Status::OnGoing)));
        let acts = [act("A", 0, 0), act("B", 0, 0), act("C", 0, 1)];
        // mean 0.33 → 0
        assert_eq!(rollup(&acts), Some((0, Status::NotStarted)));
    }

    #[test]
    fn status_derivation_boundaries() {
        assert_eq!(derive_status(0), Status::NotStarted);
        assert_eq!(derive_status(1), Status::OnGoing);
        assert_eq!(derive_status(99), Status::OnGoing);
        assert_eq!(derive_status(100), Status::Done);
    }

    #[test]
    fn urgency_thresholds() {
        let today = day(2026, 3, 1);
        let t = UrgencyThresholds::default();
        assert_eq!(urgency_for(None, today, t), Urgency::Low);
        assert_eq!(urgency_for(Some(day(2026, 2, 20)), today, t), Urgency::High);
        assert_eq!(urgency_for(Some(day(2026, 3, 7)), today, t), Urgency::High);
        assert_eq!(urgency_for(Some(day(2026, 3, 8)), today, t), Urgency::Medium);
        assert_eq!(urgency_for(Some(day(2026, 3, 30)), today, t), Urgency::Medium);
        assert_eq!(urgency_for(Some(day(2026, 3, 31)), today, t), Urgency::Low);
    }

    #[test]
    fn refresh_keeps_admin_assigned_status() {
        let today = day(2026, 3, 1);
        let mut fields = InitiativeFields::from_proposal(
            Proposal::new("x", "o", "sgn").with_activity(act("A", 100, 100)),
            Status::Hold,
        );
        refresh(&mut fields, today, UrgencyThresholds::default());
        assert_eq!(fields.progress, 100);
        assert_eq!(fields.status, Status::Hold);
    }

    #[test]
    fn refresh_uses_scalar_progress_without_activities() {
        let today = day(2026, 3, 1);
        let mut fields = InitiativeFields::from_proposal(
            Proposal::new("x", "o", "sgn")
                .with_progress(40)
                .with_due_date(day(2026, 3, 3)),
            Status::NotStarted,
        );
        refresh(&mut fields, today, UrgencyThresholds::default());
        assert_eq!(fields.progress, 40);
        assert_eq!(fields.status, Status::OnGoing);
        assert_eq!(fields.urgency, Urgency::High);
    }
}
