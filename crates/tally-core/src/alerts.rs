//! Deadline and progress alerts derived from a visible set.
//!
//! Alerts are computed on demand and never stored.

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{EntityId, Initiative, InitiativeId, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    Normal,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertKind {
    Overdue { days: i64 },
    HighProgress { progress: u8 },
    Completed,
}

impl AlertKind {
    #[must_use]
    pub const fn priority(self) -> Priority {
        match self {
            Self::Overdue { .. } => Priority::Critical,
            Self::HighProgress { .. } => Priority::Normal,
            Self::Completed => Priority::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub initiative: InitiativeId,
    pub name: String,
    pub entity: EntityId,
    #[serde(flatten)]
    pub kind: AlertKind,
    pub priority: Priority,
    pub message: String,
}

impl Alert {
    fn new(initiative: &Initiative, kind: AlertKind) -> Self {
        let message = match kind {
            AlertKind::Overdue { days } => {
                format!("This initiative is {days} days overdue. Immediate action required.")
            }
            AlertKind::HighProgress { progress } => {
                format!("Initiative is at {progress}% completion.")
            }
            AlertKind::Completed => "Initiative has been successfully completed.".to_string(),
        };
        Self {
            initiative: initiative.id().clone(),
            name: initiative.fields().name.clone(),
            entity: initiative.entity().clone(),
            kind,
            priority: kind.priority(),
            message,
        }
    }
}

/// Alerts for `visible`, most urgent first; ties keep store order.
///
/// - overdue: due date before `today` and not `Done`
/// - high progress: `OnGoing` at or above `high_progress_threshold`
/// - completed: `Done`
#[must_use]
pub fn alerts_for(visible: &[Initiative], today: NaiveDate, high_progress_threshold: u8) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for initiative in visible {
        let status = initiative.status();
        if let Some(due) = initiative.fields().due_date {
            let days_until_due = (due - today).num_days();
            if days_until_due < 0 && status != Status::Done {
                alerts.push(Alert::new(
                    initiative,
                    AlertKind::Overdue {
                        days: -days_until_due,
                    },
                ));
            }
        }
        if status == Status::OnGoing && initiative.progress() >= high_progress_threshold {
            alerts.push(Alert::new(
                initiative,
                AlertKind::HighProgress {
                    progress: initiative.progress(),
                },
            ));
        }
        if status == Status::Done {
            alerts.push(Alert::new(initiative, AlertKind::Completed));
        }
    }
    alerts.sort_by_key(|alert| alert.priority);
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InitiativeFields, Proposal, UserId};
    use crate::rollup::derive_status;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn initiative(id: &str, progress: u8, due: Option<NaiveDate>) -> Initiative {
        let mut proposal = Proposal::new(id, "dina", "sgn").with_progress(progress);
        proposal.due_date = due;
        let mut fields = InitiativeFields::from_proposal(proposal, Status::NotStarted);
        fields.status = derive_status(progress);
        Initiative::new(InitiativeId::new(id), UserId::new("dina"), fields)
    }

    #[test]
    fn overdue_high_progress_and_completed() {
        let today = day(2026, 3, 10);
        let visible = vec![
            initiative("slow", 20, Some(day(2026, 3, 7))),
            initiative("close", 80, None),
            initiative("done-late", 100, Some(day(2026, 3, 1))),
            initiative("fresh", 10, Some(day(2026, 4, 1))),
        ];
        let alerts = alerts_for(&visible, today, 75);
        let summary: Vec<(&str, AlertKind)> = alerts
            .iter()
            .map(|a| (a.initiative.as_str(), a.kind))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("slow", AlertKind::Overdue { days: 3 }),
                ("close", AlertKind::HighProgress { progress: 80 }),
                ("done-late", AlertKind::Completed),
            ]
        );
        assert!(alerts[0].message.contains("3 days overdue"));
    }

    #[test]
    fn threshold_is_inclusive_and_configurable() {
        let today = day(2026, 3, 10);
        let visible = vec![initiative("a", 75, None), initiative("b", 74, None)];
        assert_eq!(alerts_for(&visible, today, 75).len(), 1);
        assert_eq!(alerts_for(&visible, today, 50).len(), 2);
    }

    #[test]
    fn held_initiatives_do_not_raise_progress_alerts() {
        let today = day(2026, 3, 10);
        let mut held = initiative("held", 90, None);
        held.fields_mut().status = Status::Hold;
        assert!(alerts_for(&[held], today, 75).is_empty());
    }
}
