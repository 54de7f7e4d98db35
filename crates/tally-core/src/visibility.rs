//! Collection-level views derived from the access predicates.
//!
//! Aggregates are always computed over the caller's visible subset, never
//! over the raw store contents.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::access::Access;
use crate::model::{EntityId, Initiative, User};

/// Keep the initiatives `user` may view, preserving store order.
#[must_use]
pub fn filter_for_user(user: Option<&User>, initiatives: Vec<Initiative>) -> Vec<Initiative> {
    let access = Access::new(user);
    initiatives
        .into_iter()
        .filter(|initiative| access.can_view(initiative))
        .collect()
}

/// Initiatives awaiting an administrator decision, in store order.
#[must_use]
pub fn pending_queue(initiatives: Vec<Initiative>) -> Vec<Initiative> {
    initiatives
        .into_iter()
        .filter(|initiative| initiative.approval_kind().is_pending())
        .collect()
}

/// Count and average progress for one slice of initiatives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub count: usize,
    pub average_progress: u8,
}

/// Dashboard figures over a visible set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    #[serde(flatten)]
    pub overall: Tally,
    pub by_entity: BTreeMap<EntityId, Tally>,
    pub by_status: BTreeMap<String, usize>,
    pub pending: usize,
}

/// Compute [`Stats`] over an already filtered set.
#[must_use]
pub fn entity_stats(visible: &[Initiative]) -> Stats {
    let mut groups: BTreeMap<EntityId, Vec<u8>> = BTreeMap::new();
    let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
    for initiative in visible {
        groups
            .entry(initiative.entity().clone())
            .or_default()
            .push(initiative.progress());
        *by_status.entry(initiative.status().to_string()).or_default() += 1;
    }

    let all: Vec<u8> = visible.iter().map(Initiative::progress).collect();
    Stats {
        overall: tally(&all),
        by_entity: groups
            .into_iter()
            .map(|(entity, progresses)| (entity, tally(&progresses)))
            .collect(),
        by_status,
        pending: visible
            .iter()
            .filter(|i| i.approval_kind().is_pending())
            .count(),
    }
}

fn tally(progresses: &[u8]) -> Tally {
    if progresses.is_empty() {
        return Tally::default();
    }
    let sum: usize = progresses.iter().map(|&p| usize::from(p)).sum();
    let n = progresses.len();
    let average = (2 * sum + n) / (2 * n);
    Tally {
        count: n,
        average_progress: u8::try_from(average).unwrap_or(u8::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Approval, InitiativeFields, InitiativeId, Proposal, Status, UserId};

    fn initiative(id: &str, creator: &str, entity: &str, progress: u8, approval: Approval) -> Initiative {
        let mut fields = InitiativeFields::from_proposal(
            Proposal::new(id, creator, entity).with_progress(progress),
            Status::NotStarted,
        );
        fields.status = crate::rollup::derive_status(progress);
        Initiative::new(InitiativeId::new(id), UserId::new(creator), fields).with_approval(approval)
    }

    fn sample() -> Vec<Initiative> {
        vec![
            initiative("a", "dina", "sgn", 40, Approval::Approved),
            initiative("b", "rina", "sgn", 10, Approval::PendingCreate),
            initiative("c", "budi", "lpp", 100, Approval::Approved),
            initiative("d", "dina", "sgn", 0, Approval::Rejected),
            initiative("e", "rina", "sgn", 61, Approval::Approved),
        ]
    }

    fn ids(list: &[Initiative]) -> Vec<&str> {
        list.iter().map(|i| i.id().as_str()).collect()
    }

    #[test]
    fn filter_preserves_order_and_scope() {
        let dina = User::member("dina", "sgn");
        let visible = filter_for_user(Some(&dina), sample());
        assert_eq!(ids(&visible), vec!["a", "d", "e"]);

        let admin = User::admin("root");
        assert_eq!(filter_for_user(Some(&admin), sample()).len(), 5);
        assert!(filter_for_user(None, sample()).is_empty());
    }

    #[test]
    fn pending_queue_keeps_only_pending() {
        assert_eq!(ids(&pending_queue(sample())), vec!["b"]);
    }

    #[test]
    fn stats_only_cover_visible_set() {
        let dina = User::member("dina", "sgn");
        let visible = filter_for_user(Some(&dina), sample());
        let stats = entity_stats(&visible);
        assert_eq!(stats.overall.count, 3);
        // (40 + 0 + 61) / 3 = 33.67 → 34
        assert_eq!(stats.overall.average_progress, 34);
        assert_eq!(stats.by_entity.len(), 1);
        assert!(!stats.by_entity.contains_key(&EntityId::new("lpp")));
        assert_eq!(stats.pending, 0);
    }

    #[test]
    fn stats_for_admin_group_by_entity() {
        let stats = entity_stats(&sample());
        let lpp = &stats.by_entity[&EntityId::new("lpp")];
        assert_eq!(lpp.count, 1);
        assert_eq!(lpp.average_progress, 100);
        assert_eq!(stats.by_status["done"], 1);
        assert_eq!(stats.pending, 1);
    }

    #[test]
    fn empty_stats_are_zero() {
        assert_eq!(entity_stats(&[]), Stats::default());
    }
}
