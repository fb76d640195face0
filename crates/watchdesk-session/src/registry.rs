//! Group registry merge.
//!
//! Discovery replaces what the bridge *sees*; the tenant's inclusion
//! choices are theirs and must survive every re-sync. Groups the bridge
//! no longer reports are kept with `present = false` so a later
//! rediscovery restores the tenant's earlier opt-in unchanged.

use crate::ConnectorGroup;
use std::collections::HashMap;
use watchdesk_common::types::GroupInfo;

/// Merge a fresh discovery result into the stored registry.
///
/// Discovered groups come first in bridge order; previously known groups
/// the bridge dropped follow, flagged `present = false`. New groups start
/// excluded from ingestion.
pub fn merge_groups(existing: &[GroupInfo], discovered: &[ConnectorGroup]) -> Vec<GroupInfo> {
    let mut known: HashMap<&str, &GroupInfo> = existing
        .iter()
        .map(|g| (g.external_id.as_str(), g))
        .collect();

    let mut merged = Vec::with_capacity(existing.len().max(discovered.len()));
    for group in discovered {
        let included = known
            .remove(group.external_id.as_str())
            .map(|g| g.included)
            .unwrap_or(false);
        merged.push(GroupInfo {
            external_id: group.external_id.clone(),
            name: group.name.clone(),
            included,
            present: true,
        });
    }

    for group in existing {
        if known.contains_key(group.external_id.as_str()) {
            merged.push(GroupInfo {
                present: false,
                ..group.clone()
            });
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(external_id: &str, included: bool) -> GroupInfo {
        GroupInfo {
            external_id: external_id.to_string(),
            name: format!("group {external_id}"),
            included,
            present: true,
        }
    }

    fn seen(external_id: &str, name: &str) -> ConnectorGroup {
        ConnectorGroup {
            external_id: external_id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn inclusion_survives_resync() {
        let existing = vec![stored("g1", true), stored("g2", false)];
        let discovered = vec![seen("g1", "renamed"), seen("g2", "group g2")];

        let merged = merge_groups(&existing, &discovered);
        assert_eq!(merged.len(), 2);
        assert!(merged[0].included, "opt-in kept through re-sync");
        assert_eq!(merged[0].name, "renamed");
        assert!(!merged[1].included);
    }

    #[test]
    fn new_groups_start_excluded() {
        let merged = merge_groups(&[], &[seen("g9", "fresh")]);
        assert_eq!(merged.len(), 1);
        assert!(!merged[0].included);
        assert!(merged[0].present);
    }

    #[test]
    fn dropped_groups_are_kept_but_marked_absent() {
        let existing = vec![stored("g1", true)];
        let merged = merge_groups(&existing, &[]);
        assert_eq!(merged.len(), 1);
        assert!(!merged[0].present);
        assert!(merged[0].included, "opt-in retained while absent");
    }

    #[test]
    fn rediscovery_restores_presence_and_opt_in() {
        let existing = vec![stored("g1", true)];
        let after_drop = merge_groups(&existing, &[]);
        let after_return = merge_groups(&after_drop, &[seen("g1", "group g1")]);
        assert!(after_return[0].present);
        assert!(after_return[0].included);
    }
}
