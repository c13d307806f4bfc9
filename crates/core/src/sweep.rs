//! Orphaned blob detection.
//!
//! A blob is orphaned when no prompt image and no request output references
//! it. Normal operations delete blobs as they drop the last reference; the
//! sweep reclaims what a crash or a failed deferred deletion left behind.

use std::collections::HashSet;

use serde::Serialize;

use crate::types::BlobId;

/// Report returned after an orphan sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub blobs_scanned: usize,
    pub orphans_found: usize,
    pub orphans_deleted: usize,
    pub dry_run: bool,
    pub errors: Vec<String>,
}

/// Ids in `stored` that are absent from `referenced`, in `stored` order.
pub fn find_orphans(stored: &[BlobId], referenced: &HashSet<BlobId>) -> Vec<BlobId> {
    stored
        .iter()
        .filter(|id| !referenced.contains(id))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreferenced_blobs_are_orphans() {
        let kept = BlobId::new_v4();
        let orphan = BlobId::new_v4();
        let referenced = HashSet::from([kept]);
        assert_eq!(find_orphans(&[kept, orphan], &referenced), vec![orphan]);
    }

    #[test]
    fn dangling_references_are_ignored() {
        let missing = BlobId::new_v4();
        let referenced = HashSet::from([missing]);
        assert!(find_orphans(&[], &referenced).is_empty());
    }

    #[test]
    fn report_serializes() {
        let report = SweepReport {
            blobs_scanned: 3,
            orphans_found: 1,
            orphans_deleted: 1,
            dry_run: false,
            errors: vec![],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["orphans_deleted"], 1);
    }
}
