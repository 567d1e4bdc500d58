//! Clients for the master catalog: the service that stores template
//! snapshots and knows which one is the latest eligible for a template.

use crate::error::Result;
use crate::model::{Status, TemplateId, TemplateSnapshot};

pub mod directory;
pub mod factory;
pub mod http;

pub use directory::DirectoryCatalog;
pub use factory::CatalogFactory;
pub use http::HttpCatalog;

pub trait Catalog: Send + Sync {
    /// Newest snapshot of `template_id` whose status is at least `min_status`.
    fn latest_eligible(
        &self,
        template_id: &TemplateId,
        min_status: Status,
    ) -> Result<Option<TemplateSnapshot>>;

    /// Human readable location, for progress output.
    fn describe(&self) -> String;
}

/// Picks the newest eligible snapshot out of a candidate list.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotSelector;

impl SnapshotSelector {
    /// Highest `sequence` among the snapshots of `template_id` at or above
    /// `min_status`. Ties keep the first candidate.
    pub fn select<'a, I>(
        candidates: I,
        template_id: &TemplateId,
        min_status: Status,
    ) -> Option<&'a TemplateSnapshot>
    where
        I: IntoIterator<Item = &'a TemplateSnapshot>,
    {
        candidates
            .into_iter()
            .filter(|s| &s.template_id == template_id && s.status >= min_status)
            .fold(None, |best: Option<&TemplateSnapshot>, candidate| match best {
                Some(current) if current.sequence >= candidate.sequence => Some(current),
                _ => Some(candidate),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::fixtures;

    fn snapshot(sequence: u64, status: Status) -> TemplateSnapshot {
        let mut s = fixtures::process_snapshot_v2();
        s.sequence = sequence;
        s.status = status;
        s.revision_id = format!("{{0A100000-0000-0000-0000-00000000000{}}}", sequence).into();
        s
    }

    #[test]
    fn selects_highest_sequence_at_or_above_status() {
        let candidates = vec![
            snapshot(1, Status::Published),
            snapshot(3, Status::Draft),
            snapshot(2, Status::Approved),
        ];
        let id = TemplateId::new(fixtures::B1);

        let published = SnapshotSelector::select(&candidates, &id, Status::Published).unwrap();
        assert_eq!(published.sequence, 1);

        let approved = SnapshotSelector::select(&candidates, &id, Status::Approved).unwrap();
        assert_eq!(approved.sequence, 2);

        let any = SnapshotSelector::select(&candidates, &id, Status::Draft).unwrap();
        assert_eq!(any.sequence, 3);
    }

    #[test]
    fn other_templates_are_ignored() {
        let candidates = vec![snapshot(1, Status::Published)];
        let other = TemplateId::new(fixtures::B_DECISION);
        assert!(SnapshotSelector::select(&candidates, &other, Status::Draft).is_none());
    }
}
