//! Turns the masters of a package plus an approval threshold into a plan.
//! All catalog traffic of a run happens here, before any mutation.

use crate::agents::update::context::{SkipReason, SkippedTemplate};
use crate::catalog::Catalog;
use crate::error::Result;
use crate::model::{
    PatchPlanEntry, RevisionId, Status, TemplateId, TemplateReference, TemplateSnapshot,
};
use crate::utils::pattern::PatternMatcher;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub min_status: Status,
    /// Explicit allow-list; empty means every template.
    pub templates: Vec<TemplateId>,
    pub filter: Option<PatternMatcher>,
}

impl PlanOptions {
    fn selects(&self, reference: &TemplateReference) -> bool {
        let listed = self.templates.is_empty() || self.templates.contains(&reference.template_id);
        let named = self
            .filter
            .as_ref()
            .is_none_or(|matcher| matcher.matches(&reference.name));
        listed && named
    }
}

#[derive(Debug, Clone, Default)]
pub struct PatchPlan {
    pub entries: Vec<PatchPlanEntry>,
    pub skipped: Vec<SkippedTemplate>,
}

impl PatchPlan {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct UpdatePlanner<'a> {
    catalog: &'a dyn Catalog,
}

impl<'a> UpdatePlanner<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self { catalog }
    }

    /// One entry per distinct `(TemplateId, RevisionId)` that has a newer
    /// eligible snapshot. The catalog is asked once per template.
    pub fn plan(
        &self,
        references: &[TemplateReference],
        options: &PlanOptions,
    ) -> Result<PatchPlan> {
        let mut plan = PatchPlan::default();
        let mut seen: HashSet<(TemplateId, RevisionId)> = HashSet::new();
        let mut latest: HashMap<TemplateId, Option<TemplateSnapshot>> = HashMap::new();

        for reference in references {
            if !seen.insert((reference.template_id.clone(), reference.revision_id.clone())) {
                continue;
            }

            if !options.selects(reference) {
                plan.skipped
                    .push(SkippedTemplate::new(reference, SkipReason::NotSelected));
                continue;
            }

            let snapshot = match latest.get(&reference.template_id) {
                Some(cached) => cached.clone(),
                None => {
                    let fetched = self
                        .catalog
                        .latest_eligible(&reference.template_id, options.min_status)?;
                    latest.insert(reference.template_id.clone(), fetched.clone());
                    fetched
                }
            };

            match snapshot {
                None => plan.skipped.push(SkippedTemplate::new(
                    reference,
                    SkipReason::SnapshotNotFound,
                )),
                Some(snapshot) if snapshot.revision_id == reference.revision_id => plan
                    .skipped
                    .push(SkippedTemplate::new(reference, SkipReason::UpToDate)),
                Some(snapshot) => {
                    debug!(
                        "Planned {} {} -> {}",
                        reference.name, reference.revision_id, snapshot.revision_id
                    );
                    plan.entries.push(PatchPlanEntry {
                        reference: reference.clone(),
                        snapshot,
                    });
                }
            }
        }

        Ok(plan)
    }
}
