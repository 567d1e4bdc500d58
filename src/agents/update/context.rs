use crate::model::{LocalId, PatchPlanEntry, RevisionId, TemplateId, TemplateReference};
use std::fmt;
use std::path::PathBuf;

/// Why a template was left alone. None of these abort a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No master in the package carries the planned revision any more.
    TemplateAbsent,
    /// The catalog has no snapshot at or above the requested status.
    SnapshotNotFound,
    UpToDate,
    /// Excluded by `--template` / `--filter`.
    NotSelected,
    MalformedSnapshot(String),
    RelationshipUnresolvable(String),
    /// Rejected at the interactive prompt.
    Declined,
}

impl SkipReason {
    /// Skips caused by broken content rather than by selection.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SkipReason::MalformedSnapshot(_) | SkipReason::RelationshipUnresolvable(_)
        )
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TemplateAbsent => f.write_str("master no longer present"),
            SkipReason::SnapshotNotFound => f.write_str("no eligible snapshot"),
            SkipReason::UpToDate => f.write_str("already up to date"),
            SkipReason::NotSelected => f.write_str("not selected"),
            SkipReason::MalformedSnapshot(msg) => write!(f, "malformed snapshot: {}", msg),
            SkipReason::RelationshipUnresolvable(msg) => {
                write!(f, "relationship unresolvable: {}", msg)
            }
            SkipReason::Declined => f.write_str("declined"),
        }
    }
}

/// One component shape declared by a master body, as page instances
/// refer to it through `MasterShape`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentTemplate {
    pub id: u32,
    pub name_u: Option<String>,
    pub name: Option<String>,
    pub shape_type: Option<String>,
}

/// Result of rewriting one master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedPatch {
    pub local_id: LocalId,
    pub styled_shapes: usize,
    pub components: Vec<ComponentTemplate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    Patched(AppliedPatch),
    Skipped(SkipReason),
}

/// Page-side effects of one patched master.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub pages_touched: usize,
    pub instances_updated: usize,
    pub stubs_created: usize,
}

#[derive(Debug, Clone)]
pub struct TemplateChange {
    pub name: String,
    pub template_id: TemplateId,
    pub local_id: LocalId,
    pub old_revision: RevisionId,
    pub new_revision: RevisionId,
}

impl TemplateChange {
    pub fn from_entry(entry: &PatchPlanEntry) -> Self {
        Self {
            name: entry.display_name().to_string(),
            template_id: entry.reference.template_id.clone(),
            local_id: entry.reference.local_id,
            old_revision: entry.reference.revision_id.clone(),
            new_revision: entry.snapshot.revision_id.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkippedTemplate {
    pub name: String,
    pub template_id: TemplateId,
    pub reason: SkipReason,
}

impl SkippedTemplate {
    pub fn new(reference: &TemplateReference, reason: SkipReason) -> Self {
        Self {
            name: reference.name.clone(),
            template_id: reference.template_id.clone(),
            reason,
        }
    }
}

/// Structured outcome of an update run.
#[derive(Debug, Clone, Default)]
pub struct PatchReport {
    pub patched: Vec<TemplateChange>,
    pub skipped: Vec<SkippedTemplate>,
    pub pages: ReconcileSummary,
    pub recalc_flagged: bool,
    pub backup: Option<PathBuf>,
}

impl PatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_patched(&mut self, change: TemplateChange, summary: ReconcileSummary) {
        self.patched.push(change);
        self.pages.pages_touched += summary.pages_touched;
        self.pages.instances_updated += summary.instances_updated;
        self.pages.stubs_created += summary.stubs_created;
    }

    pub fn add_skipped(&mut self, skipped: SkippedTemplate) {
        self.skipped.push(skipped);
    }

    /// True when nothing was patched.
    pub fn is_empty(&self) -> bool {
        self.patched.is_empty()
    }

    pub fn total_patched(&self) -> usize {
        self.patched.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SkippedTemplate> {
        self.skipped.iter().filter(|s| s.reason.is_failure())
    }

    /// Some templates were patched and others failed.
    pub fn is_partial(&self) -> bool {
        !self.patched.is_empty() && self.failures().next().is_some()
    }
}
