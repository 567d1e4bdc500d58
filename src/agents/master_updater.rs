use crate::agents::update::context::{
    PatchOutcome, PatchReport, SkipReason, SkippedTemplate, TemplateChange,
};
use crate::agents::update::handlers::{PageReconciler, RecalculationFlagger, TemplatePatcher};
use crate::agents::update::interaction::UpdateInteraction;
use crate::agents::update::planner::{PatchPlan, PlanOptions, UpdatePlanner};
use crate::catalog::Catalog;
use crate::error::Result;
use crate::package::Package;
use crate::package::masters::{PackageLayout, TemplateIndex};
use crate::package::relationships::RelationshipGraph;
use crate::package::styles::StyleTable;
use crate::utils::backup::create_backup;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// MasterUpdater drives a whole retrofit run over one package: plan against
/// the catalog, patch each master, reconcile its page instances, flag the
/// package for recalculation and save.
pub struct MasterUpdater {
    catalog: Arc<dyn Catalog>,
}

impl MasterUpdater {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    /// Plan only. The package is locked while reading but never written.
    pub fn check(&self, package_path: &Path, options: &PlanOptions) -> Result<PatchPlan> {
        let package = Package::open(package_path)?;
        let mut graph = RelationshipGraph::new();
        let layout = PackageLayout::resolve(&package, &mut graph)?;
        let index = TemplateIndex::load(&package, &layout)?;

        UpdatePlanner::new(self.catalog.as_ref()).plan(index.references(), options)
    }

    /// Plan and apply. The package is only replaced when at least one master
    /// was patched; any fatal error leaves the original file untouched.
    pub fn update(
        &self,
        package_path: &Path,
        options: &PlanOptions,
        interactive: bool,
        backup: bool,
    ) -> Result<PatchReport> {
        let mut package = Package::open(package_path)?;
        let mut graph = RelationshipGraph::new();
        let layout = PackageLayout::resolve(&package, &mut graph)?;
        let index = TemplateIndex::load(&package, &layout)?;

        let plan = UpdatePlanner::new(self.catalog.as_ref()).plan(index.references(), options)?;

        let mut report = PatchReport::new();
        for skipped in plan.skipped {
            warn!("Skipping '{}': {}", skipped.name, skipped.reason);
            report.add_skipped(skipped);
        }
        if plan.entries.is_empty() {
            return Ok(report);
        }

        let styles = StyleTable::from_document(&package.get_part(&layout.document)?);
        if styles.is_empty() {
            warn!("{} has no style sheets; snapshot style names cannot be mapped", layout.document);
        } else {
            debug!("{} style sheets in {}", styles.len(), layout.document);
        }
        let mut interaction = UpdateInteraction::new(interactive);

        let pb = ProgressBar::new(plan.entries.len() as u64);
        if interaction.is_enabled() {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }
        if let Ok(style) = ProgressStyle::with_template("  [{bar:40}] {pos}/{len} {msg}") {
            pb.set_style(style.progress_chars("=>-"));
        }

        for entry in &plan.entries {
            pb.set_message(format!("Patching {}", entry.display_name()));

            let confirmed = interaction.confirm_template(
                entry.display_name(),
                entry.old_revision().as_str(),
                entry.snapshot.revision_id.as_str(),
            )?;
            if !confirmed {
                report.add_skipped(SkippedTemplate::new(&entry.reference, SkipReason::Declined));
                pb.inc(1);
                continue;
            }

            let outcome =
                TemplatePatcher::new(&mut graph, &layout, &styles).patch(&mut package, entry)?;
            match outcome {
                PatchOutcome::Patched(applied) => {
                    debug!(
                        "Master {} restyled {} shape(s), {} component(s)",
                        applied.local_id,
                        applied.styled_shapes,
                        applied.components.len()
                    );
                    let summary = PageReconciler::new(&mut graph, &layout).reconcile(
                        &mut package,
                        applied.local_id,
                        &applied.components,
                    )?;
                    report.add_patched(TemplateChange::from_entry(entry), summary);
                }
                PatchOutcome::Skipped(reason) => {
                    warn!("Skipping '{}': {}", entry.display_name(), reason);
                    report.add_skipped(SkippedTemplate::new(&entry.reference, reason));
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        if report.is_empty() {
            return Ok(report);
        }

        report.recalc_flagged = RecalculationFlagger::new(&mut graph).mark_dirty(&mut package)?;
        if backup {
            report.backup = Some(create_backup(package.path())?);
        }
        package.save()?;

        info!(
            "Saved {} with {} patched master(s)",
            package.path().display(),
            report.total_patched()
        );
        Ok(report)
    }
}
