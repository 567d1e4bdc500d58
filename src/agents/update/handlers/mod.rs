// Handler modules for the steps of a patch run
//
// Each handler owns one kind of package mutation. They share the run's
// relationship graph and are driven in order by the master updater:
// patch the master, reconcile its page instances, then flag recalculation.

pub mod page_reconciler;
pub mod recalc_flagger;
pub mod template_patcher;

pub use page_reconciler::PageReconciler;
pub use recalc_flagger::RecalculationFlagger;
pub use template_patcher::TemplatePatcher;
