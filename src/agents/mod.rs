pub mod master_updater;
pub mod package_scanner;

pub mod update;
pub use update::PatchReport;

pub use master_updater::MasterUpdater;
pub use package_scanner::PackageScannerAgent;
