use crate::config::CliOverrides;
use crate::model::Status;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "masterpatch",
    about = "Retrofit diagram packages to the latest approved master templates",
    version,
    author
)]
pub struct Cli {
    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Patch outdated masters and reconcile their page instances
    Update {
        /// Diagram package (.vsdx, .vsdm, .vstx, .vstm, .vssx)
        #[arg(value_name = "PACKAGE")]
        package: PathBuf,

        #[command(flatten)]
        catalog: CatalogArgs,

        /// Enable interactive mode to review each master before patching
        #[arg(short, long)]
        interactive: bool,

        /// Do not copy the package to a timestamped .bak file first
        #[arg(long)]
        no_backup: bool,
    },

    /// Show which masters would be patched without touching the package
    Check {
        #[arg(value_name = "PACKAGE")]
        package: PathBuf,

        #[command(flatten)]
        catalog: CatalogArgs,
    },

    /// List the masters embedded in a package
    List {
        #[arg(value_name = "PACKAGE")]
        package: PathBuf,
    },
}

/// Catalog and selection flags shared by `check` and `update`.
#[derive(Args, Debug, Clone, Default)]
pub struct CatalogArgs {
    /// Read snapshots from a directory of JSON files
    #[arg(long, value_name = "DIR", conflicts_with = "catalog_url")]
    pub catalog_dir: Option<PathBuf>,

    /// Query a catalog service over HTTP(S)
    #[arg(long, value_name = "URL")]
    pub catalog_url: Option<String>,

    /// Lowest approval status a snapshot needs to be applied [default: published]
    #[arg(long, value_enum, value_name = "STATUS")]
    pub min_status: Option<Status>,

    /// Only consider this template id (repeatable)
    #[arg(long = "template", value_name = "ID")]
    pub templates: Vec<String>,

    /// Filter masters by name using glob syntax (e.g. "Process*")
    #[arg(long, value_name = "GLOB")]
    pub filter: Option<String>,

    /// Configuration file (defaults to masterpatch.toml next to the package)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl CatalogArgs {
    pub fn overrides(&self, no_backup: bool) -> CliOverrides {
        CliOverrides {
            catalog_dir: self.catalog_dir.clone(),
            catalog_url: self.catalog_url.clone(),
            min_status: self.min_status,
            templates: self.templates.clone(),
            filter: self.filter.clone(),
            no_backup,
        }
    }
}
