use crate::error::{PatchError, Result};
use crate::model::TemplateReference;
use crate::package::Package;
use crate::package::content_types::content_type_of;
use crate::package::masters::{PackageLayout, list_template_references};
use crate::package::parts::CONTENT_TYPES_PART;
use crate::package::relationships::RelationshipGraph;
use crate::utils::path_validator::PathValidator;
use std::fmt;
use std::path::{Path, PathBuf};

const VISIO_CONTENT_TYPE_PREFIX: &str = "application/vnd.ms-visio.";

/// PackageScannerAgent validates the package structure
pub struct PackageScannerAgent {
    package_path: PathBuf,
}

impl PackageScannerAgent {
    pub fn new<P: AsRef<Path>>(package_path: P) -> Self {
        Self {
            package_path: package_path.as_ref().to_path_buf(),
        }
    }

    /// Validates the package and collects what the other commands need to
    /// know about it. The package lock is only held while scanning.
    pub fn validate(&self) -> Result<PackageInfo> {
        let package_path = PathValidator::validate_package_path(&self.package_path)?;
        let package = Package::open(&package_path)?;
        let mut graph = RelationshipGraph::new();
        let layout = PackageLayout::resolve(&package, &mut graph)?;

        let content_types = package.read_xml(CONTENT_TYPES_PART)?.ok_or_else(|| {
            PatchError::PackageValidation(format!("{} not found", CONTENT_TYPES_PART))
        })?;
        let document_type = content_type_of(&content_types, &layout.document.path)
            .unwrap_or_default();
        let kind = PackageKind::from_content_type(&document_type).ok_or_else(|| {
            PatchError::PackageValidation(format!(
                "{} is not a diagram document (content type '{}')",
                layout.document.path, document_type
            ))
        })?;

        let references = list_template_references(&package, &mut graph)?;
        let pages = package.get_part(&layout.pages)?;
        let page_count = pages
            .root
            .child_elements()
            .filter(|el| el.is("Page"))
            .count();

        Ok(PackageInfo {
            package_path,
            kind,
            references,
            page_count,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    Drawing { macros: bool },
    Template { macros: bool },
    Stencil { macros: bool },
}

impl PackageKind {
    fn from_content_type(content_type: &str) -> Option<Self> {
        let rest = content_type
            .strip_prefix(VISIO_CONTENT_TYPE_PREFIX)?
            .strip_suffix("main+xml")?;
        let (family, macros) = match rest.strip_suffix(".macroEnabled.") {
            Some(family) => (family, true),
            None => (rest.strip_suffix('.')?, false),
        };
        match family {
            "drawing" => Some(PackageKind::Drawing { macros }),
            "template" => Some(PackageKind::Template { macros }),
            "stencil" => Some(PackageKind::Stencil { macros }),
            _ => None,
        }
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, macros) = match self {
            PackageKind::Drawing { macros } => ("drawing", macros),
            PackageKind::Template { macros } => ("template", macros),
            PackageKind::Stencil { macros } => ("stencil", macros),
        };
        if *macros {
            write!(f, "{} (macro-enabled)", name)
        } else {
            f.write_str(name)
        }
    }
}

#[derive(Debug, Clone)]
pub struct PackageInfo {
    pub package_path: PathBuf,
    pub kind: PackageKind,
    pub references: Vec<TemplateReference>,
    pub page_count: usize,
}
