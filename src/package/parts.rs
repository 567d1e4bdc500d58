//! Typed view of the parts a diagram package is made of.

use std::fmt;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const DEFAULT_CUSTOM_PROPERTIES_PART: &str = "docProps/custom.xml";

pub mod relationship_types {
    pub const DOCUMENT: &str = "http://schemas.microsoft.com/visio/2010/relationships/document";
    pub const MASTERS: &str = "http://schemas.microsoft.com/visio/2010/relationships/masters";
    pub const MASTER: &str = "http://schemas.microsoft.com/visio/2010/relationships/master";
    pub const PAGES: &str = "http://schemas.microsoft.com/visio/2010/relationships/pages";
    pub const PAGE: &str = "http://schemas.microsoft.com/visio/2010/relationships/page";
    pub const CUSTOM_PROPERTIES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/custom-properties";
}

pub mod content_types {
    pub const CUSTOM_PROPERTIES: &str =
        "application/vnd.openxmlformats-officedocument.custom-properties+xml";
}

pub mod namespaces {
    pub const RELATIONSHIPS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
    pub const PACKAGE_RELATIONSHIPS: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships";
    pub const CUSTOM_PROPERTIES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/custom-properties";
    pub const DOC_PROPS_VTYPES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    Document,
    TemplateCollection,
    Template,
    PageCollection,
    Page,
    CustomProperties,
}

impl PartKind {
    /// Relationship type linking a part of this kind to its owner.
    pub fn relationship_type(self) -> &'static str {
        match self {
            PartKind::Document => relationship_types::DOCUMENT,
            PartKind::TemplateCollection => relationship_types::MASTERS,
            PartKind::Template => relationship_types::MASTER,
            PartKind::PageCollection => relationship_types::PAGES,
            PartKind::Page => relationship_types::PAGE,
            PartKind::CustomProperties => relationship_types::CUSTOM_PROPERTIES,
        }
    }

    /// Parts without which no patch can be applied.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            PartKind::Document | PartKind::TemplateCollection | PartKind::PageCollection
        )
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PartKind::Document => "document",
            PartKind::TemplateCollection => "masters collection",
            PartKind::Template => "master",
            PartKind::PageCollection => "pages collection",
            PartKind::Page => "page",
            PartKind::CustomProperties => "custom properties",
        };
        f.write_str(label)
    }
}

/// A part address: zip entry name (no leading slash) plus its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Part {
    pub path: String,
    pub kind: PartKind,
}

impl Part {
    pub fn new(path: impl Into<String>, kind: PartKind) -> Self {
        Self {
            path: path.into().trim_start_matches('/').to_string(),
            kind,
        }
    }

    /// Directory holding the part, with a trailing slash (empty at the root).
    pub fn directory(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[..=idx],
            None => "",
        }
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} part '{}'", self.kind, self.path)
    }
}

/// `.rels` entry describing the links owned by `part_path`; the empty path
/// stands for the package root.
pub fn relationships_path_for(part_path: &str) -> String {
    if part_path.is_empty() {
        return "_rels/.rels".to_string();
    }
    match part_path.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part_path),
    }
}

/// Resolve a relationship target against the directory of its source part.
pub fn resolve_target(source_directory: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{}{}", source_directory, target),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Express `target_path` relative to `source_directory`, as written in `.rels`.
pub fn relative_target(source_directory: &str, target_path: &str) -> String {
    let from: Vec<&str> = source_directory.split('/').filter(|s| !s.is_empty()).collect();
    let to: Vec<&str> = target_path.split('/').filter(|s| !s.is_empty()).collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = vec![".."; from.len() - common];
    parts.extend(&to[common..]);
    parts.join("/")
}
