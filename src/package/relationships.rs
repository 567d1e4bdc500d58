//! Relationship (`.rels`) parts and the link graph between package parts.
//!
//! Parts never address each other by physical path; every hop (package root
//! → document → masters collection → individual master) goes through a
//! relationship id, so the graph is walked the same way here.

use crate::error::{PatchError, Result};
use crate::package::Package;
use crate::package::parts::{
    Part, PartKind, namespaces, relationships_path_for, relative_target, resolve_target,
};
use crate::package::xml::{Element, XmlDocument, local_name};
use std::collections::HashMap;
use tracing::debug;

/// A single relationship in a .rels part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Unique ID within the rels part (e.g., "rId1")
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target path, relative to the source part's directory
    pub target: String,
    pub external: bool,
}

/// Relationships owned by one part, in document order.
#[derive(Debug, Clone)]
pub struct Relationships {
    relationships: Vec<Relationship>,
    next_id: u32,
}

impl Default for Relationships {
    fn default() -> Self {
        Self::new()
    }
}

impl Relationships {
    pub fn new() -> Self {
        Self {
            relationships: Vec::new(),
            next_id: 1,
        }
    }

    pub fn from_document(doc: &XmlDocument) -> Result<Self> {
        let mut result = Self::new();
        let mut max_id = 0u32;

        for element in doc.root.child_elements().filter(|el| el.is("Relationship")) {
            let id = required(element, "Id")?;
            let rel_type = required(element, "Type")?;
            let target = required(element, "Target")?;
            let external = element
                .attr("TargetMode")
                .is_some_and(|mode| mode == "External");

            if let Some(num) = id.strip_prefix("rId").and_then(|n| n.parse::<u32>().ok()) {
                max_id = max_id.max(num);
            }

            result.relationships.push(Relationship {
                id,
                rel_type,
                target,
                external,
            });
        }

        result.next_id = max_id + 1;
        Ok(result)
    }

    /// Add an internal relationship and return its ID
    pub fn add(&mut self, rel_type: &str, target: &str) -> String {
        let mut id = format!("rId{}", self.next_id);
        while self.get(&id).is_some() {
            self.next_id += 1;
            id = format!("rId{}", self.next_id);
        }
        self.next_id += 1;

        self.relationships.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            external: false,
        });
        id
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.id == id)
    }

    pub fn get_by_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.relationships
            .iter()
            .find(|r| r.rel_type == rel_type && !r.external)
    }

    pub fn all(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter()
    }

    pub fn to_document(&self) -> XmlDocument {
        let mut root =
            Element::new("Relationships").with_attr("xmlns", namespaces::PACKAGE_RELATIONSHIPS);
        for rel in &self.relationships {
            let mut element = Element::new("Relationship")
                .with_attr("Id", &rel.id)
                .with_attr("Type", &rel.rel_type)
                .with_attr("Target", &rel.target);
            if rel.external {
                element.set_attr("TargetMode", "External");
            }
            root.push_child(element);
        }
        XmlDocument::new(root)
    }
}

fn required(element: &Element, name: &str) -> Result<String> {
    element
        .attr(name)
        .map(|v| v.into_owned())
        .ok_or_else(|| PatchError::XmlParsing(format!("Relationship missing {}", name)))
}

/// Lazily loaded view over every `.rels` part of a package. Built fresh for
/// each run; it caches parsed relationship parts, never part content.
#[derive(Debug, Default)]
pub struct RelationshipGraph {
    cache: HashMap<String, Relationships>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow a link from the package root (`_rels/.rels`).
    pub fn resolve_root_part(&mut self, package: &Package, kind: PartKind) -> Result<Part> {
        let rels = self.relationships(package, "")?;
        let rel = rels.get_by_type(kind.relationship_type()).ok_or_else(|| {
            PatchError::RelationshipUnresolvable(format!("package root has no {} link", kind))
        })?;
        Ok(Part::new(resolve_target("", &rel.target), kind))
    }

    /// Follow the single link of `kind` owned by `container`.
    pub fn resolve_collection_part(
        &mut self,
        package: &Package,
        container: &Part,
        kind: PartKind,
    ) -> Result<Part> {
        let rels = self.relationships(package, &container.path)?;
        let rel = rels.get_by_type(kind.relationship_type()).ok_or_else(|| {
            PatchError::RelationshipUnresolvable(format!("{} has no {} link", container, kind))
        })?;
        let part = Part::new(resolve_target(container.directory(), &rel.target), kind);
        debug!("Resolved {} -> {}", container.path, part.path);
        Ok(part)
    }

    /// Follow the link `rel_id` owned by `owner`, checking it has the type
    /// expected for `kind`.
    pub fn resolve_part_by_relationship_id(
        &mut self,
        package: &Package,
        owner: &Part,
        rel_id: &str,
        kind: PartKind,
    ) -> Result<Part> {
        let rels = self.relationships(package, &owner.path)?;
        let rel = rels.get(rel_id).ok_or_else(|| {
            PatchError::RelationshipUnresolvable(format!(
                "{} has no relationship '{}'",
                owner, rel_id
            ))
        })?;

        if rel.external || rel.rel_type != kind.relationship_type() {
            return Err(PatchError::RelationshipUnresolvable(format!(
                "relationship '{}' of {} does not point at a {} part",
                rel_id, owner, kind
            )));
        }

        Ok(Part::new(resolve_target(owner.directory(), &rel.target), kind))
    }

    /// Relationship id carried by an element's `<Rel r:id=".."/>` child.
    pub fn relationship_id(element: &Element) -> Option<String> {
        element
            .child_elements()
            .filter(|child| child.is("Rel"))
            .find_map(|rel| {
                let key = rel
                    .attributes()
                    .map(|(key, _)| key)
                    .find(|key| key.contains(':') && local_name(key) == "id")?;
                rel.attr(key).map(|v| v.into_owned())
            })
    }

    /// Id of the existing `kind` link from `owner` (the package root when
    /// `None`) to `target_path`, adding and persisting a new one if needed.
    pub fn get_or_create_relationship_id(
        &mut self,
        package: &mut Package,
        owner: Option<&Part>,
        kind: PartKind,
        target_path: &str,
    ) -> Result<String> {
        let (owner_path, owner_dir) = match owner {
            Some(part) => (part.path.clone(), part.directory().to_string()),
            None => (String::new(), String::new()),
        };

        let rels = self.relationships(package, &owner_path)?;
        if let Some(existing) = rels.all().find(|rel| {
            !rel.external
                && rel.rel_type == kind.relationship_type()
                && resolve_target(&owner_dir, &rel.target) == target_path
        }) {
            return Ok(existing.id.clone());
        }

        let mut updated = rels.clone();
        let id = updated.add(
            kind.relationship_type(),
            &relative_target(&owner_dir, target_path),
        );
        package.write_xml(&relationships_path_for(&owner_path), updated.to_document());
        self.cache.insert(owner_path, updated);
        debug!("Added relationship {} -> {}", id, target_path);
        Ok(id)
    }

    fn relationships(&mut self, package: &Package, owner_path: &str) -> Result<&Relationships> {
        if !self.cache.contains_key(owner_path) {
            let rels = match package.read_xml(&relationships_path_for(owner_path))? {
                Some(doc) => Relationships::from_document(&doc)?,
                None => Relationships::new(),
            };
            self.cache.insert(owner_path.to_string(), rels);
        }
        Ok(&self.cache[owner_path])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::fixtures;
    use crate::package::parts::relationship_types;

    #[test]
    fn parses_relationships_and_tracks_next_id() {
        let doc = XmlDocument::parse(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.microsoft.com/visio/2010/relationships/document" Target="visio/document.xml"/>
    <Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/>
</Relationships>"#,
        )
        .unwrap();

        let mut rels = Relationships::from_document(&doc).unwrap();
        assert_eq!(rels.get("rId1").unwrap().target, "visio/document.xml");
        assert!(rels.get("rId4").unwrap().external);
        assert_eq!(rels.add(relationship_types::PAGES, "pages/pages.xml"), "rId5");

        let reparsed = Relationships::from_document(&rels.to_document()).unwrap();
        assert_eq!(reparsed.all().count(), 3);
        assert!(reparsed.get_by_type(relationship_types::PAGES).is_some());
    }

    #[test]
    fn walks_root_to_collections_to_items() {
        let fixture = fixtures::sample_package();
        let package = Package::open(&fixture.path).unwrap();
        let mut graph = RelationshipGraph::new();

        let document = graph.resolve_root_part(&package, PartKind::Document).unwrap();
        assert_eq!(document.path, "visio/document.xml");

        let masters = graph
            .resolve_collection_part(&package, &document, PartKind::TemplateCollection)
            .unwrap();
        assert_eq!(masters.path, "visio/masters/masters.xml");

        let master = graph
            .resolve_part_by_relationship_id(&package, &masters, "rId1", PartKind::Template)
            .unwrap();
        assert_eq!(master.path, "visio/masters/master1.xml");

        let pages = graph
            .resolve_collection_part(&package, &document, PartKind::PageCollection)
            .unwrap();
        let page = graph
            .resolve_part_by_relationship_id(&package, &pages, "rId1", PartKind::Page)
            .unwrap();
        assert_eq!(page.path, "visio/pages/page1.xml");
    }

    #[test]
    fn wrong_kind_or_unknown_id_is_unresolvable() {
        let fixture = fixtures::sample_package();
        let package = Package::open(&fixture.path).unwrap();
        let mut graph = RelationshipGraph::new();
        let masters = Part::new("visio/masters/masters.xml", PartKind::TemplateCollection);

        let err = graph
            .resolve_part_by_relationship_id(&package, &masters, "rId99", PartKind::Template)
            .unwrap_err();
        assert!(matches!(err, PatchError::RelationshipUnresolvable(_)));

        let err = graph
            .resolve_part_by_relationship_id(&package, &masters, "rId1", PartKind::Page)
            .unwrap_err();
        assert!(matches!(err, PatchError::RelationshipUnresolvable(_)));
    }

    #[test]
    fn reads_rel_child_id() {
        let master = Element::parse_fragment(
            r#"<Master xmlns:r="urn:r" ID="12"><PageSheet/><Rel r:id="rId3"/></Master>"#,
        )
        .unwrap();
        assert_eq!(RelationshipGraph::relationship_id(&master).as_deref(), Some("rId3"));

        let bare = Element::parse_fragment(r#"<Master ID="12"/>"#).unwrap();
        assert_eq!(RelationshipGraph::relationship_id(&bare), None);
    }

    #[test]
    fn get_or_create_reuses_then_adds() {
        let fixture = fixtures::sample_package();
        let mut package = Package::open(&fixture.path).unwrap();
        let mut graph = RelationshipGraph::new();

        let existing = graph
            .get_or_create_relationship_id(
                &mut package,
                None,
                PartKind::CustomProperties,
                "docProps/custom.xml",
            )
            .unwrap();
        assert_eq!(existing, "rId2");
        assert!(!package.is_modified());

        let created = graph
            .get_or_create_relationship_id(
                &mut package,
                None,
                PartKind::CustomProperties,
                "docProps/other.xml",
            )
            .unwrap();
        assert_eq!(created, "rId3");
        assert!(package.is_modified());

        let mut fresh = RelationshipGraph::new();
        let rels = fresh.relationships(&package, "").unwrap();
        assert_eq!(rels.get("rId3").unwrap().target, "docProps/other.xml");
    }
}
