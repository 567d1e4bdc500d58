//! Index of the masters a package currently embodies.

use crate::error::Result;
use crate::model::{LocalId, RevisionId, TemplateId, TemplateReference};
use crate::package::Package;
use crate::package::parts::{Part, PartKind};
use crate::package::relationships::RelationshipGraph;
use crate::package::xml::Element;
use tracing::warn;

/// Structural parts every patch run needs, resolved once.
#[derive(Debug, Clone)]
pub struct PackageLayout {
    pub document: Part,
    pub masters: Part,
    pub pages: Part,
}

impl PackageLayout {
    pub fn resolve(package: &Package, graph: &mut RelationshipGraph) -> Result<Self> {
        let document = graph.resolve_root_part(package, PartKind::Document)?;
        let masters =
            graph.resolve_collection_part(package, &document, PartKind::TemplateCollection)?;
        let pages = graph.resolve_collection_part(package, &document, PartKind::PageCollection)?;
        Ok(Self {
            document,
            masters,
            pages,
        })
    }
}

/// Master references found in a templates-collection part, keyed by
/// `LocalId`. Built fresh for every operation.
#[derive(Debug, Clone, Default)]
pub struct TemplateIndex {
    references: Vec<TemplateReference>,
}

impl TemplateIndex {
    pub fn load(package: &Package, layout: &PackageLayout) -> Result<Self> {
        let doc = package.get_part(&layout.masters)?;
        Ok(Self::from_collection(&doc.root))
    }

    pub fn from_collection(root: &Element) -> Self {
        let references = root
            .child_elements()
            .filter(|el| el.is("Master"))
            .filter_map(|master| {
                let reference = template_reference(master);
                if reference.is_none() {
                    warn!(
                        "Ignoring master without ID/BaseID/UniqueID: {}",
                        master.attr("NameU").unwrap_or_default()
                    );
                }
                reference
            })
            .collect();
        Self { references }
    }

    pub fn references(&self) -> &[TemplateReference] {
        &self.references
    }
}

/// `(TemplateId, RevisionId, LocalId)` of every master in the package.
pub fn list_template_references(
    package: &Package,
    graph: &mut RelationshipGraph,
) -> Result<Vec<TemplateReference>> {
    let layout = PackageLayout::resolve(package, graph)?;
    Ok(TemplateIndex::load(package, &layout)?.references)
}

pub fn template_reference(master: &Element) -> Option<TemplateReference> {
    Some(TemplateReference {
        local_id: LocalId(master.attr_u32("ID")?),
        template_id: TemplateId::new(&master.attr("BaseID")?),
        revision_id: RevisionId::new(&master.attr("UniqueID")?),
        name: master
            .attr("NameU")
            .or_else(|| master.attr("Name"))
            .map(|n| n.into_owned())
            .unwrap_or_default(),
    })
}

/// Position of the `<Master>` child currently carrying `revision_id`.
pub fn find_master_by_revision(root: &Element, revision_id: &RevisionId) -> Option<usize> {
    root.children.iter().position(|node| {
        node.as_element().is_some_and(|el| {
            el.is("Master")
                && el
                    .attr("UniqueID")
                    .is_some_and(|id| &RevisionId::new(&id) == revision_id)
        })
    })
}
