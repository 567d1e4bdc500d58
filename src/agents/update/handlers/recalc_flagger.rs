use crate::error::{PatchError, Result};
use crate::package::Package;
use crate::package::content_types::ensure_override;
use crate::package::parts::{
    DEFAULT_CUSTOM_PROPERTIES_PART, Part, PartKind, content_types, namespaces,
};
use crate::package::relationships::RelationshipGraph;
use crate::package::xml::{Element, XmlDocument};
use std::collections::BTreeSet;
use tracing::debug;

pub const RECALC_PROPERTY: &str = "RecalcDocument";

/// Format id shared by all user-defined document properties.
pub const USER_DEFINED_FMTID: &str = "{D5CDD505-2E9C-101B-9397-08002B2CF9AE}";

/// Property ids 0 and 1 are reserved.
const FIRST_PID: u32 = 2;

/// Marks a package so the host application recomputes every formula when
/// the file is next opened.
pub struct RecalculationFlagger<'a> {
    graph: &'a mut RelationshipGraph,
}

impl<'a> RecalculationFlagger<'a> {
    pub fn new(graph: &'a mut RelationshipGraph) -> Self {
        Self { graph }
    }

    /// Add the recalculation property unless present. Returns whether the
    /// package changed.
    pub fn mark_dirty(&mut self, package: &mut Package) -> Result<bool> {
        let linked = match self
            .graph
            .resolve_root_part(package, PartKind::CustomProperties)
        {
            Ok(part) => Some(part),
            Err(PatchError::RelationshipUnresolvable(_)) => None,
            Err(e) => return Err(e),
        };

        let part = match linked {
            Some(part) => part,
            None => {
                let part = Part::new(DEFAULT_CUSTOM_PROPERTIES_PART, PartKind::CustomProperties);
                self.graph.get_or_create_relationship_id(
                    package,
                    None,
                    PartKind::CustomProperties,
                    &part.path,
                )?;
                part
            }
        };

        let mut doc = match package.read_xml(&part.path)? {
            Some(doc) => doc,
            None => {
                ensure_override(package, &part.path, content_types::CUSTOM_PROPERTIES)?;
                XmlDocument::new(
                    Element::new("Properties")
                        .with_attr("xmlns", namespaces::CUSTOM_PROPERTIES)
                        .with_attr("xmlns:vt", namespaces::DOC_PROPS_VTYPES),
                )
            }
        };

        let properties: Vec<&Element> = doc
            .root
            .child_elements()
            .filter(|el| el.is("property"))
            .collect();
        if properties
            .iter()
            .any(|p| p.attr("name").as_deref() == Some(RECALC_PROPERTY))
        {
            return Ok(false);
        }

        let used: BTreeSet<u32> = properties.iter().filter_map(|p| p.attr_u32("pid")).collect();
        let pid = (FIRST_PID..)
            .find(|pid| !used.contains(pid))
            .unwrap_or(FIRST_PID);

        let prefix = vtypes_prefix(&mut doc.root);
        let mut value = Element::new(format!("{}:bool", prefix));
        value.set_text("true");
        let mut property = Element::new("property")
            .with_attr("fmtid", USER_DEFINED_FMTID)
            .with_attr("pid", &pid.to_string())
            .with_attr("name", RECALC_PROPERTY);
        property.push_child(value);

        doc.root.push_child(property);
        package.put_part(&part, doc);
        debug!("Flagged {} for recalculation (pid {})", part.path, pid);
        Ok(true)
    }
}

/// Prefix bound to the variant-types namespace on `root`, declaring `vt`
/// when none is.
fn vtypes_prefix(root: &mut Element) -> String {
    let bound = root.attributes().find_map(|(key, value)| {
        (value == namespaces::DOC_PROPS_VTYPES)
            .then(|| key.strip_prefix("xmlns:"))
            .flatten()
            .map(str::to_string)
    });
    match bound {
        Some(prefix) => prefix,
        None => {
            root.set_attr("xmlns:vt", namespaces::DOC_PROPS_VTYPES);
            "vt".to_string()
        }
    }
}
