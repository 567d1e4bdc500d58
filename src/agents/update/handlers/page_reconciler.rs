use crate::agents::update::context::{ComponentTemplate, ReconcileSummary};
use crate::error::{PatchError, Result};
use crate::model::LocalId;
use crate::package::Package;
use crate::package::masters::PackageLayout;
use crate::package::parts::PartKind;
use crate::package::relationships::RelationshipGraph;
use crate::package::xml::{Element, NamespaceScope, XmlNode, normalize_namespaces};
use tracing::{debug, warn};

const SUBCLASS_ROW: &str = "SubClass";

/// Brings every page instance of a patched master in line with the master's
/// new component structure.
pub struct PageReconciler<'a> {
    graph: &'a mut RelationshipGraph,
    layout: &'a PackageLayout,
}

impl<'a> PageReconciler<'a> {
    pub fn new(graph: &'a mut RelationshipGraph, layout: &'a PackageLayout) -> Self {
        Self { graph, layout }
    }

    pub fn reconcile(
        &mut self,
        package: &mut Package,
        local_id: LocalId,
        components: &[ComponentTemplate],
    ) -> Result<ReconcileSummary> {
        let pages = package.get_part(&self.layout.pages)?;
        let mut summary = ReconcileSummary::default();

        for page in pages.root.child_elements().filter(|el| el.is("Page")) {
            let page_name = page.attr("NameU").unwrap_or_default().into_owned();
            let Some(rel_id) = RelationshipGraph::relationship_id(page) else {
                warn!("Page '{}' has no content link, skipping", page_name);
                continue;
            };

            let part = match self.graph.resolve_part_by_relationship_id(
                package,
                &self.layout.pages,
                &rel_id,
                PartKind::Page,
            ) {
                Ok(part) => part,
                Err(PatchError::RelationshipUnresolvable(msg)) => {
                    warn!("Skipping page '{}': {}", page_name, msg);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let Some(mut doc) = package.read_xml(&part.path)? else {
                warn!("Skipping page '{}': {} is missing", page_name, part.path);
                continue;
            };

            let (instances, stubs) = reconcile_page(&mut doc.root, local_id, components);
            if instances == 0 {
                continue;
            }

            package.put_part(&part, doc);
            debug!(
                "Page '{}': {} instances of master {} reconciled, {} stubs",
                page_name, instances, local_id, stubs
            );

            summary.pages_touched += 1;
            summary.instances_updated += instances;
            summary.stubs_created += stubs;
        }

        Ok(summary)
    }
}

/// Reconcile every instance of `local_id` on one page. Returns
/// `(instances, stubs created)`.
pub fn reconcile_page(
    root: &mut Element,
    local_id: LocalId,
    components: &[ComponentTemplate],
) -> (usize, usize) {
    let mut max_id = 0u32;
    root.walk(&mut |el| {
        if el.is("Shape") {
            if let Some(id) = el.attr_u32("ID") {
                max_id = max_id.max(id);
            }
        }
    });

    let mut instances = 0;
    let mut stubs = 0;
    root.walk_scoped_mut(&NamespaceScope::default(), &mut |el, scope| {
        if el.is("Shape") && el.attr_u32("Master") == Some(local_id.0) {
            instances += 1;
            stubs += reconcile_instance(el, scope, components, &mut max_id);
        }
    });
    (instances, stubs)
}

fn reconcile_instance(
    instance: &mut Element,
    scope: &NamespaceScope,
    components: &[ComponentTemplate],
    max_id: &mut u32,
) -> usize {
    strip_subclass_override(instance);

    let existing: Vec<Element> = instance
        .child("Shapes")
        .map(|shapes| {
            shapes
                .child_elements()
                .filter(|el| el.is("Shape"))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let shape_name = qualified(&instance.name, "Shape");
    let mut stubs = 0;
    let reconciled: Vec<Element> = components
        .iter()
        .map(|component| {
            match existing
                .iter()
                .find(|shape| shape.attr_u32("MasterShape") == Some(component.id))
            {
                Some(kept) => kept.clone(),
                None => {
                    *max_id += 1;
                    stubs += 1;
                    stub_shape(&shape_name, *max_id, component)
                }
            }
        })
        .collect();

    let position = instance
        .children
        .iter()
        .position(|node| node.as_element().is_some_and(|el| el.is("Shapes")));
    instance.retain_child_elements(|child| !child.is("Shapes"));

    if !reconciled.is_empty() {
        let mut shapes = Element::new(qualified(&instance.name, "Shapes"));
        for shape in reconciled {
            shapes.push_child(shape);
        }
        normalize_namespaces(&mut shapes, scope);
        let at = position.unwrap_or(instance.children.len());
        instance.children.insert(at, XmlNode::Element(shapes));
    }

    stubs
}

/// Drop the cached `SubClass` row of the `Property` section; a section left
/// without rows goes too.
fn strip_subclass_override(instance: &mut Element) {
    for section in instance.child_elements_mut() {
        if section.is("Section") && section.attr("N").as_deref() == Some("Property") {
            section.retain_child_elements(|row| {
                !(row.is("Row") && row.attr("N").as_deref() == Some(SUBCLASS_ROW))
            });
        }
    }
    instance.retain_child_elements(|child| {
        !(child.is("Section")
            && child.attr("N").as_deref() == Some("Property")
            && !child.child_elements().any(|row| row.is("Row")))
    });
}

fn stub_shape(name: &str, id: u32, component: &ComponentTemplate) -> Element {
    let mut stub = Element::new(name).with_attr("ID", &id.to_string());
    if let Some(name_u) = &component.name_u {
        stub.set_attr("NameU", name_u);
    }
    if let Some(local_name) = &component.name {
        stub.set_attr("Name", local_name);
    }
    if let Some(shape_type) = &component.shape_type {
        stub.set_attr("Type", shape_type);
    }
    stub.set_attr("MasterShape", &component.id.to_string());
    stub
}

/// `local` with the namespace prefix of `sibling`, if any.
fn qualified(sibling: &str, local: &str) -> String {
    match sibling.split_once(':') {
        Some((prefix, _)) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}
