use crate::agents::update::context::{AppliedPatch, ComponentTemplate, PatchOutcome, SkipReason};
use crate::error::{PatchError, Result};
use crate::model::{LocalId, PatchPlanEntry};
use crate::package::Package;
use crate::package::masters::{PackageLayout, find_master_by_revision};
use crate::package::parts::PartKind;
use crate::package::relationships::RelationshipGraph;
use crate::package::styles::StyleTable;
use crate::package::xml::{Element, NamespaceScope, XmlDocument, XmlNode, normalize_namespaces};
use tracing::{debug, info, warn};

/// Rewrites one master in place.
///
/// The master keeps its `ID` and its link to the backing part, so page
/// shapes that refer to it stay valid without being touched; only the
/// revision identity and the content behind the link change. Every fallible
/// step runs before the first write, so a skipped entry leaves the package
/// exactly as it was.
pub struct TemplatePatcher<'a> {
    graph: &'a mut RelationshipGraph,
    layout: &'a PackageLayout,
    styles: &'a StyleTable,
}

impl<'a> TemplatePatcher<'a> {
    pub fn new(
        graph: &'a mut RelationshipGraph,
        layout: &'a PackageLayout,
        styles: &'a StyleTable,
    ) -> Self {
        Self {
            graph,
            layout,
            styles,
        }
    }

    pub fn patch(&mut self, package: &mut Package, entry: &PatchPlanEntry) -> Result<PatchOutcome> {
        let snapshot = &entry.snapshot;
        let mut masters = package.get_part(&self.layout.masters)?;

        let Some(index) = find_master_by_revision(&masters.root, entry.old_revision()) else {
            debug!("No master carries revision {}", entry.old_revision());
            return Ok(PatchOutcome::Skipped(SkipReason::TemplateAbsent));
        };
        let Some(original) = masters.root.children[index].as_element() else {
            return Ok(PatchOutcome::Skipped(SkipReason::TemplateAbsent));
        };
        let Some(local_id) = original.attr_u32("ID").map(LocalId) else {
            warn!("Master with revision {} has no ID", entry.old_revision());
            return Ok(PatchOutcome::Skipped(SkipReason::TemplateAbsent));
        };

        let (Some(rel_id), Some(original_rel)) = (
            RelationshipGraph::relationship_id(original),
            original.child("Rel").cloned(),
        ) else {
            return Ok(unresolvable(format!(
                "master {} has no link to its content part",
                local_id
            )));
        };

        let resolved = self.styles.resolve(&snapshot.styles);
        let sheet_fallbacks = self.styles.fallbacks(&[original]);

        let mut fragment = match parse_root(&snapshot.definition_fragment, "Master") {
            Ok(fragment) => fragment,
            Err(msg) => return Ok(malformed(format!("definition fragment: {}", msg))),
        };
        fragment.set_attr("ID", &local_id.to_string());
        fragment.set_attr("UniqueID", snapshot.revision_id.as_str());
        fragment.set_attr("BaseID", snapshot.template_id.as_str());
        fragment.retain_child_elements(|child| !child.is("Rel"));
        fragment.push_child(original_rel);
        resolved.apply_to_tree(&mut fragment);
        self.styles.repair_dangling(&mut fragment, &sheet_fallbacks);
        normalize_namespaces(&mut fragment, &NamespaceScope::of(&masters.root));

        let backing = match self.graph.resolve_part_by_relationship_id(
            package,
            &self.layout.masters,
            &rel_id,
            PartKind::Template,
        ) {
            Ok(part) => part,
            Err(PatchError::RelationshipUnresolvable(msg)) => return Ok(unresolvable(msg)),
            Err(e) => return Err(e),
        };
        if !package.contains(&backing.path) {
            return Ok(unresolvable(format!("{} is missing", backing)));
        }

        let mut body = match parse_root(&snapshot.definition_body, "MasterContents") {
            Ok(root) => XmlDocument::new(root),
            Err(msg) => return Ok(malformed(format!("definition body: {}", msg))),
        };
        let styled_shapes = resolved.apply_to_tree(&mut body.root);
        let body_fallbacks = match package.get_part(&backing) {
            Ok(previous) => self.styles.fallbacks(&[&previous.root]),
            Err(e) => {
                debug!("Previous content of {} unreadable: {}", backing, e);
                self.styles.fallbacks(&[])
            }
        };
        let repaired = self.styles.repair_dangling(&mut body.root, &body_fallbacks);
        if repaired > 0 {
            debug!(
                "Master '{}': {} style id(s) unknown to this document replaced",
                entry.display_name(),
                repaired
            );
        }
        normalize_namespaces(&mut body.root, &NamespaceScope::default());

        let mut dangling = self.styles.dangling_ids(&body.root);
        dangling.extend(self.styles.dangling_ids(&fragment));
        if !dangling.is_empty() {
            warn!(
                "Master '{}' still references style ids {:?} unknown to this document",
                entry.display_name(),
                dangling
            );
        }

        let components = component_templates(&body.root);

        masters.root.children[index] = XmlNode::Element(fragment);
        package.put_part(&backing, body);
        package.put_part(&self.layout.masters, masters);

        info!(
            "Patched master '{}' (ID {}) {} -> {}",
            entry.display_name(),
            local_id,
            entry.old_revision(),
            snapshot.revision_id
        );

        Ok(PatchOutcome::Patched(AppliedPatch {
            local_id,
            styled_shapes,
            components,
        }))
    }
}

/// Component shapes page instances may point at: the children of the single
/// top-level shape, or the top-level shapes themselves when there are several.
pub fn component_templates(body: &Element) -> Vec<ComponentTemplate> {
    let Some(shapes) = body.child("Shapes") else {
        return Vec::new();
    };
    let top: Vec<&Element> = shapes.child_elements().filter(|el| el.is("Shape")).collect();

    let declared: Vec<&Element> = match top.as_slice() {
        [single] => single
            .child("Shapes")
            .map(|nested| nested.child_elements().filter(|el| el.is("Shape")).collect())
            .unwrap_or_default(),
        _ => top,
    };

    declared
        .into_iter()
        .filter_map(|shape| {
            Some(ComponentTemplate {
                id: shape.attr_u32("ID")?,
                name_u: shape.attr("NameU").map(|v| v.into_owned()),
                name: shape.attr("Name").map(|v| v.into_owned()),
                shape_type: shape.attr("Type").map(|v| v.into_owned()),
            })
        })
        .collect()
}

fn parse_root(content: &str, expected: &str) -> std::result::Result<Element, String> {
    let root = Element::parse_fragment(content).map_err(|e| e.to_string())?;
    if !root.is(expected) {
        return Err(format!("expected <{}>, found <{}>", expected, root.name));
    }
    Ok(root)
}

fn malformed(msg: String) -> PatchOutcome {
    warn!("Skipping malformed snapshot: {}", msg);
    PatchOutcome::Skipped(SkipReason::MalformedSnapshot(msg))
}

fn unresolvable(msg: String) -> PatchOutcome {
    warn!("Skipping master: {}", msg);
    PatchOutcome::Skipped(SkipReason::RelationshipUnresolvable(msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RevisionId, TemplateId, TemplateReference};
    use crate::package::fixtures::{self, B1, LOCAL_PROCESS, PROCESS_MASTER_PART, U1, U2};
    use crate::package::masters::TemplateIndex;
    use crate::package::styles::{FILL_STYLE_ATTR, LINE_STYLE_ATTR, TEXT_STYLE_ATTR};

    struct Harness {
        package: Package,
        graph: RelationshipGraph,
        layout: PackageLayout,
        styles: StyleTable,
    }

    impl Harness {
        fn open(path: &std::path::Path) -> Self {
            let package = Package::open(path).unwrap();
            let mut graph = RelationshipGraph::new();
            let layout = PackageLayout::resolve(&package, &mut graph).unwrap();
            let styles = StyleTable::from_document(&package.get_part(&layout.document).unwrap());
            Self {
                package,
                graph,
                layout,
                styles,
            }
        }

        fn patch(&mut self, entry: &PatchPlanEntry) -> PatchOutcome {
            TemplatePatcher::new(&mut self.graph, &self.layout, &self.styles)
                .patch(&mut self.package, entry)
                .unwrap()
        }

        fn master(&self, local_id: u32) -> Element {
            let doc = self.package.get_part(&self.layout.masters).unwrap();
            doc.root
                .child_elements()
                .find(|m| m.attr_u32("ID") == Some(local_id))
                .cloned()
                .unwrap()
        }
    }

    fn process_entry() -> PatchPlanEntry {
        PatchPlanEntry {
            reference: TemplateReference {
                local_id: LocalId(LOCAL_PROCESS),
                template_id: TemplateId::new(B1),
                revision_id: RevisionId::new(U1),
                name: "Process".to_string(),
            },
            snapshot: fixtures::process_snapshot_v2(),
        }
    }

    #[test]
    fn keeps_local_id_and_link_while_switching_revision() {
        let fixture = fixtures::sample_package();
        let mut harness = Harness::open(&fixture.path);

        let outcome = harness.patch(&process_entry());
        let PatchOutcome::Patched(applied) = outcome else {
            panic!("expected patch, got {:?}", outcome);
        };
        assert_eq!(applied.local_id, LocalId(LOCAL_PROCESS));

        let master = harness.master(LOCAL_PROCESS);
        assert_eq!(master.attr("UniqueID").as_deref(), Some(U2));
        assert_eq!(master.attr("BaseID").as_deref(), Some(B1));
        assert_eq!(RelationshipGraph::relationship_id(&master).as_deref(), Some("rId1"));
        assert_eq!(master.child_elements().filter(|c| c.is("Rel")).count(), 1);
        assert!(!master.has_attr("xmlns"));
        assert!(!master.has_attr("xmlns:r"));

        let index = TemplateIndex::load(&harness.package, &harness.layout).unwrap();
        let ids: Vec<LocalId> = index.references().iter().map(|r| r.local_id).collect();
        assert_eq!(ids, vec![LocalId(LOCAL_PROCESS), LocalId(fixtures::LOCAL_DECISION)]);
    }

    #[test]
    fn body_uses_target_document_style_ids() {
        let fixture = fixtures::sample_package();
        let mut harness = Harness::open(&fixture.path);

        let PatchOutcome::Patched(applied) = harness.patch(&process_entry()) else {
            panic!("expected patch");
        };
        assert_eq!(applied.styled_shapes, 3);

        let body = harness.package.read_xml(PROCESS_MASTER_PART).unwrap().unwrap();
        let group = body.root.child("Shapes").unwrap().child("Shape").unwrap();
        assert_eq!(group.attr_u32(FILL_STYLE_ATTR), Some(9));
        assert_eq!(group.attr_u32(LINE_STYLE_ATTR), Some(10));
        assert_eq!(group.attr_u32(TEXT_STYLE_ATTR), Some(3));

        let badge = group
            .child("Shapes")
            .unwrap()
            .child_elements()
            .find(|s| s.attr_u32("ID") == Some(11))
            .unwrap();
        assert_eq!(badge.attr_u32(FILL_STYLE_ATTR), Some(9));
        assert!(!badge.has_attr(LINE_STYLE_ATTR));

        let sheet = harness.master(LOCAL_PROCESS);
        let sheet = sheet.child("PageSheet").unwrap();
        assert_eq!(sheet.attr_u32(FILL_STYLE_ATTR), Some(9));
        assert!(harness.styles.dangling_ids(&body.root).is_empty());
    }

    #[test]
    fn unknown_style_names_fall_back_to_previous_ids() {
        let fixture = fixtures::sample_package();
        let mut harness = Harness::open(&fixture.path);
        let mut entry = process_entry();
        entry.snapshot.styles.line = Some("Dashed Corporate".to_string());

        harness.patch(&entry);

        let body = harness.package.read_xml(PROCESS_MASTER_PART).unwrap().unwrap();
        assert!(harness.styles.dangling_ids(&body.root).is_empty());
        let group = body.root.child("Shapes").unwrap().child("Shape").unwrap();
        assert_eq!(group.attr_u32(LINE_STYLE_ATTR), Some(3));
        assert_eq!(group.attr_u32(FILL_STYLE_ATTR), Some(9));

        let master = harness.master(LOCAL_PROCESS);
        assert!(harness.styles.dangling_ids(&master).is_empty());
        let sheet = master.child("PageSheet").unwrap();
        assert_eq!(sheet.attr_u32(LINE_STYLE_ATTR), Some(0));
    }

    #[test]
    fn snapshot_without_style_names_leaves_no_foreign_ids() {
        let fixture = fixtures::sample_package();
        let mut harness = Harness::open(&fixture.path);
        let mut entry = process_entry();
        entry.snapshot.styles = Default::default();

        assert!(matches!(harness.patch(&entry), PatchOutcome::Patched(_)));

        let body = harness.package.read_xml(PROCESS_MASTER_PART).unwrap().unwrap();
        assert!(harness.styles.dangling_ids(&body.root).is_empty());
        let badge = body
            .root
            .find(&|el| el.is("Shape") && el.attr_u32("ID") == Some(11))
            .unwrap();
        assert_eq!(badge.attr_u32(FILL_STYLE_ATTR), Some(3));
        assert!(harness.styles.dangling_ids(&harness.master(LOCAL_PROCESS)).is_empty());
    }

    #[test]
    fn foreign_namespace_in_untouched_masters_survives() {
        let masters = fixtures::masters().replace(
            r#"<Rel r:id="rId2"/></Master>"#,
            r#"<Rel r:id="rId2"/><Ext xmlns="urn:ext"><Data/></Ext></Master>"#,
        );
        let fixture = fixtures::package_with(&[(fixtures::MASTERS_PART, Some(masters))]);
        let mut harness = Harness::open(&fixture.path);

        assert!(matches!(harness.patch(&process_entry()), PatchOutcome::Patched(_)));

        let decision = harness.master(fixtures::LOCAL_DECISION);
        let ext = decision.child("Ext").unwrap();
        assert_eq!(ext.attr("xmlns").as_deref(), Some("urn:ext"));
    }

    #[test]
    fn reports_components_of_the_new_body() {
        let fixture = fixtures::sample_package();
        let mut harness = Harness::open(&fixture.path);

        let PatchOutcome::Patched(applied) = harness.patch(&process_entry()) else {
            panic!("expected patch");
        };
        let ids: Vec<u32> = applied.components.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![6, 11]);
        assert_eq!(applied.components[1].name_u.as_deref(), Some("Badge"));
    }

    #[test]
    fn absent_revision_is_a_no_op() {
        let fixture = fixtures::sample_package();
        let mut harness = Harness::open(&fixture.path);
        let mut entry = process_entry();
        entry.reference.revision_id = RevisionId::new("{DEADBEEF}");

        assert_eq!(
            harness.patch(&entry),
            PatchOutcome::Skipped(SkipReason::TemplateAbsent)
        );
        assert!(!harness.package.is_modified());
    }

    #[test]
    fn malformed_content_is_skipped_without_writes() {
        let fixture = fixtures::sample_package();
        let mut harness = Harness::open(&fixture.path);

        let mut bad_fragment = process_entry();
        bad_fragment.snapshot.definition_fragment =
            "<Master ID='1'><PageSheet></Master>".to_string();
        assert!(matches!(
            harness.patch(&bad_fragment),
            PatchOutcome::Skipped(SkipReason::MalformedSnapshot(_))
        ));

        let mut wrong_root = process_entry();
        wrong_root.snapshot.definition_body = "<PageContents/>".to_string();
        assert!(matches!(
            harness.patch(&wrong_root),
            PatchOutcome::Skipped(SkipReason::MalformedSnapshot(_))
        ));

        assert!(!harness.package.is_modified());
    }

    #[test]
    fn broken_master_link_is_skipped() {
        let rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId2" Type="http://schemas.microsoft.com/visio/2010/relationships/master" Target="master2.xml"/></Relationships>"#;
        let fixture = fixtures::package_with(&[(
            "visio/masters/_rels/masters.xml.rels",
            Some(rels.to_string()),
        )]);
        let mut harness = Harness::open(&fixture.path);

        assert!(matches!(
            harness.patch(&process_entry()),
            PatchOutcome::Skipped(SkipReason::RelationshipUnresolvable(_))
        ));
        assert!(!harness.package.is_modified());
    }

    #[test]
    fn reapplying_the_same_snapshot_changes_nothing() {
        let fixture = fixtures::sample_package();
        let mut harness = Harness::open(&fixture.path);
        harness.patch(&process_entry());
        let masters_once = harness.package.get_part(&harness.layout.masters).unwrap();
        let body_once = harness.package.read_xml(PROCESS_MASTER_PART).unwrap();

        let mut again = process_entry();
        again.reference.revision_id = RevisionId::new(U2);
        assert!(matches!(harness.patch(&again), PatchOutcome::Patched(_)));

        assert_eq!(harness.package.get_part(&harness.layout.masters).unwrap(), masters_once);
        assert_eq!(harness.package.read_xml(PROCESS_MASTER_PART).unwrap(), body_once);
    }

    #[test]
    fn missing_masters_collection_is_fatal() {
        let fixture = fixtures::package_with(&[(fixtures::MASTERS_PART, None)]);
        let package = Package::open(&fixture.path).unwrap();
        let mut graph = RelationshipGraph::new();
        let layout = PackageLayout::resolve(&package, &mut graph).unwrap();
        let mut package = package;
        let styles = StyleTable::default();

        let err = TemplatePatcher::new(&mut graph, &layout, &styles)
            .patch(&mut package, &process_entry())
            .unwrap_err();
        assert!(matches!(err, PatchError::StructuralPartMissing(_)));
    }
}
