//! `[Content_Types].xml` upkeep for parts created by a patch run.

use crate::error::{PatchError, Result};
use crate::package::Package;
use crate::package::parts::CONTENT_TYPES_PART;
use crate::package::xml::{Element, XmlDocument};

/// Content type registered for `part_path`: an `Override` wins over the
/// extension `Default`.
pub fn content_type_of(doc: &XmlDocument, part_path: &str) -> Option<String> {
    let part_name = part_name(part_path);
    let overridden = doc
        .root
        .child_elements()
        .filter(|el| el.is("Override"))
        .find(|el| el.attr("PartName").is_some_and(|p| p.eq_ignore_ascii_case(&part_name)))
        .and_then(|el| el.attr("ContentType").map(|ct| ct.into_owned()));

    overridden.or_else(|| {
        let extension = part_path.rsplit_once('.').map(|(_, ext)| ext)?;
        doc.root
            .child_elements()
            .filter(|el| el.is("Default"))
            .find(|el| {
                el.attr("Extension")
                    .is_some_and(|e| e.eq_ignore_ascii_case(extension))
            })
            .and_then(|el| el.attr("ContentType").map(|ct| ct.into_owned()))
    })
}

/// Register an `Override` for `part_path` unless one already exists.
/// Returns whether the content types part changed.
pub fn ensure_override(package: &mut Package, part_path: &str, content_type: &str) -> Result<bool> {
    let mut doc = package.read_xml(CONTENT_TYPES_PART)?.ok_or_else(|| {
        PatchError::StructuralPartMissing(CONTENT_TYPES_PART.to_string())
    })?;

    let part_name = part_name(part_path);
    let exists = doc.root.child_elements().any(|el| {
        el.is("Override") && el.attr("PartName").is_some_and(|p| p.eq_ignore_ascii_case(&part_name))
    });
    if exists {
        return Ok(false);
    }

    doc.root.push_child(
        Element::new("Override")
            .with_attr("PartName", &part_name)
            .with_attr("ContentType", content_type),
    );
    package.write_xml(CONTENT_TYPES_PART, doc);
    Ok(true)
}

fn part_name(part_path: &str) -> String {
    format!("/{}", part_path.trim_start_matches('/'))
}
