//! Document-local style table and the mapping of snapshot style names onto it.
//!
//! Style sheet ids are renumbered independently in every package, so a
//! snapshot can only carry style *names*; the numeric ids written into
//! patched content always come from the target document.

use crate::model::StyleNames;
use crate::package::xml::{Element, XmlDocument};
use std::collections::{BTreeSet, HashMap};

pub const FILL_STYLE_ATTR: &str = "FillStyle";
pub const LINE_STYLE_ATTR: &str = "LineStyle";
pub const TEXT_STYLE_ATTR: &str = "TextStyle";

const STYLE_ATTRS: [&str; 3] = [FILL_STYLE_ATTR, LINE_STYLE_ATTR, TEXT_STYLE_ATTR];
const NO_STYLE_ID: u32 = 0;

/// `name -> id` index over `<StyleSheets>` of a document part.
#[derive(Debug, Clone, Default)]
pub struct StyleTable {
    by_name: HashMap<String, u32>,
    ids: BTreeSet<u32>,
}

impl StyleTable {
    pub fn from_document(doc: &XmlDocument) -> Self {
        let mut table = Self::default();
        let Some(sheets) = doc.root.child("StyleSheets") else {
            return table;
        };

        let entries: Vec<(u32, &Element)> = sheets
            .child_elements()
            .filter(|el| el.is("StyleSheet"))
            .filter_map(|el| el.attr_u32("ID").map(|id| (id, el)))
            .collect();

        // Universal names first so a localized name never shadows one.
        for (id, sheet) in &entries {
            table.ids.insert(*id);
            if let Some(name) = sheet.attr("NameU") {
                table.by_name.entry(name.to_lowercase()).or_insert(*id);
            }
        }
        for (id, sheet) in &entries {
            if let Some(name) = sheet.attr("Name") {
                table.by_name.entry(name.to_lowercase()).or_insert(*id);
            }
        }

        table
    }

    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.by_name.get(&name.trim().to_lowercase()).copied()
    }

    pub fn contains_id(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Map each named slot to this document's id. Slots whose name is unknown
    /// stay `None`.
    pub fn resolve(&self, names: &StyleNames) -> ResolvedStyles {
        let lookup = |name: &Option<String>| name.as_deref().and_then(|n| self.id_of(n));
        ResolvedStyles {
            fill: lookup(&names.fill),
            line: lookup(&names.line),
            text: lookup(&names.text),
        }
    }

    /// Per slot, the first id the styled elements under `previous` used that
    /// this table defines; the document's `No Style` sheet (or its lowest
    /// id) otherwise.
    pub fn fallbacks(&self, previous: &[&Element]) -> ResolvedStyles {
        let default = if self.contains_id(NO_STYLE_ID) {
            Some(NO_STYLE_ID)
        } else {
            self.ids.first().copied()
        };
        let first_known = |attr: &str| {
            let mut found = None;
            for root in previous {
                root.walk(&mut |el| {
                    if found.is_none() && is_styled(el) {
                        found = el.attr_u32(attr).filter(|id| self.contains_id(*id));
                    }
                });
            }
            found.or(default)
        };
        ResolvedStyles {
            fill: first_known(FILL_STYLE_ATTR),
            line: first_known(LINE_STYLE_ATTR),
            text: first_known(TEXT_STYLE_ATTR),
        }
    }

    /// Replace every style id under `root` this table does not define with
    /// the slot's fallback. Returns how many attributes changed.
    pub fn repair_dangling(&self, root: &mut Element, fallbacks: &ResolvedStyles) -> usize {
        let mut repaired = 0;
        root.walk_mut(&mut |el| {
            for (attr, fallback) in fallbacks.slots() {
                let dangling = el.attr_u32(attr).is_some_and(|id| !self.contains_id(id));
                if let (true, Some(id)) = (dangling, fallback) {
                    el.set_attr(attr, &id.to_string());
                    repaired += 1;
                }
            }
        });
        repaired
    }

    /// Style ids referenced under `root` that this table does not define.
    pub fn dangling_ids(&self, root: &Element) -> BTreeSet<u32> {
        let mut dangling = BTreeSet::new();
        root.walk(&mut |el| {
            for attr in STYLE_ATTRS {
                if let Some(id) = el.attr_u32(attr) {
                    if !self.contains_id(id) {
                        dangling.insert(id);
                    }
                }
            }
        });
        dangling
    }
}

/// Target-document ids for the fill, line and text slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedStyles {
    pub fill: Option<u32>,
    pub line: Option<u32>,
    pub text: Option<u32>,
}

impl ResolvedStyles {
    pub fn is_empty(&self) -> bool {
        self.fill.is_none() && self.line.is_none() && self.text.is_none()
    }

    fn slots(&self) -> [(&'static str, Option<u32>); 3] {
        [
            (FILL_STYLE_ATTR, self.fill),
            (LINE_STYLE_ATTR, self.line),
            (TEXT_STYLE_ATTR, self.text),
        ]
    }

    /// Overwrite the style attributes of one styled element. Only attributes
    /// the element already carries are touched, and only for resolved slots.
    pub fn apply_to(&self, element: &mut Element) -> bool {
        let mut changed = false;
        for (attr, id) in self.slots() {
            if let Some(id) = id {
                if element.has_attr(attr) {
                    element.set_attr(attr, &id.to_string());
                    changed = true;
                }
            }
        }
        changed
    }

    /// Apply to every styled `<Shape>` and `<PageSheet>` under `root`;
    /// returns how many changed.
    pub fn apply_to_tree(&self, root: &mut Element) -> usize {
        if self.is_empty() {
            return 0;
        }
        let mut updated = 0;
        root.walk_mut(&mut |el| {
            if (el.is("Shape") || el.is("PageSheet")) && is_styled(el) && self.apply_to(el) {
                updated += 1;
            }
        });
        updated
    }
}

pub fn is_styled(element: &Element) -> bool {
    STYLE_ATTRS.iter().any(|attr| element.has_attr(attr))
}
