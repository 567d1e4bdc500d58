use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! guid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Canonical form: braces, upper-case hex, no surrounding whitespace.
            pub fn new(raw: &str) -> Self {
                let trimmed = raw.trim().trim_start_matches('{').trim_end_matches('}');
                Self(format!("{{{}}}", trimmed.trim().to_ascii_uppercase()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self::new(&raw)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self::new(raw)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

guid_identifier!(
    /// Stable identity of a master across all of its revisions (`BaseID`).
    TemplateId
);

guid_identifier!(
    /// Identity of one master revision (`UniqueID`).
    RevisionId
);

/// Package-scoped master id; the only thing page shapes refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u32);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Approval status of a snapshot. Declaration order is the approval order.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Draft,
    Review,
    Approved,
    #[default]
    Published,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Draft => "draft",
            Status::Review => "review",
            Status::Approved => "approved",
            Status::Published => "published",
        };
        f.write_str(label)
    }
}

/// Named style references carried by a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleNames {
    #[serde(default)]
    pub fill: Option<String>,
    #[serde(default)]
    pub line: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// One immutable content revision of a master, as served by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSnapshot {
    pub template_id: TemplateId,
    #[serde(default)]
    pub name: String,
    pub revision_id: RevisionId,
    pub status: Status,
    /// Monotonic per template; the highest sequence is the newest snapshot.
    #[serde(default)]
    pub sequence: u64,
    #[serde(default)]
    pub styles: StyleNames,
    /// Serialized `<Master>` element.
    pub definition_fragment: String,
    /// Serialized `<MasterContents>` document.
    pub definition_body: String,
}

/// A master as currently embodied by a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateReference {
    pub local_id: LocalId,
    pub template_id: TemplateId,
    pub revision_id: RevisionId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct PatchPlanEntry {
    pub reference: TemplateReference,
    pub snapshot: TemplateSnapshot,
}

impl PatchPlanEntry {
    pub fn old_revision(&self) -> &RevisionId {
        &self.reference.revision_id
    }

    pub fn display_name(&self) -> &str {
        if self.snapshot.name.is_empty() {
            &self.reference.name
        } else {
            &self.snapshot.name
        }
    }
}
