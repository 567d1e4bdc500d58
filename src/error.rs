use thiserror::Error;

/// Fatal errors. Anything that only affects a single template is reported as a
/// [`crate::agents::update::SkipReason`] instead.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Package validation failed: {0}")]
    PackageValidation(String),

    #[error("Structural part missing: {0}")]
    StructuralPartMissing(String),

    #[error("Part not found: {0}")]
    PartNotFound(String),

    #[error("Relationship unresolvable: {0}")]
    RelationshipUnresolvable(String),

    #[error("XML parsing failed: {0}")]
    XmlParsing(String),

    #[error("Failed to persist package: {0}")]
    PersistFailure(String),

    #[error(
        "Package is locked by another writer: {0} (delete the lock file if no other run is active)"
    )]
    PackageLocked(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled by user")]
    UserCancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<quick_xml::Error> for PatchError {
    fn from(err: quick_xml::Error) -> Self {
        PatchError::XmlParsing(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for PatchError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        PatchError::XmlParsing(format!("Attribute error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, PatchError>;
