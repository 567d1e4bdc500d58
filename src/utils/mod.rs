pub mod backup;
pub mod path_validator;
pub mod pattern;
