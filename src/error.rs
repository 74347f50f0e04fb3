use crate::object::ObjectId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DowserError {
    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("Object {id} is a {type_name}, not a {expected}")]
    WrongKind {
        id: ObjectId,
        type_name: String,
        expected: &'static str,
    },

    #[error("No active frame")]
    NoActiveFrame,

    #[error("Invalid configuration value for {key}: {value:?}")]
    Config { key: &'static str, value: String },
}

/// Failure while producing an object's summary. Never escapes
/// [`crate::repr::get_repr`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReprError {
    #[error("dangling reference to object {0}")]
    DanglingReference(ObjectId),

    #[error("{0}")]
    Raised(String),

    #[error("repr hook panicked: {0}")]
    Panicked(String),
}
