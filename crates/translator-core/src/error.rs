//! Registration and accessor error types

use thiserror::Error;

/// Reasons a translatable field is dropped while its type is registered
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    #[error("translatable field {field} declares no association fields")]
    NoAssociations { field: String },

    #[error("association field {association} of {field} does not exist")]
    MissingAssociation { field: String, association: String },

    #[error("translatable field {field} has no setter")]
    MissingTarget { field: String },

    #[error("translatable field {field} specifies neither a dictionary code nor a query")]
    NoQuery { field: String },

    #[error(
        "query for {field} has {placeholders} `?` placeholders but {associations} association \
         fields are declared; only positional `?` parameters are bound"
    )]
    ParameterCount {
        field: String,
        placeholders: usize,
        associations: usize,
    },
}

/// Failures while reading or writing a field of a live object
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("accessor for {field} expected a {expected}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
    },

    #[error("parent projection to {parent} failed")]
    Projection { parent: &'static str },
}
