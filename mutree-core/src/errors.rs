use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, TreeError>;

/// Validation failures raised while binding a document or reading node
/// attributes. All of these are fatal: there is no partial success, and
/// recovery (skipping a malformed node, aborting the load) belongs to the
/// caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Tree node is expected to be an object, but found: {0}")]
    NotObject(String),

    #[error("Mutation position is invalid: {0}")]
    MutationPositionInvalid(String),

    #[error("Mutation nucleotide is invalid: {0}")]
    MutationNucleotideInvalid(String),

    #[error("Mutation amino acid is invalid: {0}")]
    MutationAminoacidInvalid(String),

    #[error("Node id is invalid: {0}")]
    IdInvalid(String),

    #[error("Node clade is invalid: {0}")]
    CladeInvalid(String),

    #[error("Node type is missing")]
    TypeMissing,

    #[error("Node type is invalid: {0}")]
    TypeInvalid(String),
}
