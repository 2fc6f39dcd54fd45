//! Error types for registry operations.

use thiserror::Error;

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Errors raised by [`TypeRegistry`](super::TypeRegistry).
///
/// All of these are local to the caller: a rejected registration or a failed
/// lookup leaves the registry unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The identifier is already taken within the family.
    #[error("{family} identifier '{identifier}' is already registered")]
    DuplicateIdentifier {
        /// Concept family name.
        family: &'static str,
        /// The clashing identifier.
        identifier: String,
    },

    /// No factory is registered under the identifier.
    #[error("no {family} registered under identifier '{identifier}'")]
    UnknownIdentifier {
        /// Concept family name.
        family: &'static str,
        /// The identifier that was looked up.
        identifier: String,
    },

    /// Empty or whitespace-only identifiers are never accepted.
    #[error("{family} identifier must not be empty")]
    EmptyIdentifier {
        /// Concept family name.
        family: &'static str,
    },

    /// A thread panicked while holding the registry lock.
    #[error("registry lock poisoned: {0}")]
    LockPoisoned(String),
}
