use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ObserverError
// ---------------------------------------------------------------------------

/// Failure of a container mutation. The container is left untouched and
/// nothing is emitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObserverError {
    /// `insert` on a key that is already present.
    #[error("key {key} is already present")]
    DuplicateKey {
        /// Debug rendering of the offending key.
        key: String,
    },

    /// Positional access past the end of a list.
    #[error("index {index} is out of range for a list of length {len}")]
    IndexOutOfRange {
        /// Requested position.
        index: usize,
        /// Length of the list at the time of the call.
        len: usize,
    },
}

impl ObserverError {
    pub(crate) fn duplicate_key(key: &impl fmt::Debug) -> Self {
        Self::DuplicateKey {
            key: format!("{key:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// AttributeError
// ---------------------------------------------------------------------------

/// Numeric representation of an attribute cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// Whole-number attribute (`i32`).
    Int,
    /// Fractional attribute (`f32`).
    Float,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttributeKind::Int => "int",
            AttributeKind::Float => "float",
        })
    }
}

/// Failure to resolve a unit attribute.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    /// No attribute is stored under `name`.
    #[error("unknown attribute \"{name}\"")]
    Unknown {
        /// Requested attribute name.
        name: String,
    },

    /// The attribute exists but holds the other numeric type.
    #[error("attribute \"{name}\" holds {actual} values, not {expected}")]
    TypeMismatch {
        /// Requested attribute name.
        name: String,
        /// Type the caller asked for.
        expected: AttributeKind,
        /// Type actually stored.
        actual: AttributeKind,
    },

    /// A custom attribute reuses a name that is already defined.
    #[error("attribute \"{name}\" is defined twice")]
    Duplicate {
        /// Conflicting attribute name.
        name: String,
    },
}

// ---------------------------------------------------------------------------
// DataTreeError
// ---------------------------------------------------------------------------

/// Failure of a [`DataTree`](crate::DataTree) operation.
#[derive(Debug, Error)]
pub enum DataTreeError {
    /// Nothing is stored under `key`.
    #[error("no child named \"{key}\"")]
    Missing {
        /// Requested child name.
        key: String,
    },

    /// The leaf under `key` stores a different type.
    #[error("child \"{key}\" holds {actual}, not {expected}")]
    TypeMismatch {
        /// Requested child name.
        key: String,
        /// Type the caller asked for.
        expected: &'static str,
        /// Type actually stored.
        actual: &'static str,
    },

    /// A value was expected under `key` but a subtree is stored there.
    #[error("child \"{key}\" is a subtree, not a value")]
    NotALeaf {
        /// Requested child name.
        key: String,
    },

    /// A subtree was expected under `key` but a value is stored there.
    #[error("child \"{key}\" is a value, not a subtree")]
    NotATree {
        /// Requested child name.
        key: String,
    },

    /// `add_node` on a key that is already present.
    #[error("child \"{key}\" already exists")]
    DuplicateKey {
        /// Conflicting child name.
        key: String,
    },

    /// A JSON value that has no tree representation.
    #[error("unsupported JSON value at {path}")]
    UnsupportedJson {
        /// Dotted path to the value.
        path: String,
    },

    /// The input was not valid JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
