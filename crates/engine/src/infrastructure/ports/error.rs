//! Error types for port operations.

use divemap_domain::NodeId;

/// Repository operation errors with context for debugging.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Entity not found - includes entity type and ID for actionable error messages.
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// The write would give a parent two children with the same short name
    /// (or create a second country with the same short name).
    #[error("Duplicate path segment '{short_name}' under {}", parent_label(.parent_id))]
    DuplicatePathSegment {
        parent_id: Option<NodeId>,
        short_name: String,
    },

    /// Deletion refused while other rows still reference the entity.
    #[error("{entity_type} {id} still has {count} dependent rows")]
    DependentRowsRemain {
        entity_type: &'static str,
        id: String,
        count: i64,
    },

    /// Database operation failed - includes operation name for tracing.
    #[error("Database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Business constraint violated.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

fn parent_label(parent_id: &Option<NodeId>) -> String {
    match parent_id {
        Some(id) => format!("node {}", id),
        None => "the country list".to_string(),
    }
}

impl RepoError {
    /// Create a NotFound error with entity type and ID context.
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    /// Create a Database error with operation context.
    pub fn database(operation: &'static str, message: impl ToString) -> Self {
        Self::Database {
            operation,
            message: message.to_string(),
        }
    }

    /// Create a Serialization error.
    pub fn serialization(message: impl ToString) -> Self {
        Self::Serialization(message.to_string())
    }

    /// Create a ConstraintViolation error.
    pub fn constraint(message: impl ToString) -> Self {
        Self::ConstraintViolation(message.to_string())
    }

    pub fn duplicate_segment(parent_id: Option<NodeId>, short_name: impl ToString) -> Self {
        Self::DuplicatePathSegment {
            parent_id,
            short_name: short_name.to_string(),
        }
    }

    pub fn dependents_remain(entity_type: &'static str, id: impl ToString, count: i64) -> Self {
        Self::DependentRowsRemain {
            entity_type,
            id: id.to_string(),
            count,
        }
    }

    /// Check if this is a NotFound error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_segment_messages_name_the_parent() {
        let err = RepoError::duplicate_segment(Some(NodeId::new(4)), "ca");
        assert_eq!(err.to_string(), "Duplicate path segment 'ca' under node 4");
        let err = RepoError::duplicate_segment(None, "ge");
        assert_eq!(
            err.to_string(),
            "Duplicate path segment 'ge' under the country list"
        );
    }
}
