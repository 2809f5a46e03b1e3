//! Error types for `stamm-core`.

use thiserror::Error;

use crate::ids::KeyKind;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown entity type: {0:?}")]
  UnknownEntityType(String),

  #[error("invalid identifier {raw:?} for {entity}: expected a {expected}")]
  InvalidIdentifierFormat {
    entity:   &'static str,
    raw:      String,
    expected: KeyKind,
  },

  #[error("invalid entity registry: {0}")]
  InvalidRegistry(String),

  #[error("{entity} has no reference column {column:?}")]
  UnknownReference {
    entity: &'static str,
    column: String,
  },

  #[error("{0} records need an explicit identifier")]
  MissingIdentifier(&'static str),

  #[error("{entity} {id} already exists")]
  AlreadyExists {
    entity: &'static str,
    id:     String,
  },

  #[error("referenced {entity} {id} does not exist")]
  ParentNotFound {
    entity: &'static str,
    id:     String,
  },

  #[error("referenced {entity} {id} is archived")]
  ParentArchived {
    entity: &'static str,
    id:     String,
  },

  /// Stored archive-state columns violate the Active/Archived invariant.
  #[error("inconsistent archive state: {0}")]
  InconsistentState(String),

  #[error("gateway error: {0}")]
  Gateway(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a persistence-layer failure raised while walking the graph.
  pub fn gateway<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Gateway(Box::new(err))
  }

  /// `true` for errors caused by caller input rather than by the store.
  pub fn is_client_error(&self) -> bool {
    !matches!(self, Self::Gateway(_) | Self::InconsistentState(_) | Self::InvalidRegistry(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
