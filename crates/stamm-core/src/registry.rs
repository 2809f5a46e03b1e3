//! The entity graph registry.
//!
//! A [`Registry`] is the closed catalogue of archivable entity types and the
//! foreign-key edges between them. It is assembled once through
//! [`RegistryBuilder`] and has no mutation API afterwards; the cascade
//! executors only ever see `&Registry`.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::{Error, Result, ids::KeyKind};

// ─── Edges ───────────────────────────────────────────────────────────────────

/// A foreign key this entity holds toward an entity it depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParentRef {
  /// Canonical name of the referenced entity type.
  pub entity: &'static str,
  /// Column on *this* entity's table holding the parent identifier.
  pub column: &'static str,
}

/// A foreign key another entity holds toward this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChildRef {
  /// Canonical name of the dependent entity type.
  pub entity: &'static str,
  /// Column on the *child's* table pointing back at this entity.
  pub column: &'static str,
}

// ─── Entity type ─────────────────────────────────────────────────────────────

/// A named archivable record kind.
#[derive(Debug, Clone, Serialize)]
pub struct EntityType {
  /// Stable name used for audit and logging.
  pub name:     &'static str,
  /// Backing table name.
  pub table:    &'static str,
  pub key:      KeyKind,
  pub aliases:  Vec<&'static str>,
  /// In declaration order.
  pub parents:  Vec<ParentRef>,
  /// In declaration order.
  pub children: Vec<ChildRef>,
}

impl EntityType {
  /// The parent reference stored in `column`, if any.
  pub fn parent_by_column(&self, column: &str) -> Option<&ParentRef> {
    self.parents.iter().find(|p| p.column == column)
  }
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Registry {
  types:   Vec<EntityType>,
  by_name: HashMap<&'static str, usize>,
  aliases: HashMap<String, usize>,
}

impl Registry {
  pub fn builder() -> RegistryBuilder { RegistryBuilder::default() }

  /// Case-insensitive alias lookup. `-` and spaces match `_`, so
  /// `Working-Position` resolves like `working_position`.
  pub fn resolve(&self, alias: &str) -> Result<&EntityType> {
    self
      .aliases
      .get(&normalize_alias(alias))
      .map(|&idx| &self.types[idx])
      .ok_or_else(|| Error::UnknownEntityType(alias.to_owned()))
  }

  pub fn supports(&self, alias: &str) -> bool {
    self.aliases.contains_key(&normalize_alias(alias))
  }

  pub fn canonical_name(&self, alias: &str) -> Result<&'static str> {
    self.resolve(alias).map(|e| e.name)
  }

  /// Exact lookup by canonical name.
  pub fn get(&self, name: &str) -> Option<&EntityType> {
    self.by_name.get(name).map(|&idx| &self.types[idx])
  }

  /// Like [`Registry::get`], but an unknown name is an error. Used when
  /// following edges, whose targets were validated at build time.
  pub fn entity(&self, name: &str) -> Result<&EntityType> {
    self
      .get(name)
      .ok_or_else(|| Error::UnknownEntityType(name.to_owned()))
  }

  /// All entity types in declaration order.
  pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
    self.types.iter()
  }
}

fn normalize_alias(alias: &str) -> String {
  alias
    .trim()
    .chars()
    .map(|c| match c {
      '-' | ' ' => '_',
      c => c.to_ascii_lowercase(),
    })
    .collect()
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// One-shot registration pass for a [`Registry`].
///
/// A reference is declared once, from the dependent side, and wires both the
/// [`ParentRef`] on the dependent and the [`ChildRef`] on the referenced type.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
  entities:   Vec<(&'static str, &'static str, KeyKind)>,
  aliases:    Vec<(&'static str, &'static str)>,
  references: Vec<(&'static str, &'static str, &'static str)>,
}

impl RegistryBuilder {
  /// Declare an entity type with its canonical name, table and key kind.
  pub fn entity(
    mut self,
    name: &'static str,
    table: &'static str,
    key: KeyKind,
  ) -> Self {
    self.entities.push((name, table, key));
    self
  }

  /// Register an additional alias for an already named entity type.
  pub fn alias(mut self, alias: &'static str, entity: &'static str) -> Self {
    self.aliases.push((alias, entity));
    self
  }

  /// `dependent.column` holds the identifier of a `parent` record.
  pub fn reference(
    mut self,
    dependent: &'static str,
    column: &'static str,
    parent: &'static str,
  ) -> Self {
    self.references.push((dependent, column, parent));
    self
  }

  pub fn build(self) -> Result<Registry> {
    let mut types: Vec<EntityType> = Vec::with_capacity(self.entities.len());
    let mut by_name = HashMap::new();
    let mut aliases = HashMap::new();
    let mut tables = HashSet::new();

    for (name, table, key) in self.entities {
      check_sql_name("entity name", name)?;
      check_sql_name("table name", table)?;
      if !tables.insert(table) {
        return Err(invalid(format!("table {table:?} declared twice")));
      }
      let idx = types.len();
      if by_name.insert(name, idx).is_some() {
        return Err(invalid(format!("entity {name:?} declared twice")));
      }
      aliases.insert(normalize_alias(name), idx);
      types.push(EntityType {
        name,
        table,
        key,
        aliases: Vec::new(),
        parents: Vec::new(),
        children: Vec::new(),
      });
    }

    for (alias, entity) in self.aliases {
      let &idx = by_name
        .get(entity)
        .ok_or_else(|| invalid(format!("alias {alias:?} targets unknown entity {entity:?}")))?;
      let key = normalize_alias(alias);
      if key.is_empty() {
        return Err(invalid("empty alias".to_owned()));
      }
      if aliases.insert(key, idx).is_some() {
        return Err(invalid(format!("alias {alias:?} registered twice")));
      }
      types[idx].aliases.push(alias);
    }

    for (dependent, column, parent) in self.references {
      check_sql_name("column name", column)?;
      let &dep_idx = by_name.get(dependent).ok_or_else(|| {
        invalid(format!("reference from unknown entity {dependent:?}"))
      })?;
      let &parent_idx = by_name.get(parent).ok_or_else(|| {
        invalid(format!("{dependent}.{column} references unknown entity {parent:?}"))
      })?;
      if is_reserved_column(column) {
        return Err(invalid(format!("{dependent}.{column} shadows a built-in column")));
      }
      if types[dep_idx].parent_by_column(column).is_some() {
        return Err(invalid(format!("{dependent}.{column} declared twice")));
      }
      types[dep_idx].parents.push(ParentRef { entity: parent, column });
      types[parent_idx].children.push(ChildRef { entity: dependent, column });
    }

    Ok(Registry { types, by_name, aliases })
  }
}

fn invalid(msg: String) -> Error { Error::InvalidRegistry(msg) }

/// Names are spliced into SQL, so only plain lowercase identifiers pass.
fn check_sql_name(what: &str, name: &str) -> Result<()> {
  let mut bytes = name.bytes();
  let valid = matches!(bytes.next(), Some(b'a'..=b'z' | b'_'))
    && bytes.all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'_'));
  if valid {
    Ok(())
  } else {
    Err(invalid(format!("{what} {name:?} is not a lowercase identifier")))
  }
}

fn is_reserved_column(column: &str) -> bool {
  matches!(
    column,
    "id" | "attributes" | "created_at" | "archived" | "archived_at" | "archived_by"
  )
}
