//! Cascade archive and restore executors.
//!
//! Both executors are a single depth-first walk over the registry's edges,
//! issuing [`Gateway`] calls in sequence against one open transaction. They
//! never commit or roll back themselves: on error the caller drops the
//! transaction and nothing the walk did survives.
//!
//! Ordering: child references are followed in declaration order and the
//! gateway returns sibling identifiers sorted, so one graph state always
//! produces the same transition order.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::{
  Error, Result,
  gateway::Gateway,
  ids::{self, Identifier},
  record::{ArchiveState, CascadeOutcome, RecordKey, Stamp},
  registry::{EntityType, Registry},
};

#[cfg(test)]
mod tests;

/// Archive the record `raw_id` of `alias` and every active descendant.
///
/// Descendants are archived before their parent. Returns an outcome with
/// `found == false`, and touches nothing, if the record does not exist.
pub fn archive<G: Gateway>(
  registry: &Registry,
  gateway: &G,
  alias: &str,
  raw_id: &str,
  stamp: &Stamp,
) -> Result<CascadeOutcome> {
  let Some((entity, id)) = locate(registry, gateway, alias, raw_id)? else {
    return Ok(CascadeOutcome::not_found());
  };
  let mut walk = Walk::new(registry, gateway, stamp);
  walk.archive(entity, id)?;
  Ok(walk.finish())
}

/// Restore the record `raw_id` of `alias`, its archived ancestors, and its
/// archived descendants.
///
/// Ancestors are restored on their own (together with their own ancestors)
/// but their other archived children stay archived.
pub fn restore<G: Gateway>(
  registry: &Registry,
  gateway: &G,
  alias: &str,
  raw_id: &str,
  stamp: &Stamp,
) -> Result<CascadeOutcome> {
  let Some((entity, id)) = locate(registry, gateway, alias, raw_id)? else {
    return Ok(CascadeOutcome::not_found());
  };
  let mut walk = Walk::new(registry, gateway, stamp);
  walk.restore(entity, id)?;
  Ok(walk.finish())
}

/// Resolve, parse and existence-check the cascade root.
fn locate<'r, G: Gateway>(
  registry: &'r Registry,
  gateway: &G,
  alias: &str,
  raw_id: &str,
) -> Result<Option<(&'r EntityType, Identifier)>> {
  let entity = registry.resolve(alias)?;
  let id = ids::parse(entity, raw_id)?;
  if gateway.exists(entity, &id).map_err(Error::gateway)? {
    Ok(Some((entity, id)))
  } else {
    debug!(entity = entity.name, %id, "cascade root not found");
    Ok(None)
  }
}

// ─── Walk ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Direction {
  Archive,
  /// Full restore: ancestors, self, then archived descendants.
  Restore,
  /// Ancestor pulled back so a restored descendant is consistent: its own
  /// ancestors and itself, no descendants.
  RestoreAncestor,
}

type VisitKey = (&'static str, Identifier, Direction);

struct Walk<'a, G> {
  registry:    &'a Registry,
  gateway:     &'a G,
  stamp:       &'a Stamp,
  visited:     HashSet<VisitKey>,
  /// Records this walk reactivated as ancestors only. Their descendants are
  /// still owed a restore if the walk later reaches them from above.
  pulled_back: HashSet<(&'static str, Identifier)>,
  changed:     Vec<RecordKey>,
}

impl<'a, G: Gateway> Walk<'a, G> {
  fn new(registry: &'a Registry, gateway: &'a G, stamp: &'a Stamp) -> Self {
    Self {
      registry,
      gateway,
      stamp,
      visited: HashSet::new(),
      pulled_back: HashSet::new(),
      changed: Vec::new(),
    }
  }

  fn finish(self) -> CascadeOutcome {
    CascadeOutcome { found: true, changed: self.changed }
  }

  /// `false` if this node was already reached in `direction`.
  fn visit(&mut self, entity: &EntityType, id: &Identifier, direction: Direction) -> bool {
    self.visited.insert((entity.name, id.clone(), direction))
  }

  // ── Archive ─────────────────────────────────────────────────────────────

  fn archive(&mut self, entity: &'a EntityType, id: Identifier) -> Result<()> {
    if !self.visit(entity, &id, Direction::Archive) {
      return Ok(());
    }
    for (child, child_id) in self.children(entity, &id, ArchiveState::Active)? {
      self.archive(child, child_id)?;
    }
    self.transition(entity, &id, ArchiveState::Archived)?;
    Ok(())
  }

  // ── Restore ─────────────────────────────────────────────────────────────

  fn restore(&mut self, entity: &'a EntityType, id: Identifier) -> Result<()> {
    if !self.visit(entity, &id, Direction::Restore) {
      return Ok(());
    }
    self.restore_ancestors(entity, &id)?;
    self.transition(entity, &id, ArchiveState::Active)?;
    let mut children = self.children(entity, &id, ArchiveState::Archived)?;
    if !self.pulled_back.is_empty() {
      // A child already reactivated as someone's ancestor no longer shows up
      // as archived, but its archived subtree still has to come back.
      let pulled = self
        .children(entity, &id, ArchiveState::Active)?
        .into_iter()
        .filter(|(child, child_id)| self.pulled_back.contains(&(child.name, child_id.clone())));
      children.extend(pulled.collect::<Vec<_>>());
    }
    for (child, child_id) in children {
      self.restore(child, child_id)?;
    }
    Ok(())
  }

  fn restore_ancestor(&mut self, entity: &'a EntityType, id: Identifier) -> Result<()> {
    if !self.visit(entity, &id, Direction::RestoreAncestor) {
      return Ok(());
    }
    self.restore_ancestors(entity, &id)?;
    if self.transition(entity, &id, ArchiveState::Active)? {
      self.pulled_back.insert((entity.name, id));
    }
    Ok(())
  }

  /// Restore every existing, archived record `entity/id` depends on.
  fn restore_ancestors(&mut self, entity: &'a EntityType, id: &Identifier) -> Result<()> {
    let values = self
      .gateway
      .read_foreign_key_values(entity, id)
      .map_err(Error::gateway)?;

    for parent_ref in &entity.parents {
      let Some(Some(raw)) = values.get(parent_ref.column) else {
        continue;
      };
      let parent = self.registry.entity(parent_ref.entity)?;
      let Some(parent_id) = ids::coerce(parent, raw) else {
        warn!(
          entity = entity.name,
          %id,
          column = parent_ref.column,
          value = raw.as_str(),
          "skipping uncoercible parent reference"
        );
        continue;
      };
      match self.gateway.load_state(parent, &parent_id).map_err(Error::gateway)? {
        Some(ArchiveState::Archived) => self.restore_ancestor(parent, parent_id)?,
        Some(ArchiveState::Active) => {}
        None => warn!(
          entity = entity.name,
          %id,
          parent = parent.name,
          parent_id = %parent_id,
          "skipping dangling parent reference"
        ),
      }
    }
    Ok(())
  }

  // ── Shared ──────────────────────────────────────────────────────────────

  /// Children of `entity/id` in `state`, across all child references.
  ///
  /// Collected up front so that transitions made while descending into one
  /// child cannot hide a sibling from the listing.
  fn children(
    &self,
    entity: &'a EntityType,
    id: &Identifier,
    state: ArchiveState,
  ) -> Result<Vec<(&'a EntityType, Identifier)>> {
    let mut found = Vec::new();
    for child_ref in &entity.children {
      let child = self.registry.entity(child_ref.entity)?;
      let raws = self
        .gateway
        .find_child_identifiers(child, child_ref.column, id, state)
        .map_err(Error::gateway)?;
      for raw in raws {
        match ids::coerce(child, &raw) {
          Some(child_id) => found.push((child, child_id)),
          None => warn!(
            entity = child.name,
            value = raw.as_str(),
            "skipping child with malformed identifier"
          ),
        }
      }
    }
    Ok(found)
  }

  fn transition(
    &mut self,
    entity: &EntityType,
    id: &Identifier,
    target: ArchiveState,
  ) -> Result<bool> {
    let applied = self
      .gateway
      .transition_self(entity, id, target, self.stamp)
      .map_err(Error::gateway)?;
    if applied {
      debug!(entity = entity.name, %id, ?target, actor = self.stamp.actor.as_str(), "transitioned");
      self.changed.push(RecordKey::new(entity.name, id.clone()));
    } else {
      debug!(entity = entity.name, %id, ?target, "already in target state");
    }
    Ok(applied)
  }
}
