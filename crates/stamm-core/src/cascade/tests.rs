//! Executor tests against an in-memory gateway.

use std::{
  cell::{Cell, RefCell},
  collections::BTreeMap,
};

use chrono::{Duration, Utc};
use uuid::Uuid;

use super::{archive, restore};
use crate::{
  Error,
  catalog,
  gateway::Gateway,
  ids::Identifier,
  record::{ArchiveState, RecordKey, RecordStatus, Stamp},
  registry::{EntityType, Registry},
};

// ─── In-memory gateway ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct Row {
  refs:   BTreeMap<String, Option<String>>,
  status: RecordStatus,
}

#[derive(Debug, thiserror::Error)]
#[error("injected failure on {0}")]
struct Injected(String);

#[derive(Default)]
struct Memory {
  rows:        RefCell<BTreeMap<(String, String), Row>>,
  transitions: RefCell<BTreeMap<(String, String), usize>>,
  calls:       Cell<usize>,
  fail_on:     Option<(String, String)>,
}

impl Memory {
  fn insert(&self, entity: &str, id: &str, refs: &[(&str, &str)]) {
    let refs = refs
      .iter()
      .map(|(c, v)| (c.to_string(), Some(v.to_string())))
      .collect();
    self.rows.borrow_mut().insert(
      (entity.to_owned(), id.to_owned()),
      Row { refs, status: RecordStatus::Active },
    );
  }

  fn set_status(&self, entity: &str, id: &str, status: RecordStatus) {
    self
      .rows
      .borrow_mut()
      .get_mut(&(entity.to_owned(), id.to_owned()))
      .unwrap()
      .status = status;
  }

  fn status(&self, entity: &str, id: &str) -> RecordStatus {
    self.rows.borrow()[&(entity.to_owned(), id.to_owned())].status.clone()
  }

  fn transitions_of(&self, entity: &str, id: &str) -> usize {
    self
      .transitions
      .borrow()
      .get(&(entity.to_owned(), id.to_owned()))
      .copied()
      .unwrap_or(0)
  }

  fn snapshot(&self) -> BTreeMap<(String, String), Row> { self.rows.borrow().clone() }

  fn key(entity: &EntityType, id: &Identifier) -> (String, String) {
    (entity.name.to_owned(), id.to_string())
  }

  fn tick(&self) { self.calls.set(self.calls.get() + 1); }
}

impl Gateway for Memory {
  type Error = Injected;

  fn load_state(
    &self,
    entity: &EntityType,
    id: &Identifier,
  ) -> Result<Option<ArchiveState>, Injected> {
    self.tick();
    Ok(self.rows.borrow().get(&Self::key(entity, id)).map(|r| r.status.state()))
  }

  fn transition_self(
    &self,
    entity: &EntityType,
    id: &Identifier,
    target: ArchiveState,
    stamp: &Stamp,
  ) -> Result<bool, Injected> {
    self.tick();
    let key = Self::key(entity, id);
    if self.fail_on.as_ref() == Some(&key) {
      return Err(Injected(format!("{}/{}", key.0, key.1)));
    }
    *self.transitions.borrow_mut().entry(key.clone()).or_default() += 1;

    let mut rows = self.rows.borrow_mut();
    let Some(row) = rows.get_mut(&key) else { return Ok(false) };
    if row.status.state() == target {
      return Ok(false);
    }
    row.status = match target {
      ArchiveState::Archived => RecordStatus::Archived {
        at: stamp.at,
        by: stamp.actor.clone(),
      },
      ArchiveState::Active => RecordStatus::Active,
    };
    Ok(true)
  }

  fn find_child_identifiers(
    &self,
    child: &EntityType,
    column: &str,
    parent: &Identifier,
    state: ArchiveState,
  ) -> Result<Vec<String>, Injected> {
    self.tick();
    let parent = parent.to_string();
    Ok(
      self
        .rows
        .borrow()
        .iter()
        .filter(|((entity, _), row)| {
          entity == child.name
            && row.status.state() == state
            && row.refs.get(column).and_then(Option::as_deref) == Some(parent.as_str())
        })
        .map(|((_, id), _)| id.clone())
        .collect(),
    )
  }

  fn read_foreign_key_values(
    &self,
    entity: &EntityType,
    id: &Identifier,
  ) -> Result<BTreeMap<String, Option<String>>, Injected> {
    self.tick();
    Ok(
      self
        .rows
        .borrow()
        .get(&Self::key(entity, id))
        .map(|r| r.refs.clone())
        .unwrap_or_default(),
    )
  }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn registry() -> &'static Registry { catalog::registry() }

fn token() -> String { Uuid::new_v4().to_string() }

/// Country AT → City AT-VIENNA → Address → Site → Server, plus an unrelated
/// DE chain and a second server on the same site.
struct Chain {
  address:      String,
  site:         String,
  server:       String,
  other_server: String,
  de_city:      String,
}

fn chain(m: &Memory) -> Chain {
  let (address, site, server, other_server) = (token(), token(), token(), token());
  m.insert("country", "AT", &[]);
  m.insert("city", "AT-VIENNA", &[("country_code", "AT")]);
  m.insert("address", &address, &[("city_code", "AT-VIENNA")]);
  m.insert("site", &site, &[("address_id", &address)]);
  m.insert("server", &server, &[("site_id", &site)]);
  m.insert("server", &other_server, &[("site_id", &site)]);

  m.insert("country", "DE", &[]);
  m.insert("city", "DE-BERLIN", &[("country_code", "DE")]);

  Chain { address, site, server, other_server, de_city: "DE-BERLIN".into() }
}

fn stamp(actor: &str) -> Stamp { Stamp::now(actor) }

fn archived_by(status: &RecordStatus) -> Option<&str> {
  match status {
    RecordStatus::Archived { by, .. } => Some(by),
    RecordStatus::Active => None,
  }
}

// ─── Archive ─────────────────────────────────────────────────────────────────

#[test]
fn archive_country_archives_whole_chain() {
  let m = Memory::default();
  let c = chain(&m);
  let s = stamp("alice");

  let outcome = archive(registry(), &m, "country", "AT", &s).unwrap();
  assert!(outcome.found);
  assert_eq!(outcome.changed.len(), 6);

  for (entity, id) in [
    ("country", "AT"),
    ("city", "AT-VIENNA"),
    ("address", c.address.as_str()),
    ("site", c.site.as_str()),
    ("server", c.server.as_str()),
    ("server", c.other_server.as_str()),
  ] {
    assert_eq!(
      m.status(entity, id),
      RecordStatus::Archived { at: s.at, by: "alice".into() },
      "{entity} {id}"
    );
  }

  assert!(m.status("country", "DE").is_active());
  assert!(m.status("city", &c.de_city).is_active());
}

#[test]
fn archive_marks_children_before_parents() {
  let m = Memory::default();
  let c = chain(&m);

  let outcome = archive(registry(), &m, "country", "AT", &stamp("alice")).unwrap();
  let order: Vec<_> = outcome.changed.iter().map(|k| k.entity.as_str()).collect();
  assert_eq!(order, ["server", "server", "site", "address", "city", "country"]);

  let position = |key: &RecordKey| outcome.changed.iter().position(|k| k == key).unwrap();
  let site = RecordKey::new("site", Identifier::Token(c.site.parse().unwrap()));
  let server = RecordKey::new("server", Identifier::Token(c.server.parse().unwrap()));
  assert!(position(&server) < position(&site));
}

#[test]
fn archive_twice_is_a_no_op() {
  let m = Memory::default();
  let c = chain(&m);
  let first = stamp("alice");
  archive(registry(), &m, "site", &c.site, &first).unwrap();
  let before = m.snapshot();

  let later = Stamp { actor: "bob".into(), at: Utc::now() + Duration::hours(1) };
  let outcome = archive(registry(), &m, "site", &c.site, &later).unwrap();

  assert!(outcome.found);
  assert!(outcome.changed.is_empty());
  assert_eq!(m.snapshot(), before);
  assert_eq!(archived_by(&m.status("server", &c.server)), Some("alice"));
}

#[test]
fn archive_subtree_leaves_ancestors_active() {
  let m = Memory::default();
  let c = chain(&m);

  archive(registry(), &m, "site", &c.site, &stamp("alice")).unwrap();

  assert!(m.status("address", &c.address).is_active());
  assert!(m.status("city", "AT-VIENNA").is_active());
  assert!(!m.status("site", &c.site).is_active());
  assert!(!m.status("server", &c.server).is_active());
}

#[test]
fn archive_diamond_visits_shared_descendant_once() {
  let m = Memory::default();
  let c = chain(&m);
  let (client, project, deployment) = (token(), token(), token());
  m.insert("client", &client, &[("address_id", &c.address)]);
  m.insert("project", &project, &[("client_id", &client)]);
  m.insert(
    "deployment",
    &deployment,
    &[("project_id", &project), ("server_id", &c.server)],
  );

  let outcome = archive(registry(), &m, "address", &c.address, &stamp("alice")).unwrap();

  assert!(!m.status("deployment", &deployment).is_active());
  assert_eq!(m.transitions_of("deployment", &deployment), 1);
  let deployments = outcome
    .changed
    .iter()
    .filter(|k| k.entity == "deployment")
    .count();
  assert_eq!(deployments, 1);
  assert!(!m.status("client", &client).is_active());
  assert!(!m.status("project", &project).is_active());
}

#[test]
fn archive_via_alias() {
  let m = Memory::default();
  let client = token();
  let contact = token();
  m.insert("client", &client, &[]);
  m.insert("contact", &contact, &[("client_id", &client)]);

  let outcome = archive(registry(), &m, "Working-Position", &client, &stamp("alice")).unwrap();
  assert!(outcome.found);
  assert_eq!(outcome.changed[1].entity, "client");
  assert!(!m.status("contact", &contact).is_active());
}

#[test]
fn archive_missing_record_changes_nothing() {
  let m = Memory::default();
  chain(&m);
  let before = m.snapshot();

  let outcome = archive(registry(), &m, "project", &token(), &stamp("alice")).unwrap();

  assert!(!outcome.found);
  assert!(outcome.changed.is_empty());
  assert_eq!(m.snapshot(), before);
}

#[test]
fn structural_errors_precede_any_io() {
  let m = Memory::default();
  chain(&m);

  let err = archive(registry(), &m, "planet", "X", &stamp("alice")).unwrap_err();
  assert!(matches!(err, Error::UnknownEntityType(_)));

  let err = archive(registry(), &m, "server", "AT", &stamp("alice")).unwrap_err();
  assert!(matches!(err, Error::InvalidIdentifierFormat { entity: "server", .. }));

  let err = restore(registry(), &m, "country", "not a code", &stamp("alice")).unwrap_err();
  assert!(matches!(err, Error::InvalidIdentifierFormat { entity: "country", .. }));

  assert_eq!(m.calls.get(), 0);
}

#[test]
fn gateway_failure_aborts_cascade() {
  let mut m = Memory::default();
  let c = chain(&m);
  m.fail_on = Some(("site".into(), c.site.clone()));

  let err = archive(registry(), &m, "country", "AT", &stamp("alice")).unwrap_err();
  assert!(matches!(err, Error::Gateway(_)));
  // The parent is never marked once a descendant fails.
  assert!(m.status("address", &c.address).is_active());
  assert!(m.status("country", "AT").is_active());
}

// ─── Restore ─────────────────────────────────────────────────────────────────

#[test]
fn restore_server_pulls_back_whole_ancestor_chain() {
  let m = Memory::default();
  let c = chain(&m);
  archive(registry(), &m, "country", "AT", &stamp("alice")).unwrap();

  let outcome = restore(registry(), &m, "server", &c.server, &stamp("bob")).unwrap();
  assert!(outcome.found);

  let order: Vec<_> = outcome.changed.iter().map(|k| k.entity.as_str()).collect();
  assert_eq!(order, ["country", "city", "address", "site", "server"]);
  for (entity, id) in [
    ("country", "AT"),
    ("city", "AT-VIENNA"),
    ("address", c.address.as_str()),
    ("site", c.site.as_str()),
    ("server", c.server.as_str()),
  ] {
    assert!(m.status(entity, id).is_active(), "{entity} {id}");
  }
  // Siblings of restored ancestors stay archived.
  assert_eq!(archived_by(&m.status("server", &c.other_server)), Some("alice"));
}

#[test]
fn restore_brings_back_archived_descendants() {
  let m = Memory::default();
  let c = chain(&m);
  archive(registry(), &m, "address", &c.address, &stamp("alice")).unwrap();

  let outcome = restore(registry(), &m, "address", &c.address, &stamp("bob")).unwrap();

  assert_eq!(outcome.changed.len(), 4);
  assert!(m.status("site", &c.site).is_active());
  assert!(m.status("server", &c.server).is_active());
  assert!(m.status("server", &c.other_server).is_active());
}

#[test]
fn restore_leaves_active_descendants_untouched() {
  let m = Memory::default();
  let c = chain(&m);
  let archived = RecordStatus::Archived { at: Utc::now(), by: "alice".into() };
  m.set_status("site", &c.site, archived.clone());
  m.set_status("server", &c.other_server, archived);

  let outcome = restore(registry(), &m, "site", &c.site, &stamp("bob")).unwrap();

  assert_eq!(m.transitions_of("server", &c.server), 0);
  assert!(m.status("server", &c.server).is_active());
  assert!(m.status("server", &c.other_server).is_active());
  let keys: Vec<_> = outcome.changed.iter().map(|k| k.id.to_string()).collect();
  assert_eq!(keys, [c.site.clone(), c.other_server.clone()]);
}

#[test]
fn restore_active_record_is_a_no_op() {
  let m = Memory::default();
  let c = chain(&m);
  let before = m.snapshot();

  let outcome = restore(registry(), &m, "server", &c.server, &stamp("bob")).unwrap();

  assert!(outcome.found);
  assert!(outcome.changed.is_empty());
  assert_eq!(m.snapshot(), before);
}

#[test]
fn restore_missing_record_returns_not_found() {
  let m = Memory::default();
  let outcome = restore(registry(), &m, "country", "AT", &stamp("bob")).unwrap();
  assert!(!outcome.found);
}

#[test]
fn restore_skips_dangling_and_malformed_parents() {
  let m = Memory::default();
  let c = chain(&m);
  let deployment = token();
  m.insert(
    "deployment",
    &deployment,
    &[("project_id", &token()), ("server_id", &c.server)],
  );
  let archived = RecordStatus::Archived { at: Utc::now(), by: "alice".into() };
  m.set_status("server", &c.server, archived.clone());
  m.set_status("deployment", &deployment, archived);

  let outcome = restore(registry(), &m, "deployment", &deployment, &stamp("bob")).unwrap();
  assert_eq!(outcome.changed.len(), 2);
  assert!(m.status("server", &c.server).is_active());
  assert!(m.status("deployment", &deployment).is_active());

  let broken = token();
  m.insert("site", &broken, &[("address_id", "not-a-uuid")]);
  m.set_status("site", &broken, RecordStatus::Archived { at: Utc::now(), by: "alice".into() });
  let outcome = restore(registry(), &m, "site", &broken, &stamp("bob")).unwrap();
  assert_eq!(outcome.changed.len(), 1);
}

#[test]
fn restore_diamond_reaches_shared_ancestor_once() {
  let m = Memory::default();
  let c = chain(&m);
  let (client, project, deployment) = (token(), token(), token());
  m.insert("client", &client, &[("address_id", &c.address)]);
  m.insert("project", &project, &[("client_id", &client)]);
  m.insert(
    "deployment",
    &deployment,
    &[("project_id", &project), ("server_id", &c.server)],
  );
  archive(registry(), &m, "address", &c.address, &stamp("alice")).unwrap();

  let outcome = restore(registry(), &m, "deployment", &deployment, &stamp("bob")).unwrap();

  // Both parent chains converge on the address; it is restored once.
  let addresses = outcome
    .changed
    .iter()
    .filter(|k| k.entity == "address")
    .count();
  assert_eq!(addresses, 1);
  for (entity, id) in [
    ("address", c.address.as_str()),
    ("client", client.as_str()),
    ("project", project.as_str()),
    ("site", c.site.as_str()),
    ("server", c.server.as_str()),
    ("deployment", deployment.as_str()),
  ] {
    assert!(m.status(entity, id).is_active(), "{entity} {id}");
  }
  assert!(!m.status("server", &c.other_server).is_active());
}

#[test]
fn restore_finishes_subtree_of_record_first_pulled_back_as_ancestor() {
  let m = Memory::default();
  let c = chain(&m);
  let (client, project, on_server, standalone) = (token(), token(), token(), token());
  m.insert("client", &client, &[("address_id", &c.address)]);
  m.insert("project", &project, &[("client_id", &client)]);
  m.insert(
    "deployment",
    &on_server,
    &[("project_id", &project), ("server_id", &c.server)],
  );
  m.insert("deployment", &standalone, &[("project_id", &project)]);
  archive(registry(), &m, "address", &c.address, &stamp("alice")).unwrap();

  // The site branch is walked first and reactivates the project as an
  // ancestor of the server's deployment before the client branch is reached.
  let outcome = restore(registry(), &m, "address", &c.address, &stamp("bob")).unwrap();

  assert!(m.status("project", &project).is_active());
  assert!(m.status("deployment", &on_server).is_active());
  assert!(m.status("deployment", &standalone).is_active());
  assert_eq!(m.transitions_of("deployment", &standalone), 2);
  assert_eq!(outcome.changed.len(), 8);
}

#[test]
fn restore_from_leaf_keeps_pulled_back_ancestors_minimal() {
  let m = Memory::default();
  let c = chain(&m);
  let (client, project, on_server, standalone) = (token(), token(), token(), token());
  m.insert("client", &client, &[("address_id", &c.address)]);
  m.insert("project", &project, &[("client_id", &client)]);
  m.insert(
    "deployment",
    &on_server,
    &[("project_id", &project), ("server_id", &c.server)],
  );
  m.insert("deployment", &standalone, &[("project_id", &project)]);
  archive(registry(), &m, "address", &c.address, &stamp("alice")).unwrap();

  restore(registry(), &m, "deployment", &on_server, &stamp("bob")).unwrap();

  assert!(m.status("project", &project).is_active());
  assert!(m.status("server", &c.server).is_active());
  // Neither ancestor was the restore root's descendant, so their other
  // children stay archived.
  assert_eq!(archived_by(&m.status("deployment", &standalone)), Some("alice"));
  assert_eq!(archived_by(&m.status("server", &c.other_server)), Some("alice"));
}
