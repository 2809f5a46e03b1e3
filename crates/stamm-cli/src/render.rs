//! Plain-text summaries printed when `--json` is not given.

use std::fmt::Write as _;

use stamm_core::{
  ids::KeyKind,
  record::{AuditEvent, CascadeOutcome, Record, RecordStatus},
};

use crate::client::EntitySummary;

pub fn entities(entities: &[EntitySummary]) -> String {
  let mut out = String::new();
  for e in entities {
    let key = match e.key {
      KeyKind::Token => "token",
      KeyKind::Code => "code",
    };
    let _ = write!(out, "{:<12} {key:<6}", e.name);
    let others: Vec<_> = e.aliases.iter().filter(|a| **a != e.name).collect();
    if !others.is_empty() {
      let _ = write!(out, " (alias {})", join(others.iter().map(|a| a.as_str())));
    }
    if !e.parents.is_empty() {
      let parents = e.parents.iter().map(|p| format!("{}→{}", p.column, p.entity));
      let _ = write!(out, "  depends on {}", parents.collect::<Vec<_>>().join(", "));
    }
    out.push('\n');
  }
  out
}

pub fn records(records: &[Record]) -> String {
  if records.is_empty() {
    return "no records\n".to_owned();
  }
  records.iter().map(record_line).collect()
}

fn record_line(r: &Record) -> String {
  let refs = r
    .references
    .iter()
    .filter_map(|(col, v)| v.as_ref().map(|v| format!("{col}={v}")))
    .collect::<Vec<_>>();
  format!("{:<36}  {:<8}  {}\n", r.id.to_string(), status_word(&r.status), refs.join(" "))
}

pub fn record(r: &Record) -> String {
  let mut out = format!("{} {}\n", r.entity, r.id);
  let _ = writeln!(out, "  created   {}", r.created_at.to_rfc3339());
  match &r.status {
    RecordStatus::Active => out.push_str("  status    active\n"),
    RecordStatus::Archived { at, by } => {
      let _ = writeln!(out, "  status    archived {} by {by}", at.to_rfc3339());
    }
  }
  for (column, value) in &r.references {
    let _ = writeln!(out, "  {column:<9} {}", value.as_deref().unwrap_or("-"));
  }
  if r.attributes.as_object().is_some_and(|o| !o.is_empty()) {
    let _ = writeln!(out, "  {}", r.attributes);
  }
  out
}

pub fn outcome(verb: &str, outcome: &CascadeOutcome) -> String {
  if outcome.changed.is_empty() {
    return "nothing to do\n".to_owned();
  }
  let mut out = format!("{verb} {} record(s)\n", outcome.changed.len());
  for key in &outcome.changed {
    let _ = writeln!(out, "  {} {}", key.entity, key.id);
  }
  out
}

pub fn audit(events: &[AuditEvent]) -> String {
  let mut out = String::new();
  for e in events {
    let _ = write!(
      out,
      "{}  {:<8}  {:<10} {}  by {}",
      e.recorded_at.format("%Y-%m-%d %H:%M:%S"),
      e.action.as_str(),
      e.entity,
      e.record_id,
      e.actor
    );
    if let Some(detail) = &e.detail {
      let _ = write!(out, "  ({detail})");
    }
    out.push('\n');
  }
  out
}

fn status_word(status: &RecordStatus) -> &'static str {
  if status.is_active() { "active" } else { "archived" }
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
  items.collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use stamm_core::{
    ids::Identifier,
    record::{RecordKey, Stamp},
  };

  use super::*;

  #[test]
  fn outcome_lists_changed_records() {
    let outcome = CascadeOutcome {
      found:   true,
      changed: vec![
        RecordKey::new("city", Identifier::Code("VIE".into())),
        RecordKey::new("country", Identifier::Code("AT".into())),
      ],
    };
    assert_eq!(
      super::outcome("archived", &outcome),
      "archived 2 record(s)\n  city VIE\n  country AT\n"
    );
    assert_eq!(super::outcome("restored", &CascadeOutcome::default()), "nothing to do\n");
  }

  #[test]
  fn archived_record_shows_stamp() {
    let stamp = Stamp::now("alice");
    let r = Record {
      entity:     "country".into(),
      id:         Identifier::Code("AT".into()),
      references: Default::default(),
      attributes: serde_json::json!({}),
      created_at: Utc::now(),
      status:     RecordStatus::Archived { at: stamp.at, by: stamp.actor },
    };
    let text = record(&r);
    assert!(text.starts_with("country AT\n"));
    assert!(text.contains("archived"));
    assert!(text.contains("by alice"));
    assert!(records(&[r]).contains("archived"));
  }
}
