//! Identity generation.
//!
//! Identities are derived from a human-readable label when one exists:
//! lower-cased, every run of non-alphanumeric characters collapsed to one
//! `_`, leading/trailing separators stripped. Letters of any script are
//! kept, so `"Лебединое озеро"` becomes `"лебединое_озеро"`. An empty or
//! all-punctuation label falls back to `<prefix>_<unix-millis>_<counter>`.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::models::EntityKind;

const SEPARATOR: char = '_';

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Derives the slug of a label. May return an empty string.
pub fn slugify(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    let mut pending_separator = false;
    for ch in label.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push(SEPARATOR);
            }
            pending_separator = false;
            slug.push(ch);
        } else {
            pending_separator = true;
        }
    }
    slug
}

/// A process-unique, timestamp-derived identity.
pub fn fallback_id(kind: EntityKind) -> String {
    let seq = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(
        "{}_{}_{}",
        kind.id_prefix(),
        Utc::now().timestamp_millis(),
        seq
    )
}

/// Picks an identity for a new entity that `taken` does not report in use.
///
/// A label slug that is already taken gets the first free `_2`, `_3`, …
/// suffix.
pub(crate) fn derive_id(kind: EntityKind, label: &str, taken: impl Fn(&str) -> bool) -> String {
    let base = slugify(label);
    if base.is_empty() {
        let mut id = fallback_id(kind);
        while taken(&id) {
            id = fallback_id(kind);
        }
        return id;
    }
    if !taken(&base) {
        return base;
    }
    (2u64..)
        .map(|n| format!("{base}{SEPARATOR}{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Swan Lake"), "swan_lake");
        assert_eq!(slugify("  --Romeo & Juliet!!  "), "romeo_juliet");
        assert_eq!(slugify("Act_2__Scene"), "act_2_scene");
        assert_eq!(slugify("Лебединое озеро"), "лебединое_озеро");
        assert_eq!(slugify("???"), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_fallback_ids_are_unique() {
        let a = fallback_id(EntityKind::Timeslot);
        let b = fallback_id(EntityKind::Timeslot);
        assert!(a.starts_with("slot_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_derive_id_suffixes_collisions() {
        let taken = ["aida", "aida_2"];
        let id = derive_id(EntityKind::Production, "Aida", |c| taken.contains(&c));
        assert_eq!(id, "aida_3");

        let id = derive_id(EntityKind::Production, "Carmen", |c| taken.contains(&c));
        assert_eq!(id, "carmen");

        let id = derive_id(EntityKind::Person, "!!", |_| false);
        assert!(id.starts_with("person_"));
    }
}
