//! Per-user tag ledger.
//!
//! A user's ledger is a cache of the tags that currently label at least one
//! of their entries. It is never trusted for removal: every entry mutation
//! prunes it against the user's entries and then unions in the tags the
//! mutation introduced.

use crate::entities::Entry;
use crate::tags::TagList;

/// Keeps the ledger tags that at least one of `entries` still carries.
pub fn prune(ledger: &TagList, entries: &[Entry]) -> TagList {
    ledger.iter()
        .filter(|tag| entries.iter().any(|entry| entry.tags.contains(tag)))
        .collect()
}

/// Appends every tag of `introduced` that the ledger does not hold yet.
pub fn union(ledger: &TagList, introduced: &TagList) -> TagList {
    let mut ledger = ledger.clone();
    for tag in introduced.iter() {
        ledger.insert(tag);
    }
    ledger
}

/// Prune, then union. `entries` must be all of the owner's entries after the mutation.
pub fn reconcile(ledger: &TagList, entries: &[Entry], introduced: &TagList) -> TagList {
    union(&prune(ledger, entries), introduced)
}

/// Recomputes a ledger from entries alone, ignoring whatever was cached.
pub fn rebuild(entries: &[Entry]) -> TagList {
    entries.iter()
        .flat_map(|entry| entry.tags.iter())
        .collect()
}
