//! Unique, human-readable entry identifiers.
//!
//! The identifier of a new entry is its title. When that is taken, a numeric
//! suffix is appended and incremented (`trip`, `trip1`, `trip2`, ...) until the
//! store reports no entry with that identifier. Nothing is cached between
//! probes: every candidate is checked against the store.

/// Existence check for entry identifiers.
pub trait EntryIdLookup {
    type Error;

    fn entry_id_exists(&self, entry_id: &str) -> Result<bool, Self::Error>;
}

/// Probes `title`, `title1`, `title2`, ... and returns the first free identifier.
pub fn assign_entry_id<L>(title: &str, lookup: &L) -> Result<String, L::Error>
where
    L: EntryIdLookup + ?Sized,
{
    let mut candidate = title.to_string();
    let mut suffix: u64 = 0;
    while lookup.entry_id_exists(&candidate)? {
        suffix += 1;
        candidate = format!("{}{}", title, suffix);
    }
    Ok(candidate)
}
