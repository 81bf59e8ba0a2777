use std::collections::BTreeSet;
use std::fmt;

use crate::error::GateError;

/// The fixed set of VM ids the bot may act upon.
///
/// Built once at startup and never mutated afterwards, so it can be shared
/// freely between concurrent interactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    ids: BTreeSet<u32>,
}

impl Whitelist {
    /// Parse a comma-separated list of numeric VM ids, e.g. `"100, 101"`.
    ///
    /// An empty (or all-whitespace) string yields an empty whitelist. Any
    /// entry that is not an unsigned integer is rejected, including empty
    /// entries from stray commas.
    pub fn parse(s: &str) -> Result<Self, GateError> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut ids = BTreeSet::new();
        for part in s.split(',') {
            let part = part.trim();
            let id = part
                .parse::<u32>()
                .map_err(|_| GateError::InvalidWhitelistEntry {
                    entry: part.to_string(),
                })?;
            ids.insert(id);
        }
        Ok(Self { ids })
    }

    pub fn contains(&self, vmid: u32) -> bool {
        self.ids.contains(&vmid)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ids.iter().copied()
    }
}

impl FromIterator<u32> for Whitelist {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Whitelist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for id in &self.ids {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{id}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_whitespace() {
        let wl = Whitelist::parse(" 100, 101 ,102").unwrap();
        assert_eq!(wl.iter().collect::<Vec<_>>(), vec![100, 101, 102]);
    }

    #[test]
    fn parse_empty_is_empty_whitelist() {
        assert!(Whitelist::parse("").unwrap().is_empty());
        assert!(Whitelist::parse("   ").unwrap().is_empty());
    }

    #[test]
    fn parse_rejects_names() {
        let err = Whitelist::parse("100,web").unwrap_err();
        assert!(matches!(err, GateError::InvalidWhitelistEntry { ref entry } if entry == "web"));
    }

    #[test]
    fn parse_rejects_trailing_comma() {
        assert!(Whitelist::parse("100,").is_err());
    }

    #[test]
    fn parse_rejects_negative_ids() {
        assert!(Whitelist::parse("-1").is_err());
    }

    #[test]
    fn duplicates_collapse() {
        let wl = Whitelist::parse("101,100,101").unwrap();
        assert_eq!(wl.len(), 2);
        assert_eq!(wl.to_string(), "100,101");
    }

    #[test]
    fn contains_is_membership() {
        let wl: Whitelist = [100, 101].into_iter().collect();
        assert!(wl.contains(100));
        assert!(!wl.contains(102));
    }
}
