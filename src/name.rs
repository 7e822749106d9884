//! Domain names as the zone-resolution core sees them.

use core::fmt;

use serde::Serialize;

//------------ ZoneName ------------------------------------------------------

/// A canonical, lowercased domain name.
///
/// The wire layer is responsible for syntactic validation of names before
/// they reach this crate; this type only lowercases and splits labels. A
/// trailing root dot is stripped on construction so that `"example.com."`
/// and `"example.com"` compare equal.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ZoneName(Box<str>);

impl ZoneName {
    /// Creates a name from its presentation form.
    pub fn new(name: &str) -> Self {
        let name = name.strip_suffix('.').unwrap_or(name);
        ZoneName(name.to_ascii_lowercase().into())
    }

    /// Returns the name in presentation form, without the root dot.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns whether the name has no labels at all.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the labels, most specific first.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.split('.').filter(|label| !label.is_empty())
    }

    /// Iterates over the labels, most general first.
    ///
    /// This is the order in which the suffix index builds its chain hash.
    pub fn labels_suffix_first(&self) -> impl Iterator<Item = &str> {
        self.0.rsplit('.').filter(|label| !label.is_empty())
    }

    /// Splits off the leftmost label.
    ///
    /// Returns the label and the remaining parent name. Returns `None` for
    /// the root name. A single-label name yields that label with the root
    /// name as parent.
    pub fn split_first(&self) -> Option<(&str, ZoneName)> {
        if self.0.is_empty() {
            return None;
        }
        match self.0.split_once('.') {
            Some((first, parent)) => Some((first, ZoneName(parent.into()))),
            None => Some((&self.0, ZoneName("".into()))),
        }
    }

    /// Approximate heap usage of the name in bytes.
    pub(crate) fn mem_usage(&self) -> usize {
        self.0.len()
    }
}

//--- From

impl From<&str> for ZoneName {
    fn from(name: &str) -> Self {
        ZoneName::new(name)
    }
}

//--- Display

impl fmt::Display for ZoneName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str(".")
        } else {
            f.write_str(&self.0)
        }
    }
}

//============ Tests =========================================================
