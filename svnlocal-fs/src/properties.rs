//! Versioned properties
//!
//! Node properties and revision properties are plain name/value maps.
//! Entry properties (`svn:entry:*`) are never stored; they are synthesized
//! from commit history when a client asks for them.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Property value
pub type PropertyValue = String;

/// Sorted property map, so node hashes are deterministic
pub type PropMap = BTreeMap<String, PropertyValue>;

/// A single property difference between two nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropChange {
    pub name: String,
    /// New value, `None` when the property was removed
    pub value: Option<PropertyValue>,
}

/// Compute the property changes that turn `old` into `new`, sorted by name
pub fn prop_diffs(old: &PropMap, new: &PropMap) -> Vec<PropChange> {
    let mut changes = Vec::new();

    for (name, value) in new {
        if old.get(name) != Some(value) {
            changes.push(PropChange {
                name: name.clone(),
                value: Some(value.clone()),
            });
        }
    }

    for name in old.keys() {
        if !new.contains_key(name) {
            changes.push(PropChange {
                name: name.clone(),
                value: None,
            });
        }
    }

    changes.sort_by(|a, b| a.name.cmp(&b.name));
    changes
}

/// SVN standard node properties
pub mod svn_props {
    /// Executable flag
    pub const EXECUTABLE: &str = "svn:executable";

    /// MIME type
    pub const MIME_TYPE: &str = "svn:mime-type";

    /// Ignore patterns
    pub const IGNORE: &str = "svn:ignore";

    /// End-of-line style
    pub const EOL_STYLE: &str = "svn:eol-style";

    /// Value for svn:executable
    pub const EXECUTABLE_VALUE: &str = "*";

    /// Check if a property name is in the reserved `svn:` namespace
    pub fn is_svn_property(name: &str) -> bool {
        name.starts_with("svn:")
    }
}

/// Revision property names
pub mod revprops {
    pub const AUTHOR: &str = "svn:author";
    pub const DATE: &str = "svn:date";
    pub const LOG: &str = "svn:log";
}

/// Synthesized entry property names
pub mod entry_props {
    pub const PREFIX: &str = "svn:entry:";
    pub const COMMITTED_REV: &str = "svn:entry:committed-rev";
    pub const COMMITTED_DATE: &str = "svn:entry:committed-date";
    pub const LAST_AUTHOR: &str = "svn:entry:last-author";

    /// Entry properties are derived, never stored on nodes
    pub fn is_entry_property(name: &str) -> bool {
        name.starts_with(PREFIX)
    }
}

/// Render a timestamp the way `svn:date` stores it
pub fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Parse an `svn:date` value
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
