use super::types::AttributeType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered multi-valued attribute list
///
/// Keeps insertion order so a request renders the same way every time and a
/// parsed reply keeps the server's order. A name may appear more than once
/// (radclient prints repeated `Class` or `Cisco-AVPair` lines); `insert`
/// collapses a name to a single value while `append` adds another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSet {
    pairs: Vec<(String, String)>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to a single value, replacing any existing values in place
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = name.as_ref();
        let value = value.into();
        match self.pairs.iter().position(|(n, _)| n == name) {
            Some(first) => {
                self.pairs[first].1 = value;
                let mut index = 0;
                self.pairs.retain(|(n, _)| {
                    let keep = index <= first || n != name;
                    index += 1;
                    keep
                });
            }
            None => self.pairs.push((name.to_string(), value)),
        }
    }

    /// Add another value for `name` after the existing ones
    pub fn append(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.pairs.push((name.as_ref().to_string(), value.into()));
    }

    /// First value for `name`
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = name.as_ref();
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// First value for `name` parsed as an unsigned integer
    pub fn get_u32(&self, name: impl AsRef<str>) -> Option<u32> {
        self.get(name).and_then(|v| v.trim().parse().ok())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.get(name).is_some()
    }

    /// Remove every value for `name`, returning the first one
    pub fn remove(&mut self, name: impl AsRef<str>) -> Option<String> {
        let name = name.as_ref();
        let first = self
            .pairs
            .iter()
            .position(|(n, _)| n == name)
            .map(|i| self.pairs[i].1.clone());
        self.pairs.retain(|(n, _)| n != name);
        first
    }

    /// Overlay `other` onto this set; names present in `other` replace ours
    pub fn merge(&mut self, other: &AttributeSet) {
        for (name, _) in &other.pairs {
            self.remove(name);
        }
        self.pairs.extend(other.pairs.iter().cloned());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Render as the `Name='value', ...` list radclient reads on stdin
    pub fn to_avp_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(name, value)| format!("{}='{}'", name, escape(value)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Display adapter that masks password attributes
    pub fn redacted(&self) -> Redacted<'_> {
        Redacted(self)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = AttributeSet::new();
        for (name, value) in iter {
            set.append(name, value);
        }
        set
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn is_secret(name: &str) -> bool {
    name == AttributeType::UserPassword.name() || name == AttributeType::ChapPassword.name()
}

/// Log-safe rendering of an [`AttributeSet`]
pub struct Redacted<'a>(&'a AttributeSet);

impl fmt::Display for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if is_secret(name) {
                write!(f, "{}='********'", name)?;
            } else {
                write!(f, "{}='{}'", name, escape(value))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut set = AttributeSet::new();
        set.insert(AttributeType::UserName, "alice");
        set.insert(AttributeType::NasPort, "7");
        set.append(AttributeType::UserName, "mallory");
        set.insert(AttributeType::UserName, "bob");

        let names: Vec<_> = set.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["User-Name", "NAS-Port"]);
        assert_eq!(set.get(AttributeType::UserName), Some("bob"));
    }

    #[test]
    fn test_append_keeps_all_values() {
        let mut set = AttributeSet::new();
        set.append("Class", "a");
        set.append("Class", "b");
        assert_eq!(set.get_all("Class").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(set.remove("Class"), Some("a".to_string()));
        assert!(set.is_empty());
    }

    #[test]
    fn test_get_u32() {
        let set: AttributeSet = [("Session-Timeout", "120"), ("NAS-Port", "x")]
            .into_iter()
            .collect();
        assert_eq!(set.get_u32(AttributeType::SessionTimeout), Some(120));
        assert_eq!(set.get_u32(AttributeType::NasPort), None);
        assert_eq!(set.get_u32(AttributeType::Class), None);
    }

    #[test]
    fn test_merge_overrides() {
        let mut base: AttributeSet = [("User-Name", "alice"), ("NAS-Port", "1")]
            .into_iter()
            .collect();
        let overlay: AttributeSet = [("NAS-Port", "9"), ("Class", "c1")].into_iter().collect();
        base.merge(&overlay);
        assert_eq!(base.get("NAS-Port"), Some("9"));
        assert_eq!(base.get("Class"), Some("c1"));
        assert_eq!(base.len(), 3);
    }

    #[test]
    fn test_avp_string_quotes_values() {
        let set: AttributeSet = [("User-Name", "o'neil"), ("NAS-Port", "3")]
            .into_iter()
            .collect();
        assert_eq!(
            set.to_avp_string(),
            "User-Name='o\\'neil', NAS-Port='3'"
        );
    }

    #[test]
    fn test_redacted_masks_passwords() {
        let set: AttributeSet = [("User-Name", "alice"), ("User-Password", "hunter2")]
            .into_iter()
            .collect();
        let shown = set.redacted().to_string();
        assert!(shown.contains("alice"));
        assert!(!shown.contains("hunter2"));
    }
}
