//! Tag-style metric extensions.
//!
//! Servers such as gostatsd and DogStatsD accept a trailing `|#` section on
//! each line, holding bare tag values and `key:value` pairs.
use itertools::Itertools;

/// Simple tags plus key/value tags, both kept in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tags {
    values: Vec<String>,
    pairs: Vec<(String, String)>,
}

impl Tags {
    pub fn new() -> Tags {
        Tags::default()
    }

    /// Add a bare tag, e.g. `canary`.
    pub fn add_tag_value<T: Into<String>>(&mut self, value: T) {
        self.values.push(value.into());
    }

    /// Add a `key:value` tag. Setting a key twice keeps its first position
    /// and the latest value.
    pub fn add_tag<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn with_tag_value<T: Into<String>>(mut self, value: T) -> Tags {
        self.add_tag_value(value);
        self
    }

    pub fn with_tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Tags {
        self.add_tag(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.pairs.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Combine call-site tags with a client's defaults.
    ///
    /// Simple tags are deduplicated, call-site first. A key/value default is
    /// only used when the call site did not set that key.
    pub fn merged(&self, defaults: &Tags) -> Tags {
        let values = self
            .values
            .iter()
            .chain(defaults.values.iter())
            .unique()
            .cloned()
            .collect();

        let mut pairs = self.pairs.clone();
        for (k, v) in defaults.pairs.iter() {
            if !self.pairs.iter().any(|(key, _)| key == k) {
                pairs.push((k.clone(), v.clone()));
            }
        }

        Tags { values, pairs }
    }

    /// Append the `|#...` section to `buf`, or nothing when there are no tags.
    pub fn write_suffix(&self, buf: &mut String) {
        if self.is_empty() {
            return;
        }
        buf.push_str("|#");
        buf.push_str(&self.values.iter().join(","));
        if !self.values.is_empty() && !self.pairs.is_empty() {
            buf.push(',');
        }
        buf.push_str(&self.pairs.iter().map(|(k, v)| format!("{k}:{v}")).join(","));
    }

    pub fn suffix(&self) -> String {
        let mut buf = String::new();
        self.write_suffix(&mut buf);
        buf
    }
}
