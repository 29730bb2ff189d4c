//! Selection accumulator
//!
//! The working set of identity keys picked in one popup session. Ordered,
//! with set semantics enforced by [`SelectionSet::toggle`].

/// Ordered set of selected identity keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    keys: Vec<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a comma-joined field value. An empty value is an empty set.
    ///
    /// Repeated keys keep their first position; empty entries are skipped.
    pub fn seeded(value: &str) -> Self {
        let mut set = Self::new();
        for key in value.split(',').filter(|key| !key.is_empty()) {
            if !set.contains(key) {
                set.keys.push(key.to_string());
            }
        }
        set
    }

    /// Remove `key` if present, otherwise append it.
    ///
    /// Returns whether the key is selected afterwards.
    pub fn toggle(&mut self, key: &str) -> bool {
        match self.keys.iter().position(|k| k == key) {
            Some(idx) => {
                self.keys.remove(idx);
                false
            }
            None => {
                self.keys.push(key.to_string());
                true
            }
        }
    }

    /// Keys joined by commas; empty set yields an empty string.
    pub fn current_value(&self) -> String {
        self.keys.join(",")
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
