use serde::Serialize;
use serde::ser::SerializeMap;

/// Arguments bound for one dispatch.
///
/// # Behavior
/// Entries keep insertion order: placeholder values come first in the
/// left-to-right order of the route pattern, followed by query-string values
/// whose names were not already bound by the path. A query name given more
/// than once carries its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn bind(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Merges query-string pairs into the bound arguments.
    ///
    /// # Behavior
    /// Names bound before the call are authoritative and keep their value.
    /// Among the merged pairs a repeated name keeps its first position but
    /// takes the last value, the way a query string decodes into a map.
    pub fn merge_query<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let bound = self.entries.len();
        for (name, value) in pairs {
            let name = name.into();
            if self.entries[..bound].iter().any(|(key, _)| *key == name) {
                log::trace!("Ignoring argument '{name}', already bound");
                continue;
            }
            match self.entries[bound..].iter_mut().find(|(key, _)| *key == name) {
                Some(entry) => entry.1 = value.into(),
                None => self.entries.push((name, value.into())),
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(key, _)| key == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Params::new();
        params.merge_query(iter);
        params
    }
}

impl Serialize for Params {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
