use fnv::FnvHasher;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Typed values attached to a request by middleware for later stages.
///
/// # Behavior
/// Values are stored under a composite key made of the string key and the
/// `TypeId` of the value, so the same string key can hold values of different
/// types. Values are reference counted, which keeps cloning a request cheap.
#[derive(Clone, Default)]
pub struct Attachments {
    attachments: HashMap<AttachmentKey, Arc<dyn Any + Send + Sync>, fnv::FnvBuildHasher>,
}

impl Attachments {
    /// Creates a new empty attachments collection.
    pub fn new() -> Self {
        Self {
            attachments: HashMap::with_hasher(fnv::FnvBuildHasher::default()),
        }
    }

    /// Adds a typed value to the collection.
    ///
    /// # Behavior
    /// A previous value stored with the same key and type is replaced.
    ///
    /// # Examples
    /// ```rust
    /// use routeline::message::Attachments;
    ///
    /// let mut attachments = Attachments::new();
    /// attachments.add("user_id", 123u32);
    /// attachments.add("user_id", "alice".to_string());
    /// assert_eq!(attachments.get::<u32>("user_id"), Some(&123));
    /// ```
    pub fn add<K>(&mut self, key: impl AsRef<str>, value: K)
    where
        K: Send + Sync + 'static,
    {
        let type_id = TypeId::of::<K>();
        self.attachments
            .insert(AttachmentKey::new(key, type_id), Arc::new(value));
    }

    /// Retrieves a reference to a typed value.
    ///
    /// # Returns
    /// `None` unless both the key exists and the stored value has type `K`.
    pub fn get<K>(&self, key: impl AsRef<str>) -> Option<&K>
    where
        K: Send + Sync + 'static,
    {
        let type_id = TypeId::of::<K>();
        self.attachments
            .get(&AttachmentKey::new(key, type_id))
            .and_then(|value| value.downcast_ref::<K>())
    }

    pub fn contains<K>(&self, key: impl AsRef<str>) -> bool
    where
        K: Send + Sync + 'static,
    {
        self.get::<K>(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.attachments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }
}

impl std::fmt::Debug for Attachments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachments")
            .field("len", &self.attachments.len())
            .finish()
    }
}

#[derive(Clone, PartialOrd, PartialEq, Hash, Eq)]
struct AttachmentKey {
    key_hash: u64,
    type_hash: u64,
}

impl AttachmentKey {
    fn new(key: impl AsRef<str>, type_id: TypeId) -> Self {
        let key = key.as_ref();
        let mut key_hasher = FnvHasher::default();
        key.hash(&mut key_hasher);
        let key_hash = key_hasher.finish();

        let mut type_hasher = FnvHasher::default();
        type_id.hash(&mut type_hasher);
        let type_hash = type_hasher.finish();

        Self {
            key_hash,
            type_hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestStruct;

    #[test]
    fn test_attachments() {
        let mut attachments = Attachments::new();
        attachments.add::<u64>("test_key1", 1);
        attachments.add::<String>("test_key2", String::from("test"));
        attachments.add::<bool>("test_key3", true);
        attachments.add::<TestStruct>("test_key4", TestStruct);

        assert!(attachments.get::<u64>("test_key1").is_some());
        assert!(attachments.get::<String>("test_key2").is_some());
        assert!(attachments.get::<bool>("test_key3").is_some());
        assert!(attachments.get::<TestStruct>("test_key4").is_some());
        assert_eq!(attachments.len(), 4);
    }

    #[test]
    fn test_attachment_type_mismatch() {
        let mut attachments = Attachments::new();
        attachments.add::<u64>("count", 7);
        assert!(attachments.get::<u32>("count").is_none());
        assert!(!attachments.contains::<String>("count"));
        assert_eq!(attachments.get::<u64>("count"), Some(&7));
    }

    #[test]
    fn test_cloned_attachments_share_values() {
        let mut attachments = Attachments::new();
        attachments.add("name", String::from("shared"));
        let cloned = attachments.clone();
        attachments.add("name", String::from("replaced"));
        assert_eq!(cloned.get::<String>("name").map(String::as_str), Some("shared"));
        assert_eq!(attachments.get::<String>("name").map(String::as_str), Some("replaced"));
    }
}
