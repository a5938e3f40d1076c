//! Per-client cache of type schemas.

use std::sync::Arc;

use ahash::AHashMap;

use crate::schema::TypeSchema;

/// Type schemas keyed by sObject type name.
///
/// Entries are added explicitly and stay until [`flush`](Self::flush); there
/// is no eviction.
#[derive(Debug, Clone, Default)]
pub struct SchemaCache {
    entries: AHashMap<String, Arc<TypeSchema>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<TypeSchema>> {
        self.entries.get(type_name).cloned()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    /// Cache `schema` under `type_name`, replacing any previous entry
    pub fn insert<S: Into<String>>(&mut self, type_name: S, schema: TypeSchema) -> Arc<TypeSchema> {
        let schema = Arc::new(schema);
        self.entries.insert(type_name.into(), Arc::clone(&schema));
        schema
    }

    /// Names in `types` that are not cached yet, deduplicated, in first-seen order
    pub fn missing<'a, I>(&self, types: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out: Vec<String> = Vec::new();
        for t in types {
            if !self.contains(t) && !out.iter().any(|m| m == t) {
                out.push(t.to_string());
            }
        }
        out
    }

    /// Drop every entry
    pub fn flush(&mut self) {
        log::debug!("flushing {} cached type schema(s)", self.entries.len());
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;

    #[test]
    fn test_insert_get_flush() {
        let mut cache = SchemaCache::new();
        assert!(cache.get("Account").is_none());

        cache.insert("Account", TypeSchema::new("Account").with_field(FieldSchema::new("Name", "string")));
        assert_eq!(cache.get("Account").map(|s| s.len()), Some(1));
        assert_eq!(cache.len(), 1);

        cache.flush();
        assert!(cache.is_empty());
        assert!(cache.get("Account").is_none());
    }

    #[test]
    fn test_missing() {
        let mut cache = SchemaCache::new();
        cache.insert("Account", TypeSchema::new("Account"));
        assert_eq!(
            cache.missing(["Account", "Contact", "Contact", "Lead"]),
            vec!["Contact".to_string(), "Lead".to_string()]
        );
    }

    #[test]
    fn test_handle_survives_flush() {
        let mut cache = SchemaCache::new();
        let schema = cache.insert("Lead", TypeSchema::new("Lead"));
        cache.flush();
        assert_eq!(schema.name, "Lead");
    }
}
