//! Process-wide table of loaded descriptor sets, keyed by caller handle.
//!
//! Readers take an `Arc` snapshot once per call; a concurrent delete only
//! drops the table's reference.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use protosql_descriptor::DescriptorIndex;
use tracing::debug;

use crate::error::{Error, ErrorKind, Result};

#[derive(Debug, Default)]
pub struct Registry {
    sets: RwLock<HashMap<String, Arc<DescriptorIndex>>>,
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry behind the free functions in [`crate::api`].
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::new)
    }

    /// Indexes a binary `FileDescriptorSet` under `handle`.
    pub fn load(&self, handle: &str, bytes: &[u8]) -> Result<Arc<DescriptorIndex>> {
        // Index outside the lock; it is the expensive part.
        let index = DescriptorIndex::decode(bytes)?;
        self.insert(handle, index)
    }

    pub fn insert(&self, handle: &str, index: DescriptorIndex) -> Result<Arc<DescriptorIndex>> {
        let mut sets = self.sets.write();
        if sets.contains_key(handle) {
            return Err(Error::new(
                ErrorKind::DuplicateHandle,
                format!("descriptor set `{handle}` is already loaded"),
            ));
        }
        let index = Arc::new(index);
        debug!(
            handle,
            files = index.files().len(),
            messages = index.messages().len(),
            "descriptor set loaded"
        );
        sets.insert(handle.to_string(), Arc::clone(&index));
        Ok(index)
    }

    pub fn delete(&self, handle: &str) -> Result<()> {
        match self.sets.write().remove(handle) {
            Some(_) => {
                debug!(handle, "descriptor set deleted");
                Ok(())
            }
            None => Err(no_such_handle(handle)),
        }
    }

    pub fn get(&self, handle: &str) -> Result<Arc<DescriptorIndex>> {
        self.sets
            .read()
            .get(handle)
            .cloned()
            .ok_or_else(|| no_such_handle(handle))
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.sets.read().contains_key(handle)
    }

    /// Loaded handles, sorted.
    pub fn handles(&self) -> Vec<String> {
        let mut handles: Vec<String> = self.sets.read().keys().cloned().collect();
        handles.sort();
        handles
    }
}

fn no_such_handle(handle: &str) -> Error {
    Error::new(
        ErrorKind::NoSuchHandle,
        format!("no descriptor set loaded as `{handle}`"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use protosql_descriptor::builder::{descriptor_set, FileBuilder, MessageBuilder};
    use prost::Message;
    use prost_types::field_descriptor_proto::Type;

    fn set_bytes() -> Vec<u8> {
        let file = FileBuilder::new("t.proto", "t")
            .message(MessageBuilder::new("Test").field("value", 1, Type::Int32))
            .build();
        descriptor_set(vec![file]).encode_to_vec()
    }

    #[test]
    fn load_get_delete() {
        let registry = Registry::new();
        registry.load("v1", &set_bytes()).unwrap();
        assert!(registry.get("v1").unwrap().message("t.Test").is_some());

        let err = registry.load("v1", &set_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateHandle);

        registry.delete("v1").unwrap();
        assert_eq!(registry.get("v1").unwrap_err().kind(), ErrorKind::NoSuchHandle);
        assert_eq!(registry.delete("v1").unwrap_err().kind(), ErrorKind::NoSuchHandle);
    }

    #[test]
    fn snapshots_outlive_delete() {
        let registry = Registry::new();
        registry.load("v1", &set_bytes()).unwrap();
        let snapshot = registry.get("v1").unwrap();
        registry.delete("v1").unwrap();
        assert!(snapshot.message("t.Test").is_some());
        assert!(registry.handles().is_empty());
    }
}
