//! In-memory bucket backend.

use std::collections::BTreeMap;
use std::io::Cursor;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::core::{Bucket, BucketError, ListPage, ObjectAttrs, ObjectReader};

/// Stored object: attributes plus body.
#[derive(Debug, Clone)]
struct StoredObject {
    attrs: ObjectAttrs,
    body: Vec<u8>,
}

/// Bucket held in a sorted map, for development and testing.
///
/// Page tokens are the name of the last object on the previous page.
pub struct InMemoryBucket {
    name: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl InMemoryBucket {
    /// Create an empty bucket.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert or replace an object.
    pub fn insert(
        &self,
        name: impl Into<String>,
        content_type: impl Into<String>,
        updated: DateTime<Utc>,
        body: impl Into<Vec<u8>>,
    ) {
        let name = name.into();
        let body = body.into();
        let attrs = ObjectAttrs::new(name.clone(), content_type, updated, body.len() as u64);
        self.objects.write().insert(name, StoredObject { attrs, body });
    }

    /// Remove an object, returning whether it existed.
    pub fn remove(&self, name: &str) -> bool {
        self.objects.write().remove(name).is_some()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the bucket holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl Bucket for InMemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_page(
        &self,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage, BucketError> {
        if page_size == 0 {
            return Err(BucketError::Listing("page size must be greater than 0".into()));
        }

        let objects = self.objects.read();
        let mut remaining = objects
            .iter()
            .filter(|(name, _)| page_token.map_or(true, |token| name.as_str() > token))
            .map(|(_, stored)| stored.attrs.clone());

        let page: Vec<ObjectAttrs> = remaining.by_ref().take(page_size).collect();
        let next_page_token = if remaining.next().is_some() {
            page.last().map(|attrs| attrs.name.clone())
        } else {
            None
        };

        Ok(ListPage {
            objects: page,
            next_page_token,
        })
    }

    async fn attrs(&self, name: &str) -> Result<ObjectAttrs, BucketError> {
        self.objects
            .read()
            .get(name)
            .map(|stored| stored.attrs.clone())
            .ok_or_else(|| BucketError::NotFound(name.to_string()))
    }

    async fn open(&self, name: &str) -> Result<ObjectReader, BucketError> {
        let body = self
            .objects
            .read()
            .get(name)
            .map(|stored| stored.body.clone())
            .ok_or_else(|| BucketError::NotFound(name.to_string()))?;
        Ok(Box::new(Cursor::new(body)))
    }
}
