//! Resource collection API.

use std::marker::PhantomData;

use crate::client::CampusClient;
use crate::error::Result;
use crate::types::{ListQuery, Page, Resource};

/// CRUD client for one resource collection.
pub struct ResourceApi<T: Resource> {
    client: CampusClient,
    _resource: PhantomData<fn() -> T>,
}

impl<T: Resource> ResourceApi<T> {
    pub(crate) fn new(client: CampusClient) -> Self {
        Self {
            client,
            _resource: PhantomData,
        }
    }

    fn item_path(id: &str) -> String {
        format!("{}/{}", T::PATH, id)
    }

    /// List the first page.
    pub async fn list(&self) -> Result<Page<T>> {
        self.client.get(T::PATH).await
    }

    /// List with pagination and search.
    pub async fn list_with_query(&self, query: &ListQuery) -> Result<Page<T>> {
        self.client.get_with_query(T::PATH, query).await
    }

    /// Get a record by ID.
    pub async fn get(&self, id: &str) -> Result<T> {
        self.client.get(&Self::item_path(id)).await
    }

    /// Create a record.
    pub async fn create<B: serde::Serialize + ?Sized>(&self, body: &B) -> Result<T> {
        self.client.post(T::PATH, body).await
    }

    /// Update a record with the given fields.
    pub async fn update<B: serde::Serialize + ?Sized>(&self, id: &str, body: &B) -> Result<T> {
        self.client.patch(&Self::item_path(id), body).await
    }

    /// Delete a record.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.client.delete(&Self::item_path(id)).await
    }
}
