//! Bundles the per-kind sync services over shared collaborators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{
    CatalogRemoteTrait, CatalogStoreTrait, CatalogSyncService, InMemoryCatalogStore,
    SessionProvider,
};
use crate::catalog::{Category, Product, Profile};

/// One cache store per record kind.
#[derive(Clone)]
pub struct CatalogStores {
    pub profiles: Arc<dyn CatalogStoreTrait<Profile>>,
    pub categories: Arc<dyn CatalogStoreTrait<Category>>,
    pub products: Arc<dyn CatalogStoreTrait<Product>>,
}

impl CatalogStores {
    pub fn in_memory() -> Self {
        Self {
            profiles: Arc::new(InMemoryCatalogStore::<Profile>::new()),
            categories: Arc::new(InMemoryCatalogStore::<Category>::new()),
            products: Arc::new(InMemoryCatalogStore::<Product>::new()),
        }
    }
}

/// Entry point for consumers: profile, category and per-category product services.
pub struct CatalogSync {
    profiles: CatalogSyncService<Profile>,
    categories: CatalogSyncService<Category>,
    product_remote: Arc<dyn CatalogRemoteTrait<Product>>,
    product_store: Arc<dyn CatalogStoreTrait<Product>>,
    session: Arc<dyn SessionProvider>,
    // One service per category so refreshes of the same category share a reconcile lock.
    product_services: Mutex<HashMap<String, CatalogSyncService<Product>>>,
}

impl CatalogSync {
    pub fn new<C>(remote: Arc<C>, stores: CatalogStores, session: Arc<dyn SessionProvider>) -> Self
    where
        C: CatalogRemoteTrait<Profile>
            + CatalogRemoteTrait<Category>
            + CatalogRemoteTrait<Product>
            + 'static,
    {
        let profile_remote: Arc<dyn CatalogRemoteTrait<Profile>> = remote.clone();
        let category_remote: Arc<dyn CatalogRemoteTrait<Category>> = remote.clone();
        let product_remote: Arc<dyn CatalogRemoteTrait<Product>> = remote;

        Self {
            profiles: CatalogSyncService::new(profile_remote, stores.profiles, session.clone()),
            categories: CatalogSyncService::new(
                category_remote,
                stores.categories,
                session.clone(),
            ),
            product_remote,
            product_store: stores.products,
            session,
            product_services: Mutex::new(HashMap::new()),
        }
    }

    pub fn profiles(&self) -> &CatalogSyncService<Profile> {
        &self.profiles
    }

    pub fn categories(&self) -> &CatalogSyncService<Category> {
        &self.categories
    }

    /// Product service for one category.
    pub fn products(&self, category_id: &str) -> CatalogSyncService<Product> {
        let mut services = self
            .product_services
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        services
            .entry(category_id.to_string())
            .or_insert_with(|| {
                CatalogSyncService::scoped(
                    self.product_remote.clone(),
                    self.product_store.clone(),
                    self.session.clone(),
                    Some(category_id.to_string()),
                )
            })
            .clone()
    }
}
