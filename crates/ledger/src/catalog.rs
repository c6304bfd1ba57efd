//! Outbound catalog interface: product/program lookup by product code and
//! facility lookup by id.
//!
//! The catalog is owned elsewhere in the system; the ledger consumes it
//! through this narrow trait. [`StaticCatalog`] is the in-process
//! implementation used by tests and seeding tools, [`CachedCatalog`] wraps any
//! implementation with a read-through cache so repeated code lookups across
//! batches stay cheap.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use thiserror::Error;

use stockbridge_core::{FacilityId, ProductCode};

use crate::models::{CatalogProduct, Facility};

/// Errors surfaced by catalog lookups.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The backing catalog could not answer the lookup.
    #[error("catalog lookup failed: {0}")]
    Lookup(String),
}

/// Product and facility lookup, keyed the way clients report movements.
#[async_trait]
pub trait Catalog: Send + Sync + 'static {
    /// Resolve a product by its client-facing code.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the backing catalog cannot be reached.
    async fn product_by_code(
        &self,
        code: &ProductCode,
    ) -> Result<Option<CatalogProduct>, CatalogError>;

    /// Resolve a facility by id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the backing catalog cannot be reached.
    async fn facility_by_id(&self, id: FacilityId) -> Result<Option<Facility>, CatalogError>;
}

// =============================================================================
// Static catalog
// =============================================================================

/// A fixed in-process catalog.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    products: HashMap<ProductCode, CatalogProduct>,
    facilities: HashMap<FacilityId, Facility>,
}

impl StaticCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a product, keyed by its code.
    #[must_use]
    pub fn with_product(mut self, product: CatalogProduct) -> Self {
        self.products.insert(product.code.clone(), product);
        self
    }

    /// Add a facility, keyed by its id.
    #[must_use]
    pub fn with_facility(mut self, facility: Facility) -> Self {
        self.facilities.insert(facility.id, facility);
        self
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn product_by_code(
        &self,
        code: &ProductCode,
    ) -> Result<Option<CatalogProduct>, CatalogError> {
        Ok(self.products.get(code).cloned())
    }

    async fn facility_by_id(&self, id: FacilityId) -> Result<Option<Facility>, CatalogError> {
        Ok(self.facilities.get(&id).cloned())
    }
}

// =============================================================================
// Cached catalog
// =============================================================================

/// Read-through cache over another [`Catalog`] implementation.
///
/// Negative results are cached too; the TTL bounds how long a newly
/// registered product stays invisible.
pub struct CachedCatalog<C> {
    inner: Arc<C>,
    products: Cache<ProductCode, Option<CatalogProduct>>,
    facilities: Cache<FacilityId, Option<Facility>>,
}

impl<C: Catalog> CachedCatalog<C> {
    /// Wrap `inner` with caches bounded by `capacity` entries and `ttl`.
    #[must_use]
    pub fn new(inner: Arc<C>, capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            products: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            facilities: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }
}

#[async_trait]
impl<C: Catalog> Catalog for CachedCatalog<C> {
    async fn product_by_code(
        &self,
        code: &ProductCode,
    ) -> Result<Option<CatalogProduct>, CatalogError> {
        let inner = Arc::clone(&self.inner);
        let key = code.clone();
        self.products
            .try_get_with(code.clone(), async move { inner.product_by_code(&key).await })
            .await
            .map_err(|e| CatalogError::Lookup(e.to_string()))
    }

    async fn facility_by_id(&self, id: FacilityId) -> Result<Option<Facility>, CatalogError> {
        let inner = Arc::clone(&self.inner);
        self.facilities
            .try_get_with(id, async move { inner.facility_by_id(id).await })
            .await
            .map_err(|e| CatalogError::Lookup(e.to_string()))
    }
}
