//! Product and lot code value types.
//!
//! Codes are the client-facing natural keys: mobile clients report movements
//! by product code and lot code, never by server-side IDs.

use serde::{Deserialize, Serialize};

/// A product code as printed on packaging and reported by clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
pub struct ProductCode(String);

impl ProductCode {
    /// Create a product code from a string.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Get the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProductCode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

impl From<String> for ProductCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

/// A lot code identifying one manufactured lot of a product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
pub struct LotCode(String);

impl LotCode {
    /// Create a lot code from a string.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Get the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LotCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LotCode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

impl From<String> for LotCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

/// The natural key for lot-level operations: a product code plus an optional
/// lot code.
///
/// `lot_code` is `None` for kit/no-lot products, which are tracked at the
/// product level only. The pair is immutable and hashable so it can key the
/// per-batch lookup caches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductLotCode {
    /// Product code.
    pub product_code: ProductCode,
    /// Lot code, absent for no-lot products.
    pub lot_code: Option<LotCode>,
}

impl ProductLotCode {
    /// Create a lot-level key.
    #[must_use]
    pub fn with_lot(product_code: impl Into<ProductCode>, lot_code: impl Into<LotCode>) -> Self {
        Self {
            product_code: product_code.into(),
            lot_code: Some(lot_code.into()),
        }
    }

    /// Create the product-scoped sentinel key for a no-lot product.
    #[must_use]
    pub fn no_lot(product_code: impl Into<ProductCode>) -> Self {
        Self {
            product_code: product_code.into(),
            lot_code: None,
        }
    }

    /// Whether this key is the no-lot sentinel.
    #[must_use]
    pub const fn is_no_lot(&self) -> bool {
        self.lot_code.is_none()
    }
}

impl std::fmt::Display for ProductLotCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.lot_code {
            Some(lot) => write!(f, "{}/{lot}", self.product_code),
            None => write!(f, "{}", self.product_code),
        }
    }
}
