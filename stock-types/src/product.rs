use crate::{BackorderMode, StockStatus};
use serde::{Deserialize, Serialize};

/// Catalog post id. Stable for the life of the product, assigned by the
/// catalog store, never by this service.
pub type ProductId = i64;

/// Stock-relevant projection of a catalog product. The catalog owns the
/// record lifecycle; this service only edits the stock fields and may move
/// a product to trash.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Merchant-assigned product code, not guaranteed unique.
    pub sku: Option<String>,
    /// None means quantity is not tracked for this product.
    pub stock_qty: Option<i64>,
    pub stock_status: StockStatus,
    pub backorders: BackorderMode,
    /// Soft-deleted products stay in the store but drop out of listings.
    #[serde(default)]
    pub trashed: bool,
}

impl Product {
    pub fn new<S: Into<String>>(id: ProductId, name: S) -> Self {
        Product {
            id,
            name: name.into(),
            sku: None,
            stock_qty: None,
            stock_status: StockStatus::InStock,
            backorders: BackorderMode::Disallow,
            trashed: false,
        }
    }

    pub fn with_sku<S: Into<String>>(mut self, sku: S) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn with_qty(mut self, qty: i64) -> Self {
        self.stock_qty = Some(qty);
        self
    }

    pub fn with_status(mut self, status: StockStatus) -> Self {
        self.stock_status = status;
        self
    }

    pub fn with_backorders(mut self, mode: BackorderMode) -> Self {
        self.backorders = mode;
        self
    }
}
