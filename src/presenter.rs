use crate::bulk::BulkAction;
use crate::catalog::CatalogRepository;
use crate::query::{self, FilterCriteria, PageRequest, QueryPage, SortColumn, SortSpec};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use stock_types::Product;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct ColumnSpec {
    pub key: &'static str,
    pub label: &'static str,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct BulkActionSpec {
    pub key: &'static str,
    pub label: &'static str,
}

/// One rendered list row. Formatting (fallback labels, edit link) lives
/// here so the HTTP layer ships data any front end can display.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub sku: String,
    pub stock_qty: String,
    pub stock_status: String,
    pub edit_url: String,
}

/// Capability interface for the stock list table, decoupled from any
/// rendering framework: a caller can lay out columns, offer the bulk
/// action menu, and page through rows with nothing but this trait.
#[async_trait]
pub trait ListPresenter: Send + Sync {
    fn columns(&self) -> Vec<ColumnSpec>;
    fn sortable_columns(&self) -> Vec<&'static str>;
    fn bulk_actions(&self) -> Vec<BulkActionSpec>;
    async fn fetch_page(
        &self,
        filter: &FilterCriteria,
        sort: &SortSpec,
        page: &PageRequest,
    ) -> anyhow::Result<QueryPage>;
    fn render_row(&self, product: &Product) -> ProductRow;
}

pub struct StockListPresenter {
    repo: Arc<dyn CatalogRepository>,
}

impl StockListPresenter {
    pub fn new(repo: Arc<dyn CatalogRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ListPresenter for StockListPresenter {
    fn columns(&self) -> Vec<ColumnSpec> {
        vec![
            ColumnSpec { key: "name", label: "Name" },
            ColumnSpec { key: "sku", label: "SKU" },
            ColumnSpec { key: "stock_qty", label: "Stock Quantity" },
            ColumnSpec { key: "stock_status", label: "Stock Status" },
            ColumnSpec { key: "actions", label: "Actions" },
        ]
    }

    fn sortable_columns(&self) -> Vec<&'static str> {
        vec![
            SortColumn::Name.as_str(),
            SortColumn::Sku.as_str(),
            SortColumn::StockQty.as_str(),
        ]
    }

    fn bulk_actions(&self) -> Vec<BulkActionSpec> {
        BulkAction::all()
            .into_iter()
            .map(|action| BulkActionSpec {
                key: action.as_str(),
                label: action.label(),
            })
            .collect()
    }

    async fn fetch_page(
        &self,
        filter: &FilterCriteria,
        sort: &SortSpec,
        page: &PageRequest,
    ) -> anyhow::Result<QueryPage> {
        query::query(self.repo.as_ref(), filter, sort, page).await
    }

    fn render_row(&self, product: &Product) -> ProductRow {
        ProductRow {
            id: product.id,
            name: product.name.clone(),
            sku: product.sku.clone().unwrap_or_else(|| "N/A".to_string()),
            stock_qty: product
                .stock_qty
                .map(|q| q.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            stock_status: product.stock_status.to_string(),
            edit_url: format!("/products/{}/edit", product.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ListPresenter, StockListPresenter};
    use crate::catalog::SqliteCatalogRepository;
    use std::sync::Arc;
    use stock_types::Product;
    use tokio_rusqlite::Connection;

    async fn presenter() -> StockListPresenter {
        let conn = Connection::open_in_memory()
            .await
            .expect("in-memory connection");
        let repo = SqliteCatalogRepository::init(conn).await.expect("init");
        StockListPresenter::new(Arc::new(repo))
    }

    #[tokio::test]
    async fn rows_fall_back_to_na_for_missing_fields() {
        let presenter = presenter().await;
        let row = presenter.render_row(&Product::new(5, "Widget"));
        assert_eq!(row.sku, "N/A");
        assert_eq!(row.stock_qty, "N/A");
        assert_eq!(row.stock_status, "In Stock");
        assert_eq!(row.edit_url, "/products/5/edit");
    }

    #[tokio::test]
    async fn capability_surface_matches_the_table() {
        let presenter = presenter().await;
        let keys: Vec<_> = presenter.columns().iter().map(|c| c.key).collect();
        assert_eq!(
            keys,
            vec!["name", "sku", "stock_qty", "stock_status", "actions"]
        );
        assert_eq!(
            presenter.sortable_columns(),
            vec!["name", "sku", "stock_qty"]
        );
        assert_eq!(presenter.bulk_actions().len(), 5);
    }
}
