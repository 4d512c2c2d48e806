use crate::catalog::CatalogRepository;
use serde::Serialize;
use std::collections::HashSet;
use stock_types::{BackorderMode, Product, ProductId, StockStatus};

/// The fixed set of stock mutations the list page offers. Each one is a
/// plain field assignment, so re-applying an action is a no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BulkAction {
    MarkInStock,
    MarkOutOfStock,
    AllowBackorders,
    AllowBackordersNotify,
    DisallowBackorders,
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::MarkInStock => "mark_in_stock",
            BulkAction::MarkOutOfStock => "mark_out_of_stock",
            BulkAction::AllowBackorders => "allow_backorders",
            BulkAction::AllowBackordersNotify => "allow_backorders_notify",
            BulkAction::DisallowBackorders => "disallow_backorders",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BulkAction::MarkInStock => "Mark \u{201c}In Stock\u{201d}",
            BulkAction::MarkOutOfStock => "Mark \u{201c}Out of Stock\u{201d}",
            BulkAction::AllowBackorders => "Allow backorders",
            BulkAction::AllowBackordersNotify => "Allow backorders (notify customer)",
            BulkAction::DisallowBackorders => "Do not allow backorders",
        }
    }

    pub fn try_from_str<S: AsRef<str>>(input: S) -> Option<Self> {
        match input.as_ref().trim().to_lowercase().as_str() {
            "mark_in_stock" => Some(BulkAction::MarkInStock),
            "mark_out_of_stock" => Some(BulkAction::MarkOutOfStock),
            "allow_backorders" => Some(BulkAction::AllowBackorders),
            "allow_backorders_notify" => Some(BulkAction::AllowBackordersNotify),
            "disallow_backorders" => Some(BulkAction::DisallowBackorders),
            _ => None,
        }
    }

    pub fn all() -> [BulkAction; 5] {
        [
            BulkAction::MarkInStock,
            BulkAction::MarkOutOfStock,
            BulkAction::AllowBackorders,
            BulkAction::AllowBackordersNotify,
            BulkAction::DisallowBackorders,
        ]
    }

    pub fn apply_to(&self, product: &mut Product) {
        match self {
            BulkAction::MarkInStock => product.stock_status = StockStatus::InStock,
            BulkAction::MarkOutOfStock => product.stock_status = StockStatus::OutOfStock,
            BulkAction::AllowBackorders => product.backorders = BackorderMode::Allow,
            BulkAction::AllowBackordersNotify => product.backorders = BackorderMode::AllowNotify,
            BulkAction::DisallowBackorders => product.backorders = BackorderMode::Disallow,
        }
    }
}

/// Per-batch outcome. Ids absent from the catalog are skipped; ids whose
/// save failed are listed so the caller can surface them instead of
/// reporting a bare count.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct BatchResult {
    pub applied: usize,
    pub skipped: Vec<ProductId>,
    pub failed: Vec<ProductId>,
}

/// Applies `action` to every selected product, one by one. There is no
/// batch transaction: a failure partway leaves earlier items mutated and
/// the loop keeps going, so the result always covers the whole selection.
pub async fn apply(
    repo: &dyn CatalogRepository,
    action: BulkAction,
    ids: &[ProductId],
) -> BatchResult {
    let mut result = BatchResult::default();
    let mut seen = HashSet::new();
    for &id in ids {
        if !seen.insert(id) {
            continue;
        }
        let product = match repo.get(id).await {
            Ok(Some(product)) => product,
            Ok(None) => {
                result.skipped.push(id);
                continue;
            }
            Err(err) => {
                log::warn!("Bulk {}: unable to load product {id}: {err}", action.as_str());
                result.failed.push(id);
                continue;
            }
        };
        let mut product = product;
        action.apply_to(&mut product);
        match repo.save(product).await {
            Ok(()) => result.applied += 1,
            Err(err) => {
                log::warn!("Bulk {}: unable to save product {id}: {err}", action.as_str());
                result.failed.push(id);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::{apply, BulkAction, CatalogRepository};
    use crate::catalog::SqliteCatalogRepository;
    use stock_types::{BackorderMode, Product, StockStatus};
    use tokio_rusqlite::Connection;

    #[test]
    fn action_names_roundtrip() {
        for action in BulkAction::all() {
            assert_eq!(BulkAction::try_from_str(action.as_str()), Some(action));
        }
        assert_eq!(BulkAction::try_from_str("explode"), None);
    }

    #[test]
    fn apply_to_is_an_assignment() {
        let mut product = Product::new(1, "Widget").with_qty(4);
        BulkAction::AllowBackordersNotify.apply_to(&mut product);
        assert_eq!(product.backorders, BackorderMode::AllowNotify);
        let snapshot = product.clone();
        BulkAction::AllowBackordersNotify.apply_to(&mut product);
        assert_eq!(product, snapshot);
    }

    async fn seeded_repo() -> SqliteCatalogRepository {
        let conn = Connection::open_in_memory()
            .await
            .expect("in-memory connection");
        let repo = SqliteCatalogRepository::init(conn).await.expect("init");
        repo.save(Product::new(1, "Widget").with_qty(4))
            .await
            .expect("seed");
        repo.save(Product::new(2, "Gadget").with_qty(0))
            .await
            .expect("seed");
        repo
    }

    #[tokio::test]
    async fn missing_ids_are_skipped_not_fatal() {
        let repo = seeded_repo().await;
        let result = apply(&repo, BulkAction::MarkOutOfStock, &[1, 2, 99]).await;
        assert_eq!(result.applied, 2);
        assert_eq!(result.skipped, vec![99]);
        assert!(result.failed.is_empty());

        for id in [1, 2] {
            let product = repo.get(id).await.expect("get").expect("present");
            assert_eq!(product.stock_status, StockStatus::OutOfStock);
        }
    }

    #[tokio::test]
    async fn duplicate_ids_count_once() {
        let repo = seeded_repo().await;
        let result = apply(&repo, BulkAction::MarkInStock, &[1, 1, 1]).await;
        assert_eq!(result.applied, 1);
    }

    #[tokio::test]
    async fn reapplying_an_action_reaches_the_same_state() {
        let repo = seeded_repo().await;
        apply(&repo, BulkAction::AllowBackorders, &[1, 2]).await;
        let first: Vec<_> = repo.list().await.expect("list");
        let result = apply(&repo, BulkAction::AllowBackorders, &[1, 2]).await;
        assert_eq!(result.applied, 2);
        assert_eq!(repo.list().await.expect("list"), first);
        assert!(first.iter().all(|p| p.backorders == BackorderMode::Allow));
    }

    #[tokio::test]
    async fn trashed_products_are_skipped() {
        let repo = seeded_repo().await;
        repo.soft_delete(2).await.expect("trash");
        let result = apply(&repo, BulkAction::MarkInStock, &[1, 2]).await;
        assert_eq!(result.applied, 1);
        assert_eq!(result.skipped, vec![2]);
    }
}
