use anyhow::Context;
use async_trait::async_trait;
use stock_types::{BackorderMode, Product, ProductId, StockStatus};
use time::OffsetDateTime;
use tokio_rusqlite::Connection;

/// Accessor for the product catalog. All stock mutation and persistence
/// goes through here; the components above it never touch the store
/// directly. Trashed products are invisible through `get` and `list`.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn get(&self, id: ProductId) -> anyhow::Result<Option<Product>>;
    async fn list(&self) -> anyhow::Result<Vec<Product>>;
    /// Upsert by id. Editing paths only ever save products they loaded
    /// first, so this never creates records on their behalf.
    async fn save(&self, product: Product) -> anyhow::Result<()>;
    /// Moves a product to the recoverable trash state. Returns false when
    /// no live product with this id existed.
    async fn soft_delete(&self, id: ProductId) -> anyhow::Result<bool>;
}

pub struct SqliteCatalogRepository {
    conn: Connection,
}

impl SqliteCatalogRepository {
    pub async fn init(conn: Connection) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            let _ = conn.pragma_update(None, "journal_mode", &"WAL");
            let _ = conn.pragma_update(None, "synchronous", &"NORMAL");
            let _ = conn.pragma_update(None, "busy_timeout", &5000i64);
            conn.execute(
                "CREATE TABLE IF NOT EXISTS product (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    sku TEXT,
                    stock_qty INTEGER,
                    stock_status TEXT NOT NULL DEFAULT 'instock',
                    backorders TEXT NOT NULL DEFAULT 'no',
                    trashed INTEGER NOT NULL DEFAULT 0,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                )",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

const PRODUCT_COLUMNS: &str = "id, name, sku, stock_qty, stock_status, backorders, trashed";

fn read_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    let id: ProductId = row.get(0)?;
    let name: String = row.get(1)?;
    let sku: Option<String> = row.get(2)?;
    let stock_qty: Option<i64> = row.get(3)?;
    let stock_status: String = row.get(4)?;
    let backorders: String = row.get(5)?;
    let trashed: i64 = row.get(6)?;
    Ok(Product {
        id,
        name,
        sku: sku.filter(|s| !s.trim().is_empty()),
        stock_qty,
        stock_status: StockStatus::try_from_str(&stock_status).unwrap_or(StockStatus::OutOfStock),
        backorders: BackorderMode::try_from_str(&backorders).unwrap_or(BackorderMode::Disallow),
        trashed: trashed != 0,
    })
}

#[async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    async fn get(&self, id: ProductId) -> anyhow::Result<Option<Product>> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ?1 AND trashed = 0"
                ))?;
                let mut rows = stmt.query([id])?;
                let product = match rows.next()? {
                    Some(row) => Some(read_product(row)?),
                    None => None,
                };
                Ok(product)
            })
            .await
            .context("Unable to load product")
    }

    async fn list(&self) -> anyhow::Result<Vec<Product>> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM product WHERE trashed = 0 ORDER BY id"
                ))?;
                let items = stmt
                    .query_map([], read_product)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await
            .context("Unable to list products")
    }

    async fn save(&self, product: Product) -> anyhow::Result<()> {
        self.conn
            .call(move |conn| {
                let now = OffsetDateTime::now_utc().unix_timestamp();
                conn.execute(
                    "INSERT INTO product (id, name, sku, stock_qty, stock_status, backorders, trashed, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                     ON CONFLICT(id) DO UPDATE SET
                        name = excluded.name,
                        sku = excluded.sku,
                        stock_qty = excluded.stock_qty,
                        stock_status = excluded.stock_status,
                        backorders = excluded.backorders,
                        trashed = excluded.trashed,
                        updated_at = excluded.updated_at",
                    rusqlite::params![
                        product.id,
                        product.name,
                        product.sku,
                        product.stock_qty,
                        product.stock_status.as_str(),
                        product.backorders.as_str(),
                        product.trashed as i64,
                        now,
                    ],
                )?;
                Ok(())
            })
            .await
            .context("Unable to save product")
    }

    async fn soft_delete(&self, id: ProductId) -> anyhow::Result<bool> {
        self.conn
            .call(move |conn| {
                let now = OffsetDateTime::now_utc().unix_timestamp();
                let affected = conn.execute(
                    "UPDATE product SET trashed = 1, updated_at = ?2 WHERE id = ?1 AND trashed = 0",
                    rusqlite::params![id, now],
                )?;
                Ok(affected > 0)
            })
            .await
            .context("Unable to trash product")
    }
}
