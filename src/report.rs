use crate::catalog::CatalogRepository;
use crate::settings::ExportColumns;
use anyhow::Context;
use serde::Serialize;
use std::io::Write;
use stock_types::{Product, StockStatus};
use time::OffsetDateTime;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ReportRow {
    pub name: String,
    pub sku: Option<String>,
    pub stock_quantity: Option<i64>,
    pub stock_status: String,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct StockSummary {
    pub total_products: usize,
    pub in_stock: usize,
    pub out_of_stock: usize,
    /// Products whose backorder mode allows purchase past zero stock.
    pub backorders: usize,
    pub products: Vec<ReportRow>,
}

/// Computes the dashboard summary from a full catalog scan. Runs
/// on-demand only, so O(n) over the catalog is acceptable.
pub fn summarize_products(products: &[Product]) -> StockSummary {
    let mut in_stock = 0;
    let mut out_of_stock = 0;
    let mut backorders = 0;
    let mut rows = Vec::with_capacity(products.len());

    for product in products {
        match product.stock_status {
            StockStatus::InStock => in_stock += 1,
            StockStatus::OutOfStock => out_of_stock += 1,
        }
        if product.backorders.allows_backorders() {
            backorders += 1;
        }
        rows.push(ReportRow {
            name: product.name.clone(),
            sku: product.sku.clone(),
            stock_quantity: product.stock_qty,
            stock_status: product.stock_status.to_string(),
        });
    }

    StockSummary {
        total_products: products.len(),
        in_stock,
        out_of_stock,
        backorders,
        products: rows,
    }
}

pub async fn summarize(repo: &dyn CatalogRepository) -> anyhow::Result<StockSummary> {
    let products = repo.list().await?;
    Ok(summarize_products(&products))
}

fn header_label(key: &str) -> &'static str {
    match key {
        "product_id" => "Product ID",
        "product_name" => "Product Name",
        "sku" => "SKU",
        "stock_qty" => "Stock Quantity",
        "stock_status" => "Stock Status",
        _ => "Backorders",
    }
}

fn enabled_columns(columns: &ExportColumns) -> Vec<&'static str> {
    let flags = [
        ("product_id", columns.product_id),
        ("product_name", columns.product_name),
        ("sku", columns.sku),
        ("stock_qty", columns.stock_qty),
        ("stock_status", columns.stock_status),
        ("backorders", columns.backorders),
    ];
    flags
        .into_iter()
        .filter(|(_, enabled)| *enabled)
        .map(|(key, _)| key)
        .collect()
}

fn csv_field(product: &Product, key: &str) -> String {
    match key {
        "product_id" => product.id.to_string(),
        "product_name" => product.name.clone(),
        "sku" => product.sku.clone().unwrap_or_default(),
        "stock_qty" => product
            .stock_qty
            .map(|q| q.to_string())
            .unwrap_or_default(),
        "stock_status" => product.stock_status.as_str().to_string(),
        _ => product.backorders.as_str().to_string(),
    }
}

/// Writes the inventory CSV: one header row built from the enabled
/// column subset, then one row per product in scan order.
pub fn write_csv<W: Write>(
    products: &[Product],
    columns: &ExportColumns,
    out: W,
) -> anyhow::Result<()> {
    let keys = enabled_columns(columns);
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(keys.iter().map(|key| header_label(key)))
        .context("Unable to write CSV header")?;
    for product in products {
        wtr.write_record(keys.iter().map(|key| csv_field(product, key)))
            .context("Unable to write CSV row")?;
    }
    wtr.flush().context("Unable to flush CSV output")?;
    Ok(())
}

/// Download name carrying the site host and a sortable timestamp.
pub fn export_filename(host: &str, now: OffsetDateTime) -> String {
    format!(
        "{host}-stock-inventory-report-{:04}-{:02}-{:02}_{:02}-{:02}-{:02}.csv",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}
