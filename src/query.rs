use crate::catalog::CatalogRepository;
use serde::{Deserialize, Serialize};
use stock_types::{Product, StockStatus};

pub const DEFAULT_PER_PAGE: usize = 10;
pub const MAX_PER_PAGE: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortColumn {
    Name,
    Sku,
    StockQty,
}

impl SortColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortColumn::Name => "name",
            SortColumn::Sku => "sku",
            SortColumn::StockQty => "stock_qty",
        }
    }

    pub fn try_from_str<S: AsRef<str>>(input: S) -> Option<Self> {
        match input.as_ref().trim().to_lowercase().as_str() {
            "name" => Some(SortColumn::Name),
            "sku" => Some(SortColumn::Sku),
            "stock_qty" => Some(SortColumn::StockQty),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn try_from_str<S: AsRef<str>>(input: S) -> Option<Self> {
        match input.as_ref().trim().to_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortSpec {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        SortSpec {
            column: SortColumn::Name,
            direction: SortDirection::Asc,
        }
    }
}

/// Which products a list request wants. An empty criteria matches
/// everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Case-insensitive substring match over name or SKU.
    pub search: Option<String>,
    pub stock_status: Option<StockStatus>,
}

impl FilterCriteria {
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(term) = self.search.as_ref().map(|s| s.trim().to_lowercase()) {
            if !term.is_empty() {
                let name_hit = product.name.to_lowercase().contains(&term);
                let sku_hit = product
                    .sku
                    .as_ref()
                    .map(|s| s.to_lowercase().contains(&term))
                    .unwrap_or(false);
                if !name_hit && !sku_hit {
                    return false;
                }
            }
        }
        if let Some(status) = self.stock_status {
            if product.stock_status != status {
                return false;
            }
        }
        true
    }

    /// Reads saved default filters, e.g. `{"stock_status":"instock"}`.
    /// Unknown keys and malformed values are ignored rather than failed:
    /// the blob was validated as JSON when saved, not as a schema.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let search = value
            .get("search")
            .or_else(|| value.get("q"))
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let stock_status = value
            .get("stock_status")
            .and_then(|v| v.as_str())
            .and_then(StockStatus::try_from_str);
        FilterCriteria {
            search,
            stock_status,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based.
    pub page: usize,
    pub per_page: usize,
}

impl PageRequest {
    pub fn new(page: usize, per_page: usize) -> Self {
        PageRequest {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest::new(1, DEFAULT_PER_PAGE)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryPage {
    pub items: Vec<Product>,
    pub total_items: usize,
    pub total_pages: usize,
    pub page: usize,
    pub per_page: usize,
}

/// Filters, sorts and pages an already-loaded product set.
///
/// Sorting is stable with ties broken by id ascending, so repeated calls
/// paginate deterministically. Quantity compares numerically; untracked
/// quantities sort before tracked ones. A page past the end yields an
/// empty slice, not an error.
pub fn run_query(
    products: Vec<Product>,
    filter: &FilterCriteria,
    sort: &SortSpec,
    page: &PageRequest,
) -> QueryPage {
    let mut matched: Vec<Product> = products.into_iter().filter(|p| filter.matches(p)).collect();

    matched.sort_by(|a, b| {
        let ord = match sort.column {
            SortColumn::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortColumn::Sku => {
                let a_sku = a.sku.as_deref().unwrap_or("").to_lowercase();
                let b_sku = b.sku.as_deref().unwrap_or("").to_lowercase();
                a_sku.cmp(&b_sku)
            }
            SortColumn::StockQty => a.stock_qty.cmp(&b.stock_qty),
        };
        let ord = match sort.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        ord.then(a.id.cmp(&b.id))
    });

    let total_items = matched.len();
    let total_pages = if total_items == 0 {
        1
    } else {
        (total_items + page.per_page - 1) / page.per_page
    };
    let start = (page.page - 1) * page.per_page;
    let items = matched
        .into_iter()
        .skip(start)
        .take(page.per_page)
        .collect();

    QueryPage {
        items,
        total_items,
        total_pages,
        page: page.page,
        per_page: page.per_page,
    }
}

/// Repository-backed variant. A catalog failure surfaces as an error
/// instead of an empty page the caller could mistake for a real result.
pub async fn query(
    repo: &dyn CatalogRepository,
    filter: &FilterCriteria,
    sort: &SortSpec,
    page: &PageRequest,
) -> anyhow::Result<QueryPage> {
    let products = repo.list().await?;
    Ok(run_query(products, filter, sort, page))
}
