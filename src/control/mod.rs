use crate::bulk::{self, BulkAction};
use crate::catalog::CatalogRepository;
use crate::presenter::{ListPresenter, ProductRow};
use crate::query::{FilterCriteria, PageRequest, SortColumn, SortDirection, SortSpec};
use crate::report;
use crate::settings::{ExportColumns, SettingsRepository, StockSettings};
use actix_session::{Session, SessionExt};
use actix_web::body::BoxBody;
use actix_web::dev::Payload;
use actix_web::http::StatusCode;
use actix_web::web::{Data, Form, Json, Query};
use actix_web::{get, post, Either, FromRequest, HttpRequest, HttpResponse, ResponseError};
use derive_more::{Display, Error};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::{ready, Ready};
use std::sync::Arc;
use stock_types::{BackorderMode, Product, ProductId, StockStatus};
use time::OffsetDateTime;

pub type Response = Result<HttpResponse, ControllerError>;
pub type InputData<T> = Either<Form<T>, Json<T>>;

const SESSION_LOGIN_KEY: &str = "login";
const SESSION_NONCE_KEY: &str = "nonce";
const NONCE_LEN: usize = 32;

#[derive(Debug, Display, Error)]
pub enum ControllerError {
    #[display("Product not found.")]
    NotFound,
    #[display("You are not allowed to perform this action.")]
    Unauthorized,
    #[display("Invalid value for {field}: {msg}")]
    InvalidInput { field: String, msg: String },
    #[display("Unable to persist changes: {_0}")]
    PersistenceFailure(#[error(ignore)] anyhow::Error),
    #[display("Internal server error: {_0}")]
    InternalServerError(#[error(ignore)] anyhow::Error),
}

impl From<anyhow::Error> for ControllerError {
    fn from(err: anyhow::Error) -> Self {
        ControllerError::InternalServerError(err)
    }
}

impl ResponseError for ControllerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ControllerError::NotFound => StatusCode::NOT_FOUND,
            ControllerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ControllerError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            ControllerError::PersistenceFailure(_) | ControllerError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse<BoxBody> {
        log::warn!("Request failed: {self}");
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "data": self.to_string(),
        }))
    }
}

fn invalid(field: &str, msg: impl Into<String>) -> ControllerError {
    ControllerError::InvalidInput {
        field: field.to_string(),
        msg: msg.into(),
    }
}

fn success<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "data": data }))
}

/// Marker extracted from the session. Every admin endpoint takes one,
/// so an unauthenticated request is rejected before the handler runs.
pub struct Identity {
    pub login: String,
}

impl FromRequest for Identity {
    type Error = ControllerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let session = req.get_session();
        ready(
            session
                .get::<String>(SESSION_LOGIN_KEY)
                .ok()
                .flatten()
                .map(|login| Identity { login })
                .ok_or(ControllerError::Unauthorized),
        )
    }
}

/// Issues the session-scoped token that state-changing forms must echo
/// back. Reissuing overwrites the previous value.
fn issue_nonce(session: &Session) -> Result<String, ControllerError> {
    let nonce: String = rand::thread_rng()
        .sample_iter(Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect();
    session
        .insert(SESSION_NONCE_KEY, nonce.clone())
        .map_err(|err| ControllerError::InternalServerError(err.into()))?;
    Ok(nonce)
}

fn verify_nonce(session: &Session, submitted: &str) -> Result<(), ControllerError> {
    let stored = session
        .get::<String>(SESSION_NONCE_KEY)
        .ok()
        .flatten()
        .ok_or(ControllerError::Unauthorized)?;
    if submitted.is_empty() || stored != submitted {
        return Err(ControllerError::Unauthorized);
    }
    Ok(())
}

fn parse_id_field(raw: Option<&str>) -> Result<ProductId, ControllerError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<ProductId>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| invalid("product_id", "a positive product id is required"))
}

fn parse_qty_field(raw: Option<&str>) -> Result<i64, ControllerError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|q| *q >= 0)
        .ok_or_else(|| invalid("stock_qty", "a non-negative whole number is required"))
}

/// Parses an optional form field: absent or blank means "leave alone",
/// anything else must parse or the request is rejected.
fn parse_optional_field<T>(
    raw: Option<&str>,
    field: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, ControllerError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse(s)
            .map(Some)
            .ok_or_else(|| invalid(field, format!("unrecognized value {s:?}"))),
    }
}

fn parse_count_param(raw: Option<&str>, field: &str) -> Result<Option<usize>, ControllerError> {
    parse_optional_field(raw, field, |s| s.parse::<usize>().ok().filter(|n| *n > 0))
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub admin_key: String,
}

#[post("/login")]
pub async fn log_in(session: Session, input: InputData<LoginForm>) -> Response {
    let form = input.into_inner();
    let expected = envmnt::get_or("ADMIN_KEY", "");
    if expected.is_empty() || form.admin_key != expected {
        return Err(ControllerError::Unauthorized);
    }
    session
        .insert(SESSION_LOGIN_KEY, "admin".to_string())
        .map_err(|err| ControllerError::InternalServerError(err.into()))?;
    let nonce = issue_nonce(&session)?;
    Ok(success(json!({ "nonce": nonce })))
}

#[post("/logout")]
pub async fn log_out(_user: Identity, session: Session) -> Response {
    session.purge();
    Ok(success("Logged out."))
}

#[derive(Deserialize)]
pub struct ProductsQuery {
    pub q: Option<String>,
    pub stock_status: Option<String>,
    pub orderby: Option<String>,
    pub order: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

/// Resolves the list request against the saved defaults: an explicit
/// filter wins outright, otherwise the stored default filter applies.
fn parse_list_request(
    params: &ProductsQuery,
    settings: &StockSettings,
) -> Result<(FilterCriteria, SortSpec, PageRequest), ControllerError> {
    let search = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let stock_status = parse_optional_field(
        params.stock_status.as_deref(),
        "stock_status",
        |s| StockStatus::try_from_str(s),
    )?;

    let filter = if search.is_none() && stock_status.is_none() {
        settings.default_filter_criteria()
    } else {
        FilterCriteria {
            search,
            stock_status,
        }
    };

    let column = parse_optional_field(params.orderby.as_deref(), "orderby", |s| SortColumn::try_from_str(s))?
        .unwrap_or(SortColumn::Name);
    let direction = parse_optional_field(params.order.as_deref(), "order", |s| SortDirection::try_from_str(s))?
        .unwrap_or(SortDirection::Asc);

    let page = parse_count_param(params.page.as_deref(), "page")?.unwrap_or(1);
    let per_page = parse_count_param(params.per_page.as_deref(), "per_page")?
        .unwrap_or(crate::query::DEFAULT_PER_PAGE);

    Ok((
        filter,
        SortSpec { column, direction },
        PageRequest::new(page, per_page),
    ))
}

#[get("/products")]
pub async fn products(
    _user: Identity,
    session: Session,
    params: Query<ProductsQuery>,
    presenter: Data<Arc<dyn ListPresenter>>,
    settings_repo: Data<Arc<dyn SettingsRepository>>,
) -> Response {
    let settings = settings_repo.load().await?;
    let (filter, sort, page) = parse_list_request(&params, &settings)?;
    let result = presenter.fetch_page(&filter, &sort, &page).await?;
    let rows: Vec<ProductRow> = result
        .items
        .iter()
        .map(|product| presenter.render_row(product))
        .collect();
    let nonce = issue_nonce(&session)?;
    Ok(success(json!({
        "rows": rows,
        "total_items": result.total_items,
        "total_pages": result.total_pages,
        "page": result.page,
        "per_page": result.per_page,
        "columns": presenter.columns(),
        "sortable_columns": presenter.sortable_columns(),
        "bulk_actions": presenter.bulk_actions(),
        "nonce": nonce,
    })))
}

#[derive(Deserialize)]
pub struct BulkForm {
    pub action: String,
    #[serde(default)]
    pub product: Vec<ProductId>,
    #[serde(default)]
    pub nonce: String,
}

#[post("/products/bulk")]
pub async fn products_bulk(
    _user: Identity,
    session: Session,
    input: InputData<BulkForm>,
    repo: Data<Arc<dyn CatalogRepository>>,
) -> Response {
    let form = input.into_inner();
    verify_nonce(&session, &form.nonce)?;
    let action = BulkAction::try_from_str(&form.action)
        .ok_or_else(|| invalid("action", format!("unknown bulk action {:?}", form.action)))?;
    if form.product.is_empty() {
        return Err(invalid("product", "no products selected"));
    }
    let result = bulk::apply(repo.get_ref().as_ref(), action, &form.product).await;
    Ok(success(result))
}

#[derive(Deserialize)]
pub struct UpdateStockForm {
    pub product_id: Option<String>,
    pub stock_qty: Option<String>,
    #[serde(default)]
    pub nonce: String,
}

/// Quick inline edit: takes a quantity and derives the stock status
/// from it, zero meaning out of stock.
#[post("/ajax/update_stock")]
pub async fn update_stock(
    _user: Identity,
    session: Session,
    input: InputData<UpdateStockForm>,
    repo: Data<Arc<dyn CatalogRepository>>,
) -> Response {
    let form = input.into_inner();
    verify_nonce(&session, &form.nonce)?;
    let id = parse_id_field(form.product_id.as_deref())?;
    let qty = parse_qty_field(form.stock_qty.as_deref())?;

    let mut product = repo
        .get(id)
        .await?
        .ok_or(ControllerError::NotFound)?;
    product.stock_qty = Some(qty);
    product.stock_status = StockStatus::for_quantity(qty);
    repo.save(product)
        .await
        .map_err(ControllerError::PersistenceFailure)?;
    Ok(success("Stock updated successfully."))
}

#[derive(Deserialize)]
pub struct UpdateStockFieldsForm {
    pub product_id: Option<String>,
    pub stock_qty: Option<String>,
    pub stock_status: Option<String>,
    pub backorders: Option<String>,
    #[serde(default)]
    pub nonce: String,
}

fn apply_stock_fields(
    product: &mut Product,
    qty: i64,
    status: Option<StockStatus>,
    backorders: Option<BackorderMode>,
) {
    product.stock_qty = Some(qty);
    if let Some(status) = status {
        product.stock_status = status;
    }
    if let Some(mode) = backorders {
        product.backorders = mode;
    }
}

/// Full edit form: status and backorders are taken exactly as sent and
/// never derived from the quantity. Blank fields keep their stored
/// values.
#[post("/ajax/update_stock_fields")]
pub async fn update_stock_fields(
    _user: Identity,
    session: Session,
    input: InputData<UpdateStockFieldsForm>,
    repo: Data<Arc<dyn CatalogRepository>>,
) -> Response {
    let form = input.into_inner();
    verify_nonce(&session, &form.nonce)?;
    let id = parse_id_field(form.product_id.as_deref())?;
    let qty = parse_qty_field(form.stock_qty.as_deref())?;
    let status = parse_optional_field(
        form.stock_status.as_deref(),
        "stock_status",
        |s| StockStatus::try_from_str(s),
    )?;
    let backorders = parse_optional_field(
        form.backorders.as_deref(),
        "backorders",
        |s| BackorderMode::try_from_str(s),
    )?;

    let mut product = repo
        .get(id)
        .await?
        .ok_or(ControllerError::NotFound)?;
    apply_stock_fields(&mut product, qty, status, backorders);
    repo.save(product)
        .await
        .map_err(ControllerError::PersistenceFailure)?;
    Ok(success("Product fields updated successfully."))
}

#[derive(Deserialize)]
pub struct ProductIdForm {
    pub product_id: Option<String>,
    #[serde(default)]
    pub nonce: String,
}

#[post("/ajax/get_product_data")]
pub async fn get_product_data(
    _user: Identity,
    session: Session,
    input: InputData<ProductIdForm>,
    repo: Data<Arc<dyn CatalogRepository>>,
) -> Response {
    let form = input.into_inner();
    verify_nonce(&session, &form.nonce)?;
    let id = parse_id_field(form.product_id.as_deref())?;
    let product = repo
        .get(id)
        .await?
        .ok_or(ControllerError::NotFound)?;
    Ok(success(json!({
        "stock_qty": product.stock_qty,
        "stock_status": product.stock_status.as_str(),
        "backorders": product.backorders.as_str(),
    })))
}

#[post("/ajax/delete_product")]
pub async fn delete_product(
    _user: Identity,
    session: Session,
    input: InputData<ProductIdForm>,
    repo: Data<Arc<dyn CatalogRepository>>,
) -> Response {
    let form = input.into_inner();
    verify_nonce(&session, &form.nonce)?;
    let id = parse_id_field(form.product_id.as_deref())?;
    let trashed = repo
        .soft_delete(id)
        .await
        .map_err(ControllerError::PersistenceFailure)?;
    if !trashed {
        return Err(ControllerError::NotFound);
    }
    Ok(success("Product moved to trash."))
}

#[get("/reports")]
pub async fn stock_report(
    _user: Identity,
    repo: Data<Arc<dyn CatalogRepository>>,
    settings_repo: Data<Arc<dyn SettingsRepository>>,
) -> Response {
    let settings = settings_repo.load().await?;
    if !settings.enable_reporting {
        return Err(ControllerError::NotFound);
    }
    let summary = report::summarize(repo.get_ref().as_ref()).await?;
    Ok(success(summary))
}

#[get("/reports/export")]
pub async fn download_stock_report(
    _user: Identity,
    req: HttpRequest,
    repo: Data<Arc<dyn CatalogRepository>>,
    settings_repo: Data<Arc<dyn SettingsRepository>>,
) -> Response {
    let settings = settings_repo.load().await?;
    if !settings.enable_reporting {
        return Err(ControllerError::NotFound);
    }
    let product_list = repo.list().await?;
    let mut out = Vec::new();
    report::write_csv(&product_list, &settings.report_columns, &mut out)?;

    let host = {
        let info = req.connection_info();
        info.host().split(':').next().unwrap_or("site").to_string()
    };
    let filename = report::export_filename(&host, OffsetDateTime::now_utc());
    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename={filename}"),
        ))
        .body(out))
}

#[get("/settings")]
pub async fn settings_view(
    _user: Identity,
    settings_repo: Data<Arc<dyn SettingsRepository>>,
) -> Response {
    Ok(success(settings_repo.load().await?))
}

#[derive(Deserialize)]
pub struct SettingsForm {
    pub enable_reporting: Option<bool>,
    pub default_filters: Option<String>,
    pub report_columns: Option<ExportColumns>,
    #[serde(default)]
    pub nonce: String,
}

#[post("/settings")]
pub async fn update_settings(
    _user: Identity,
    session: Session,
    input: Json<SettingsForm>,
    settings_repo: Data<Arc<dyn SettingsRepository>>,
) -> Response {
    let form = input.into_inner();
    verify_nonce(&session, &form.nonce)?;
    let mut settings = settings_repo.load().await?;
    if let Some(enabled) = form.enable_reporting {
        settings.enable_reporting = enabled;
    }
    if let Some(raw) = form.default_filters.as_deref() {
        settings
            .set_default_filters(raw)
            .map_err(|err| invalid("default_filters", format!("not well-formed JSON: {err}")))?;
    }
    if let Some(columns) = form.report_columns {
        settings.report_columns = columns;
    }
    settings_repo
        .save(settings.clone())
        .await
        .map_err(ControllerError::PersistenceFailure)?;
    Ok(success(settings))
}

#[cfg(test)]
mod tests {
    use super::{
        apply_stock_fields, parse_id_field, parse_list_request, parse_qty_field, ControllerError,
        ProductsQuery,
    };
    use crate::query::{SortColumn, SortDirection, DEFAULT_PER_PAGE};
    use crate::settings::StockSettings;
    use stock_types::{BackorderMode, Product, StockStatus};

    fn empty_query() -> ProductsQuery {
        ProductsQuery {
            q: None,
            stock_status: None,
            orderby: None,
            order: None,
            page: None,
            per_page: None,
        }
    }

    #[test]
    fn id_and_qty_fields_reject_garbage() {
        assert_eq!(parse_id_field(Some(" 42 ")).ok(), Some(42));
        assert!(parse_id_field(None).is_err());
        assert!(parse_id_field(Some("")).is_err());
        assert!(parse_id_field(Some("0")).is_err());
        assert!(parse_id_field(Some("-3")).is_err());
        assert!(parse_id_field(Some("abc")).is_err());

        assert_eq!(parse_qty_field(Some("0")).ok(), Some(0));
        assert!(parse_qty_field(Some("-1")).is_err());
        assert!(parse_qty_field(Some("2.5")).is_err());
    }

    #[test]
    fn list_request_defaults_when_params_are_absent() {
        let (filter, sort, page) =
            parse_list_request(&empty_query(), &StockSettings::default()).expect("parse");
        assert!(filter.search.is_none() && filter.stock_status.is_none());
        assert_eq!(sort.column, SortColumn::Name);
        assert_eq!(sort.direction, SortDirection::Asc);
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, DEFAULT_PER_PAGE);
    }

    #[test]
    fn saved_default_filter_applies_only_without_an_explicit_one() {
        let mut settings = StockSettings::default();
        settings
            .set_default_filters(r#"{"stock_status":"outofstock"}"#)
            .expect("valid json");

        let (filter, _, _) = parse_list_request(&empty_query(), &settings).expect("parse");
        assert_eq!(filter.stock_status, Some(StockStatus::OutOfStock));

        let mut params = empty_query();
        params.q = Some("widget".to_string());
        let (filter, _, _) = parse_list_request(&params, &settings).expect("parse");
        assert_eq!(filter.search.as_deref(), Some("widget"));
        assert_eq!(filter.stock_status, None);
    }

    #[test]
    fn bad_list_params_are_invalid_input() {
        let mut params = empty_query();
        params.orderby = Some("price".to_string());
        assert!(matches!(
            parse_list_request(&params, &StockSettings::default()),
            Err(ControllerError::InvalidInput { .. })
        ));

        let mut params = empty_query();
        params.page = Some("0".to_string());
        assert!(parse_list_request(&params, &StockSettings::default()).is_err());

        let mut params = empty_query();
        params.stock_status = Some("half-stocked".to_string());
        assert!(parse_list_request(&params, &StockSettings::default()).is_err());
    }

    #[test]
    fn field_update_never_derives_status_from_quantity() {
        let mut product = Product::new(1, "Widget").with_qty(7);
        apply_stock_fields(&mut product, 0, None, Some(BackorderMode::Allow));
        assert_eq!(product.stock_qty, Some(0));
        // Quantity zero with a blank status field keeps the stored status.
        assert_eq!(product.stock_status, StockStatus::InStock);
        assert_eq!(product.backorders, BackorderMode::Allow);

        apply_stock_fields(&mut product, 5, Some(StockStatus::OutOfStock), None);
        assert_eq!(product.stock_status, StockStatus::OutOfStock);
    }
}
