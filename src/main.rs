use actix_session::storage::CookieSessionStore;
use actix_session::SessionMiddleware;
use actix_web::cookie::Key;
use actix_web::middleware::TrailingSlash;
use actix_web::{web::Data, App, HttpServer};
use anyhow::Context as AnyhowContext;
use bulk_stock_manager::catalog::{CatalogRepository, SqliteCatalogRepository};
use bulk_stock_manager::control;
use bulk_stock_manager::presenter::{ListPresenter, StockListPresenter};
use bulk_stock_manager::settings::{FileSystemSettingsRepository, SettingsRepository};
use rand::{distributions, Rng};
use std::env;
use std::io::Write;
use std::sync::Arc;
use tokio_rusqlite::Connection;

fn ensure_env_secret(name: &str) -> Result<String, anyhow::Error> {
    match envmnt::get_parse(name) {
        Ok(v) => Ok(v),
        Err(envmnt::errors::EnvmntError::Missing(_)) => {
            let value = rand::thread_rng()
                .sample_iter(distributions::Alphanumeric)
                .take(64)
                .map(char::from)
                .collect::<String>();
            let mut f = std::fs::File::options().append(true).open(".env")?;
            f.write_all(format!("{name}={value}\n").as_bytes())?;
            envmnt::set(name, &value);
            Ok(value)
        }
        Err(err) => Err(anyhow::anyhow!("Unable to read {name}: {err}")),
    }
}

#[actix_web::main]
async fn main() -> Result<(), anyhow::Error> {
    if let Err(env::VarError::NotPresent) = env::var("RUST_LOG") {
        env::set_var("RUST_LOG", "INFO");
    }
    pretty_env_logger::formatted_timed_builder()
        .parse_default_env()
        .init();

    match std::fs::File::open(".env") {
        Ok(_) => envmnt::load_file(".env")?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            std::fs::File::create(".env")?;
            envmnt::load_file(".env")?;
        }
        Err(err) => {
            return Err(anyhow::anyhow!("Unable to open .env file: {err}"));
        }
    }

    std::fs::create_dir_all("storage").context("Unable to create storage directory")?;
    let conn = Connection::open("storage/stock.db").await?;
    let catalog: Arc<dyn CatalogRepository> =
        Arc::new(SqliteCatalogRepository::init(conn).await?);
    let settings: Arc<dyn SettingsRepository> =
        Arc::new(FileSystemSettingsRepository::default());
    let presenter: Arc<dyn ListPresenter> =
        Arc::new(StockListPresenter::new(catalog.clone()));

    let secret_key = ensure_env_secret("SESSION_KEY")?;
    // Secret values are intentionally not logged
    ensure_env_secret("ADMIN_KEY")?;
    let secret_key = Key::from(secret_key.as_bytes());

    HttpServer::new(move || {
        App::new()
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_http_only(true)
                    .cookie_secure(false)
                    .build(),
            )
            .wrap(actix_web::middleware::NormalizePath::new(
                TrailingSlash::Trim,
            ))
            .app_data(Data::new(catalog.clone()))
            .app_data(Data::new(settings.clone()))
            .app_data(Data::new(presenter.clone()))
            .service(control::log_in)
            .service(control::log_out)
            .service(control::products)
            .service(control::products_bulk)
            .service(control::update_stock)
            .service(control::update_stock_fields)
            .service(control::get_product_data)
            .service(control::delete_product)
            .service(control::stock_report)
            .service(control::download_stock_report)
            .service(control::settings_view)
            .service(control::update_settings)
    })
    .bind(("0.0.0.0", 8080))
    .context("Failed to bind server to 0.0.0.0:8080. Is the port already in use?")?
    .run()
    .await?;
    Ok(())
}
