use crate::query::FilterCriteria;
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_true() -> bool {
    true
}

/// Per-column toggles for the CSV export. Everything is on by default.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportColumns {
    #[serde(default = "default_true")]
    pub product_id: bool,
    #[serde(default = "default_true")]
    pub product_name: bool,
    #[serde(default = "default_true")]
    pub sku: bool,
    #[serde(default = "default_true")]
    pub stock_qty: bool,
    #[serde(default = "default_true")]
    pub stock_status: bool,
    #[serde(default = "default_true")]
    pub backorders: bool,
}

impl Default for ExportColumns {
    fn default() -> Self {
        ExportColumns {
            product_id: true,
            product_name: true,
            sku: true,
            stock_qty: true,
            stock_status: true,
            backorders: true,
        }
    }
}

/// The settings record, loaded once per request and passed to whoever
/// needs it rather than read ad hoc from global state.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StockSettings {
    #[serde(default = "default_true")]
    pub enable_reporting: bool,
    /// Raw JSON blob, e.g. `{"stock_status":"instock"}`. Kept as entered;
    /// validated as well-formed JSON before it is ever stored.
    #[serde(default)]
    pub default_filters: Option<String>,
    #[serde(default)]
    pub report_columns: ExportColumns,
}

impl Default for StockSettings {
    fn default() -> Self {
        StockSettings {
            enable_reporting: true,
            default_filters: None,
            report_columns: ExportColumns::default(),
        }
    }
}

impl StockSettings {
    /// Replaces the default filter blob. Rejects input that is not
    /// well-formed JSON and leaves the prior value in place.
    pub fn set_default_filters(&mut self, raw: &str) -> Result<(), serde_json::Error> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            self.default_filters = None;
            return Ok(());
        }
        serde_json::from_str::<serde_json::Value>(trimmed)?;
        self.default_filters = Some(trimmed.to_string());
        Ok(())
    }

    /// Filter the list page starts from when the request carries none.
    pub fn default_filter_criteria(&self) -> FilterCriteria {
        self.default_filters
            .as_deref()
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
            .map(|value| FilterCriteria::from_json(&value))
            .unwrap_or_default()
    }
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn load(&self) -> anyhow::Result<StockSettings>;
    async fn save(&self, settings: StockSettings) -> anyhow::Result<()>;
}

/// Stores the settings record as pretty JSON in a config directory.
/// A missing file means defaults, not an error.
pub struct FileSystemSettingsRepository {
    dir: PathBuf,
}

impl FileSystemSettingsRepository {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self) -> PathBuf {
        self.dir.join("settings.json")
    }
}

impl Default for FileSystemSettingsRepository {
    fn default() -> Self {
        Self::new("cfg.d")
    }
}

#[async_trait]
impl SettingsRepository for FileSystemSettingsRepository {
    async fn load(&self) -> anyhow::Result<StockSettings> {
        let raw = match tokio::fs::read_to_string(self.path()).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StockSettings::default())
            }
            Err(err) => return Err(err).context("Unable to read settings file"),
        };
        serde_json::from_str(&raw).context("Unable to parse settings file")
    }

    async fn save(&self, settings: StockSettings) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .context("Unable to create config directory")?;
        tokio::fs::write(self.path(), serde_json::to_string_pretty(&settings)?)
            .await
            .context("Unable to write settings file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        FileSystemSettingsRepository, SettingsRepository, StockSettings,
    };
    use stock_types::StockStatus;

    #[test]
    fn defaults_enable_reporting_and_all_columns() {
        let settings = StockSettings::default();
        assert!(settings.enable_reporting);
        assert!(settings.default_filters.is_none());
        let columns = settings.report_columns;
        assert!(
            columns.product_id
                && columns.product_name
                && columns.sku
                && columns.stock_qty
                && columns.stock_status
                && columns.backorders
        );
    }

    #[test]
    fn invalid_filter_json_is_rejected_and_prior_value_kept() {
        let mut settings = StockSettings::default();
        settings
            .set_default_filters(r#"{"stock_status":"instock"}"#)
            .expect("valid json");

        let err = settings.set_default_filters("{not json");
        assert!(err.is_err());
        assert_eq!(
            settings.default_filters.as_deref(),
            Some(r#"{"stock_status":"instock"}"#)
        );
        assert_eq!(
            settings.default_filter_criteria().stock_status,
            Some(StockStatus::InStock)
        );
    }

    #[test]
    fn empty_filter_input_clears_the_blob() {
        let mut settings = StockSettings::default();
        settings
            .set_default_filters(r#"{"q":"widget"}"#)
            .expect("valid json");
        settings.set_default_filters("   ").expect("empty clears");
        assert!(settings.default_filters.is_none());
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let settings: StockSettings = serde_json::from_str("{}").expect("parse");
        assert_eq!(settings, StockSettings::default());

        let settings: StockSettings =
            serde_json::from_str(r#"{"report_columns":{"sku":false}}"#).expect("parse");
        assert!(!settings.report_columns.sku);
        assert!(settings.report_columns.product_id);
    }

    #[tokio::test]
    async fn load_returns_defaults_when_file_is_missing() {
        let dir = std::env::temp_dir().join(format!(
            "bsm-settings-{}-{}",
            std::process::id(),
            time::OffsetDateTime::now_utc().unix_timestamp_nanos()
        ));
        let repo = FileSystemSettingsRepository::new(&dir);
        assert_eq!(repo.load().await.expect("load"), StockSettings::default());

        let mut settings = StockSettings::default();
        settings.enable_reporting = false;
        repo.save(settings.clone()).await.expect("save");
        assert_eq!(repo.load().await.expect("load"), settings);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
