//! Initialize the configuration directory: create ~/.quip, a default config, and the bundled
//! locale catalogs.
//!
//! Layout mirrors `crates/lib/config/`: `config/locales/` → `~/.quip/locales/`.

use anyhow::{Context, Result};
use include_dir::{include_dir, Dir};
use std::path::{Path, PathBuf};

use crate::config;
use crate::localization::CatalogLocalizer;

static BUNDLED_LOCALES: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/config/locales");

/// Ensure the configuration directory has been initialized (config file and locales directory exist).
pub fn require_initialized(config_path: &Path, config: &config::Config) -> Result<()> {
    if !config_path.exists() {
        anyhow::bail!(
            "configuration not initialized; run `quip init` first (config file not found: {})",
            config_path.display()
        );
    }
    let locales_dir = config::resolve_locales_dir(config, config_path);
    if !locales_dir.exists() {
        anyhow::bail!(
            "configuration not initialized; run `quip init` first (locales directory not found: {})",
            locales_dir.display()
        );
    }
    Ok(())
}

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with `{}` if missing.
/// - Extracts the bundled locale catalogs into `locales` if that directory does not exist.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let locales_dir = config::locales_dir(config_path);
    if !locales_dir.exists() {
        std::fs::create_dir_all(&locales_dir)
            .with_context(|| format!("creating locales directory {}", locales_dir.display()))?;
        if let Err(e) = BUNDLED_LOCALES.extract(&locales_dir) {
            anyhow::bail!(
                "extracting bundled locales to {}: {}",
                locales_dir.display(),
                e
            );
        }
        log::info!("extracted bundled locales to {}", locales_dir.display());
    } else {
        log::debug!("locales directory already exists at {}, skipping", locales_dir.display());
    }

    Ok(config_dir.to_path_buf())
}

/// Catalog built from the locale files compiled into the binary (no filesystem access).
pub fn bundled_catalog(default_locale: &str) -> Result<CatalogLocalizer> {
    let mut catalog = CatalogLocalizer::new(default_locale);
    for file in BUNDLED_LOCALES.files() {
        let path = file.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(locale) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let tree: serde_json::Value = serde_json::from_slice(file.contents())
            .with_context(|| format!("parsing bundled locale {}", path.display()))?;
        catalog.insert_locale(locale.to_string(), tree);
    }
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("quip-init-test-{}", uuid::Uuid::new_v4()))
            .join("config.json")
    }

    #[test]
    fn init_creates_config_and_locales() {
        let path = temp_config_path();
        let config = config::Config::default();
        assert!(require_initialized(&path, &config).is_err());

        let dir = init_config_dir(&path).unwrap();
        assert!(path.exists());
        assert!(dir.join("locales").join("en.json").exists());
        require_initialized(&path, &config).unwrap();

        let loaded = CatalogLocalizer::load_dir(&dir.join("locales"), "en").unwrap();
        assert!(loaded.locales().any(|l| l == "en"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn init_keeps_existing_config() {
        let path = temp_config_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"localization":{"defaultLocale":"ru"}}"#).unwrap();
        let dir = init_config_dir(&path).unwrap();
        let (config, _) = config::load_config(Some(path.clone())).unwrap();
        assert_eq!(config.localization.default_locale, "ru");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bundled_catalog_has_english_and_russian() {
        let catalog = bundled_catalog("en").unwrap();
        let mut locales: Vec<&str> = catalog.locales().collect();
        locales.sort();
        assert_eq!(locales, vec!["en", "ru"]);
    }
}
