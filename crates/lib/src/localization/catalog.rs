//! File-backed localization catalog: one `<locale>.json` / `.yaml` / `.yml` file per locale.
//!
//! Each file is a nested map. A dotted path (e.g. `lobby.start`) walks the map; a leaf is a
//! string or a list of strings. Lookups fall back to the default locale when the requested
//! locale or path is missing.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::{Localization, LocalizationError, Localizer};

/// All locales loaded into memory, keyed by locale tag.
#[derive(Debug, Clone)]
pub struct CatalogLocalizer {
    default_locale: String,
    locales: HashMap<String, Value>,
}

impl CatalogLocalizer {
    pub fn new(default_locale: impl Into<String>) -> Self {
        Self {
            default_locale: default_locale.into(),
            locales: HashMap::new(),
        }
    }

    /// Add (or replace) one locale's tree.
    pub fn insert_locale(&mut self, locale: impl Into<String>, tree: Value) {
        self.locales.insert(locale.into(), tree);
    }

    pub fn with_locale(mut self, locale: impl Into<String>, tree: Value) -> Self {
        self.insert_locale(locale, tree);
        self
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.locales.keys().map(String::as_str)
    }

    /// Load every catalog file in `dir`. The file stem is the locale tag.
    pub fn load_dir(dir: &Path, default_locale: impl Into<String>) -> Result<Self> {
        let mut catalog = Self::new(default_locale);
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("reading locales directory {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            let Some(locale) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = match ext {
                "json" | "yaml" | "yml" => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading locale file {}", path.display()))?,
                _ => continue,
            };
            let tree: Value = if ext == "json" {
                serde_json::from_str(&content)
                    .with_context(|| format!("parsing locale file {}", path.display()))?
            } else {
                serde_yaml::from_str(&content)
                    .with_context(|| format!("parsing locale file {}", path.display()))?
            };
            log::debug!("loaded locale {} from {}", locale, path.display());
            catalog.insert_locale(locale.to_string(), tree);
        }
        if !catalog.locales.contains_key(&catalog.default_locale) {
            log::warn!(
                "default locale {} has no catalog file in {}",
                catalog.default_locale,
                dir.display()
            );
        }
        Ok(catalog)
    }

    fn lookup(&self, locale: &str, path: &str) -> Option<&Value> {
        let mut node = self.locales.get(locale)?;
        for segment in path.split('.') {
            node = node.get(segment)?;
        }
        Some(node)
    }

    /// For each loaded locale, the paths that do not resolve to a usable phrase in that locale
    /// (fallback is not applied). Locales with nothing missing are omitted.
    pub fn missing_paths<'a, I>(&self, paths: I) -> BTreeMap<String, Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let paths: Vec<&str> = paths.into_iter().collect();
        let mut report = BTreeMap::new();
        for locale in self.locales.keys() {
            let missing: Vec<String> = paths
                .iter()
                .filter(|p| {
                    self.lookup(locale, p)
                        .map(|v| to_localization(p, v).is_err())
                        .unwrap_or(true)
                })
                .map(|p| p.to_string())
                .collect();
            if !missing.is_empty() {
                report.insert(locale.clone(), missing);
            }
        }
        report
    }
}

fn to_localization(path: &str, value: &Value) -> Result<Localization, LocalizationError> {
    match value {
        Value::String(s) => Ok(Localization::single(s.clone())),
        Value::Array(items) => {
            let templates = items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| LocalizationError::InvalidEntry(path.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Localization::new(templates)
        }
        _ => Err(LocalizationError::InvalidEntry(path.to_string())),
    }
}

impl Localizer for CatalogLocalizer {
    fn get_string(&self, path: &str, locale: &str) -> Result<Localization, LocalizationError> {
        let value = self
            .lookup(locale, path)
            .or_else(|| self.lookup(&self.default_locale, path))
            .ok_or_else(|| LocalizationError::UnknownPath {
                path: path.to_string(),
                locale: locale.to_string(),
            })?;
        to_localization(path, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("quip-catalog-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn catalog() -> CatalogLocalizer {
        CatalogLocalizer::new("en")
            .with_locale(
                "en",
                json!({ "lobby": { "start": ["start", "begin"], "help": "help" } }),
            )
            .with_locale("ru", json!({ "lobby": { "start": ["старт"] } }))
    }

    #[test]
    fn dotted_path_resolves_list_and_string() {
        let c = catalog();
        let start = c.get_string("lobby.start", "en").unwrap();
        assert_eq!(start.templates(), &["start", "begin"]);
        let help = c.get_string("lobby.help", "en").unwrap();
        assert_eq!(help.templates(), &["help"]);
    }

    #[test]
    fn requested_locale_wins_over_default() {
        let start = catalog().get_string("lobby.start", "ru").unwrap();
        assert_eq!(start.templates(), &["старт"]);
    }

    #[test]
    fn missing_path_falls_back_to_default_locale() {
        let c = catalog();
        assert_eq!(c.get_string("lobby.help", "ru").unwrap().templates(), &["help"]);
        assert_eq!(c.get_string("lobby.help", "de").unwrap().templates(), &["help"]);
    }

    #[test]
    fn unknown_path_is_an_error() {
        let err = catalog().get_string("shop.buy", "en").unwrap_err();
        assert!(matches!(err, LocalizationError::UnknownPath { .. }));
    }

    #[test]
    fn non_string_leaf_is_invalid() {
        let c = CatalogLocalizer::new("en").with_locale("en", json!({ "a": { "b": 3 }, "c": [] }));
        assert!(matches!(c.get_string("a.b", "en"), Err(LocalizationError::InvalidEntry(_))));
        assert!(matches!(c.get_string("a", "en"), Err(LocalizationError::InvalidEntry(_))));
        assert!(matches!(c.get_string("c", "en"), Err(LocalizationError::Empty)));
    }

    #[test]
    fn missing_paths_reports_per_locale() {
        let report = catalog().missing_paths(["lobby.start", "lobby.help"]);
        assert_eq!(report.get("ru"), Some(&vec!["lobby.help".to_string()]));
        assert!(!report.contains_key("en"));
    }

    #[test]
    fn load_dir_reads_json_and_yaml() {
        let dir = temp_dir();
        std::fs::write(dir.join("en.json"), r#"{"lobby":{"start":["start","begin"]}}"#).unwrap();
        std::fs::write(dir.join("ru.yaml"), "lobby:\n  start:\n    - старт\n").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();
        let c = CatalogLocalizer::load_dir(&dir, "en").unwrap();
        let mut locales: Vec<&str> = c.locales().collect();
        locales.sort();
        assert_eq!(locales, vec!["en", "ru"]);
        assert!(c.get_string("lobby.start", "ru").unwrap().matches_text("старт"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_dir_rejects_malformed_file() {
        let dir = temp_dir();
        std::fs::write(dir.join("en.json"), "{ not json").unwrap();
        assert!(CatalogLocalizer::load_dir(&dir, "en").is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
