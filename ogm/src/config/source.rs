use std::{collections::BTreeMap, path::Path};

use tokio::fs;
use tracing::debug;

use crate::error::{Error, OgmResult};

/// Somewhere configuration properties come from.
pub trait ConfigurationSource {
    fn properties(&self) -> &BTreeMap<String, String>;
}

/// Properties parsed from `key=value` (or `key: value`) lines. Blank lines and
/// lines starting with `#` or `!` are skipped.
#[derive(Debug, Clone, Default)]
pub struct PropertiesSource {
    properties: BTreeMap<String, String>,
}

impl PropertiesSource {
    pub fn parse(text: &str) -> OgmResult<PropertiesSource> {
        let mut properties = BTreeMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let (key, value) = line
                .split_once(['=', ':'])
                .ok_or_else(|| Error::configuration(format!("line {}: expected `key=value`", lineno + 1)))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::configuration(format!("line {}: empty key", lineno + 1)));
            }
            properties.insert(key.to_owned(), value.trim().to_owned());
        }
        Ok(PropertiesSource { properties })
    }

    /// Sets a single property, replacing any previous value.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> PropertiesSource {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl ConfigurationSource for PropertiesSource {
    fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

/// A properties file, named by path or by `file://` URI.
#[derive(Debug, Clone)]
pub struct FileConfigurationSource {
    inner: PropertiesSource,
}

impl FileConfigurationSource {
    pub async fn load(location: impl AsRef<str>) -> OgmResult<FileConfigurationSource> {
        let location = location.as_ref();
        let path = Path::new(location.strip_prefix("file://").unwrap_or(location));
        let text = fs::read_to_string(path).await?;
        let inner = PropertiesSource::parse(&text)?;
        debug!(path = %path.display(), properties = inner.properties.len(), "loaded configuration file");
        Ok(FileConfigurationSource { inner })
    }
}

impl ConfigurationSource for FileConfigurationSource {
    fn properties(&self) -> &BTreeMap<String, String> {
        self.inner.properties()
    }
}
