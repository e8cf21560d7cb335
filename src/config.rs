//! Engine configuration
//!
//! All fields have defaults, so an empty YAML file is a valid config:
//!
//! ```yaml
//! attr_prefix: "hx-"
//! nested_array_attr: "data-nested-array"
//! base_url: "http://localhost:5000/"
//! user_agent: "htmj/0.1"
//! ```
//!
//! Environment overrides: `HTMJ_BASE_URL`, `HTMJ_ATTR_PREFIX`,
//! `HTMJ_NESTED_ARRAY_ATTR`.

use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::binding::AttributeNames;
use crate::error::HtmjError;

pub const DEFAULT_ATTR_PREFIX: &str = "hx-";
pub const DEFAULT_NESTED_ARRAY_ATTR: &str = "data-nested-array";
pub const DEFAULT_USER_AGENT: &str = concat!("htmj/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HtmjConfig {
    /// Prefix of the declarative template attributes
    pub attr_prefix: String,
    /// Attribute marking elements repeated per entry of an array field
    pub nested_array_attr: String,
    /// Base for relative endpoints
    pub base_url: Option<Url>,
    pub user_agent: String,
}

impl Default for HtmjConfig {
    fn default() -> Self {
        Self {
            attr_prefix: DEFAULT_ATTR_PREFIX.to_string(),
            nested_array_attr: DEFAULT_NESTED_ARRAY_ATTR.to_string(),
            base_url: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HtmjConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, HtmjError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, HtmjError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Apply `HTMJ_*` environment variables on top of `self`
    pub fn with_env_overrides(self) -> Result<Self, HtmjError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, HtmjError> {
        if let Some(base) = lookup("HTMJ_BASE_URL") {
            self = self.with_base_url(&base)?;
        }
        if let Some(prefix) = lookup("HTMJ_ATTR_PREFIX") {
            self.attr_prefix = prefix;
        }
        if let Some(attr) = lookup("HTMJ_NESTED_ARRAY_ATTR") {
            self.nested_array_attr = attr;
        }
        Ok(self)
    }

    pub fn with_base_url(mut self, base: &str) -> Result<Self, HtmjError> {
        let url = Url::parse(base).map_err(|e| HtmjError::InvalidBaseUrl {
            url: base.to_string(),
            reason: e.to_string(),
        })?;
        self.base_url = Some(url);
        Ok(self)
    }

    pub fn attribute_names(&self) -> AttributeNames {
        AttributeNames::with_prefix(&self.attr_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(HtmjConfig::from_yaml_str("").unwrap(), HtmjConfig::default());
    }

    #[test]
    fn yaml_overrides_fields() {
        let config = HtmjConfig::from_yaml_str(
            "attr_prefix: \"data-x-\"\nbase_url: \"http://localhost:5000/app/\"\n",
        )
        .unwrap();
        assert_eq!(config.attr_prefix, "data-x-");
        assert_eq!(config.nested_array_attr, DEFAULT_NESTED_ARRAY_ATTR);
        assert_eq!(
            config.base_url.as_ref().map(Url::as_str),
            Some("http://localhost:5000/app/")
        );
        assert_eq!(config.attribute_names().endpoint, "data-x-endpoint");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = HtmjConfig::from_yaml_str("timeout: 5").unwrap_err();
        assert!(matches!(err, HtmjError::YamlParse(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("HTMJ_BASE_URL", "https://example.test/"),
            ("HTMJ_NESTED_ARRAY_ATTR", "data-each"),
        ]
        .into_iter()
        .collect();
        let config = HtmjConfig::default()
            .with_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.nested_array_attr, "data-each");
        assert_eq!(config.attr_prefix, DEFAULT_ATTR_PREFIX);
        assert!(config.base_url.is_some());
    }

    #[test]
    fn invalid_base_url() {
        let err = HtmjConfig::default().with_base_url("not a url").unwrap_err();
        assert!(matches!(err, HtmjError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn from_yaml_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("htmj.yaml");
        std::fs::write(&path, "user_agent: \"test-agent\"\n").unwrap();
        let config = HtmjConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.user_agent, "test-agent");
    }
}
