#![forbid(unsafe_code)]

//! Table configuration.
//!
//! [`TableConfig`] is built in code with the `with_*` methods, or, with the
//! `policy-config` feature, loaded from TOML or JSON. Missing keys take their
//! defaults.
//!
//! ```toml
//! selectable = true
//! selected_class = "is-selected"
//! cid_prefix = "row-"
//! empty_text = "Nothing here"
//! ```

use std::fmt;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field holds an unusable value.
    Invalid { field: &'static str, reason: String },
    /// The document could not be parsed.
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { field, reason } => write!(f, "invalid `{field}`: {reason}"),
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Presentation options of a [`Table`](crate::table::Table).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "policy-config",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, deny_unknown_fields)
)]
pub struct TableConfig {
    /// Render a selection checkbox column and the select-all control.
    pub selectable: bool,
    pub show_header: bool,
    pub show_footer: bool,
    /// Class toggled on selected rows.
    pub selected_class: String,
    /// Prefix of row correlation ids.
    pub cid_prefix: String,
    pub row_class: Option<String>,
    pub table_class: Option<String>,
    /// Text of the placeholder row shown while no row is visible.
    pub empty_text: Option<String>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            selectable: false,
            show_header: true,
            show_footer: false,
            selected_class: "selected".to_owned(),
            cid_prefix: "c".to_owned(),
            row_class: None,
            table_class: None,
            empty_text: None,
        }
    }
}

impl TableConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn selectable(mut self, on: bool) -> Self {
        self.selectable = on;
        self
    }

    #[must_use]
    pub fn with_header(mut self, on: bool) -> Self {
        self.show_header = on;
        self
    }

    #[must_use]
    pub fn with_footer(mut self, on: bool) -> Self {
        self.show_footer = on;
        self
    }

    #[must_use]
    pub fn with_selected_class(mut self, class: &str) -> Self {
        self.selected_class = class.to_owned();
        self
    }

    #[must_use]
    pub fn with_cid_prefix(mut self, prefix: &str) -> Self {
        self.cid_prefix = prefix.to_owned();
        self
    }

    #[must_use]
    pub fn with_row_class(mut self, class: &str) -> Self {
        self.row_class = Some(class.to_owned());
        self
    }

    #[must_use]
    pub fn with_table_class(mut self, class: &str) -> Self {
        self.table_class = Some(class.to_owned());
        self
    }

    #[must_use]
    pub fn with_empty_text(mut self, text: &str) -> Self {
        self.empty_text = Some(text.to_owned());
        self
    }

    /// Check the values the widget relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cid_prefix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "cid_prefix",
                reason: "must not be empty".into(),
            });
        }
        if self.selected_class.is_empty() || self.selected_class.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "selected_class",
                reason: "must be a single class name".into(),
            });
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    #[cfg(feature = "policy-config")]
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    #[cfg(feature = "policy-config")]
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = TableConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.show_header);
        assert!(!config.selectable);
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = TableConfig::new().with_cid_prefix("").validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "cid_prefix", .. }));
        assert!(TableConfig::new().with_selected_class("a b").validate().is_err());
    }

    #[cfg(feature = "policy-config")]
    #[test]
    fn loads_toml_and_json() {
        let config = TableConfig::from_toml_str(
            "selectable = true\ncid_prefix = \"row-\"\nempty_text = \"none\"\n",
        )
        .unwrap();
        assert!(config.selectable);
        assert_eq!(config.cid_prefix, "row-");
        assert_eq!(config.selected_class, "selected");

        let config = TableConfig::from_json_str(r#"{"show_footer": true}"#).unwrap();
        assert!(config.show_footer);

        assert!(matches!(
            TableConfig::from_json_str(r#"{"nope": 1}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            TableConfig::from_toml_str("selected_class = \"\""),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
