use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocaleError {
    #[error("Failed to read locale file at {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse locale file at {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid locale bundle for '{language}': {reason}")]
    Invalid { language: String, reason: String },
}

/// Static configuration bundle for one language variant of a wiki.
///
/// Bundles are produced by the host's localization service once at process
/// start and treated as read-only afterwards. The engine compiles one
/// timestamp matcher per bundle; the first bundle in a [`Locales`] list is
/// also the source of site-wide settings (timezone, namespaces, paths).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleConfig {
    /// Variant key, e.g. "en" or "nl". Position in the list is priority.
    pub language: String,
    /// Date-format template using single-letter codes (Y F M xg n m j d D l
    /// G H i), backslash escapes and double-quoted literals.
    pub date_format: String,
    /// Ten digit glyphs when the variant uses localized numerals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digits: Option<Vec<String>>,
    /// Twelve month names as they appear in rendered signatures.
    pub month_names: Vec<String>,
    /// Twelve genitive month names; falls back to `month_names` when empty.
    #[serde(default)]
    pub month_names_genitive: Vec<String>,
    /// Seven weekday names, Sunday first.
    #[serde(default)]
    pub day_names: Vec<String>,
    /// IANA zone name the wiki renders local times in.
    pub timezone: String,
    /// Localized timezone abbreviation -> canonical abbreviation.
    pub timezone_abbreviations: HashMap<String, String>,
    /// Namespace names whose links identify a user ("User", "User talk", ...).
    pub user_namespaces: Vec<String>,
    /// Title prefix of the contributions special page.
    pub contributions_page: String,
    /// Href prefix of internal wiki links, e.g. "/wiki/".
    pub article_path: String,
}

impl LocaleConfig {
    /// Built-in English bundle matching the default signature format
    /// "HH:MM, D Month YYYY (UTC)". Used by tests and as a development
    /// fallback when no localization service is wired up.
    pub fn english() -> Self {
        LocaleConfig {
            language: "en".to_string(),
            date_format: "H:i, j F Y".to_string(),
            digits: None,
            month_names: [
                "January",
                "February",
                "March",
                "April",
                "May",
                "June",
                "July",
                "August",
                "September",
                "October",
                "November",
                "December",
            ]
            .map(String::from)
            .to_vec(),
            month_names_genitive: Vec::new(),
            day_names: [
                "Sunday",
                "Monday",
                "Tuesday",
                "Wednesday",
                "Thursday",
                "Friday",
                "Saturday",
            ]
            .map(String::from)
            .to_vec(),
            timezone: "Etc/UTC".to_string(),
            timezone_abbreviations: HashMap::from([("UTC".to_string(), "UTC".to_string())]),
            user_namespaces: vec!["User".to_string(), "User talk".to_string()],
            contributions_page: "Special:Contributions".to_string(),
            article_path: "/wiki/".to_string(),
        }
    }

    /// Genitive month names with the plain-name fallback applied.
    pub fn genitive_months(&self) -> &[String] {
        if self.month_names_genitive.is_empty() {
            &self.month_names
        } else {
            &self.month_names_genitive
        }
    }

    pub fn validate(&self) -> Result<(), LocaleError> {
        let invalid = |reason: String| LocaleError::Invalid {
            language: self.language.clone(),
            reason,
        };
        if let Some(digits) = &self.digits
            && digits.len() != 10
        {
            return Err(invalid(format!("expected 10 digit glyphs, got {}", digits.len())));
        }
        if self.month_names.len() != 12 {
            return Err(invalid(format!(
                "expected 12 month names, got {}",
                self.month_names.len()
            )));
        }
        if !self.month_names_genitive.is_empty() && self.month_names_genitive.len() != 12 {
            return Err(invalid(format!(
                "expected 12 genitive month names, got {}",
                self.month_names_genitive.len()
            )));
        }
        if !self.day_names.is_empty() && self.day_names.len() != 7 {
            return Err(invalid(format!(
                "expected 7 weekday names, got {}",
                self.day_names.len()
            )));
        }
        if self.date_format.is_empty() {
            return Err(invalid("empty date format".to_string()));
        }
        Ok(())
    }
}

/// The full set of language variants active on a site, in priority order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Locales {
    pub variants: Vec<LocaleConfig>,
}

impl Locales {
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, LocaleError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LocaleError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        let locales: Locales =
            toml::from_str(&content).map_err(|source| LocaleError::ParseError {
                path: path.to_path_buf(),
                source,
            })?;

        for variant in &locales.variants {
            variant.validate()?;
        }

        Ok(locales)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_english_bundle_is_valid() {
        let config = LocaleConfig::english();
        assert!(config.validate().is_ok());
        assert_eq!(config.month_names.len(), 12);
        assert_eq!(config.day_names.len(), 7);
        // Genitive falls back to the plain names
        assert_eq!(config.genitive_months(), config.month_names.as_slice());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let original = Locales {
            variants: vec![LocaleConfig::english()],
        };

        let toml_str = toml::to_string(&original).unwrap();
        let deserialized: Locales = toml::from_str(&toml_str).unwrap();

        assert_eq!(deserialized.variants.len(), 1);
        assert_eq!(deserialized.variants[0].language, "en");
        assert_eq!(deserialized.variants[0].date_format, "H:i, j F Y");
    }

    #[test]
    fn test_load_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        let toml_str = toml::to_string(&Locales {
            variants: vec![LocaleConfig::english()],
        })
        .unwrap();
        file.write_all(toml_str.as_bytes()).unwrap();

        let loaded = Locales::load_from_path(file.path()).unwrap();
        assert_eq!(loaded.variants[0].timezone, "Etc/UTC");
    }

    #[test]
    fn test_load_from_missing_path() {
        let result = Locales::load_from_path("/this/path/does/not/exist.toml");
        assert!(matches!(result, Err(LocaleError::ReadError { .. })));
    }

    #[test]
    fn test_validate_rejects_wrong_month_count() {
        let mut config = LocaleConfig::english();
        config.month_names.pop();
        let result = config.validate();
        assert!(matches!(result, Err(LocaleError::Invalid { .. })));
        assert!(result.unwrap_err().to_string().contains("12 month names"));
    }

    #[test]
    fn test_validate_rejects_wrong_digit_count() {
        let mut config = LocaleConfig::english();
        config.digits = Some(vec!["٠".to_string(); 9]);
        assert!(config.validate().is_err());
    }
}
