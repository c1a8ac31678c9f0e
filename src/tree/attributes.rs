//! Argument attributes.
//!
//! Attributes are a flat list of strings attached to an argument. Entries
//! containing `=` are keyword attributes, everything else is a plain option:
//!
//! ```yaml
//! attributes:
//!   - search              # option
//!   - multiselect         # option
//!   - height=5            # keyword "height" -> ["5"]
//!   - value,expand=2      # keywords "value" and "expand" -> ["2"]
//!   - hidden=3,4          # keyword "hidden" -> ["3", "4"]
//! ```

use std::collections::HashMap;

use serde_json::Value;

/// Keyword attributes plus a flat option set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    keywords: HashMap<String, Vec<String>>,
    options: Vec<String>,
}

impl Attributes {
    /// Parses attributes from the raw declaration list.
    ///
    /// Non-string entries are skipped rather than rejected.
    pub fn from_value(value: Option<&Value>) -> Self {
        let mut attrs = Self::default();
        let Some(Value::Array(items)) = value else {
            return attrs;
        };

        for item in items {
            if let Value::String(attr) = item {
                attrs.push(attr);
            }
        }
        attrs
    }

    /// Builds attributes from plain strings.
    pub fn from_strs<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut attrs = Self::default();
        for item in items {
            attrs.push(item.as_ref());
        }
        attrs
    }

    fn push(&mut self, attr: &str) {
        match attr.split_once('=') {
            Some((keys, values)) => {
                let keys = keys.replace(' ', "");
                for key in keys.trim().split(',') {
                    let slot = self.keywords.entry(key.to_string()).or_default();
                    slot.extend(values.split(',').map(|v| v.trim().to_string()));
                }
            }
            None => self.options.push(attr.to_string()),
        }
    }

    /// Returns `true` if the plain option is present.
    pub fn has_option(&self, opt: &str) -> bool {
        self.options.iter().any(|o| o == opt)
    }

    /// Returns `true` if the keyword carries every one of `attrs`.
    pub fn keyword_has_all(&self, key: &str, attrs: &[&str]) -> bool {
        let Some(values) = self.keywords.get(key) else {
            return false;
        };
        attrs.iter().all(|a| values.iter().any(|v| v == a))
    }

    /// Returns `true` if the keyword carries at least one of `attrs`.
    pub fn keyword_has_any(&self, key: &str, attrs: &[&str]) -> bool {
        let Some(values) = self.keywords.get(key) else {
            return false;
        };
        attrs.iter().any(|a| values.iter().any(|v| v == a))
    }

    /// First value of a keyword, or an empty string.
    pub fn keyword_str(&self, key: &str) -> &str {
        self.keywords
            .get(key)
            .and_then(|v| v.first())
            .map_or("", String::as_str)
    }

    /// All values of a keyword.
    pub fn keyword_strs(&self, key: &str) -> &[String] {
        self.keywords.get(key).map_or(&[], Vec::as_slice)
    }

    /// First value of a keyword as an integer, `-1` when absent or not a number.
    pub fn keyword_int(&self, key: &str) -> i64 {
        self.keyword_str(key).parse().unwrap_or(-1)
    }

    /// All values of a keyword as integers. Any non-number yields an empty list.
    pub fn keyword_ints(&self, key: &str) -> Vec<i64> {
        self.keyword_strs(key)
            .iter()
            .map(|v| v.parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Attributes {
        let raw = json!(["search", "multiselect", "height=5", "value, expand=2", "hidden=3,4", 42]);
        Attributes::from_value(Some(&raw))
    }

    #[test]
    fn test_options_and_keywords_are_split() {
        let attrs = sample();
        assert!(attrs.has_option("search"));
        assert!(attrs.has_option("multiselect"));
        assert!(!attrs.has_option("height"));
        assert_eq!(attrs.keyword_int("height"), 5);
    }

    #[test]
    fn test_key_lists_share_values() {
        let attrs = sample();
        assert_eq!(attrs.keyword_str("value"), "2");
        assert_eq!(attrs.keyword_str("expand"), "2");
    }

    #[test]
    fn test_keyword_lookups() {
        let attrs = sample();
        assert_eq!(attrs.keyword_ints("hidden"), vec![3, 4]);
        assert!(attrs.keyword_has_all("hidden", &["3", "4"]));
        assert!(!attrs.keyword_has_all("hidden", &["3", "5"]));
        assert!(attrs.keyword_has_any("hidden", &["5", "4"]));
        assert!(!attrs.keyword_has_any("missing", &["1"]));
    }

    #[test]
    fn test_sentinels_on_missing_or_bad_values() {
        let attrs = Attributes::from_strs(["width=wide", "cols=1,x"]);
        assert_eq!(attrs.keyword_int("width"), -1);
        assert_eq!(attrs.keyword_int("nope"), -1);
        assert_eq!(attrs.keyword_str("nope"), "");
        assert!(attrs.keyword_ints("cols").is_empty());
    }

    #[test]
    fn test_missing_attributes_are_empty() {
        let attrs = Attributes::from_value(None);
        assert_eq!(attrs, Attributes::default());
    }
}
