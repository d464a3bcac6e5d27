use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// `key:"value"` pairs of a Go struct tag
static TAG_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z0-9_.-]+):"((?:[^"\\]|\\.)*)""#).expect("struct tag pattern")
});

/// Parse a raw Go struct tag (with or without backquotes) into key/value pairs
pub fn parse_struct_tag(raw: &str) -> BTreeMap<String, String> {
    let raw = raw.trim();
    let raw = raw
        .strip_prefix('`')
        .and_then(|inner| inner.strip_suffix('`'))
        .unwrap_or(raw);

    TAG_PAIR
        .captures_iter(raw)
        .map(|captures| (captures[1].to_string(), captures[2].to_string()))
        .collect()
}

/// Render a single tag entry in Go syntax: `` `json:"name,omitempty"` ``
pub fn render_tag(key: &str, value: &str) -> String {
    format!("`{}:\"{}\"`", key, value)
}

/// Name part of a tag value: `nm` for `nm,omitempty`.
/// Empty names and `-` do not name anything.
pub fn tag_name(value: &str) -> Option<&str> {
    let name = value.split(',').next().unwrap_or("").trim();
    (!name.is_empty() && name != "-").then_some(name)
}

/// Options following the name part of a tag value
pub fn tag_options(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').skip(1).map(str::trim)
}

/// Tags may be supplied either as a raw Go tag string or as a key/value map
pub(crate) fn deserialize_tags<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTags {
        Text(String),
        Map(BTreeMap<String, String>),
    }

    Ok(match RawTags::deserialize(deserializer)? {
        RawTags::Text(raw) => parse_struct_tag(&raw),
        RawTags::Map(map) => map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_struct_tag() {
        let tags = parse_struct_tag(r#"`json:"nm,omitempty" copy:"nm" db:"full_name"`"#);
        assert_eq!(tags.len(), 3);
        assert_eq!(tags["json"], "nm,omitempty");
        assert_eq!(tags["copy"], "nm");
        assert_eq!(tags["db"], "full_name");
    }

    #[test]
    fn test_parse_struct_tag_sorts_keys() {
        let tags = parse_struct_tag(r#"yaml:"b" json:"a" copy:"c""#);
        assert_eq!(tags.keys().collect::<Vec<_>>(), vec!["copy", "json", "yaml"]);
    }

    #[test]
    fn test_parse_struct_tag_with_escaped_quote() {
        let tags = parse_struct_tag(r#"validate:"oneof=\"a b\"""#);
        assert_eq!(tags["validate"], r#"oneof=\"a b\""#);
    }

    #[test]
    fn test_tag_name() {
        assert_eq!(tag_name("nm,omitempty"), Some("nm"));
        assert_eq!(tag_name("nm"), Some("nm"));
        assert_eq!(tag_name(",omitempty"), None);
        assert_eq!(tag_name("-"), None);
        assert_eq!(tag_name(""), None);
    }

    #[test]
    fn test_tag_options() {
        let options: Vec<_> = tag_options("nm,omitempty, string").collect();
        assert_eq!(options, vec!["omitempty", "string"]);
        assert_eq!(tag_options("nm").count(), 0);
    }

    #[test]
    fn test_render_tag() {
        assert_eq!(render_tag("json", "id"), "`json:\"id\"`");
    }
}
