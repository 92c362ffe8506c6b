//! Output filename templating.
//!
//! Tile filenames are rendered from a template such as the default
//! [`DEFAULT_TEMPLATE`]:
//!
//! ```text
//! {source_name}_AII_{platform_name}_{sensor}_{name}_{sector_id}_{tile_id}_{start_time:%Y%m%d_%H%M}.nc
//! ```
//!
//! # Template Syntax
//!
//! - `{key}` substitutes the value of `key`.
//! - `{key:spec}` formats it: a strftime pattern for times, `d`, `Nd` or
//!   `0Nd` for integers.
//! - `{{` and `}}` are literal braces.
//!
//! Only the keys in [`KNOWN_KEYS`] exist. A template naming any other key
//! fails with [`TileError::UnknownTemplateKey`] when checked, before any
//! tile is written.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::str::FromStr;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};

use crate::error::{Result, TileError};

/// Default tile filename template.
pub const DEFAULT_TEMPLATE: &str =
    "{source_name}_AII_{platform_name}_{sensor}_{name}_{sector_id}_{tile_id}_{start_time:%Y%m%d_%H%M}.nc";

/// Keys a template may reference.
pub const KNOWN_KEYS: &[&str] = &[
    "source_name",
    "sector_id",
    "platform_name",
    "sensor",
    "name",
    "units",
    "band",
    "tile_id",
    "tile_number",
    "tile_row",
    "tile_column",
    "start_time",
    "end_time",
    "scheduled_time",
];

const INT_KEYS: &[&str] = &["tile_number", "tile_row", "tile_column"];
const TIME_KEYS: &[&str] = &["start_time", "end_time", "scheduled_time"];

/// A value substituted into a template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValue {
    /// Free text, e.g. a sector id.
    Text(String),
    /// An integer, formatted with `d`, `Nd` or `0Nd`.
    Int(i64),
    /// A time, formatted with a strftime pattern.
    Time(DateTime<Utc>),
}

impl From<&str> for TemplateValue {
    fn from(s: &str) -> Self {
        TemplateValue::Text(s.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(s: String) -> Self {
        TemplateValue::Text(s)
    }
}

impl From<usize> for TemplateValue {
    fn from(n: usize) -> Self {
        TemplateValue::Int(n as i64)
    }
}

impl From<DateTime<Utc>> for TemplateValue {
    fn from(t: DateTime<Utc>) -> Self {
        TemplateValue::Time(t)
    }
}

/// Values available to a template for one tile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamingContext {
    values: BTreeMap<String, TemplateValue>,
}

impl NamingContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any previous one.
    pub fn with(mut self, key: &str, value: impl Into<TemplateValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a value, replacing any previous one.
    pub fn insert(&mut self, key: &str, value: impl Into<TemplateValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Value for `key`, if set.
    pub fn get(&self, key: &str) -> Option<&TemplateValue> {
        self.values.get(key)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field { key: String, spec: Option<String> },
}

/// A parsed filename template.
///
/// # Examples
///
/// ```
/// use tilegrid::filename::{FilenameTemplate, NamingContext};
///
/// let template: FilenameTemplate = "{name}_{tile_id}_{tile_number:03d}.nc".parse().unwrap();
/// let ctx = NamingContext::new()
///     .with("name", "C13")
///     .with("tile_id", "TA01")
///     .with("tile_number", 7usize);
/// assert_eq!(template.render(&ctx).unwrap(), "C13_TA01_007.nc");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FilenameTemplate {
    template: String,
    segments: Vec<Segment>,
}

impl FilenameTemplate {
    /// Parse a template.
    ///
    /// # Errors
    ///
    /// Returns [`TileError::TemplateSyntax`] for unbalanced braces, empty
    /// keys and format specs that don't suit the key's value type.
    pub fn parse(template: &str) -> Result<Self> {
        let syntax = |position: usize, reason: &str| TileError::TemplateSyntax {
            template: template.to_string(),
            position,
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices().peekable();

        while let Some((pos, ch)) = chars.next() {
            match ch {
                '{' if chars.peek().map(|&(_, c)| c) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().map(|&(_, c)| c) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(syntax(pos, "unmatched '}'")),
                '{' => {
                    let mut field = String::new();
                    let mut closed = false;
                    for (inner_pos, c) in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(syntax(inner_pos, "'{' inside a field")),
                            _ => field.push(c),
                        }
                    }
                    if !closed {
                        return Err(syntax(pos, "unclosed '{'"));
                    }

                    let (key, spec) = match field.split_once(':') {
                        Some((key, spec)) => (key, Some(spec.to_string())),
                        None => (field.as_str(), None),
                    };
                    if key.is_empty() {
                        return Err(syntax(pos, "empty key"));
                    }
                    if let Some(spec) = &spec {
                        check_spec(key, spec).map_err(|reason| syntax(pos, &reason))?;
                    }

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field {
                        key: key.to_string(),
                        spec,
                    });
                }
                _ => literal.push(ch),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            template: template.to_string(),
            segments,
        })
    }

    /// The template text.
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Keys referenced by the template, in order of appearance.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field { key, .. } => Some(key.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Check that every referenced key is one of [`KNOWN_KEYS`].
    ///
    /// # Errors
    ///
    /// Returns [`TileError::UnknownTemplateKey`] for the first unknown key.
    pub fn check_keys(&self) -> Result<()> {
        match self.keys().find(|k| !KNOWN_KEYS.contains(k)) {
            Some(key) => Err(TileError::UnknownTemplateKey {
                key: key.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Render the template.
    ///
    /// # Errors
    ///
    /// Returns [`TileError::UnknownTemplateKey`] if a referenced key has no
    /// value in `ctx`.
    pub fn render(&self, ctx: &NamingContext) -> Result<String> {
        let mut out = String::with_capacity(self.template.len() + 32);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { key, spec } => {
                    let value = ctx.get(key).ok_or_else(|| TileError::UnknownTemplateKey {
                        key: key.clone(),
                    })?;
                    self.render_value(&mut out, key, value, spec.as_deref())?;
                }
            }
        }
        Ok(out)
    }

    fn render_value(
        &self,
        out: &mut String,
        key: &str,
        value: &TemplateValue,
        spec: Option<&str>,
    ) -> Result<()> {
        let mismatch = |reason: String| TileError::TemplateSyntax {
            template: self.template.clone(),
            position: 0,
            reason,
        };

        match (value, spec) {
            (TemplateValue::Text(s), None | Some("s")) => out.push_str(s),
            (TemplateValue::Int(n), None) => out.push_str(&n.to_string()),
            (TemplateValue::Int(n), Some(spec)) => {
                let (zero_pad, width) = parse_int_spec(spec)
                    .ok_or_else(|| mismatch(format!("bad integer format '{}' for {}", spec, key)))?;
                let formatted = if zero_pad {
                    format!("{:0width$}", n, width = width)
                } else {
                    format!("{:>width$}", n, width = width)
                };
                out.push_str(&formatted);
            }
            (TemplateValue::Time(t), None) => {
                out.push_str(&t.format("%Y-%m-%d %H:%M:%S").to_string())
            }
            (TemplateValue::Time(t), Some(spec)) => {
                if !strftime_is_valid(spec) {
                    return Err(mismatch(format!("bad time format '{}' for {}", spec, key)));
                }
                write!(out, "{}", t.format_with_items(StrftimeItems::new(spec)))
                    .map_err(|_| mismatch(format!("bad time format '{}' for {}", spec, key)))?;
            }
            (TemplateValue::Text(_), Some(spec)) => {
                return Err(mismatch(format!("bad text format '{}' for {}", spec, key)));
            }
        }
        Ok(())
    }
}

impl Default for FilenameTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            segments: Self::parse(DEFAULT_TEMPLATE)
                .map(|t| t.segments)
                .unwrap_or_default(),
        }
    }
}

impl FromStr for FilenameTemplate {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Check a format spec against the value type of a known key. Unknown keys
/// are left to [`FilenameTemplate::check_keys`].
fn check_spec(key: &str, spec: &str) -> std::result::Result<(), String> {
    if TIME_KEYS.contains(&key) {
        if strftime_is_valid(spec) {
            Ok(())
        } else {
            Err(format!("invalid time format '{}'", spec))
        }
    } else if INT_KEYS.contains(&key) {
        parse_int_spec(spec)
            .map(|_| ())
            .ok_or_else(|| format!("invalid integer format '{}'", spec))
    } else if KNOWN_KEYS.contains(&key) && spec != "s" {
        Err(format!("text key {} takes no format spec", key))
    } else {
        Ok(())
    }
}

/// Parse `d`, `Nd` or `0Nd` into `(zero_pad, width)`.
fn parse_int_spec(spec: &str) -> Option<(bool, usize)> {
    let digits = spec.strip_suffix('d')?;
    if digits.is_empty() {
        return Some((false, 0));
    }
    let width: usize = digits.parse().ok()?;
    Some((digits.starts_with('0'), width))
}

fn strftime_is_valid(spec: &str) -> bool {
    !spec.is_empty() && StrftimeItems::new(spec).all(|item| !matches!(item, Item::Error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn context() -> NamingContext {
        let start = Utc.with_ymd_and_hms(2018, 1, 1, 12, 0, 0).unwrap();
        NamingContext::new()
            .with("source_name", "TESTS")
            .with("platform_name", "PLAT")
            .with("sensor", "SENSOR")
            .with("name", "test_ds")
            .with("sector_id", "TEST")
            .with("tile_id", "T001")
            .with("tile_number", 1usize)
            .with("start_time", start)
    }

    #[test]
    fn test_default_template() {
        let template = FilenameTemplate::default();
        assert_eq!(template.as_str(), DEFAULT_TEMPLATE);
        assert!(template.check_keys().is_ok());
        assert_eq!(
            template.render(&context()).unwrap(),
            "TESTS_AII_PLAT_SENSOR_test_ds_TEST_T001_20180101_1200.nc"
        );
    }

    #[test]
    fn test_escaped_braces() {
        let template = FilenameTemplate::parse("{{{name}}}.nc").unwrap();
        assert_eq!(template.render(&context()).unwrap(), "{test_ds}.nc");
    }

    #[test]
    fn test_int_specs() {
        let ctx = context().with("tile_row", 3usize);
        let render = |t: &str| FilenameTemplate::parse(t).unwrap().render(&ctx).unwrap();
        assert_eq!(render("{tile_row}"), "3");
        assert_eq!(render("{tile_row:d}"), "3");
        assert_eq!(render("{tile_row:03d}"), "003");
        assert_eq!(render("{tile_row:3d}"), "  3");
        assert_eq!(render("{tile_row:05d}_{tile_number}"), "00003_1");
    }

    #[test]
    fn test_unformatted_time() {
        let template = FilenameTemplate::parse("{start_time}").unwrap();
        assert_eq!(template.render(&context()).unwrap(), "2018-01-01 12:00:00");
    }

    #[test]
    fn test_keys() {
        let template = FilenameTemplate::parse("{name}_{tile_id}{band}").unwrap();
        let keys: Vec<&str> = template.keys().collect();
        assert_eq!(keys, vec!["name", "tile_id", "band"]);
    }

    #[test]
    fn test_unknown_key() {
        let template = FilenameTemplate::parse("{Bad Key}.nc").unwrap();
        let err = template.check_keys().unwrap_err();
        assert!(matches!(err, TileError::UnknownTemplateKey { ref key } if key == "Bad Key"));
        assert_eq!(err.kind(), crate::error::ErrorKind::Lookup);
    }

    #[test]
    fn test_missing_value() {
        let template = FilenameTemplate::parse("{units}.nc").unwrap();
        assert!(template.check_keys().is_ok());
        assert!(matches!(
            template.render(&context()),
            Err(TileError::UnknownTemplateKey { .. })
        ));
    }

    #[test]
    fn test_syntax_errors() {
        for bad in ["{name", "name}", "{}", "{na{me}}", "{tile_number:x}", "{start_time:%Q}", "{name:03d}"] {
            let result = FilenameTemplate::parse(bad);
            assert!(
                matches!(result, Err(TileError::TemplateSyntax { .. })),
                "expected syntax error for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_syntax_error_position() {
        match FilenameTemplate::parse("abc}") {
            Err(TileError::TemplateSyntax { position, .. }) => assert_eq!(position, 3),
            other => panic!("Expected TemplateSyntax error, got {:?}", other),
        }
    }
}
