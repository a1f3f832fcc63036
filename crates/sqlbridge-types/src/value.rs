use serde::{Deserialize, Serialize};

/// A dynamically typed SQLite value.
///
/// Mirrors the five fundamental storage classes of the engine. Values read
/// from `sqlite3_value` handles and values written back through
/// `sqlite3_result_*` both go through this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqliteValue {
    /// SQL NULL.
    Null,
    /// A 64-bit signed integer.
    Integer(i64),
    /// A 64-bit IEEE 754 floating-point number.
    Float(f64),
    /// A UTF-8 text string.
    Text(String),
    /// A binary large object.
    Blob(Vec<u8>),
}

impl SqliteValue {
    /// Whether this value is SQL NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to extract an integer value.
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to extract a text reference.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to extract a blob reference.
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Convert to an integer following SQLite's type coercion rules.
    ///
    /// - NULL -> 0
    /// - Integer -> itself
    /// - Float -> truncated to i64
    /// - Text -> attempt to parse, 0 on failure
    /// - Blob -> 0
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_integer(&self) -> i64 {
        match self {
            Self::Null | Self::Blob(_) => 0,
            Self::Integer(i) => *i,
            Self::Float(f) => *f as i64,
            Self::Text(s) => s
                .trim()
                .parse::<i64>()
                .unwrap_or_else(|_| s.trim().parse::<f64>().map_or(0, |f| f as i64)),
        }
    }

    /// Returns the SQLite `typeof()` string for this value.
    pub const fn typeof_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Float(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }
}

impl From<i64> for SqliteValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for SqliteValue {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for SqliteValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for SqliteValue {
    fn from(b: bool) -> Self {
        Self::Integer(i64::from(b))
    }
}

impl From<String> for SqliteValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for SqliteValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<Vec<u8>> for SqliteValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Blob(b)
    }
}

impl From<&[u8]> for SqliteValue {
    fn from(b: &[u8]) -> Self {
        Self::Blob(b.to_vec())
    }
}

impl<T: Into<Self>> From<Option<T>> for SqliteValue {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercions_follow_sqlite_rules() {
        assert_eq!(SqliteValue::Null.to_integer(), 0);
        assert_eq!(SqliteValue::Float(3.9).to_integer(), 3);
        assert_eq!(SqliteValue::from(" 42 ").to_integer(), 42);
        assert_eq!(SqliteValue::from("2.5").to_integer(), 2);
        assert_eq!(SqliteValue::from("abc").to_integer(), 0);
        assert_eq!(SqliteValue::Blob(vec![1]).to_integer(), 0);
    }

    #[test]
    fn accessors() {
        assert_eq!(SqliteValue::Integer(5).as_integer(), Some(5));
        assert_eq!(SqliteValue::from("x").as_text(), Some("x"));
        assert_eq!(SqliteValue::from(vec![1_u8, 2]).as_blob(), Some(&[1_u8, 2][..]));
        assert!(SqliteValue::from(None::<i64>).is_null());
        assert_eq!(SqliteValue::from(true), SqliteValue::Integer(1));
    }

    #[test]
    fn typeof_strings() {
        assert_eq!(SqliteValue::Null.typeof_str(), "null");
        assert_eq!(SqliteValue::Float(0.5).typeof_str(), "real");
        assert_eq!(SqliteValue::Blob(Vec::new()).typeof_str(), "blob");
    }

    #[test]
    fn serde_shape_is_externally_tagged() {
        let json = serde_json::to_string(&SqliteValue::Integer(9)).unwrap();
        assert_eq!(json, r#"{"Integer":9}"#);
        let back: SqliteValue = serde_json::from_str(r#"{"Text":"a"}"#).unwrap();
        assert_eq!(back, SqliteValue::from("a"));
    }
}
