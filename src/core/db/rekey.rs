/// Rekeying Module
///
/// Turns a result set into a map keyed by each row's first value. Only
/// numeric first values become keys; rows with any other first value are
/// left out of the map.

use crate::core::db::query::Row;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use serde::{Serialize, Serializer};
use std::fmt;

/// Decimal number with optional surrounding whitespace, sign, fraction and exponent
static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t\n\r\x0B\x0C]*[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?[ \t\n\r\x0B\x0C]*$")
        .unwrap()
});

/// Key of a rekeyed result set
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssocKey {
    Int(i64),
    Text(String),
}

/// Rows keyed by their first value, in order of first appearance
pub type RekeyedResultSet = IndexMap<AssocKey, Row>;

impl AssocKey {
    /// Key for a value, or `None` when the value is not numeric
    ///
    /// Reals truncate toward zero. Text in canonical integer form becomes
    /// an integer key; other numeric text is kept as written.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(i) => Some(AssocKey::Int(*i)),
            Value::Real(f) if f.is_finite() => Some(AssocKey::Int(*f as i64)),
            Value::Text(s) => AssocKey::from_text(s),
            Value::Blob(b) => std::str::from_utf8(b).ok().and_then(AssocKey::from_text),
            _ => None,
        }
    }

    fn from_text(s: &str) -> Option<Self> {
        if !is_numeric(s) {
            return None;
        }
        match s.parse::<i64>() {
            Ok(i) if i.to_string() == s => Some(AssocKey::Int(i)),
            _ => Some(AssocKey::Text(s.to_string())),
        }
    }
}

impl fmt::Display for AssocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssocKey::Int(i) => write!(f, "{}", i),
            AssocKey::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for AssocKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AssocKey::Int(i) => serializer.serialize_i64(*i),
            AssocKey::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// True when `s` reads as a decimal number
pub fn is_numeric(s: &str) -> bool {
    NUMERIC_RE.is_match(s)
}

/// Keys every row by its first value, dropping rows whose first value is not numeric
///
/// The first entry is removed from each kept row. A later row with an
/// equal key replaces the earlier one in place.
// NOTE: non-numeric first values drop the whole row; callers relying on
// text keys get an incomplete map.
pub fn rekey(rows: Vec<Row>) -> RekeyedResultSet {
    let mut out = RekeyedResultSet::new();

    for mut row in rows {
        let key = match row.first().and_then(|(_, value)| AssocKey::from_value(value)) {
            Some(key) => key,
            None => continue,
        };
        row.shift();
        out.insert(key, row);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::query::{ColumnKey, FetchStyle};

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn row(values: Vec<Value>, style: FetchStyle) -> Row {
        let columns: Vec<String> = ["k", "a", "b"].iter().map(|s| s.to_string()).collect();
        Row::from_values(&columns, values, style)
    }

    #[test]
    fn test_rekey_drops_non_numeric_rows() {
        let rows = vec![
            row(vec![Value::Integer(1), text("a"), text("x")], FetchStyle::Assoc),
            row(vec![Value::Integer(2), text("b"), text("y")], FetchStyle::Assoc),
            row(vec![text("bad"), text("c"), text("z")], FetchStyle::Assoc),
        ];

        let out = rekey(rows);
        assert_eq!(out.len(), 2);

        let keys: Vec<&AssocKey> = out.keys().collect();
        assert_eq!(keys, [&AssocKey::Int(1), &AssocKey::Int(2)]);

        let first = &out[&AssocKey::Int(1)];
        let values: Vec<&Value> = first.values().collect();
        assert_eq!(values, [&text("a"), &text("x")]);
        assert!(first.by_name("k").is_none());
    }

    #[test]
    fn test_rekey_num_style_renumbers() {
        let rows = vec![row(vec![text("10"), text("a"), text("x")], FetchStyle::Num)];

        let out = rekey(rows);
        let rest = &out[&AssocKey::Int(10)];
        assert_eq!(rest.by_position(0), Some(&text("a")));
        assert_eq!(rest.by_position(1), Some(&text("x")));
    }

    #[test]
    fn test_rekey_both_style_removes_only_the_name_entry() {
        let rows = vec![row(vec![Value::Integer(4), text("a"), text("x")], FetchStyle::Both)];

        let out = rekey(rows);
        let rest = &out[&AssocKey::Int(4)];
        assert_eq!(rest.first(), Some((&ColumnKey::Index(0), &Value::Integer(4))));
        assert_eq!(rest.len(), 5);
    }

    #[test]
    fn test_rekey_later_duplicate_replaces_in_place() {
        let rows = vec![
            row(vec![Value::Integer(1), text("first"), Value::Null], FetchStyle::Assoc),
            row(vec![Value::Integer(2), text("second"), Value::Null], FetchStyle::Assoc),
            row(vec![Value::Integer(1), text("third"), Value::Null], FetchStyle::Assoc),
        ];

        let out = rekey(rows);
        assert_eq!(out.len(), 2);
        let (key, first) = out.first().unwrap();
        assert_eq!(key, &AssocKey::Int(1));
        assert_eq!(first.by_name("a"), Some(&text("third")));
    }

    #[test]
    fn test_rekey_skips_null_and_empty_rows() {
        let rows = vec![
            row(vec![Value::Null, text("a"), text("x")], FetchStyle::Assoc),
            Row::new(),
        ];
        assert!(rekey(rows).is_empty());
    }

    #[test]
    fn test_key_normalization() {
        assert_eq!(AssocKey::from_value(&Value::Integer(-3)), Some(AssocKey::Int(-3)));
        assert_eq!(AssocKey::from_value(&Value::Real(2.9)), Some(AssocKey::Int(2)));
        assert_eq!(AssocKey::from_value(&Value::Real(f64::NAN)), None);
        assert_eq!(AssocKey::from_value(&text("42")), Some(AssocKey::Int(42)));
        assert_eq!(AssocKey::from_value(&text("042")), Some(AssocKey::Text("042".into())));
        assert_eq!(AssocKey::from_value(&text("1.5")), Some(AssocKey::Text("1.5".into())));
        assert_eq!(AssocKey::from_value(&text(" 7")), Some(AssocKey::Text(" 7".into())));
        assert_eq!(AssocKey::from_value(&text("-0")), Some(AssocKey::Text("-0".into())));
        assert_eq!(AssocKey::from_value(&Value::Blob(b"12".to_vec())), Some(AssocKey::Int(12)));
        assert_eq!(AssocKey::from_value(&text("abc")), None);
        assert_eq!(AssocKey::from_value(&Value::Null), None);
    }

    #[test]
    fn test_is_numeric() {
        for s in ["0", "-12", "+3", "1.5", ".5", "5.", "1e10", "2.5E-3", " 12 ", "\t9\n"] {
            assert!(is_numeric(s), "{:?} should be numeric", s);
        }
        for s in ["", " ", "abc", "1a", "0x1A", "inf", "NaN", "1e", "--1", ".", "1 2"] {
            assert!(!is_numeric(s), "{:?} should not be numeric", s);
        }
    }

    #[test]
    fn test_rekeyed_set_serializes_with_keys() {
        let rows = vec![row(vec![Value::Integer(1), text("a"), Value::Integer(9)], FetchStyle::Assoc)];
        let out = rekey(rows);

        let json = serde_json::to_string(&out).unwrap();
        assert_eq!(json, r#"{"1":{"a":"a","b":9}}"#);
    }
}
