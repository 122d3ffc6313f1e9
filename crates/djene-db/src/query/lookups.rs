//! Filter lookups and `field__operator` keyword parsing.
//!
//! A filter keyword like `rank__isnull` or plain `name` is parsed once, at
//! the `filter`/`exclude` call, into a [`FilterClause`]: a field name, a
//! [`Lookup`] from a closed operator set, and an exclude flag. There is no
//! string dispatch past this point; unknown operator suffixes are rejected
//! immediately as a configuration error.
//!
//! # Examples
//!
//! ```
//! use djene_db::query::lookups::{FilterClause, Lookup};
//! use djene_db::value::Value;
//!
//! let clause = FilterClause::parse("age__gte", Value::from(18), false).unwrap();
//! assert_eq!(clause.field, "age");
//! assert_eq!(clause.lookup, Lookup::Gte(Value::Int(18)));
//!
//! // No suffix defaults to equality.
//! let clause = FilterClause::parse("name", Value::from("Cloud"), false).unwrap();
//! assert_eq!(clause.lookup, Lookup::Exact(Value::from("Cloud")));
//! ```

use crate::value::Value;
use djene_core::{DjeneError, DjeneResult};

/// A field-level lookup operation.
///
/// Each variant corresponds to an operator suffix in the keyword syntax
/// (`field__gt`, `field__in`, ...) and produces the matching SQL WHERE
/// fragment when compiled.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Exact match (`field = value`); `IS NULL` when the value is null.
    Exact(Value),
    /// Greater than (`field > value`).
    Gt(Value),
    /// Greater than or equal (`field >= value`).
    Gte(Value),
    /// Less than (`field < value`).
    Lt(Value),
    /// Less than or equal (`field <= value`).
    Lte(Value),
    /// Membership test (`field IN (values...)`).
    In(Vec<Value>),
    /// NULL test (`field IS NULL` when true, `IS NOT NULL` when false).
    IsNull(bool),
    /// Inclusive range test (`field BETWEEN low AND high`).
    Between(Value, Value),
    /// Raw LIKE with a caller-supplied pattern.
    Like(String),
    /// Case-insensitive LIKE with a caller-supplied pattern.
    ILike(String),
    /// Substring match (`field LIKE '%value%'`).
    Contains(String),
    /// Prefix match (`field LIKE 'value%'`).
    StartsWith(String),
    /// Suffix match (`field LIKE '%value'`).
    EndsWith(String),
}

impl Lookup {
    /// Parses an operator suffix and its value into a lookup.
    ///
    /// The recognized suffixes are `eq`, `gt`, `gte`, `lt`, `lte`, `in`,
    /// `isnull`, `range`, `between`, `like`, `ilike`, `contains`,
    /// `startswith`, and `endswith`. Anything else is a configuration
    /// error, as is a value of the wrong shape (`in`/`range` need a list,
    /// pattern lookups need a string).
    pub fn parse(op: &str, value: Value) -> DjeneResult<Self> {
        match op {
            "eq" => Ok(Self::Exact(value)),
            "gt" => Ok(Self::Gt(value)),
            "gte" => Ok(Self::Gte(value)),
            "lt" => Ok(Self::Lt(value)),
            "lte" => Ok(Self::Lte(value)),
            "in" => match value {
                Value::List(vals) => Ok(Self::In(vals)),
                other => Err(DjeneError::ConfigurationError(format!(
                    "`in` lookup requires a list of values, got {other:?}"
                ))),
            },
            "isnull" => Ok(Self::IsNull(value.is_truthy())),
            "range" | "between" => match value {
                Value::List(mut vals) if vals.len() == 2 => {
                    let high = vals.pop().unwrap_or(Value::Null);
                    let low = vals.pop().unwrap_or(Value::Null);
                    Ok(Self::Between(low, high))
                }
                _ => Err(DjeneError::ConfigurationError(
                    "`range` lookup requires a list with exactly two elements".to_string(),
                )),
            },
            "like" => Self::string_arg(op, value).map(Self::Like),
            "ilike" => Self::string_arg(op, value).map(Self::ILike),
            "contains" => Self::string_arg(op, value).map(Self::Contains),
            "startswith" => Self::string_arg(op, value).map(Self::StartsWith),
            "endswith" => Self::string_arg(op, value).map(Self::EndsWith),
            other => Err(DjeneError::ConfigurationError(format!(
                "Unsupported lookup filter: {other}"
            ))),
        }
    }

    fn string_arg(op: &str, value: Value) -> DjeneResult<String> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(DjeneError::ConfigurationError(format!(
                "`{op}` lookup requires a string value, got {other:?}"
            ))),
        }
    }
}

/// A single parsed filter clause: field, lookup, and negation flag.
///
/// Clauses are immutable after parsing and owned by the queryset whose
/// filter list they belong to.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    /// The field name the clause applies to.
    pub field: String,
    /// The lookup operation.
    pub lookup: Lookup,
    /// Whether the compiled predicate is negated (`exclude`).
    pub exclude: bool,
}

impl FilterClause {
    /// Parses a `field[__operator]` keyword and value into a clause.
    ///
    /// The default operator when no suffix is present is `eq`.
    pub fn parse(key: &str, value: Value, exclude: bool) -> DjeneResult<Self> {
        let (field, op) = key.split_once("__").map_or((key, "eq"), |(f, o)| (f, o));
        Ok(Self {
            field: field.to_string(),
            lookup: Lookup::parse(op, value)?,
            exclude,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_eq() {
        let clause = FilterClause::parse("name", Value::from("Cloud"), false).unwrap();
        assert_eq!(clause.field, "name");
        assert_eq!(clause.lookup, Lookup::Exact(Value::from("Cloud")));
        assert!(!clause.exclude);
    }

    #[test]
    fn test_parse_comparison_suffixes() {
        assert_eq!(
            Lookup::parse("gt", Value::from(5)).unwrap(),
            Lookup::Gt(Value::Int(5))
        );
        assert_eq!(
            Lookup::parse("gte", Value::from(5)).unwrap(),
            Lookup::Gte(Value::Int(5))
        );
        assert_eq!(
            Lookup::parse("lt", Value::from(5)).unwrap(),
            Lookup::Lt(Value::Int(5))
        );
        assert_eq!(
            Lookup::parse("lte", Value::from(5)).unwrap(),
            Lookup::Lte(Value::Int(5))
        );
    }

    #[test]
    fn test_parse_in() {
        let lookup = Lookup::parse("in", Value::List(vec![Value::Int(1), Value::Int(2)])).unwrap();
        assert_eq!(lookup, Lookup::In(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn test_parse_in_requires_list() {
        let err = Lookup::parse("in", Value::Int(1)).unwrap_err();
        assert!(matches!(err, DjeneError::ConfigurationError(_)));
    }

    #[test]
    fn test_parse_isnull_truthiness() {
        assert_eq!(
            Lookup::parse("isnull", Value::Bool(true)).unwrap(),
            Lookup::IsNull(true)
        );
        assert_eq!(
            Lookup::parse("isnull", Value::Bool(false)).unwrap(),
            Lookup::IsNull(false)
        );
        // Python truthiness: 0 is falsey, 1 is truthy.
        assert_eq!(
            Lookup::parse("isnull", Value::Int(0)).unwrap(),
            Lookup::IsNull(false)
        );
        assert_eq!(
            Lookup::parse("isnull", Value::Int(1)).unwrap(),
            Lookup::IsNull(true)
        );
    }

    #[test]
    fn test_parse_range() {
        let lookup =
            Lookup::parse("range", Value::List(vec![Value::Int(1), Value::Int(10)])).unwrap();
        assert_eq!(lookup, Lookup::Between(Value::Int(1), Value::Int(10)));
    }

    #[test]
    fn test_parse_between_alias() {
        let lookup =
            Lookup::parse("between", Value::List(vec![Value::Int(1), Value::Int(10)])).unwrap();
        assert_eq!(lookup, Lookup::Between(Value::Int(1), Value::Int(10)));
    }

    #[test]
    fn test_parse_range_wrong_arity() {
        let err = Lookup::parse("range", Value::List(vec![Value::Int(1)])).unwrap_err();
        assert!(matches!(err, DjeneError::ConfigurationError(_)));

        let err = Lookup::parse("range", Value::Int(1)).unwrap_err();
        assert!(matches!(err, DjeneError::ConfigurationError(_)));
    }

    #[test]
    fn test_parse_pattern_lookups() {
        assert_eq!(
            Lookup::parse("contains", Value::from("lo")).unwrap(),
            Lookup::Contains("lo".to_string())
        );
        assert_eq!(
            Lookup::parse("startswith", Value::from("Cl")).unwrap(),
            Lookup::StartsWith("Cl".to_string())
        );
        assert_eq!(
            Lookup::parse("endswith", Value::from("fe")).unwrap(),
            Lookup::EndsWith("fe".to_string())
        );
        assert_eq!(
            Lookup::parse("like", Value::from("C%d")).unwrap(),
            Lookup::Like("C%d".to_string())
        );
        assert_eq!(
            Lookup::parse("ilike", Value::from("c%D")).unwrap(),
            Lookup::ILike("c%D".to_string())
        );
    }

    #[test]
    fn test_parse_pattern_requires_string() {
        let err = Lookup::parse("contains", Value::Int(1)).unwrap_err();
        assert!(matches!(err, DjeneError::ConfigurationError(_)));
    }

    #[test]
    fn test_parse_unknown_suffix() {
        let err = Lookup::parse("regex", Value::from("^a")).unwrap_err();
        match err {
            DjeneError::ConfigurationError(msg) => {
                assert!(msg.contains("regex"));
            }
            other => panic!("expected ConfigurationError, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_clause_with_suffix_and_exclude() {
        let clause = FilterClause::parse("rank__isnull", Value::Bool(true), true).unwrap();
        assert_eq!(clause.field, "rank");
        assert_eq!(clause.lookup, Lookup::IsNull(true));
        assert!(clause.exclude);
    }

    #[test]
    fn test_parse_clause_unknown_suffix_is_immediate() {
        let err = FilterClause::parse("name__fuzzy", Value::from("x"), false).unwrap_err();
        assert!(matches!(err, DjeneError::ConfigurationError(_)));
    }
}
