//! Evaluator for the query subset the emulator understands:
//!
//! ```text
//! SELECT * FROM <source> [[AS] <alias>]
//!     [WHERE <alias>.<path> = <literal | @param> [AND ...]]
//! ```
//!
//! Literals are JSON strings (double or single quoted), numbers, `true`,
//! `false` and `null`.

use std::sync::LazyLock;

use docdb_sdk::{DocDbError, Document, QueryParameter};
use regex::Regex;
use serde_json::{Number, Value};

#[allow(clippy::expect_used)] // literal pattern
static SELECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^\s*SELECT\s+\*\s+FROM\s+([A-Za-z_]\w*)(?:\s+(?:AS\s+)?([A-Za-z_]\w*))?(?:\s+WHERE\s+(.+?))?\s*$",
    )
    .expect("static regex should not panic")
});

#[allow(clippy::expect_used)] // literal pattern
static CONDITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^\s*([A-Za-z_]\w*)((?:\.[A-Za-z_]\w*)+)\s*=\s*("(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|@[A-Za-z_]\w*|-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?|true|false|null)\s*"#,
    )
    .expect("static regex should not panic")
});

#[allow(clippy::expect_used)] // literal pattern
static AND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^AND\s+").expect("static regex should not panic")
});

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Literal(Value),
    Param(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Condition {
    path: Vec<String>,
    operand: Operand,
}

/// A parsed query, ready to be matched against documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    alias: String,
    conditions: Vec<Condition>,
}

impl Query {
    /// Parse `text`.
    ///
    /// # Errors
    ///
    /// Returns [`DocDbError::BadRequest`] for anything outside the supported subset.
    pub fn parse(text: &str) -> Result<Self, DocDbError> {
        let caps = SELECT
            .captures(text)
            .ok_or_else(|| unsupported(text, "expected SELECT * FROM <source> [WHERE ...]"))?;

        let source = caps.get(1).map_or("", |m| m.as_str());
        let alias = match caps.get(2).map(|m| m.as_str()) {
            Some(alias) if alias.eq_ignore_ascii_case("where") => {
                return Err(unsupported(text, "missing WHERE condition"));
            }
            Some(alias) => alias,
            None => source,
        };

        let conditions = match caps.get(3) {
            Some(clause) => parse_conditions(clause.as_str(), alias, text)?,
            None => Vec::new(),
        };

        Ok(Self {
            alias: alias.to_owned(),
            conditions,
        })
    }

    /// Name documents are referred to by in the WHERE clause.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Check `document` against every condition.
    ///
    /// # Errors
    ///
    /// Returns [`DocDbError::BadRequest`] when a `@param` has no binding.
    pub fn matches(
        &self,
        document: &Document,
        parameters: &[QueryParameter],
    ) -> Result<bool, DocDbError> {
        for condition in &self.conditions {
            let expected = match &condition.operand {
                Operand::Literal(value) => value,
                Operand::Param(name) => parameters
                    .iter()
                    .find(|p| p.name == *name)
                    .map(|p| &p.value)
                    .ok_or_else(|| DocDbError::BadRequest {
                        message: format!("query parameter '{name}' is not bound"),
                    })?,
            };

            let actual = condition
                .path
                .iter()
                .try_fold(document, |value, segment| value.get(segment));

            if !actual.is_some_and(|actual| values_equal(actual, expected)) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn parse_conditions(clause: &str, alias: &str, text: &str) -> Result<Vec<Condition>, DocDbError> {
    let mut conditions = Vec::new();
    let mut rest = clause;

    loop {
        let caps = CONDITION
            .captures(rest)
            .ok_or_else(|| unsupported(text, "expected <alias>.<path> = <value>"))?;

        let root = caps.get(1).map_or("", |m| m.as_str());
        if root != alias {
            return Err(unsupported(text, &format!("unknown identifier '{root}'")));
        }

        let path = caps
            .get(2)
            .map_or("", |m| m.as_str())
            .split('.')
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        let operand = parse_operand(caps.get(3).map_or("", |m| m.as_str()), text)?;
        conditions.push(Condition { path, operand });

        let consumed = caps.get(0).map_or(0, |m| m.end());
        rest = &rest[consumed..];
        if rest.is_empty() {
            return Ok(conditions);
        }

        let sep = AND
            .find(rest)
            .ok_or_else(|| unsupported(text, "conditions must be joined with AND"))?;
        rest = &rest[sep.end()..];
    }
}

fn parse_operand(token: &str, text: &str) -> Result<Operand, DocDbError> {
    if token.starts_with('@') {
        return Ok(Operand::Param(token.to_owned()));
    }
    if let Some(inner) = token
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
    {
        return Ok(Operand::Literal(Value::String(inner.replace("\\'", "'"))));
    }

    let lowered = token.to_ascii_lowercase();
    let literal = match lowered.as_str() {
        "true" | "false" | "null" => lowered.as_str(),
        _ => token,
    };
    serde_json::from_str(literal)
        .map(Operand::Literal)
        .map_err(|_| unsupported(text, &format!("invalid literal {token}")))
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        _ => actual == expected,
    }
}

/// Integers compare exactly; `f64` only when one side is fractional.
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return a == b;
    }
    if !a.is_f64() && !b.is_f64() {
        // a negative i64 against a u64 above i64::MAX
        return false;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
        _ => false,
    }
}

fn unsupported(text: &str, reason: &str) -> DocDbError {
    DocDbError::BadRequest {
        message: format!("unsupported query '{text}': {reason}"),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn param(name: &str, value: Value) -> QueryParameter {
        QueryParameter {
            name: name.to_owned(),
            value,
        }
    }

    #[test]
    fn select_all_matches_everything() {
        let query = Query::parse("SELECT * FROM c").unwrap();
        assert_eq!(query.alias(), "c");
        assert!(query.matches(&json!({ "id": "1" }), &[]).unwrap());
    }

    #[test]
    fn source_with_alias() {
        let query = Query::parse(r#"SELECT * FROM container c WHERE c.key = "1""#).unwrap();
        assert_eq!(query.alias(), "c");
        assert!(query.matches(&json!({ "key": "1" }), &[]).unwrap());
        assert!(!query.matches(&json!({ "key": "2" }), &[]).unwrap());
        assert!(!query.matches(&json!({ "other": "1" }), &[]).unwrap());
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let query = Query::parse("select * from items i where i.n = 3 and i.ok = TRUE").unwrap();
        assert!(query.matches(&json!({ "n": 3, "ok": true }), &[]).unwrap());
        assert!(!query.matches(&json!({ "n": 3, "ok": false }), &[]).unwrap());
    }

    #[test]
    fn nested_paths_and_single_quotes() {
        let query =
            Query::parse("SELECT * FROM c WHERE c.address.city = 'O\\'Fallon'").unwrap();
        assert!(
            query
                .matches(&json!({ "address": { "city": "O'Fallon" } }), &[])
                .unwrap()
        );
    }

    #[test]
    fn string_literal_may_contain_and() {
        let query = Query::parse(r#"SELECT * FROM c WHERE c.name = "salt AND pepper""#).unwrap();
        assert!(query.matches(&json!({ "name": "salt AND pepper" }), &[]).unwrap());
    }

    #[test]
    fn parameters_are_bound_by_name() {
        let query = Query::parse("SELECT * FROM c WHERE c.key = @key").unwrap();
        let params = [param("@key", json!("1"))];
        assert!(query.matches(&json!({ "key": "1" }), &params).unwrap());

        let err = query.matches(&json!({ "key": "1" }), &[]).unwrap_err();
        assert!(matches!(err, DocDbError::BadRequest { .. }));
    }

    #[test]
    fn integer_and_float_compare_equal() {
        let query = Query::parse("SELECT * FROM c WHERE c.n = 2.0").unwrap();
        assert!(query.matches(&json!({ "n": 2 }), &[]).unwrap());
    }

    #[test]
    fn large_integers_compare_exactly() {
        // 2^53 and 2^53 + 1 collapse to the same f64
        let query = Query::parse("SELECT * FROM c WHERE c.n = 9007199254740993").unwrap();
        assert!(!query.matches(&json!({ "n": 9_007_199_254_740_992_u64 }), &[]).unwrap());
        assert!(query.matches(&json!({ "n": 9_007_199_254_740_993_u64 }), &[]).unwrap());

        let query = Query::parse("SELECT * FROM c WHERE c.n = 18446744073709551615").unwrap();
        assert!(query.matches(&json!({ "n": u64::MAX }), &[]).unwrap());
        assert!(!query.matches(&json!({ "n": -1 }), &[]).unwrap());
    }

    #[test]
    fn rejects_unsupported_syntax() {
        for text in [
            "SELECT c.id FROM c",
            "SELECT * FROM c WHERE",
            "SELECT * FROM c WHERE c.n > 1",
            "SELECT * FROM c WHERE x.n = 1",
            "SELECT * FROM c WHERE c.a = 1 OR c.b = 2",
            "DELETE FROM c",
        ] {
            assert!(Query::parse(text).is_err(), "{text} should be rejected");
        }
    }
}
