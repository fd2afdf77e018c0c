//! Path-addressed property extraction and filter rendering.
//!
//! Property bags live in a JSON column. Paths are validated up front and
//! inlined as literals (so SQLite can match expression indexes); filter
//! values are always bound as parameters.

use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};

use crate::{errors::GraphError, statement::ParamList};

/// Reserved prefix marking an operator key inside a filter object.
pub const OPERATOR_SIGIL: char = '$';

/// A validated dot-separated property path such as `address.city` or `tags[0]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyPath {
    raw: String,
    json_path: String,
}

impl PropertyPath {
    pub fn parse(raw: &str) -> Result<Self, GraphError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(GraphError::validation("property path must be set"));
        }
        let mut json_path = String::from("$");
        for segment in trimmed.split('.') {
            let (name, indexes) = match segment.find('[') {
                Some(pos) => segment.split_at(pos),
                None => (segment, ""),
            };
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(GraphError::validation(format!(
                    "invalid property path '{raw}': bad segment '{segment}'"
                )));
            }
            json_path.push('.');
            json_path.push_str(name);
            validate_indexes(raw, indexes)?;
            json_path.push_str(indexes);
        }
        Ok(Self {
            raw: trimmed.to_string(),
            json_path,
        })
    }

    /// Addresses a single top-level key verbatim (dots are not path separators).
    pub fn top_level(key: &str) -> Result<Self, GraphError> {
        if key.is_empty() {
            return Err(GraphError::validation("property key must be set"));
        }
        if key.chars().any(|c| c == '"' || c == '\'' || c == '\\' || c.is_control()) {
            return Err(GraphError::validation(format!(
                "property key '{}' contains quote, backslash or control characters",
                key.escape_debug()
            )));
        }
        Ok(Self {
            raw: key.to_string(),
            json_path: format!("$.\"{key}\""),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// SQLite JSON path, e.g. `$.address.city`.
    pub fn json_path(&self) -> &str {
        &self.json_path
    }

    pub fn extract_sql(&self, column: &str) -> String {
        format!("json_extract({column}, '{}')", self.json_path)
    }

    fn type_sql(&self, column: &str) -> String {
        format!("json_type({column}, '{}')", self.json_path)
    }
}

fn validate_indexes(raw: &str, mut rest: &str) -> Result<(), GraphError> {
    while !rest.is_empty() {
        let close = rest.find(']');
        let valid = rest.starts_with('[')
            && close.is_some_and(|end| end > 1 && rest[1..end].chars().all(|c| c.is_ascii_digit()));
        if !valid {
            return Err(GraphError::validation(format!(
                "invalid property path '{raw}': bad index '{rest}'"
            )));
        }
        rest = &rest[close.map_or(rest.len(), |end| end + 1)..];
    }
    Ok(())
}

/// Comparison operators accepted inside `{"$op": value}` filter objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
    Ne,
    In,
}

impl Comparison {
    pub fn from_token(token: &str) -> Result<Self, GraphError> {
        match token {
            "$gt" => Ok(Comparison::Gt),
            "$gte" => Ok(Comparison::Gte),
            "$lt" => Ok(Comparison::Lt),
            "$lte" => Ok(Comparison::Lte),
            "$ne" => Ok(Comparison::Ne),
            "$in" => Ok(Comparison::In),
            other => Err(GraphError::validation(format!(
                "unknown filter operator '{other}'"
            ))),
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Comparison::Gt => "$gt",
            Comparison::Gte => "$gte",
            Comparison::Lt => "$lt",
            Comparison::Lte => "$lte",
            Comparison::Ne => "$ne",
            Comparison::In => "$in",
        }
    }

    fn sql_operator(&self) -> &'static str {
        match self {
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::Ne => "IS NOT",
            Comparison::In => "IN",
        }
    }
}

/// A filter on one property path: exact equality or a conjunction of comparisons.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyFilter {
    Equals(Value),
    Compare(Vec<(Comparison, Value)>),
}

impl PropertyFilter {
    pub fn eq(value: impl Into<Value>) -> Self {
        PropertyFilter::Equals(value.into())
    }

    pub fn gt(value: impl Into<Value>) -> Self {
        PropertyFilter::Compare(vec![(Comparison::Gt, value.into())])
    }

    pub fn gte(value: impl Into<Value>) -> Self {
        PropertyFilter::Compare(vec![(Comparison::Gte, value.into())])
    }

    pub fn lt(value: impl Into<Value>) -> Self {
        PropertyFilter::Compare(vec![(Comparison::Lt, value.into())])
    }

    pub fn lte(value: impl Into<Value>) -> Self {
        PropertyFilter::Compare(vec![(Comparison::Lte, value.into())])
    }

    pub fn ne(value: impl Into<Value>) -> Self {
        PropertyFilter::Compare(vec![(Comparison::Ne, value.into())])
    }

    pub fn one_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let items = values.into_iter().map(Into::into).collect();
        PropertyFilter::Compare(vec![(Comparison::In, Value::Array(items))])
    }

    /// Interprets a filter value. Objects whose keys carry the operator sigil
    /// are comparisons; every other value, plain objects included, is equality.
    pub fn from_value(value: Value) -> Result<Self, GraphError> {
        let Value::Object(map) = value else {
            return Ok(PropertyFilter::Equals(value));
        };
        let operator_keys = map.keys().filter(|k| k.starts_with(OPERATOR_SIGIL)).count();
        if operator_keys == 0 {
            return Ok(PropertyFilter::Equals(Value::Object(map)));
        }
        if operator_keys != map.len() {
            return Err(GraphError::validation(format!(
                "filter object mixes operators and plain keys: {}",
                Value::Object(map)
            )));
        }
        let mut comparisons = Vec::with_capacity(map.len());
        for (key, operand) in map {
            comparisons.push((Comparison::from_token(&key)?, operand));
        }
        Ok(PropertyFilter::Compare(comparisons))
    }

    /// Renders the filter as a boolean SQL expression over `column`.
    pub(crate) fn render(
        &self,
        path: &PropertyPath,
        column: &str,
        params: &mut ParamList,
    ) -> Result<String, GraphError> {
        match self {
            PropertyFilter::Equals(value) => Ok(render_equals(path, column, value, params)),
            PropertyFilter::Compare(comparisons) => {
                if comparisons.is_empty() {
                    return Err(GraphError::validation(format!(
                        "empty operator object for '{}'",
                        path.as_str()
                    )));
                }
                let mut clauses = Vec::with_capacity(comparisons.len());
                for (op, operand) in comparisons {
                    clauses.push(render_comparison(path, column, *op, operand, params)?);
                }
                Ok(clauses.join(" AND "))
            }
        }
    }
}

fn render_equals(path: &PropertyPath, column: &str, value: &Value, params: &mut ParamList) -> String {
    match value {
        Value::Null => format!("{} = 'null'", path.type_sql(column)),
        Value::Bool(true) => format!("{} = 'true'", path.type_sql(column)),
        Value::Bool(false) => format!("{} = 'false'", path.type_sql(column)),
        other => format!(
            "{} = {}",
            path.extract_sql(column),
            params.bind(sql_param(other))
        ),
    }
}

fn render_comparison(
    path: &PropertyPath,
    column: &str,
    op: Comparison,
    operand: &Value,
    params: &mut ParamList,
) -> Result<String, GraphError> {
    match op {
        Comparison::In => {
            let Value::Array(items) = operand else {
                return Err(GraphError::validation(format!(
                    "$in on '{}' requires an array, got {operand}",
                    path.as_str()
                )));
            };
            if items.is_empty() {
                return Ok("0".to_string());
            }
            let placeholders: Vec<String> =
                items.iter().map(|item| params.bind(sql_param(item))).collect();
            Ok(format!(
                "{} IN ({})",
                path.extract_sql(column),
                placeholders.join(", ")
            ))
        }
        Comparison::Ne => Ok(match operand {
            Value::Null => format!("{} IS NOT 'null'", path.type_sql(column)),
            Value::Bool(b) => format!("{} IS NOT '{b}'", path.type_sql(column)),
            other => format!(
                "{} IS NOT {}",
                path.extract_sql(column),
                params.bind(sql_param(other))
            ),
        }),
        _ => match operand {
            Value::Number(_) | Value::String(_) => Ok(format!(
                "{} {} {}",
                path.extract_sql(column),
                op.sql_operator(),
                params.bind(sql_param(operand))
            )),
            other => Err(GraphError::validation(format!(
                "{} on '{}' requires a number or string, got {other}",
                op.token(),
                path.as_str()
            ))),
        },
    }
}

/// Converts a JSON value into the SQLite value `json_extract` would yield for it.
pub(crate) fn sql_param(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        container => SqlValue::Text(container.to_string()),
    }
}

/// Parses a `{path: filter}` object into validated path/filter pairs.
pub fn parse_filter_map(map: Map<String, Value>) -> Result<Vec<(PropertyPath, PropertyFilter)>, GraphError> {
    let mut filters = Vec::with_capacity(map.len());
    for (key, value) in map {
        filters.push((PropertyPath::parse(&key)?, PropertyFilter::from_value(value)?));
    }
    Ok(filters)
}
