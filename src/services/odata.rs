//! Fluent builder for OData v4 query strings against the MLS API.
//!
//! Filter clauses are assembled from the helpers in [`expr`], which quote
//! every user-supplied value, so nothing typed by a visitor or stored in a
//! saved search is ever spliced into a `$filter` verbatim.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;

// Everything but RFC 3986 unreserved characters, so a space is %20, never '+'.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ODataQuery {
    filters: Vec<String>,
    select: Vec<String>,
    order_by: Vec<(String, Direction)>,
    top: Option<u32>,
    skip: Option<u32>,
    count: bool,
}

impl ODataQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, clause: impl Into<String>) -> Self {
        let clause = clause.into();
        if !clause.trim().is_empty() {
            self.filters.push(clause);
        }
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            let field = field.into();
            if !self.select.contains(&field) {
                self.select.push(field);
            }
        }
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push((field.into(), direction));
        self
    }

    pub fn top(mut self, n: u32) -> Self {
        self.top = Some(n);
        self
    }

    pub fn skip(mut self, n: u32) -> Self {
        self.skip = Some(n);
        self
    }

    pub fn count(mut self, enabled: bool) -> Self {
        self.count = enabled;
        self
    }

    /// The combined `$filter` expression, or `None` when no clause was added.
    pub fn filter_expr(&self) -> Option<String> {
        match self.filters.len() {
            0 => None,
            1 => Some(self.filters[0].clone()),
            _ => Some(
                self.filters
                    .iter()
                    .map(|f| format!("({f})"))
                    .collect::<Vec<_>>()
                    .join(" and "),
            ),
        }
    }

    pub fn query_string(&self) -> String {
        let mut params: Vec<(&str, String)> = Vec::new();

        if let Some(filter) = self.filter_expr() {
            params.push(("$filter", filter));
        }
        if !self.select.is_empty() {
            params.push(("$select", self.select.join(",")));
        }
        if !self.order_by.is_empty() {
            let order = self
                .order_by
                .iter()
                .map(|(field, dir)| format!("{field} {}", dir.as_str()))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("$orderby", order));
        }
        if let Some(top) = self.top {
            params.push(("$top", top.to_string()));
        }
        if let Some(skip) = self.skip {
            params.push(("$skip", skip.to_string()));
        }
        if self.count {
            params.push(("$count", "true".to_string()));
        }

        params
            .into_iter()
            .map(|(key, value)| format!("{key}={}", encode(&value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn url(&self, base: &str) -> String {
        let qs = self.query_string();
        if qs.is_empty() {
            return base.to_string();
        }
        let sep = if base.contains('?') { '&' } else { '?' };
        format!("{base}{sep}{qs}")
    }
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

/// A literal on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(DateTime<Utc>),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => f.write_str(&expr::quote(s)),
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Float(n) => write!(f, "{n}"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::DateTime(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Str(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::Str(s)
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Literal::Int(n)
    }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        Literal::Float(n)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<DateTime<Utc>> for Literal {
    fn from(dt: DateTime<Utc>) -> Self {
        Literal::DateTime(dt)
    }
}

pub mod expr {
    use super::Literal;

    pub fn quote(value: &str) -> String {
        let cleaned: String = value
            .chars()
            .filter(|c| !c.is_control())
            .collect::<String>()
            .replace('\'', "''");
        format!("'{cleaned}'")
    }

    pub fn eq(field: &str, value: impl Into<Literal>) -> String {
        format!("{field} eq {}", value.into())
    }

    pub fn ne(field: &str, value: impl Into<Literal>) -> String {
        format!("{field} ne {}", value.into())
    }

    pub fn ge(field: &str, value: impl Into<Literal>) -> String {
        format!("{field} ge {}", value.into())
    }

    pub fn le(field: &str, value: impl Into<Literal>) -> String {
        format!("{field} le {}", value.into())
    }

    pub fn contains(field: &str, value: &str) -> String {
        format!("contains({field},{})", quote(value))
    }

    pub fn starts_with(field: &str, value: &str) -> String {
        format!("startswith({field},{})", quote(value))
    }

    pub fn any_of(clauses: Vec<String>) -> String {
        join(clauses, " or ")
    }

    pub fn and_all(clauses: Vec<String>) -> String {
        join(clauses, " and ")
    }

    fn join(clauses: Vec<String>, op: &str) -> String {
        let clauses: Vec<String> = clauses.into_iter().filter(|c| !c.is_empty()).collect();
        match clauses.len() {
            0 => String::new(),
            1 => clauses.into_iter().next().unwrap_or_default(),
            _ => format!("({})", clauses.join(op)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ODataPage<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.count", default)]
    pub count: Option<u64>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}
