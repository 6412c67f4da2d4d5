//! List query descriptor and its parser.
//!
//! A [`RawListQuery`] is the untyped request shape (query-string keys mapped
//! to text, numbers or lists). [`ListQuerySpec::parse`] normalises it into a
//! validated descriptor, checking every non-reserved key against the
//! resource's [`FilterKey`] allow-list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default sort field when the request names none.
pub const DEFAULT_ORDER_BY: &str = "createdAt";

const RESERVED_KEYS: [&str; 6] = [
    "page",
    "limit",
    "orderBy",
    "orderDirection",
    "searchValue",
    "searchBy",
];

/// Errors raised while validating a raw list query.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ListQueryError {
    #[error("order direction must be ASC or DESC, got '{0}'")]
    InvalidDirection(String),

    #[error("cannot sort by '{0}'")]
    InvalidSort(String),

    #[error("unknown filter '{0}'")]
    UnknownFilter(String),

    #[error("invalid value '{value}' for filter '{key}'")]
    InvalidFilterValue { key: String, value: String },

    #[error("filter must not be empty")]
    EmptyFilter,
}

/// Untyped value as it arrives from a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<RawValue>),
}

impl RawValue {
    /// Coerce to an integer: floats are floored, numeric text is parsed.
    fn as_integer(&self) -> Option<i64> {
        match self {
            RawValue::Integer(i) => Some(*i),
            RawValue::Float(f) if f.is_finite() => Some(f.floor() as i64),
            RawValue::Text(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.floor() as i64)
                })
            }
            // Lists take their first element, the way repeated scalar keys collapse.
            RawValue::List(items) => items.first().and_then(RawValue::as_integer),
            _ => None,
        }
    }

    fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Text(s) => Some(s.clone()),
            RawValue::Integer(i) => Some(i.to_string()),
            RawValue::Float(f) => Some(f.to_string()),
            RawValue::Bool(b) => Some(b.to_string()),
            RawValue::List(items) => items.first().and_then(RawValue::as_text),
        }
    }

    fn display(&self) -> String {
        match self {
            RawValue::List(items) => items
                .iter()
                .map(RawValue::display)
                .collect::<Vec<_>>()
                .join(","),
            other => other.as_text().unwrap_or_default(),
        }
    }
}

/// Untyped list request: flat mapping of keys to raw values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawListQuery(pub BTreeMap<String, RawValue>);

impl RawListQuery {
    /// Parse a URL query string (`page=2&limit=10&ids[]=1&ids[]=2`).
    ///
    /// Repeated keys and `key[]` keys collect into lists.
    pub fn from_query_string(query: &str) -> Self {
        let mut map: BTreeMap<String, RawValue> = BTreeMap::new();
        let query = query.strip_prefix('?').unwrap_or(query);

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let (key, bracketed) = match key.strip_suffix("[]") {
                Some(stripped) => (stripped.to_string(), true),
                None => (key.into_owned(), false),
            };
            let value = RawValue::Text(value.into_owned());

            match map.remove(&key) {
                Some(RawValue::List(mut items)) => {
                    items.push(value);
                    map.insert(key, RawValue::List(items));
                }
                Some(existing) => {
                    map.insert(key, RawValue::List(vec![existing, value]));
                }
                None if bracketed => {
                    map.insert(key, RawValue::List(vec![value]));
                }
                None => {
                    map.insert(key, value);
                }
            }
        }

        Self(map)
    }

    /// Set a key, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: RawValue) -> &mut Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.0.get(key)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    fn parse(value: &RawValue) -> Result<Self, ListQueryError> {
        let text = value.as_text().unwrap_or_default();
        match text.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(OrderDirection::Asc),
            "DESC" => Ok(OrderDirection::Desc),
            _ => Err(ListQueryError::InvalidDirection(text)),
        }
    }
}

/// A single typed filter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterScalar {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FilterScalar {
    /// Truthiness used by optional filters: zero, empty text and `false` are skipped.
    pub fn is_truthy(&self) -> bool {
        match self {
            FilterScalar::Bool(b) => *b,
            FilterScalar::Int(i) => *i != 0,
            FilterScalar::Text(s) => !s.is_empty(),
        }
    }
}

impl From<i64> for FilterScalar {
    fn from(value: i64) -> Self {
        FilterScalar::Int(value)
    }
}

impl From<&str> for FilterScalar {
    fn from(value: &str) -> Self {
        FilterScalar::Text(value.to_string())
    }
}

impl From<String> for FilterScalar {
    fn from(value: String) -> Self {
        FilterScalar::Text(value)
    }
}

impl From<FilterScalar> for sea_query::Value {
    fn from(value: FilterScalar) -> Self {
        match value {
            FilterScalar::Bool(b) => b.into(),
            FilterScalar::Int(i) => i.into(),
            FilterScalar::Text(s) => s.into(),
        }
    }
}

/// Filter value after validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterValue {
    Scalar(FilterScalar),
    List(Vec<FilterScalar>),
    /// Explicit "is null" request (e.g. root categories).
    Null,
}

impl FilterValue {
    pub fn is_truthy(&self) -> bool {
        match self {
            FilterValue::Scalar(s) => s.is_truthy(),
            FilterValue::List(_) => true,
            FilterValue::Null => false,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FilterValue::Scalar(FilterScalar::Int(i)) => Some(*i),
            _ => None,
        }
    }
}

/// How a filter key's raw value is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Integer,
    /// Integer, where a non-numeric or empty value means "is null".
    NullableInteger,
    Text,
    /// Text restricted to an enumerated set.
    OneOf(&'static [&'static str]),
}

/// An allowed filter key for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterKey {
    pub name: &'static str,
    pub kind: FilterKind,
}

impl FilterKey {
    pub const fn new(name: &'static str, kind: FilterKind) -> Self {
        Self { name, kind }
    }

    fn coerce(&self, raw: &RawValue) -> Result<FilterValue, ListQueryError> {
        match raw {
            RawValue::List(items) => {
                if self.kind == FilterKind::NullableInteger {
                    return Err(self.invalid(raw));
                }
                let values = items
                    .iter()
                    .map(|item| self.coerce_scalar(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(FilterValue::List(values))
            }
            RawValue::Text(s) if self.kind == FilterKind::NullableInteger => {
                Ok(match s.trim().parse::<i64>() {
                    Ok(i) => FilterValue::Scalar(FilterScalar::Int(i)),
                    Err(_) => FilterValue::Null,
                })
            }
            // An absent-looking scalar stays falsy instead of failing coercion.
            RawValue::Text(s) if s.is_empty() => {
                Ok(FilterValue::Scalar(FilterScalar::Text(String::new())))
            }
            scalar => self.coerce_scalar(scalar).map(FilterValue::Scalar),
        }
    }

    fn coerce_scalar(&self, raw: &RawValue) -> Result<FilterScalar, ListQueryError> {
        match self.kind {
            FilterKind::Integer | FilterKind::NullableInteger => match raw {
                RawValue::Integer(i) => Ok(FilterScalar::Int(*i)),
                RawValue::Text(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(FilterScalar::Int)
                    .map_err(|_| self.invalid(raw)),
                _ => Err(self.invalid(raw)),
            },
            FilterKind::Text => match raw {
                RawValue::List(_) => Err(self.invalid(raw)),
                RawValue::Bool(b) => Ok(FilterScalar::Bool(*b)),
                other => other
                    .as_text()
                    .map(FilterScalar::Text)
                    .ok_or_else(|| self.invalid(raw)),
            },
            FilterKind::OneOf(allowed) => {
                let text = raw.as_text().ok_or_else(|| self.invalid(raw))?;
                let upper = text.trim().to_ascii_uppercase();
                allowed
                    .iter()
                    .find(|candidate| **candidate == upper)
                    .map(|candidate| FilterScalar::Text((*candidate).to_string()))
                    .ok_or_else(|| self.invalid(raw))
            }
        }
    }

    fn invalid(&self, raw: &RawValue) -> ListQueryError {
        ListQueryError::InvalidFilterValue {
            key: self.name.to_string(),
            value: raw.display(),
        }
    }
}

/// Normalised pagination, sort, search and filter intent for one list request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuerySpec {
    pub page: u64,
    /// 0 means unlimited.
    pub limit: u64,
    pub offset: u64,
    pub order_by: String,
    pub order_direction: OrderDirection,
    pub search_value: Option<String>,
    pub search_by: Option<String>,
    pub filters: BTreeMap<String, FilterValue>,
}

impl Default for ListQuerySpec {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 0,
            offset: 0,
            order_by: DEFAULT_ORDER_BY.to_string(),
            order_direction: OrderDirection::Asc,
            search_value: None,
            search_by: None,
            filters: BTreeMap::new(),
        }
    }
}

impl ListQuerySpec {
    /// Normalise a raw request.
    ///
    /// Page and limit never fail: bad values fall back to their defaults.
    /// Order direction outside ASC/DESC, unknown filter keys and values that
    /// cannot be coerced to their key's kind are rejected.
    pub fn parse(raw: &RawListQuery, keys: &[FilterKey]) -> Result<Self, ListQueryError> {
        let page = raw
            .get("page")
            .and_then(RawValue::as_integer)
            .map_or(1, |p| p.max(1)) as u64;
        let limit = raw
            .get("limit")
            .and_then(RawValue::as_integer)
            .map_or(0, |l| l.max(0)) as u64;

        let order_by = raw
            .get("orderBy")
            .and_then(RawValue::as_text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_ORDER_BY.to_string());

        let order_direction = match raw.get("orderDirection") {
            Some(value) => OrderDirection::parse(value)?,
            None => OrderDirection::default(),
        };

        let search_value = raw
            .get("searchValue")
            .and_then(RawValue::as_text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let search_by = raw
            .get("searchBy")
            .and_then(RawValue::as_text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let mut filters = BTreeMap::new();
        for (name, value) in &raw.0 {
            if RESERVED_KEYS.contains(&name.as_str()) {
                continue;
            }
            let key = keys
                .iter()
                .find(|k| k.name == name)
                .ok_or_else(|| ListQueryError::UnknownFilter(name.clone()))?;
            filters.insert(name.clone(), key.coerce(value)?);
        }

        let mut spec = Self {
            page,
            limit,
            offset: 0,
            order_by,
            order_direction,
            search_value,
            search_by,
            filters,
        };
        spec.offset = spec.compute_offset();
        Ok(spec)
    }

    fn compute_offset(&self) -> u64 {
        if self.limit > 0 {
            (self.page - 1).saturating_mul(self.limit)
        } else {
            0
        }
    }

    /// Change paging, keeping `offset` consistent.
    pub fn with_page(mut self, page: u64, limit: u64) -> Self {
        self.page = page.max(1);
        self.limit = limit;
        self.offset = self.compute_offset();
        self
    }

    pub fn filter(&self, key: &str) -> Option<&FilterValue> {
        self.filters.get(key)
    }

    pub fn set_filter(&mut self, key: impl Into<String>, value: FilterValue) {
        self.filters.insert(key.into(), value);
    }

    /// Reject `order_by` values outside the resource's sortable fields.
    pub fn ensure_sortable(&self, sortable: &[&str]) -> Result<(), ListQueryError> {
        if sortable.contains(&self.order_by.as_str()) {
            Ok(())
        } else {
            Err(ListQueryError::InvalidSort(self.order_by.clone()))
        }
    }
}
