//! Table access over `/rest/v1/{table}`
//!
//! Filters render as `column=op.value` query parameters. Mutations ask for
//! the written row back with `Prefer: return=representation`.

use super::client::ApiClient;
use crate::cache::{Expiry, ExpiringStore};
use crate::error::TriplogResult;
use crate::http::Method;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const REST_PREFIX: &str = "rest/v1";

/// Row filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq(String, String),
    Gte(String, String),
    Lte(String, String),
    /// Case-insensitive pattern, `*` as wildcard
    Ilike(String, String),
}

impl Filter {
    pub fn eq(column: &str, value: impl fmt::Display) -> Self {
        Self::Eq(column.to_string(), value.to_string())
    }

    pub fn gte(column: &str, value: impl fmt::Display) -> Self {
        Self::Gte(column.to_string(), value.to_string())
    }

    pub fn lte(column: &str, value: impl fmt::Display) -> Self {
        Self::Lte(column.to_string(), value.to_string())
    }

    pub fn ilike(column: &str, pattern: impl fmt::Display) -> Self {
        Self::Ilike(column.to_string(), pattern.to_string())
    }

    /// Query parameter pair
    pub fn to_param(&self) -> (String, String) {
        let (op, column, value) = match self {
            Self::Eq(c, v) => ("eq", c, v),
            Self::Gte(c, v) => ("gte", c, v),
            Self::Lte(c, v) => ("lte", c, v),
            Self::Ilike(c, v) => ("ilike", c, v),
        };
        (column.clone(), format!("{}.{}", op, value))
    }
}

/// Select parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    filters: Vec<Filter>,
    select: Option<String>,
    order: Option<String>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Column list, including embedded resources
    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_string());
        self
    }

    /// Ordering such as `trip_date.desc`
    pub fn order(mut self, order: &str) -> Self {
        self.order = Some(order.to_string());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(select) = &self.select {
            params.push(("select".to_string(), select.clone()));
        }
        params.extend(self.filters.iter().map(Filter::to_param));
        if let Some(order) = &self.order {
            params.push(("order".to_string(), order.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

fn rows(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn first_row(value: Value) -> Option<Value> {
    rows(value).into_iter().next()
}

/// Generic table client
#[derive(Clone)]
pub struct RestClient {
    api: Arc<ApiClient>,
    cache: Arc<ExpiringStore>,
}

impl RestClient {
    pub fn new(api: Arc<ApiClient>, cache: Arc<ExpiringStore>) -> Self {
        Self { api, cache }
    }

    pub fn cache(&self) -> &Arc<ExpiringStore> {
        &self.cache
    }

    fn path(table: &str) -> String {
        format!("{}/{}", REST_PREFIX, table)
    }

    /// Rows matching a query
    pub async fn select(&self, table: &str, query: &Query) -> TriplogResult<Vec<Value>> {
        let mut request = self
            .api
            .request(Method::Get, &Self::path(table))?
            .operation(format!("select_{}", table));
        for (key, value) in query.params() {
            request = request.query(key, value);
        }
        Ok(rows(self.api.send(request).await?))
    }

    /// Rows matching a query, served from the cache under `domain_key` when
    /// a current cell exists and written through otherwise
    pub async fn select_cached(
        &self,
        table: &str,
        query: &Query,
        domain_key: &str,
        expiry: Expiry,
    ) -> TriplogResult<Vec<Value>> {
        if let Some(cached) = self.cache.get_as::<Vec<Value>>(domain_key) {
            debug!("Serving {} from cache", domain_key);
            return Ok(cached);
        }
        let fetched = self.select(table, query).await?;
        self.cache.set_as(domain_key, &fetched, expiry);
        Ok(fetched)
    }

    /// Single row by primary key
    pub async fn get_by_id(&self, table: &str, id: &str) -> TriplogResult<Option<Value>> {
        let query = Query::new().filter(Filter::eq("id", id)).limit(1);
        Ok(self.select(table, &query).await?.into_iter().next())
    }

    /// Insert a row and return it as stored
    pub async fn insert(&self, table: &str, row: &Value) -> TriplogResult<Option<Value>> {
        let request = self
            .api
            .request(Method::Post, &Self::path(table))?
            .operation(format!("insert_{}", table))
            .header("Prefer", "return=representation")
            .json(row.clone());
        Ok(first_row(self.api.send(request).await?))
    }

    /// Patch rows matching `filters` and return the first updated row
    pub async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: &Value,
    ) -> TriplogResult<Option<Value>> {
        let mut request = self
            .api
            .request(Method::Patch, &Self::path(table))?
            .operation(format!("update_{}", table))
            .header("Prefer", "return=representation")
            .json(patch.clone());
        for (key, value) in filters.iter().map(Filter::to_param) {
            request = request.query(key, value);
        }
        Ok(first_row(self.api.send(request).await?))
    }

    /// Mark a row deleted without removing it
    pub async fn soft_delete(&self, table: &str, id: &str) -> TriplogResult<()> {
        self.update(table, &[Filter::eq("id", id)], &json!({ "is_deleted": true }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_render_as_operator_prefixed_values() {
        assert_eq!(
            Filter::gte("trip_date", "2025-01-01").to_param(),
            ("trip_date".to_string(), "gte.2025-01-01".to_string())
        );
        assert_eq!(
            Filter::ilike("end_location", "*Pudong*").to_param(),
            ("end_location".to_string(), "ilike.*Pudong*".to_string())
        );
        assert_eq!(Filter::eq("is_deleted", false).to_param().1, "eq.false");
    }

    #[test]
    fn query_params_order() {
        let params = Query::new()
            .select("*")
            .filter(Filter::eq("id", "t1"))
            .order("trip_date.desc")
            .limit(1)
            .params();
        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["select", "id", "order", "limit"]);
    }

    #[test]
    fn row_shapes() {
        assert!(rows(Value::Null).is_empty());
        assert_eq!(rows(json!([1, 2])).len(), 2);
        assert_eq!(first_row(json!({"id": "t1"})), Some(json!({"id": "t1"})));
    }
}
