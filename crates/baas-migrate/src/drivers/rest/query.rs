//! Table access over the project's REST query surface.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Url};
use serde_json::Value;
use tracing::debug;

use super::{authorize, check, endpoint_url, http_client, parse_base_url};
use crate::config::EndpointConfig;
use crate::core::{QueryClient, Record, SelectQuery};
use crate::error::Result;

/// Query client for one project.
#[derive(Debug, Clone)]
pub struct RestQueryClient {
    http: reqwest::Client,
    base: Url,
    key: String,
}

impl RestQueryClient {
    /// Client authenticated with the endpoint's strongest available key.
    pub fn new(endpoint: &EndpointConfig) -> Result<Self> {
        Self::with_key(&endpoint.url, endpoint.effective_key())
    }

    /// Client authenticated with an explicit key.
    pub fn with_key(url: &str, key: &str) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            base: parse_base_url(url)?,
            key: key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> Result<Url> {
        endpoint_url(&self.base, ["rest", "v1", table])
    }

    fn select_request(&self, table: &str, query: &SelectQuery) -> Result<RequestBuilder> {
        let mut url = self.table_url(table)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", "*");
            for filter in &query.filters {
                pairs.append_pair(&filter.column, &format!("eq.{}", filter.value));
            }
            if let Some(ref column) = query.order_by {
                pairs.append_pair("order", &format!("{}.asc", column));
            }
            if let Some(limit) = query.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
            if query.offset > 0 {
                pairs.append_pair("offset", &query.offset.to_string());
            }
        }

        debug!("GET {}", url);
        Ok(authorize(self.http.get(url), &self.key))
    }

    fn insert_request(&self, table: &str, rows: &[Record], upsert: bool) -> Result<RequestBuilder> {
        let prefer = if upsert {
            "return=minimal,resolution=merge-duplicates"
        } else {
            "return=minimal"
        };

        let url = self.table_url(table)?;
        debug!("POST {} ({} rows, upsert={})", url, rows.len(), upsert);
        Ok(authorize(self.http.post(url), &self.key)
            .header("Prefer", prefer)
            .json(rows))
    }
}

#[async_trait]
impl QueryClient for RestQueryClient {
    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Record>> {
        let response = self.select_request(table, query)?.send().await?;
        let rows = check(response).await?.json::<Vec<Record>>().await?;
        Ok(rows)
    }

    async fn insert(&self, table: &str, rows: &[Record], upsert: bool) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let response = self.insert_request(table, rows, upsert)?.send().await?;
        check(response).await?;
        Ok(rows.len() as u64)
    }

    async fn rpc(&self, function: &str, params: Value) -> Result<Value> {
        let url = endpoint_url(&self.base, ["rest", "v1", "rpc", function])?;
        debug!("POST {}", url);
        let response = authorize(self.http.post(url), &self.key)
            .json(&params)
            .send()
            .await?;
        let body = check(response).await?.text().await?;
        if body.trim().is_empty() {
            Ok(Value::Null)
        } else {
            Ok(serde_json::from_str(&body)?)
        }
    }

    fn endpoint(&self) -> &str {
        self.base.as_str()
    }
}
