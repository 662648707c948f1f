//! Object storage over the project's `/storage/v1` API.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{RequestBuilder, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{authorize, check, endpoint_url, http_client, parse_base_url};
use crate::config::EndpointConfig;
use crate::core::{Bucket, BucketOptions, ListOptions, StorageClient, StorageEntry};
use crate::error::Result;

/// Storage client for one project.
#[derive(Debug, Clone)]
pub struct RestStorageClient {
    http: reqwest::Client,
    base: Url,
    key: String,
}

#[derive(Deserialize)]
struct SignedUrl {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl RestStorageClient {
    /// Client authenticated with the service key when present.
    pub fn new(endpoint: &EndpointConfig) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            base: parse_base_url(&endpoint.url)?,
            key: endpoint.effective_key().to_string(),
        })
    }

    fn storage_url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        endpoint_url(
            &self.base,
            ["storage", "v1"].into_iter().chain(segments),
        )
    }

    /// `/storage/v1/object/{bucket}/{path...}`, one segment per path component.
    fn object_url(&self, prefix: &[&str], bucket: &str, path: &str) -> Result<Url> {
        self.storage_url(
            prefix
                .iter()
                .copied()
                .chain([bucket])
                .chain(path.split('/').filter(|s| !s.is_empty())),
        )
    }

    fn list_request(
        &self,
        bucket: &str,
        prefix: &str,
        options: &ListOptions,
    ) -> Result<RequestBuilder> {
        let url = self.storage_url(["object", "list", bucket])?;
        let mut body = json!({
            "prefix": prefix.trim_matches('/'),
            "limit": options.limit,
            "offset": options.offset,
            "sortBy": {
                "column": options.sort_by.as_str(),
                "order": if options.ascending { "asc" } else { "desc" },
            },
        });
        if let Some(ref search) = options.search {
            body["search"] = json!(search);
        }

        debug!("POST {} prefix={:?} offset={}", url, prefix, options.offset);
        Ok(authorize(self.http.post(url), &self.key).json(&body))
    }

    fn upload_request(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: Option<&str>,
        upsert: bool,
    ) -> Result<RequestBuilder> {
        let url = self.object_url(&["object"], bucket, path)?;
        debug!("POST {} ({} bytes, upsert={})", url, data.len(), upsert);
        Ok(authorize(self.http.post(url), &self.key)
            .header(
                reqwest::header::CONTENT_TYPE,
                content_type.unwrap_or("application/octet-stream"),
            )
            .header("x-upsert", if upsert { "true" } else { "false" })
            .header("cache-control", "max-age=3600")
            .body(data))
    }
}

#[async_trait]
impl StorageClient for RestStorageClient {
    async fn list_buckets(&self) -> Result<Vec<Bucket>> {
        let url = self.storage_url(["bucket"])?;
        debug!("GET {}", url);
        let response = authorize(self.http.get(url), &self.key).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn create_bucket(&self, name: &str, options: &BucketOptions) -> Result<()> {
        let url = self.storage_url(["bucket"])?;
        debug!("POST {} ({})", url, name);
        let body = json!({
            "id": name,
            "name": name,
            "public": options.public,
            "allowed_mime_types": options.allowed_mime_types,
            "file_size_limit": options.file_size_limit,
        });
        let response = authorize(self.http.post(url), &self.key)
            .json(&body)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        options: &ListOptions,
    ) -> Result<Vec<StorageEntry>> {
        let response = self.list_request(bucket, prefix, options)?.send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Bytes> {
        let url = self.object_url(&["object", "authenticated"], bucket, path)?;
        debug!("GET {}", url);
        let response = authorize(self.http.get(url), &self.key).send().await?;
        Ok(check(response).await?.bytes().await?)
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: Option<&str>,
        upsert: bool,
    ) -> Result<()> {
        let response = self
            .upload_request(bucket, path, data, content_type, upsert)?
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        let url = self.storage_url(["object", bucket])?;
        debug!("DELETE {} ({} objects)", url, paths.len());
        let response = authorize(self.http.delete(url), &self.key)
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn move_object(&self, bucket: &str, from: &str, to: &str) -> Result<()> {
        let url = self.storage_url(["object", "move"])?;
        debug!("POST {} {} -> {}", url, from, to);
        let response = authorize(self.http.post(url), &self.key)
            .json(&json!({
                "bucketId": bucket,
                "sourceKey": from,
                "destinationKey": to,
            }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_secs: u64,
    ) -> Result<String> {
        let url = self.object_url(&["object", "sign"], bucket, path)?;
        let response = authorize(self.http.post(url), &self.key)
            .json(&json!({ "expiresIn": expires_in_secs }))
            .send()
            .await?;
        let signed: SignedUrl = check(response).await?.json().await?;
        // The API answers with a path relative to /storage/v1.
        let base = self.storage_url(std::iter::empty())?;
        Ok(format!(
            "{}/{}",
            base.as_str().trim_end_matches('/'),
            signed.signed_url.trim_start_matches('/')
        ))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        match self.object_url(&["object", "public"], bucket, path) {
            Ok(url) => url.to_string(),
            // Only reachable for URLs that cannot take a path, which the
            // constructor already rejects.
            Err(_) => format!(
                "{}/storage/v1/object/public/{}/{}",
                self.base.as_str().trim_end_matches('/'),
                bucket,
                path
            ),
        }
    }
}
