//! HTTP control-plane client
//!
//! Speaks the Kinesis JSON 1.1 protocol: every call is a POST to the endpoint
//! root with the action named in `X-Amz-Target`. Requests are unsigned, which
//! local emulators accept; credentials are supplied outside this crate.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shardscale_core::{HashKey, StreamDescription, StreamDescriptionSummary};
use tracing::{debug, instrument};

use crate::config::{ConfigError, ConnectionConfig};
use crate::control_plane::{ControlPlane, ControlPlaneError, Result};

const CONTENT_TYPE_JSON_1_1: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "Kinesis_20131202";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStreamRequest<'a> {
    stream_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    exclusive_start_shard_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStreamResponse {
    stream_description: StreamDescription,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStreamSummaryRequest<'a> {
    stream_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStreamSummaryResponse {
    stream_description_summary: StreamDescriptionSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SplitShardRequest<'a> {
    stream_name: &'a str,
    shard_to_split: &'a str,
    new_starting_hash_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MergeShardsRequest<'a> {
    stream_name: &'a str,
    shard_to_merge: &'a str,
    adjacent_shard_to_merge: &'a str,
}

/// Error body returned by the service
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Control plane reached over HTTP
pub struct HttpControlPlane {
    client: Client,
    endpoint: String,
}

impl HttpControlPlane {
    /// Create a client from validated connection settings
    pub fn new(config: &ConnectionConfig) -> std::result::Result<Self, ConfigError> {
        let endpoint = config.resolve_endpoint()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON_1_1));

        let client = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::InvalidValue("http_client".to_string(), e.to_string()))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send<Req: Serialize>(&self, action: &str, request: &Req) -> Result<Vec<u8>> {
        let body = serde_json::to_vec(request)?;

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, action))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        debug!(action, status = status.as_u16(), len = bytes.len(), "Control plane response");

        if status.is_success() {
            return Ok(bytes.to_vec());
        }

        Err(api_error(status.as_u16(), &bytes))
    }

    async fn call<Req, Resp>(&self, action: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let body = self.send(action, request).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

fn api_error(status: u16, body: &[u8]) -> ControlPlaneError {
    match serde_json::from_slice::<ApiErrorBody>(body) {
        Ok(parsed) => {
            let code = parsed
                .error_type
                .map(|t| t.rsplit('#').next().unwrap_or_default().to_string())
                .unwrap_or_else(|| "UnknownError".to_string());
            ControlPlaneError::Api {
                status,
                code,
                message: parsed.message.unwrap_or_default(),
            }
        }
        Err(_) => ControlPlaneError::Api {
            status,
            code: "UnknownError".to_string(),
            message: String::from_utf8_lossy(body).into_owned(),
        },
    }
}

#[async_trait::async_trait]
impl ControlPlane for HttpControlPlane {
    #[instrument(skip(self))]
    async fn describe_stream(
        &self,
        stream_name: &str,
        exclusive_start_shard_id: Option<&str>,
    ) -> Result<StreamDescription> {
        let response: DescribeStreamResponse = self
            .call(
                "DescribeStream",
                &DescribeStreamRequest {
                    stream_name,
                    exclusive_start_shard_id,
                },
            )
            .await?;
        Ok(response.stream_description)
    }

    #[instrument(skip(self))]
    async fn describe_stream_summary(
        &self,
        stream_name: &str,
    ) -> Result<StreamDescriptionSummary> {
        let response: DescribeStreamSummaryResponse = self
            .call(
                "DescribeStreamSummary",
                &DescribeStreamSummaryRequest { stream_name },
            )
            .await?;
        Ok(response.stream_description_summary)
    }

    #[instrument(skip(self))]
    async fn split_shard(
        &self,
        stream_name: &str,
        shard_to_split: &str,
        new_starting_hash_key: HashKey,
    ) -> Result<()> {
        self.send(
            "SplitShard",
            &SplitShardRequest {
                stream_name,
                shard_to_split,
                new_starting_hash_key: new_starting_hash_key.to_string(),
            },
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn merge_shards(
        &self,
        stream_name: &str,
        shard_to_merge: &str,
        adjacent_shard_to_merge: &str,
    ) -> Result<()> {
        self.send(
            "MergeShards",
            &MergeShardsRequest {
                stream_name,
                shard_to_merge,
                adjacent_shard_to_merge,
            },
        )
        .await?;
        Ok(())
    }
}
