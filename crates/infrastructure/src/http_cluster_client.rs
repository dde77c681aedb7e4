use async_trait::async_trait;
use futures::future::join_all;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};
use trimstream_application::{
    ChunkDeleteClient, ChunkDeleteRequest, ChunkOutcome, PartitionOutcome, PurgeCatalog,
};
use trimstream_core::{AppError, AppResult};
use trimstream_domain::{ColumnDefinition, ColumnType, TableDefinition, TableDistribution};

/// Cluster coordinator client speaking the internal purge HTTP API.
#[derive(Clone)]
pub struct HttpClusterClient {
    http_client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ColumnResponse {
    name: String,
    column_type: ColumnType,
}

#[derive(Debug, Deserialize)]
struct TableResponse {
    name: String,
    columns: Vec<ColumnResponse>,
    distribution: TableDistribution,
}

#[derive(Debug, Deserialize)]
struct PartitionListResponse {
    partition_ids: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct ChunkDeleteResponse {
    rows_exported: i64,
    rows_remaining: i64,
}

impl HttpClusterClient {
    /// Creates a client for the coordinator at `base_url`.
    #[must_use]
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            http_client,
            base_url,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/internal/{path}", self.base_url)
    }

    fn table_url(&self, table_name: &str) -> AppResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.endpoint("catalog/tables")).map_err(|error| {
            AppError::Internal(format!("invalid coordinator url '{}': {error}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                AppError::Internal(format!(
                    "coordinator url '{}' cannot carry a path",
                    self.base_url
                ))
            })?
            .push(table_name.trim());
        Ok(url)
    }

    async fn list_partitions(&self) -> AppResult<Vec<u32>> {
        let response = self
            .http_client
            .get(self.endpoint("partitions"))
            .send()
            .await
            .map_err(|error| {
                AppError::Transport(format!("partition list request failed: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Transport(format!(
                "partition list request failed with status {status}"
            )));
        }

        let partitions = response
            .json::<PartitionListResponse>()
            .await
            .map_err(|error| {
                AppError::Transport(format!("partition list reply is malformed: {error}"))
            })?;
        Ok(partitions.partition_ids)
    }

    async fn post_chunk(
        &self,
        url: String,
        request: &ChunkDeleteRequest,
    ) -> Result<ChunkOutcome, reqwest::Error> {
        let response = self.http_client.post(url).json(request).send().await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<response body unavailable>".to_owned());
        Ok(classify_chunk_reply(status, &body))
    }
}

/// Maps one chunk reply onto its outcome.
fn classify_chunk_reply(status: StatusCode, body: &str) -> ChunkOutcome {
    if status.is_success() {
        return match serde_json::from_str::<ChunkDeleteResponse>(body) {
            Ok(reply) => ChunkOutcome::Success {
                rows_exported: reply.rows_exported,
                rows_remaining: reply.rows_remaining,
            },
            Err(error) => ChunkOutcome::Fatal {
                message: format!("chunk reply is malformed: {error}"),
            },
        };
    }

    if status == StatusCode::SERVICE_UNAVAILABLE {
        return ChunkOutcome::AmbiguousNodeFailure;
    }

    ChunkOutcome::Fatal {
        message: format!("chunk delete failed with status {status}: {}", body.trim()),
    }
}

fn table_from_response(response: TableResponse) -> AppResult<TableDefinition> {
    let columns = response
        .columns
        .into_iter()
        .map(|column| ColumnDefinition::new(column.name, column.column_type))
        .collect::<AppResult<Vec<_>>>()?;
    TableDefinition::new(response.name, columns, response.distribution)
}

#[async_trait]
impl PurgeCatalog for HttpClusterClient {
    async fn find_table(&self, table_name: &str) -> AppResult<Option<TableDefinition>> {
        let response = self
            .http_client
            .get(self.table_url(table_name)?)
            .send()
            .await
            .map_err(|error| AppError::Transport(format!("catalog request failed: {error}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response body unavailable>".to_owned());
            return Err(AppError::Transport(format!(
                "catalog request failed with status {status}: {}",
                body.trim()
            )));
        }

        let table = response.json::<TableResponse>().await.map_err(|error| {
            AppError::Transport(format!("catalog reply is malformed: {error}"))
        })?;
        table_from_response(table).map(Some)
    }
}

#[async_trait]
impl ChunkDeleteClient for HttpClusterClient {
    async fn delete_chunk_replicated(
        &self,
        request: &ChunkDeleteRequest,
    ) -> AppResult<ChunkOutcome> {
        self.post_chunk(self.endpoint("purge/chunk"), request)
            .await
            .map_err(|error| {
                AppError::Transport(format!("replicated chunk request failed: {error}"))
            })
    }

    async fn delete_chunk_all_partitions(
        &self,
        request: &ChunkDeleteRequest,
    ) -> AppResult<Vec<PartitionOutcome>> {
        let partition_ids = self.list_partitions().await?;
        debug!(
            table = %request.table_name,
            partitions = partition_ids.len(),
            "fanning chunk delete out to partitions"
        );

        let replies = join_all(partition_ids.iter().map(|partition_id| {
            self.post_chunk(
                self.endpoint(&format!("partitions/{partition_id}/purge/chunk")),
                request,
            )
        }))
        .await;

        Ok(partition_ids
            .into_iter()
            .zip(replies)
            .map(|(partition_id, reply)| PartitionOutcome {
                partition_id,
                outcome: reply.unwrap_or_else(|error| {
                    warn!(partition_id, %error, "partition chunk request failed in transit");
                    ChunkOutcome::AmbiguousNodeFailure
                }),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests;
