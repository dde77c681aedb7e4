use std::time::Duration;

use trimstream_core::{AppError, AppResult};
use trimstream_domain::{ComparisonOperator, PurgeRequest, PurgeRequestInput};

use crate::purge_ports::PurgeInvocation;

use super::PurgeService;

impl PurgeService {
    /// Resolves a textual invocation into a validated request against the catalog.
    pub(super) async fn resolve_request(
        &self,
        invocation: &PurgeInvocation,
    ) -> AppResult<PurgeRequest> {
        let operator = invocation.operator.parse::<ComparisonOperator>()?;

        let table_name = invocation.table_name.trim();
        if table_name.is_empty() {
            return Err(AppError::Validation(
                "table name must not be empty".to_owned(),
            ));
        }

        let table = self
            .catalog
            .find_table(table_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("table '{table_name}' not found")))?;

        let column = table.require_column(&invocation.column_name)?;
        let value = column.column_type().convert(&invocation.value)?;

        PurgeRequest::new(PurgeRequestInput {
            table_name: table.name().as_str().to_owned(),
            column_name: column.name().as_str().to_owned(),
            operator,
            value,
            chunk_size: invocation.chunk_size,
            timeout: Duration::from_millis(invocation.timeout_ms),
            max_rounds: invocation.max_rounds,
            pacing_interval: Duration::from_secs(invocation.pacing_interval_seconds),
            stream_name: invocation.stream_name.clone(),
            replicated: table.is_replicated(),
        })
    }
}
