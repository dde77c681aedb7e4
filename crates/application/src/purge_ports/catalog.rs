use async_trait::async_trait;
use trimstream_core::AppResult;
use trimstream_domain::TableDefinition;

/// Metadata port used to validate purge invocations.
#[async_trait]
pub trait PurgeCatalog: Send + Sync {
    /// Finds a table definition by name, matched case-insensitively.
    async fn find_table(&self, table_name: &str) -> AppResult<Option<TableDefinition>>;
}
