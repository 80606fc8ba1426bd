//! Source loading with a time-boxed table cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::cache::TtlCache;
use crate::error::Result;
use crate::fetch::HttpClient;
use crate::ingest::{self, FunctionAssignment, Parsed};
use crate::model::{FleetRecord, FuelRecord, LeaseRate, PersonnelRecord, UnitGeo};
use crate::schema::DeclaredSchema;
use crate::source::{SourceFormat, SourceId, read_source};
use crate::table::Table;

pub struct Loader<C> {
    client: C,
    cache: TtlCache<SourceId, Arc<Table>>,
    declared: DeclaredSchema,
}

impl<C: HttpClient> Loader<C> {
    pub fn new(client: C, ttl: Duration, declared: DeclaredSchema) -> Self {
        Self {
            client,
            cache: TtlCache::new(ttl),
            declared,
        }
    }

    /// Decoded table for `id`, served from the cache while it is fresh.
    #[tracing::instrument(skip(self), fields(source = %id))]
    pub async fn table(&mut self, id: &SourceId) -> Result<Arc<Table>> {
        let now = Instant::now();
        if let Some(table) = self.cache.get(id, now) {
            debug!("Table served from cache");
            return Ok(table);
        }

        let bytes = read_source(&self.client, id).await?;
        let format = SourceFormat::detect(id, &bytes);
        let table = Arc::new(Table::decode(&id.file_name(), format, &bytes)?);
        info!(
            bytes = bytes.len(),
            rows = table.len(),
            columns = table.headers.len(),
            ?format,
            "Source loaded"
        );

        self.cache.insert(id.clone(), Arc::clone(&table), now);
        Ok(table)
    }

    pub async fn fuel(&mut self, id: &SourceId) -> Result<Parsed<FuelRecord>> {
        let table = self.table(id).await?;
        ingest::parse_fuel(&table, &self.declared)
    }

    pub async fn fleet(&mut self, id: &SourceId) -> Result<Parsed<FleetRecord>> {
        let table = self.table(id).await?;
        ingest::parse_fleet(&table, &self.declared)
    }

    pub async fn geo(&mut self, id: &SourceId) -> Result<Parsed<UnitGeo>> {
        let table = self.table(id).await?;
        ingest::parse_geo(&table, &self.declared)
    }

    pub async fn lease_rates(&mut self, id: &SourceId) -> Result<Parsed<LeaseRate>> {
        let table = self.table(id).await?;
        ingest::parse_lease_rates(&table, &self.declared)
    }

    pub async fn personnel(&mut self, id: &SourceId) -> Result<Parsed<PersonnelRecord>> {
        let table = self.table(id).await?;
        ingest::parse_personnel(&table, &self.declared)
    }

    pub async fn functions(&mut self, id: &SourceId) -> Result<Parsed<FunctionAssignment>> {
        let table = self.table(id).await?;
        ingest::parse_functions(&table, &self.declared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::fetch::BasicClient;

    fn loader() -> Loader<BasicClient> {
        Loader::new(BasicClient::new(), Duration::from_secs(3600), DeclaredSchema::default())
    }

    #[tokio::test]
    async fn test_table_is_cached_by_source_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frota.csv");
        std::fs::write(&path, "Placa;OPM\nABC1234;3 BPM\n").unwrap();
        let id = SourceId::Local(path.clone());

        let mut loader = loader();
        let first = loader.table(&id).await.unwrap();
        std::fs::write(&path, "Placa;OPM\nABC1234;3 BPM\nDEF5678;1 BPM\n").unwrap();
        let second = loader.table(&id).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frota.csv");
        std::fs::write(&path, "Placa;OPM\nABC1234;3 BPM\n").unwrap();
        let id = SourceId::Local(path.clone());

        let mut loader = Loader::new(BasicClient::new(), Duration::ZERO, DeclaredSchema::default());
        loader.table(&id).await.unwrap();
        std::fs::write(&path, "Placa;OPM\nABC1234;3 BPM\nDEF5678;1 BPM\n").unwrap();
        assert_eq!(loader.table(&id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_schema_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abastecimentos.csv");
        std::fs::write(&path, "Viatura;OPM;Litros\nA;B;1\n").unwrap();

        let err = loader().fuel(&SourceId::Local(path)).await.unwrap_err();
        match err {
            PipelineError::Schema { source_name, .. } => assert_eq!(source_name, "abastecimentos.csv"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
