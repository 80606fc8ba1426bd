//! Run orchestration: load → normalize → join → filter → aggregate.
//!
//! One [`Pipeline`] owns the loader (and with it the table cache), so
//! repeated runs with different filters reuse the decoded sources.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::analyzers::aggregate::{GroupBy, fuel_mix, group_by, monthly_series, unit_heat};
use crate::analyzers::fleet::summarize_fleet;
use crate::analyzers::outliers::{DEFAULT_THRESHOLD, Metric, detect_outliers};
use crate::analyzers::redistribute::{count_entities, count_vehicles, plan_redistribution};
use crate::analyzers::types::{
    FleetSummary, FuelMix, GroupSummary, MonthlyPoint, Outlier, RedistributionPlan, UnitHeat,
};
use crate::config::Sources;
use crate::error::{PipelineError, Result};
use crate::fetch::HttpClient;
use crate::filter::RecordFilter;
use crate::join::{JoinAmbiguity, backfill_lease_costs, join};
use crate::loader::Loader;
use crate::model::{FleetRecord, JoinedRecord, LocationType, PersonnelRecord, UnitGeo};
use crate::normalize::UnitNormalizer;
use crate::personnel::{self, PersonnelSummary};
use crate::source::SourceId;
use crate::stats::FuelStats;

#[derive(Debug, Clone)]
pub struct FuelQuery {
    pub filter: RecordFilter,
    pub group_by: GroupBy,
    pub metric: Metric,
    pub threshold: f64,
}

impl Default for FuelQuery {
    fn default() -> Self {
        Self {
            filter: RecordFilter::default(),
            group_by: GroupBy::Unit,
            metric: Metric::Liters,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FuelReport {
    pub stats: FuelStats,
    pub group_by: GroupBy,
    pub metric: Metric,
    pub threshold: f64,
    pub groups: Vec<GroupSummary>,
    pub outliers: Vec<Outlier>,
    pub fuel_mix: Vec<FuelMix>,
    pub monthly: Vec<MonthlyPoint>,
    pub heat: Vec<UnitHeat>,
    /// Filtered joined records, in source order.
    pub records: Vec<JoinedRecord>,
    pub ambiguities: Vec<JoinAmbiguity>,
}

#[derive(Debug, Clone)]
pub struct FleetReport {
    pub summary: FleetSummary,
    /// Present when a unit mapping source is configured.
    pub redistribution: Option<RedistributionPlan>,
    pub entity_kind: LocationType,
    /// Flag code counts over the fleet rows after lease backfill.
    pub flags: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct PersonnelQuery {
    pub search: String,
    pub statuses: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PersonnelReport {
    pub records: Vec<PersonnelRecord>,
    pub summary: PersonnelSummary,
}

pub struct Pipeline<C> {
    loader: Loader<C>,
    normalizer: UnitNormalizer,
    sources: Sources,
}

fn required<'a>(source: &'a Option<SourceId>, var: &str) -> Result<&'a SourceId> {
    source
        .as_ref()
        .ok_or_else(|| PipelineError::Config(format!("{var} is not set")))
}

impl<C: HttpClient> Pipeline<C> {
    pub fn new(loader: Loader<C>, normalizer: UnitNormalizer, sources: Sources) -> Self {
        Self {
            loader,
            normalizer,
            sources,
        }
    }

    pub fn normalizer(&self) -> &UnitNormalizer {
        &self.normalizer
    }

    /// Fleet rows with lease costs backfilled when a rate table is configured.
    async fn fleet_records(&mut self, id: &SourceId) -> Result<Vec<FleetRecord>> {
        let fleet = self.loader.fleet(id).await?.records;
        let Some(lease) = self.sources.lease.clone() else {
            return Ok(fleet);
        };
        let rates = self.loader.lease_rates(&lease).await?.records;
        Ok(backfill_lease_costs(&fleet, &rates))
    }

    async fn geo_records(&mut self) -> Result<Vec<UnitGeo>> {
        match self.sources.geo.clone() {
            Some(id) => Ok(self.loader.geo(&id).await?.records),
            None => Ok(Vec::new()),
        }
    }

    #[tracing::instrument(skip(self, query), fields(group_by = %query.group_by, metric = %query.metric))]
    pub async fn fuel(&mut self, query: &FuelQuery) -> Result<FuelReport> {
        let fuel_id = required(&self.sources.fuel, "FUEL_SOURCE")?.clone();
        let fuel = self.loader.fuel(&fuel_id).await?;

        let fleet = match self.sources.fleet.clone() {
            Some(id) => self.fleet_records(&id).await?,
            None => {
                warn!("FLEET_SOURCE is not set; every plate will be unmatched");
                Vec::new()
            }
        };
        let geo = self.geo_records().await?;

        let joined = join(&fuel.records, &fleet, &geo, &self.normalizer);
        let selected = query.filter.apply(&joined.records);
        info!(
            joined = joined.records.len(),
            selected = selected.len(),
            filter = %query.filter,
            "Records selected"
        );

        let outliers = detect_outliers(&selected, query.metric, query.threshold);
        let stats = FuelStats::from_records(&selected)
            .with_outliers(outliers.len())
            .with_run_info(&fuel_id.to_string(), &query.filter.to_string());

        Ok(FuelReport {
            group_by: query.group_by,
            metric: query.metric,
            threshold: query.threshold,
            groups: group_by(&selected, query.group_by),
            fuel_mix: fuel_mix(&selected),
            monthly: monthly_series(&selected),
            heat: unit_heat(&selected),
            records: selected.into_iter().cloned().collect(),
            outliers,
            stats,
            ambiguities: joined.ambiguities,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn fleet(&mut self, entity_kind: LocationType) -> Result<FleetReport> {
        let fleet_id = required(&self.sources.fleet, "FLEET_SOURCE")?.clone();
        let fleet = self.fleet_records(&fleet_id).await?;
        let summary = summarize_fleet(&fleet, &self.normalizer);

        let redistribution = if self.sources.geo.is_some() {
            let geo = self.geo_records().await?;
            let vehicles = count_vehicles(&fleet, &self.normalizer);
            let entities = count_entities(&geo, entity_kind, &self.normalizer);
            Some(plan_redistribution(&vehicles, &entities))
        } else {
            None
        };

        let mut flags: BTreeMap<&'static str, usize> = BTreeMap::new();
        for flag in fleet.iter().flat_map(|v| &v.flags) {
            *flags.entry(flag.code()).or_default() += 1;
        }
        for (code, count) in &flags {
            warn!(flag = code, count, "Fleet rows flagged");
        }
        info!(
            vehicles = summary.vehicles,
            duplicates = summary.duplicates.len(),
            "Fleet summarized"
        );

        Ok(FleetReport {
            summary,
            redistribution,
            entity_kind,
            flags,
        })
    }

    #[tracing::instrument(skip(self, query), fields(search = %query.search))]
    pub async fn personnel(&mut self, query: &PersonnelQuery) -> Result<PersonnelReport> {
        if self.sources.personnel.is_empty() {
            return Err(PipelineError::Config("PERSONNEL_SOURCES is not set".to_string()));
        }

        let mut rosters = Vec::with_capacity(self.sources.personnel.len());
        for id in self.sources.personnel.clone() {
            rosters.push(self.loader.personnel(&id).await?.records);
        }
        let mut merged = personnel::merge_rosters(rosters);

        if let Some(id) = self.sources.functions.clone() {
            let functions = self.loader.functions(&id).await?.records;
            personnel::attach_function_grades(&mut merged, &functions);
        }

        let found = personnel::search(&merged, &query.search);
        let selected = personnel::filter_status(found, &query.statuses);
        let summary = personnel::summarize(&selected);
        info!(
            roster = merged.len(),
            selected = summary.headcount,
            sectors = summary.sectors,
            "Personnel summarized"
        );

        Ok(PersonnelReport {
            records: selected.into_iter().cloned().collect(),
            summary,
        })
    }
}
