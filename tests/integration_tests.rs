use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use flate2::read::GzDecoder;
use fleet_fuel_recon::{
    analyzers::{aggregate::GroupBy, outliers::Metric},
    config::Sources,
    error::PipelineError,
    fetch::BasicClient,
    filter::RecordFilter,
    loader::Loader,
    model::{LocationType, Resolution, RowFlag},
    normalize::{AliasRuleSet, UnitNormalizer},
    output::append_record,
    pipeline::{FuelQuery, PersonnelQuery, Pipeline},
    report,
    schema::DeclaredSchema,
    source::SourceId,
    stats::FuelStats,
};

fn fixture(name: &str) -> SourceId {
    let path: PathBuf = [env!("CARGO_MANIFEST_DIR"), "tests", "fixtures", name]
        .iter()
        .collect();
    SourceId::Local(path)
}

fn normalizer() -> UnitNormalizer {
    UnitNormalizer::new(AliasRuleSet::builtin().unwrap())
}

fn sources() -> Sources {
    Sources {
        fuel: Some(fixture("abastecimentos.csv")),
        fleet: Some(fixture("frota.csv")),
        geo: Some(fixture("opm_municipios.csv")),
        lease: Some(fixture("locacao.csv")),
        personnel: vec![fixture("efetivo_oficiais.csv"), fixture("efetivo_pracas.csv")],
        functions: Some(fixture("funcoes.csv")),
    }
}

fn pipeline(sources: Sources) -> Pipeline<BasicClient> {
    let loader = Loader::new(
        BasicClient::new(),
        Duration::from_secs(60),
        DeclaredSchema::default(),
    );
    Pipeline::new(loader, normalizer(), sources)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[tokio::test]
async fn test_fuel_report_over_fixtures() {
    let mut p = pipeline(sources());
    let fuel = p.fuel(&FuelQuery::default()).await.unwrap();
    let s = &fuel.stats;

    // Seven source rows; the 20 + 10 liter row splits into two records.
    assert_eq!(s.records, 8);
    assert!(close(s.total_liters, 230.0));
    assert!(close(s.total_spent, 1379.0));
    assert_eq!(s.vehicles, 5);
    assert!(close(s.mean_liters_per_vehicle, 40.0));
    assert_eq!(s.fleet_matched, 5);
    assert_eq!(s.geo_matched, 7);
    assert_eq!(s.missing_plate, 2);
    assert_eq!(s.unmatched_plate, 1);
    assert_eq!(s.ambiguous_plate, 1);
    assert_eq!(s.unmatched_unit, 1);
    assert_eq!(s.ambiguous_unit, 0);
    assert_eq!(s.unparseable, 0);

    let keys: Vec<(&str, usize)> = fuel
        .groups
        .iter()
        .map(|g| (g.key.as_str(), g.records))
        .collect();
    assert_eq!(keys, vec![("3 BPM", 3), ("1 BPM", 3), ("5 BPM", 1), ("3 CPMI", 1)]);
    assert!(close(fuel.groups[0].liters_total, 120.0));
    assert!(close(fuel.groups[1].liters_total, 80.0));

    assert_eq!(fuel.outliers.len(), 1);
    assert_eq!(fuel.outliers[0].source_row, 8);
    assert!(fuel.outliers[0].zscore < -2.0);
    assert_eq!(s.outliers, 1);
}

#[tokio::test]
async fn test_duplicate_plate_resolves_by_unit() {
    let mut p = pipeline(sources());
    let fuel = p.fuel(&FuelQuery::default()).await.unwrap();

    let ghi = fuel
        .records
        .iter()
        .find(|r| r.fuel.plate == "GHI9012")
        .unwrap();
    assert_eq!(ghi.fleet.as_ref().map(|f| f.source_row), Some(5));
    assert!(ghi.flags.iter().any(|f| matches!(
        f,
        RowFlag::AmbiguousPlate {
            candidates: 2,
            resolved_by: Resolution::UnitMatch,
            ..
        }
    )));
    assert_eq!(fuel.ambiguities.len(), 1);
    assert_eq!(fuel.ambiguities[0].key, "GHI9012");

    // 3 BPM has two mapping rows; the seat row wins without a flag.
    let first = &fuel.records[0];
    assert_eq!(first.location_name(), "Arapiraca");
    assert!(!first.has_flag("ambiguous_unit"));
}

#[tokio::test]
async fn test_fuel_filters() {
    let n = normalizer();
    let mut p = pipeline(sources());

    let by_unit = FuelQuery {
        filter: RecordFilter::default().units(&["3º BPM"], &n),
        ..Default::default()
    };
    let fuel = p.fuel(&by_unit).await.unwrap();
    assert_eq!(fuel.stats.records, 3);
    assert!(close(fuel.stats.total_liters, 120.0));
    // 40, 35 and 45 liters are within two deviations of each other.
    assert!(fuel.outliers.is_empty());

    let since_february = FuelQuery {
        filter: RecordFilter::default().between(chrono::NaiveDate::from_ymd_opt(2025, 2, 1), None),
        group_by: GroupBy::Month,
        metric: Metric::Amount,
        ..Default::default()
    };
    let fuel = p.fuel(&since_february).await.unwrap();
    assert_eq!(fuel.stats.records, 5);
    assert_eq!(fuel.groups.len(), 1);
    assert_eq!(fuel.groups[0].key, "2025-02");
    assert_eq!(fuel.stats.filter.as_deref(), Some("from=2025-02-01"));
}

#[tokio::test]
async fn test_missing_fuel_source_is_a_config_error() {
    let mut p = pipeline(Sources::default());
    let err = p.fuel(&FuelQuery::default()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
    assert_eq!(err.kind(), "config_error");
}

#[tokio::test]
async fn test_unreadable_source_is_a_fetch_error() {
    let mut p = pipeline(Sources {
        fuel: Some(fixture("does_not_exist.csv")),
        ..Default::default()
    });
    let err = p.fuel(&FuelQuery::default()).await.unwrap_err();
    assert_eq!(err.kind(), "fetch_error");
}

#[tokio::test]
async fn test_fleet_report_over_fixtures() {
    let mut p = pipeline(sources());
    let fleet = p.fleet(LocationType::Municipality).await.unwrap();
    let s = &fleet.summary;

    // The blank-plate row is skipped.
    assert_eq!(s.rows, 6);
    assert_eq!(s.vehicles, 5);
    assert_eq!(s.leased, 3);
    assert_eq!(s.owned, 2);
    // 4500 backfilled for the SUV plus the 3200 pickup counted once.
    assert!(close(s.monthly_lease_cost, 7700.0));
    assert_eq!(s.units[0].unit, "1 BPM");
    assert_eq!(s.units[0].vehicles, 3);

    assert_eq!(s.duplicates.len(), 1);
    assert_eq!(s.duplicates[0].plate, "GHI9012");
    assert_eq!(s.duplicates[0].rows, vec![4, 5]);
    assert_eq!(s.duplicates[0].units, vec!["1º BPM", "3º BPM"]);

    assert_eq!(fleet.flags.get("missing_lease_rate"), Some(&1));

    let plan = fleet.redistribution.unwrap();
    assert!(close(plan.mean_ratio, 5.0 / 3.0));
    assert!(plan.excluded.is_empty());
    assert_eq!(plan.moves.len(), 1);
    assert_eq!(plan.moves[0].from, "1 BPM");
    assert_eq!(plan.moves[0].to, "3 BPM");
    assert_eq!(plan.moves[0].vehicles, 1);
}

#[tokio::test]
async fn test_fleet_without_geo_has_no_plan() {
    let mut p = pipeline(Sources {
        geo: None,
        ..sources()
    });
    let fleet = p.fleet(LocationType::Municipality).await.unwrap();
    assert!(fleet.redistribution.is_none());
}

#[tokio::test]
async fn test_personnel_report_over_fixtures() {
    let mut p = pipeline(sources());
    let all = p.personnel(&PersonnelQuery::default()).await.unwrap();

    let war_names: Vec<&str> = all.records.iter().map(|r| r.war_name.as_str()).collect();
    assert_eq!(war_names, vec!["SILVA", "PAULA", "LIMA", "OLIVEIRA"]);
    assert_eq!(all.records[2].function_grade.as_deref(), Some("CB"));
    assert_eq!(all.records[3].function_grade.as_deref(), Some("SGT"));
    assert_eq!(all.records[0].function_grade, None);
    // The duplicated registration keeps the first roster's row.
    assert_eq!(all.records[1].name, "ANA PAULA SOUZA");

    assert_eq!(all.summary.headcount, 4);
    assert_eq!(all.summary.sectors, 2);
    assert_eq!(
        all.summary.by_status,
        vec![("SEM BGO".to_string(), 3), ("CLASSIFICADO".to_string(), 1)]
    );

    let almox = p
        .personnel(&PersonnelQuery {
            search: "almox".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(almox.summary.headcount, 2);

    let classified = p
        .personnel(&PersonnelQuery {
            search: String::new(),
            statuses: vec!["classificado".to_string()],
        })
        .await
        .unwrap();
    assert_eq!(classified.records.len(), 1);
    assert_eq!(classified.records[0].war_name, "SILVA");
}

#[tokio::test]
async fn test_exports_and_history() {
    let dir = tempfile::tempdir().unwrap();
    let mut p = pipeline(sources());

    let fuel = p.fuel(&FuelQuery::default()).await.unwrap();
    let written = report::fuel::export(&fuel, dir.path(), true).unwrap();
    assert_eq!(written.len(), 7);
    assert!(written.iter().all(|path| path.exists()));

    let summary = dir.path().join("fuel_summary.json.gz");
    let mut json = String::new();
    GzDecoder::new(std::fs::File::open(&summary).unwrap())
        .read_to_string(&mut json)
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["records"], 8);

    let fleet = p.fleet(LocationType::Municipality).await.unwrap();
    assert_eq!(report::fleet::export(&fleet, dir.path(), false).unwrap().len(), 6);

    let history = dir.path().join("history").join("runs.csv");
    append_record(&history, &fuel.stats).unwrap();
    let failed = FuelStats::from_error("fetch_error", "connection refused");
    append_record(&history, &failed).unwrap();

    let content = std::fs::read_to_string(&history).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("timestamp,"));
    assert!(lines[2].contains("fetch_error"));
}
