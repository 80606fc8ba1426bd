//! Vehicle reallocation heuristic.
//!
//! Each unit's ratio is vehicles per covered entity (municipality or
//! neighborhood). The fair share of a unit is the mean ratio times its entity
//! count; the deviation is what it holds above or below that. Moves pair the
//! largest surplus with the largest deficit and transfer the whole vehicles
//! both can spare, until no whole vehicle can move. Every move shifts at
//! least one vehicle and reduces the total absolute deviation, so the loop
//! ends. The plan is advisory.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::analyzers::types::{RedistributionPlan, UnitAllocation, VehicleMove};
use crate::analyzers::utility::mean;
use crate::model::{FleetRecord, LocationType, UnitGeo};
use crate::normalize::{UnitNormalizer, fold_text, normalize_plate};

/// Distinct plates per canonical unit.
pub fn count_vehicles(fleet: &[FleetRecord], normalizer: &UnitNormalizer) -> BTreeMap<String, usize> {
    let mut plates: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for vehicle in fleet {
        let unit = normalizer.key(&vehicle.unit);
        if unit.is_empty() {
            continue;
        }
        plates.entry(unit).or_default().insert(normalize_plate(&vehicle.plate));
    }
    plates.into_iter().map(|(u, p)| (u, p.len())).collect()
}

/// Distinct locations of `kind` per canonical unit.
pub fn count_entities(
    geo: &[UnitGeo],
    kind: LocationType,
    normalizer: &UnitNormalizer,
) -> BTreeMap<String, usize> {
    let mut names: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for place in geo.iter().filter(|g| g.location_type == kind) {
        let unit = normalizer.key(&place.unit);
        if unit.is_empty() {
            continue;
        }
        names
            .entry(unit)
            .or_default()
            .insert(fold_text(&place.location_name));
    }
    names.into_iter().map(|(u, n)| (u, n.len())).collect()
}

pub fn plan_redistribution(
    vehicles: &BTreeMap<String, usize>,
    entities: &BTreeMap<String, usize>,
) -> RedistributionPlan {
    let excluded: Vec<String> = vehicles
        .iter()
        .filter(|(unit, n)| **n > 0 && entities.get(*unit).copied().unwrap_or(0) == 0)
        .map(|(unit, _)| unit.clone())
        .collect();

    let covered: Vec<(&String, usize, usize)> = entities
        .iter()
        .filter(|(_, e)| **e > 0)
        .map(|(unit, e)| (unit, vehicles.get(unit).copied().unwrap_or(0), *e))
        .collect();

    let ratios: Vec<f64> = covered.iter().map(|(_, v, e)| *v as f64 / *e as f64).collect();
    let mean_ratio = mean(&ratios);

    let mut residual: Vec<f64> = covered
        .iter()
        .map(|(_, v, e)| *v as f64 - mean_ratio * *e as f64)
        .collect();

    let mut moves = Vec::new();
    let mut net: HashMap<usize, i64> = HashMap::new();
    loop {
        let (Some(giver), Some(taker)) = (argmax(&residual), argmin(&residual)) else {
            break;
        };
        let amount = residual[giver].min(-residual[taker]).floor();
        if amount < 1.0 {
            break;
        }
        residual[giver] -= amount;
        residual[taker] += amount;
        *net.entry(giver).or_default() -= amount as i64;
        *net.entry(taker).or_default() += amount as i64;
        moves.push(VehicleMove {
            from: covered[giver].0.clone(),
            to: covered[taker].0.clone(),
            vehicles: amount as usize,
        });
    }

    let units = covered
        .iter()
        .zip(&ratios)
        .enumerate()
        .map(|(i, ((unit, v, e), ratio))| {
            let fair_share = mean_ratio * *e as f64;
            let after = *v as i64 + net.get(&i).copied().unwrap_or(0);
            UnitAllocation {
                unit: (*unit).clone(),
                vehicles: *v,
                entities: *e,
                ratio: *ratio,
                fair_share,
                deviation: *v as f64 - fair_share,
                vehicles_after: after.max(0) as usize,
            }
        })
        .collect();

    debug!(units = covered.len(), moves = moves.len(), mean_ratio, "Redistribution planned");
    RedistributionPlan {
        mean_ratio,
        units,
        moves,
        excluded,
    }
}

fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

fn argmin(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b <= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}
