//! Code for reading sectoral water demand and its monthly distribution.
use super::profile::MonthlyValues;
use super::*;
use crate::basin::{BasinID, BasinMap};
use crate::profile::MonthlyFractions;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const DEMAND_PROFILES_FILE_NAME: &str = "demand_profiles.csv";
const SECTORAL_DEMAND_FILE_NAME: &str = "sectoral_demand.csv";
const SOLVED_DEMAND_FILE_NAME: &str = "solved_demand.csv";

/// Monthly demand profiles for each sector, keyed by basin and period
pub type SectorProfileMap = HashMap<(BasinID, u32), IndexMap<String, MonthlyFractions>>;

/// Annual demand (km³) for each sector, keyed by basin (and, for solved demand, period)
pub type SectorDemandMap<K> = HashMap<K, IndexMap<String, f64>>;

#[derive(PartialEq, Debug, Deserialize)]
struct DemandProfileRaw {
    basin_id: BasinID,
    period: u32,
    month: u32,
    sector: String,
    #[serde(deserialize_with = "deserialise_proportion")]
    fraction: f64,
}

#[derive(PartialEq, Debug, Deserialize)]
struct SectoralDemandRaw {
    basin_id: BasinID,
    sector: String,
    demand_km3: f64,
}

#[derive(PartialEq, Debug, Deserialize)]
struct SolvedDemandRaw {
    basin_id: BasinID,
    period: u32,
    sector: String,
    demand_km3: f64,
}

fn read_demand_profiles_from_iter<I>(iter: I, basins: &BasinMap) -> Result<SectorProfileMap>
where
    I: Iterator<Item = DemandProfileRaw>,
{
    let mut values: HashMap<(BasinID, u32), IndexMap<String, MonthlyValues>> = HashMap::new();
    for record in iter {
        check_basin_exists(basins, record.basin_id)?;
        values
            .entry((record.basin_id, record.period))
            .or_default()
            .entry(record.sector.clone())
            .or_default()
            .insert(record.month, record.fraction)
            .with_context(|| {
                format!(
                    "Invalid demand profile for sector {} in basin {} and period {}",
                    record.sector, record.basin_id, record.period
                )
            })?;
    }

    let mut map = SectorProfileMap::new();
    for ((basin_id, period), sectors) in values {
        let mut profiles = IndexMap::new();
        for (sector, monthly) in sectors {
            let profile = monthly.into_fractions().with_context(|| {
                format!(
                    "Invalid demand profile for sector {sector} in basin {basin_id} and period \
                    {period}"
                )
            })?;
            profiles.insert(sector, profile);
        }
        map.insert((basin_id, period), profiles);
    }

    Ok(map)
}

/// Insert annual demand for a sector, checking it is valid and not already present
fn insert_demand(
    sectors: &mut IndexMap<String, f64>,
    sector: String,
    demand_km3: f64,
) -> Result<()> {
    check_non_negative("demand_km3", demand_km3)?;
    ensure!(
        !sectors.contains_key(&sector),
        "Duplicate demand entry for sector {sector}"
    );
    sectors.insert(sector, demand_km3);

    Ok(())
}

fn read_sectoral_demand_from_iter<I>(
    iter: I,
    basins: &BasinMap,
) -> Result<SectorDemandMap<BasinID>>
where
    I: Iterator<Item = SectoralDemandRaw>,
{
    let mut map = SectorDemandMap::new();
    for record in iter {
        check_basin_exists(basins, record.basin_id)?;
        let sectors = map.entry(record.basin_id).or_default();
        insert_demand(sectors, record.sector, record.demand_km3)
            .with_context(|| format!("Invalid demand for basin {}", record.basin_id))?;
    }

    Ok(map)
}

fn read_solved_demand_from_iter<I>(
    iter: I,
    basins: &BasinMap,
) -> Result<SectorDemandMap<(BasinID, u32)>>
where
    I: Iterator<Item = SolvedDemandRaw>,
{
    let mut map = SectorDemandMap::new();
    for record in iter {
        check_basin_exists(basins, record.basin_id)?;
        let sectors = map.entry((record.basin_id, record.period)).or_default();
        insert_demand(sectors, record.sector, record.demand_km3).with_context(|| {
            format!(
                "Invalid demand for basin {} in period {}",
                record.basin_id, record.period
            )
        })?;
    }

    Ok(map)
}

/// Read monthly demand profiles for each sector from a CSV file.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `basins` - All basins
pub fn read_demand_profiles(model_dir: &Path, basins: &BasinMap) -> Result<SectorProfileMap> {
    let file_path = model_dir.join(DEMAND_PROFILES_FILE_NAME);
    let profiles_csv = read_csv(&file_path)?;
    read_demand_profiles_from_iter(profiles_csv, basins).with_context(|| input_err_msg(&file_path))
}

/// Read historical annual demand for each sector from a CSV file
pub fn read_sectoral_demand(
    model_dir: &Path,
    basins: &BasinMap,
) -> Result<SectorDemandMap<BasinID>> {
    let file_path = model_dir.join(SECTORAL_DEMAND_FILE_NAME);
    let demand_csv = read_csv(&file_path)?;
    read_sectoral_demand_from_iter(demand_csv, basins).with_context(|| input_err_msg(&file_path))
}

/// Read annual demand for each sector solved by the integrated assessment model.
///
/// The file is optional. If it is missing, historical demand is used for every period.
pub fn read_solved_demand(
    model_dir: &Path,
    basins: &BasinMap,
) -> Result<SectorDemandMap<(BasinID, u32)>> {
    let file_path = model_dir.join(SOLVED_DEMAND_FILE_NAME);
    let demand_csv = read_csv_optional(&file_path)?;
    read_solved_demand_from_iter(demand_csv, basins).with_context(|| input_err_msg(&file_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, basins};
    use crate::profile::iter_months;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn profile_records(sector: &str) -> impl Iterator<Item = DemandProfileRaw> + '_ {
        iter_months().map(move |month| DemandProfileRaw {
            basin_id: 1,
            period: 2020,
            month,
            sector: sector.to_string(),
            fraction: if month == 7 { 1.0 } else { 0.0 },
        })
    }

    #[rstest]
    fn test_read_demand_profiles(basins: BasinMap) {
        let records = profile_records("irrigation").chain(profile_records("domestic"));
        let map = read_demand_profiles_from_iter(records, &basins).unwrap();
        let sectors = &map[&(1, 2020)];
        assert_eq!(
            sectors.keys().collect::<Vec<_>>(),
            ["irrigation", "domestic"]
        );
        assert_approx_eq!(f64, sectors["domestic"].get(7), 1.0);
    }

    #[rstest]
    fn test_read_demand_profiles_duplicate_month(basins: BasinMap) {
        let records = profile_records("irrigation").chain(profile_records("irrigation").take(1));
        assert_error!(
            read_demand_profiles_from_iter(records, &basins),
            "Invalid demand profile for sector irrigation in basin 1 and period 2020"
        );
    }

    #[rstest]
    fn test_read_sectoral_demand(basins: BasinMap) {
        let records = [
            SectoralDemandRaw {
                basin_id: 1,
                sector: "irrigation".into(),
                demand_km3: 2.0,
            },
            SectoralDemandRaw {
                basin_id: 1,
                sector: "domestic".into(),
                demand_km3: 0.5,
            },
        ];
        let map = read_sectoral_demand_from_iter(records.into_iter(), &basins).unwrap();
        assert_approx_eq!(f64, map[&1]["irrigation"], 2.0);
        assert_approx_eq!(f64, map[&1]["domestic"], 0.5);
    }

    #[rstest]
    fn test_read_sectoral_demand_negative(basins: BasinMap) {
        let records = [SectoralDemandRaw {
            basin_id: 2,
            sector: "irrigation".into(),
            demand_km3: -2.0,
        }];
        assert_error!(
            read_sectoral_demand_from_iter(records.into_iter(), &basins),
            "Invalid demand for basin 2"
        );
    }

    #[rstest]
    fn test_read_solved_demand_missing_file(basins: BasinMap) {
        let dir = tempdir().unwrap();
        assert!(read_solved_demand(dir.path(), &basins).unwrap().is_empty());
    }

    #[rstest]
    fn test_read_solved_demand(basins: BasinMap) {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(SOLVED_DEMAND_FILE_NAME)).unwrap();
            writeln!(
                file,
                "basin_id,period,sector,demand_km3
1,2025,irrigation,3.0
1,2030,irrigation,4.0"
            )
            .unwrap();
        }

        let map = read_solved_demand(dir.path(), &basins).unwrap();
        assert_approx_eq!(f64, map[&(1, 2025)]["irrigation"], 3.0);
        assert_approx_eq!(f64, map[&(1, 2030)]["irrigation"], 4.0);
    }
}
