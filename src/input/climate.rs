//! Code for reading annual runoff and evaporation for each basin and period.
use super::*;
use crate::basin::{BasinID, BasinMap};
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const CLIMATE_FILE_NAME: &str = "climate.csv";

/// Annual climate for one basin in one period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Climate {
    /// Mean annual runoff (km³)
    pub runoff: f64,
    /// Annual depth of open-water evaporation (km)
    pub evaporation_depth: f64,
}

/// Climate data keyed by basin and period
pub type ClimateMap = HashMap<(BasinID, u32), Climate>;

#[derive(PartialEq, Debug, Deserialize)]
struct ClimateRaw {
    basin_id: BasinID,
    period: u32,
    runoff_km3: f64,
    evaporation_km: f64,
}

fn read_climate_from_iter<I>(iter: I, basins: &BasinMap) -> Result<ClimateMap>
where
    I: Iterator<Item = ClimateRaw>,
{
    let mut map = ClimateMap::new();
    for record in iter {
        check_basin_exists(basins, record.basin_id)?;
        check_non_negative("runoff_km3", record.runoff_km3)?;
        check_non_negative("evaporation_km", record.evaporation_km)?;

        let climate = Climate {
            runoff: record.runoff_km3,
            evaporation_depth: record.evaporation_km,
        };
        ensure!(
            map.insert((record.basin_id, record.period), climate).is_none(),
            "Duplicate climate entry for basin {} in period {}",
            record.basin_id,
            record.period
        );
    }

    Ok(map)
}

/// Read annual climate data from a CSV file.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `basins` - All basins
pub fn read_climate(model_dir: &Path, basins: &BasinMap) -> Result<ClimateMap> {
    let file_path = model_dir.join(CLIMATE_FILE_NAME);
    let climate_csv = read_csv(&file_path)?;
    read_climate_from_iter(climate_csv, basins).with_context(|| input_err_msg(&file_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, basins};
    use rstest::rstest;

    fn record(basin_id: BasinID, runoff_km3: f64) -> ClimateRaw {
        ClimateRaw {
            basin_id,
            period: 2020,
            runoff_km3,
            evaporation_km: 0.001,
        }
    }

    #[rstest]
    fn test_read_climate_from_iter(basins: BasinMap) {
        let map = read_climate_from_iter([record(1, 10.0)].into_iter(), &basins).unwrap();
        assert_eq!(
            map[&(1, 2020)],
            Climate {
                runoff: 10.0,
                evaporation_depth: 0.001
            }
        );
    }

    #[rstest]
    fn test_read_climate_unknown_basin(basins: BasinMap) {
        assert_error!(
            read_climate_from_iter([record(99, 10.0)].into_iter(), &basins),
            "Unknown basin ID 99"
        );
    }

    #[rstest]
    fn test_read_climate_negative_runoff(basins: BasinMap) {
        assert_error!(
            read_climate_from_iter([record(1, -1.0)].into_iter(), &basins),
            "runoff_km3 must be a finite number greater than or equal to zero (value: -1)"
        );
    }

    #[rstest]
    fn test_read_climate_duplicate(basins: BasinMap) {
        assert_error!(
            read_climate_from_iter([record(1, 1.0), record(1, 2.0)].into_iter(), &basins),
            "Duplicate climate entry for basin 1 in period 2020"
        );
    }
}
