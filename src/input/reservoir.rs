//! Code for reading reservoir storage characteristics for each basin.
use super::*;
use crate::basin::{BasinID, BasinMap};
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const RESERVOIRS_FILE_NAME: &str = "reservoirs.csv";
const SOLVED_CAPACITY_FILE_NAME: &str = "solved_capacity.csv";

/// Storage characteristics of the reservoirs in a basin
#[derive(PartialEq, Debug, Clone, Copy, Deserialize)]
pub struct Reservoir {
    /// The basin the reservoirs are in
    pub basin_id: BasinID,
    /// Historical storage capacity (km³)
    #[serde(rename = "existing_capacity_km3")]
    pub existing_capacity: f64,
    /// Capacity which could still be built (km³)
    #[serde(rename = "expandable_capacity_km3")]
    pub expandable_capacity: f64,
    /// Mean capacity of a single reservoir (km³), used as the expansion step
    #[serde(rename = "mean_capacity_km3")]
    pub mean_capacity: f64,
    /// Exponent `b` of the volume-area relation `V = c * A^b`
    pub volume_area_b: f64,
    /// Coefficient `c` of the volume-area relation `V = c * A^b`
    pub volume_area_c: f64,
    /// Mean terrain slope
    pub slope: f64,
}

/// Reservoirs keyed by basin
pub type ReservoirMap = HashMap<BasinID, Reservoir>;

/// Storage capacity solved by the integrated assessment model, keyed by basin and period
pub type SolvedCapacityMap = HashMap<(BasinID, u32), f64>;

#[derive(PartialEq, Debug, Deserialize)]
struct SolvedCapacityRaw {
    basin_id: BasinID,
    period: u32,
    capacity_km3: f64,
}

/// Check that the reservoir parameters are within range
fn check_reservoir(reservoir: &Reservoir) -> Result<()> {
    check_non_negative("existing_capacity_km3", reservoir.existing_capacity)?;
    check_non_negative("expandable_capacity_km3", reservoir.expandable_capacity)?;
    check_non_negative("slope", reservoir.slope)?;
    ensure!(
        reservoir.mean_capacity.is_finite() && reservoir.mean_capacity > 0.0,
        "mean_capacity_km3 must be greater than zero"
    );
    ensure!(
        reservoir.volume_area_b.is_finite() && reservoir.volume_area_b > 0.0,
        "volume_area_b must be greater than zero"
    );
    ensure!(
        reservoir.volume_area_c.is_finite() && reservoir.volume_area_c > 0.0,
        "volume_area_c must be greater than zero"
    );

    Ok(())
}

fn read_reservoirs_from_iter<I>(iter: I, basins: &BasinMap) -> Result<ReservoirMap>
where
    I: Iterator<Item = Reservoir>,
{
    let mut map = ReservoirMap::new();
    for reservoir in iter {
        let basin_id = reservoir.basin_id;
        check_basin_exists(basins, basin_id)?;
        check_reservoir(&reservoir)
            .with_context(|| format!("Invalid reservoir data for basin {basin_id}"))?;
        ensure!(
            map.insert(basin_id, reservoir).is_none(),
            "Duplicate reservoir entry for basin {basin_id}"
        );
    }

    Ok(map)
}

fn read_solved_capacity_from_iter<I>(iter: I, basins: &BasinMap) -> Result<SolvedCapacityMap>
where
    I: Iterator<Item = SolvedCapacityRaw>,
{
    let mut map = SolvedCapacityMap::new();
    for record in iter {
        check_basin_exists(basins, record.basin_id)?;
        check_non_negative("capacity_km3", record.capacity_km3)?;
        ensure!(
            map.insert((record.basin_id, record.period), record.capacity_km3)
                .is_none(),
            "Duplicate solved capacity for basin {} in period {}",
            record.basin_id,
            record.period
        );
    }

    Ok(map)
}

/// Read reservoir characteristics from a CSV file.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `basins` - All basins
pub fn read_reservoirs(model_dir: &Path, basins: &BasinMap) -> Result<ReservoirMap> {
    let file_path = model_dir.join(RESERVOIRS_FILE_NAME);
    let reservoirs_csv = read_csv(&file_path)?;
    read_reservoirs_from_iter(reservoirs_csv, basins).with_context(|| input_err_msg(&file_path))
}

/// Read storage capacity solved by the integrated assessment model.
///
/// The file is optional. If it is missing, existing capacity is used for every period.
pub fn read_solved_capacity(model_dir: &Path, basins: &BasinMap) -> Result<SolvedCapacityMap> {
    let file_path = model_dir.join(SOLVED_CAPACITY_FILE_NAME);
    let capacity_csv = read_csv_optional(&file_path)?;
    read_solved_capacity_from_iter(capacity_csv, basins)
        .with_context(|| input_err_msg(&file_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, basins};
    use rstest::{fixture, rstest};
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[fixture]
    fn reservoir() -> Reservoir {
        Reservoir {
            basin_id: 1,
            existing_capacity: 1.0,
            expandable_capacity: 12.0,
            mean_capacity: 0.5,
            volume_area_b: 1.2,
            volume_area_c: 0.01,
            slope: 2.0,
        }
    }

    #[rstest]
    fn test_read_reservoirs(basins: BasinMap) {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(RESERVOIRS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "basin_id,existing_capacity_km3,expandable_capacity_km3,mean_capacity_km3,\
volume_area_b,volume_area_c,slope
1,1.0,12.0,0.5,1.2,0.01,2.0"
            )
            .unwrap();
        }

        let map = read_reservoirs(dir.path(), &basins).unwrap();
        assert_eq!(map[&1], reservoir());
    }

    #[rstest]
    #[case(|r: &mut Reservoir| r.mean_capacity = 0.0, "mean_capacity_km3 must be greater than zero")]
    #[case(|r: &mut Reservoir| r.volume_area_b = 0.0, "volume_area_b must be greater than zero")]
    #[case(|r: &mut Reservoir| r.volume_area_c = -1.0, "volume_area_c must be greater than zero")]
    fn test_check_reservoir_invalid(
        mut reservoir: Reservoir,
        #[case] modify: fn(&mut Reservoir),
        #[case] msg: &str,
    ) {
        modify(&mut reservoir);
        assert_error!(check_reservoir(&reservoir), msg);
    }

    #[rstest]
    fn test_read_reservoirs_duplicate(basins: BasinMap, reservoir: Reservoir) {
        assert_error!(
            read_reservoirs_from_iter([reservoir, reservoir].into_iter(), &basins),
            "Duplicate reservoir entry for basin 1"
        );
    }

    #[rstest]
    fn test_read_solved_capacity(basins: BasinMap) {
        let records = [SolvedCapacityRaw {
            basin_id: 2,
            period: 2025,
            capacity_km3: 3.5,
        }];
        let map = read_solved_capacity_from_iter(records.into_iter(), &basins).unwrap();
        assert_eq!(map[&(2, 2025)], 3.5);
    }
}
