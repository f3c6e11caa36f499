//! Code for reading monthly inflow and evaporation profiles.
use super::*;
use crate::basin::{BasinID, BasinMap};
use crate::profile::{MONTHS_PER_YEAR, MonthlyFractions, iter_months};
use anyhow::{Context, Result, bail, ensure};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const MONTHLY_PROFILES_FILE_NAME: &str = "monthly_profiles.csv";

/// Monthly inflow and evaporation profiles for one basin in one period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HydrologicalProfiles {
    /// Monthly share of annual inflow
    pub inflow: MonthlyFractions,
    /// Monthly share of annual evaporation
    pub evaporation: MonthlyFractions,
}

/// Hydrological profiles keyed by basin and period
pub type HydrologicalProfileMap = HashMap<(BasinID, u32), HydrologicalProfiles>;

#[derive(PartialEq, Debug, Deserialize)]
struct MonthlyProfileRaw {
    basin_id: BasinID,
    period: u32,
    month: u32,
    inflow: f64,
    evaporation: f64,
}

/// Values for each month, filled in one at a time
#[derive(Debug, Default)]
pub(super) struct MonthlyValues([Option<f64>; MONTHS_PER_YEAR]);

impl MonthlyValues {
    /// Set the value for a month, which must not already have one
    pub fn insert(&mut self, month: u32, value: f64) -> Result<()> {
        ensure!(
            (1..=MONTHS_PER_YEAR as u32).contains(&month),
            "Invalid month {month}"
        );
        let slot = &mut self.0[month as usize - 1];
        ensure!(slot.is_none(), "Duplicate entry for month {month}");
        *slot = Some(value);

        Ok(())
    }

    /// Convert to [`MonthlyFractions`], checking that every month has a value
    pub fn into_fractions(self) -> Result<MonthlyFractions> {
        let mut values = [0.0; MONTHS_PER_YEAR];
        for ((value, slot), month) in values.iter_mut().zip(self.0).zip(iter_months()) {
            let Some(slot) = slot else {
                bail!("Missing entry for month {month}");
            };
            *value = slot;
        }

        MonthlyFractions::new(values)
    }
}

fn read_hydrological_profiles_from_iter<I>(
    iter: I,
    basins: &BasinMap,
) -> Result<HydrologicalProfileMap>
where
    I: Iterator<Item = MonthlyProfileRaw>,
{
    let mut values: HashMap<(BasinID, u32), (MonthlyValues, MonthlyValues)> = HashMap::new();
    for record in iter {
        check_basin_exists(basins, record.basin_id)?;
        let (inflow, evaporation) = values.entry((record.basin_id, record.period)).or_default();
        inflow
            .insert(record.month, record.inflow)
            .and_then(|()| evaporation.insert(record.month, record.evaporation))
            .with_context(|| {
                format!(
                    "Invalid monthly profile for basin {} in period {}",
                    record.basin_id, record.period
                )
            })?;
    }

    values
        .into_iter()
        .map(|((basin_id, period), (inflow, evaporation))| {
            let context = || format!("Invalid monthly profile for basin {basin_id} in period {period}");
            let profiles = HydrologicalProfiles {
                inflow: inflow.into_fractions().with_context(context)?,
                evaporation: evaporation.into_fractions().with_context(context)?,
            };
            Ok(((basin_id, period), profiles))
        })
        .collect()
}

/// Read monthly inflow and evaporation profiles from a CSV file.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `basins` - All basins
pub fn read_hydrological_profiles(
    model_dir: &Path,
    basins: &BasinMap,
) -> Result<HydrologicalProfileMap> {
    let file_path = model_dir.join(MONTHLY_PROFILES_FILE_NAME);
    let profiles_csv = read_csv(&file_path)?;
    read_hydrological_profiles_from_iter(profiles_csv, basins)
        .with_context(|| input_err_msg(&file_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, basins};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn uniform_records(basin_id: BasinID) -> Vec<MonthlyProfileRaw> {
        iter_months()
            .map(|month| MonthlyProfileRaw {
                basin_id,
                period: 2020,
                month,
                inflow: 1.0 / 12.0,
                evaporation: 1.0 / 12.0,
            })
            .collect()
    }

    #[rstest]
    fn test_read_hydrological_profiles(basins: BasinMap) {
        let map =
            read_hydrological_profiles_from_iter(uniform_records(1).into_iter(), &basins).unwrap();
        let profiles = &map[&(1, 2020)];
        assert_approx_eq!(f64, profiles.inflow.get(3), 1.0 / 12.0);
        assert_approx_eq!(f64, profiles.evaporation.get(12), 1.0 / 12.0);
    }

    #[rstest]
    fn test_read_hydrological_profiles_missing_month(basins: BasinMap) {
        let mut records = uniform_records(1);
        records.remove(4);
        let result = read_hydrological_profiles_from_iter(records.into_iter(), &basins);
        assert_error!(result, "Invalid monthly profile for basin 1 in period 2020");
    }

    #[rstest]
    fn test_read_hydrological_profiles_unknown_basin(basins: BasinMap) {
        assert_error!(
            read_hydrological_profiles_from_iter(uniform_records(42).into_iter(), &basins),
            "Unknown basin ID 42"
        );
    }

    #[test]
    fn test_monthly_values() {
        let mut values = MonthlyValues::default();
        assert_error!(values.insert(13, 0.5), "Invalid month 13");
        values.insert(1, 0.5).unwrap();
        assert_error!(values.insert(1, 0.5), "Duplicate entry for month 1");
        assert_error!(values.into_fractions(), "Missing entry for month 2");
    }
}
