//! Basins and the physical data describing a basin in a single period.
use crate::profile::{MONTHS_PER_YEAR, MonthlyFractions};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;

/// A basin identifier
pub type BasinID = u32;

/// A map of [`Basin`]s, keyed by basin ID
pub type BasinMap = IndexMap<BasinID, Basin>;

/// The length of a model period in years
pub const PERIOD_LENGTH: u32 = 5;

/// Fraction of mean annual runoff used as the expandable capacity of basins with none reported
const DEFAULT_EXPANDABLE_CAPACITY_FRACTION: f64 = 0.01;

/// Suffix appended to the GCAM basin name to form the resource name
const RESOURCE_SUFFIX: &str = "_water withdrawals";

/// Identifying information for a basin
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Basin {
    /// Numeric basin identifier
    #[serde(rename = "basin_id")]
    pub id: BasinID,
    /// Full basin name (e.g. "Guadalquivir")
    #[serde(rename = "basin_name")]
    pub name: String,
    /// The basin name used by the integrated assessment model
    pub gcam_basin_name: String,
    /// The region holding the largest share of the basin
    pub region: String,
}

impl Basin {
    /// The name of the water resource this basin supplies
    pub fn resource_name(&self) -> String {
        format!("{}{RESOURCE_SUFFIX}", self.gcam_basin_name)
    }
}

/// Physical inputs for one basin in one period.
///
/// Volumes are in km³, depths in km and flows in km³ per year.
#[derive(Debug, Clone, PartialEq)]
pub struct BasinPhysicalProfile {
    /// The basin these data describe
    pub basin_id: BasinID,
    /// The model period (year)
    pub period: u32,
    /// Mean annual inflow
    pub inflow: f64,
    /// Annual depth of open-water evaporation
    pub evaporation_depth: f64,
    /// Monthly share of annual inflow
    pub inflow_profile: MonthlyFractions,
    /// Monthly share of annual reservoir evaporation
    pub evaporation_profile: MonthlyFractions,
    /// Monthly share of annual demand
    pub demand_profile: MonthlyFractions,
    /// Exponent `b` of the volume-area relation `V = c * A^b`
    pub volume_area_b: f64,
    /// Coefficient `c` of the volume-area relation `V = c * A^b`
    pub volume_area_c: f64,
    /// Mean terrain slope, used for reservoir costs
    pub slope: f64,
    /// The largest storage capacity which could be built
    pub max_capacity: f64,
    /// Storage capacity in place for this period
    pub current_capacity: f64,
    /// The size of a single reservoir expansion step
    pub expansion_increment: f64,
}

/// The maximum expandable capacity of a basin.
///
/// Basins without any reported expandable capacity are allowed a small share of their runoff.
pub fn max_capacity(expandable_capacity: f64, runoff: f64) -> f64 {
    if expandable_capacity == 0.0 {
        DEFAULT_EXPANDABLE_CAPACITY_FRACTION * runoff
    } else {
        expandable_capacity
    }
}

/// The storage capacity in place for a period.
///
/// # Arguments
///
/// * `period` - The period being modelled
/// * `base_period` - The last historical period
/// * `existing` - Historical storage capacity
/// * `solved` - Storage capacity solved by the integrated assessment model for this period, if any
/// * `previous` - Capacity used for this basin in the previous period, if any
pub fn current_capacity(
    period: u32,
    base_period: u32,
    existing: f64,
    solved: Option<f64>,
    previous: Option<f64>,
) -> f64 {
    if period <= base_period {
        return existing;
    }

    match solved {
        None => existing,
        Some(solved) if period == base_period + PERIOD_LENGTH => existing.max(solved),
        // Capacity is never decommissioned
        Some(solved) => solved.max(previous.unwrap_or(existing)),
    }
}

/// Combine sectoral monthly demand profiles into a single profile, weighted by annual demand.
///
/// Sectors with a profile but no annual demand do not contribute.
pub fn aggregate_demand_profile(
    sector_profiles: &IndexMap<String, MonthlyFractions>,
    sector_demand: &IndexMap<String, f64>,
) -> Result<MonthlyFractions> {
    let total: f64 = sector_demand.values().sum();
    ensure!(total > 0.0, "Total annual demand across sectors is zero");

    let mut monthly = [0.0; MONTHS_PER_YEAR];
    for (sector, demand) in sector_demand {
        let profile = sector_profiles
            .get(sector)
            .with_context(|| format!("No monthly demand profile for sector {sector}"))?;
        for (value, fraction) in monthly.iter_mut().zip(profile.iter()) {
            *value += fraction * demand;
        }
    }

    MonthlyFractions::new(monthly.map(|value| value / total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use float_cmp::assert_approx_eq;
    use indexmap::indexmap;
    use rstest::rstest;

    #[rstest]
    #[case(2.0, 100.0, 2.0)]
    #[case(0.0, 100.0, 1.0)]
    #[case(0.0, 0.0, 0.0)]
    fn test_max_capacity(#[case] expandable: f64, #[case] runoff: f64, #[case] expected: f64) {
        assert_approx_eq!(f64, max_capacity(expandable, runoff), expected);
    }

    #[rstest]
    #[case(2015, None, None, 1.0)] // historical period
    #[case(2020, Some(5.0), None, 1.0)] // base period ignores solved capacity
    #[case(2025, None, Some(3.0), 1.0)] // no solved capacity: existing
    #[case(2025, Some(5.0), None, 5.0)] // first future period
    #[case(2025, Some(0.5), None, 1.0)] // never below existing
    #[case(2030, Some(4.0), Some(5.0), 5.0)] // never below previous
    #[case(2030, Some(6.0), Some(5.0), 6.0)]
    #[case(2030, Some(0.5), None, 1.0)] // no previous: existing
    fn test_current_capacity(
        #[case] period: u32,
        #[case] solved: Option<f64>,
        #[case] previous: Option<f64>,
        #[case] expected: f64,
    ) {
        assert_approx_eq!(
            f64,
            current_capacity(period, 2020, 1.0, solved, previous),
            expected
        );
    }

    #[test]
    fn test_aggregate_demand_profile() {
        let mut summer = [0.0; MONTHS_PER_YEAR];
        summer[5] = 0.5;
        summer[6] = 0.5;
        let profiles = indexmap! {
            "irrigation".to_string() => MonthlyFractions::new(summer).unwrap(),
            "domestic".to_string() => MonthlyFractions::uniform(),
        };
        let demand = indexmap! {
            "irrigation".to_string() => 3.0,
            "domestic".to_string() => 1.0,
        };

        let profile = aggregate_demand_profile(&profiles, &demand).unwrap();
        assert_approx_eq!(f64, profile.get(6), 0.75 * 0.5 + 0.25 / 12.0);
        assert_approx_eq!(f64, profile.get(1), 0.25 / 12.0);
    }

    #[test]
    fn test_aggregate_demand_profile_missing_sector() {
        let profiles = indexmap! {"domestic".to_string() => MonthlyFractions::uniform()};
        let demand = indexmap! {"mining".to_string() => 1.0};
        assert_error!(
            aggregate_demand_profile(&profiles, &demand),
            "No monthly demand profile for sector mining"
        );
    }

    #[test]
    fn test_aggregate_demand_profile_zero_demand() {
        let profiles = indexmap! {"domestic".to_string() => MonthlyFractions::uniform()};
        let demand = indexmap! {"domestic".to_string() => 0.0};
        assert_error!(
            aggregate_demand_profile(&profiles, &demand),
            "Total annual demand across sectors is zero"
        );
    }

    #[test]
    fn test_resource_name() {
        let basin = Basin {
            id: 83,
            name: "Guadalquivir".into(),
            gcam_basin_name: "Guadalquivir".into(),
            region: "EU-15".into(),
        };
        assert_eq!(basin.resource_name(), "Guadalquivir_water withdrawals");
    }
}
