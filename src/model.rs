//! The model: parameters and the physical data for every basin.
use crate::basin::{
    Basin, BasinID, BasinMap, BasinPhysicalProfile, aggregate_demand_profile, current_capacity,
    max_capacity,
};
use crate::input::{
    ClimateMap, HydrologicalProfileMap, ReservoirMap, SectorDemandMap, SectorProfileMap,
    SolvedCapacityMap,
};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use log::warn;
use std::path::PathBuf;

pub mod parameters;
pub use parameters::{ModelParameters, OutputSettings, ResamplingMethod};

/// Model definition
pub struct Model {
    /// Path to model folder
    pub model_path: PathBuf,
    /// Parameters from the model TOML file
    pub parameters: ModelParameters,
    /// Basins, in input file order
    pub basins: BasinMap,
    /// Annual runoff and evaporation depth
    pub climate: ClimateMap,
    /// Monthly inflow and evaporation profiles
    pub hydrological_profiles: HydrologicalProfileMap,
    /// Monthly demand profiles for each sector
    pub demand_profiles: SectorProfileMap,
    /// Historical annual demand for each sector
    pub sectoral_demand: SectorDemandMap<BasinID>,
    /// Annual demand for each sector solved by the integrated assessment model
    pub solved_demand: SectorDemandMap<(BasinID, u32)>,
    /// Reservoir characteristics
    pub reservoirs: ReservoirMap,
    /// Storage capacity solved by the integrated assessment model
    pub solved_capacity: SolvedCapacityMap,
}

impl Model {
    /// Iterate over the model's periods
    pub fn iter_periods(&self) -> impl Iterator<Item = u32> + '_ {
        self.parameters.periods.iter().copied()
    }

    /// Iterate over the basins included in the run, in input file order
    pub fn iter_basins(&self) -> impl Iterator<Item = &Basin> {
        self.basins.values().filter(|basin| {
            self.parameters
                .basin_ids
                .as_ref()
                .is_none_or(|ids| ids.contains(&basin.id))
        })
    }

    /// Check that there are data for every basin and period in the run
    pub fn check_coverage(&self) -> Result<()> {
        if let Some(basin_ids) = &self.parameters.basin_ids {
            for id in basin_ids {
                ensure!(
                    self.basins.contains_key(id),
                    "basin_ids contains unknown basin ID {id}"
                );
            }
        }

        for basin in self.iter_basins() {
            let id = basin.id;
            ensure!(
                self.reservoirs.contains_key(&id),
                "No reservoir data for basin {id}"
            );
            ensure!(
                self.sectoral_demand.contains_key(&id),
                "No sectoral demand for basin {id}"
            );
            for period in self.iter_periods() {
                let key = (id, period);
                ensure!(
                    self.climate.contains_key(&key),
                    "No climate data for basin {id} in period {period}"
                );
                ensure!(
                    self.hydrological_profiles.contains_key(&key),
                    "No monthly profiles for basin {id} in period {period}"
                );
                ensure!(
                    self.demand_profiles.contains_key(&key),
                    "No demand profiles for basin {id} in period {period}"
                );
            }
        }

        Ok(())
    }

    /// The annual sectoral demand used to weight demand profiles.
    ///
    /// Solved demand is used for periods after the base period, unless it is missing or sums to
    /// zero, in which case historical demand is used.
    fn sectoral_demand_for(&self, basin_id: BasinID, period: u32) -> Result<&IndexMap<String, f64>> {
        let historical = self
            .sectoral_demand
            .get(&basin_id)
            .with_context(|| format!("No sectoral demand for basin {basin_id}"))?;
        if period <= self.parameters.base_period {
            return Ok(historical);
        }

        match self.solved_demand.get(&(basin_id, period)) {
            Some(solved) if solved.values().sum::<f64>() > 0.0 => Ok(solved),
            Some(_) => {
                warn!(
                    "Basin {basin_id} has a total solved demand of zero in period {period}. \
                    Using historical demand instead."
                );
                Ok(historical)
            }
            None => Ok(historical),
        }
    }

    /// Assemble the physical inputs for a basin in a period.
    ///
    /// # Arguments
    ///
    /// * `basin_id` - The basin
    /// * `period` - The period
    /// * `previous_capacity` - Storage capacity used for this basin in the previous period, if any
    pub fn basin_profile(
        &self,
        basin_id: BasinID,
        period: u32,
        previous_capacity: Option<f64>,
    ) -> Result<BasinPhysicalProfile> {
        let key = (basin_id, period);
        let climate = self
            .climate
            .get(&key)
            .with_context(|| format!("No climate data for basin {basin_id} in period {period}"))?;
        let hydrological = self.hydrological_profiles.get(&key).with_context(|| {
            format!("No monthly profiles for basin {basin_id} in period {period}")
        })?;
        let sector_profiles = self.demand_profiles.get(&key).with_context(|| {
            format!("No demand profiles for basin {basin_id} in period {period}")
        })?;
        let reservoir = self
            .reservoirs
            .get(&basin_id)
            .with_context(|| format!("No reservoir data for basin {basin_id}"))?;

        let demand = self.sectoral_demand_for(basin_id, period)?;
        let demand_profile = aggregate_demand_profile(sector_profiles, demand).with_context(|| {
            format!("Could not calculate demand profile for basin {basin_id} in period {period}")
        })?;

        Ok(BasinPhysicalProfile {
            basin_id,
            period,
            inflow: climate.runoff,
            evaporation_depth: climate.evaporation_depth,
            inflow_profile: hydrological.inflow,
            evaporation_profile: hydrological.evaporation,
            demand_profile,
            volume_area_b: reservoir.volume_area_b,
            volume_area_c: reservoir.volume_area_c,
            slope: reservoir.slope,
            max_capacity: max_capacity(reservoir.expandable_capacity, climate.runoff),
            current_capacity: current_capacity(
                period,
                self.parameters.base_period,
                reservoir.existing_capacity,
                self.solved_capacity.get(&key).copied(),
                previous_capacity,
            ),
            expansion_increment: reservoir.mean_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, model};
    use float_cmp::assert_approx_eq;
    use indexmap::indexmap;
    use rstest::rstest;

    #[rstest]
    fn test_basin_profile(model: Model) {
        let profile = model.basin_profile(1, 2020, None).unwrap();
        assert_approx_eq!(f64, profile.inflow, 10.0);
        assert_approx_eq!(f64, profile.max_capacity, 12.0);
        assert_approx_eq!(f64, profile.current_capacity, 1.0);
        assert_approx_eq!(f64, profile.expansion_increment, 0.5);
        assert_approx_eq!(f64, profile.demand_profile.get(1), 1.0 / 12.0);
    }

    #[rstest]
    fn test_basin_profile_uses_solved_data(mut model: Model) {
        model.parameters.periods = vec![2020, 2025];
        let mut summer = [0.0; 12];
        summer[6] = 1.0;
        let profiles = indexmap! {
            "irrigation".to_string() => crate::profile::MonthlyFractions::new(summer).unwrap(),
        };
        let climate = model.climate[&(1, 2020)];
        let hydrological = model.hydrological_profiles[&(1, 2020)];
        model.climate.insert((1, 2025), climate);
        model.hydrological_profiles.insert((1, 2025), hydrological);
        model.demand_profiles.insert((1, 2025), profiles);
        model
            .sectoral_demand
            .insert(1, indexmap! {"irrigation".to_string() => 1.0});
        model
            .solved_demand
            .insert((1, 2025), indexmap! {"irrigation".to_string() => 2.0});
        model.solved_capacity.insert((1, 2025), 4.0);

        let profile = model.basin_profile(1, 2025, None).unwrap();
        assert_approx_eq!(f64, profile.current_capacity, 4.0);
        assert_approx_eq!(f64, profile.demand_profile.get(7), 1.0);
    }

    #[rstest]
    fn test_sectoral_demand_zero_solved_falls_back(mut model: Model) {
        model
            .solved_demand
            .insert((1, 2025), indexmap! {"domestic".to_string() => 0.0});
        let demand = model.sectoral_demand_for(1, 2025).unwrap();
        assert_eq!(demand, &model.sectoral_demand[&1]);
    }

    #[rstest]
    fn test_check_coverage(mut model: Model) {
        assert!(model.check_coverage().is_ok());

        model.parameters.periods = vec![2020, 2025];
        assert_error!(
            model.check_coverage(),
            "No climate data for basin 1 in period 2025"
        );
    }

    #[rstest]
    fn test_iter_basins_filter(mut model: Model) {
        assert_eq!(model.iter_basins().count(), 2);
        model.parameters.basin_ids = Some(vec![2]);
        assert_eq!(
            model.iter_basins().map(|basin| basin.id).collect::<Vec<_>>(),
            [2]
        );
        model.parameters.basin_ids = Some(vec![7]);
        assert_error!(
            model.check_coverage(),
            "basin_ids contains unknown basin ID 7"
        );
    }
}
