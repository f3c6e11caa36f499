//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::basin::BasinID;
use crate::input::{
    deserialise_proportion, deserialise_proportion_nonzero, input_err_msg, is_sorted_and_unique,
    read_toml,
};
use crate::units::Dimensionless;
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_unit_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            <$type>::new($value)
        }
    };
}

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_base_period, u32, 2020);
define_param_default!(default_init_segments, u32, 100);
define_unit_param_default!(default_discount_rate, Dimensionless, 0.05);
define_param_default!(default_lifetime, u32, 60);
define_param_default!(default_base_price, f64, 1e-4);
define_unit_param_default!(default_maintenance_fraction, Dimensionless, 0.1);
define_param_default!(default_min_storage, f64, 0.0);
define_param_default!(default_return_flow_fraction, f64, 0.1);
define_param_default!(default_max_solver_calls, u32, 10_000);
define_param_default!(default_true, bool, true);

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq)]
pub struct ModelParameters {
    /// Periods (years) for which supply curves are built
    pub periods: Vec<u32>,
    /// The last historical period. Later periods may use demand and capacity from `solved_*.csv`.
    #[serde(default = "default_base_period")]
    pub base_period: u32,
    /// Restrict the run to these basins. All basins are run if omitted.
    #[serde(default)]
    pub basin_ids: Option<Vec<BasinID>>,
    /// Target number of capacity steps used when calibrating the initial step size
    #[serde(default = "default_init_segments")]
    pub init_segments: u32,
    /// Discount rate used to annualise reservoir capital costs
    #[serde(default = "default_discount_rate")]
    #[serde(deserialize_with = "deserialise_proportion_nonzero")]
    pub discount_rate: Dimensionless,
    /// Economic lifetime of a reservoir (years)
    #[serde(default = "default_lifetime")]
    pub lifetime: u32,
    /// Price of water when no storage is built (1975 USD per m³)
    #[serde(default = "default_base_price")]
    pub base_price: f64,
    /// Maintenance cost as a share of construction cost
    #[serde(default = "default_maintenance_fraction")]
    pub maintenance_fraction: Dimensionless,
    /// Minimum storage held in every month (km³)
    #[serde(default = "default_min_storage")]
    pub min_storage: f64,
    /// Share of releases and environmental flow returned to the reservoir
    #[serde(default = "default_return_flow_fraction")]
    #[serde(deserialize_with = "deserialise_proportion")]
    pub return_flow_fraction: f64,
    /// Maximum number of water balance solves per basin and period
    #[serde(default = "default_max_solver_calls")]
    pub max_solver_calls: u32,
    /// Method used to reduce the raw supply curve to a fixed number of points
    #[serde(default)]
    pub resampling: ResamplingMethod,
    /// Which output files to write
    #[serde(default)]
    pub outputs: OutputSettings,
}

/// The method used to reduce a raw supply curve to a fixed number of points
#[derive(DeserializeLabeledStringEnum, Debug, PartialEq, Clone, Copy, Default)]
pub enum ResamplingMethod {
    /// Concentrate points where the price curve bends
    #[default]
    #[string = "curvature"]
    Curvature,
    /// Evenly spaced supplies
    #[string = "even"]
    Even,
}

/// Flags controlling which output files are written
#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
pub struct OutputSettings {
    /// Capacity-yield curves
    #[serde(default = "default_true")]
    pub capacity_yield: bool,
    /// Supply curves and maximum sub-resource tables
    #[serde(default = "default_true")]
    pub supply_curve: bool,
    /// Monthly water balance solutions
    #[serde(default = "default_true")]
    pub lp_solution: bool,
    /// Per-basin capacities, inflection and storage cost
    #[serde(default = "default_true")]
    pub basin_summary: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            capacity_yield: true,
            supply_curve: true,
            lp_solution: true,
            basin_summary: true,
        }
    }
}

/// Check that the `periods` parameter is valid
fn check_periods(periods: &[u32]) -> Result<()> {
    ensure!(!periods.is_empty(), "`periods` is empty");

    ensure!(
        is_sorted_and_unique(periods),
        "`periods` must be composed of unique values in order"
    );

    Ok(())
}

/// Check that a parameter which must be a finite number greater than zero is valid
fn check_positive(name: &str, value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        "{name} must be a finite number greater than zero"
    );

    Ok(())
}

/// Check that a parameter which must be a finite, non-negative number is valid
fn check_non_negative(name: &str, value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        "{name} must be a finite number greater than or equal to zero"
    );

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_periods(&self.periods)?;

        ensure!(self.init_segments > 0, "init_segments cannot be zero");
        ensure!(self.lifetime > 0, "lifetime cannot be zero");
        ensure!(self.max_solver_calls > 0, "max_solver_calls cannot be zero");

        // discount_rate and return_flow_fraction already validated when deserialising
        ensure!(
            self.return_flow_fraction < 1.0,
            "return_flow_fraction must be less than one"
        );

        check_positive("base_price", self.base_price)?;
        check_non_negative("maintenance_fraction", self.maintenance_fraction.value())?;
        check_non_negative("min_storage", self.min_storage)?;

        if let Some(basin_ids) = &self.basin_ids {
            ensure!(!basin_ids.is_empty(), "`basin_ids` is empty");
        }

        Ok(())
    }
}
