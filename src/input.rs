//! Common routines for handling input data.
use crate::basin::{BasinID, BasinMap};
use crate::model::{Model, ModelParameters};
use anyhow::{Context, Result, ensure};
use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use std::fs;
use std::path::Path;

mod basin;
use basin::read_basins;
mod climate;
pub use climate::{Climate, ClimateMap};
use climate::read_climate;
mod demand;
pub use demand::{SectorDemandMap, SectorProfileMap};
use demand::{read_demand_profiles, read_sectoral_demand, read_solved_demand};
mod profile;
pub use profile::{HydrologicalProfileMap, HydrologicalProfiles};
use profile::read_hydrological_profiles;
mod reservoir;
pub use reservoir::{Reservoir, ReservoirMap, SolvedCapacityMap};
use reservoir::{read_reservoirs, read_solved_capacity};

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<T: DeserializeOwned>(
    file_path: &Path,
) -> Result<impl Iterator<Item = T> + use<T>> {
    let vec = read_csv_vec(file_path)?;
    ensure!(!vec.is_empty(), "CSV file {} cannot be empty", file_path.display());

    Ok(vec.into_iter())
}

/// Read a series of type `T`s from a CSV file which may be missing or empty.
///
/// A missing file gives an empty iterator.
pub fn read_csv_optional<T: DeserializeOwned>(
    file_path: &Path,
) -> Result<impl Iterator<Item = T> + use<T>> {
    let vec = if file_path.exists() {
        read_csv_vec(file_path)?
    } else {
        Vec::new()
    };

    Ok(vec.into_iter())
}

/// Deserialise every record of a CSV file
fn read_csv_vec<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(file_path).with_context(|| input_err_msg(file_path))?;

    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .with_context(|| input_err_msg(file_path))
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Read a number, checking that it is between 0 and 1
pub fn deserialise_proportion<'de, D, T>(deserialiser: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Into<f64> + Copy,
{
    let value: T = Deserialize::deserialize(deserialiser)?;
    let raw: f64 = value.into();
    if !(0.0..=1.0).contains(&raw) {
        Err(serde::de::Error::custom("Value must be between 0 and 1"))?;
    }

    Ok(value)
}

/// Read a number, checking that it is between 0 and 1 and not zero
pub fn deserialise_proportion_nonzero<'de, D, T>(deserialiser: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Into<f64> + Copy,
{
    let value: T = Deserialize::deserialize(deserialiser)?;
    let raw: f64 = value.into();
    if !(raw > 0.0 && raw <= 1.0) {
        Err(serde::de::Error::custom("Value must be > 0 and <= 1"))?;
    }

    Ok(value)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Check whether an iterator contains values that are sorted and unique
pub fn is_sorted_and_unique<T, I>(iter: I) -> bool
where
    T: PartialOrd + Clone,
    I: IntoIterator<Item = T>,
{
    let mut iter = iter.into_iter();
    let Some(mut previous) = iter.next() else {
        return true;
    };
    for current in iter {
        if current <= previous {
            return false;
        }
        previous = current;
    }

    true
}

/// Check that a value is finite and non-negative
fn check_non_negative(name: &str, value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        "{name} must be a finite number greater than or equal to zero (value: {value})"
    );

    Ok(())
}

/// Check that a basin ID appears in the basin list
fn check_basin_exists(basins: &BasinMap, basin_id: BasinID) -> Result<()> {
    ensure!(basins.contains_key(&basin_id), "Unknown basin ID {basin_id}");

    Ok(())
}

/// Read a model from the specified directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The loaded [`Model`] or an error if any input file is missing or invalid.
pub fn load_model<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
    let model_dir = model_dir.as_ref();
    let parameters = ModelParameters::from_path(model_dir)?;
    let basins = read_basins(model_dir)?;
    let climate = read_climate(model_dir, &basins)?;
    let hydrological_profiles = read_hydrological_profiles(model_dir, &basins)?;
    let demand_profiles = read_demand_profiles(model_dir, &basins)?;
    let sectoral_demand = read_sectoral_demand(model_dir, &basins)?;
    let solved_demand = read_solved_demand(model_dir, &basins)?;
    let reservoirs = read_reservoirs(model_dir, &basins)?;
    let solved_capacity = read_solved_capacity(model_dir, &basins)?;

    let model = Model {
        model_path: model_dir.to_path_buf(),
        parameters,
        basins,
        climate,
        hydrological_profiles,
        demand_profiles,
        sectoral_demand,
        solved_demand,
        reservoirs,
        solved_capacity,
    };
    model.check_coverage()?;

    Ok(model)
}
