//! The module responsible for writing output data to disk.
use crate::basin::{Basin, BasinID};
use crate::model::OutputSettings;
use crate::supply_curve::BasinSupplyCurve;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "reservoir_supply_results";

/// Sub-resource name used for the maximum sub-resource table
const SUBRESOURCE_NAME: &str = "runoff";

/// Get the default output directory for the model specified at `model_dir`
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Canonicalise in case the user has specified "."
    let model_dir = model_dir
        .canonicalize()
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory for the model, optionally overwriting existing data.
///
/// # Returns
///
/// `true` if existing output data was deleted, `false` otherwise
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if output_dir.is_dir() {
        if output_dir.read_dir()?.next().is_none() {
            // Empty folder, so nothing to overwrite
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Use --overwrite to replace it."
        );
        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// A row of the capacity-yield CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CapacityYieldRow {
    basin_id: BasinID,
    basin_name: String,
    capacity: f64,
    #[serde(rename = "yield")]
    annual_yield: f64,
}

/// A row of the water balance solution CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct LpSolutionRow {
    basin_id: BasinID,
    period: u32,
    month: u32,
    storage_capacity: f64,
    inflow: f64,
    evaporation: f64,
    release: f64,
    environmental_flow: f64,
    return_flow: f64,
    spill: f64,
    storage: f64,
}

/// A row of the supply curve CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SupplyCurveRow {
    resource: String,
    grade: String,
    available: f64,
    #[serde(rename = "extractioncost")]
    extraction_cost: f64,
}

/// A row of the maximum sub-resource CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct MaxSubResourceRow {
    region: String,
    resource: String,
    subresource: String,
    year: u32,
    #[serde(rename = "maxSubResource")]
    max_sub_resource: f64,
}

/// A row of the basin summary CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct BasinSummaryRow {
    basin_id: BasinID,
    basin_name: String,
    period: u32,
    current_capacity: f64,
    max_capacity: f64,
    yield_base: f64,
    inflection_capacity: f64,
    inflection_yield: f64,
    max_expansion_capacity: f64,
    max_expansion_yield: f64,
    exceeds_inflection: bool,
    unit_capital_cost: f64,
    max_supply: f64,
}

/// The output file name for a table in a given period
fn file_name(table: &str, period: u32) -> String {
    format!("{table}_{period}.csv")
}

/// Writes the results for every basin in one period
pub struct DataWriter {
    capacity_yield_writer: Option<csv::Writer<File>>,
    lp_solution_writer: Option<csv::Writer<File>>,
    supply_curve_writer: Option<csv::Writer<File>>,
    max_sub_resource_writer: Option<csv::Writer<File>>,
    basin_summary_writer: Option<csv::Writer<File>>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `period` - The period the results are for
    /// * `outputs` - Which files to write
    pub fn create(output_path: &Path, period: u32, outputs: &OutputSettings) -> Result<Self> {
        let new_writer = |enabled: bool, table: &str| -> Result<Option<csv::Writer<File>>> {
            if !enabled {
                return Ok(None);
            }

            let file_path = output_path.join(file_name(table, period));
            let writer = csv::Writer::from_path(&file_path)
                .with_context(|| format!("Could not create {}", file_path.display()))?;
            Ok(Some(writer))
        };

        Ok(Self {
            capacity_yield_writer: new_writer(outputs.capacity_yield, "capacity_yield")?,
            lp_solution_writer: new_writer(outputs.lp_solution, "lp_solution")?,
            supply_curve_writer: new_writer(outputs.supply_curve, "supply_curve")?,
            max_sub_resource_writer: new_writer(outputs.supply_curve, "maxsubresource")?,
            basin_summary_writer: new_writer(outputs.basin_summary, "basin_summary")?,
        })
    }

    /// Write all results for a basin
    pub fn write_basin(&mut self, basin: &Basin, result: &BasinSupplyCurve) -> Result<()> {
        self.write_capacity_yield(basin, result)?;
        self.write_lp_solution(result)?;
        self.write_supply_curve(basin, result)?;
        self.write_max_sub_resource(basin, result)?;
        self.write_basin_summary(basin, result)?;

        Ok(())
    }

    /// Write the capacity-constrained capacity-yield curve
    fn write_capacity_yield(&mut self, basin: &Basin, result: &BasinSupplyCurve) -> Result<()> {
        let Some(writer) = &mut self.capacity_yield_writer else {
            return Ok(());
        };

        for point in result.capacity_yield.constrained.points() {
            writer.serialize(CapacityYieldRow {
                basin_id: basin.id,
                basin_name: basin.name.clone(),
                capacity: point.capacity,
                annual_yield: point.annual_yield,
            })?;
        }

        Ok(())
    }

    /// Write the monthly water balance of every solve
    fn write_lp_solution(&mut self, result: &BasinSupplyCurve) -> Result<()> {
        let Some(writer) = &mut self.lp_solution_writer else {
            return Ok(());
        };

        for solution in result.capacity_yield.solutions.iter() {
            for month in &solution.months {
                writer.serialize(LpSolutionRow {
                    basin_id: result.basin_id,
                    period: result.period,
                    month: month.month,
                    storage_capacity: solution.capacity,
                    inflow: month.inflow,
                    evaporation: month.evaporation,
                    release: month.release,
                    environmental_flow: month.environmental_flow,
                    return_flow: month.return_flow,
                    spill: month.spill,
                    storage: month.storage,
                })?;
            }
        }

        Ok(())
    }

    /// Write the resampled supply curve
    fn write_supply_curve(&mut self, basin: &Basin, result: &BasinSupplyCurve) -> Result<()> {
        let Some(writer) = &mut self.supply_curve_writer else {
            return Ok(());
        };

        let resource = basin.resource_name();
        for grade in result.grades() {
            writer.serialize(SupplyCurveRow {
                resource: resource.clone(),
                grade: grade.grade,
                available: grade.available,
                extraction_cost: grade.extraction_cost,
            })?;
        }

        Ok(())
    }

    /// Write the maximum supply of the basin
    fn write_max_sub_resource(&mut self, basin: &Basin, result: &BasinSupplyCurve) -> Result<()> {
        let Some(writer) = &mut self.max_sub_resource_writer else {
            return Ok(());
        };

        writer.serialize(MaxSubResourceRow {
            region: basin.region.clone(),
            resource: basin.resource_name(),
            subresource: SUBRESOURCE_NAME.to_string(),
            year: result.period,
            max_sub_resource: result.max_supply,
        })?;

        Ok(())
    }

    /// Write the capacities, inflection point and storage cost of the basin
    fn write_basin_summary(&mut self, basin: &Basin, result: &BasinSupplyCurve) -> Result<()> {
        let Some(writer) = &mut self.basin_summary_writer else {
            return Ok(());
        };

        let capacity_yield = &result.capacity_yield;
        writer.serialize(BasinSummaryRow {
            basin_id: basin.id,
            basin_name: basin.name.clone(),
            period: result.period,
            current_capacity: result.current_capacity,
            max_capacity: result.max_capacity,
            yield_base: capacity_yield.yield_base,
            inflection_capacity: capacity_yield.inflection.capacity,
            inflection_yield: capacity_yield.inflection.annual_yield,
            max_expansion_capacity: capacity_yield.max_expansion.capacity,
            max_expansion_yield: capacity_yield.max_expansion.annual_yield,
            exceeds_inflection: capacity_yield.max_expansion.exceeds_inflection,
            unit_capital_cost: result.unit_capital_cost,
            max_supply: result.max_supply,
        })?;

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        for writer in [
            &mut self.capacity_yield_writer,
            &mut self.lp_solution_writer,
            &mut self.supply_curve_writer,
            &mut self.max_sub_resource_writer,
            &mut self.basin_summary_writer,
        ]
        .into_iter()
        .flatten()
        {
            writer.flush()?;
        }

        Ok(())
    }
}
