//! Evaporative loss from reservoir surfaces.
//!
//! Reservoir surface area follows the power law `V = c * A^b`. Storage is assumed to be built up
//! as a sequence of reservoirs, one per step of the capacity track, so the total area is the sum of
//! the areas of each step.
use crate::basin::BasinPhysicalProfile;

/// Share of inflow returned when the estimated evaporation exceeds the inflow
const EVAPORATION_CAP_FRACTION: f64 = 0.8;

/// Parameters of the volume-area relation and the climate of a basin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaporationParameters {
    /// Exponent `b` of the volume-area relation
    pub volume_area_b: f64,
    /// Coefficient `c` of the volume-area relation
    pub volume_area_c: f64,
    /// Annual depth of open-water evaporation (km)
    pub evaporation_depth: f64,
    /// Mean annual inflow (km³)
    pub inflow: f64,
    /// The reservoir expansion step (km³)
    pub expansion_increment: f64,
}

impl From<&BasinPhysicalProfile> for EvaporationParameters {
    fn from(profile: &BasinPhysicalProfile) -> Self {
        Self {
            volume_area_b: profile.volume_area_b,
            volume_area_c: profile.volume_area_c,
            evaporation_depth: profile.evaporation_depth,
            inflow: profile.inflow,
            expansion_increment: profile.expansion_increment,
        }
    }
}

/// Estimate annual evaporation (km³) for the storage built along `capacity_track`.
///
/// When the track spans more than one expansion step, it is replaced by a regular grid from its
/// first to its last value in steps of the expansion increment. The estimate never exceeds the
/// inflow: if it would, a fixed share of the inflow is returned instead.
pub fn estimate_evaporation(capacity_track: &[f64], params: &EvaporationParameters) -> f64 {
    let (Some(&first), Some(&last)) = (capacity_track.first(), capacity_track.last()) else {
        return 0.0;
    };

    let regridded;
    let track = if last - first > params.expansion_increment {
        regridded = regular_grid(first, last, params.expansion_increment);
        &regridded[..]
    } else {
        capacity_track
    };

    let area: f64 = step_volumes(track)
        .map(|volume| surface_area(volume, params.volume_area_b, params.volume_area_c))
        .sum();
    let evaporation = area * params.evaporation_depth;

    if evaporation > params.inflow {
        EVAPORATION_CAP_FRACTION * params.inflow
    } else {
        evaporation
    }
}

/// The values `first, first + step, ...` below `last`, followed by `last`
fn regular_grid(first: f64, last: f64, step: f64) -> Vec<f64> {
    let count = ((last - first) / step).ceil() as usize;
    (0..count)
        .map(|i| first + step * i as f64)
        .chain(std::iter::once(last))
        .collect()
}

/// Volume added at each step of the track. The first step adds the first value.
fn step_volumes(track: &[f64]) -> impl Iterator<Item = f64> + '_ {
    track
        .first()
        .copied()
        .into_iter()
        .chain(track.windows(2).map(|pair| pair[1] - pair[0]))
}

/// Surface area (km²) of a reservoir with the given volume
fn surface_area(volume: f64, b: f64, c: f64) -> f64 {
    if volume <= 0.0 {
        return 0.0;
    }
    (volume / c).powf(1.0 / b)
}
