//! Discretising a capacity-yield curve into a ladder of reservoir expansion steps.
use super::capacity_yield::CapacityYieldCurve;

/// Share of the inflection capacity beyond which expansion is treated as costlier
const SEPARATION_FRACTION: f64 = 0.8;

/// Storage capacity steps and the yield each step gains.
///
/// Steps up to the separation point are priced at the base reservoir cost. Steps beyond it start
/// at the last step before it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionSequence {
    /// Capacity of one expansion step (km³)
    pub unit: f64,
    /// Capacities up to and including the separation point (km³)
    pub pre_separation: Vec<f64>,
    /// Capacities beyond the separation point, preceded by the last pre-separation capacity (km³)
    pub post_separation: Vec<f64>,
    /// Yield gained by each pre-separation step (km³)
    pub pre_gains: Vec<f64>,
    /// Yield gained by each post-separation step (km³)
    pub post_gains: Vec<f64>,
    /// Whether maximum capacity lies beyond the inflection point
    pub exceeds_inflection: bool,
}

impl ExpansionSequence {
    /// Every capacity in the sequence, in ascending order
    pub fn ladder(&self) -> impl Iterator<Item = f64> + '_ {
        self.pre_separation
            .iter()
            .chain(self.post_separation.iter().skip(1))
            .copied()
    }
}

/// Capacities from zero to the first capacity of maximum yield, in steps of `unit`.
///
/// The capacity of maximum yield is appended if it lies more than half a step beyond the last rung.
pub fn capacity_ladder(curve: &CapacityYieldCurve, unit: f64) -> Vec<f64> {
    let cap_inflection = curve.first_max_yield_capacity();
    let count = (cap_inflection / unit).ceil() as usize;
    let mut ladder: Vec<f64> = (0..count).map(|i| i as f64 * unit).collect();

    match ladder.last() {
        Some(&last) if (cap_inflection - last) / unit > 0.5 => ladder.push(cap_inflection),
        Some(_) => {}
        None => ladder.push(0.0),
    }

    ladder
}

/// Yield gained by each consecutive pair of capacities
fn yield_gains(curve: &CapacityYieldCurve, capacities: &[f64]) -> Vec<f64> {
    capacities
        .windows(2)
        .map(|pair| curve.interpolate(pair[1]) - curve.interpolate(pair[0]))
        .collect()
}

/// Split the capacity ladder at the separation point and calculate yield gains.
///
/// # Arguments
///
/// * `curve` - The capacity-constrained capacity-yield curve
/// * `inflection_capacity` - Capacity at the inflection point
/// * `max_capacity` - Maximum expandable capacity
/// * `unit` - Capacity of one expansion step
pub fn sequence_expansion(
    curve: &CapacityYieldCurve,
    inflection_capacity: f64,
    max_capacity: f64,
    unit: f64,
) -> ExpansionSequence {
    let exceeds_inflection = inflection_capacity < max_capacity;
    let separation = if exceeds_inflection {
        SEPARATION_FRACTION * inflection_capacity
    } else {
        max_capacity
    };

    let ladder = capacity_ladder(curve, unit);
    let (pre_separation, after): (Vec<f64>, Vec<f64>) =
        ladder.into_iter().partition(|&capacity| capacity <= separation);

    let post_separation = match (pre_separation.last(), after.is_empty()) {
        (Some(&last), false) => std::iter::once(last).chain(after).collect(),
        _ => Vec::new(),
    };

    ExpansionSequence {
        unit,
        pre_gains: yield_gains(curve, &pre_separation),
        post_gains: yield_gains(curve, &post_separation),
        pre_separation,
        post_separation,
        exceeds_inflection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basin::BasinPhysicalProfile;
    use crate::fixture::{StubSolver, basin_profile, model_parameters, saturating_yield};
    use crate::model::ModelParameters;
    use crate::supply_curve::capacity_yield::{CapacityYieldBuilder, CapacityYieldPoint};
    use float_cmp::assert_approx_eq;
    use rstest::{fixture, rstest};

    /// Yield rises from 2 to 9.5 at a capacity of 3.75, then is flat up to a capacity of 12
    #[fixture]
    fn curve(
        basin_profile: BasinPhysicalProfile,
        model_parameters: ModelParameters,
    ) -> CapacityYieldCurve {
        let solver = StubSolver::new(saturating_yield(2.0, 2.0, 9.5));
        CapacityYieldBuilder::new(&basin_profile, &model_parameters, &solver)
            .build()
            .unwrap()
            .constrained
    }

    #[rstest]
    fn test_capacity_ladder(curve: CapacityYieldCurve) {
        // First capacity of maximum yield is 3.84, which is more than half a step beyond 3.5
        let ladder = capacity_ladder(&curve, 0.5);
        assert_eq!(ladder.len(), 9);
        assert_approx_eq!(f64, ladder[0], 0.0);
        assert_approx_eq!(f64, ladder[7], 3.5);
        assert_approx_eq!(f64, ladder[8], 3.84, epsilon = 1e-9);

        // Less than half a step beyond 3.6
        let ladder = capacity_ladder(&curve, 1.2);
        assert_eq!(ladder.len(), 4);
        assert_approx_eq!(f64, ladder[3], 3.6, epsilon = 1e-9);
    }

    #[rstest]
    fn test_sequence_expansion(curve: CapacityYieldCurve) {
        let sequence = sequence_expansion(&curve, 3.84, 12.0, 0.5);
        assert!(sequence.exceeds_inflection);

        // Separation at 0.8 * 3.84 = 3.072
        assert_eq!(sequence.pre_separation, [0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0]);
        assert_eq!(sequence.post_separation.len(), 3);
        assert_approx_eq!(f64, sequence.post_separation[0], 3.0);
        assert_approx_eq!(f64, sequence.post_separation[1], 3.5);
        assert_eq!(sequence.pre_gains.len(), 6);
        assert_eq!(sequence.post_gains.len(), 2);
        for gain in &sequence.pre_gains {
            assert_approx_eq!(f64, *gain, 1.0, epsilon = 1e-9);
        }
        assert_eq!(sequence.ladder().count(), 9);
    }

    #[rstest]
    fn test_sequence_expansion_inflection_beyond_max(curve: CapacityYieldCurve) {
        let sequence = sequence_expansion(&curve, 12.0, 12.0, 0.5);
        assert!(!sequence.exceeds_inflection);
        assert_eq!(sequence.pre_separation.len(), 9);
        assert!(sequence.post_separation.is_empty());
        assert!(sequence.post_gains.is_empty());
    }

    #[test]
    fn test_sequence_expansion_flat_curve() {
        let curve = CapacityYieldCurve::from_points(&[CapacityYieldPoint::new(0.0, 3.0)]);
        let sequence = sequence_expansion(&curve, 0.0, 0.0, 0.5);
        assert_eq!(sequence.pre_separation, [0.0]);
        assert!(sequence.pre_gains.is_empty());
        assert!(sequence.post_separation.is_empty());
    }
}
