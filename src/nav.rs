use std::collections::HashMap;

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

use crate::{
    constants::{MAS2R, MTS2R},
    prelude::{Epoch, SV},
};

/// Published Earth orientation parameters at one instant.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct EopValues {
    /// Pole X coordinate (rad)
    pub xp_rad: f64,
    /// Pole Y coordinate (rad)
    pub yp_rad: f64,
    /// UT1 - UTC (s)
    pub ut1_s: f64,
}

impl EopValues {
    pub fn new(xp_rad: f64, yp_rad: f64, ut1_s: f64) -> Self {
        Self {
            xp_rad,
            yp_rad,
            ut1_s,
        }
    }

    /// (xp, yp, ut1) in natural units, axis indexed.
    pub fn vals(&self) -> [f64; 3] {
        [self.xp_rad, self.yp_rad, self.ut1_s]
    }
}

/// [EopSource] provides published Earth orientation parameters at any
/// instant. The estimator samples it at t and t+1s: the filter then
/// estimates a correction to the published values, not the absolute
/// parameters.
pub trait EopSource {
    fn eop_at(&self, t: Epoch) -> EopValues;
}

/// Time tagged [EopValues] table, linearly interpolated and clamped at
/// both ends.
#[derive(Debug, Default, Clone)]
pub struct EopTable {
    entries: Vec<(Epoch, EopValues)>,
}

impl EopTable {
    /// Builds a new [EopTable]; entries are sorted by [Epoch].
    pub fn new(mut entries: Vec<(Epoch, EopValues)>) -> Self {
        entries.sort_by_key(|(t, _)| *t);
        Self { entries }
    }
}

impl EopSource for EopTable {
    fn eop_at(&self, t: Epoch) -> EopValues {
        let (first, last) = match (self.entries.first(), self.entries.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return EopValues::default(),
        };

        if t <= first.0 {
            return first.1;
        }
        if t >= last.0 {
            return last.1;
        }

        for window in self.entries.windows(2) {
            let (t0, v0) = window[0];
            let (t1, v1) = window[1];
            if t >= t0 && t <= t1 {
                let span = (t1 - t0).to_seconds();
                if span <= 0.0 {
                    return v0;
                }
                let alpha = (t - t0).to_seconds() / span;
                return EopValues::new(
                    v0.xp_rad + alpha * (v1.xp_rad - v0.xp_rad),
                    v0.yp_rad + alpha * (v1.yp_rad - v0.yp_rad),
                    v0.ut1_s + alpha * (v1.ut1_s - v0.ut1_s),
                );
            }
        }

        last.1
    }
}

/// Orbit correction unknowns of one satellite: named parameters and
/// their partial derivative rows with respect to station displacement.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitPartials {
    /// Unknown names, one per estimated coefficient
    pub parameters: Vec<String>,
    /// Partials matrix (unknowns × 3), projected onto the line of
    /// sight to form design coefficients
    pub partials: DMatrix<f64>,
}

impl OrbitPartials {
    /// Projects the partials onto this line of sight unit vector,
    /// one design coefficient per unknown.
    pub(crate) fn project(&self, line_of_sight: &Vector3<f64>) -> DVector<f64> {
        &self.partials * line_of_sight
    }
}

/// Navigation data consumed by the estimator: orbit partials per
/// satellite and an [EopSource].
#[derive(Debug, Clone)]
pub struct NavigationData<E: EopSource> {
    /// [OrbitPartials] per satellite with estimated orbit corrections
    pub orbit_partials: HashMap<SV, OrbitPartials>,
    /// [EopSource] lookup
    pub eop: E,
}

impl<E: EopSource> NavigationData<E> {
    pub fn new(orbit_partials: HashMap<SV, OrbitPartials>, eop: E) -> Self {
        Self {
            orbit_partials,
            eop,
        }
    }
}

/// Analytic partials of station frame displacement with respect to
/// polar motion (mas) and UT1 (ms): rows are (xp, yp, ut1), columns the
/// station ECEF axes. Projected onto the line of sight to form EOP
/// design coefficients.
pub(crate) fn station_eop_partials(position_ecef_m: &Vector3<f64>) -> Matrix3<f64> {
    let (x, y, z) = (position_ecef_m[0], position_ecef_m[1], position_ecef_m[2]);

    Matrix3::new(
        z * MAS2R, 0.0, -x * MAS2R, // dr/dxp (rotation about Y)
        0.0, -z * MAS2R, y * MAS2R, // dr/dyp (rotation about X)
        y * MTS2R, -x * MTS2R, 0.0, // dr/dut1 (rotation about Z)
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use hifitime::Epoch;

    #[test]
    fn eop_table_interpolation() {
        let t0 = Epoch::from_gpst_seconds(0.0);
        let t1 = Epoch::from_gpst_seconds(86400.0);

        let table = EopTable::new(vec![
            (t1, EopValues::new(2.0E-7, 2.0E-6, 0.2)),
            (t0, EopValues::new(1.0E-7, 1.0E-6, 0.1)),
        ]);

        // clamped below and above
        assert_eq!(
            table.eop_at(Epoch::from_gpst_seconds(-100.0)),
            EopValues::new(1.0E-7, 1.0E-6, 0.1)
        );
        assert_eq!(
            table.eop_at(Epoch::from_gpst_seconds(1.0E6)),
            EopValues::new(2.0E-7, 2.0E-6, 0.2)
        );

        let mid = table.eop_at(Epoch::from_gpst_seconds(43200.0));
        assert!((mid.xp_rad - 1.5E-7).abs() < 1.0E-15);
        assert!((mid.yp_rad - 1.5E-6).abs() < 1.0E-15);
        assert!((mid.ut1_s - 0.15).abs() < 1.0E-12);
    }

    #[test]
    fn station_partials_structure() {
        let position = Vector3::new(1.0E6, 2.0E6, 3.0E6);
        let partials = station_eop_partials(&position);

        assert_eq!(partials[(0, 0)], 3.0E6 * MAS2R);
        assert_eq!(partials[(0, 1)], 0.0);
        assert_eq!(partials[(0, 2)], -1.0E6 * MAS2R);

        assert_eq!(partials[(1, 0)], 0.0);
        assert_eq!(partials[(1, 1)], -3.0E6 * MAS2R);
        assert_eq!(partials[(1, 2)], 2.0E6 * MAS2R);

        assert_eq!(partials[(2, 0)], 2.0E6 * MTS2R);
        assert_eq!(partials[(2, 1)], -1.0E6 * MTS2R);
        assert_eq!(partials[(2, 2)], 0.0);
    }
}
