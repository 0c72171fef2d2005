use log::{debug, info};
use nalgebra::{DMatrix, DVector};

use crate::{
    error::Error,
    measurement::CombinedMeasurements,
    state::StateRegistry,
};

/// One-off ordinary least squares fit seeding the slots created since
/// the last bootstrap, before they enter the recursive filter. Runs
/// exactly once per occurrence of the pending flag, never every epoch.
/// Slots never referenced by the design matrix (rate companions) keep
/// their configured initial value.
pub(crate) fn bootstrap(
    registry: &mut StateRegistry,
    meas: &CombinedMeasurements,
) -> Result<(), Error> {
    let fresh = registry.fresh_indexes();

    // only slots the stacked system actually observes can be seeded
    let observed: Vec<usize> = fresh
        .iter()
        .copied()
        .filter(|&column| (0..meas.len()).any(|row| meas.h[(row, column)] != 0.0))
        .collect();

    if observed.is_empty() {
        registry.clear_fresh();
        return Ok(());
    }

    info!(
        "{} initializing {} network states using least squares",
        meas.epoch,
        observed.len(),
    );

    // rows referencing at least one pending slot
    let rows: Vec<usize> = (0..meas.len())
        .filter(|&row| observed.iter().any(|&column| meas.h[(row, column)] != 0.0))
        .collect();

    let x = registry.vector().clone();

    let mut design = DMatrix::<f64>::zeros(rows.len(), observed.len());
    let mut residual = DVector::<f64>::zeros(rows.len());
    let mut weights = DVector::<f64>::zeros(rows.len());

    for (i, &row) in rows.iter().enumerate() {
        let mut value = meas.y[row];

        // subtract what the already live slots explain
        for column in 0..meas.h.ncols() {
            if !observed.contains(&column) {
                value -= meas.h[(row, column)] * x[column];
            }
        }

        for (j, &column) in observed.iter().enumerate() {
            design[(i, j)] = meas.h[(row, column)];
        }

        residual[i] = value;
        weights[i] = if meas.r[row] > 0.0 { 1.0 / meas.r[row] } else { 1.0 };
    }

    let w = DMatrix::from_diagonal(&weights);
    let dt = design.transpose();

    let normal = &dt * &w * &design;
    let normal_inv = normal.try_inverse().ok_or(Error::SingularBootstrap)?;

    let solution = &normal_inv * &dt * w * residual;

    for (j, &column) in observed.iter().enumerate() {
        let variance = normal_inv[(j, j)];
        debug!(
            "bootstrap slot #{}: x={:.3e} p={:.3e}",
            column, solution[j], variance,
        );
        registry.set_slot(column, solution[j], variance);
    }

    registry.clear_fresh();
    Ok(())
}
