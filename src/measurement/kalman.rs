use log::debug;
use nalgebra::DMatrix;

use crate::{
    error::Error,
    measurement::CombinedMeasurements,
    state::StateRegistry,
};

/// Kalman measurement update over the consolidated system, prediction
/// already applied by the registry. Joseph form keeps the posterior
/// covariance symmetric positive. Fails without touching the registry
/// if the innovation covariance is singular to working precision.
pub(crate) fn filter_update(
    registry: &mut StateRegistry,
    meas: &CombinedMeasurements,
) -> Result<(), Error> {
    if meas.is_empty() {
        return Ok(());
    }

    if meas.h.ncols() != registry.len() {
        return Err(Error::MatrixDimension);
    }

    let x = registry.vector();
    let p = registry.covariance();

    let h = &meas.h;
    let ht = h.transpose();
    let r = DMatrix::from_diagonal(&meas.r);

    // innovation
    let v = &meas.y - h * x;

    let s = h * p * &ht + &r;
    let s_inv = s.try_inverse().ok_or(Error::SingularInnovation)?;

    let gain = p * &ht * s_inv;

    let x_post = x + &gain * &v;

    let identity = DMatrix::<f64>::identity(registry.len(), registry.len());
    let i_kh = identity - &gain * h;
    let p_post = &i_kh * p * i_kh.transpose() + &gain * r * gain.transpose();

    debug!(
        "{} filter update: {} measurements over {} states",
        meas.epoch,
        meas.len(),
        registry.len(),
    );

    registry.set_estimate(x_post, p_post);
    Ok(())
}
