use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// No receiver matched the pivot setup this epoch: the network clock
    /// datum cannot be anchored and the epoch is skipped. The filter is
    /// left untouched, we simply retry on the next epoch.
    #[error("no reference receiver found in network")]
    NoReferenceReceiver,

    /// The innovation covariance could not be inverted: bad signal data
    /// or a degenerate geometry. The update is skipped for this epoch.
    #[error("singular innovation covariance")]
    SingularInnovation,

    /// The one-off least squares fit seeding brand new states could not
    /// be solved: not enough measurements reference them yet.
    #[error("singular normal matrix in least squares initialization")]
    SingularBootstrap,

    /// Measurement and filter dimensions disagree (internal error).
    #[error("internal error: inconsistent matrix dimensions")]
    MatrixDimension,
}
