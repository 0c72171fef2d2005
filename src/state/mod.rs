mod initial;
mod key;
mod registry;

pub use initial::{InitialState, ProcessNoise};
pub use key::{StateKey, StateType};
pub use registry::StateRegistry;
