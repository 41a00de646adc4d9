//! The simulated things themselves.

mod lamp;
mod sensor;

pub use lamp::lamp;
pub use sensor::{reading, sensor};
