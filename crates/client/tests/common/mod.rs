pub mod fixtures;
pub mod servers;
