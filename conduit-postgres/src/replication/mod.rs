pub mod mechanism;
pub mod pgoutput;

pub use mechanism::PostgresLogicalMechanism;
