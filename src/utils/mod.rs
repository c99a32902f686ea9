pub mod partition;
pub mod ritz;

pub use partition::gen_partition;
pub use ritz::extreme_ritz_values;
