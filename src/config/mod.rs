pub mod options;
pub use options::{JacobiScaling, SaOptions, SmootherKind};
