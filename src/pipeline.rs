//! The admission pipeline: stage contract, executor and builder

pub mod builder;
pub mod executor;
pub mod stage;

pub use builder::{validate_ordering, HandlerOptions, ORDERING_CONSTRAINTS};
pub use executor::{Admission, Pipeline};
pub use stage::{Next, Stage, StageKind};
