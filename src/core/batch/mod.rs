pub mod batch_builder;

pub use batch_builder::{BatchBuilder, BatchError, CellGrid, CellUpdate};
