//! Utility functions and types

mod frame;
mod parallel;
mod timer;

pub use frame::{column_names, columns_to_array2, is_numeric_dtype, require_columns, take_rows};
pub use parallel::ParallelConfig;
pub use timer::StageTimer;
