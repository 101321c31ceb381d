//! User-facing output

pub mod output;

pub use output::{print_to_user, WaitIndicator};
