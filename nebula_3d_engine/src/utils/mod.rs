//! Small helpers shared by the frame pipeline

mod align;

pub use align::{align_up, is_power_of_two};
