pub mod color_selector;
pub mod grading;
pub mod pixel;
pub mod sample;
pub mod smoother;
