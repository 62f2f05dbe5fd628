pub mod dashboard;
pub mod icons;
pub mod panels;

pub use dashboard::{DashboardUI, UiMode};
