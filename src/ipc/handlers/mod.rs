pub mod analysis;
pub mod core;
pub mod dashboard;
pub mod exports;
pub mod reports;
pub mod review;
pub mod roster;
pub mod scores;
pub mod upload;
