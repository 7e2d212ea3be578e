pub mod contract;
pub mod portfolio;
pub mod report;
