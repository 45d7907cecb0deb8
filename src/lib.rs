pub mod chart;
pub mod config;
pub mod export;
pub mod fetch;
pub mod refresh;
pub mod report;
pub mod response;
