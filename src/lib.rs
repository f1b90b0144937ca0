pub mod adapter;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod fixture;
pub mod models;
pub mod report;
pub mod source;
pub mod stats;

pub use dashboard::{Dashboard, DashboardView, Page, Section};
pub use error::{DashboardError, ErrorKind};
pub use source::{DataSource, NoRanking, RankingService};
