pub mod chart;
pub mod controller;
pub mod error;
pub mod fetch;
pub mod indicators;
pub mod normalize;
pub mod table;

pub use crate::chart::{Chart, ChartKind, ChartSpec, Presentation, Series};
pub use crate::controller::{
    build_dashboard, render_cycle, CycleReport, Dashboard, DashboardInput, RenderOptions,
};
pub use crate::error::{DashError, FetchError};
pub use crate::fetch::{CachedFetcher, Fetcher};
pub use crate::indicators::add_moving_average;
pub use crate::normalize::normalize;
pub use crate::table::{ColumnKey, Field, FlatRow, FlatTable, RawTable};
