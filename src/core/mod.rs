mod engine;
mod report;
mod tracks;
mod types;

pub use engine::{
    GrowthProjector, depreciation, format_currency, parse_principal, pct_change, project,
};
pub use report::{
    DateAmountRow, ScheduleSummary, date_amount_rows, depleted_on, format_compact,
    schedule_summary,
};
pub use tracks::{Comparison, TrackBook, compare_tracks, rollover_from};
pub use types::{GrowthPoint, Projection, ProjectionParameters, Rollover, ValueBasis};
