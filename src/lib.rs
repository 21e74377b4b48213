//! Deterministic investment growth projections: month-by-month compounding
//! with contribution, withdrawal and rollover schedules, plus an
//! inflation-adjusted companion series.

pub mod api;
pub mod core;
