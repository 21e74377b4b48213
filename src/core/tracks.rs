use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::engine::project;
use super::types::{GrowthPoint, Projection, ProjectionParameters, Rollover, ValueBasis};

/// Last computed projection per track id. Recording a track replaces
/// whatever was stored for it before.
#[derive(Debug, Default, Clone)]
pub struct TrackBook {
    projections: HashMap<String, Projection>,
}

impl TrackBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, projection: Projection) -> &Projection {
        let track_id = projection.track_id.clone();
        self.projections.insert(track_id.clone(), projection);
        &self.projections[&track_id]
    }

    pub fn projection(&self, track_id: &str) -> Option<&Projection> {
        self.projections.get(track_id)
    }

    pub fn series(&self, track_id: &str) -> Option<&[GrowthPoint]> {
        self.projection(track_id).map(|p| p.points.as_slice())
    }

    pub fn len(&self) -> usize {
        self.projections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projections.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub a: Projection,
    pub b: Projection,
    /// Rollover terms B was actually projected with.
    #[serde(skip)]
    pub b_rollover: Rollover,
    pub rolled_amount: Option<f64>,
    pub rollover_year: Option<u32>,
}

/// Rollover terms that move a finished track's last value into another
/// track at `trigger_year`. An empty source rolls nothing.
pub fn rollover_from(source: &Projection, trigger_year: Option<u32>) -> Rollover {
    Rollover {
        enabled: true,
        amount: source.final_point().map_or(0.0, |p| p.primary_value),
        trigger_year,
    }
}

/// Projects track A, then track B. With `roll_a_into_b`, B's rollover terms
/// are replaced by A's final displayed value at the year A's horizon ends.
/// `rolled_amount` and `rollover_year` are only set when that rollover lands
/// inside B's series.
pub fn compare_tracks(
    a: &ProjectionParameters,
    b: &ProjectionParameters,
    roll_a_into_b: bool,
    reference_date: NaiveDate,
    display: ValueBasis,
) -> Comparison {
    let projection_a = project(a, reference_date, display);

    let mut b_params = b.clone();
    if roll_a_into_b {
        b_params.rollover = rollover_from(&projection_a, a.horizon_years);
    }
    let projection_b = project(&b_params, reference_date, display);

    let landed_year = b_params
        .rollover
        .trigger_year
        .filter(|year| projection_b.points.iter().any(|p| p.year == *year))
        .filter(|_| roll_a_into_b && b_params.rollover_armed());

    Comparison {
        rolled_amount: landed_year.map(|_| b_params.rollover.amount),
        rollover_year: landed_year,
        b_rollover: b_params.rollover,
        a: projection_a,
        b: projection_b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 1).expect("valid date")
    }

    fn track(id: &str) -> ProjectionParameters {
        ProjectionParameters {
            track_id: id.to_string(),
            principal: Some(10_000.0),
            annual_growth_rate_percent: Some(10.0),
            horizon_years: Some(10),
            advanced_mode: true,
            ..ProjectionParameters::default()
        }
    }

    #[test]
    fn book_keeps_latest_projection_per_track() {
        let mut book = TrackBook::new();
        let mut params = track("A");
        book.record(project(&params, reference(), ValueBasis::Nominal));
        params.horizon_years = Some(3);
        book.record(project(&params, reference(), ValueBasis::Nominal));

        assert_eq!(book.len(), 1);
        assert_eq!(book.series("A").map(<[GrowthPoint]>::len), Some(4));
        assert!(book.series("B").is_none());
    }

    #[test]
    fn rolling_a_into_b_adds_a_final_value_at_a_horizon() {
        let a = track("A");
        let b = track("B");

        let rolled = compare_tracks(&a, &b, true, reference(), ValueBasis::Nominal);
        let plain = compare_tracks(&a, &b, false, reference(), ValueBasis::Nominal);

        let a_final = rolled.a.final_point().expect("points").primary_value;
        assert_eq!(rolled.rolled_amount, Some(a_final));
        assert_eq!(rolled.rollover_year, Some(10));
        assert_eq!(
            rolled.b_rollover,
            Rollover {
                enabled: true,
                amount: a_final,
                trigger_year: Some(10),
            }
        );
        assert_eq!(plain.rolled_amount, None);
        assert_eq!(plain.rollover_year, None);
        assert_eq!(plain.b_rollover, b.rollover);

        let jump = rolled.b.points[10].primary_value - plain.b.points[10].primary_value;
        assert!((jump - a_final).abs() <= 1e-6, "jump {jump}, a {a_final}");
        for year in 0..10 {
            assert_eq!(rolled.b.points[year], plain.b.points[year]);
        }
    }

    #[test]
    fn rollover_past_b_horizon_is_not_reported() {
        let mut a = track("A");
        a.horizon_years = Some(20);
        let b = track("B");

        let comparison = compare_tracks(&a, &b, true, reference(), ValueBasis::Nominal);
        let plain = compare_tracks(&a, &b, false, reference(), ValueBasis::Nominal);

        assert_eq!(comparison.rolled_amount, None);
        assert_eq!(comparison.rollover_year, None);
        assert_eq!(comparison.b.points, plain.b.points);
    }

    #[test]
    fn rollover_into_basic_mode_track_is_not_reported() {
        let a = track("A");
        let mut b = track("B");
        b.advanced_mode = false;

        let comparison = compare_tracks(&a, &b, true, reference(), ValueBasis::Nominal);
        let plain = compare_tracks(&a, &b, false, reference(), ValueBasis::Nominal);

        assert_eq!(comparison.rolled_amount, None);
        assert_eq!(comparison.b.points, plain.b.points);
    }

    #[test]
    fn empty_source_track_rolls_nothing() {
        let mut a = track("A");
        a.principal = None;
        let b = track("B");

        let comparison = compare_tracks(&a, &b, true, reference(), ValueBasis::Nominal);
        assert!(comparison.a.is_empty());
        assert_eq!(comparison.rolled_amount, None);
        assert_eq!(comparison.b.points.len(), 11);
    }
}
