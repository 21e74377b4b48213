use chrono::NaiveDate;
use serde::Serialize;

use super::engine::{pct_change, year_offset};
use super::types::{Projection, ProjectionParameters};

/// One row of the per-period table shown beside the chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateAmountRow {
    pub track_id: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub inflation_adjusted_amount: f64,
    pub amount_change_pct: f64,
    pub inflation_adjusted_change_pct: f64,
    pub rollover_amount: Option<f64>,
}

/// Dates and rates a reader needs to interpret a track's chart. Fields are
/// absent when the matching rule is not configured.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSummary {
    pub withdrawal_start: Option<NaiveDate>,
    pub contributions_end: Option<NaiveDate>,
    pub rollover_date: Option<NaiveDate>,
    pub rollover_amount: Option<f64>,
    pub inflation_rate_percent: Option<f64>,
}

/// Builds table rows. Percent changes are measured against the first point's
/// primary value.
pub fn date_amount_rows(
    projection: &Projection,
    params: &ProjectionParameters,
    reference_date: NaiveDate,
) -> Vec<DateAmountRow> {
    let Some(first) = projection.points.first() else {
        return Vec::new();
    };
    let baseline = first.primary_value;
    let rollover = &params.rollover;
    let rollover_date = rollover
        .trigger_year
        .filter(|_| params.rollover_armed())
        .map(|year| year_offset(reference_date, year));

    projection
        .points
        .iter()
        .map(|point| {
            let amount = point.nominal(projection.display);
            let inflation_adjusted_amount = point.inflation_adjusted(projection.display);
            DateAmountRow {
                track_id: projection.track_id.clone(),
                date: point.date,
                amount,
                inflation_adjusted_amount,
                amount_change_pct: pct_change(baseline, amount),
                inflation_adjusted_change_pct: pct_change(baseline, inflation_adjusted_amount),
                rollover_amount: (rollover_date == Some(point.date)).then_some(rollover.amount),
            }
        })
        .collect()
}

pub fn schedule_summary(
    params: &ProjectionParameters,
    reference_date: NaiveDate,
) -> ScheduleSummary {
    let advanced = params.advanced_mode;
    let rollover = &params.rollover;
    let rolls = params.rollover_armed();

    ScheduleSummary {
        withdrawal_start: params
            .withdrawal_start_year
            .filter(|_| advanced && params.monthly_withdrawal != 0.0)
            .map(|year| year_offset(reference_date, year)),
        contributions_end: params
            .contribution_stop_year
            .filter(|_| advanced && params.monthly_contribution != 0.0)
            .map(|year| year_offset(reference_date, year)),
        rollover_date: rollover
            .trigger_year
            .filter(|_| rolls)
            .map(|year| year_offset(reference_date, year)),
        rollover_amount: rolls.then_some(rollover.amount),
        inflation_rate_percent: params.depreciation_rate_percent,
    }
}

/// Date of the first point whose displayed value has run out.
pub fn depleted_on(projection: &Projection) -> Option<NaiveDate> {
    projection
        .points
        .iter()
        .find(|point| point.primary_value <= 0.0)
        .map(|point| point.date)
}

/// Short axis label: `$1.2B`, `$3.4M`, `$5.6K`, or `$12.34` below a thousand.
pub fn format_compact(value: f64) -> String {
    let magnitude = value.abs();
    let scaled = |divisor: f64, suffix: &str| {
        let text = format!("{:.1}", value / divisor);
        let text = text.strip_suffix(".0").unwrap_or(&text);
        format!("${text}{suffix}")
    };

    if magnitude >= 1e9 {
        scaled(1e9, "B")
    } else if magnitude >= 1e6 {
        scaled(1e6, "M")
    } else if magnitude >= 1e3 {
        scaled(1e3, "K")
    } else {
        format!("${value:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GrowthPoint, Rollover, ValueBasis, project};

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, 30).expect("valid date")
    }

    fn params() -> ProjectionParameters {
        ProjectionParameters {
            track_id: "B".to_string(),
            principal: Some(20_000.0),
            annual_growth_rate_percent: Some(7.0),
            horizon_years: Some(8),
            depreciation_rate_percent: Some(2.5),
            ..ProjectionParameters::default()
        }
    }

    #[test]
    fn rows_mirror_points_and_annotate_rollover() {
        let mut params = params();
        params.advanced_mode = true;
        params.rollover = Rollover {
            enabled: true,
            amount: 4_000.0,
            trigger_year: Some(3),
        };
        let projection = project(&params, reference(), ValueBasis::InflationAdjusted);
        let rows = date_amount_rows(&projection, &params, reference());

        assert_eq!(rows.len(), projection.points.len());
        for (row, point) in rows.iter().zip(&projection.points) {
            assert_eq!(row.date, point.date);
            assert_eq!(row.amount, point.alternate_value);
            assert_eq!(row.inflation_adjusted_amount, point.primary_value);
            assert!(row.inflation_adjusted_amount <= row.amount);
            assert_eq!(row.track_id, "B");
        }
        let annotated: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.rollover_amount.is_some())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(annotated, vec![3]);
        assert_eq!(rows[3].rollover_amount, Some(4_000.0));
        assert_eq!(rows[0].inflation_adjusted_change_pct, 0.0);
        assert!(rows[8].amount_change_pct > 0.0);
    }

    #[test]
    fn rollover_is_not_reported_outside_advanced_mode() {
        let mut params = params();
        params.rollover = Rollover {
            enabled: true,
            amount: 4_000.0,
            trigger_year: Some(3),
        };
        let projection = project(&params, reference(), ValueBasis::Nominal);
        let rows = date_amount_rows(&projection, &params, reference());

        assert!(rows.iter().all(|row| row.rollover_amount.is_none()));
        let summary = schedule_summary(&params, reference());
        assert_eq!(summary.rollover_date, None);
        assert_eq!(summary.rollover_amount, None);
    }

    #[test]
    fn rows_for_empty_projection_are_empty() {
        let mut params = params();
        params.annual_growth_rate_percent = None;
        let projection = project(&params, reference(), ValueBasis::Nominal);
        assert!(date_amount_rows(&projection, &params, reference()).is_empty());
    }

    #[test]
    fn summary_reports_only_configured_rules() {
        let mut params = params();
        let summary = schedule_summary(&params, reference());
        assert_eq!(summary.withdrawal_start, None);
        assert_eq!(summary.contributions_end, None);
        assert_eq!(summary.rollover_date, None);
        assert_eq!(summary.rollover_amount, None);
        assert_eq!(summary.inflation_rate_percent, Some(2.5));

        params.advanced_mode = true;
        params.monthly_withdrawal = 200.0;
        params.withdrawal_start_year = Some(0);
        params.monthly_contribution = 100.0;
        params.contribution_stop_year = Some(5);
        params.rollover = Rollover {
            enabled: true,
            amount: 1_500.0,
            trigger_year: Some(2),
        };
        let summary = schedule_summary(&params, reference());
        assert_eq!(summary.withdrawal_start, Some(reference()));
        assert_eq!(summary.contributions_end, NaiveDate::from_ymd_opt(2031, 9, 30));
        assert_eq!(summary.rollover_date, NaiveDate::from_ymd_opt(2028, 9, 30));
        assert_eq!(summary.rollover_amount, Some(1_500.0));
    }

    #[test]
    fn depletion_finds_first_exhausted_year() {
        let mut params = params();
        params.advanced_mode = true;
        params.monthly_withdrawal = 2_000.0;
        params.withdrawal_start_year = Some(1);
        let projection = project(&params, reference(), ValueBasis::Nominal);

        let depleted = depleted_on(&projection).expect("withdrawals exhaust the principal");
        let first_empty = projection
            .points
            .iter()
            .position(|p: &GrowthPoint| p.primary_value <= 0.0)
            .expect("some point is empty");
        assert_eq!(depleted, projection.points[first_empty].date);
        assert!(first_empty >= 1);

        assert_eq!(depleted_on(&project(&self::params(), reference(), ValueBasis::Nominal)), None);
    }

    #[test]
    fn compact_format_scales_units() {
        assert_eq!(format_compact(2_500_000_000.0), "$2.5B");
        assert_eq!(format_compact(3_000_000.0), "$3M");
        assert_eq!(format_compact(12_345.0), "$12.3K");
        assert_eq!(format_compact(-4_000.0), "$-4K");
        assert_eq!(format_compact(12.5), "$12.50");
    }
}
