use chrono::{Datelike, Months, NaiveDate};
use log::debug;

use super::types::{GrowthPoint, Projection, ProjectionParameters, ValueBasis};

const MONTHS_PER_YEAR: u32 = 12;
const CAPACITY_HINT_YEARS: u32 = 1_024;

/// Nominal and inflation-adjusted totals move through the loop together so
/// every cash flow lands on both.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RunningTotals {
    nominal: f64,
    inflation_adjusted: f64,
}

impl RunningTotals {
    fn seeded(principal: f64) -> Self {
        Self {
            nominal: principal,
            inflation_adjusted: principal,
        }
    }

    fn add(&mut self, amount: f64) {
        self.nominal += amount;
        self.inflation_adjusted += amount;
    }

    fn compound(&mut self, monthly_rate: f64) {
        self.nominal += self.nominal * monthly_rate;
        self.inflation_adjusted += self.inflation_adjusted * monthly_rate;
    }

    fn depreciate(&mut self, rate_percent: f64) {
        self.inflation_adjusted -= depreciation(self.inflation_adjusted, rate_percent);
    }

    fn primary(self, basis: ValueBasis) -> f64 {
        match basis {
            ValueBasis::Nominal => self.nominal,
            ValueBasis::InflationAdjusted => self.inflation_adjusted,
        }
    }

    fn alternate(self, basis: ValueBasis) -> f64 {
        match basis {
            ValueBasis::Nominal => self.inflation_adjusted,
            ValueBasis::InflationAdjusted => self.nominal,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ValidatedInputs {
    principal: f64,
    monthly_rate: f64,
    horizon_years: u32,
}

/// Runs one track's projection against a fixed reference date. The reference
/// date anchors the date axis and decides which month year 0 starts in.
#[derive(Debug, Clone, Copy)]
pub struct GrowthProjector<'a> {
    params: &'a ProjectionParameters,
    reference_date: NaiveDate,
    current_month: u32,
}

impl<'a> GrowthProjector<'a> {
    pub fn new(params: &'a ProjectionParameters, reference_date: NaiveDate) -> Self {
        Self {
            params,
            reference_date,
            current_month: reference_date.month0(),
        }
    }

    pub fn project(&self, display: ValueBasis) -> Projection {
        let Some(inputs) = self.validated() else {
            debug!(
                "track {:?}: principal, growth rate or horizon missing; nothing projected",
                self.params.track_id
            );
            return Projection::empty(&self.params.track_id, display);
        };

        let mut totals = RunningTotals::seeded(inputs.principal);
        let mut points = Vec::with_capacity(point_capacity(inputs.horizon_years));

        for year in 0..=inputs.horizon_years {
            let start_month = if year == 0 { self.current_month } else { 0 };
            for month in start_month..MONTHS_PER_YEAR {
                if self.should_apply_withdrawal(year, month) {
                    totals.add(-self.params.monthly_withdrawal);
                }

                totals.compound(inputs.monthly_rate);

                if self.should_apply_contribution(year, month) {
                    let contribution = self.params.monthly_contribution;
                    totals.add(contribution + contribution * inputs.monthly_rate);
                }
            }

            if self.should_apply_rollover(year) {
                debug!(
                    "track {:?}: rolling {} in at year {year}",
                    self.params.track_id, self.params.rollover.amount
                );
                totals.add(self.params.rollover.amount);
            }

            if let Some(rate_percent) = self.params.depreciation_rate_percent {
                totals.depreciate(rate_percent);
            }

            points.push(GrowthPoint {
                year,
                date: self.date_for_year(year),
                primary_value: totals.primary(display).floor(),
                alternate_value: totals.alternate(display).floor(),
            });
        }

        Projection {
            track_id: self.params.track_id.clone(),
            display,
            final_value_display: format_currency(totals.primary(display)),
            points,
        }
    }

    /// Strips the configured inflation rate off an already computed figure.
    pub fn inflation_adjusted(&self, amount: f64) -> f64 {
        let rate_percent = self.params.depreciation_rate_percent.unwrap_or(0.0);
        (amount - depreciation(amount, rate_percent)).floor()
    }

    pub fn date_for_year(&self, year: u32) -> NaiveDate {
        year_offset(self.reference_date, year)
    }

    fn validated(&self) -> Option<ValidatedInputs> {
        let principal = self
            .params
            .principal
            .map(f64::trunc)
            .filter(|p| p.is_finite() && *p > 0.0)?;
        let rate_percent = self
            .params
            .annual_growth_rate_percent
            .filter(|r| r.is_finite())?;
        let horizon_years = self.params.horizon_years?;

        Some(ValidatedInputs {
            principal,
            monthly_rate: rate_percent / 100.0 / f64::from(MONTHS_PER_YEAR),
            horizon_years,
        })
    }

    fn should_apply_withdrawal(&self, year: u32, month: u32) -> bool {
        let params = self.params;
        if !params.advanced_mode || params.monthly_withdrawal == 0.0 {
            return false;
        }
        let Some(start_year) = params.withdrawal_start_year else {
            return false;
        };

        if year == 0 {
            return start_year == 0 && month >= self.current_month;
        }
        year >= start_year
    }

    fn should_apply_contribution(&self, year: u32, month: u32) -> bool {
        let params = self.params;
        let Some(stop_year) = params.contribution_stop_year.filter(|_| params.advanced_mode) else {
            return true;
        };

        if year == 0 {
            return month >= self.current_month;
        }
        year < stop_year || (year == stop_year && month < self.current_month)
    }

    fn should_apply_rollover(&self, year: u32) -> bool {
        self.params.rollover_armed() && self.params.rollover.trigger_year == Some(year)
    }
}

pub fn project(
    params: &ProjectionParameters,
    reference_date: NaiveDate,
    display: ValueBasis,
) -> Projection {
    GrowthProjector::new(params, reference_date).project(display)
}

pub fn depreciation(amount: f64, rate_percent: f64) -> f64 {
    amount * (rate_percent / 100.0)
}

/// Whole-percent change from `original` to `updated`; 0 when `original` is 0.
pub fn pct_change(original: f64, updated: f64) -> f64 {
    if original == 0.0 {
        return 0.0;
    }
    ((updated - original) / original * 100.0).floor()
}

/// Up-front allocation for a run's points; longer runs grow the buffer as
/// they go.
fn point_capacity(horizon_years: u32) -> usize {
    horizon_years.min(CAPACITY_HINT_YEARS) as usize + 1
}

pub(crate) fn year_offset(reference_date: NaiveDate, year: u32) -> NaiveDate {
    year.checked_mul(MONTHS_PER_YEAR)
        .and_then(|months| reference_date.checked_add_months(Months::new(months)))
        .unwrap_or(NaiveDate::MAX)
}

/// `$` followed by the floored amount with comma thousands separators.
pub fn format_currency(value: f64) -> String {
    let whole = value.floor();
    if whole.is_nan() {
        return "$NaN".to_string();
    }
    if whole.is_infinite() {
        let label = if whole > 0.0 { "$∞" } else { "$-∞" };
        return label.to_string();
    }

    let sign = if whole < 0.0 { "-" } else { "" };
    let digits = format!("{:.0}", whole.abs());
    format!("${sign}{}", group_thousands(&digits))
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Reads a leading integer out of free text: optional sign, then digits up to
/// the first other character. No digits means no amount.
pub fn parse_principal(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1.0, &trimmed[1..]),
        Some(b'+') => (1.0, &trimmed[1..]),
        _ => (1.0, trimmed),
    };
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let digits = &rest[..end];
    if digits.is_empty() {
        return None;
    }
    digits.parse::<f64>().ok().map(|value| sign * value)
}
