use chrono::NaiveDate;
use serde::Serialize;

/// Which running total is reported as the primary value of each point.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueBasis {
    #[default]
    Nominal,
    InflationAdjusted,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Rollover {
    pub enabled: bool,
    pub amount: f64,
    pub trigger_year: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionParameters {
    pub track_id: String,
    pub principal: Option<f64>,
    pub annual_growth_rate_percent: Option<f64>,
    pub horizon_years: Option<u32>,
    pub advanced_mode: bool,
    pub monthly_contribution: f64,
    pub monthly_withdrawal: f64,
    pub contribution_stop_year: Option<u32>,
    pub withdrawal_start_year: Option<u32>,
    pub rollover: Rollover,
    pub depreciation_rate_percent: Option<f64>,
}

impl ProjectionParameters {
    /// Rollover terms only count in advanced mode, with the flag set and a
    /// non-zero amount.
    pub fn rollover_armed(&self) -> bool {
        self.advanced_mode && self.rollover.enabled && self.rollover.amount != 0.0
    }
}

/// One projected year. Amounts are whole currency units.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthPoint {
    pub year: u32,
    pub date: NaiveDate,
    pub primary_value: f64,
    pub alternate_value: f64,
}

impl GrowthPoint {
    pub fn nominal(&self, basis: ValueBasis) -> f64 {
        match basis {
            ValueBasis::Nominal => self.primary_value,
            ValueBasis::InflationAdjusted => self.alternate_value,
        }
    }

    pub fn inflation_adjusted(&self, basis: ValueBasis) -> f64 {
        match basis {
            ValueBasis::Nominal => self.alternate_value,
            ValueBasis::InflationAdjusted => self.primary_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub track_id: String,
    pub display: ValueBasis,
    pub final_value_display: String,
    pub points: Vec<GrowthPoint>,
}

impl Projection {
    pub fn empty(track_id: &str, display: ValueBasis) -> Self {
        Self {
            track_id: track_id.to_string(),
            display,
            final_value_display: String::new(),
            points: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn final_point(&self) -> Option<&GrowthPoint> {
        self.points.last()
    }
}
