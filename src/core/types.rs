use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Combined,
    Garbage,
    Missed,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Combined, Mode::Garbage, Mode::Missed];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Combined => "combined",
            Mode::Garbage => "garbage",
            Mode::Missed => "missed",
        }
    }

    /// Capability table: which inputs a session in this mode may edit and show.
    pub fn active_fields(self) -> &'static [InputField] {
        match self {
            Mode::Combined => &InputField::ALL,
            Mode::Garbage => &[
                InputField::MonthlyLeads,
                InputField::AvgJobValue,
                InputField::CloseRate,
                InputField::TireKickerPercent,
                InputField::HourlyValue,
            ],
            Mode::Missed => &[
                InputField::AvgJobValue,
                InputField::CloseRate,
                InputField::MissedCalls,
            ],
        }
    }

    pub fn is_active(self, field: InputField) -> bool {
        self.active_fields().contains(&field)
    }

    pub fn surfaces_garbage(self) -> bool {
        matches!(self, Mode::Combined | Mode::Garbage)
    }

    pub fn surfaces_missed(self) -> bool {
        matches!(self, Mode::Combined | Mode::Missed)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "combined" => Ok(Mode::Combined),
            "garbage" => Ok(Mode::Garbage),
            "missed" => Ok(Mode::Missed),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputField {
    MonthlyLeads,
    AvgJobValue,
    CloseRate,
    TireKickerPercent,
    MissedCalls,
    HourlyValue,
}

/// Bounds and presentation hints for one input. `step` is not enforced.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub field: InputField,
    pub min: u32,
    pub max: u32,
    pub step: u32,
    pub default: u32,
}

impl InputField {
    pub const ALL: [InputField; 6] = [
        InputField::MonthlyLeads,
        InputField::AvgJobValue,
        InputField::CloseRate,
        InputField::TireKickerPercent,
        InputField::MissedCalls,
        InputField::HourlyValue,
    ];

    pub fn spec(self) -> FieldSpec {
        let (min, max, step, default) = match self {
            InputField::MonthlyLeads => (10, 500, 5, 40),
            InputField::AvgJobValue => (2_500, 75_000, 500, 10_000),
            InputField::CloseRate => (5, 50, 1, 20),
            InputField::TireKickerPercent => (10, 70, 5, 40),
            InputField::MissedCalls => (0, 50, 1, 20),
            InputField::HourlyValue => (100, 2_000, 25, 250),
        };
        FieldSpec {
            field: self,
            min,
            max,
            step,
            default,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            InputField::MonthlyLeads => "monthlyLeads",
            InputField::AvgJobValue => "avgJobValue",
            InputField::CloseRate => "closeRate",
            InputField::TireKickerPercent => "tireKickerPercent",
            InputField::MissedCalls => "missedCalls",
            InputField::HourlyValue => "hourlyValue",
        }
    }
}

impl fmt::Display for InputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: InputField,
        value: u32,
        min: u32,
        max: u32,
    },
    #[error("{field} is not editable in {mode} mode")]
    InactiveField { field: InputField, mode: Mode },
}

/// The six calculator parameters. Only constructible with in-range values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inputs {
    monthly_leads: u32,
    avg_job_value: u32,
    close_rate: u32,
    tire_kicker_percent: u32,
    missed_calls: u32,
    hourly_value: u32,
}

impl Default for Inputs {
    fn default() -> Self {
        Self {
            monthly_leads: InputField::MonthlyLeads.spec().default,
            avg_job_value: InputField::AvgJobValue.spec().default,
            close_rate: InputField::CloseRate.spec().default,
            tire_kicker_percent: InputField::TireKickerPercent.spec().default,
            missed_calls: InputField::MissedCalls.spec().default,
            hourly_value: InputField::HourlyValue.spec().default,
        }
    }
}

impl Inputs {
    pub fn new(
        monthly_leads: u32,
        avg_job_value: u32,
        close_rate: u32,
        tire_kicker_percent: u32,
        missed_calls: u32,
        hourly_value: u32,
    ) -> Result<Self, InputError> {
        let mut inputs = Self::default();
        inputs.set(InputField::MonthlyLeads, monthly_leads)?;
        inputs.set(InputField::AvgJobValue, avg_job_value)?;
        inputs.set(InputField::CloseRate, close_rate)?;
        inputs.set(InputField::TireKickerPercent, tire_kicker_percent)?;
        inputs.set(InputField::MissedCalls, missed_calls)?;
        inputs.set(InputField::HourlyValue, hourly_value)?;
        Ok(inputs)
    }

    pub fn get(&self, field: InputField) -> u32 {
        match field {
            InputField::MonthlyLeads => self.monthly_leads,
            InputField::AvgJobValue => self.avg_job_value,
            InputField::CloseRate => self.close_rate,
            InputField::TireKickerPercent => self.tire_kicker_percent,
            InputField::MissedCalls => self.missed_calls,
            InputField::HourlyValue => self.hourly_value,
        }
    }

    /// Range-checked setter; leaves the value untouched on error.
    pub fn set(&mut self, field: InputField, value: u32) -> Result<(), InputError> {
        let spec = field.spec();
        if value < spec.min || value > spec.max {
            return Err(InputError::OutOfRange {
                field,
                value,
                min: spec.min,
                max: spec.max,
            });
        }
        let slot = match field {
            InputField::MonthlyLeads => &mut self.monthly_leads,
            InputField::AvgJobValue => &mut self.avg_job_value,
            InputField::CloseRate => &mut self.close_rate,
            InputField::TireKickerPercent => &mut self.tire_kicker_percent,
            InputField::MissedCalls => &mut self.missed_calls,
            InputField::HourlyValue => &mut self.hourly_value,
        };
        *slot = value;
        Ok(())
    }

    pub fn monthly_leads(&self) -> u32 {
        self.monthly_leads
    }

    pub fn avg_job_value(&self) -> u32 {
        self.avg_job_value
    }

    pub fn close_rate(&self) -> u32 {
        self.close_rate
    }

    pub fn tire_kicker_percent(&self) -> u32 {
        self.tire_kicker_percent
    }

    pub fn missed_calls(&self) -> u32 {
        self.missed_calls
    }

    pub fn hourly_value(&self) -> u32 {
        self.hourly_value
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GarbageBreakdown {
    pub total: u64,
    pub time_cost: u64,
    pub lead_cost: u64,
    pub opportunity_cost: u64,
    pub leads_count: u64,
    pub hours_wasted: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissedBreakdown {
    pub total: u64,
    pub potential_revenue: u64,
    pub calls_count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalGap {
    pub monthly: u64,
    pub annual: u64,
}

/// Projection of `Inputs` (and optionally `Mode`); always replaced wholesale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatorResult {
    pub garbage: GarbageBreakdown,
    pub missed: MissedBreakdown,
    pub total: TotalGap,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LeakKind {
    Garbage,
    Missed,
}

impl LeakKind {
    pub fn label(self) -> &'static str {
        match self {
            LeakKind::Garbage => "Wasted Time on Unqualified Leads",
            LeakKind::Missed => "Missed & After-Hours Calls",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Leak {
    pub kind: LeakKind,
    pub label: &'static str,
    pub amount: u64,
}
