//! Canonical schema, record model and the shared aggregation engine for the MGNREGA pipeline.
//!
//! Both the store-backed and the snapshot-backed data paths end up here: they materialize a
//! `Vec<Record>` and hand it to the same pure functions, so the aggregates cannot drift apart.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const CRATE_NAME: &str = "mgnrega-core";

/// Upstream record exactly as delivered by the API: flat key/value pairs.
pub type RawRecord = Map<String, Value>;

/// Record after field-name normalization. Values are still uncoerced JSON.
pub type CanonicalRecord = Map<String, Value>;

/// Bumped whenever `FIELD_ALIASES` or the canonical column set changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Upstream spellings that do not lower-case to their canonical column.
pub const FIELD_ALIASES: &[(&str, &str)] = &[
    (
        "percentage_payments_gererated_within_15_days",
        "percentage_payments_generated_within_15_days",
    ),
];

/// Identity and free-text columns of the canonical schema.
pub const TEXT_COLUMNS: &[&str] = &[
    "state_code",
    "state_name",
    "district_code",
    "district_name",
    "fin_year",
    "month",
    "remarks",
];

fn alias_table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| FIELD_ALIASES.iter().copied().collect())
}

/// Map an arbitrary-cased upstream field name to its canonical column name.
///
/// Unknown names fall through lower-cased so new upstream fields survive ingestion.
pub fn canonical_field_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    match alias_table().get(lowered.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => lowered,
    }
}

/// Empty strings and any-case `NA` are the upstream's "not applicable" markers.
pub fn is_not_applicable(value: &Value) -> bool {
    match value {
        Value::String(s) => s.is_empty() || s.eq_ignore_ascii_case("NA"),
        _ => false,
    }
}

/// Schema Mapper: rename fields to canonical names and null out sentinel values.
///
/// Total and idempotent. Type coercion is left to the load stage.
pub fn normalize_record(raw: &RawRecord) -> CanonicalRecord {
    raw.iter()
        .map(|(key, value)| {
            let cleaned = if is_not_applicable(value) {
                Value::Null
            } else {
                value.clone()
            };
            (canonical_field_name(key), cleaned)
        })
        .collect()
}

macro_rules! measures {
    ($($variant:ident => $column:literal,)+) => {
        /// Numeric columns of the canonical schema.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Measure {
            $($variant,)+
        }

        impl Measure {
            pub const ALL: &'static [Measure] = &[$(Measure::$variant,)+];

            pub fn column(self) -> &'static str {
                match self {
                    $(Measure::$variant => $column,)+
                }
            }
        }
    };
}

measures! {
    ApprovedLabourBudget => "approved_labour_budget",
    AverageWageRate => "average_wage_rate_per_day_per_person",
    AverageDaysOfEmployment => "average_days_of_employment_provided_per_household",
    DifferentlyAbledPersonsWorked => "differently_abled_persons_worked",
    MaterialAndSkilledWages => "material_and_skilled_wages",
    CompletedWorks => "number_of_completed_works",
    GpsWithNilExp => "number_of_gps_with_nil_exp",
    OngoingWorks => "number_of_ongoing_works",
    CentralLiabilityPersondays => "persondays_of_central_liability_so_far",
    ScPersondays => "sc_persondays",
    ScWorkers => "sc_workers_against_active_workers",
    StPersondays => "st_persondays",
    StWorkers => "st_workers_against_active_workers",
    AdminExpenditure => "total_adm_expenditure",
    TotalExpenditure => "total_exp",
    HouseholdsWorked => "total_households_worked",
    IndividualsWorked => "total_individuals_worked",
    ActiveJobCards => "total_no_of_active_job_cards",
    ActiveWorkers => "total_no_of_active_workers",
    HouseholdsCompleted100Days => "total_no_of_hhs_completed_100_days_of_wage_employment",
    JobCardsIssued => "total_no_of_jobcards_issued",
    TotalWorkers => "total_no_of_workers",
    WorksTakenUp => "total_no_of_works_takenup",
    Wages => "wages",
    WomenPersondays => "women_persondays",
    CategoryBWorksPercent => "percent_of_category_b_works",
    AgricultureAlliedExpenditurePercent => "percent_of_expenditure_on_agriculture_allied_works",
    NrmExpenditurePercent => "percent_of_nrm_expenditure",
    PaymentsWithin15DaysPercent => "percentage_payments_generated_within_15_days",
}

impl Measure {
    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.column() == column)
    }
}

/// Full canonical column set: identity/text columns followed by measures.
pub fn canonical_columns() -> Vec<&'static str> {
    TEXT_COLUMNS
        .iter()
        .copied()
        .chain(Measure::ALL.iter().map(|m| m.column()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("column {column}: cannot coerce {value} to a number")]
pub struct CoercionError {
    pub column: String,
    pub value: String,
}

/// Coerce a cleaned JSON value into a measure. `Ok(None)` is a genuine null.
pub fn coerce_measure(column: &str, value: &Value) -> Result<Option<f64>, CoercionError> {
    if value.is_null() || is_not_applicable(value) {
        return Ok(None);
    }
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(CoercionError {
            column: column.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Render a cleaned JSON value for a text column.
pub fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Conceptual key of a record in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub district_name: String,
    pub fin_year: String,
    pub month: String,
}

impl RecordKey {
    pub fn of(record: &CanonicalRecord) -> Self {
        let text = |column: &str| {
            record
                .get(column)
                .and_then(coerce_text)
                .unwrap_or_default()
        };
        Self {
            district_name: text("district_name"),
            fin_year: text("fin_year"),
            month: text("month"),
        }
    }
}

/// One district/month/financial-year row with typed, nullable measures.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub district_name: String,
    pub fin_year: String,
    pub month: String,
    measures: BTreeMap<Measure, f64>,
}

impl Record {
    pub fn new(
        district_name: impl Into<String>,
        fin_year: impl Into<String>,
        month: impl Into<String>,
    ) -> Self {
        Self {
            district_name: district_name.into(),
            fin_year: fin_year.into(),
            month: month.into(),
            measures: BTreeMap::new(),
        }
    }

    pub fn with(mut self, measure: Measure, value: f64) -> Self {
        self.measures.insert(measure, value);
        self
    }

    pub fn set(&mut self, measure: Measure, value: Option<f64>) {
        match value {
            Some(v) => {
                self.measures.insert(measure, v);
            }
            None => {
                self.measures.remove(&measure);
            }
        }
    }

    pub fn value(&self, measure: Measure) -> Option<f64> {
        self.measures.get(&measure).copied()
    }

    pub fn value_or_zero(&self, measure: Measure) -> f64 {
        self.value(measure).unwrap_or(0.0)
    }

    pub fn program_month(&self) -> Option<ProgramMonth> {
        ProgramMonth::parse(&self.month)
    }

    pub fn matches(&self, district_name: &str, fin_year: &str) -> bool {
        self.district_name == district_name && self.fin_year == fin_year
    }

    /// Lenient conversion used by the in-memory path: unparseable measures become null.
    pub fn from_canonical(record: &CanonicalRecord) -> Self {
        let key = RecordKey::of(record);
        let mut out = Record::new(key.district_name, key.fin_year, key.month);
        for measure in Measure::ALL {
            let value = record
                .get(measure.column())
                .and_then(|v| coerce_measure(measure.column(), v).ok().flatten());
            out.set(*measure, value);
        }
        out
    }
}

/// The fixed 12-month program calendar, April first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProgramMonth {
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
    January,
    February,
    March,
}

impl ProgramMonth {
    pub const ALL: [ProgramMonth; 12] = [
        ProgramMonth::April,
        ProgramMonth::May,
        ProgramMonth::June,
        ProgramMonth::July,
        ProgramMonth::August,
        ProgramMonth::September,
        ProgramMonth::October,
        ProgramMonth::November,
        ProgramMonth::December,
        ProgramMonth::January,
        ProgramMonth::February,
        ProgramMonth::March,
    ];

    /// 1-based position within the financial year.
    pub fn position(self) -> u8 {
        self as u8 + 1
    }

    pub fn full_name(self) -> &'static str {
        match self {
            ProgramMonth::April => "April",
            ProgramMonth::May => "May",
            ProgramMonth::June => "June",
            ProgramMonth::July => "July",
            ProgramMonth::August => "August",
            ProgramMonth::September => "September",
            ProgramMonth::October => "October",
            ProgramMonth::November => "November",
            ProgramMonth::December => "December",
            ProgramMonth::January => "January",
            ProgramMonth::February => "February",
            ProgramMonth::March => "March",
        }
    }

    pub fn short_name(self) -> &'static str {
        &self.full_name()[..3]
    }

    /// Accepts full names and three-letter abbreviations in any case.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|m| {
            label.eq_ignore_ascii_case(m.full_name()) || label.eq_ignore_ascii_case(m.short_name())
        })
    }
}

/// Derive the label of the financial year before `label`, keeping its form.
///
/// `"2023-24"` gives `"2022-23"`, `"2023-2024"` gives `"2022-2023"` and `"2024"` gives `"2023"`.
/// Anything else is `None`.
pub fn previous_fin_year(label: &str) -> Option<String> {
    let label = label.trim();
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if let Some((start, end)) = label.split_once('-') {
        let (start, end) = (start.trim(), end.trim());
        if start.len() != 4 || !all_digits(start) || !all_digits(end) {
            return None;
        }
        let start_year: u32 = start.parse().ok()?;
        if start_year == 0 {
            return None;
        }
        return match end.len() {
            2 => {
                let mut end_year = start_year - start_year % 100 + end.parse::<u32>().ok()?;
                if end_year < start_year {
                    end_year += 100;
                }
                Some(format!("{}-{:02}", start_year - 1, (end_year - 1) % 100))
            }
            4 => {
                let end_year: u32 = end.parse().ok()?;
                if end_year == 0 {
                    return None;
                }
                Some(format!("{}-{}", start_year - 1, end_year - 1))
            }
            _ => None,
        };
    }

    if all_digits(label) {
        let year: u32 = label.parse().ok()?;
        if year > 0 {
            return Some((year - 1).to_string());
        }
    }
    None
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `round(numerator / denominator * 100, 2)`, or 0 for a zero denominator.
pub fn percentage(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        round2(numerator / denominator * 100.0)
    }
}

/// Relative change from `previous` to `current` in percent; 0 when there is no baseline.
pub fn change_percent(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        0.0
    } else {
        round2((current - previous) / previous * 100.0)
    }
}

// Values are summed in sorted order so the result does not depend on row order.
fn sum(records: &[Record], measure: Measure) -> f64 {
    let mut values: Vec<f64> = records.iter().filter_map(|r| r.value(measure)).collect();
    values.sort_by(f64::total_cmp);
    values.into_iter().sum()
}

// Nulls are excluded from both numerator and count, like SQL AVG.
fn mean(records: &[Record], measure: Measure) -> f64 {
    let mut values: Vec<f64> = records.iter().filter_map(|r| r.value(measure)).collect();
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let count = values.len() as f64;
    values.into_iter().sum::<f64>() / count
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Overview {
    pub record_count: usize,
    pub total_households: f64,
    pub total_individuals: f64,
    pub total_women_days: f64,
    pub avg_employment_days: f64,
    pub total_completed_works: f64,
    pub total_ongoing_works: f64,
    pub total_expenditure: f64,
    pub total_wages: f64,
    pub total_job_cards: f64,
    pub total_active_workers: f64,
    pub total_hhs_completed_100_days: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MonthlyPoint {
    pub month: String,
    pub position: u8,
    pub total_households: f64,
    pub total_individuals: f64,
    pub total_wages: f64,
    pub women_days: f64,
    pub sc_days: f64,
    pub st_days: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScSt {
    pub sc_days: f64,
    pub st_days: f64,
    pub sc_workers: f64,
    pub st_workers: f64,
    pub total_workers: f64,
    pub sc_percentage: f64,
    pub st_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Projects {
    pub completed_works: f64,
    pub ongoing_works: f64,
    pub total_works: f64,
    pub category_b_percent: f64,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Budget {
    pub approved_budget: f64,
    pub total_expenditure: f64,
    pub wage_expenditure: f64,
    pub material_expenditure: f64,
    pub admin_expenditure: f64,
    pub budget_utilization_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Wages {
    pub avg_wage_rate: f64,
    pub payment_timeliness: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct YearTotals {
    pub fin_year: String,
    pub record_count: usize,
    pub total_households: f64,
    pub total_individuals: f64,
    pub total_expenditure: f64,
    pub total_wages: f64,
    pub avg_wage_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct YearOverYear {
    pub district_name: String,
    pub current: YearTotals,
    pub previous: YearTotals,
    pub households_change_percent: f64,
    pub expenditure_change_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateComparison {
    pub district_name: String,
    pub fin_year: String,
    pub district_avg_employment_days: f64,
    pub state_avg_employment_days: f64,
}

pub fn overview(records: &[Record]) -> Overview {
    Overview {
        record_count: records.len(),
        total_households: sum(records, Measure::HouseholdsWorked),
        total_individuals: sum(records, Measure::IndividualsWorked),
        total_women_days: sum(records, Measure::WomenPersondays),
        avg_employment_days: round2(mean(records, Measure::AverageDaysOfEmployment)),
        total_completed_works: sum(records, Measure::CompletedWorks),
        total_ongoing_works: sum(records, Measure::OngoingWorks),
        total_expenditure: round2(sum(records, Measure::TotalExpenditure)),
        total_wages: round2(sum(records, Measure::Wages)),
        total_job_cards: sum(records, Measure::ActiveJobCards),
        total_active_workers: sum(records, Measure::ActiveWorkers),
        total_hhs_completed_100_days: sum(records, Measure::HouseholdsCompleted100Days),
    }
}

/// Twelve points in program order; months without records are all zeros.
pub fn monthly(records: &[Record]) -> Vec<MonthlyPoint> {
    ProgramMonth::ALL
        .into_iter()
        .map(|month| {
            let rows: Vec<Record> = records
                .iter()
                .filter(|r| r.program_month() == Some(month))
                .cloned()
                .collect();
            MonthlyPoint {
                month: month.short_name().to_string(),
                position: month.position(),
                total_households: sum(&rows, Measure::HouseholdsWorked),
                total_individuals: sum(&rows, Measure::IndividualsWorked),
                total_wages: round2(
                    sum(&rows, Measure::Wages) + sum(&rows, Measure::MaterialAndSkilledWages),
                ),
                women_days: sum(&rows, Measure::WomenPersondays),
                sc_days: sum(&rows, Measure::ScPersondays),
                st_days: sum(&rows, Measure::StPersondays),
            }
        })
        .collect()
}

pub fn scst(records: &[Record]) -> ScSt {
    let sc_workers = sum(records, Measure::ScWorkers);
    let st_workers = sum(records, Measure::StWorkers);
    let total_workers = sum(records, Measure::ActiveWorkers);
    ScSt {
        sc_days: sum(records, Measure::ScPersondays),
        st_days: sum(records, Measure::StPersondays),
        sc_workers,
        st_workers,
        total_workers,
        sc_percentage: percentage(sc_workers, total_workers),
        st_percentage: percentage(st_workers, total_workers),
    }
}

pub fn projects(records: &[Record]) -> Projects {
    let completed_works = sum(records, Measure::CompletedWorks);
    let total_works = sum(records, Measure::WorksTakenUp);
    Projects {
        completed_works,
        ongoing_works: sum(records, Measure::OngoingWorks),
        total_works,
        category_b_percent: round2(mean(records, Measure::CategoryBWorksPercent)),
        completion_rate: percentage(completed_works, total_works),
    }
}

pub fn budget(records: &[Record]) -> Budget {
    let approved_budget = sum(records, Measure::ApprovedLabourBudget);
    let total_expenditure = sum(records, Measure::TotalExpenditure);
    Budget {
        approved_budget: round2(approved_budget),
        total_expenditure: round2(total_expenditure),
        wage_expenditure: round2(sum(records, Measure::Wages)),
        material_expenditure: round2(sum(records, Measure::MaterialAndSkilledWages)),
        admin_expenditure: round2(sum(records, Measure::AdminExpenditure)),
        budget_utilization_percent: percentage(total_expenditure, approved_budget),
    }
}

pub fn wages(records: &[Record]) -> Wages {
    Wages {
        avg_wage_rate: round2(mean(records, Measure::AverageWageRate)),
        payment_timeliness: round2(mean(records, Measure::PaymentsWithin15DaysPercent)),
    }
}

pub fn year_totals(fin_year: &str, records: &[Record]) -> YearTotals {
    YearTotals {
        fin_year: fin_year.to_string(),
        record_count: records.len(),
        total_households: sum(records, Measure::HouseholdsWorked),
        total_individuals: sum(records, Measure::IndividualsWorked),
        total_expenditure: round2(sum(records, Measure::TotalExpenditure)),
        total_wages: round2(sum(records, Measure::Wages)),
        avg_wage_rate: round2(mean(records, Measure::AverageWageRate)),
    }
}

pub fn year_over_year(district_name: &str, current: YearTotals, previous: YearTotals) -> YearOverYear {
    YearOverYear {
        district_name: district_name.to_string(),
        households_change_percent: change_percent(
            current.total_households,
            previous.total_households,
        ),
        expenditure_change_percent: change_percent(
            current.total_expenditure,
            previous.total_expenditure,
        ),
        current,
        previous,
    }
}

/// District mean of employment days against the mean over every record of the year.
pub fn state_comparison(
    district_name: &str,
    fin_year: &str,
    year_records: &[Record],
) -> StateComparison {
    let district_rows: Vec<Record> = year_records
        .iter()
        .filter(|r| r.district_name == district_name)
        .cloned()
        .collect();
    StateComparison {
        district_name: district_name.to_string(),
        fin_year: fin_year.to_string(),
        district_avg_employment_days: round2(mean(&district_rows, Measure::AverageDaysOfEmployment)),
        state_avg_employment_days: round2(mean(year_records, Measure::AverageDaysOfEmployment)),
    }
}

/// Program months that have at least one record, in calendar order.
pub fn available_months(records: &[Record]) -> Vec<ProgramMonth> {
    records
        .iter()
        .filter_map(Record::program_month)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Non-empty district names, ascending.
pub fn distinct_districts(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter(|r| !r.district_name.is_empty())
        .map(|r| r.district_name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Non-empty financial-year labels, newest first.
pub fn distinct_fin_years(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter(|r| !r.fin_year.is_empty())
        .map(|r| r.fin_year.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .rev()
        .collect()
}
