//! Emission aggregates for the dashboard: summary totals, month-over-month and monthly trends.
//!
//! Everything is recomputed from a fresh store read on each request.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::emission::{Category, EmissionRecord};
use crate::store::{EmissionFilter, Store, StoreError};
use crate::utils::{month_key, month_range_before, round1, round2};

pub const DEFAULT_TREND_MONTHS: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_emissions: f64,
    pub total_records: usize,
    pub category_breakdown: BTreeMap<Category, f64>,
    pub department_breakdown: BTreeMap<String, f64>,
    pub monthly_data: BTreeMap<String, f64>,
    pub last_month_total: f64,
    pub month_over_month_change: f64,
}

/// Single-pass totals over an already filtered record set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Totals {
    pub total: f64,
    pub records: usize,
    pub by_category: BTreeMap<Category, f64>,
    pub by_department: BTreeMap<String, f64>,
    pub by_month: BTreeMap<String, f64>,
}

pub fn totals(records: &[EmissionRecord]) -> Totals {
    let mut t = Totals::default();
    for r in records {
        t.total += r.co2_kg;
        t.records += 1;
        *t.by_category.entry(r.category).or_insert(0.0) += r.co2_kg;
        *t.by_department.entry(r.department.clone()).or_insert(0.0) += r.co2_kg;
        *t.by_month.entry(month_key(r.date)).or_insert(0.0) += r.co2_kg;
    }
    t
}

fn sum_kg(records: &[EmissionRecord]) -> f64 {
    records.iter().map(|r| r.co2_kg).sum()
}

/// Percentage change from `two_months_ago` to `last_month`, one decimal; 0 when there is no baseline.
pub fn month_over_month_change(last_month: f64, two_months_ago: f64) -> f64 {
    if two_months_ago > 0.0 {
        round1((last_month - two_months_ago) / two_months_ago * 100.0)
    } else {
        0.0
    }
}

/// Summary for the filtered set plus the two most recently completed calendar months before `today`.
///
/// The comparison months are read separately and honour only the department filter.
pub fn summarize(
    store: &dyn Store,
    filter: &EmissionFilter,
    today: NaiveDate,
) -> Result<AnalyticsSummary, StoreError> {
    let records = store.list_emissions(filter)?;
    let t = totals(&records);

    let month_total = |months_back: u32| -> Result<f64, StoreError> {
        let Some((start, end)) = month_range_before(today, months_back) else {
            return Ok(0.0);
        };
        let scoped = EmissionFilter::for_department(filter.department.clone()).between(start, end);
        Ok(sum_kg(&store.list_emissions(&scoped)?))
    };
    let last_month = month_total(1)?;
    let two_months_ago = month_total(2)?;

    Ok(AnalyticsSummary {
        total_emissions: round2(t.total),
        total_records: t.records,
        category_breakdown: t.by_category,
        department_breakdown: t.by_department,
        monthly_data: t.by_month,
        last_month_total: round2(last_month),
        month_over_month_change: month_over_month_change(last_month, two_months_ago),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendRow {
    pub month: String,
    pub electricity: f64,
    pub transportation: f64,
    pub heating: f64,
    pub waste: f64,
    pub total: f64,
}

impl TrendRow {
    fn new(month: String) -> Self {
        TrendRow {
            month,
            electricity: 0.0,
            transportation: 0.0,
            heating: 0.0,
            waste: 0.0,
            total: 0.0,
        }
    }

    fn add(&mut self, category: Category, kg: f64) {
        let slot = match category {
            Category::Electricity => &mut self.electricity,
            Category::Transportation => &mut self.transportation,
            Category::Heating => &mut self.heating,
            Category::Waste => &mut self.waste,
        };
        *slot += kg;
        self.total += kg;
    }
}

/// Per-month category subtotals, ascending by month, keeping the most recent `months` rows.
///
/// `months == 0` keeps every row.
pub fn trends(records: &[EmissionRecord], months: usize) -> Vec<TrendRow> {
    let mut by_month: BTreeMap<String, TrendRow> = BTreeMap::new();
    for r in records {
        let key = month_key(r.date);
        by_month
            .entry(key.clone())
            .or_insert_with(|| TrendRow::new(key))
            .add(r.category, r.co2_kg);
    }
    let rows: Vec<TrendRow> = by_month.into_values().collect();
    if months == 0 || rows.len() <= months {
        return rows;
    }
    rows[rows.len() - months..].to_vec()
}
