//! Canned reduction recommendations ranked by each category's share of total emissions.

use serde::Serialize;
use uuid::Uuid;

use crate::models::emission::{Category, EmissionRecord};
use crate::utils::round1;

const MAX_CATEGORY_RECOMMENDATIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    /// Category name, or `general` for the audit filler.
    pub category: String,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub potential_reduction: String,
    pub estimated_cost: String,
    pub payback_period: String,
}

struct Template {
    priority: Priority,
    title: &'static str,
    /// Sentence with `{pct}` and `{kg}` placeholders.
    description: &'static str,
    reduction_share: f64,
    estimated_cost: &'static str,
    payback_period: &'static str,
}

fn template(category: Category) -> Template {
    match category {
        Category::Electricity => Template {
            priority: Priority::High,
            title: "Switch to Renewable Energy",
            description: "Electricity accounts for {pct}% of your emissions ({kg} kg CO2). Consider installing solar panels or switching to a renewable energy provider.",
            reduction_share: 0.7,
            estimated_cost: "$15,000 - $25,000 (solar installation)",
            payback_period: "7-10 years",
        },
        Category::Transportation => Template {
            priority: Priority::High,
            title: "Optimize Fleet & Promote EVs",
            description: "Transportation represents {pct}% of emissions ({kg} kg CO2). Transition to electric or hybrid vehicles and encourage carpooling.",
            reduction_share: 0.5,
            estimated_cost: "$30,000 - $50,000 per EV",
            payback_period: "5-8 years",
        },
        Category::Heating => Template {
            priority: Priority::Medium,
            title: "Improve Insulation & Upgrade HVAC",
            description: "Heating/cooling is {pct}% of your footprint ({kg} kg CO2). Improve building insulation and upgrade to energy-efficient HVAC systems.",
            reduction_share: 0.3,
            estimated_cost: "$5,000 - $15,000",
            payback_period: "3-5 years",
        },
        Category::Waste => Template {
            priority: Priority::Medium,
            title: "Implement Recycling & Composting Program",
            description: "Waste contributes {pct}% to emissions ({kg} kg CO2). Start comprehensive recycling and composting programs.",
            reduction_share: 0.8,
            estimated_cost: "$2,000 - $5,000",
            payback_period: "2-3 years",
        },
    }
}

fn energy_audit() -> Recommendation {
    Recommendation {
        id: Uuid::new_v4().to_string(),
        category: "general".to_string(),
        priority: Priority::Low,
        title: "Conduct Energy Audit".to_string(),
        description: "Perform a comprehensive energy audit to identify additional reduction opportunities.".to_string(),
        potential_reduction: "Variable".to_string(),
        estimated_cost: "$500 - $2,000".to_string(),
        payback_period: "Immediate insights".to_string(),
    }
}

fn from_template(category: Category, total: f64, grand_total: f64) -> Recommendation {
    let t = template(category);
    let pct = if grand_total > 0.0 { total / grand_total * 100.0 } else { 0.0 };
    let description = t
        .description
        .replace("{pct}", &format!("{:.1}", round1(pct)))
        .replace("{kg}", &format!("{}", total.round()));
    Recommendation {
        id: Uuid::new_v4().to_string(),
        category: category.as_str().to_string(),
        priority: t.priority,
        title: t.title.to_string(),
        description,
        potential_reduction: format!("{} kg CO2/year", (total * t.reduction_share).round()),
        estimated_cost: t.estimated_cost.to_string(),
        payback_period: t.payback_period.to_string(),
    }
}

/// Category totals in descending order. The sort is stable, so ties keep the fixed category order.
pub fn ranked_category_totals(records: &[EmissionRecord]) -> Vec<(Category, f64)> {
    let mut totals: Vec<(Category, f64)> = Category::ALL
        .into_iter()
        .filter_map(|c| {
            let mut present = false;
            let mut sum = 0.0;
            for r in records.iter().filter(|r| r.category == c) {
                present = true;
                sum += r.co2_kg;
            }
            present.then_some((c, sum))
        })
        .collect();
    totals.sort_by(|a, b| b.1.total_cmp(&a.1));
    totals
}

/// Up to three category recommendations, plus an audit filler when fewer than three categories are present.
pub fn recommend(records: &[EmissionRecord]) -> Vec<Recommendation> {
    let ranked = ranked_category_totals(records);
    let grand_total: f64 = ranked.iter().map(|(_, t)| t).sum();

    let mut out: Vec<Recommendation> = ranked
        .iter()
        .take(MAX_CATEGORY_RECOMMENDATIONS)
        .map(|(category, total)| from_template(*category, *total, grand_total))
        .collect();
    if out.len() < MAX_CATEGORY_RECOMMENDATIONS {
        out.push(energy_audit());
    }
    out
}
