use crate::models::emission::{Category, Department, EmissionRecord};
use crate::store::Store;
use crate::utils::round2;
use chrono::{DateTime, Months, NaiveDate, Utc};
use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const SEED: u64 = 0x0C02_F007_9A1E_5EEDu64;
const HISTORY_MONTHS: u32 = 12;
const DEPARTMENTS: [(&str, &str); 4] = [
    ("Operations", "Main operations department"),
    ("IT Department", "Information Technology"),
    ("Facilities", "Building facilities management"),
    ("Transportation", "Fleet and logistics"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub departments: usize,
    pub emissions: usize,
}

/// Wipe the store and write demo departments plus a year of synthetic emissions ending at `now`.
pub fn run(store: &dyn Store, now: DateTime<Utc>) -> Result<SeedReport, String> {
    let mut rng = SmallRng::seed_from_u64(SEED);

    store.clear().map_err(|e| format!("clearing store failed: {}", e))?;
    info!("Seed: cleared existing departments and emissions");

    let departments: Vec<Department> = DEPARTMENTS
        .iter()
        .map(|(name, description)| Department::new(*name, *description, now))
        .collect();
    let inserted_departments = store
        .insert_departments(&departments)
        .map_err(|e| format!("insert departments failed: {}", e))?;
    info!("Seed: created {} department(s)", inserted_departments);

    let emissions = generate(&mut rng, &departments, now);
    let inserted_emissions = store
        .insert_emissions(&emissions)
        .map_err(|e| format!("insert emissions failed: {}", e))?;
    info!(
        "Seed: complete (departments={}, emissions={})",
        inserted_departments, inserted_emissions
    );

    Ok(SeedReport {
        departments: inserted_departments,
        emissions: inserted_emissions,
    })
}

/// 5 to 10 records for each of the last [`HISTORY_MONTHS`] months, all dated on `now`'s day of month.
pub fn generate(rng: &mut SmallRng, departments: &[Department], now: DateTime<Utc>) -> Vec<EmissionRecord> {
    let today = now.date_naive();
    let mut out = Vec::new();
    if departments.is_empty() {
        return out;
    }

    for months_ago in (0..HISTORY_MONTHS).rev() {
        let Some(date) = shift_back(today, months_ago) else {
            continue;
        };
        let count = rng.random_range(5..=10);
        for _ in 0..count {
            let category = Category::ALL[rng.random_range(0..Category::ALL.len())];
            let subs = subcategories(category);
            let subcategory = subs[rng.random_range(0..subs.len())];
            let department = &departments[rng.random_range(0..departments.len())];
            let value = round2(sample_value(rng, category, subcategory));

            out.push(EmissionRecord::new(
                date,
                category,
                subcategory.to_string(),
                value,
                None,
                department.id.clone(),
                String::new(),
                now,
            ));
        }
    }
    out
}

// clamps to the last day of shorter months
fn shift_back(day: NaiveDate, months: u32) -> Option<NaiveDate> {
    day.checked_sub_months(Months::new(months))
}

fn subcategories(category: Category) -> &'static [&'static str] {
    match category {
        Category::Electricity => &["grid", "solar"],
        Category::Transportation => &["gasoline", "diesel", "electric", "publicTransit"],
        Category::Heating => &["naturalGas", "electric"],
        Category::Waste => &["landfill", "recycled"],
    }
}

fn sample_value(rng: &mut SmallRng, category: Category, subcategory: &str) -> f64 {
    match (category, subcategory) {
        (Category::Electricity, _) => rng.random_range(500.0..2500.0),
        (Category::Transportation, "gasoline" | "diesel") => rng.random_range(50.0..250.0),
        (Category::Transportation, _) => rng.random_range(100.0..600.0),
        (Category::Heating, "naturalGas") => rng.random_range(20.0..100.0),
        (Category::Heating, _) => rng.random_range(200.0..1000.0),
        (Category::Waste, _) => rng.random_range(0.1..1.0),
    }
}
