//! EPA emission factors (lbs CO2 per unit of consumption) and the calculator built on them.
//!
//! The table is compiled in; stored records copy the factor at write time, so
//! editing these constants never changes existing rows.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::models::emission::Category;
use crate::utils::round2;

pub const LBS_TO_KG: f64 = 0.453592;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct FactorEntry {
    pub factor: f64,
    pub unit: &'static str,
    pub name: &'static str,
}

const fn entry(factor: f64, unit: &'static str, name: &'static str) -> FactorEntry {
    FactorEntry { factor, unit, name }
}

const ELECTRICITY: &[(&str, FactorEntry)] = &[
    ("grid", entry(0.92, "kWh", "Grid Electricity")),
    ("solar", entry(0.0, "kWh", "Solar Energy")),
    ("wind", entry(0.0, "kWh", "Wind Energy")),
];

const TRANSPORTATION: &[(&str, FactorEntry)] = &[
    ("gasoline", entry(19.6, "gallon", "Gasoline Vehicle")),
    ("diesel", entry(22.4, "gallon", "Diesel Vehicle")),
    ("electric", entry(0.36, "mile", "Electric Vehicle")),
    ("hybrid", entry(0.5, "mile", "Hybrid Vehicle")),
    ("publicTransit", entry(0.14, "mile", "Public Transit")),
    ("flight", entry(0.4, "mile", "Air Travel")),
];

const HEATING: &[(&str, FactorEntry)] = &[
    ("naturalGas", entry(117.0, "therm", "Natural Gas")),
    ("heatingOil", entry(22.4, "gallon", "Heating Oil")),
    ("propane", entry(12.7, "gallon", "Propane")),
    ("electric", entry(3.412, "kWh", "Electric Heating")),
];

const WASTE: &[(&str, FactorEntry)] = &[
    ("landfill", entry(2072.0, "ton", "Landfill Waste")),
    ("recycled", entry(0.0, "ton", "Recycled")),
    ("composted", entry(0.0, "ton", "Composted")),
];

/// Subcategories known for `category`, in display order.
pub fn entries(category: Category) -> &'static [(&'static str, FactorEntry)] {
    match category {
        Category::Electricity => ELECTRICITY,
        Category::Transportation => TRANSPORTATION,
        Category::Heating => HEATING,
        Category::Waste => WASTE,
    }
}

pub fn lookup(category: Category, subcategory: &str) -> Option<&'static FactorEntry> {
    entries(category)
        .iter()
        .find(|(key, _)| *key == subcategory)
        .map(|(_, e)| e)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calculation {
    pub co2_lbs: f64,
    pub co2_kg: f64,
    pub factor: f64,
    pub unit: &'static str,
}

/// Convert a consumption quantity into CO2e.
///
/// Unknown subcategories fall back to a zero factor and an empty unit instead of failing.
pub fn calculate(category: Category, subcategory: &str, quantity: f64) -> Calculation {
    let (factor, unit) = match lookup(category, subcategory) {
        Some(e) => (e.factor, e.unit),
        None => (0.0, ""),
    };
    let co2_lbs = round2(quantity * factor);
    let co2_kg = round2(co2_lbs * LBS_TO_KG);
    Calculation {
        co2_lbs,
        co2_kg,
        factor,
        unit,
    }
}

/// Serializes the whole table as `{category: {subcategory: {factor, unit, name}}}` in declaration order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FactorTable;

struct CategoryEntries(Category);

impl Serialize for CategoryEntries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let list = entries(self.0);
        let mut map = serializer.serialize_map(Some(list.len()))?;
        for (key, e) in list {
            map.serialize_entry(key, e)?;
        }
        map.end()
    }
}

impl Serialize for FactorTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Category::ALL.len()))?;
        for category in Category::ALL {
            map.serialize_entry(category.as_str(), &CategoryEntries(category))?;
        }
        map.end()
    }
}
