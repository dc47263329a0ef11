// Filter facets derived from the current result set
use crate::format::stops_label;
use crate::normalizer::Flight;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const EMPTY_PRICE_RANGE: PriceRange = PriceRange {
    min: 0.0,
    max: 1000.0,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopsOption {
    pub value: usize,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirlineOption {
    pub code: String,
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub stops_options: Vec<StopsOption>,
    pub price_range: PriceRange,
    pub airlines: Vec<AirlineOption>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            stops_options: Vec::new(),
            price_range: EMPTY_PRICE_RANGE,
            airlines: Vec::new(),
        }
    }
}

// Single pass over the flights. Price bounds are widened to whole units so a
// slider built from them covers every fare.
pub fn derive_facets(flights: &[Flight], carrier_names: &HashMap<String, String>) -> FilterOptions {
    let mut stop_counts: BTreeMap<usize, usize> = BTreeMap::new();
    // (code, count) in first-seen order
    let mut airline_counts: Vec<(&str, usize)> = Vec::new();
    let mut airline_index: HashMap<&str, usize> = HashMap::new();
    let mut observed: Option<(f64, f64)> = None;

    for flight in flights {
        *stop_counts.entry(flight.stops).or_insert(0) += 1;

        let code = flight.airline_code.as_str();
        match airline_index.get(code) {
            Some(&i) => airline_counts[i].1 += 1,
            None => {
                airline_index.insert(code, airline_counts.len());
                airline_counts.push((code, 1));
            }
        }

        observed = Some(match observed {
            Some((min, max)) => (min.min(flight.price), max.max(flight.price)),
            None => (flight.price, flight.price),
        });
    }

    let stops_options = stop_counts
        .into_iter()
        .map(|(value, count)| StopsOption {
            value,
            label: stops_label(value),
            count,
        })
        .collect();

    let mut airlines: Vec<AirlineOption> = airline_counts
        .into_iter()
        .map(|(code, count)| AirlineOption {
            code: code.to_string(),
            name: carrier_names
                .get(code)
                .cloned()
                .unwrap_or_else(|| code.to_string()),
            count,
        })
        .collect();
    airlines.sort_by(|a, b| b.count.cmp(&a.count));

    let price_range = observed
        .map(|(min, max)| PriceRange {
            min: min.floor(),
            max: max.ceil(),
        })
        .unwrap_or(EMPTY_PRICE_RANGE);

    FilterOptions {
        stops_options,
        price_range,
        airlines,
    }
}
