// Aggregates over the filtered flight list for the price charts
use crate::normalizer::Flight;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_AIRLINE_LIMIT: usize = 8;
pub const DEFAULT_PRICE_BUCKETS: usize = 6;
pub const MAX_AIRLINE_LABEL_CHARS: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirlinePricePoint {
    pub airline: String,
    pub airline_code: String,
    pub min_price: f64,
    pub avg_price: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBucket {
    pub range: String,
    pub count: usize,
    pub min_price: f64,
    pub max_price: f64,
}

// Header line of the result list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub shown: usize,
    pub total: usize,
    pub min_price: f64,
    pub currency: String,
    pub nonstop: usize,
    pub one_stop: usize,
    pub multi_stop: usize,
}

fn airline_label(name: &str) -> String {
    if name.chars().count() > MAX_AIRLINE_LABEL_CHARS {
        let truncated: String = name.chars().take(MAX_AIRLINE_LABEL_CHARS).collect();
        format!("{}...", truncated)
    } else {
        name.to_string()
    }
}

pub fn by_airline(flights: &[Flight], limit: usize) -> Vec<AirlinePricePoint> {
    // (code, display name, prices) in first-seen order
    let mut groups: Vec<(&str, &str, Vec<f64>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for flight in flights {
        match index.get(flight.airline_code.as_str()) {
            Some(&i) => groups[i].2.push(flight.price),
            None => {
                index.insert(flight.airline_code.as_str(), groups.len());
                groups.push((
                    flight.airline_code.as_str(),
                    flight.airline.as_str(),
                    vec![flight.price],
                ));
            }
        }
    }

    let mut points: Vec<AirlinePricePoint> = groups
        .into_iter()
        .map(|(code, name, prices)| {
            let min_price = prices.iter().copied().fold(f64::INFINITY, f64::min);
            let avg_price = (prices.iter().sum::<f64>() / prices.len() as f64).round();
            AirlinePricePoint {
                airline: airline_label(name),
                airline_code: code.to_string(),
                min_price,
                avg_price,
                count: prices.len(),
            }
        })
        .collect();

    points.sort_by(|a, b| a.min_price.total_cmp(&b.min_price));
    points.truncate(limit);
    points
}

// Histogram of prices. Adjacent buckets share their boundary and both count a
// price sitting exactly on it; empty buckets are dropped only before the first
// non-empty one.
pub fn price_histogram(flights: &[Flight], buckets: usize) -> Vec<PriceBucket> {
    if flights.is_empty() || buckets == 0 {
        return Vec::new();
    }

    let prices: Vec<f64> = flights.iter().map(|f| f.price).collect();
    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut width = ((max - min) / buckets as f64).ceil();
    if width <= 0.0 {
        width = 1.0;
    }

    let mut distribution = Vec::new();
    for i in 0..buckets {
        let bucket_min = min + i as f64 * width;
        let bucket_max = if i == buckets - 1 {
            max
        } else {
            min + (i + 1) as f64 * width
        };
        let count = prices
            .iter()
            .filter(|&&p| p >= bucket_min && p <= bucket_max)
            .count();

        if count > 0 || !distribution.is_empty() {
            distribution.push(PriceBucket {
                range: format!("${}-{}", bucket_min.round(), bucket_max.round()),
                count,
                min_price: bucket_min,
                max_price: bucket_max,
            });
        }
    }

    distribution
}

pub fn summarize(filtered: &[Flight], total: usize) -> Option<ResultSummary> {
    let first = filtered.first()?;

    Some(ResultSummary {
        shown: filtered.len(),
        total,
        min_price: filtered.iter().map(|f| f.price).fold(f64::INFINITY, f64::min),
        currency: first.currency.clone(),
        nonstop: filtered.iter().filter(|f| f.stops == 0).count(),
        one_stop: filtered.iter().filter(|f| f.stops == 1).count(),
        multi_stop: filtered.iter().filter(|f| f.stops > 1).count(),
    })
}
