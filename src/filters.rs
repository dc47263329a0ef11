// Client-side filtering: predicate filters, quick filters and sort order
use crate::normalizer::Flight;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const CHEAPEST_PRICE_FACTOR: f64 = 1.1;
pub const FASTEST_DURATION_SLACK_MINUTES: u32 = 30;
pub const BEST_PRICE_WEIGHT: f64 = 0.6;
pub const BEST_DURATION_WEIGHT: f64 = 0.4;
pub const BEST_MIN_RESULTS: usize = 5;
pub const BEST_KEEP_RATIO: f64 = 0.3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind}: {value}")]
pub struct ParseFilterError {
    kind: &'static str,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Price,
    Duration,
    Departure,
    Arrival,
}

impl FromStr for SortBy {
    type Err = ParseFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "price" => Ok(SortBy::Price),
            "duration" => Ok(SortBy::Duration),
            "departure" => Ok(SortBy::Departure),
            "arrival" => Ok(SortBy::Arrival),
            _ => Err(ParseFilterError {
                kind: "sort order",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SortBy::Price => "price",
            SortBy::Duration => "duration",
            SortBy::Departure => "departure",
            SortBy::Arrival => "arrival",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuickFilter {
    #[default]
    All,
    Cheapest,
    Fastest,
    Best,
}

impl FromStr for QuickFilter {
    type Err = ParseFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(QuickFilter::All),
            "cheapest" => Ok(QuickFilter::Cheapest),
            "fastest" => Ok(QuickFilter::Fastest),
            "best" => Ok(QuickFilter::Best),
            _ => Err(ParseFilterError {
                kind: "quick filter",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for QuickFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QuickFilter::All => "all",
            QuickFilter::Cheapest => "cheapest",
            QuickFilter::Fastest => "fastest",
            QuickFilter::Best => "best",
        };
        f.write_str(label)
    }
}

// User filter selection for one search session. Empty sets and a missing
// price range mean "no restriction".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterState {
    pub stops: BTreeSet<usize>,
    pub price_range: Option<(f64, f64)>,
    pub airlines: BTreeSet<String>,
    pub sort_by: SortBy,
    pub quick_filter: QuickFilter,
}

// Discrete edits the UI layer can make to a FilterState
#[derive(Debug, Clone, PartialEq)]
pub enum FilterUpdate {
    SetStops(BTreeSet<usize>),
    ToggleStop(usize),
    SetPriceRange(Option<(f64, f64)>),
    SetAirlines(BTreeSet<String>),
    ToggleAirline(String),
    SetSortBy(SortBy),
    SetQuickFilter(QuickFilter),
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_update(&mut self, update: FilterUpdate) {
        match update {
            FilterUpdate::SetStops(stops) => self.stops = stops,
            FilterUpdate::ToggleStop(stops) => self.toggle_stop(stops),
            FilterUpdate::SetPriceRange(range) => self.set_price_range(range),
            FilterUpdate::SetAirlines(codes) => self.airlines = codes,
            FilterUpdate::ToggleAirline(code) => self.toggle_airline(code),
            FilterUpdate::SetSortBy(sort_by) => self.sort_by = sort_by,
            FilterUpdate::SetQuickFilter(quick_filter) => self.quick_filter = quick_filter,
        }
    }

    pub fn toggle_stop(&mut self, stops: usize) {
        if !self.stops.remove(&stops) {
            self.stops.insert(stops);
        }
    }

    pub fn toggle_airline(&mut self, code: String) {
        if !self.airlines.remove(&code) {
            self.airlines.insert(code);
        }
    }

    // Bounds given in the wrong order are swapped
    pub fn set_price_range(&mut self, range: Option<(f64, f64)>) {
        self.price_range = range.map(|(a, b)| if a <= b { (a, b) } else { (b, a) });
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // Sort order and quick filter are presentation choices, not restrictions
    pub fn has_active_filters(&self) -> bool {
        !self.stops.is_empty() || self.price_range.is_some() || !self.airlines.is_empty()
    }

    pub fn matches(&self, flight: &Flight) -> bool {
        if !self.stops.is_empty() && !self.stops.contains(&flight.stops) {
            return false;
        }

        if !self
            .price_range
            .map_or(true, |(min, max)| flight.price >= min && flight.price <= max)
        {
            return false;
        }

        if !self.airlines.is_empty() && !self.airlines.contains(&flight.airline_code) {
            return false;
        }

        true
    }
}

// Full pipeline: predicate filter, then quick filter, then a stable sort
pub fn apply_filters(flights: &[Flight], state: &FilterState) -> Vec<Flight> {
    let matching: Vec<Flight> = flights
        .iter()
        .filter(|flight| state.matches(flight))
        .cloned()
        .collect();

    let mut narrowed = apply_quick_filter(matching, state.quick_filter);
    sort_flights(&mut narrowed, state.sort_by);
    narrowed
}

// Narrows the candidate list without reordering it
pub fn apply_quick_filter(flights: Vec<Flight>, quick_filter: QuickFilter) -> Vec<Flight> {
    if flights.is_empty() {
        return flights;
    }

    match quick_filter {
        QuickFilter::All => flights,
        QuickFilter::Cheapest => {
            let min_price = flights.iter().map(|f| f.price).fold(f64::INFINITY, f64::min);
            let threshold = min_price * CHEAPEST_PRICE_FACTOR;
            flights.into_iter().filter(|f| f.price <= threshold).collect()
        }
        QuickFilter::Fastest => {
            let min_duration = flights.iter().map(|f| f.duration_minutes).min().unwrap_or(0);
            let threshold = min_duration.saturating_add(FASTEST_DURATION_SLACK_MINUTES);
            flights
                .into_iter()
                .filter(|f| f.duration_minutes <= threshold)
                .collect()
        }
        QuickFilter::Best => keep_best_value(flights),
    }
}

fn normalized(value: f64, min: f64, max: f64) -> f64 {
    let range = if max == min { 1.0 } else { max - min };
    (value - min) / range
}

pub fn best_value_scores(flights: &[Flight]) -> Vec<f64> {
    let (min_price, max_price) = flights
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), f| {
            (lo.min(f.price), hi.max(f.price))
        });
    let (min_duration, max_duration) = flights
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), f| {
            let d = f.duration_minutes as f64;
            (lo.min(d), hi.max(d))
        });

    flights
        .iter()
        .map(|f| {
            BEST_PRICE_WEIGHT * normalized(f.price, min_price, max_price)
                + BEST_DURATION_WEIGHT
                    * normalized(f.duration_minutes as f64, min_duration, max_duration)
        })
        .collect()
}

pub fn best_value_keep_count(candidates: usize) -> usize {
    let by_ratio = (BEST_KEEP_RATIO * candidates as f64).ceil() as usize;
    BEST_MIN_RESULTS.max(by_ratio)
}

fn keep_best_value(flights: Vec<Flight>) -> Vec<Flight> {
    let scores = best_value_scores(&flights);

    let mut ranked: Vec<usize> = (0..flights.len()).collect();
    ranked.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    ranked.truncate(best_value_keep_count(flights.len()));

    let mut keep = vec![false; flights.len()];
    for index in ranked {
        keep[index] = true;
    }

    flights
        .into_iter()
        .zip(keep)
        .filter_map(|(flight, kept)| kept.then_some(flight))
        .collect()
}

// Departure/arrival compare the "HH:MM" strings, so itineraries spanning
// several days are only ordered by clock time.
fn compare(a: &Flight, b: &Flight, sort_by: SortBy) -> Ordering {
    match sort_by {
        SortBy::Price => a.price.total_cmp(&b.price),
        SortBy::Duration => a.duration_minutes.cmp(&b.duration_minutes),
        SortBy::Departure => a.departure.time.cmp(&b.departure.time),
        SortBy::Arrival => a.arrival.time.cmp(&b.arrival.time),
    }
}

pub fn sort_flights(flights: &mut [Flight], sort_by: SortBy) {
    flights.sort_by(|a, b| compare(a, b, sort_by));
}


#[cfg(test)]
mod tests {
    use super::test_support::{flight, with_times};
    use super::*;
    use test_case::test_case;

    fn sample_flights() -> Vec<Flight> {
        let mut delta = with_times(flight("1", 200.0, "DL", 300, 0), "08:00", "11:00");
        delta.airline = "Delta".to_string();
        let mut united = with_times(flight("2", 150.0, "UA", 390, 1), "10:00", "14:30");
        united.airline = "United".to_string();
        let mut american = with_times(flight("3", 350.0, "AA", 300, 0), "06:00", "09:00");
        american.airline = "American".to_string();
        vec![delta, united, american]
    }

    fn ids(flights: &[Flight]) -> Vec<&str> {
        flights.iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn test_default_state_returns_everything_sorted_by_price() {
        let result = apply_filters(&sample_flights(), &FilterState::default());
        assert_eq!(ids(&result), vec!["2", "1", "3"]);
    }

    #[test_case(FilterState { stops: BTreeSet::from([0]), ..Default::default() },
        vec!["1", "3"]; "#1 nonstop only")]
    #[test_case(FilterState { stops: BTreeSet::from([1]), ..Default::default() },
        vec!["2"]; "#2 one stop only")]
    #[test_case(FilterState { price_range: Some((100.0, 250.0)), ..Default::default() },
        vec!["2", "1"]; "#3 price range inclusive")]
    #[test_case(FilterState { price_range: Some((150.0, 200.0)), ..Default::default() },
        vec!["2", "1"]; "#4 price range bounds are inclusive")]
    #[test_case(FilterState { airlines: BTreeSet::from(["DL".to_string()]), ..Default::default() },
        vec!["1"]; "#5 single airline")]
    #[test_case(FilterState { airlines: BTreeSet::from(["DL".to_string(), "UA".to_string()]), ..Default::default() },
        vec!["2", "1"]; "#6 multiple airlines")]
    #[test_case(FilterState { stops: BTreeSet::from([0]), airlines: BTreeSet::from(["UA".to_string()]), ..Default::default() },
        vec![]; "#7 combination excluding everything")]
    #[test_case(FilterState { stops: BTreeSet::from([0]), price_range: Some((0.0, 300.0)), ..Default::default() },
        vec!["1"]; "#8 stops and price combined")]
    fn test_predicate_filters(state: FilterState, expected: Vec<&str>) {
        let result = apply_filters(&sample_flights(), &state);
        assert_eq!(ids(&result), expected);
    }

    #[test_case(SortBy::Price, vec!["2", "1", "3"]; "by price")]
    #[test_case(SortBy::Duration, vec!["1", "3", "2"]; "by duration stable on ties")]
    #[test_case(SortBy::Departure, vec!["3", "1", "2"]; "by departure time")]
    #[test_case(SortBy::Arrival, vec!["3", "1", "2"]; "by arrival time")]
    fn test_sorting(sort_by: SortBy, expected: Vec<&str>) {
        let state = FilterState {
            sort_by,
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&sample_flights(), &state)), expected);
    }

    #[test]
    fn test_cheapest_keeps_flights_within_ten_percent() {
        let state = FilterState {
            quick_filter: QuickFilter::Cheapest,
            ..Default::default()
        };
        // 150 * 1.1 = 165
        let result = apply_filters(&sample_flights(), &state);
        assert_eq!(ids(&result), vec!["2"]);
    }

    #[test]
    fn test_fastest_keeps_flights_within_thirty_minutes() {
        let state = FilterState {
            quick_filter: QuickFilter::Fastest,
            ..Default::default()
        };
        // 300 + 30 = 330
        let result = apply_filters(&sample_flights(), &state);
        assert_eq!(ids(&result), vec!["1", "3"]);
    }

    #[test]
    fn test_quick_filter_runs_after_predicates() {
        let state = FilterState {
            stops: BTreeSet::from([0]),
            quick_filter: QuickFilter::Cheapest,
            ..Default::default()
        };
        // Cheapest nonstop is 200, so 350 falls outside 220
        assert_eq!(ids(&apply_filters(&sample_flights(), &state)), vec!["1"]);
    }

    #[test]
    fn test_quick_filters_on_empty_input() {
        for quick_filter in [
            QuickFilter::All,
            QuickFilter::Cheapest,
            QuickFilter::Fastest,
            QuickFilter::Best,
        ] {
            assert!(apply_quick_filter(Vec::new(), quick_filter).is_empty());
        }
    }

    #[test]
    fn test_best_keeps_at_least_five() {
        let flights: Vec<Flight> = (0..8)
            .map(|i| flight(&i.to_string(), 100.0 + i as f64 * 10.0, "DL", 300 + i * 10, 0))
            .collect();

        let kept = apply_quick_filter(flights, QuickFilter::Best);
        // Scores grow with the index, so the five lowest win
        assert_eq!(ids(&kept), vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_best_keeps_thirty_percent_of_large_lists() {
        let flights: Vec<Flight> = (0..40)
            .map(|i| flight(&i.to_string(), 500.0 - i as f64, "DL", 300, 0))
            .collect();

        let kept = apply_quick_filter(flights, QuickFilter::Best);
        assert_eq!(kept.len(), 12);
        // Narrowing keeps the input order; the cheapest twelve are the last ones
        assert_eq!(kept.first().map(|f| f.id.as_str()), Some("28"));
        assert_eq!(kept.last().map(|f| f.id.as_str()), Some("39"));
    }

    #[test]
    fn test_best_score_weights_price_over_duration() {
        let flights = vec![
            flight("cheap-slow", 100.0, "DL", 600, 1),
            flight("pricey-fast", 300.0, "DL", 300, 0),
        ];
        let scores = best_value_scores(&flights);
        assert!((scores[0] - 0.4).abs() < 1e-9);
        assert!((scores[1] - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_best_score_with_identical_values() {
        let flights = vec![flight("a", 100.0, "DL", 300, 0), flight("b", 100.0, "UA", 300, 0)];
        assert_eq!(best_value_scores(&flights), vec![0.0, 0.0]);
    }

    #[test_case(1, 5; "tiny list")]
    #[test_case(16, 5; "ratio below minimum")]
    #[test_case(17, 6; "ratio rounds up")]
    #[test_case(50, 15; "full page")]
    fn test_best_value_keep_count(candidates: usize, expected: usize) {
        assert_eq!(best_value_keep_count(candidates), expected);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let state = FilterState {
            quick_filter: QuickFilter::Best,
            sort_by: SortBy::Duration,
            ..Default::default()
        };
        let flights = sample_flights();
        assert_eq!(apply_filters(&flights, &state), apply_filters(&flights, &state));
    }

    #[test]
    fn test_unrestricted_state_is_a_permutation() {
        let flights = sample_flights();
        for sort_by in [SortBy::Price, SortBy::Duration, SortBy::Departure, SortBy::Arrival] {
            let state = FilterState {
                sort_by,
                ..Default::default()
            };
            let mut result = ids(&apply_filters(&flights, &state))
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>();
            result.sort();
            assert_eq!(result, vec!["1", "2", "3"]);
        }
    }

    #[test]
    fn test_filter_updates() {
        let mut state = FilterState::new();
        assert!(!state.has_active_filters());

        state.apply_update(FilterUpdate::ToggleStop(0));
        state.apply_update(FilterUpdate::ToggleAirline("DL".to_string()));
        state.apply_update(FilterUpdate::SetPriceRange(Some((400.0, 100.0))));
        assert_eq!(state.stops, BTreeSet::from([0]));
        assert_eq!(state.price_range, Some((100.0, 400.0)));
        assert!(state.has_active_filters());

        state.apply_update(FilterUpdate::ToggleStop(0));
        state.apply_update(FilterUpdate::ToggleAirline("DL".to_string()));
        state.apply_update(FilterUpdate::SetPriceRange(None));
        state.apply_update(FilterUpdate::SetSortBy(SortBy::Arrival));
        state.apply_update(FilterUpdate::SetQuickFilter(QuickFilter::Fastest));
        assert!(!state.has_active_filters());

        state.reset();
        assert_eq!(state, FilterState::default());
    }

    #[test]
    fn test_parse_sort_and_quick_filter() {
        assert_eq!("Departure".parse::<SortBy>(), Ok(SortBy::Departure));
        assert_eq!("best".parse::<QuickFilter>(), Ok(QuickFilter::Best));
        assert!("cheap".parse::<QuickFilter>().is_err());
        assert_eq!(SortBy::Arrival.to_string(), "arrival");
    }
}
