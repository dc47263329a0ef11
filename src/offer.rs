use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Data structures for the upstream flight-offer search response
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OfferSearchResponse {
    pub data: Vec<RawOffer>,
    pub dictionaries: Dictionaries,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawOffer {
    pub id: String,
    pub number_of_bookable_seats: u32,
    pub itineraries: Vec<RawItinerary>,
    pub price: RawPrice,
    pub validating_airline_codes: Vec<String>,
    pub traveler_pricings: Vec<RawTravelerPricing>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawItinerary {
    pub duration: String,
    pub segments: Vec<RawSegment>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawSegment {
    pub id: String,
    pub departure: RawEndpoint,
    pub arrival: RawEndpoint,
    pub carrier_code: String,
    pub number: String,
    pub aircraft: RawAircraft,
    pub duration: String,
    pub number_of_stops: u32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawEndpoint {
    pub iata_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<String>,
    // Local date-time as sent by the supplier, e.g. "2024-01-20T08:00:00"
    pub at: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RawAircraft {
    pub code: String,
}

// Amounts are decimal strings on the wire
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawPrice {
    pub currency: String,
    pub total: String,
    pub base: String,
    pub grand_total: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawTravelerPricing {
    pub traveler_id: String,
    pub traveler_type: String,
    pub fare_details_by_segment: Vec<RawFareDetail>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawFareDetail {
    pub segment_id: String,
    pub cabin: String,
    pub fare_basis: String,
    pub class: String,
}

// Display-name lookups. Only a subset of referenced codes may be present.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Dictionaries {
    pub carriers: HashMap<String, String>,
    pub aircraft: HashMap<String, String>,
    pub currencies: HashMap<String, String>,
}

impl Dictionaries {
    pub fn carrier_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.carriers.get(code).map(String::as_str).unwrap_or(code)
    }

    pub fn aircraft_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.aircraft.get(code).map(String::as_str).unwrap_or(code)
    }
}
