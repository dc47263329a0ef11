// Offer normalization: flattens upstream offers into UI-ready flight records
use crate::format::format_duration;
use crate::offer::{Dictionaries, RawEndpoint, RawOffer, RawSegment};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CABIN: &str = "ECONOMY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub id: String,
    pub price: f64,
    pub currency: String,
    pub airline: String,
    pub airline_code: String,
    pub departure: FlightEndpoint,
    pub arrival: FlightEndpoint,
    pub duration: String,
    pub duration_minutes: u32,
    pub stops: usize,
    pub stop_locations: Vec<String>,
    pub segments: Vec<Segment>,
    pub cabin: String,
    pub seats_available: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightEndpoint {
    pub airport: String,
    // 24-hour "HH:MM"
    pub time: String,
    // "Sat, Jan 20"
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub departure: SegmentEndpoint,
    pub arrival: SegmentEndpoint,
    pub airline: String,
    pub airline_code: String,
    pub flight_number: String,
    pub duration: String,
    pub aircraft: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentEndpoint {
    pub airport: String,
    pub time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<String>,
}

fn leading_number(s: &str) -> (Option<u32>, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return (None, s);
    }
    (Some(s[..end].parse().unwrap_or(u32::MAX)), &s[end..])
}

// Minutes in an ISO-8601 "PT#H#M" duration. Missing parts count as zero and
// anything without a "PT" marker is 0.
pub fn parse_duration(iso: &str) -> u32 {
    let Some(start) = iso.find("PT") else {
        return 0;
    };
    let rest = &iso[start + 2..];

    let mut hours = 0;
    let mut minutes = 0;

    let (number, after) = leading_number(rest);
    match (number, after.chars().next()) {
        (Some(h), Some('H')) => {
            hours = h;
            let (number, after) = leading_number(&after[1..]);
            if let (Some(m), Some('M')) = (number, after.chars().next()) {
                minutes = m;
            }
        }
        (Some(m), Some('M')) => minutes = m,
        _ => {}
    }

    hours.saturating_mul(60).saturating_add(minutes)
}

fn parse_timestamp(at: &str) -> Option<NaiveDateTime> {
    // %.f also accepts a missing fraction
    NaiveDateTime::parse_from_str(at, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(at, "%Y-%m-%dT%H:%M"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(at)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

// Wall-clock time as written by the supplier; unparseable input is passed through
pub fn format_time(at: &str) -> String {
    match parse_timestamp(at) {
        Some(dt) => dt.format("%H:%M").to_string(),
        None => at.to_string(),
    }
}

pub fn format_date(at: &str) -> String {
    match parse_timestamp(at) {
        Some(dt) => dt.format("%a, %b %-d").to_string(),
        None => at.to_string(),
    }
}

fn flight_endpoint(endpoint: Option<&RawEndpoint>) -> FlightEndpoint {
    endpoint
        .map(|e| FlightEndpoint {
            airport: e.iata_code.clone(),
            time: format_time(&e.at),
            date: format_date(&e.at),
        })
        .unwrap_or_default()
}

fn segment_endpoint(endpoint: &RawEndpoint) -> SegmentEndpoint {
    SegmentEndpoint {
        airport: endpoint.iata_code.clone(),
        time: format_time(&endpoint.at),
        terminal: endpoint.terminal.clone(),
    }
}

fn normalize_segment(segment: &RawSegment, dictionaries: &Dictionaries) -> Segment {
    Segment {
        departure: segment_endpoint(&segment.departure),
        arrival: segment_endpoint(&segment.arrival),
        airline: dictionaries.carrier_name(&segment.carrier_code).to_string(),
        airline_code: segment.carrier_code.clone(),
        flight_number: format!("{}{}", segment.carrier_code, segment.number),
        duration: format_duration(parse_duration(&segment.duration)),
        aircraft: dictionaries.aircraft_name(&segment.aircraft.code).to_string(),
    }
}

// Only the outbound (first) itinerary is shown
pub fn normalize(offer: &RawOffer, dictionaries: &Dictionaries) -> Flight {
    let (itinerary_duration, raw_segments): (&str, &[RawSegment]) = match offer.itineraries.first() {
        Some(itinerary) => (&itinerary.duration, &itinerary.segments),
        None => ("", &[]),
    };

    let stops = raw_segments.len().saturating_sub(1);
    let stop_locations = raw_segments
        .iter()
        .take(stops)
        .map(|s| s.arrival.iata_code.clone())
        .collect();

    let cabin = offer
        .traveler_pricings
        .first()
        .and_then(|tp| tp.fare_details_by_segment.first())
        .map(|fd| fd.cabin.as_str())
        .filter(|cabin| !cabin.is_empty())
        .unwrap_or(DEFAULT_CABIN)
        .to_string();

    let main_carrier = offer
        .validating_airline_codes
        .first()
        .filter(|code| !code.is_empty())
        .or_else(|| raw_segments.first().map(|s| &s.carrier_code))
        .cloned()
        .unwrap_or_default();

    let duration_minutes = parse_duration(itinerary_duration);

    Flight {
        id: offer.id.clone(),
        price: offer.price.grand_total.trim().parse().unwrap_or(0.0),
        currency: offer.price.currency.clone(),
        airline: dictionaries.carrier_name(&main_carrier).to_string(),
        airline_code: main_carrier,
        departure: flight_endpoint(raw_segments.first().map(|s| &s.departure)),
        arrival: flight_endpoint(raw_segments.last().map(|s| &s.arrival)),
        duration: format_duration(duration_minutes),
        duration_minutes,
        stops,
        stop_locations,
        segments: raw_segments
            .iter()
            .map(|s| normalize_segment(s, dictionaries))
            .collect(),
        cabin,
        seats_available: offer.number_of_bookable_seats,
    }
}

pub fn normalize_all(offers: &[RawOffer], dictionaries: &Dictionaries) -> Vec<Flight> {
    offers.iter().map(|offer| normalize(offer, dictionaries)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offer::{
        RawAircraft, RawFareDetail, RawItinerary, RawPrice, RawTravelerPricing,
    };
    use test_case::test_case;

    fn raw_segment(from: &str, to: &str, dep: &str, arr: &str, carrier: &str) -> RawSegment {
        RawSegment {
            id: format!("{}-{}", from, to),
            departure: RawEndpoint {
                iata_code: from.to_string(),
                terminal: Some("1".to_string()),
                at: dep.to_string(),
            },
            arrival: RawEndpoint {
                iata_code: to.to_string(),
                terminal: None,
                at: arr.to_string(),
            },
            carrier_code: carrier.to_string(),
            number: "100".to_string(),
            aircraft: RawAircraft {
                code: "738".to_string(),
            },
            duration: "PT2H15M".to_string(),
            number_of_stops: 0,
        }
    }

    fn raw_offer(segments: Vec<RawSegment>, validating: Vec<&str>) -> RawOffer {
        RawOffer {
            id: "42".to_string(),
            number_of_bookable_seats: 4,
            itineraries: vec![RawItinerary {
                duration: "PT7H5M".to_string(),
                segments,
            }],
            price: RawPrice {
                currency: "USD".to_string(),
                total: "312.40".to_string(),
                base: "250.00".to_string(),
                grand_total: "312.40".to_string(),
            },
            validating_airline_codes: validating.into_iter().map(String::from).collect(),
            traveler_pricings: vec![RawTravelerPricing {
                traveler_id: "1".to_string(),
                traveler_type: "ADULT".to_string(),
                fare_details_by_segment: vec![RawFareDetail {
                    segment_id: "1".to_string(),
                    cabin: "BUSINESS".to_string(),
                    fare_basis: "J".to_string(),
                    class: "J".to_string(),
                }],
            }],
        }
    }

    fn dictionaries() -> Dictionaries {
        let mut d = Dictionaries::default();
        d.carriers.insert("UA".to_string(), "UNITED AIRLINES".to_string());
        d.aircraft.insert("738".to_string(), "BOEING 737-800".to_string());
        d
    }

    #[test_case("PT2H30M", 150; "hours and minutes")]
    #[test_case("PT45M", 45; "minutes only")]
    #[test_case("PT3H", 180; "hours only")]
    #[test_case("PT0M", 0; "zero minutes")]
    #[test_case("PT", 0; "empty body")]
    #[test_case("P1D", 0; "no time part")]
    #[test_case("garbage", 0; "unmatched")]
    #[test_case("", 0; "empty string")]
    fn test_parse_duration(input: &str, expected: u32) {
        assert_eq!(parse_duration(input), expected);
    }

    #[test]
    fn test_format_time_and_date() {
        assert_eq!(format_time("2024-01-20T08:05:00"), "08:05");
        assert_eq!(format_time("2024-01-20T23:59:59"), "23:59");
        assert_eq!(format_time("2024-01-20T17:40:00+02:00"), "17:40");
        assert_eq!(format_date("2024-01-20T08:05:00"), "Sat, Jan 20");
        assert_eq!(format_time("not a time"), "not a time");
    }

    #[test_case("2024-01-20T08:00:00.000", "08:00"; "milliseconds")]
    #[test_case("2024-01-20T21:15:30.123456", "21:15"; "microseconds")]
    #[test_case("2024-01-20T06:45", "06:45"; "no seconds")]
    fn test_format_time_accepts_fractional_seconds(at: &str, expected: &str) {
        assert_eq!(format_time(at), expected);
        assert_eq!(format_date(at), "Sat, Jan 20");
    }

    #[test]
    fn test_fractional_seconds_sort_by_clock_time() {
        let mut late = raw_offer(
            vec![raw_segment("JFK", "LAX", "2024-01-20T18:30:00.000", "2024-01-20T21:45:00.000", "UA")],
            vec!["UA"],
        );
        late.id = "late".to_string();
        let mut early = raw_offer(
            vec![raw_segment("JFK", "LAX", "2024-01-20T07:10:00.500", "2024-01-20T10:25:00.000", "UA")],
            vec!["UA"],
        );
        early.id = "early".to_string();

        let mut flights = normalize_all(&[late, early], &dictionaries());
        crate::filters::sort_flights(&mut flights, crate::filters::SortBy::Departure);

        let ids: Vec<&str> = flights.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert_eq!(flights[0].departure.time, "07:10");
        assert_eq!(flights[1].arrival.time, "21:45");
    }

    #[test]
    fn test_normalize_connecting_offer() {
        let offer = raw_offer(
            vec![
                raw_segment("JFK", "ORD", "2024-01-20T08:00:00", "2024-01-20T10:00:00", "UA"),
                raw_segment("ORD", "DEN", "2024-01-20T11:00:00", "2024-01-20T12:30:00", "UA"),
                raw_segment("DEN", "LAX", "2024-01-20T13:30:00", "2024-01-20T15:05:00", "AA"),
            ],
            vec!["UA"],
        );

        let flight = normalize(&offer, &dictionaries());

        assert_eq!(flight.id, "42");
        assert_eq!(flight.price, 312.40);
        assert_eq!(flight.currency, "USD");
        assert_eq!(flight.airline, "UNITED AIRLINES");
        assert_eq!(flight.airline_code, "UA");
        assert_eq!(flight.stops, 2);
        assert_eq!(flight.stop_locations, vec!["ORD", "DEN"]);
        assert_eq!(flight.stops, flight.segments.len() - 1);
        assert_eq!(flight.departure.airport, "JFK");
        assert_eq!(flight.departure.time, "08:00");
        assert_eq!(flight.arrival.airport, "LAX");
        assert_eq!(flight.arrival.time, "15:05");
        assert_eq!(flight.duration_minutes, 425);
        assert_eq!(flight.duration, "7h 5m");
        assert_eq!(flight.cabin, "BUSINESS");
        assert_eq!(flight.seats_available, 4);

        let last = &flight.segments[2];
        assert_eq!(last.flight_number, "AA100");
        // AA is missing from the dictionary
        assert_eq!(last.airline, "AA");
        assert_eq!(last.aircraft, "BOEING 737-800");
        assert_eq!(last.duration, "2h 15m");
        assert_eq!(flight.segments[0].departure.terminal.as_deref(), Some("1"));
    }

    #[test]
    fn test_main_carrier_falls_back_to_first_segment() {
        let offer = raw_offer(
            vec![raw_segment("JFK", "LAX", "2024-01-20T08:00:00", "2024-01-20T11:00:00", "B6")],
            vec![],
        );

        let flight = normalize(&offer, &dictionaries());
        assert_eq!(flight.airline_code, "B6");
        assert_eq!(flight.airline, "B6");
        assert_eq!(flight.stops, 0);
        assert!(flight.stop_locations.is_empty());
    }

    #[test]
    fn test_defaults_for_missing_pricing_details() {
        let mut offer = raw_offer(
            vec![raw_segment("JFK", "LAX", "2024-01-20T08:00:00", "2024-01-20T11:00:00", "UA")],
            vec!["UA"],
        );
        offer.traveler_pricings.clear();
        offer.price.grand_total = "n/a".to_string();
        offer.itineraries[0].duration = "bogus".to_string();

        let flight = normalize(&offer, &dictionaries());
        assert_eq!(flight.cabin, DEFAULT_CABIN);
        assert_eq!(flight.price, 0.0);
        assert_eq!(flight.duration_minutes, 0);
        assert_eq!(flight.duration, "0m");
    }

    #[test]
    fn test_normalize_all_preserves_order() {
        let mut first = raw_offer(
            vec![raw_segment("JFK", "LAX", "2024-01-20T08:00:00", "2024-01-20T11:00:00", "UA")],
            vec!["UA"],
        );
        first.id = "b".to_string();
        let mut second = first.clone();
        second.id = "a".to_string();

        let flights = normalize_all(&[first, second], &dictionaries());
        let ids: Vec<&str> = flights.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_stop_invariants_hold_for_every_length() {
        for count in 1..=4 {
            let segments = (0..count)
                .map(|i| {
                    raw_segment(
                        &format!("A{}", i),
                        &format!("A{}", i + 1),
                        "2024-01-20T08:00:00",
                        "2024-01-20T09:00:00",
                        "UA",
                    )
                })
                .collect();
            let flight = normalize(&raw_offer(segments, vec!["UA"]), &dictionaries());
            assert_eq!(flight.stops, flight.segments.len() - 1);
            assert_eq!(flight.stop_locations.len(), flight.stops);
        }
    }
}
