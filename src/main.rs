use anyhow::{anyhow, Context, Result};
use clap::Parser;
use flight_search::charts::{AirlinePricePoint, PriceBucket, ResultSummary};
use flight_search::client::{AmadeusClient, SearchParams, TravelClass};
use flight_search::config::AppConfig;
use flight_search::facets::FilterOptions;
use flight_search::filters::{FilterUpdate, QuickFilter, SortBy};
use flight_search::format::{add_days, format_price, stops_label};
use flight_search::history::SearchHistory;
use flight_search::normalizer::Flight;
use flight_search::orchestrator::{SearchOrchestrator, SearchStatus};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Search flight offers and print the filtered results with price charts
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Origin airport IATA code, e.g. JFK
    origin: String,

    /// Destination airport IATA code, e.g. LAX
    destination: String,

    /// Departure date (YYYY-MM-DD)
    date: String,

    /// Return date (YYYY-MM-DD) for a round trip
    #[arg(long, conflicts_with = "return_in")]
    return_date: Option<String>,

    /// Return this many days after departure
    #[arg(long)]
    return_in: Option<i64>,

    #[arg(long, default_value_t = 1)]
    adults: u32,

    /// ECONOMY, PREMIUM_ECONOMY, BUSINESS or FIRST
    #[arg(long = "class")]
    travel_class: Option<TravelClass>,

    /// Ask the upstream API for nonstop flights only
    #[arg(long)]
    non_stop: bool,

    /// Upper price bound sent with the search
    #[arg(long)]
    max_price: Option<u32>,

    /// price, duration, departure or arrival
    #[arg(long, default_value = "price")]
    sort: SortBy,

    /// all, cheapest, fastest or best
    #[arg(long, default_value = "all")]
    quick: QuickFilter,

    /// Only show these stop counts (repeatable or comma separated)
    #[arg(long, value_delimiter = ',')]
    stops: Vec<usize>,

    /// Only show these airline codes (repeatable or comma separated)
    #[arg(long, value_delimiter = ',')]
    airline: Vec<String>,

    /// Only show fares within MIN,MAX
    #[arg(long, value_delimiter = ',', num_args = 2)]
    price_range: Option<Vec<f64>>,

    /// Settings file (defaults to ./flight_search.toml or .json when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: Option<ResultSummary>,
    filter_options: &'a FilterOptions,
    by_airline: Vec<AirlinePricePoint>,
    price_histogram: Vec<PriceBucket>,
    flights: Vec<Flight>,
}

fn search_params(args: &Args) -> Result<SearchParams> {
    let mut params = SearchParams::new(
        &args.origin.to_uppercase(),
        &args.destination.to_uppercase(),
        &args.date,
        args.adults,
    );

    params.return_date = match (&args.return_date, args.return_in) {
        (Some(date), _) => Some(date.clone()),
        (None, Some(days)) => Some(
            add_days(&args.date, days)
                .ok_or_else(|| anyhow!("cannot compute a return date from '{}'", args.date))?,
        ),
        (None, None) => None,
    };
    params.travel_class = args.travel_class;
    params.non_stop = args.non_stop;
    params.max_price = args.max_price;

    Ok(params)
}

fn filter_updates(args: &Args) -> Vec<FilterUpdate> {
    let mut updates = vec![
        FilterUpdate::SetSortBy(args.sort),
        FilterUpdate::SetQuickFilter(args.quick),
    ];

    if !args.stops.is_empty() {
        updates.push(FilterUpdate::SetStops(args.stops.iter().copied().collect()));
    }
    if !args.airline.is_empty() {
        let codes: BTreeSet<String> = args.airline.iter().map(|c| c.to_uppercase()).collect();
        updates.push(FilterUpdate::SetAirlines(codes));
    }
    if let Some([min, max]) = args.price_range.as_deref() {
        updates.push(FilterUpdate::SetPriceRange(Some((*min, *max))));
    }

    updates
}

fn print_flight(flight: &Flight) {
    let via = if flight.stop_locations.is_empty() {
        String::new()
    } else {
        format!(" via {}", flight.stop_locations.join(", "))
    };

    println!(
        "{} {} -> {} {}  {:<20} {:>7}  {}{}  {}",
        flight.departure.time,
        flight.departure.airport,
        flight.arrival.time,
        flight.arrival.airport,
        format!("{} ({})", flight.airline, flight.airline_code),
        flight.duration,
        stops_label(flight.stops),
        via,
        format_price(flight.price, &flight.currency),
    );
}

fn print_report(orchestrator: &SearchOrchestrator) {
    let visible = orchestrator.visible_flights();

    let summary = match orchestrator.summary() {
        Some(summary) => summary,
        None => {
            println!(
                "No flights match ({} found before filtering)",
                orchestrator.flights().len()
            );
            return;
        }
    };

    println!(
        "Showing {} of {} flights from {}  ({} nonstop, {} with 1 stop, {} with 2+ stops)",
        summary.shown,
        summary.total,
        format_price(summary.min_price, &summary.currency),
        summary.nonstop,
        summary.one_stop,
        summary.multi_stop,
    );
    println!();

    for flight in &visible {
        print_flight(flight);
    }

    println!();
    println!("Lowest fare by airline:");
    for point in orchestrator.chart_by_airline() {
        println!(
            "  {:<18} {:>8}  avg {:>8}  ({} flights)",
            point.airline,
            format_price(point.min_price, &summary.currency),
            format_price(point.avg_price, &summary.currency),
            point.count,
        );
    }

    println!();
    println!("Price distribution:");
    for bucket in orchestrator.price_histogram() {
        println!("  {:<14} {}", bucket.range, "#".repeat(bucket.count));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    let config = AppConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    debug!("Using API at {}", config.base_url);

    let client = AmadeusClient::new(config.client_config())?;
    let mut orchestrator = SearchOrchestrator::new(Arc::new(client));
    if let Some(path) = config.history_path() {
        orchestrator = orchestrator.with_history(Arc::new(SearchHistory::open(path)));
    }

    let params = search_params(&args)?;
    if let SearchStatus::Failed(message) = orchestrator.search(params).await {
        return Err(anyhow!(message.clone()));
    }

    for update in filter_updates(&args) {
        orchestrator.update_filter(update);
    }
    info!(
        "{} of {} flights after filtering",
        orchestrator.visible_flights().len(),
        orchestrator.flights().len()
    );

    if args.json {
        let report = JsonReport {
            summary: orchestrator.summary(),
            filter_options: orchestrator.filter_options(),
            by_airline: orchestrator.chart_by_airline(),
            price_histogram: orchestrator.price_histogram(),
            flights: orchestrator.visible_flights(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&orchestrator);
    }

    Ok(())
}
