// Request lifecycle for one search screen: fetch, normalize, derive facets,
// then serve filtered views and chart data until the next search.
use crate::charts::{self, AirlinePricePoint, PriceBucket, ResultSummary};
use crate::client::{ApiError, OfferSearch, SearchParams, ValidationError};
use crate::facets::{derive_facets, FilterOptions};
use crate::filters::{apply_filters, FilterState, FilterUpdate};
use crate::history::SearchHistory;
use crate::normalizer::{normalize_all, Flight};
use crate::offer::{Dictionaries, OfferSearchResponse};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum SearchStatus {
    Idle,
    Loading,
    Loaded,
    // User-facing message
    Failed(String),
}

// Identifies one fetch; only the latest ticket's result is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTicket(u64);

pub struct SearchOrchestrator {
    client: Arc<dyn OfferSearch>,
    history: Option<Arc<SearchHistory>>,
    generation: u64,
    status: SearchStatus,
    params: Option<SearchParams>,
    flights: Vec<Flight>,
    dictionaries: Dictionaries,
    filter_options: FilterOptions,
    filters: FilterState,
}

impl SearchOrchestrator {
    pub fn new(client: Arc<dyn OfferSearch>) -> Self {
        Self {
            client,
            history: None,
            generation: 0,
            status: SearchStatus::Idle,
            params: None,
            flights: Vec::new(),
            dictionaries: Dictionaries::default(),
            filter_options: FilterOptions::default(),
            filters: FilterState::default(),
        }
    }

    pub fn with_history(mut self, history: Arc<SearchHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub async fn search(&mut self, params: SearchParams) -> &SearchStatus {
        let (ticket, validation) = self.start_search(params.clone());

        let result = match validation {
            Ok(()) => self.client.search_offers(&params).await,
            Err(e) => Err(ApiError::InvalidParams(e)),
        };

        self.complete_search(ticket, result);
        &self.status
    }

    pub fn begin_search(&mut self, params: SearchParams) -> SearchTicket {
        self.start_search(params).0
    }

    fn start_search(&mut self, params: SearchParams) -> (SearchTicket, Result<(), ValidationError>) {
        self.generation += 1;
        self.status = SearchStatus::Loading;
        self.filters.reset();

        let validation = params.validate();
        if validation.is_ok() {
            if let Some(history) = &self.history {
                history.add(&params);
            }
        }

        debug!(
            "Search {} started: {} -> {}",
            self.generation, params.origin, params.destination
        );
        self.params = Some(params);
        (SearchTicket(self.generation), validation)
    }

    // Returns false when the result belongs to a superseded search
    pub fn complete_search(
        &mut self,
        ticket: SearchTicket,
        result: Result<OfferSearchResponse, ApiError>,
    ) -> bool {
        if ticket.0 != self.generation {
            debug!("Discarding stale result for search {}", ticket.0);
            return false;
        }

        match result {
            Ok(response) => {
                self.flights = normalize_all(&response.data, &response.dictionaries);
                self.dictionaries = response.dictionaries;
                self.filter_options = derive_facets(&self.flights, &self.dictionaries.carriers);
                self.status = SearchStatus::Loaded;
                info!("Search {} loaded {} flights", ticket.0, self.flights.len());
            }
            Err(error) => {
                warn!("Search {} failed: {}", ticket.0, error);
                self.flights.clear();
                self.dictionaries = Dictionaries::default();
                self.filter_options = FilterOptions::default();
                self.status = SearchStatus::Failed(error.user_message());
            }
        }
        true
    }

    pub fn status(&self) -> &SearchStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == SearchStatus::Loading
    }

    pub fn params(&self) -> Option<&SearchParams> {
        self.params.as_ref()
    }

    pub fn flights(&self) -> &[Flight] {
        &self.flights
    }

    pub fn dictionaries(&self) -> &Dictionaries {
        &self.dictionaries
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn update_filter(&mut self, update: FilterUpdate) {
        self.filters.apply_update(update);
    }

    pub fn reset_filters(&mut self) {
        self.filters.reset();
    }

    pub fn filter_options(&self) -> &FilterOptions {
        &self.filter_options
    }

    pub fn visible_flights(&self) -> Vec<Flight> {
        apply_filters(&self.flights, &self.filters)
    }

    pub fn chart_by_airline(&self) -> Vec<AirlinePricePoint> {
        charts::by_airline(&self.visible_flights(), charts::DEFAULT_AIRLINE_LIMIT)
    }

    pub fn price_histogram(&self) -> Vec<PriceBucket> {
        charts::price_histogram(&self.visible_flights(), charts::DEFAULT_PRICE_BUCKETS)
    }

    pub fn summary(&self) -> Option<ResultSummary> {
        charts::summarize(&self.visible_flights(), self.flights.len())
    }

    // Back to the initial screen; any in-flight result becomes stale
    pub fn reset(&mut self) {
        self.generation += 1;
        self.status = SearchStatus::Idle;
        self.params = None;
        self.flights.clear();
        self.dictionaries = Dictionaries::default();
        self.filter_options = FilterOptions::default();
        self.filters.reset();
    }
}
