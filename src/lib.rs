// Flight search client core: offer normalization, facets, filtering and charts,
// plus the upstream client, search history and settings around them

pub mod auth;
pub mod charts;
pub mod client;
pub mod config;
pub mod facets;
pub mod filters;
pub mod format;
pub mod history;
pub mod normalizer;
pub mod offer;
pub mod orchestrator;

// Re-export key types for convenience
pub use charts::{AirlinePricePoint, PriceBucket, ResultSummary};
pub use client::{
    AmadeusClient, ApiError, ClientConfig, ClientError, ClientStats, OfferSearch, RetryConfig,
    SearchParams, TravelClass, ValidationError,
};
pub use facets::{derive_facets, FilterOptions};
pub use filters::{apply_filters, FilterState, FilterUpdate, QuickFilter, SortBy};
pub use history::{SearchHistory, SearchHistoryItem};
pub use normalizer::{normalize, normalize_all, Flight, Segment};
pub use offer::{Dictionaries, OfferSearchResponse, RawOffer};
pub use orchestrator::{SearchOrchestrator, SearchStatus, SearchTicket};
