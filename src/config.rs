use crate::error::{AppError, Result};

pub const SUBGRAPH_URL: &str =
    "https://api.thegraph.com/subgraphs/name/aavegotchi/aavegotchi-core-matic";
pub const INCOME_SUBGRAPH_URL: &str =
    "https://api.thegraph.com/subgraphs/name/aavegotchi/gotchiverse-matic";
pub const INVENTORY_API_URL: &str = "https://api.aavegotchi.land";
pub const CHAIN_READER_URL: &str = "http://localhost:8545/reader";

/// Page size for cursor pagination over the full gotchi population.
/// The indexer caps `first` at 1000.
pub const POPULATION_PAGE_SIZE: u32 = 1000;

/// Upper bound on owned records requested per category query.
pub const OWNED_QUERY_LIMIT: u32 = 1000;

/// Item id ranges used when classifying inventory contributions.
pub mod item_ranges {
    use std::ops::RangeInclusive;

    /// Consumables (potions, milkshakes). Everything else is a wearable.
    pub const CONSUMABLES: RangeInclusive<u32> = 126..=129;

    /// Badges never count as inventory when found in an equipped slot.
    pub const BADGES: RangeInclusive<u32> = 162..=198;

    /// Haunt 1 background.
    pub const H1_BACKGROUND: u32 = 210;

    /// Equipped slot with nothing in it.
    pub const EMPTY_SLOT: u32 = 0;
}

/// FUD-equivalent weight per alchemica token, used for the lending income score.
pub mod alchemica_weights {
    pub const FUD: f64 = 1.0;
    pub const FOMO: f64 = 2.0;
    pub const ALPHA: f64 = 4.0;
    pub const KEK: f64 = 10.0;
}

/// Rarity farming payout tables. Each entry is `(rank_end_exclusive, reward)`,
/// scanned in order; ranks past the last entry pay nothing.
pub mod reward_tiers {
    pub const RARITY: &[(usize, f64)] = &[
        (1, 3000.0),
        (2, 2000.0),
        (3, 1500.0),
        (10, 800.0),
        (100, 150.0),
        (1000, 25.0),
        (7500, 3.0),
    ];
    pub const KINSHIP: &[(usize, f64)] = &[
        (1, 1500.0),
        (2, 1000.0),
        (3, 750.0),
        (10, 400.0),
        (100, 75.0),
        (1000, 12.0),
        (7500, 1.5),
    ];
    pub const EXPERIENCE: &[(usize, f64)] = &[
        (1, 1500.0),
        (2, 1000.0),
        (3, 750.0),
        (10, 400.0),
        (100, 75.0),
        (1000, 12.0),
        (7500, 1.5),
    ];
}

#[derive(Debug, Clone)]
pub struct Config {
    pub subgraph_url: String,
    pub income_subgraph_url: String,
    pub inventory_api_url: String,
    pub chain_reader_url: String,
    pub log_level: String,
    pub api_port: u16,
    /// Per-request timeout for every upstream call (HTTP_TIMEOUT_SECS)
    pub http_timeout_secs: u64,
    /// Page size for the population scan (POPULATION_PAGE_SIZE)
    pub population_page_size: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            subgraph_url: std::env::var("SUBGRAPH_URL").unwrap_or_else(|_| SUBGRAPH_URL.to_string()),
            income_subgraph_url: std::env::var("INCOME_SUBGRAPH_URL")
                .unwrap_or_else(|_| INCOME_SUBGRAPH_URL.to_string()),
            inventory_api_url: std::env::var("INVENTORY_API_URL")
                .unwrap_or_else(|_| INVENTORY_API_URL.to_string()),
            chain_reader_url: std::env::var("CHAIN_READER_URL")
                .unwrap_or_else(|_| CHAIN_READER_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse::<u64>()
                .unwrap_or(30),
            population_page_size: std::env::var("POPULATION_PAGE_SIZE")
                .unwrap_or_else(|_| POPULATION_PAGE_SIZE.to_string())
                .parse::<u32>()
                .map(|n| n.clamp(1, POPULATION_PAGE_SIZE))
                .unwrap_or(POPULATION_PAGE_SIZE),
        })
    }
}
