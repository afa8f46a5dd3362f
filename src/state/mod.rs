pub mod portfolio_store;

pub use portfolio_store::{CategoryData, PortfolioStore, RewardState};
