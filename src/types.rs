use serde::{Deserialize, Serialize};

use crate::config::{alchemica_weights, item_ranges};
use crate::error::AppError;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// One independently loaded data domain of a portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Gotchis,
    Lendings,
    Warehouse,
    Installations,
    Tiles,
    Tickets,
    Realm,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Gotchis,
        Category::Lendings,
        Category::Warehouse,
        Category::Installations,
        Category::Tiles,
        Category::Tickets,
        Category::Realm,
    ];

    /// Ordering applied when a category loads before anyone picked one.
    /// `None` keeps records in the order the upstream returned them.
    pub fn default_sorting(self) -> Option<SortSpec> {
        match self {
            Category::Gotchis => Some(SortSpec::new("modifiedRarityScore", SortDir::Desc)),
            Category::Lendings => Some(SortSpec::new("totalTokens", SortDir::Desc)),
            Category::Warehouse => Some(SortSpec::new("rarityId", SortDir::Desc)),
            Category::Realm => Some(SortSpec::new("size", SortDir::Desc)),
            Category::Installations | Category::Tiles | Category::Tickets => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Gotchis => "gotchis",
            Category::Lendings => "lendings",
            Category::Warehouse => "warehouse",
            Category::Installations => "installations",
            Category::Tiles => "tiles",
            Category::Tickets => "tickets",
            Category::Realm => "realm",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| AppError::UnknownCategory(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    Desc,
}

impl std::str::FromStr for SortDir {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortDir::Asc),
            "desc" => Ok(SortDir::Desc),
            other => Err(AppError::BadRequest(format!("sort direction must be asc or desc, got {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub dir: SortDir,
}

impl SortSpec {
    pub fn new(field: &str, dir: SortDir) -> Self {
        Self { field: field.to_string(), dir }
    }
}

// ---------------------------------------------------------------------------
// Gotchi
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gotchi {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub haunt_id: String,
    pub collateral: String,
    pub base_rarity_score: f64,
    pub modified_rarity_score: f64,
    pub kinship: f64,
    pub experience: f64,
    pub level: u32,
    /// Unix seconds of the summon, drives the "age" sorting.
    pub created_at: u64,
    pub equipped_wearables: Vec<u32>,
    /// Set by the last reward calculation; `None` until one ran.
    pub reward: Option<f64>,
    pub reward_stats: Vec<RewardStat>,
}

/// The three leaderboards a gotchi is ranked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RewardMetric {
    #[serde(rename = "BRS")]
    Rarity,
    #[serde(rename = "KIN")]
    Kinship,
    #[serde(rename = "EXP")]
    Experience,
}

impl RewardMetric {
    pub const ALL: [RewardMetric; 3] =
        [RewardMetric::Rarity, RewardMetric::Kinship, RewardMetric::Experience];

    pub fn value_of(self, gotchi: &Gotchi) -> f64 {
        match self {
            RewardMetric::Rarity => gotchi.modified_rarity_score,
            RewardMetric::Kinship => gotchi.kinship,
            RewardMetric::Experience => gotchi.experience,
        }
    }
}

impl std::fmt::Display for RewardMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RewardMetric::Rarity => "BRS",
            RewardMetric::Kinship => "KIN",
            RewardMetric::Experience => "EXP",
        };
        write!(f, "{s}")
    }
}

/// One leaderboard's contribution to a gotchi's reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardStat {
    pub metric: RewardMetric,
    /// Zero-based position; `None` when the gotchi is missing from the population.
    pub rank: Option<usize>,
    pub reward: f64,
}

// ---------------------------------------------------------------------------
// Lending
// ---------------------------------------------------------------------------

/// Alchemica accrued by a lending since it was agreed, in whole tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AlchemicaBalance {
    pub fud: f64,
    pub fomo: f64,
    pub alpha: f64,
    pub kek: f64,
}

impl AlchemicaBalance {
    pub fn total(&self) -> f64 {
        self.fud + self.fomo + self.alpha + self.kek
    }

    /// FUD-equivalent value of the balance.
    pub fn efficiency(&self) -> f64 {
        self.fud * alchemica_weights::FUD
            + self.fomo * alchemica_weights::FOMO
            + self.alpha * alchemica_weights::ALPHA
            + self.kek * alchemica_weights::KEK
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lending {
    pub id: String,
    pub gotchi_id: String,
    pub gotchi_name: String,
    pub lender: String,
    pub borrower: String,
    pub time_agreed: u64,
    pub period: u64,
    pub fud: f64,
    pub fomo: f64,
    pub alpha: f64,
    pub kek: f64,
    pub total_tokens: f64,
    pub income: f64,
    pub end_time: u64,
}

impl Lending {
    /// Folds the separately fetched balance into the lending and derives the
    /// total, income and end time.
    pub fn with_balance(mut self, balance: AlchemicaBalance) -> Self {
        self.fud = balance.fud;
        self.fomo = balance.fomo;
        self.alpha = balance.alpha;
        self.kek = balance.kek;
        self.total_tokens = balance.total();
        self.income = balance.efficiency();
        self.end_time = self.time_agreed.saturating_add(self.period);
        self
    }
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Wearable,
    Consumable,
}

impl ItemCategory {
    pub fn from_item_id(id: u32) -> Self {
        if item_ranges::CONSUMABLES.contains(&id) {
            ItemCategory::Consumable
        } else {
            ItemCategory::Wearable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Legendary,
    Mythical,
    Godlike,
    Unknown,
}

impl Rarity {
    /// Sortable ordinal, higher is rarer. Unknown items sink to the bottom.
    pub fn rarity_id(self) -> u8 {
        match self {
            Rarity::Unknown => 0,
            Rarity::Common => 1,
            Rarity::Uncommon => 2,
            Rarity::Rare => 3,
            Rarity::Legendary => 4,
            Rarity::Mythical => 5,
            Rarity::Godlike => 6,
        }
    }
}

/// One item type in the reconciled warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLine {
    pub id: u32,
    pub balance: u64,
    pub rarity: Rarity,
    pub rarity_id: u8,
    pub category: ItemCategory,
    /// Gotchi ids holding the item. `None` when the contributing source does
    /// not attribute holders (raw wallet balances).
    pub holders: Option<Vec<String>>,
}

/// Raw balance of one item as reported by the inventory service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemBalance {
    pub item_id: u32,
    pub balance: u64,
}

// ---------------------------------------------------------------------------
// Buildings, tickets, parcels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildingKind {
    Installation,
    Tile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    #[serde(rename = "type")]
    pub kind: BuildingKind,
    pub id: u32,
    pub name: String,
    pub level: Option<u32>,
    pub balance: u64,
    pub cooldown_hours: Option<u32>,
}

/// A token balance exactly as the chain reader returns it: hex-encoded numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTokenBalance {
    pub token_id_hex: String,
    pub balance_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u32,
    pub name: String,
    pub balance: u64,
}

/// A parcel sub-resource that is filled in after the parcel itself loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum LazyField<T> {
    Loading,
    Ready(T),
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channeling {
    /// Unix seconds of the last channeling, 0 if never channeled.
    pub last_channeled: u64,
    pub altar_level: Option<u32>,
    /// Unix seconds when channeling is possible again.
    pub next_channeling: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parcel {
    pub id: String,
    pub parcel_id: String,
    pub size: u32,
    pub district: u32,
    pub coordinate_x: u32,
    pub coordinate_y: u32,
    pub fud_boost: u32,
    pub fomo_boost: u32,
    pub alpha_boost: u32,
    pub kek_boost: u32,
    pub channeling: LazyField<Channeling>,
    pub installations: LazyField<Vec<Building>>,
}

// ---------------------------------------------------------------------------
// Navigation summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavEntry {
    pub name: String,
    pub loading: bool,
    pub items: usize,
}
