use std::future::Future;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use crate::catalog::{self, InstallationType};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::types::{
    AlchemicaBalance, Building, BuildingKind, Channeling, Gotchi, ItemBalance, LazyField, Lending,
    Parcel, RawTokenBalance, Ticket,
};

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Every upstream read the portfolio needs. One method per data domain so
/// tests can substitute any single source.
pub trait PortfolioSource: Send + Sync + 'static {
    fn fetch_gotchis(&self, address: &str) -> impl Future<Output = Result<Vec<Gotchi>>> + Send;

    /// Active lendings where `address` is the lender. Balances are not filled in.
    fn fetch_lendings(&self, address: &str) -> impl Future<Output = Result<Vec<Lending>>> + Send;

    /// Alchemica a lending earned since `time_agreed`.
    fn fetch_lending_income(
        &self,
        lending_id: &str,
        time_agreed: u64,
    ) -> impl Future<Output = Result<AlchemicaBalance>> + Send;

    fn fetch_inventory(&self, address: &str) -> impl Future<Output = Result<Vec<ItemBalance>>> + Send;

    fn fetch_installations(&self, address: &str) -> impl Future<Output = Result<Vec<RawTokenBalance>>> + Send;

    fn fetch_tiles(&self, address: &str) -> impl Future<Output = Result<Vec<RawTokenBalance>>> + Send;

    fn fetch_tickets(&self, address: &str) -> impl Future<Output = Result<Vec<Ticket>>> + Send;

    /// Owned parcels with both lazy sub-resources still `Loading`.
    fn fetch_realm(&self, address: &str) -> impl Future<Output = Result<Vec<Parcel>>> + Send;

    fn fetch_parcel_channeling(&self, parcel_id: &str) -> impl Future<Output = Result<Channeling>> + Send;

    fn fetch_parcel_installations(&self, parcel_id: &str) -> impl Future<Output = Result<Vec<Building>>> + Send;

    /// Every summoned gotchi, in indexer id order.
    fn fetch_population(&self) -> impl Future<Output = Result<Vec<Gotchi>>> + Send;
}

// ---------------------------------------------------------------------------
// HttpSource
// ---------------------------------------------------------------------------

/// Live source: GraphQL indexers, the REST inventory service and the chain reader.
#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    cfg: Config,
}

impl HttpSource {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()?;
        Ok(Self { client, cfg: cfg.clone() })
    }

    /// POSTs a GraphQL query and returns its `data` object.
    async fn graphql(&self, url: &str, query: String) -> Result<Value> {
        let resp: Value = self
            .client
            .post(url)
            .json(&json!({ "query": query }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(errors) = resp.get("errors") {
            return Err(AppError::Upstream(format!("GraphQL errors: {errors}")));
        }
        resp.get("data")
            .cloned()
            .ok_or_else(|| AppError::Upstream("GraphQL response without data".to_string()))
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        Ok(self.client.get(url).send().await?.error_for_status()?.json().await?)
    }

    async fn parcel(&self, parcel_id: &str) -> Result<Value> {
        let query = format!(
            r#"{{ parcel(id: "{parcel_id}") {{ id lastChanneledAlchemica equippedInstallations {{ id }} }} }}"#
        );
        let data = self.graphql(&self.cfg.income_subgraph_url, query).await?;
        match data.get("parcel") {
            Some(p) if !p.is_null() => Ok(p.clone()),
            _ => Err(AppError::NotFound(format!("parcel {parcel_id}"))),
        }
    }
}

impl PortfolioSource for HttpSource {
    async fn fetch_gotchis(&self, address: &str) -> Result<Vec<Gotchi>> {
        let query = format!(
            r#"{{ user(id: "{}") {{ gotchisOwned(first: {}, where: {{ status: 3 }}) {{ {GOTCHI_FIELDS} }} }} }}"#,
            address.to_lowercase(),
            crate::config::OWNED_QUERY_LIMIT,
        );
        let data = self.graphql(&self.cfg.subgraph_url, query).await?;
        // An address the indexer never saw comes back as `user: null`.
        Ok(data
            .pointer("/user/gotchisOwned")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_gotchi).collect())
            .unwrap_or_default())
    }

    async fn fetch_lendings(&self, address: &str) -> Result<Vec<Lending>> {
        let query = format!(
            r#"{{ gotchiLendings(first: {}, where: {{ lender: "{}", borrower_not: "{ZERO_ADDRESS}", cancelled: false, completed: false }}) {{ id gotchi {{ id name }} lender borrower timeAgreed period }} }}"#,
            crate::config::OWNED_QUERY_LIMIT,
            address.to_lowercase(),
        );
        let data = self.graphql(&self.cfg.subgraph_url, query).await?;
        let items = data
            .get("gotchiLendings")
            .and_then(Value::as_array)
            .ok_or_else(|| AppError::Upstream("gotchiLendings missing".to_string()))?;
        Ok(items.iter().filter_map(parse_lending).collect())
    }

    async fn fetch_lending_income(&self, lending_id: &str, time_agreed: u64) -> Result<AlchemicaBalance> {
        let query = format!(
            r#"{{ claimedAlchemicas(first: 1000, where: {{ lendingId: "{lending_id}", timestamp_gte: "{time_agreed}" }}) {{ alchemica }} }}"#
        );
        let data = self.graphql(&self.cfg.income_subgraph_url, query).await?;
        let events = data
            .get("claimedAlchemicas")
            .and_then(Value::as_array)
            .ok_or_else(|| AppError::Upstream(format!("income for lending {lending_id} missing")))?;
        Ok(sum_claimed(events))
    }

    async fn fetch_inventory(&self, address: &str) -> Result<Vec<ItemBalance>> {
        let url = format!(
            "{}/inventory?address={}",
            self.cfg.inventory_api_url,
            urlencoding::encode(address)
        );
        let resp = self.get_json(&url).await?;
        let items = resp
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| AppError::Upstream("inventory response without items".to_string()))?;
        Ok(items.iter().filter_map(parse_item_balance).collect())
    }

    async fn fetch_installations(&self, address: &str) -> Result<Vec<RawTokenBalance>> {
        let url = format!("{}/installations/{}", self.cfg.chain_reader_url, address);
        let resp = self.get_json(&url).await?;
        Ok(parse_raw_balances(&resp, "installationId"))
    }

    async fn fetch_tiles(&self, address: &str) -> Result<Vec<RawTokenBalance>> {
        let url = format!("{}/tiles/{}", self.cfg.chain_reader_url, address);
        let resp = self.get_json(&url).await?;
        Ok(parse_raw_balances(&resp, "tileId"))
    }

    async fn fetch_tickets(&self, address: &str) -> Result<Vec<Ticket>> {
        let url = format!("{}/tickets/{}", self.cfg.chain_reader_url, address);
        let resp = self.get_json(&url).await?;
        Ok(parse_raw_balances(&resp, "id").iter().map(catalog::decode_ticket).collect())
    }

    async fn fetch_realm(&self, address: &str) -> Result<Vec<Parcel>> {
        let query = format!(
            r#"{{ parcels(first: {}, where: {{ owner: "{}" }}) {{ id parcelId size district coordinateX coordinateY fudBoost fomoBoost alphaBoost kekBoost }} }}"#,
            crate::config::OWNED_QUERY_LIMIT,
            address.to_lowercase(),
        );
        let data = self.graphql(&self.cfg.income_subgraph_url, query).await?;
        let items = data
            .get("parcels")
            .and_then(Value::as_array)
            .ok_or_else(|| AppError::Upstream("parcels missing".to_string()))?;
        Ok(items.iter().filter_map(parse_parcel).collect())
    }

    async fn fetch_parcel_channeling(&self, parcel_id: &str) -> Result<Channeling> {
        let parcel = self.parcel(parcel_id).await?;
        Ok(parse_channeling(&parcel))
    }

    async fn fetch_parcel_installations(&self, parcel_id: &str) -> Result<Vec<Building>> {
        let parcel = self.parcel(parcel_id).await?;
        Ok(parse_equipped_installations(&parcel))
    }

    async fn fetch_population(&self) -> Result<Vec<Gotchi>> {
        let page_size = self.cfg.population_page_size;
        let mut population = Vec::new();
        let mut cursor = String::new();

        loop {
            let query = format!(
                r#"{{ aavegotchis(first: {page_size}, orderBy: id, orderDirection: asc, where: {{ id_gt: "{cursor}", status: 3 }}) {{ {GOTCHI_FIELDS} }} }}"#
            );
            let data = self.graphql(&self.cfg.subgraph_url, query).await?;
            let items = data
                .get("aavegotchis")
                .and_then(Value::as_array)
                .ok_or_else(|| AppError::Upstream("aavegotchis missing".to_string()))?;

            let page_len = items.len();
            population.extend(items.iter().filter_map(parse_gotchi));
            debug!(page_len, total = population.len(), "population page");

            match items.last().map(|g| str_of(g, "id")) {
                Some(last) if page_len >= page_size as usize => cursor = last,
                _ => break,
            }
        }

        Ok(population)
    }
}

const GOTCHI_FIELDS: &str = "id name owner { id } hauntId collateral baseRarityScore modifiedRarityScore kinship experience level createdAt equippedWearables";

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn str_of(v: &Value, key: &str) -> String {
    match v.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Indexers return BigInts as strings; accept both shapes.
fn f64_of(v: &Value, key: &str) -> f64 {
    let parsed = match v.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    };
    parsed.filter(|n: &f64| n.is_finite()).unwrap_or(0.0)
}

/// Out-of-range values read as zero rather than wrapping.
fn u32_of(v: &Value, key: &str) -> u32 {
    u32::try_from(u64_of(v, key)).unwrap_or(0)
}

fn u64_of(v: &Value, key: &str) -> u64 {
    match v.get(key) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// 18-decimal token amount → whole tokens.
pub fn from_wei(raw: &str) -> f64 {
    raw.parse::<f64>().map_or(0.0, |wei| wei / 1e18)
}

pub fn parse_gotchi(v: &Value) -> Option<Gotchi> {
    let id = str_of(v, "id");
    if id.is_empty() {
        return None;
    }
    let owner = v
        .get("owner")
        .map(|o| if o.is_object() { str_of(o, "id") } else { o.as_str().unwrap_or_default().to_string() })
        .unwrap_or_default();
    let equipped_wearables = v
        .get("equippedWearables")
        .and_then(Value::as_array)
        .map(|slots| slots.iter().map(|s| s.as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(0)).collect())
        .unwrap_or_default();

    Some(Gotchi {
        id,
        name: str_of(v, "name"),
        owner,
        haunt_id: str_of(v, "hauntId"),
        collateral: str_of(v, "collateral").to_lowercase(),
        base_rarity_score: f64_of(v, "baseRarityScore"),
        modified_rarity_score: f64_of(v, "modifiedRarityScore"),
        kinship: f64_of(v, "kinship"),
        experience: f64_of(v, "experience"),
        level: u32_of(v, "level"),
        created_at: u64_of(v, "createdAt"),
        equipped_wearables,
        reward: None,
        reward_stats: Vec::new(),
    })
}

fn parse_lending(v: &Value) -> Option<Lending> {
    let id = str_of(v, "id");
    if id.is_empty() {
        return None;
    }
    let gotchi = v.get("gotchi").cloned().unwrap_or(Value::Null);
    Some(Lending {
        id,
        gotchi_id: str_of(&gotchi, "id"),
        gotchi_name: str_of(&gotchi, "name"),
        lender: str_of(v, "lender"),
        borrower: str_of(v, "borrower"),
        time_agreed: u64_of(v, "timeAgreed"),
        period: u64_of(v, "period"),
        ..Default::default()
    })
}

/// Each claim event carries `[fud, fomo, alpha, kek]` in wei.
fn sum_claimed(events: &[Value]) -> AlchemicaBalance {
    events.iter().fold(AlchemicaBalance::default(), |mut acc, event| {
        let amounts: Vec<f64> = event
            .get("alchemica")
            .and_then(Value::as_array)
            .map(|a| a.iter().map(|x| from_wei(x.as_str().unwrap_or("0"))).collect())
            .unwrap_or_default();
        let at = |i: usize| amounts.get(i).copied().unwrap_or(0.0);
        acc.fud += at(0);
        acc.fomo += at(1);
        acc.alpha += at(2);
        acc.kek += at(3);
        acc
    })
}

fn parse_item_balance(v: &Value) -> Option<ItemBalance> {
    let item_id = u32_of(v, "itemId");
    if item_id == 0 {
        return None;
    }
    Some(ItemBalance { item_id, balance: u64_of(v, "balance") })
}

/// `{"_hex": "0x0a"}` or a bare `"0x0a"` string.
fn hex_of(v: &Value, key: &str) -> String {
    match v.get(key) {
        Some(Value::Object(o)) => o.get("_hex").and_then(Value::as_str).unwrap_or("0x").to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => format!("{:#x}", n.as_u64().unwrap_or(0)),
        _ => "0x".to_string(),
    }
}

fn parse_raw_balances(resp: &Value, id_key: &str) -> Vec<RawTokenBalance> {
    resp.as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| RawTokenBalance {
                    token_id_hex: hex_of(item, id_key),
                    balance_hex: hex_of(item, "balance"),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_parcel(v: &Value) -> Option<Parcel> {
    let id = str_of(v, "id");
    if id.is_empty() {
        return None;
    }
    let as_u32 = |key: &str| u32_of(v, key);
    Some(Parcel {
        parcel_id: str_of(v, "parcelId"),
        size: as_u32("size"),
        district: as_u32("district"),
        coordinate_x: as_u32("coordinateX"),
        coordinate_y: as_u32("coordinateY"),
        fud_boost: as_u32("fudBoost"),
        fomo_boost: as_u32("fomoBoost"),
        alpha_boost: as_u32("alphaBoost"),
        kek_boost: as_u32("kekBoost"),
        channeling: LazyField::Loading,
        installations: LazyField::Loading,
        id,
    })
}

fn equipped_installation_ids(parcel: &Value) -> Vec<u32> {
    parcel
        .get("equippedInstallations")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|i| u32::try_from(u64_of(i, "id")).unwrap_or(catalog::PLACEHOLDER_ID))
                .collect()
        })
        .unwrap_or_default()
}

/// Altar level comes from whichever altar is equipped on the parcel.
fn parse_channeling(parcel: &Value) -> Channeling {
    let last_channeled = u64_of(parcel, "lastChanneledAlchemica");
    let altar_level = equipped_installation_ids(parcel)
        .into_iter()
        .map(catalog::installation)
        .find(|meta| meta.installation_type == InstallationType::Altar)
        .map(|meta| meta.level);
    let next_channeling = altar_level
        .map(|level| last_channeled + u64::from(catalog::cooldown_hours(level)) * 3600);
    Channeling { last_channeled, altar_level, next_channeling }
}

/// Equipped installations grouped by id, first-seen order.
fn parse_equipped_installations(parcel: &Value) -> Vec<Building> {
    let mut buildings: Vec<Building> = Vec::new();
    for id in equipped_installation_ids(parcel) {
        if let Some(existing) = buildings.iter_mut().find(|b| b.id == id) {
            existing.balance += 1;
            continue;
        }
        let meta = catalog::installation(id);
        buildings.push(Building {
            kind: BuildingKind::Installation,
            id,
            name: meta.name,
            level: Some(meta.level),
            balance: 1,
            cooldown_hours: Some(catalog::cooldown_hours(meta.level)),
        });
    }
    buildings
}
