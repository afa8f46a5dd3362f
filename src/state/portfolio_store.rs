use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::query::record::Record;
use crate::query::sort_by_spec;
use crate::reconciler;
use crate::types::{
    Building, Category, Gotchi, InventoryLine, Lending, NavEntry, Parcel, SortSpec, Ticket,
};

// ---------------------------------------------------------------------------
// CategoryData
// ---------------------------------------------------------------------------

/// A whole collection of one category, as published or snapshotted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CategoryData {
    Gotchis(Vec<Gotchi>),
    Lendings(Vec<Lending>),
    Warehouse(Vec<InventoryLine>),
    Installations(Vec<Building>),
    Tiles(Vec<Building>),
    Tickets(Vec<Ticket>),
    Realm(Vec<Parcel>),
}

impl CategoryData {
    pub fn category(&self) -> Category {
        match self {
            CategoryData::Gotchis(_) => Category::Gotchis,
            CategoryData::Lendings(_) => Category::Lendings,
            CategoryData::Warehouse(_) => Category::Warehouse,
            CategoryData::Installations(_) => Category::Installations,
            CategoryData::Tiles(_) => Category::Tiles,
            CategoryData::Tickets(_) => Category::Tickets,
            CategoryData::Realm(_) => Category::Realm,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CategoryData::Gotchis(v) => v.len(),
            CategoryData::Lendings(v) => v.len(),
            CategoryData::Warehouse(v) => v.len(),
            CategoryData::Installations(v) | CategoryData::Tiles(v) => v.len(),
            CategoryData::Tickets(v) => v.len(),
            CategoryData::Realm(v) => v.len(),
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sorted(self, spec: Option<&SortSpec>) -> Self {
        match self {
            CategoryData::Gotchis(v) => CategoryData::Gotchis(sort_by_spec(&v, spec)),
            CategoryData::Lendings(v) => CategoryData::Lendings(sort_by_spec(&v, spec)),
            CategoryData::Warehouse(v) => CategoryData::Warehouse(sort_by_spec(&v, spec)),
            CategoryData::Installations(v) => CategoryData::Installations(sort_by_spec(&v, spec)),
            CategoryData::Tiles(v) => CategoryData::Tiles(sort_by_spec(&v, spec)),
            CategoryData::Tickets(v) => CategoryData::Tickets(sort_by_spec(&v, spec)),
            CategoryData::Realm(v) => CategoryData::Realm(sort_by_spec(&v, spec)),
        }
    }
}

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// One canonical collection plus its loading flag.
#[derive(Debug)]
struct Slot<T> {
    items: RwLock<Vec<T>>,
    loading: AtomicBool,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            loading: AtomicBool::new(false),
        }
    }
}

impl<T: Clone> Slot<T> {
    fn snapshot(&self) -> Vec<T> {
        self.items.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn replace(&self, items: Vec<T>) {
        *self.items.write().unwrap_or_else(PoisonError::into_inner) = items;
    }

    fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl<T: Record + Clone> Slot<T> {
    /// Stores `incoming` ordered by the sorting `spec` yields under the write guard.
    fn replace_sorted(&self, incoming: Vec<T>, spec: impl FnOnce() -> Option<SortSpec>) {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        *items = sort_by_spec(&incoming, spec().as_ref());
    }

    /// Re-sorts whatever the collection holds at the moment the write guard is taken.
    fn resort(&self, spec: impl FnOnce() -> Option<SortSpec>) {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        *items = sort_by_spec(&items, spec().as_ref());
    }
}

// ---------------------------------------------------------------------------
// RewardState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardState {
    pub total: Option<f64>,
    pub calculating: bool,
    pub calculated: bool,
}

// ---------------------------------------------------------------------------
// PortfolioStore
// ---------------------------------------------------------------------------

/// Owner of every per-category collection of the current wallet.
///
/// Writers go through [`begin`](Self::begin) to obtain a generation and then
/// [`publish`](Self::publish), [`fail`](Self::fail) or
/// [`merge_warehouse`](Self::merge_warehouse) with it. A write carrying a
/// generation older than the latest `begin` for its category is dropped, so
/// a slow response for a previous wallet never lands on the current one.
#[derive(Default)]
pub struct PortfolioStore {
    gotchis: Slot<Gotchi>,
    lendings: Slot<Lending>,
    warehouse: Slot<InventoryLine>,
    installations: Slot<Building>,
    tiles: Slot<Building>,
    tickets: Slot<Ticket>,
    realm: Slot<Parcel>,
    /// category → latest issued request generation
    generations: DashMap<Category, u64>,
    /// category → sorting chosen by the user; absent means the default
    sortings: DashMap<Category, SortSpec>,
    address: RwLock<Option<String>>,
    reward: RwLock<RewardState>,
}

impl PortfolioStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // --- wallet ---

    pub fn set_address(&self, address: &str) {
        *self.address.write().unwrap_or_else(PoisonError::into_inner) = Some(address.to_string());
    }

    pub fn address(&self) -> Option<String> {
        self.address.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    // --- generations & loading ---

    /// Starts a new request for `category`: bumps its generation and raises
    /// the loading flag. Returns the generation the response must carry.
    pub fn begin(&self, category: Category) -> u64 {
        let mut entry = self.generations.entry(category).or_insert(0);
        *entry += 1;
        let generation = *entry;
        self.loading_flag(category).store(true, Ordering::Relaxed);
        drop(entry);
        generation
    }

    pub fn generation(&self, category: Category) -> u64 {
        self.generations.get(&category).map_or(0, |g| *g)
    }

    pub fn is_loading(&self, category: Category) -> bool {
        self.loading_flag(category).load(Ordering::Relaxed)
    }

    fn loading_flag(&self, category: Category) -> &AtomicBool {
        match category {
            Category::Gotchis => &self.gotchis.loading,
            Category::Lendings => &self.lendings.loading,
            Category::Warehouse => &self.warehouse.loading,
            Category::Installations => &self.installations.loading,
            Category::Tiles => &self.tiles.loading,
            Category::Tickets => &self.tickets.loading,
            Category::Realm => &self.realm.loading,
        }
    }

    // --- writes ---

    /// Replaces the collection of `data`'s category, sorted by its current
    /// sorting, and clears the loading flag. Returns false for stale writes.
    pub fn publish(&self, generation: u64, data: CategoryData) -> bool {
        let category = data.category();
        let Some(current) = self.generations.get(&category) else {
            return false;
        };
        if *current != generation {
            debug!(%category, generation, current = *current, "discarding stale response");
            return false;
        }

        let spec = || self.sorting(category);
        match data {
            CategoryData::Gotchis(v) => self.gotchis.replace_sorted(v, spec),
            CategoryData::Lendings(v) => self.lendings.replace_sorted(v, spec),
            CategoryData::Warehouse(v) => self.warehouse.replace_sorted(v, spec),
            CategoryData::Installations(v) => self.installations.replace_sorted(v, spec),
            CategoryData::Tiles(v) => self.tiles.replace_sorted(v, spec),
            CategoryData::Tickets(v) => self.tickets.replace_sorted(v, spec),
            CategoryData::Realm(v) => self.realm.replace_sorted(v, spec),
        }
        self.loading_flag(category).store(false, Ordering::Relaxed);
        drop(current);
        true
    }

    /// Empties the category and clears its loading flag after a failed load.
    pub fn fail(&self, category: Category, generation: u64) -> bool {
        let Some(current) = self.generations.get(&category) else {
            return false;
        };
        if *current != generation {
            debug!(%category, generation, current = *current, "discarding stale failure");
            return false;
        }
        self.clear(category);
        self.loading_flag(category).store(false, Ordering::Relaxed);
        drop(current);
        true
    }

    /// Folds `incoming` into the warehouse. `source` is the category whose
    /// request produced the contribution and whose generation must be current.
    /// Does not touch loading flags.
    pub fn merge_warehouse(&self, source: Category, generation: u64, incoming: Vec<InventoryLine>) -> bool {
        let Some(current) = self.generations.get(&source) else {
            return false;
        };
        if *current != generation {
            debug!(category = %source, generation, "discarding stale warehouse contribution");
            return false;
        }

        let mut items = self.warehouse.items.write().unwrap_or_else(PoisonError::into_inner);
        let existing = std::mem::take(&mut *items);
        let spec = self.sorting(Category::Warehouse);
        *items = sort_by_spec(&reconciler::merge(existing, incoming), spec.as_ref());
        drop(items);
        drop(current);
        true
    }

    /// Clears the loading flag of a category whose data was merged rather than published.
    pub fn finish(&self, category: Category, generation: u64) -> bool {
        let Some(current) = self.generations.get(&category) else {
            return false;
        };
        if *current != generation {
            return false;
        }
        self.loading_flag(category).store(false, Ordering::Relaxed);
        drop(current);
        true
    }

    /// Drops everything accumulated in the warehouse.
    pub fn reset_warehouse(&self) {
        self.warehouse.replace(Vec::new());
    }

    pub fn reset_reward(&self) {
        *self.reward.write().unwrap_or_else(PoisonError::into_inner) = RewardState::default();
    }

    fn clear(&self, category: Category) {
        match category {
            Category::Gotchis => self.gotchis.replace(Vec::new()),
            Category::Lendings => self.lendings.replace(Vec::new()),
            Category::Warehouse => self.warehouse.replace(Vec::new()),
            Category::Installations => self.installations.replace(Vec::new()),
            Category::Tiles => self.tiles.replace(Vec::new()),
            Category::Tickets => self.tickets.replace(Vec::new()),
            Category::Realm => self.realm.replace(Vec::new()),
        }
    }

    /// Applies `update` to one parcel if the realm request `generation` is
    /// still current. Returns false when stale or the parcel is unknown.
    pub fn update_parcel(&self, generation: u64, parcel_id: &str, update: impl FnOnce(&mut Parcel)) -> bool {
        let Some(current) = self.generations.get(&Category::Realm) else {
            return false;
        };
        if *current != generation {
            return false;
        }
        let mut parcels = self.realm.items.write().unwrap_or_else(PoisonError::into_inner);
        let found = match parcels.iter_mut().find(|p| p.id == parcel_id || p.parcel_id == parcel_id) {
            Some(parcel) => {
                update(parcel);
                true
            }
            None => false,
        };
        drop(parcels);
        drop(current);
        found
    }

    // --- sorting ---

    /// The sorting in effect for `category`: the user's choice, else the default.
    pub fn sorting(&self, category: Category) -> Option<SortSpec> {
        self.sortings
            .get(&category)
            .map(|s| s.clone())
            .or_else(|| category.default_sorting())
    }

    /// Stores `spec` and re-sorts the collection in place. The sorting is
    /// recorded under the slot's write guard, so a concurrent publish either
    /// lands first and gets re-sorted or lands after and sorts by `spec`.
    pub fn resort(&self, category: Category, spec: SortSpec) {
        let remember = || {
            self.sortings.insert(category, spec.clone());
            Some(spec)
        };
        match category {
            Category::Gotchis => self.gotchis.resort(remember),
            Category::Lendings => self.lendings.resort(remember),
            Category::Warehouse => self.warehouse.resort(remember),
            Category::Installations => self.installations.resort(remember),
            Category::Tiles => self.tiles.resort(remember),
            Category::Tickets => self.tickets.resort(remember),
            Category::Realm => self.realm.resort(remember),
        }
    }

    // --- reward ---

    pub fn begin_reward(&self) {
        let mut state = self.reward.write().unwrap_or_else(PoisonError::into_inner);
        state.calculating = true;
    }

    /// `total` is `None` when the calculation failed.
    pub fn finish_reward(&self, total: Option<f64>) {
        let mut state = self.reward.write().unwrap_or_else(PoisonError::into_inner);
        state.calculating = false;
        if let Some(total) = total {
            state.total = Some(total);
            state.calculated = true;
        }
    }

    pub fn reward(&self) -> RewardState {
        *self.reward.read().unwrap_or_else(PoisonError::into_inner)
    }

    // --- reads ---

    pub fn snapshot(&self, category: Category) -> CategoryData {
        match category {
            Category::Gotchis => CategoryData::Gotchis(self.gotchis.snapshot()),
            Category::Lendings => CategoryData::Lendings(self.lendings.snapshot()),
            Category::Warehouse => CategoryData::Warehouse(self.warehouse.snapshot()),
            Category::Installations => CategoryData::Installations(self.installations.snapshot()),
            Category::Tiles => CategoryData::Tiles(self.tiles.snapshot()),
            Category::Tickets => CategoryData::Tickets(self.tickets.snapshot()),
            Category::Realm => CategoryData::Realm(self.realm.snapshot()),
        }
    }

    pub fn gotchis(&self) -> Vec<Gotchi> {
        self.gotchis.snapshot()
    }

    #[cfg(test)]
    pub fn warehouse(&self) -> Vec<InventoryLine> {
        self.warehouse.snapshot()
    }

    pub fn realm(&self) -> Vec<Parcel> {
        self.realm.snapshot()
    }

    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::Gotchis => self.gotchis.len(),
            Category::Lendings => self.lendings.len(),
            Category::Warehouse => self.warehouse.len(),
            Category::Installations => self.installations.len(),
            Category::Tiles => self.tiles.len(),
            Category::Tickets => self.tickets.len(),
            Category::Realm => self.realm.len(),
        }
    }

    /// Per-section loading state and size. The warehouse also waits on gotchis
    /// (equipped items), and installations include tiles.
    pub fn nav_summary(&self) -> Vec<NavEntry> {
        let entry = |name: &str, loading: bool, items: usize| NavEntry {
            name: name.to_string(),
            loading,
            items,
        };
        vec![
            entry("gotchis", self.is_loading(Category::Gotchis), self.count(Category::Gotchis)),
            entry("lendings", self.is_loading(Category::Lendings), self.count(Category::Lendings)),
            entry(
                "warehouse",
                self.is_loading(Category::Warehouse) || self.is_loading(Category::Gotchis),
                self.count(Category::Warehouse),
            ),
            entry(
                "installations",
                self.is_loading(Category::Installations) || self.is_loading(Category::Tiles),
                self.count(Category::Installations) + self.count(Category::Tiles),
            ),
            entry("tickets", self.is_loading(Category::Tickets), self.count(Category::Tickets)),
            entry("realm", self.is_loading(Category::Realm), self.count(Category::Realm)),
        ]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
