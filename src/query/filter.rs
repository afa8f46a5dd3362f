use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::COLLATERALS;
use crate::query::params::QueryParams;
use crate::query::record::Record;

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// How a descriptor compares its selection against a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Record value must be one of the selected items.
    Equals,
    /// Any configured record key must contain the text value, ignoring case.
    Contains,
}

/// Input shape presented to the user. Independent of [`FilterMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterWidget {
    MultipleAutocomplete,
    Input,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterItem {
    pub title: String,
    /// Compared against the record field.
    pub value: String,
    pub is_selected: bool,
    /// Representation used in the query string.
    pub query_param_value: String,
}

impl FilterItem {
    pub fn new(title: &str, value: &str, query_param_value: &str) -> Self {
        Self {
            title: title.to_string(),
            value: value.to_string(),
            is_selected: false,
            query_param_value: query_param_value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDescriptor {
    pub key: String,
    pub mode: FilterMode,
    pub widget: FilterWidget,
    pub placeholder: String,
    /// Selectable items (equality filters).
    pub items: Vec<FilterItem>,
    /// Record keys searched by substring filters; empty means `key` itself.
    pub keys: Vec<String>,
    /// Current text (substring filters).
    pub value: String,
    pub is_filter_active: bool,
}

/// A selection coming from the filter panel rather than the query string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FilterSelection {
    Values(Vec<String>),
    Text(String),
}

impl FilterDescriptor {
    pub fn equals(key: &str, placeholder: &str, items: Vec<FilterItem>) -> Self {
        Self {
            key: key.to_string(),
            mode: FilterMode::Equals,
            widget: FilterWidget::MultipleAutocomplete,
            placeholder: placeholder.to_string(),
            items,
            keys: Vec::new(),
            value: String::new(),
            is_filter_active: false,
        }
    }

    pub fn contains(key: &str, placeholder: &str, keys: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            mode: FilterMode::Contains,
            widget: FilterWidget::Input,
            placeholder: placeholder.to_string(),
            items: Vec::new(),
            keys: keys.iter().map(|k| (*k).to_string()).collect(),
            value: String::new(),
            is_filter_active: false,
        }
    }

    pub fn predicate<R: Record>(&self, record: &R) -> bool {
        self.mode.predicate(self, record, &self.key)
    }

    pub fn reset(&mut self) {
        self.mode.reset(self);
    }

    pub fn load_from_query(&mut self, parts: &[String]) {
        self.mode.load_from_query(self, parts);
    }

    pub fn to_query_param(&self) -> Option<Vec<String>> {
        self.mode.to_query_param(self)
    }

    pub fn update_from_selection(&mut self, selection: &FilterSelection) {
        self.mode.update_from_selection(self, selection);
    }

    fn selected_values(&self) -> impl Iterator<Item = &FilterItem> {
        self.items.iter().filter(|item| item.is_selected)
    }
}

// ---------------------------------------------------------------------------
// Per-mode behaviour
// ---------------------------------------------------------------------------

impl FilterMode {
    pub fn predicate<R: Record>(self, d: &FilterDescriptor, record: &R, key: &str) -> bool {
        match self {
            FilterMode::Equals => {
                let mut selected = d.selected_values().peekable();
                if selected.peek().is_none() {
                    return true;
                }
                let Some(field) = record.field(key) else {
                    return false;
                };
                let field = field.as_text();
                selected.any(|item| item.value.eq_ignore_ascii_case(&field))
            }
            FilterMode::Contains => {
                let needle = d.value.to_lowercase();
                let key_owned = [key.to_string()];
                let keys = if d.keys.is_empty() { &key_owned[..] } else { &d.keys[..] };
                keys.iter().any(|k| {
                    record
                        .field(k)
                        .is_some_and(|v| v.as_text().to_lowercase().contains(&needle))
                })
            }
        }
    }

    pub fn reset(self, d: &mut FilterDescriptor) {
        match self {
            FilterMode::Equals => d.items.iter_mut().for_each(|item| item.is_selected = false),
            FilterMode::Contains => d.value.clear(),
        }
        d.is_filter_active = false;
    }

    pub fn load_from_query(self, d: &mut FilterDescriptor, parts: &[String]) {
        match self {
            FilterMode::Equals => {
                for item in &mut d.items {
                    item.is_selected = parts
                        .iter()
                        .any(|p| p.eq_ignore_ascii_case(&item.query_param_value));
                }
                d.is_filter_active = d.items.iter().any(|item| item.is_selected);
            }
            FilterMode::Contains => {
                d.value = parts.join(",");
                d.is_filter_active = !d.value.is_empty();
            }
        }
    }

    pub fn to_query_param(self, d: &FilterDescriptor) -> Option<Vec<String>> {
        if !d.is_filter_active {
            return None;
        }
        match self {
            FilterMode::Equals => Some(
                d.selected_values()
                    .map(|item| item.query_param_value.clone())
                    .collect(),
            ),
            FilterMode::Contains => Some(vec![d.value.clone()]),
        }
    }

    pub fn update_from_selection(self, d: &mut FilterDescriptor, selection: &FilterSelection) {
        match (self, selection) {
            (FilterMode::Equals, FilterSelection::Values(values)) => {
                for item in &mut d.items {
                    item.is_selected = values.iter().any(|v| v == &item.value);
                }
                d.is_filter_active = d.items.iter().any(|item| item.is_selected);
            }
            (FilterMode::Equals, FilterSelection::Text(value)) => {
                self.update_from_selection(d, &FilterSelection::Values(vec![value.clone()]));
            }
            (FilterMode::Contains, FilterSelection::Text(value)) => {
                d.value = value.clone();
                d.is_filter_active = !d.value.is_empty();
            }
            (FilterMode::Contains, FilterSelection::Values(values)) => {
                self.update_from_selection(d, &FilterSelection::Text(values.join(",")));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// FilterSet
// ---------------------------------------------------------------------------

/// Ordered set of descriptors composed by logical AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSet {
    filters: Vec<FilterDescriptor>,
}

impl FilterSet {
    pub fn new(filters: Vec<FilterDescriptor>) -> Self {
        Self { filters }
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&FilterDescriptor> {
        self.filters.iter().find(|f| f.key == key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut FilterDescriptor> {
        self.filters.iter_mut().find(|f| f.key == key)
    }

    pub fn has_active(&self) -> bool {
        self.filters.iter().any(|f| f.is_filter_active)
    }

    /// Inactive descriptors are vacuously satisfied.
    pub fn matches<R: Record>(&self, record: &R) -> bool {
        self.filters
            .iter()
            .all(|f| !f.is_filter_active || f.predicate(record))
    }

    pub fn apply<R: Record + Clone>(&self, records: &[R]) -> Vec<R> {
        records.iter().filter(|r| self.matches(*r)).cloned().collect()
    }

    pub fn reset_all(&mut self) {
        self.filters.iter_mut().for_each(FilterDescriptor::reset);
    }

    /// The query string is authoritative: keys it does not mention reset.
    pub fn load_from_query(&mut self, params: &QueryParams) {
        for filter in &mut self.filters {
            match params.get(&filter.key) {
                Some(parts) => filter.load_from_query(parts),
                None => filter.reset(),
            }
        }
    }

    /// Applies panel selections; descriptors without a selection keep theirs.
    pub fn update_from_selections(&mut self, selections: &HashMap<String, FilterSelection>) {
        for (key, selection) in selections {
            match self.get_mut(key) {
                Some(filter) => filter.update_from_selection(selection),
                None => debug!(key = %key, "ignoring selection for unknown filter"),
            }
        }
    }

    /// Writes active filters into `params` and removes inactive ones, leaving
    /// unrelated keys alone.
    pub fn write_query(&self, params: &mut QueryParams) {
        for filter in &self.filters {
            match filter.to_query_param() {
                Some(parts) => params.set(&filter.key, parts),
                None => params.remove(&filter.key),
            }
        }
    }
}

/// Filters offered on the gotchis view.
pub fn gotchi_filters() -> FilterSet {
    let haunts = vec![FilterItem::new("Haunt 1", "1", "1"), FilterItem::new("Haunt 2", "2", "2")];
    let collaterals = COLLATERALS
        .iter()
        .map(|(name, address)| FilterItem::new(name, address, &name.to_lowercase()))
        .collect();

    FilterSet::new(vec![
        FilterDescriptor::equals("hauntId", "HauntId", haunts),
        FilterDescriptor::equals("collateral", "Collateral", collaterals),
        FilterDescriptor::contains("search", "Name&Id", &["id", "name"]),
    ])
}
