use std::collections::HashMap;

use crate::query::filter::{FilterSelection, FilterSet};
use crate::query::params::QueryParams;
use crate::query::record::Record;
use crate::query::sort::basic_sort;
use crate::types::{SortDir, SortSpec};

/// Filter + sort state for one view over a published collection.
///
/// `cache` holds the sorted and filtered records. Once the user re-sorted,
/// filters rebuild from `cache` so the chosen order survives; before that
/// they rebuild from `base`.
#[derive(Debug, Clone)]
pub struct FilteredView<T> {
    base: Vec<T>,
    cache: Vec<T>,
    filters: FilterSet,
    last_sorting: Option<SortSpec>,
    is_sorting_changed: bool,
    is_filters_applied: bool,
}

impl<T: Record + Clone> FilteredView<T> {
    pub fn new(base: Vec<T>, filters: FilterSet) -> Self {
        let mut view = Self {
            cache: base.clone(),
            base,
            filters,
            last_sorting: None,
            is_sorting_changed: false,
            is_filters_applied: false,
        };
        view.recompute();
        view
    }

    pub fn apply_sorting(&mut self, field: &str, dir: SortDir) {
        let source = if self.is_sorting_changed || self.is_filters_applied {
            &self.cache
        } else {
            &self.base
        };
        self.cache = basic_sort(source, field, dir);
        self.last_sorting = Some(SortSpec::new(field, dir));
        self.is_sorting_changed = true;
    }

    pub fn apply_filters(&mut self, selections: &HashMap<String, FilterSelection>) {
        if !selections.is_empty() {
            self.is_filters_applied = true;
        }
        self.filters.update_from_selections(selections);
        self.recompute();
    }

    pub fn load_from_query(&mut self, params: &QueryParams) {
        self.filters.load_from_query(params);
        self.recompute();
    }

    pub fn reset_filters(&mut self) {
        self.filters.reset_all();
        self.is_filters_applied = false;
        self.recompute();
    }

    /// `existing` with this view's filters written over it.
    pub fn query_params(&self, existing: &QueryParams) -> QueryParams {
        let mut params = existing.clone();
        self.filters.write_query(&mut params);
        params
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    #[cfg(test)]
    pub fn items(&self) -> &[T] {
        if self.is_sorting_changed || self.is_filters_applied {
            &self.cache
        } else {
            &self.base
        }
    }

    pub fn into_items(self) -> Vec<T> {
        if self.is_sorting_changed || self.is_filters_applied {
            self.cache
        } else {
            self.base
        }
    }

    fn recompute(&mut self) {
        if self.filters.has_active() {
            let source = if self.is_sorting_changed { &self.cache } else { &self.base };
            self.cache = self.filters.apply(source);
            self.is_filters_applied = true;
        } else {
            self.cache = match &self.last_sorting {
                Some(spec) => basic_sort(&self.base, &spec.field, spec.dir),
                None => self.base.clone(),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::filter::gotchi_filters;
    use crate::types::Gotchi;

    fn gotchi(id: &str, haunt: &str, kinship: f64) -> Gotchi {
        Gotchi {
            id: id.to_string(),
            name: format!("gotchi {id}"),
            haunt_id: haunt.to_string(),
            kinship,
            ..Default::default()
        }
    }

    fn base() -> Vec<Gotchi> {
        vec![gotchi("1", "1", 10.0), gotchi("2", "2", 30.0), gotchi("3", "1", 20.0)]
    }

    fn ids(view: &FilteredView<Gotchi>) -> Vec<String> {
        view.items().iter().map(|g| g.id.clone()).collect()
    }

    #[test]
    fn untouched_view_is_the_base() {
        let view = FilteredView::new(base(), gotchi_filters());
        assert_eq!(ids(&view), ["1", "2", "3"]);
    }

    #[test]
    fn filters_before_sorting_read_from_base() {
        let mut view = FilteredView::new(base(), gotchi_filters());
        view.load_from_query(&QueryParams::parse("hauntId=1"));
        assert_eq!(ids(&view), ["1", "3"]);
    }

    #[test]
    fn sorting_after_filters_keeps_filter() {
        let mut view = FilteredView::new(base(), gotchi_filters());
        view.load_from_query(&QueryParams::parse("hauntId=1"));
        view.apply_sorting("kinship", SortDir::Desc);
        assert_eq!(ids(&view), ["3", "1"]);
    }

    #[test]
    fn filters_after_sorting_keep_sort_order() {
        let mut view = FilteredView::new(base(), gotchi_filters());
        view.apply_sorting("kinship", SortDir::Desc);
        assert_eq!(ids(&view), ["2", "3", "1"]);

        let selections = HashMap::from([(
            "hauntId".to_string(),
            FilterSelection::Values(vec!["1".to_string()]),
        )]);
        view.apply_filters(&selections);
        assert_eq!(ids(&view), ["3", "1"]);
    }

    #[test]
    fn reset_restores_full_collection_in_chosen_order() {
        let mut view = FilteredView::new(base(), gotchi_filters());
        view.apply_sorting("kinship", SortDir::Asc);
        view.load_from_query(&QueryParams::parse("search=3"));
        assert_eq!(ids(&view), ["3"]);

        view.reset_filters();
        assert_eq!(ids(&view), ["1", "3", "2"]);
        assert!(view.query_params(&QueryParams::default()).is_empty());
    }
}
