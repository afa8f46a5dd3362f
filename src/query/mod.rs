pub mod filter;
pub mod params;
pub mod record;
pub mod sort;
pub mod view;

pub use filter::{gotchi_filters, FilterSelection, FilterSet};
pub use params::QueryParams;
pub use sort::sort_by_spec;
pub use view::FilteredView;
