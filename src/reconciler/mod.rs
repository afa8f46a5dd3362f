pub mod warehouse;

pub use warehouse::{equipped_lines, inventory_lines, merge};
