use std::collections::HashMap;

use crate::catalog::item_rarity;
use crate::config::item_ranges;
use crate::types::{Gotchi, InventoryLine, ItemBalance, ItemCategory};

/// Badges and the haunt 1 background sit in wearable slots but are markers,
/// not tradeable items.
pub fn is_cosmetic_marker(item_id: u32) -> bool {
    item_ranges::BADGES.contains(&item_id) || item_id == item_ranges::H1_BACKGROUND
}

fn new_line(id: u32, balance: u64, holders: Option<Vec<String>>) -> InventoryLine {
    let rarity = item_rarity(id);
    InventoryLine {
        id,
        balance,
        rarity,
        rarity_id: rarity.rarity_id(),
        category: ItemCategory::from_item_id(id),
        holders,
    }
}

/// Aggregates the items equipped across `gotchis` into one line per item id,
/// recording every gotchi wearing it.
pub fn equipped_lines(gotchis: &[Gotchi]) -> Vec<InventoryLine> {
    let mut lines: Vec<InventoryLine> = Vec::new();
    let mut index: HashMap<u32, usize> = HashMap::new();

    for gotchi in gotchis {
        for &item_id in &gotchi.equipped_wearables {
            if item_id == item_ranges::EMPTY_SLOT || is_cosmetic_marker(item_id) {
                continue;
            }
            match index.get(&item_id) {
                Some(&idx) => {
                    let line = &mut lines[idx];
                    line.balance += 1;
                    line.holders.get_or_insert_with(Vec::new).push(gotchi.id.clone());
                }
                None => {
                    index.insert(item_id, lines.len());
                    lines.push(new_line(item_id, 1, Some(vec![gotchi.id.clone()])));
                }
            }
        }
    }

    lines
}

/// Lines for raw wallet balances. Wallet balances carry no holder attribution.
pub fn inventory_lines(balances: &[ItemBalance]) -> Vec<InventoryLine> {
    balances
        .iter()
        .map(|b| new_line(b.item_id, b.balance, None))
        .collect()
}

/// Folds `incoming` into `existing`, keyed by item id.
///
/// Quantities add up. Holders are last-writer-wins: a contribution that
/// attributes holders replaces the previous list, one that doesn't (raw
/// balances) leaves it alone. First-seen order of ids is preserved.
pub fn merge(existing: Vec<InventoryLine>, incoming: Vec<InventoryLine>) -> Vec<InventoryLine> {
    let mut merged: Vec<InventoryLine> = Vec::with_capacity(existing.len() + incoming.len());
    let mut index: HashMap<u32, usize> = HashMap::new();

    for line in existing.into_iter().chain(incoming) {
        match index.get(&line.id) {
            Some(&idx) => {
                let current = &mut merged[idx];
                current.balance += line.balance;
                if line.holders.is_some() {
                    current.holders = line.holders;
                }
            }
            None => {
                index.insert(line.id, merged.len());
                merged.push(new_line(line.id, line.balance, line.holders));
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gotchi(id: &str, wearables: &[u32]) -> Gotchi {
        Gotchi {
            id: id.to_string(),
            equipped_wearables: wearables.to_vec(),
            ..Default::default()
        }
    }

    fn balance_of(lines: &[InventoryLine], id: u32) -> Option<u64> {
        lines.iter().find(|l| l.id == id).map(|l| l.balance)
    }

    #[test]
    fn equipped_items_aggregate_with_holders() {
        let lines = equipped_lines(&[gotchi("10", &[1, 0, 2]), gotchi("11", &[1])]);
        assert_eq!(lines.len(), 2);
        assert_eq!(balance_of(&lines, 1), Some(2));
        assert_eq!(lines[0].holders.as_deref(), Some(&["10".to_string(), "11".to_string()][..]));
    }

    #[test]
    fn cosmetic_markers_are_never_counted() {
        let lines = equipped_lines(&[gotchi("1", &[162, 180, 198, 210, 5])]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].id, 5);

        let merged = merge(lines, equipped_lines(&[gotchi("2", &[170, 210])]));
        assert_eq!(merged.len(), 1);
        assert_eq!(balance_of(&merged, 5), Some(1));
    }

    #[test]
    fn quantities_are_additive() {
        let a = inventory_lines(&[ItemBalance { item_id: 7, balance: 4 }]);
        let b = inventory_lines(&[ItemBalance { item_id: 7, balance: 9 }]);
        let merged = merge(a, b);
        assert_eq!(merged.len(), 1);
        assert_eq!(balance_of(&merged, 7), Some(13));
    }

    #[test]
    fn merge_order_does_not_change_quantities() {
        let equipped = equipped_lines(&[gotchi("1", &[3, 4]), gotchi("2", &[3])]);
        let raw = inventory_lines(&[
            ItemBalance { item_id: 3, balance: 5 },
            ItemBalance { item_id: 126, balance: 2 },
        ]);

        let ab = merge(merge(Vec::new(), equipped.clone()), raw.clone());
        let ba = merge(merge(Vec::new(), raw), equipped);
        for id in [3, 4, 126] {
            assert_eq!(balance_of(&ab, id), balance_of(&ba, id), "item {id}");
        }
        assert_eq!(balance_of(&ab, 3), Some(7));
    }

    #[test]
    fn holders_are_last_writer_wins() {
        let first = equipped_lines(&[gotchi("1", &[3])]);
        let second = equipped_lines(&[gotchi("2", &[3])]);
        let merged = merge(first, second);
        assert_eq!(merged[0].holders, Some(vec!["2".to_string()]));
    }

    #[test]
    fn raw_balances_keep_existing_holders() {
        let equipped = equipped_lines(&[gotchi("42", &[5])]);
        let raw = inventory_lines(&[ItemBalance { item_id: 5, balance: 2 }]);

        let merged = merge(equipped, raw);
        assert_eq!(balance_of(&merged, 5), Some(3));
        assert_eq!(merged[0].holders, Some(vec!["42".to_string()]));
    }

    #[test]
    fn new_lines_are_classified_by_id() {
        let merged = merge(Vec::new(), inventory_lines(&[ItemBalance { item_id: 127, balance: 1 }]));
        assert_eq!(merged[0].category, ItemCategory::Consumable);
        assert_eq!(merged[0].rarity_id, item_rarity(127).rarity_id());
    }
}
