use std::cmp::Ordering;

use crate::types::{Building, Gotchi, InventoryLine, ItemCategory, Lending, Parcel, Ticket};

/// A single field read off a record for sorting or filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Num(f64),
    Text(String),
}

impl FieldValue {
    /// Text form used by equality and substring filters. Whole numbers render
    /// without a fractional part so `1.0` matches the query value `"1"`.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Num(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            FieldValue::Num(n) => n.to_string(),
        }
    }

    fn as_num(&self) -> Option<f64> {
        match self {
            FieldValue::Num(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

/// Ascending comparison. Numbers (including numeric strings such as token
/// ids) compare numerically, other text lexicographically. Missing values
/// sort first.
pub fn compare_fields(a: Option<&FieldValue>, b: Option<&FieldValue>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a.as_num(), b.as_num()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.as_text().cmp(&b.as_text()),
        },
    }
}

/// Named field access shared by every collection the sort and filter
/// engines operate on. Keys use the camelCase names of the wire format.
pub trait Record {
    fn field(&self, key: &str) -> Option<FieldValue>;
}

fn num<T: Into<f64>>(v: T) -> Option<FieldValue> {
    Some(FieldValue::Num(v.into()))
}

fn text(s: &str) -> Option<FieldValue> {
    Some(FieldValue::Text(s.to_string()))
}

impl Record for Gotchi {
    fn field(&self, key: &str) -> Option<FieldValue> {
        match key {
            "id" => text(&self.id),
            "name" => text(&self.name),
            "owner" => text(&self.owner),
            "hauntId" => text(&self.haunt_id),
            "collateral" => text(&self.collateral),
            "baseRarityScore" => num(self.base_rarity_score),
            "modifiedRarityScore" => num(self.modified_rarity_score),
            "kinship" => num(self.kinship),
            "experience" => num(self.experience),
            "level" => num(self.level),
            "createdAt" => Some(FieldValue::Num(self.created_at as f64)),
            "reward" => self.reward.map(FieldValue::Num),
            _ => None,
        }
    }
}

impl Record for Lending {
    fn field(&self, key: &str) -> Option<FieldValue> {
        match key {
            "id" => text(&self.id),
            "gotchiId" => text(&self.gotchi_id),
            "name" | "gotchiName" => text(&self.gotchi_name),
            "borrower" => text(&self.borrower),
            "timeAgreed" => Some(FieldValue::Num(self.time_agreed as f64)),
            "period" => Some(FieldValue::Num(self.period as f64)),
            "endTime" => Some(FieldValue::Num(self.end_time as f64)),
            "fud" => num(self.fud),
            "fomo" => num(self.fomo),
            "alpha" => num(self.alpha),
            "kek" => num(self.kek),
            "totalTokens" => num(self.total_tokens),
            "income" => num(self.income),
            _ => None,
        }
    }
}

impl Record for InventoryLine {
    fn field(&self, key: &str) -> Option<FieldValue> {
        match key {
            "id" => num(self.id),
            "balance" => Some(FieldValue::Num(self.balance as f64)),
            "rarityId" => num(self.rarity_id),
            "category" => text(match self.category {
                ItemCategory::Wearable => "wearable",
                ItemCategory::Consumable => "consumable",
            }),
            _ => None,
        }
    }
}

impl Record for Building {
    fn field(&self, key: &str) -> Option<FieldValue> {
        match key {
            "id" => num(self.id),
            "name" => text(&self.name),
            "level" => self.level.and_then(num),
            "balance" => Some(FieldValue::Num(self.balance as f64)),
            _ => None,
        }
    }
}

impl Record for Ticket {
    fn field(&self, key: &str) -> Option<FieldValue> {
        match key {
            "id" => num(self.id),
            "name" => text(&self.name),
            "balance" => Some(FieldValue::Num(self.balance as f64)),
            _ => None,
        }
    }
}

impl Record for Parcel {
    fn field(&self, key: &str) -> Option<FieldValue> {
        match key {
            "id" => text(&self.id),
            "parcelId" => text(&self.parcel_id),
            "size" => num(self.size),
            "district" => num(self.district),
            "fudBoost" => num(self.fud_boost),
            "fomoBoost" => num(self.fomo_boost),
            "alphaBoost" => num(self.alpha_boost),
            "kekBoost" => num(self.kek_boost),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_strings_compare_numerically() {
        let a = FieldValue::Text("9".to_string());
        let b = FieldValue::Text("10".to_string());
        assert_eq!(compare_fields(Some(&a), Some(&b)), Ordering::Less);
    }

    #[test]
    fn missing_sorts_first() {
        let a = FieldValue::Num(1.0);
        assert_eq!(compare_fields(None, Some(&a)), Ordering::Less);
        assert_eq!(compare_fields(None, None), Ordering::Equal);
    }

    #[test]
    fn nan_compares_consistently() {
        let nan = FieldValue::Num(f64::NAN);
        let one = FieldValue::Num(1.0);
        assert_eq!(compare_fields(Some(&nan), Some(&one)), Ordering::Greater);
        assert_eq!(compare_fields(Some(&one), Some(&nan)), Ordering::Less);
        assert_eq!(compare_fields(Some(&nan), Some(&nan)), Ordering::Equal);
    }

    #[test]
    fn whole_numbers_render_without_fraction() {
        assert_eq!(FieldValue::Num(1.0).as_text(), "1");
        assert_eq!(FieldValue::Num(1.5).as_text(), "1.5");
    }

    #[test]
    fn inventory_category_reads_as_wire_name() {
        let line = InventoryLine {
            id: 126,
            balance: 1,
            rarity: crate::types::Rarity::Common,
            rarity_id: 1,
            category: crate::types::ItemCategory::Consumable,
            holders: None,
        };
        assert_eq!(line.field("category"), Some(FieldValue::Text("consumable".to_string())));
    }
}
