//! Static id → metadata tables for items, installations, tiles and tickets,
//! plus decoding of the chain reader's hex-encoded balances.
//!
//! Lookups never fail: unknown ids resolve to a placeholder so a single
//! unrecognised token cannot empty a whole category.

use tracing::debug;

use crate::types::{Building, BuildingKind, RawTokenBalance, Rarity, Ticket};

pub const UNKNOWN_NAME: &str = "Unknown";

/// Token id given to entries whose id does not decode; no table lists it.
pub const PLACEHOLDER_ID: u32 = u32::MAX;

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Wearable and consumable rarities, sorted by id for binary search.
const ITEM_RARITIES: &[(u32, Rarity)] = &[
    (1, Rarity::Common),
    (2, Rarity::Common),
    (3, Rarity::Common),
    (4, Rarity::Common),
    (5, Rarity::Common),
    (6, Rarity::Uncommon),
    (7, Rarity::Uncommon),
    (8, Rarity::Uncommon),
    (9, Rarity::Uncommon),
    (10, Rarity::Rare),
    (11, Rarity::Rare),
    (12, Rarity::Rare),
    (13, Rarity::Legendary),
    (14, Rarity::Legendary),
    (15, Rarity::Legendary),
    (16, Rarity::Mythical),
    (17, Rarity::Mythical),
    (18, Rarity::Godlike),
    (19, Rarity::Common),
    (20, Rarity::Common),
    (21, Rarity::Uncommon),
    (22, Rarity::Uncommon),
    (23, Rarity::Rare),
    (24, Rarity::Rare),
    (25, Rarity::Legendary),
    (26, Rarity::Mythical),
    (27, Rarity::Godlike),
    (28, Rarity::Common),
    (29, Rarity::Common),
    (30, Rarity::Uncommon),
    (31, Rarity::Rare),
    (32, Rarity::Legendary),
    (33, Rarity::Mythical),
    (34, Rarity::Godlike),
    (126, Rarity::Common),
    (127, Rarity::Uncommon),
    (128, Rarity::Rare),
    (129, Rarity::Legendary),
    (199, Rarity::Godlike),
    (200, Rarity::Common),
    (201, Rarity::Uncommon),
    (202, Rarity::Rare),
    (203, Rarity::Legendary),
    (204, Rarity::Mythical),
    (205, Rarity::Godlike),
];

pub fn item_rarity(id: u32) -> Rarity {
    ITEM_RARITIES
        .binary_search_by_key(&id, |&(item_id, _)| item_id)
        .map(|idx| ITEM_RARITIES[idx].1)
        .unwrap_or(Rarity::Unknown)
}

// ---------------------------------------------------------------------------
// Installations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallationType {
    Altar,
    Harvester,
    Reservoir,
    GotchiLodge,
    Wall,
    NftDisplay,
    BuildqueueBooster,
    Decoration,
    Unknown,
}

/// `(first_id, levels, name, type)`. Ids inside a series are consecutive
/// levels starting at 1.
const INSTALLATION_SERIES: &[(u32, u32, &str, InstallationType)] = &[
    (1, 9, "Aaltar", InstallationType::Altar),
    (10, 9, "FUD Reservoir", InstallationType::Reservoir),
    (19, 9, "FOMO Reservoir", InstallationType::Reservoir),
    (28, 9, "ALPHA Reservoir", InstallationType::Reservoir),
    (37, 9, "KEK Reservoir", InstallationType::Reservoir),
    (56, 9, "FUD Harvester", InstallationType::Harvester),
    (65, 9, "FOMO Harvester", InstallationType::Harvester),
    (74, 9, "ALPHA Harvester", InstallationType::Harvester),
    (83, 9, "KEK Harvester", InstallationType::Harvester),
    (92, 1, "Gotchi Lodge", InstallationType::GotchiLodge),
    (93, 1, "Brick Wall", InstallationType::Wall),
    (94, 1, "NFT Display", InstallationType::NftDisplay),
    (95, 1, "Buildqueue Booster", InstallationType::BuildqueueBooster),
    (96, 4, "Garden Decoration", InstallationType::Decoration),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationMeta {
    pub name: String,
    pub level: u32,
    pub installation_type: InstallationType,
}

pub fn installation(id: u32) -> InstallationMeta {
    INSTALLATION_SERIES
        .iter()
        .find(|(first, levels, _, _)| id >= *first && id < first + levels)
        .map(|&(first, _, name, installation_type)| InstallationMeta {
            name: name.to_string(),
            level: id - first + 1,
            installation_type,
        })
        .unwrap_or_else(|| InstallationMeta {
            name: UNKNOWN_NAME.to_string(),
            level: 0,
            installation_type: InstallationType::Unknown,
        })
}

/// Hours between channelings for an altar of the given level.
pub fn cooldown_hours(level: u32) -> u32 {
    match level {
        1 => 24,
        2 => 18,
        3 => 12,
        4 => 8,
        5 => 6,
        6 => 4,
        7 => 3,
        8 => 2,
        9 => 1,
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// Tiles, tickets
// ---------------------------------------------------------------------------

const TILE_NAMES: &[(u32, &str)] = &[
    (1, "LE Golden Tile - Gotchiverse"),
    (2, "LE Golden Tile - Portal"),
    (3, "LE Golden Tile - Gotchi"),
    (4, "LE Purple Grass"),
    (5, "LE Cyan Grass"),
    (6, "LE Red Grass"),
    (7, "LE Stone Tile"),
    (8, "LE Sand Tile"),
];

pub fn tile_name(id: u32) -> String {
    TILE_NAMES
        .iter()
        .find(|(tile_id, _)| *tile_id == id)
        .map_or_else(|| UNKNOWN_NAME.to_string(), |(_, name)| (*name).to_string())
}

const TICKET_NAMES: &[&str] = &["common", "uncommon", "rare", "legendary", "mythical", "godlike", "drop"];

pub fn ticket_name(id: u32) -> String {
    TICKET_NAMES
        .get(id as usize)
        .map_or_else(|| UNKNOWN_NAME.to_string(), |name| (*name).to_string())
}

// ---------------------------------------------------------------------------
// Collaterals
// ---------------------------------------------------------------------------

/// `(name, token address)` of the collaterals a gotchi can be summoned with.
pub const COLLATERALS: &[(&str, &str)] = &[
    ("maDAI", "0xe0b22e0037b130a9f56bbb537684e6fa18192341"),
    ("maWETH", "0x20d3922b4a1a8560e1ac99fba4fade0c849e2142"),
    ("maAAVE", "0x823cd4264c1b951c9209ad0deaea9988fe8429bf"),
    ("maLINK", "0x98ea609569bd25119707451ef982b90e3eb719cd"),
    ("maUSDT", "0xdae5f1590db13e3b40423b5b5c5fbf175515910b"),
    ("maUSDC", "0x9719d867a500ef117cc201206b8ab51e794d3f82"),
    ("maTUSD", "0xf4b8888427b00d7caf21654408b7cba2ecf4ebd9"),
    ("maUNI", "0x8c8bdbe9cee455732525086264a4bf9cf821c498"),
    ("maYFI", "0xe20f7d1f0ec39c4d5db01f53554f2ef54c71f613"),
];

// ---------------------------------------------------------------------------
// Hex decoding
// ---------------------------------------------------------------------------

/// `"0x0a"` → 10. An empty payload (`"0x"`) is zero.
pub fn decode_hex_u64(s: &str) -> Option<u64> {
    let digits = s.trim().trim_start_matches("0x").trim_start_matches("0X");
    if digits.is_empty() {
        return Some(0);
    }
    u64::from_str_radix(digits, 16).ok()
}

fn decode_or_zero(s: &str, what: &str) -> u64 {
    decode_hex_u64(s).unwrap_or_else(|| {
        debug!("undecodable {what} {s:?}, using 0");
        0
    })
}

fn decode_id(s: &str, what: &str) -> u32 {
    decode_hex_u64(s)
        .and_then(|id| u32::try_from(id).ok())
        .unwrap_or_else(|| {
            debug!("undecodable {what} {s:?}, using placeholder");
            PLACEHOLDER_ID
        })
}

pub fn decode_installation(raw: &RawTokenBalance) -> Building {
    let id = decode_id(&raw.token_id_hex, "installation id");
    let meta = installation(id);
    Building {
        kind: BuildingKind::Installation,
        id,
        name: meta.name,
        level: Some(meta.level),
        balance: decode_or_zero(&raw.balance_hex, "installation balance"),
        cooldown_hours: Some(cooldown_hours(meta.level)),
    }
}

pub fn decode_tile(raw: &RawTokenBalance) -> Building {
    let id = decode_id(&raw.token_id_hex, "tile id");
    Building {
        kind: BuildingKind::Tile,
        id,
        name: tile_name(id),
        level: None,
        balance: decode_or_zero(&raw.balance_hex, "tile balance"),
        cooldown_hours: None,
    }
}

pub fn decode_ticket(raw: &RawTokenBalance) -> Ticket {
    let id = decode_id(&raw.token_id_hex, "ticket id");
    Ticket {
        id,
        name: ticket_name(id),
        balance: decode_or_zero(&raw.balance_hex, "ticket balance"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, balance: &str) -> RawTokenBalance {
        RawTokenBalance { token_id_hex: id.to_string(), balance_hex: balance.to_string() }
    }

    #[test]
    fn item_rarity_table_is_sorted() {
        assert!(ITEM_RARITIES.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn unknown_item_is_placeholder_rarity() {
        assert_eq!(item_rarity(1), Rarity::Common);
        assert_eq!(item_rarity(9_999), Rarity::Unknown);
    }

    #[test]
    fn installation_level_follows_series_offset() {
        let meta = installation(3);
        assert_eq!(meta.name, "Aaltar");
        assert_eq!(meta.level, 3);
        assert_eq!(meta.installation_type, InstallationType::Altar);

        let unknown = installation(5_000);
        assert_eq!(unknown.name, UNKNOWN_NAME);
        assert_eq!(unknown.level, 0);
    }

    #[test]
    fn hex_decoding() {
        assert_eq!(decode_hex_u64("0x0a"), Some(10));
        assert_eq!(decode_hex_u64("0x"), Some(0));
        assert_eq!(decode_hex_u64("0xzz"), None);
    }

    #[test]
    fn decode_installation_uses_lookup_and_cooldown() {
        let b = decode_installation(&raw("0x02", "0x03"));
        assert_eq!(b.kind, BuildingKind::Installation);
        assert_eq!(b.id, 2);
        assert_eq!(b.level, Some(2));
        assert_eq!(b.balance, 3);
        assert_eq!(b.cooldown_hours, Some(18));
    }

    #[test]
    fn malformed_tile_falls_back_to_placeholder() {
        let b = decode_tile(&raw("garbage", "0x01"));
        assert_eq!(b.id, PLACEHOLDER_ID);
        assert_eq!(b.name, UNKNOWN_NAME);
        assert_eq!(b.balance, 1);
    }

    #[test]
    fn oversized_ticket_id_is_not_truncated() {
        // 2^32 would wrap to id 0, the common ticket
        let t = decode_ticket(&raw("0x100000000", "0x02"));
        assert_eq!(t.id, PLACEHOLDER_ID);
        assert_eq!(t.name, UNKNOWN_NAME);
        assert_eq!(t.balance, 2);

        let t = decode_ticket(&raw("0x06", "0x01"));
        assert_eq!((t.id, t.name.as_str()), (6, "drop"));
    }

    #[test]
    fn ticket_names_by_index() {
        assert_eq!(ticket_name(0), "common");
        assert_eq!(ticket_name(6), "drop");
        assert_eq!(ticket_name(7), UNKNOWN_NAME);
    }
}
