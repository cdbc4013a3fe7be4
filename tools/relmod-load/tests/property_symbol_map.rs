//! Property 2: Symbol map parsing
//!
//! Any `name -> u32` map written as JSON, with each address given either as
//! an integer or as a `0x` string, parses back to the same map. Addresses
//! outside u32 are rejected as an invalid symbol map.

use proptest::prelude::*;
use relmod_load::error::LoadToolError;
use relmod_load::symbols::{load_symbol_map, parse_symbol_map};
use std::collections::BTreeMap;

fn arb_map() -> impl Strategy<Value = BTreeMap<String, (u32, bool)>> {
    prop::collection::btree_map("[A-Za-z_][A-Za-z0-9_]{0,15}", (any::<u32>(), any::<bool>()), 0..24)
}

fn to_json(map: &BTreeMap<String, (u32, bool)>) -> String {
    let obj: serde_json::Map<String, serde_json::Value> = map
        .iter()
        .map(|(name, (addr, as_hex))| {
            let value = if *as_hex {
                serde_json::Value::String(format!("{:#x}", addr))
            } else {
                serde_json::Value::from(*addr)
            };
            (name.clone(), value)
        })
        .collect();
    serde_json::Value::Object(obj).to_string()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn mixed_forms_parse_back(map in arb_map()) {
        let parsed = parse_symbol_map(&to_json(&map)).unwrap();
        prop_assert_eq!(parsed.len(), map.len());
        for (name, (addr, _)) in &map {
            prop_assert_eq!(parsed.get(name).copied(), Some(*addr));
        }
    }

    #[test]
    fn oversized_address_rejected(name in "[a-z]{1,8}", addr in (u32::MAX as i64 + 1)..i64::MAX) {
        let text = format!("{{\"{}\": {}}}", name, addr);
        let err = parse_symbol_map(&text).unwrap_err();
        prop_assert!(matches!(err, LoadToolError::InvalidSymbolMap { .. }), "unexpected error {:?}", err);
        prop_assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn oversized_hex_rejected(name in "[a-z]{1,8}", addr in (u32::MAX as u64 + 1)..u64::MAX) {
        let text = format!("{{\"{}\": \"{:#x}\"}}", name, addr);
        let err = parse_symbol_map(&text).unwrap_err();
        prop_assert!(matches!(err, LoadToolError::InvalidSymbolMap { .. }), "unexpected error {:?}", err);
    }
}

#[test]
fn symbol_map_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("os_funcs.json");
    std::fs::write(&path, r#"{"printf": 2147749888, "SpuInit": "0x80050000"}"#).unwrap();

    let map = load_symbol_map(&path).unwrap();
    assert_eq!(map["printf"], 0x8004_1000);
    assert_eq!(map["SpuInit"], 0x8005_0000);
}

#[test]
fn malformed_json_is_infrastructure_error() {
    let err = parse_symbol_map("[1, 2, 3]").unwrap_err();
    assert!(matches!(err, LoadToolError::Json(_)));
    assert_eq!(err.exit_code(), 2);
}
