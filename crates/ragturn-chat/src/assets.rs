use std::collections::{BTreeMap, HashSet};

use ragturn_core::types::{Asset, GroupSearchResponse};
use regex::Regex;
use uuid::Uuid;

/// Extract asset UUIDs referenced via markdown image syntax
/// `![label](<uuid>)`. Matches whose second group isn't a valid UUID are
/// silently skipped rather than treated as an error — the surrounding text
/// is free-form model output, not a contract.
pub fn extract_markdown_image_ids(text: &str) -> HashSet<Uuid> {
    let re = Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").expect("static regex is valid");
    re.captures_iter(text)
        .filter_map(|c| Uuid::parse_str(c.get(2).unwrap().as_str()).ok())
        .collect()
}

/// Filter `assets` down to the ones referenced in `text`, deduplicated and
/// in their original arrival order.
pub fn extract_used_assets(text: &str, assets: &[Asset]) -> Vec<Asset> {
    let used_ids = extract_markdown_image_ids(text);
    let mut seen = HashSet::new();
    let mut used = Vec::new();

    for asset in assets {
        if seen.contains(&asset.uuid) {
            continue;
        }
        if let Ok(parsed) = Uuid::parse_str(&asset.uuid) {
            if used_ids.contains(&parsed) {
                seen.insert(asset.uuid.clone());
                used.push(asset.clone());
            }
        }
    }

    used
}

/// Replace asset payload bytes with a placeholder before returning group
/// responses to the caller — the reply's `content.assets` already carries
/// the ones actually used. Takes ownership so the (possibly large) base64
/// payloads are overwritten in place rather than cloned first.
pub fn strip_asset_data(
    mut group_responses: BTreeMap<String, GroupSearchResponse>,
) -> BTreeMap<String, GroupSearchResponse> {
    for response in group_responses.values_mut() {
        for asset in response.assets.iter_mut() {
            asset.data = "<stripped>".to_string();
        }
    }
    group_responses
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(uuid: &str) -> Asset {
        Asset {
            uuid: uuid.to_string(),
            data: "base64data".to_string(),
            description: "d".to_string(),
            mimetype: "image/png".to_string(),
        }
    }

    #[test]
    fn extracts_valid_uuids_only() {
        let text = "![a](616b1f1a-12e7-4ff5-abe2-4920c0d416e0) ![b](not-a-uuid)";
        let ids = extract_markdown_image_ids(text);
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn used_assets_preserve_arrival_order_and_dedup() {
        let id = "616b1f1a-12e7-4ff5-abe2-4920c0d416e0";
        let text = format!("![x]({id}) ![y]({id})");
        let assets = vec![asset("other-uuid"), asset(id)];
        let used = extract_used_assets(&text, &assets);
        assert_eq!(used.len(), 1);
        assert_eq!(used[0].uuid, id);
    }

    #[test]
    fn unused_assets_are_excluded() {
        let assets = vec![asset("616b1f1a-12e7-4ff5-abe2-4920c0d416e0")];
        let used = extract_used_assets("no images here", &assets);
        assert!(used.is_empty());
    }
}
