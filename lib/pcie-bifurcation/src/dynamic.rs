// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::path::Path;

use crate::inventory::{InventoryClient, InventoryError, JsonInventory};
use crate::BifurcationProvider;

/// Inventory path of the main board, whose immediate children are the
/// candidate slots.
pub const MAIN_BOARD: &str = "/xyz/openbmc_project/inventory/system/board";

/// Bifurcation computed by walking the live inventory graph.
///
/// Each call re-walks the graph from scratch; nothing is cached.
pub struct BifurcationDynamic<C> {
    client: C,
    main_board: String,
}

impl<C: InventoryClient> BifurcationDynamic<C> {
    pub fn new(client: C) -> Self {
        Self::with_main_board(client, MAIN_BOARD)
    }

    pub fn with_main_board(client: C, main_board: impl Into<String>) -> Self {
        Self {
            client,
            main_board: main_board.into(),
        }
    }

    pub fn main_board(&self) -> &str {
        &self.main_board
    }

    /// Resolves the lanes used below `path`.
    ///
    /// - A device is a leaf: its own max lanes is the whole answer.
    /// - A slot's answer is the concatenation of its children's answers, plus
    ///   one entry for whatever capacity they leave unused. If the children
    ///   need more than the slot provides, the slot resolves to nothing.
    /// - Anything else resolves to nothing.
    pub fn parse_devices(&self, path: &str) -> Vec<u8> {
        let mut active = HashSet::new();
        narrow(self.walk(path, &mut active))
    }

    // `active` holds the paths on the current branch of the walk; meeting one
    // of them again means the graph has a cycle, and we treat the repeat as a
    // dead end. A path shared by two different parents is still walked once
    // for each.
    //
    // Widths stay `u64` until the walk is done, so a slot's capacity is
    // checked against what its devices really claim.
    fn walk(&self, path: &str, active: &mut HashSet<String>) -> Vec<u64> {
        // The device check has to come first: a device that also happens to
        // look like a slot is still a device.
        if let Some(max_lanes) = self.client.max_lanes_of(path) {
            return vec![max_lanes];
        }

        let Some(slot_lanes) = self.client.lanes_of(path) else {
            return vec![];
        };

        if !active.insert(path.to_owned()) {
            log::warn!("inventory cycle through {path}; ignoring repeat");
            return vec![];
        }

        let mut lanes = vec![];
        for child in self.client.children_of(path) {
            lanes.extend(self.walk(&child, active));
        }

        active.remove(path);

        let total = lanes.iter().fold(0u64, |sum, &n| sum.saturating_add(n));
        if total > slot_lanes {
            log::warn!(
                "{path}: devices need {total} lanes but slot only has \
                 {slot_lanes}"
            );
            return vec![];
        }
        if total < slot_lanes {
            lanes.push(slot_lanes - total);
        }

        lanes
    }
}

impl BifurcationDynamic<JsonInventory> {
    /// Builds a provider over an inventory described by a JSON file, rooted
    /// at `main_board`.
    pub fn from_inventory_file(
        path: &Path,
        main_board: impl Into<String>,
    ) -> Result<Self, InventoryError> {
        let client = JsonInventory::from_file(path)?;
        Ok(Self::with_main_board(client, main_board))
    }
}

impl<C: InventoryClient> BifurcationProvider for BifurcationDynamic<C> {
    /// Of all the main board's children on bus `index`, picks the one with
    /// the most entries in its bifurcation. Equal lengths keep the earlier
    /// child; everything learned from the losers is discarded.
    fn get_bifurcation(&self, index: u8) -> Option<Vec<u8>> {
        let mut active = HashSet::from([self.main_board.clone()]);
        let mut best = vec![];

        for child in self.client.children_of(&self.main_board) {
            if self.client.bus_number_of(&child) != Some(index) {
                continue;
            }
            let candidate = self.walk(&child, &mut active);
            if candidate.len() > best.len() {
                log::debug!("bus {index}: {child} gives {candidate:?}");
                best = candidate;
            }
        }

        Some(narrow(best))
    }
}

/// Lane counts travel as bytes; nothing real is wider than that.
fn narrow(lanes: Vec<u64>) -> Vec<u8> {
    lanes
        .into_iter()
        .map(|n| u8::try_from(n).unwrap_or(u8::MAX))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryObject;
    use serde_json::json;
    use std::cell::RefCell;

    fn provider(
        objects: serde_json::Value,
    ) -> BifurcationDynamic<JsonInventory> {
        let inventory =
            JsonInventory::from_value(json!({ "objects": objects })).unwrap();
        BifurcationDynamic::with_main_board(inventory, "/mb")
    }

    #[test]
    fn leaf_device() {
        let p = provider(json!({ "/dev": { "max-lanes": 8 } }));
        assert_eq!(p.parse_devices("/dev"), vec![8]);
    }

    #[test]
    fn neither_device_nor_slot() {
        let p = provider(json!({ "/thing": { "bus": 1 } }));
        assert_eq!(p.parse_devices("/thing"), Vec::<u8>::new());
        assert_eq!(p.parse_devices("/missing"), Vec::<u8>::new());
    }

    #[test]
    fn leftover_lanes() {
        let p = provider(json!({
            "/slot": { "lanes": 16, "children": ["/slot/a", "/slot/b"] },
            "/slot/a": { "max-lanes": 8 },
            "/slot/b": { "max-lanes": 4 },
        }));
        assert_eq!(p.parse_devices("/slot"), vec![8, 4, 4]);
    }

    #[test]
    fn exactly_full_slot() {
        let p = provider(json!({
            "/slot": { "lanes": 16, "children": ["/slot/a", "/slot/b"] },
            "/slot/a": { "max-lanes": 8 },
            "/slot/b": { "max-lanes": 8 },
        }));
        assert_eq!(p.parse_devices("/slot"), vec![8, 8]);
    }

    #[test]
    fn empty_slot_is_all_leftover() {
        let p = provider(json!({ "/slot": { "lanes": 16 } }));
        assert_eq!(p.parse_devices("/slot"), vec![16]);

        let p = provider(json!({ "/slot": { "lanes": 0 } }));
        assert_eq!(p.parse_devices("/slot"), Vec::<u8>::new());
    }

    #[test]
    fn overflow() {
        let p = provider(json!({
            "/slot": { "lanes": 8, "children": ["/slot/a", "/slot/b"] },
            "/slot/a": { "max-lanes": 8 },
            "/slot/b": { "max-lanes": 4 },
        }));
        assert_eq!(p.parse_devices("/slot"), Vec::<u8>::new());
    }

    // An overflowing riser contributes nothing to its parent, which then
    // counts its lanes as unused.
    #[test]
    fn overflow_in_nested_slot() {
        let p = provider(json!({
            "/slot": { "lanes": 16, "children": ["/slot/riser", "/slot/nic"] },
            "/slot/riser": { "lanes": 4, "children": ["/slot/riser/ssd"] },
            "/slot/riser/ssd": { "max-lanes": 8 },
            "/slot/nic": { "max-lanes": 4 },
        }));
        assert_eq!(p.parse_devices("/slot"), vec![4, 12]);
    }

    #[test]
    fn nested_slots() {
        let p = provider(json!({
            "/slot": { "lanes": 16, "children": ["/slot/riser", "/slot/nic"] },
            "/slot/riser": { "lanes": 8, "children": ["/slot/riser/ssd"] },
            "/slot/riser/ssd": { "max-lanes": 4 },
            "/slot/nic": { "max-lanes": 4 },
        }));
        assert_eq!(p.parse_devices("/slot"), vec![4, 4, 4, 4]);
    }

    #[test]
    fn device_wins_over_slot() {
        let p = provider(json!({
            "/both": { "max-lanes": 4, "lanes": 16, "children": ["/both/x"] },
            "/both/x": { "max-lanes": 8 },
        }));
        assert_eq!(p.parse_devices("/both"), vec![4]);
    }

    #[test]
    fn wide_values_saturate() {
        let p = provider(json!({
            "/dev": { "max-lanes": 1000 },
            "/slot": { "lanes": 1000 },
        }));
        assert_eq!(p.parse_devices("/dev"), vec![255]);
        assert_eq!(p.parse_devices("/slot"), vec![255]);
    }

    #[test]
    fn wide_device_overflows_before_narrowing() {
        let p = provider(json!({
            "/slot": { "lanes": 256, "children": ["/slot/d"] },
            "/slot/d": { "max-lanes": 300 },
        }));
        assert_eq!(p.parse_devices("/slot"), Vec::<u8>::new());

        let p = provider(json!({
            "/slot": { "lanes": 600, "children": ["/slot/d"] },
            "/slot/d": { "max-lanes": 300 },
        }));
        assert_eq!(p.parse_devices("/slot"), vec![255, 255]);
    }

    #[test]
    fn from_inventory_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let document = json!({
            "objects": {
                "/mb": { "children": ["/mb/pe1"] },
                "/mb/pe1": { "bus": 1, "lanes": 8 },
            }
        });
        std::fs::write(file.path(), document.to_string()).unwrap();

        let p = BifurcationDynamic::from_inventory_file(file.path(), "/mb")
            .unwrap();
        assert_eq!(p.main_board(), "/mb");
        assert_eq!(p.get_bifurcation(1), Some(vec![8]));

        let missing = file.path().with_extension("gone");
        assert!(matches!(
            BifurcationDynamic::from_inventory_file(&missing, "/mb"),
            Err(InventoryError::Io(_))
        ));
    }

    #[test]
    fn cycle_is_a_dead_end() {
        let p = provider(json!({
            "/a": { "lanes": 16, "children": ["/b"] },
            "/b": { "lanes": 8, "children": ["/a", "/dev"] },
            "/dev": { "max-lanes": 2 },
        }));
        // "/b" sees "/a" again and counts it as nothing: [2, 6]; "/a" then
        // adds its own leftover of 8.
        assert_eq!(p.parse_devices("/a"), vec![2, 6, 8]);
    }

    #[test]
    fn shared_child_walked_per_parent() {
        let p = provider(json!({
            "/slot": { "lanes": 16, "children": ["/r1", "/r2"] },
            "/r1": { "lanes": 4, "children": ["/dev"] },
            "/r2": { "lanes": 4, "children": ["/dev"] },
            "/dev": { "max-lanes": 4 },
        }));
        assert_eq!(p.parse_devices("/slot"), vec![4, 4, 8]);
    }

    #[test]
    fn top_level_filters_by_bus() {
        let p = provider(json!({
            "/mb": { "children": ["/mb/pe1", "/mb/pe2"] },
            "/mb/pe1": { "bus": 1, "lanes": 16, "children": ["/mb/pe1/nic"] },
            "/mb/pe1/nic": { "max-lanes": 8 },
            "/mb/pe2": { "bus": 2, "lanes": 8 },
        }));
        assert_eq!(p.get_bifurcation(1), Some(vec![8, 8]));
        assert_eq!(p.get_bifurcation(2), Some(vec![8]));
        assert_eq!(p.get_bifurcation(3), Some(vec![]));
    }

    #[test]
    fn richest_branch_wins() {
        let p = provider(json!({
            "/mb": { "children": ["/mb/big", "/mb/split"] },
            "/mb/big": { "bus": 5, "lanes": 16, "children": ["/mb/big/gpu"] },
            "/mb/big/gpu": { "max-lanes": 16 },
            "/mb/split": { "bus": 5, "lanes": 8, "children": ["/mb/split/a", "/mb/split/b"] },
            "/mb/split/a": { "max-lanes": 2 },
            "/mb/split/b": { "max-lanes": 2 },
        }));
        // [16] sums higher, but [2, 2, 4] has more entries.
        assert_eq!(p.get_bifurcation(5), Some(vec![2, 2, 4]));
    }

    #[test]
    fn first_of_equal_length_kept() {
        let p = provider(json!({
            "/mb": { "children": ["/mb/x", "/mb/y"] },
            "/mb/x": { "bus": 7, "max-lanes": 4 },
            "/mb/y": { "bus": 7, "max-lanes": 8 },
        }));
        assert_eq!(p.get_bifurcation(7), Some(vec![4]));
    }

    #[test]
    fn repeated_calls_are_stable() {
        let p = provider(json!({
            "/mb": { "children": ["/mb/pe1"] },
            "/mb/pe1": { "bus": 1, "lanes": 16, "children": ["/mb/pe1/a", "/mb/pe1/b"] },
            "/mb/pe1/a": { "max-lanes": 4 },
            "/mb/pe1/b": { "max-lanes": 8 },
        }));
        let first = p.get_bifurcation(1);
        assert_eq!(first, Some(vec![4, 8, 4]));
        for _ in 0..4 {
            assert_eq!(p.get_bifurcation(1), first);
        }
    }

    /// Inventory that records which accessors were called, in order.
    #[derive(Default)]
    struct Recorder {
        inner: JsonInventory,
        calls: RefCell<Vec<(&'static str, String)>>,
    }

    impl InventoryClient for Recorder {
        fn bus_number_of(&self, path: &str) -> Option<u8> {
            self.calls.borrow_mut().push(("bus", path.to_owned()));
            self.inner.bus_number_of(path)
        }

        fn max_lanes_of(&self, path: &str) -> Option<u64> {
            self.calls.borrow_mut().push(("max-lanes", path.to_owned()));
            self.inner.max_lanes_of(path)
        }

        fn lanes_of(&self, path: &str) -> Option<u64> {
            self.calls.borrow_mut().push(("lanes", path.to_owned()));
            self.inner.lanes_of(path)
        }

        fn children_of(&self, path: &str) -> Vec<String> {
            self.calls.borrow_mut().push(("children", path.to_owned()));
            self.inner.children_of(path)
        }
    }

    #[test]
    fn device_lookup_precedes_slot_lookup() {
        let mut recorder = Recorder::default();
        recorder.inner.insert(
            "/dev",
            InventoryObject {
                max_lanes: Some(8),
                lanes: Some(16),
                ..Default::default()
            },
        );
        let p = BifurcationDynamic::new(&recorder);
        assert_eq!(p.parse_devices("/dev"), vec![8]);
        assert_eq!(
            *recorder.calls.borrow(),
            vec![("max-lanes", "/dev".to_string())]
        );
    }

    #[test]
    fn default_main_board() {
        let p = BifurcationDynamic::new(JsonInventory::default());
        assert_eq!(p.main_board(), MAIN_BOARD);
        assert_eq!(p.get_bifurcation(0), Some(vec![]));
    }
}
