// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Access to the platform inventory graph
//!
//! Inventory objects are named by opaque path strings and linked by
//! "contained-by" associations. Only two kinds of object matter to us:
//! devices, which declare the maximum number of lanes they can use, and
//! slots, which declare how many lanes they provide.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

/// The accessors the dynamic bifurcation walk needs from the inventory.
///
/// Every accessor is fallible on the other end (they're remote property
/// reads on a real system), but none of them reports *why*: an object that
/// couldn't be read looks exactly like one that lacks the property.
pub trait InventoryClient {
    /// I2C bus backing `path`.
    fn bus_number_of(&self, path: &str) -> Option<u8>;

    /// Maximum lanes of `path`, if it's a device.
    fn max_lanes_of(&self, path: &str) -> Option<u64>;

    /// Lane capacity of `path`, if it's a slot.
    fn lanes_of(&self, path: &str) -> Option<u64>;

    /// Devices and slots physically contained by `path`.
    ///
    /// An empty list covers both "no children" and "couldn't ask".
    fn children_of(&self, path: &str) -> Vec<String>;
}

impl<T: InventoryClient + ?Sized> InventoryClient for &T {
    fn bus_number_of(&self, path: &str) -> Option<u8> {
        (**self).bus_number_of(path)
    }

    fn max_lanes_of(&self, path: &str) -> Option<u64> {
        (**self).max_lanes_of(path)
    }

    fn lanes_of(&self, path: &str) -> Option<u64> {
        (**self).lanes_of(path)
    }

    fn children_of(&self, path: &str) -> Vec<String> {
        (**self).children_of(path)
    }
}

/// An inventory held entirely in memory, loaded from a JSON document:
///
/// ```json
/// {
///     "objects": {
///         "/board": { "children": ["/board/riser"] },
///         "/board/riser": {
///             "bus": 3,
///             "lanes": 16,
///             "children": ["/board/riser/nic"]
///         },
///         "/board/riser/nic": { "max-lanes": 8 }
///     }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct JsonInventory {
    objects: BTreeMap<String, InventoryObject>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct InventoryObject {
    /// I2C bus number. Stored as the wire width (`u64`); a bus that doesn't
    /// fit in a byte can't be selected by a slot index.
    #[serde(default)]
    pub bus: Option<u64>,

    /// Present on devices.
    #[serde(default)]
    pub max_lanes: Option<u64>,

    /// Present on slots.
    #[serde(default)]
    pub lanes: Option<u64>,

    #[serde(default)]
    pub children: Vec<String>,
}

impl InventoryObject {
    fn is_device_or_slot(&self) -> bool {
        self.max_lanes.is_some() || self.lanes.is_some()
    }
}

#[derive(Debug)]
pub enum InventoryError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for InventoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "can't read inventory: {e}"),
            Self::Parse(e) => write!(f, "can't parse inventory: {e}"),
        }
    }
}

impl std::error::Error for InventoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for InventoryError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for InventoryError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

impl JsonInventory {
    pub fn from_file(path: &Path) -> Result<Self, InventoryError> {
        let contents = std::fs::read(path)?;
        Ok(serde_json::from_slice(&contents)?)
    }

    pub fn from_value(
        value: serde_json::Value,
    ) -> Result<Self, InventoryError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn object(&self, path: &str) -> Option<&InventoryObject> {
        self.objects.get(path)
    }

    /// Adds (or replaces) an object.
    pub fn insert(&mut self, path: impl Into<String>, object: InventoryObject) {
        self.objects.insert(path.into(), object);
    }
}

impl InventoryClient for JsonInventory {
    fn bus_number_of(&self, path: &str) -> Option<u8> {
        let bus = self.object(path)?.bus?;
        u8::try_from(bus).ok()
    }

    fn max_lanes_of(&self, path: &str) -> Option<u64> {
        self.object(path)?.max_lanes
    }

    fn lanes_of(&self, path: &str) -> Option<u64> {
        self.object(path)?.lanes
    }

    fn children_of(&self, path: &str) -> Vec<String> {
        let Some(object) = self.object(path) else {
            return vec![];
        };
        object
            .children
            .iter()
            .filter(|child| {
                self.object(child)
                    .is_some_and(InventoryObject::is_device_or_slot)
            })
            .cloned()
            .collect()
    }
}
