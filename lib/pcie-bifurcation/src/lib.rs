// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! PCIe slot bifurcation discovery
//!
//! A bifurcation is the list of lane counts that a slot's capacity is split
//! into, one entry per downstream device (plus a trailing entry for any
//! capacity nobody claimed). There are two ways to find one:
//!
//! - [`BifurcationStatic`] looks the answer up in a JSON table on disk.
//! - [`BifurcationDynamic`] walks the platform inventory through an
//!   [`InventoryClient`], summing the lanes of every device below a slot and
//!   checking the result against the slot's declared capacity.
//!
//! Both implement [`BifurcationProvider`]. Neither ever reports an error to
//! its caller: a slot that can't be resolved is simply `None` (or, for the
//! dynamic walk, an empty list), and the reason is logged.

mod dynamic;
mod inventory;
mod static_config;

pub use dynamic::{BifurcationDynamic, MAIN_BOARD};
pub use inventory::{
    InventoryClient, InventoryError, InventoryObject, JsonInventory,
};
pub use static_config::{
    BifurcationStatic, StaticConfigError, DEFAULT_STATIC_CONFIG_PATH,
};

/// Something that can tell us how a PCIe slot is bifurcated.
pub trait BifurcationProvider {
    /// Returns the lane counts for the slot behind I2C bus `index`.
    ///
    /// `Some(vec![])` means the slot was understood but has nothing below it;
    /// `None` means we couldn't resolve the slot at all.
    fn get_bifurcation(&self, index: u8) -> Option<Vec<u8>>;
}

impl<T: BifurcationProvider + ?Sized> BifurcationProvider for &T {
    fn get_bifurcation(&self, index: u8) -> Option<Vec<u8>> {
        (**self).get_bifurcation(index)
    }
}

impl<T: BifurcationProvider + ?Sized> BifurcationProvider for Box<T> {
    fn get_bifurcation(&self, index: u8) -> Option<Vec<u8>> {
        (**self).get_bifurcation(index)
    }
}
