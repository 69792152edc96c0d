// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! OEM IPMI command handling on the BMC.
//!
//! The transport hands us a subcommand byte and the rest of the request;
//! [`process_request`] decodes it, asks the [`HandlerInterface`] for the
//! answer, and encodes the reply (or picks the completion code to fail with).

use anyhow::{Context, Result};
use oem_messages::{CompletionCode, SysOemCommand};
use pcie_bifurcation::{
    BifurcationDynamic, BifurcationProvider, BifurcationStatic,
};

pub mod config;

pub use config::{BifurcationConfig, Config};

/// Reply to a single request: the encoded payload, or the completion code the
/// transport should send instead.
pub type Reply = Result<Vec<u8>, CompletionCode>;

/// Platform operations the command handlers rely on.
pub trait HandlerInterface {
    /// Lane counts for the PCIe slot on I2C bus `index`; empty if the slot
    /// can't be resolved.
    fn pcie_bifurcation(&self, index: u8) -> Vec<u8>;
}

pub struct Handler {
    bifurcation: Box<dyn BifurcationProvider>,
}

impl Handler {
    pub fn new(bifurcation: Box<dyn BifurcationProvider>) -> Self {
        Self { bifurcation }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let bifurcation: Box<dyn BifurcationProvider> =
            match &config.bifurcation {
                BifurcationConfig::Static { path } => {
                    log::debug!("static bifurcation from {}", path.display());
                    Box::new(BifurcationStatic::new(path))
                }
                BifurcationConfig::Dynamic {
                    inventory,
                    main_board,
                } => {
                    log::debug!(
                        "dynamic bifurcation below {main_board} from {}",
                        inventory.display()
                    );
                    let dynamic = BifurcationDynamic::from_inventory_file(
                        inventory,
                        main_board.as_str(),
                    )
                    .with_context(|| {
                        format!("can't load inventory {}", inventory.display())
                    })?;
                    Box::new(dynamic)
                }
            };
        Ok(Self::new(bifurcation))
    }
}

impl HandlerInterface for Handler {
    fn pcie_bifurcation(&self, index: u8) -> Vec<u8> {
        self.bifurcation.get_bifurcation(index).unwrap_or_default()
    }
}

/// Handles one OEM request.
pub fn process_request(
    handler: &dyn HandlerInterface,
    command: u8,
    data: &[u8],
) -> Reply {
    let Some(command) = SysOemCommand::from_u8(command) else {
        log::debug!("unknown OEM command {command:#04x}");
        return Err(CompletionCode::InvalidCommand);
    };

    match command {
        SysOemCommand::PcieBifurcation => pcie_bifurcation(handler, data),
        SysOemCommand::CableCheck
        | SysOemCommand::CpldVersion
        | SysOemCommand::GetEthDevice
        | SysOemCommand::PsuHardReset
        | SysOemCommand::PcieSlotCount
        | SysOemCommand::PcieSlotI2cBusMapping
        | SysOemCommand::EntityName
        | SysOemCommand::MachineName
        | SysOemCommand::PsuHardResetOnShutdown
        | SysOemCommand::GetFlashSize
        | SysOemCommand::HostPowerOff
        | SysOemCommand::AccelOobDeviceCount
        | SysOemCommand::AccelOobRead
        | SysOemCommand::AccelOobWrite
        | SysOemCommand::GetBmcMode
        | SysOemCommand::LinuxBootDone => {
            log::debug!("OEM command {command:?} not handled here");
            Err(CompletionCode::InvalidCommand)
        }
    }
}

fn pcie_bifurcation(handler: &dyn HandlerInterface, data: &[u8]) -> Reply {
    let request = oem_messages::decode_pcie_bifurcation(data)?;
    let lanes = handler.pcie_bifurcation(request.index);
    oem_messages::encode_pcie_bifurcation(&lanes).inspect_err(|_| {
        log::warn!(
            "bifurcation of {} has {} entries; too long to reply",
            request.index,
            lanes.len()
        );
    })
}
