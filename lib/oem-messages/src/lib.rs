// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types for the OEM IPMI commands exchanged between the host and the BMC.
//!
//! Every OEM request carries a single subcommand byte (see [`SysOemCommand`])
//! followed by a command-specific payload. Replies echo the subcommand byte
//! before their own payload; failures are reported to the transport as a
//! [`CompletionCode`] instead of a payload.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use alloc::vec::Vec;
use num_traits::FromPrimitive;
use static_assertions::const_assert_eq;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Maximum reply length accepted by the IPMI transport, including the
/// subcommand byte.
pub const MAX_IPMI_BUFFER: usize = 64;

/// OEM subcommands.
///
/// These **cannot be renumbered**; the host tooling and the BMC must agree on
/// them. New commands may only be appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_derive::FromPrimitive)]
#[repr(u8)]
pub enum SysOemCommand {
    CableCheck = 0x00,
    CpldVersion = 0x01,
    GetEthDevice = 0x02,
    PsuHardReset = 0x03,
    PcieSlotCount = 0x04,
    PcieSlotI2cBusMapping = 0x05,
    EntityName = 0x06,
    MachineName = 0x07,
    PsuHardResetOnShutdown = 0x08,
    GetFlashSize = 0x09,
    HostPowerOff = 0x0a,
    AccelOobDeviceCount = 0x0b,
    AccelOobRead = 0x0c,
    AccelOobWrite = 0x0d,
    PcieBifurcation = 0x0e,
    GetBmcMode = 0x0f,
    LinuxBootDone = 0x10,
}

impl SysOemCommand {
    pub fn from_u8(byte: u8) -> Option<Self> {
        <Self as FromPrimitive>::from_u8(byte)
    }
}

/// IPMI completion codes used by the OEM command set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_derive::FromPrimitive)]
#[repr(u8)]
pub enum CompletionCode {
    Success = 0x00,
    InvalidCommand = 0xc1,
    /// The request payload is shorter than the command requires.
    ReqDataLenInvalid = 0xc7,
    /// The reply would not fit in [`MAX_IPMI_BUFFER`].
    ReqDataLenExceeded = 0xc8,
    InvalidFieldRequest = 0xcc,
    UnspecifiedError = 0xff,
}

impl CompletionCode {
    pub fn from_u8(byte: u8) -> Option<Self> {
        <Self as FromPrimitive>::from_u8(byte)
    }
}

impl From<CompletionCode> for u8 {
    fn from(cc: CompletionCode) -> Self {
        cc as u8
    }
}

/// Request payload for [`SysOemCommand::PcieBifurcation`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
)]
#[repr(C)]
pub struct PcieBifurcationRequest {
    /// Slot (I2C bus) index to query.
    pub index: u8,
}

/// Fixed reply header for [`SysOemCommand::PcieBifurcation`]; followed by
/// `bifurcation_length` lane-count bytes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
)]
#[repr(C)]
pub struct PcieBifurcationReply {
    pub bifurcation_length: u8,
}

const_assert_eq!(core::mem::size_of::<PcieBifurcationRequest>(), 1);
const_assert_eq!(core::mem::size_of::<PcieBifurcationReply>(), 1);

/// Encodes a successful reply as
///
/// ```text
/// [command | payload]
/// ```
pub fn encode_reply(command: SysOemCommand, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(command as u8);
    out.extend_from_slice(payload);
    out
}

/// Decodes a PCIe bifurcation request from the front of `data`. Trailing
/// bytes are ignored.
pub fn decode_pcie_bifurcation(
    data: &[u8],
) -> Result<PcieBifurcationRequest, CompletionCode> {
    let (request, _rest) = PcieBifurcationRequest::read_from_prefix(data)
        .map_err(|_| CompletionCode::ReqDataLenInvalid)?;
    Ok(request)
}

/// Encodes the reply to a PCIe bifurcation request:
///
/// ```text
/// [PcieBifurcation | bifurcation_length | lanes...]
/// ```
///
/// # Errors
///
/// Returns [`CompletionCode::ReqDataLenExceeded`] if there are more than
/// `MAX_IPMI_BUFFER - 3` (61) lanes.
pub fn encode_pcie_bifurcation(
    lanes: &[u8],
) -> Result<Vec<u8>, CompletionCode> {
    if lanes.len() >= MAX_IPMI_BUFFER - 2 {
        return Err(CompletionCode::ReqDataLenExceeded);
    }

    let header = PcieBifurcationReply {
        // Bounded by MAX_IPMI_BUFFER above.
        bifurcation_length: lanes.len() as u8,
    };
    let mut payload =
        Vec::with_capacity(core::mem::size_of_val(&header) + lanes.len());
    payload.extend_from_slice(header.as_bytes());
    payload.extend_from_slice(lanes);

    Ok(encode_reply(SysOemCommand::PcieBifurcation, &payload))
}
