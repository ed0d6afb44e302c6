//! Compute Budget program instructions.
//!
//! The program uses a one-byte discriminator followed by a little-endian
//! payload. Only `SetComputeUnitLimit` (2) and `SetComputeUnitPrice` (3) are
//! built here.

use crate::address::Address;
use crate::transaction::{Instruction, TransactionMessage};

/// Compute Budget Program ID: `ComputeBudget111111111111111111111111111111`
pub const COMPUTE_BUDGET_PROGRAM_ID: Address = Address::new([
    0x03, 0x06, 0x46, 0x6f, 0xe5, 0x21, 0x17, 0x32, 0xff, 0xec, 0xad, 0xba, 0x72, 0xc3, 0x9b,
    0xe7, 0xbc, 0x8c, 0xe5, 0xbb, 0xc5, 0xf7, 0x12, 0x6b, 0x2c, 0x43, 0x9b, 0x3a, 0x40, 0x00,
    0x00, 0x00,
]);

pub const SET_COMPUTE_UNIT_LIMIT_DISCRIMINANT: u8 = 2;
pub const SET_COMPUTE_UNIT_PRICE_DISCRIMINANT: u8 = 3;

/// Per-transaction ceiling enforced by the runtime.
pub const MAX_COMPUTE_UNIT_LIMIT: u32 = 1_400_000;

/// Limit the runtime assumes when no instruction sets one.
pub const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = 200_000;

/// `SetComputeUnitLimit { units }`: `[2] ++ units as u32 LE`.
pub fn set_compute_unit_limit(units: u32) -> Instruction {
    let mut data = Vec::with_capacity(5);
    data.push(SET_COMPUTE_UNIT_LIMIT_DISCRIMINANT);
    data.extend_from_slice(&units.to_le_bytes());
    Instruction {
        program_id: COMPUTE_BUDGET_PROGRAM_ID,
        accounts: vec![],
        data,
    }
}

/// `SetComputeUnitPrice { micro_lamports }`: `[3] ++ micro_lamports as u64 LE`.
pub fn set_compute_unit_price(micro_lamports: u64) -> Instruction {
    let mut data = Vec::with_capacity(9);
    data.push(SET_COMPUTE_UNIT_PRICE_DISCRIMINANT);
    data.extend_from_slice(&micro_lamports.to_le_bytes());
    Instruction {
        program_id: COMPUTE_BUDGET_PROGRAM_ID,
        accounts: vec![],
        data,
    }
}

pub fn is_set_compute_unit_limit(ix: &Instruction) -> bool {
    ix.program_id == COMPUTE_BUDGET_PROGRAM_ID
        && ix.data.first() == Some(&SET_COMPUTE_UNIT_LIMIT_DISCRIMINANT)
}

/// Units declared by a `SetComputeUnitLimit` instruction, if `ix` is one and
/// its payload is well formed.
pub fn parse_compute_unit_limit(ix: &Instruction) -> Option<u32> {
    if !is_set_compute_unit_limit(ix) {
        return None;
    }
    let units: [u8; 4] = ix.data.get(1..5)?.try_into().ok()?;
    Some(u32::from_le_bytes(units))
}

/// Position of the message's `SetComputeUnitLimit` instruction.
pub fn find_compute_unit_limit(message: &TransactionMessage) -> Option<usize> {
    message
        .instructions()
        .iter()
        .position(is_set_compute_unit_limit)
}
