//! System Program instructions.

use crate::address::Address;
use crate::error::SolError;
use crate::transaction::{AccountMeta, Instruction};

/// The Solana System Program public key: 32 zero bytes.
/// Base58: `11111111111111111111111111111111`
pub const SYSTEM_PROGRAM_ID: Address = Address::new([0u8; 32]);

/// System Program `Transfer` instruction index (little-endian u32).
const SYSTEM_TRANSFER_IX_INDEX: u32 = 2;

/// Build a System Program `Transfer` instruction moving `lamports` from
/// `from` (signer) to `to`.
pub fn build_sol_transfer(
    from: &Address,
    to: &Address,
    lamports: u64,
) -> Result<Instruction, SolError> {
    if lamports == 0 {
        return Err(SolError::TransactionBuildError(
            "lamports must be > 0".into(),
        ));
    }

    // u32 LE instruction index + u64 LE lamports.
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_IX_INDEX.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());

    Ok(Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(*from, true),
            AccountMeta::writable(*to, false),
        ],
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sol_transfer_instruction_layout() {
        let from = Address::new([1; 32]);
        let to = Address::new([2; 32]);
        let ix = build_sol_transfer(&from, &to, 1_000_000).unwrap();

        assert_eq!(ix.program_id, SYSTEM_PROGRAM_ID);
        assert_eq!(ix.data.len(), 12);
        assert_eq!(&ix.data[..4], &[2, 0, 0, 0]);
        assert_eq!(&ix.data[4..], &1_000_000u64.to_le_bytes());

        assert_eq!(ix.accounts[0], AccountMeta::writable(from, true));
        assert_eq!(ix.accounts[1], AccountMeta::writable(to, false));
    }

    #[test]
    fn zero_lamports_fails() {
        let key = Address::new([1; 32]);
        assert!(build_sol_transfer(&key, &key, 0).is_err());
    }
}
