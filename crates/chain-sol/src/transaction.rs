//! Transaction message value and legacy wire format.
//!
//! A [`TransactionMessage`] is an immutable value: every `with_*` method
//! returns a new message and leaves the receiver untouched. Compilation turns
//! it into the compact binary layout below:
//!
//! ```text
//! Transaction:
//!   num_signatures          compact-u16
//!   signatures              64 bytes * num_signatures
//!   message:
//!     num_required_sigs     u8
//!     num_readonly_signed   u8
//!     num_readonly_unsigned u8
//!     num_accounts          compact-u16
//!     account_keys          32 bytes * num_accounts
//!     recent_blockhash      32 bytes
//!     num_instructions      compact-u16
//!     instructions[]        (see below)
//!
//! Instruction:
//!   program_id_index        u8
//!   num_accounts            compact-u16
//!   account_indices         u8 * num_accounts
//!   data_len                compact-u16
//!   data                    u8 * data_len
//! ```

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::address::{Address, Blockhash, Signature};
use crate::error::SolError;

// ---------------------------------------------------------------------------
// Compact-u16 encoding
// ---------------------------------------------------------------------------

/// Encode a `u16` value in Solana's compact-u16 format.
///
/// - Values 0..0x7f       -> 1 byte
/// - Values 0x80..0x3fff  -> 2 bytes
/// - Values 0x4000..      -> 3 bytes
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut val = value as u32;
    let mut out = Vec::with_capacity(3);

    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            break;
        }
    }

    out
}

fn compact_len(len: usize, what: &str) -> Result<Vec<u8>, SolError> {
    let len = u16::try_from(len)
        .map_err(|_| SolError::SerializationError(format!("too many {what}: {len}")))?;
    Ok(encode_compact_u16(len))
}

// ---------------------------------------------------------------------------
// Message value
// ---------------------------------------------------------------------------

/// A single account reference in an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub pubkey: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(pubkey: Address, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn readonly(pubkey: Address, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// An instruction before it is compiled into a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program_id: Address,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// Blockhash lifetime: the message is valid until the chain passes
/// `last_valid_block_height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifetimeConstraint {
    pub blockhash: Blockhash,
    pub last_valid_block_height: u64,
}

/// Unsigned transaction message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionMessage {
    fee_payer: Option<Address>,
    instructions: Vec<Instruction>,
    lifetime_constraint: Option<LifetimeConstraint>,
}

impl TransactionMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fee_payer(&self) -> Option<&Address> {
        self.fee_payer.as_ref()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn lifetime_constraint(&self) -> Option<&LifetimeConstraint> {
        self.lifetime_constraint.as_ref()
    }

    #[must_use]
    pub fn with_fee_payer(&self, fee_payer: Address) -> Self {
        Self {
            fee_payer: Some(fee_payer),
            ..self.clone()
        }
    }

    /// Append one instruction at the end.
    #[must_use]
    pub fn with_instruction(&self, instruction: Instruction) -> Self {
        let mut instructions = self.instructions.clone();
        instructions.push(instruction);
        Self {
            instructions,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_instructions<I>(&self, extra: I) -> Self
    where
        I: IntoIterator<Item = Instruction>,
    {
        let mut instructions = self.instructions.clone();
        instructions.extend(extra);
        Self {
            instructions,
            ..self.clone()
        }
    }

    /// Replace the instruction at `index`, keeping every other position.
    pub fn with_instruction_at(
        &self,
        index: usize,
        instruction: Instruction,
    ) -> Result<Self, SolError> {
        if index >= self.instructions.len() {
            return Err(SolError::TransactionBuildError(format!(
                "instruction index {index} out of range ({} instructions)",
                self.instructions.len()
            )));
        }
        let mut instructions = self.instructions.clone();
        instructions[index] = instruction;
        Ok(Self {
            instructions,
            ..self.clone()
        })
    }

    #[must_use]
    pub fn with_lifetime_constraint(&self, lifetime: LifetimeConstraint) -> Self {
        Self {
            lifetime_constraint: Some(lifetime),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// A message with account references replaced by indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledMessage {
    /// All account keys referenced by this message, in canonical order:
    ///   1. writable signers (fee payer first)
    ///   2. read-only signers
    ///   3. writable non-signers
    ///   4. read-only non-signers
    pub account_keys: Vec<Address>,
    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,
    pub recent_blockhash: Blockhash,
    pub compiled_instructions: Vec<CompiledInstruction>,
}

/// A compiled instruction where account references are replaced by u8 indices
/// into the message's `account_keys` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indices: Vec<u8>,
    pub data: Vec<u8>,
}

impl CompiledMessage {
    /// Signer addresses, in signature-slot order.
    pub fn signers(&self) -> &[Address] {
        &self.account_keys[..self.num_required_signatures as usize]
    }
}

/// Compile a message. Requires both a fee payer and a lifetime.
pub fn compile_message(message: &TransactionMessage) -> Result<CompiledMessage, SolError> {
    let fee_payer = *message.fee_payer().ok_or(SolError::MissingFeePayer)?;
    let lifetime = message
        .lifetime_constraint()
        .ok_or(SolError::MissingLifetime)?;

    struct AccountEntry {
        pubkey: Address,
        is_signer: bool,
        is_writable: bool,
    }

    let mut entries: Vec<AccountEntry> = Vec::new();

    let mut upsert = |pubkey: Address, signer: bool, writable: bool| {
        if let Some(entry) = entries.iter_mut().find(|e| e.pubkey == pubkey) {
            entry.is_signer |= signer;
            entry.is_writable |= writable;
        } else {
            entries.push(AccountEntry {
                pubkey,
                is_signer: signer,
                is_writable: writable,
            });
        }
    };

    // Fee payer is always signer + writable.
    upsert(fee_payer, true, true);

    for ix in message.instructions() {
        for meta in &ix.accounts {
            upsert(meta.pubkey, meta.is_signer, meta.is_writable);
        }
        upsert(ix.program_id, false, false);
    }

    // Stable sort keeps insertion order inside a category, so the fee payer
    // stays at index 0.
    entries.sort_by_key(|e| match (e.is_signer, e.is_writable) {
        (true, true) => 0u8,
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 3,
    });

    if entries.len() > u8::MAX as usize + 1 {
        return Err(SolError::TransactionBuildError(format!(
            "too many accounts: {}",
            entries.len()
        )));
    }

    // Header counts are single bytes; 256 accounts of one kind do not fit.
    let count = |what: &str, f: fn(&AccountEntry) -> bool| -> Result<u8, SolError> {
        let n = entries.iter().filter(|e| f(e)).count();
        u8::try_from(n)
            .map_err(|_| SolError::TransactionBuildError(format!("too many {what}: {n}")))
    };
    let num_required_signatures = count("signers", |e| e.is_signer)?;
    let num_readonly_signed = count("readonly signers", |e| e.is_signer && !e.is_writable)?;
    let num_readonly_unsigned =
        count("readonly accounts", |e| !e.is_signer && !e.is_writable)?;

    let account_keys: Vec<Address> = entries.iter().map(|e| e.pubkey).collect();
    let index_of = |key: &Address| -> Result<u8, SolError> {
        account_keys
            .iter()
            .position(|k| k == key)
            .map(|i| i as u8)
            .ok_or_else(|| SolError::TransactionBuildError(format!("{key} not in account keys")))
    };

    let mut compiled = Vec::with_capacity(message.instructions().len());
    for ix in message.instructions() {
        let account_indices = ix
            .accounts
            .iter()
            .map(|meta| index_of(&meta.pubkey))
            .collect::<Result<Vec<_>, _>>()?;
        compiled.push(CompiledInstruction {
            program_id_index: index_of(&ix.program_id)?,
            account_indices,
            data: ix.data.clone(),
        });
    }

    Ok(CompiledMessage {
        account_keys,
        num_required_signatures,
        num_readonly_signed,
        num_readonly_unsigned,
        recent_blockhash: lifetime.blockhash,
        compiled_instructions: compiled,
    })
}

/// Serialize the compiled message (the bytes that get signed).
pub fn serialize_message(message: &CompiledMessage) -> Result<Vec<u8>, SolError> {
    let mut buf = Vec::with_capacity(256);

    buf.push(message.num_required_signatures);
    buf.push(message.num_readonly_signed);
    buf.push(message.num_readonly_unsigned);

    buf.extend_from_slice(&compact_len(message.account_keys.len(), "accounts")?);
    for key in &message.account_keys {
        buf.extend_from_slice(key.as_bytes());
    }

    buf.extend_from_slice(message.recent_blockhash.as_bytes());

    buf.extend_from_slice(&compact_len(
        message.compiled_instructions.len(),
        "instructions",
    )?);
    for ix in &message.compiled_instructions {
        buf.push(ix.program_id_index);
        buf.extend_from_slice(&compact_len(ix.account_indices.len(), "instruction accounts")?);
        buf.extend_from_slice(&ix.account_indices);
        buf.extend_from_slice(&compact_len(ix.data.len(), "instruction data bytes")?);
        buf.extend_from_slice(&ix.data);
    }

    Ok(buf)
}

// ---------------------------------------------------------------------------
// Wire transactions
// ---------------------------------------------------------------------------

/// Assemble a wire transaction from a compiled message and the signatures
/// collected so far. Signer slots without a signature are left zeroed.
pub fn encode_wire_transaction(
    message: &CompiledMessage,
    signatures: &[(Address, Signature)],
) -> Result<Vec<u8>, SolError> {
    let message_bytes = serialize_message(message)?;
    let signers = message.signers();

    for (signer, _) in signatures {
        if !signers.contains(signer) {
            return Err(SolError::SigningError(format!(
                "{signer} is not a signer of this transaction"
            )));
        }
    }

    let mut wire = Vec::with_capacity(3 + 64 * signers.len() + message_bytes.len());
    wire.extend_from_slice(&compact_len(signers.len(), "signatures")?);
    for signer in signers {
        match signatures.iter().find(|(addr, _)| addr == signer) {
            Some((_, sig)) => wire.extend_from_slice(sig.as_bytes()),
            None => wire.extend_from_slice(&[0u8; 64]),
        }
    }
    wire.extend_from_slice(&message_bytes);

    Ok(wire)
}

/// Compile `message` and encode it with empty signature slots, as used for
/// simulation with signature verification disabled.
pub fn encode_unsigned_transaction(message: &TransactionMessage) -> Result<Vec<u8>, SolError> {
    encode_wire_transaction(&compile_message(message)?, &[])
}

/// Base64 form of [`encode_unsigned_transaction`].
pub fn base64_unsigned_transaction(message: &TransactionMessage) -> Result<String, SolError> {
    Ok(BASE64.encode(encode_unsigned_transaction(message)?))
}

pub fn base64_wire_transaction(wire: &[u8]) -> String {
    BASE64.encode(wire)
}
