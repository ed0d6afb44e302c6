//! Signing seam and the in-process keypair signer.

use chain_sol::transaction::{compile_message, encode_wire_transaction, serialize_message};
use chain_sol::{Address, Signature, TransactionMessage};
use ed25519_dalek::{Signer as _, SigningKey};
use zeroize::Zeroize;

use crate::error::HookError;

/// Something that can authorize a transaction: an address plus a detached
/// ed25519 signature over the serialized message.
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Address;

    fn sign_message(&self, message: &[u8]) -> Result<Signature, HookError>;
}

/// Ed25519 keypair held in memory. The secret is wiped on drop.
pub struct KeypairSigner {
    signing_key: SigningKey,
    address: Address,
}

impl KeypairSigner {
    /// Build from a 32-byte seed. The caller's copy is zeroized.
    pub fn from_seed(seed: &mut [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        seed.zeroize();
        let address = Address::new(signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            address,
        }
    }

    /// Build from the 64-byte `secret || public` layout used by Solana
    /// keypair files.
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self, HookError> {
        if bytes.len() != 64 {
            return Err(HookError::Signing(format!(
                "keypair must be 64 bytes, got {}",
                bytes.len()
            )));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes[..32]);
        let signer = Self::from_seed(&mut seed);
        if signer.address.as_bytes()[..] != bytes[32..] {
            return Err(HookError::Signing(
                "public key does not match secret key".into(),
            ));
        }
        Ok(signer)
    }

    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let address = Address::new(signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            address,
        }
    }
}

impl TransactionSigner for KeypairSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_message(&self, message: &[u8]) -> Result<Signature, HookError> {
        Ok(Signature::new(self.signing_key.sign(message).to_bytes()))
    }
}

impl std::fmt::Debug for KeypairSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeypairSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Sign `message` with every required signer and encode the wire
/// transaction. Fails when a required signature has no matching signer.
pub fn sign_transaction(
    message: &TransactionMessage,
    signers: &[&dyn TransactionSigner],
) -> Result<Vec<u8>, HookError> {
    let compiled = compile_message(message)?;
    let bytes = serialize_message(&compiled)?;

    let signatures = compiled
        .signers()
        .iter()
        .map(|required| {
            let signer = signers
                .iter()
                .find(|s| s.address() == *required)
                .ok_or_else(|| HookError::Signing(format!("missing signer for {required}")))?;
            Ok((*required, signer.sign_message(&bytes)?))
        })
        .collect::<Result<Vec<_>, HookError>>()?;

    Ok(encode_wire_transaction(&compiled, &signatures)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_sol::transaction::LifetimeConstraint;
    use chain_sol::{build_sol_transfer, Blockhash};
    use ed25519_dalek::{Verifier, VerifyingKey};

    fn message_from(payer: Address, extra_signer: Option<Address>) -> TransactionMessage {
        let mut message = TransactionMessage::new()
            .with_fee_payer(payer)
            .with_instruction(build_sol_transfer(&payer, &Address::new([9; 32]), 5).unwrap())
            .with_lifetime_constraint(LifetimeConstraint {
                blockhash: Blockhash::new([4; 32]),
                last_valid_block_height: 10,
            });
        if let Some(other) = extra_signer {
            message = message
                .with_instruction(build_sol_transfer(&other, &payer, 1).unwrap());
        }
        message
    }

    #[test]
    fn seed_is_zeroized_and_address_derived() {
        let mut seed = [7u8; 32];
        let signer = KeypairSigner::from_seed(&mut seed);
        assert_eq!(seed, [0u8; 32]);

        let expected = SigningKey::from_bytes(&[7u8; 32]).verifying_key().to_bytes();
        assert_eq!(signer.address(), Address::new(expected));
    }

    #[test]
    fn keypair_bytes_roundtrip_and_mismatch() {
        let mut seed = [3u8; 32];
        let public = SigningKey::from_bytes(&seed).verifying_key().to_bytes();
        let mut bytes = seed.to_vec();
        bytes.extend_from_slice(&public);

        let signer = KeypairSigner::from_keypair_bytes(&bytes).unwrap();
        assert_eq!(signer.address(), Address::new(public));

        bytes[63] ^= 1;
        assert!(KeypairSigner::from_keypair_bytes(&bytes).is_err());
        assert!(KeypairSigner::from_keypair_bytes(&bytes[..32]).is_err());
        seed.zeroize();
    }

    #[test]
    fn signature_verifies_over_serialized_message() {
        let signer = KeypairSigner::generate();
        let message = message_from(signer.address(), None);

        let wire = sign_transaction(&message, &[&signer]).unwrap();

        assert_eq!(wire[0], 1);
        let compiled = compile_message(&message).unwrap();
        let serialized = serialize_message(&compiled).unwrap();
        assert_eq!(&wire[65..], &serialized[..]);

        let verifying = VerifyingKey::from_bytes(signer.address().as_bytes()).unwrap();
        let signature = ed25519_dalek::Signature::from_bytes(wire[1..65].try_into().unwrap());
        assert!(verifying.verify(&serialized, &signature).is_ok());
    }

    #[test]
    fn missing_required_signer_fails() {
        let payer = KeypairSigner::generate();
        let message = message_from(payer.address(), Some(Address::new([8; 32])));

        let err = sign_transaction(&message, &[&payer]).unwrap_err();
        assert!(matches!(err, HookError::Signing(_)));
    }

    #[test]
    fn debug_hides_secret() {
        let signer = KeypairSigner::generate();
        let rendered = format!("{signer:?}");
        assert!(rendered.contains("address"));
        assert!(!rendered.contains("signing_key"));
    }
}
