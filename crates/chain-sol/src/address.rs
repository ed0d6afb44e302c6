//! Base58 value types: account addresses, blockhashes and signatures.
//!
//! Solana addresses are simply Base58-encoded 32-byte Ed25519 public keys.
//! There is no hashing step (unlike Bitcoin or Ethereum). Blockhashes use the
//! same 32-byte Base58 form and transaction signatures are 64-byte Base58.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SolError;

macro_rules! base58_value {
    ($(#[$meta:meta])* $name:ident, $len:expr, $what:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub const fn to_bytes(self) -> [u8; $len] {
                self.0
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl FromStr for $name {
            type Err = SolError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = bs58::decode(s).into_vec().map_err(|e| {
                    SolError::InvalidAddress(format!(concat!($what, " base58 decode failed: {}"), e))
                })?;
                let arr: [u8; $len] = bytes.try_into().map_err(|v: Vec<u8>| {
                    SolError::InvalidAddress(format!(
                        concat!($what, " expected {} bytes, got {}"),
                        $len,
                        v.len()
                    ))
                })?;
                Ok(Self(arr))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&bs58::encode(&self.0).into_string())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

base58_value!(
    /// A Solana account address (32-byte Ed25519 public key or PDA).
    Address,
    32,
    "address"
);

base58_value!(
    /// A recent blockhash used as a transaction lifetime.
    Blockhash,
    32,
    "blockhash"
);

base58_value!(
    /// A transaction signature as returned by `sendTransaction`.
    Signature,
    64,
    "signature"
);

/// Validate a Solana address string.
///
/// A valid Solana address is a Base58-encoded string that decodes to exactly
/// 32 bytes.
pub fn validate_address(address: &str) -> Result<Address, SolError> {
    address.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The System Program address is 32 zero bytes, which encodes to
    /// "11111111111111111111111111111111" in Base58.
    #[test]
    fn system_program_address() {
        let addr = Address::new([0u8; 32]);
        assert_eq!(addr.to_string(), "11111111111111111111111111111111");
    }

    #[test]
    fn parse_and_display_token_program() {
        let address = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
        let parsed: Address = address.parse().unwrap();
        assert_eq!(parsed.to_string(), address);
    }

    #[test]
    fn validate_garbage_returns_error() {
        assert!(validate_address("not-a-valid-address!!!").is_err());
    }

    #[test]
    fn validate_too_short_returns_error() {
        // "1" decodes to a single zero byte, which is not 32 bytes.
        let err = validate_address("1").unwrap_err();
        assert!(err.to_string().contains("expected 32 bytes, got 1"));
    }

    #[test]
    fn blockhash_rejects_signature_length() {
        let sig = Signature::new([7u8; 64]).to_string();
        assert!(sig.parse::<Blockhash>().is_err());
        assert_eq!(sig.parse::<Signature>().unwrap(), Signature::new([7u8; 64]));
    }

    #[test]
    fn serde_uses_base58_strings() {
        let addr = Address::new([0xffu8; 32]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{addr}\""));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn debug_shows_type_and_base58() {
        let hash = Blockhash::new([0u8; 32]);
        assert_eq!(
            format!("{hash:?}"),
            "Blockhash(11111111111111111111111111111111)"
        );
    }
}
