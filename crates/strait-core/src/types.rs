use std::fmt;
use std::str::FromStr;

use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ResolverError;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

/// Ledger height / block number.
pub type Height = u64;

// ── OrderHash ────────────────────────────────────────────────────────────────

/// 32-byte swap identifier: Keccak-256 of the canonical serialized order intent.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderHash(pub [u8; 32]);

impl OrderHash {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, ResolverError> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| ResolverError::InvalidOrder(format!("bad order hash hex: {e}")))?;
        if bytes.len() != 32 {
            return Err(ResolverError::InvalidOrder(format!(
                "order hash must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for OrderHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for OrderHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderHash({}…)", &self.to_hex()[..18])
    }
}

// ── Hashlock ─────────────────────────────────────────────────────────────────

/// 32-byte hashlock: the committed hash of the swap preimage.
///
/// The same preimage produces a different hashlock per chain family
/// (Keccak-256 on EVM, SHA-256 on Stellar); this type carries whichever
/// form the context requires.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hashlock(pub [u8; 32]);

impl Hashlock {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, ResolverError> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| ResolverError::InvalidOrder(format!("bad hashlock hex: {e}")))?;
        if bytes.len() != 32 {
            return Err(ResolverError::InvalidOrder(format!(
                "hashlock must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for Hashlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hashlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hashlock({}…)", &self.to_hex()[..18])
    }
}

// ── Preimage ─────────────────────────────────────────────────────────────────

/// 32-byte secret preimage. Zeroed on drop; Debug never prints the bytes.
///
/// The preimage never leaves the process except inside a withdraw
/// transaction submitted to a chain.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Preimage(pub [u8; 32]);

impl Preimage {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_hex(s: &str) -> Result<Self, ResolverError> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| ResolverError::InvalidOrder(format!("bad preimage hex: {e}")))?;
        if bytes.len() != 32 {
            return Err(ResolverError::InvalidOrder(format!(
                "preimage must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Preimage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Preimage(<redacted>)")
    }
}

// ── ChainId ──────────────────────────────────────────────────────────────────

/// Which wire format, hash function and amount bounds a chain uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainFamily {
    Evm,
    Stellar,
}

/// The closed set of supported ledgers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainId {
    Ethereum,
    Base,
    Sepolia,
    Stellar,
}

impl ChainId {
    pub fn family(&self) -> ChainFamily {
        match self {
            ChainId::Ethereum | ChainId::Base | ChainId::Sepolia => ChainFamily::Evm,
            ChainId::Stellar => ChainFamily::Stellar,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainId::Ethereum => "ethereum",
            ChainId::Base => "base",
            ChainId::Sepolia => "sepolia",
            ChainId::Stellar => "stellar",
        }
    }

    pub fn all() -> &'static [ChainId] {
        &[ChainId::Ethereum, ChainId::Base, ChainId::Sepolia, ChainId::Stellar]
    }
}

impl FromStr for ChainId {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ethereum" => Ok(ChainId::Ethereum),
            "base" => Ok(ChainId::Base),
            "sepolia" => Ok(ChainId::Sepolia),
            "stellar" => Ok(ChainId::Stellar),
            other => Err(ResolverError::UnsupportedChain(other.to_string())),
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Amount ───────────────────────────────────────────────────────────────────

/// Monetary amount in an asset's smallest unit.
///
/// Backed by a 256-bit unsigned integer (the EVM bound); the Stellar side
/// additionally requires values to fit a non-negative i128, checked with
/// [`Amount::fits_i128`]. Serialized as a decimal string everywhere —
/// storage, RPC, config — never as a float.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(pub U256);

impl Amount {
    pub const ZERO: Amount = Amount(U256::zero());

    /// Parse a decimal-string amount. Rejects empty strings and non-digits.
    pub fn from_dec_str(s: &str) -> Result<Self, ResolverError> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ResolverError::InvalidOrder(format!(
                "amount must be a decimal integer string, got {s:?}"
            )));
        }
        let v = U256::from_dec_str(s)
            .map_err(|e| ResolverError::InvalidOrder(format!("amount out of range: {e}")))?;
        Ok(Self(v))
    }

    pub fn from_u128(v: u128) -> Self {
        Self(U256::from(v))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Whether this value fits the Stellar token bound (non-negative i128).
    pub fn fits_i128(&self) -> bool {
        self.0 <= U256::from(i128::MAX as u128)
    }

    /// The value as i128, for the Soroban wire format.
    pub fn to_i128(&self) -> Result<i128, ResolverError> {
        if !self.fits_i128() {
            return Err(ResolverError::InvalidOrder(format!(
                "amount {self} exceeds the Stellar i128 bound"
            )));
        }
        Ok(self.0.as_u128() as i128)
    }

    /// Big-endian 32-byte representation, for EVM calldata.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        self.0.to_big_endian(&mut out);
        out
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Amount::from_dec_str(&s).map_err(serde::de::Error::custom)
    }
}
