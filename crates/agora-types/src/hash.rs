//! Blake3 digests naming proposal descriptions and timelock operations.

use crate::error::TypesError;
use std::fmt;
use std::str::FromStr;

/// Blake3 digest, shown as `0x` followed by 64 hex digits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Digest of a proposal description or any other byte string.
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Digest of the borsh encoding of `value`.
    #[cfg(feature = "borsh")]
    pub fn of_borsh<T: borsh::BorshSerialize>(value: &T) -> Result<Self, TypesError> {
        let mut hasher = blake3::Hasher::new();
        borsh::to_writer(&mut hasher, value).map_err(|e| TypesError::Encoding(e.to_string()))?;
        Ok(Self(*hasher.finalize().as_bytes()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// `0x1234abcd…9f8e7d6c`, for log lines.
    pub fn short(&self) -> String {
        format!("0x{}…{}", hex::encode(&self.0[..4]), hex::encode(&self.0[28..]))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short())
    }
}

impl FromStr for Hash {
    type Err = TypesError;

    /// Accepts the digits with or without the `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        let bytes = hex::decode(digits)?;
        let raw: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| TypesError::InvalidHashLength(bytes.len()))?;
        Ok(Self(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_digest() {
        let hash = Hash::compute(b"fund the community garden");
        assert_ne!(hash, Hash::default());
        assert_eq!(hash, Hash::compute(b"fund the community garden"));
        assert_ne!(hash, Hash::compute(b"fund the community garden!"));
    }

    #[test]
    fn test_display_parses_back() {
        let hash = Hash::compute(b"ipfs://description");
        assert_eq!(hash.to_string().parse::<Hash>().unwrap(), hash);
        assert_eq!(hash.to_hex().parse::<Hash>().unwrap(), hash);
        assert_eq!(hash.to_string().len(), 66);
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert_eq!(
            hex::encode([1u8; 31]).parse::<Hash>(),
            Err(TypesError::InvalidHashLength(31))
        );
        assert!(matches!("0xzz".parse::<Hash>(), Err(TypesError::InvalidHex(_))));
    }

    #[test]
    fn test_short_form() {
        let hash = Hash::from_bytes([0xab; 32]);
        assert_eq!(hash.short(), "0xabababab…abababab");
        assert_eq!(format!("{:?}", hash), "Hash(0xabababab…abababab)");
    }

    #[test]
    #[cfg(feature = "borsh")]
    fn test_borsh_digest_matches_encoding() {
        let value = (vec![1u64, 2], 7u64);
        let encoded = borsh::to_vec(&value).unwrap();
        assert_eq!(Hash::of_borsh(&value).unwrap(), Hash::compute(&encoded));
    }
}
