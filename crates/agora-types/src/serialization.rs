//! Encodings of [`Address`] and [`Hash`].
//!
//! JSON carries the display strings, so an address reads as `agora1...` in
//! config files and action files and can key a JSON object. Borsh carries
//! the raw bytes and feeds call payloads and timelock operation ids.

use crate::{Address, Hash};

#[cfg(feature = "serde")]
macro_rules! serde_via_display {
    ($($ty:ty),+) => {$(
        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
                text.parse().map_err(serde::de::Error::custom)
            }
        }
    )+};
}

#[cfg(feature = "serde")]
serde_via_display!(Address, Hash);

#[cfg(feature = "borsh")]
macro_rules! borsh_as_bytes {
    ($($ty:ty => $len:expr),+) => {$(
        impl borsh::BorshSerialize for $ty {
            fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
                writer.write_all(self.as_bytes())
            }
        }

        impl borsh::BorshDeserialize for $ty {
            fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
                let mut bytes = [0u8; $len];
                reader.read_exact(&mut bytes)?;
                Ok(<$ty>::from_bytes(bytes))
            }
        }
    )+};
}

#[cfg(feature = "borsh")]
borsh_as_bytes!(Address => 20, Hash => 32);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    #[cfg(feature = "serde")]
    fn test_address_keys_a_json_object() {
        let mut balances = BTreeMap::new();
        balances.insert(Address::from_label("alice"), 7u64);
        let json = serde_json::to_string(&balances).unwrap();
        assert!(json.starts_with("{\"agora1"));

        let back: BTreeMap<Address, u64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, balances);
    }

    #[test]
    #[cfg(feature = "serde")]
    fn test_hash_json_is_prefixed_hex() {
        let hash = Hash::compute(b"grant round 3");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash));
        assert!(serde_json::from_str::<Hash>("\"0x12\"").is_err());
    }

    #[test]
    #[cfg(feature = "borsh")]
    fn test_borsh_is_raw_bytes() {
        let addr = Address::from_label("alice");
        assert_eq!(borsh::to_vec(&addr).unwrap().as_slice(), addr.as_bytes());

        let hash = Hash::compute(b"payload");
        let decoded: Hash = borsh::from_slice(&borsh::to_vec(&hash).unwrap()).unwrap();
        assert_eq!(decoded, hash);
        assert!(borsh::from_slice::<Address>(&[0u8; 19]).is_err());
    }
}
