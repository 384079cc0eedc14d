use crate::traits::SizedBytes;
use bytes::Buf;
use dg_utxo_serialize::TxSerialize;
use hex::{decode, encode, FromHexError};
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io::{Cursor, Error, ErrorKind, Read};
use std::str::FromStr;

pub fn prep_hex_str(to_fix: &str) -> String {
    let lc = to_fix.to_lowercase();
    if let Some(s) = lc.strip_prefix("0x") {
        s.to_string()
    } else {
        lc
    }
}

pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, FromHexError> {
    decode(prep_hex_str(hex))
}

macro_rules! impl_sized_bytes {
    ($($name: ident, $size:expr, $visitor:ident);*) => {
        $(
            #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name {
                pub bytes: [u8; $size]
            }
            impl<'a> SizedBytes<'a, $size> for $name {
                fn new(bytes: [u8; $size]) -> Self {
                    Self { bytes }
                }
                fn parse(bytes: &[u8]) -> Result<Self, Error> {
                    let bytes: [u8; $size] = bytes.try_into().map_err(|_| {
                        Error::new(
                            ErrorKind::InvalidInput,
                            format!("Expected {} bytes for {}, got {}", $size, stringify!($name), bytes.len()),
                        )
                    })?;
                    Ok(Self { bytes })
                }
                fn bytes(&self) -> [u8; $size] {
                    self.bytes
                }
            }
            impl $name {
                #[must_use]
                pub fn reversed(&self) -> Self {
                    let mut bytes = self.bytes;
                    bytes.reverse();
                    Self { bytes }
                }
                #[must_use]
                pub fn to_vec(&self) -> Vec<u8> {
                    self.bytes.to_vec()
                }
            }

            impl Serialize for $name {
                fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: Serializer,
                {
                    serializer.serialize_str(self.to_string().as_str())
                }
            }

            impl AsRef<[u8]> for $name {
                fn as_ref(&self) -> &[u8] {
                    &self.bytes
                }
            }

            impl From<[u8; $size]> for $name {
                fn from(bytes: [u8; $size]) -> Self {
                    $name { bytes }
                }
            }

            impl From<&[u8; $size]> for $name {
                fn from(bytes: &[u8; $size]) -> Self {
                    $name { bytes: *bytes }
                }
            }

            impl TryFrom<&[u8]> for $name {
                type Error = Error;

                fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
                    $name::parse(value)
                }
            }

            impl FromStr for $name {
                type Err = Error;

                fn from_str(hex: &str) -> Result<Self, Self::Err> {
                    let bytes = hex_to_bytes(hex)
                        .map_err(|e| Error::new(ErrorKind::InvalidInput, format!("Invalid hex for {}: {e}", stringify!($name))))?;
                    $name::parse(&bytes)
                }
            }

            struct $visitor;

            impl<'de> Visitor<'de> for $visitor {
                type Value = $name;

                fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                    formatter.write_str(format!("Expecting a hex String of {} bytes", $size).as_str())
                }

                fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
                where
                    E: serde::de::Error,
                {
                    $name::from_str(value).map_err(E::custom)
                }
            }

            impl<'a> Deserialize<'a> for $name {
                fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
                where
                    D: Deserializer<'a>,
                {
                    deserializer.deserialize_str($visitor)
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", encode(self.bytes))
                }
            }

            impl fmt::Debug for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", encode(self.bytes))
                }
            }

            impl Default for $name {
                fn default() -> $name {
                    $name::from([0; $size])
                }
            }

            impl TxSerialize for $name {
                fn to_bytes(&self) -> Vec<u8> {
                    self.bytes.to_vec()
                }
                fn from_bytes<T: AsRef<[u8]>>(bytes: &mut Cursor<T>) -> Result<Self, Error> where Self: Sized,
                {
                    if bytes.remaining() < $size {
                        Err(Error::new(ErrorKind::InvalidInput, format!("Failed to Parse {}, expected length {}, found {}", stringify!($name), $size, bytes.remaining())))
                    } else {
                        let mut buf = [0u8; $size];
                        bytes.read_exact(&mut buf)?;
                        Ok(buf.into())
                    }
                }
            }
        )*
    };
    ()=>{};
}

impl_sized_bytes!(
    Bytes20, 20, Bytes20Visitor;
    Bytes32, 32, Bytes32Visitor;
    Bytes33, 33, Bytes33Visitor
);
