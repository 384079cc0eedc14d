use bytes::Buf;
use log::warn;
use sha2::{Digest, Sha256};
use std::io::{Cursor, Error, ErrorKind, Read};

const LARGE_VEC_WARNING: u64 = 100_000;

pub fn hash_256(input: impl AsRef<[u8]>) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hasher.finalize().to_vec()
}

pub fn double_hash_256(input: impl AsRef<[u8]>) -> [u8; 32] {
    let first = Sha256::digest(input);
    Sha256::digest(first).into()
}

pub trait TxSerialize {
    fn to_bytes(&self) -> Vec<u8>
    where
        Self: Sized;
    fn from_bytes<T: AsRef<[u8]>>(bytes: &mut Cursor<T>) -> Result<Self, Error>
    where
        Self: Sized;
}

/// Bitcoin CompactSize length prefix.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VarInt(pub u64);

impl VarInt {
    #[must_use]
    pub fn encoded_len(value: u64) -> usize {
        match value {
            0..=0xfc => 1,
            0xfd..=0xffff => 3,
            0x1_0000..=0xffff_ffff => 5,
            _ => 9,
        }
    }
}

impl TxSerialize for VarInt {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(VarInt::encoded_len(self.0));
        match self.0 {
            0..=0xfc => bytes.push(self.0 as u8),
            0xfd..=0xffff => {
                bytes.push(0xfd);
                bytes.extend((self.0 as u16).to_le_bytes());
            }
            0x1_0000..=0xffff_ffff => {
                bytes.push(0xfe);
                bytes.extend((self.0 as u32).to_le_bytes());
            }
            _ => {
                bytes.push(0xff);
                bytes.extend(self.0.to_le_bytes());
            }
        }
        bytes
    }
    fn from_bytes<T: AsRef<[u8]>>(bytes: &mut Cursor<T>) -> Result<Self, Error> {
        let prefix = u8::from_bytes(bytes)?;
        let value = match prefix {
            0xfd => u16::from_bytes(bytes)? as u64,
            0xfe => u32::from_bytes(bytes)? as u64,
            0xff => u64::from_bytes(bytes)?,
            v => v as u64,
        };
        Ok(VarInt(value))
    }
}

impl TxSerialize for bool {
    fn to_bytes(&self) -> Vec<u8>
    where
        Self: Sized,
    {
        vec![*self as u8]
    }
    fn from_bytes<T: AsRef<[u8]>>(bytes: &mut Cursor<T>) -> Result<Self, Error>
    where
        Self: Sized,
    {
        let mut bool_buf: [u8; 1] = [0; 1];
        bytes.read_exact(&mut bool_buf)?;
        match bool_buf[0] {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Failed to parse bool, invalid value: {:?}", bool_buf[0]),
            )),
        }
    }
}

impl<T> TxSerialize for Vec<T>
where
    T: TxSerialize,
{
    fn to_bytes(&self) -> Vec<u8>
    where
        Self: Sized,
    {
        let mut bytes: Vec<u8> = VarInt(self.len() as u64).to_bytes();
        for e in self {
            bytes.extend(e.to_bytes());
        }
        bytes
    }
    fn from_bytes<B: AsRef<[u8]>>(bytes: &mut Cursor<B>) -> Result<Self, Error>
    where
        Self: Sized,
    {
        let vec_len = VarInt::from_bytes(bytes)?.0;
        if vec_len > LARGE_VEC_WARNING {
            warn!("Deserializing Large Vec: {vec_len}")
        }
        if vec_len > bytes.remaining() as u64 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "Vec length {vec_len} exceeds remaining bytes {}",
                    bytes.remaining()
                ),
            ));
        }
        let buf: Vec<T> = Vec::with_capacity(vec_len as usize);
        (0..vec_len).try_fold(buf, |mut vec, _| {
            vec.push(T::from_bytes(bytes)?);
            Ok(vec)
        })
    }
}

macro_rules! impl_primitives {
    ($($name: ident, $size:expr);*) => {
        $(
            impl TxSerialize for $name {
                fn to_bytes(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
                fn from_bytes<T: AsRef<[u8]>>(bytes: &mut Cursor<T>) -> Result<Self, std::io::Error> where Self: Sized,
                {
                    if bytes.remaining() < $size {
                        Err(Error::new(ErrorKind::InvalidInput, format!("Failed to Parse {}, expected length {}, found {}", stringify!($name), $size, bytes.remaining())))
                    } else {
                        let mut buffer: [u8; $size] = [0; $size];
                        bytes.read_exact(&mut buffer)?;
                        Ok($name::from_le_bytes(buffer))
                    }
                }
            }
        )*
    };
    ()=>{};
}
impl_primitives!(
    i8, 1;
    i16, 2;
    i32, 4;
    i64, 8;
    u8, 1;
    u16, 2;
    u32, 4;
    u64, 8
);

/// Reads exactly one value and fails if trailing bytes remain.
pub fn from_exact_bytes<S: TxSerialize>(bytes: &[u8]) -> Result<S, Error> {
    let mut cursor = Cursor::new(bytes);
    let value = S::from_bytes(&mut cursor)?;
    if cursor.has_remaining() {
        Err(Error::new(
            ErrorKind::InvalidData,
            format!("{} trailing bytes after value", cursor.remaining()),
        ))
    } else {
        Ok(value)
    }
}

#[test]
fn test_varint_boundaries() {
    for (value, len) in [
        (0u64, 1usize),
        (0xfc, 1),
        (0xfd, 3),
        (0xffff, 3),
        (0x1_0000, 5),
        (0xffff_ffff, 5),
        (0x1_0000_0000, 9),
    ] {
        let bytes = VarInt(value).to_bytes();
        assert_eq!(bytes.len(), len);
        assert_eq!(VarInt::encoded_len(value), len);
        let parsed: VarInt = from_exact_bytes(&bytes).unwrap();
        assert_eq!(parsed.0, value);
    }
}

#[test]
fn test_vec_rejects_oversized_length() {
    let mut bytes = VarInt(10).to_bytes();
    bytes.extend([1u8, 2, 3]);
    assert!(from_exact_bytes::<Vec<u8>>(&bytes).is_err());
}
