#![allow(missing_docs)]

//! Bounds checked big-endian reading of font data.
//!
//! Every table parser in this crate is written against `ReadScope` (an immutable window onto
//! the font bytes that remembers its absolute position) and `ReadCtxt` (a cursor within a
//! scope). Reads never panic: running off the end of a scope yields `ReadEof`, which converts
//! into `ParseError::BadEof`.

use crate::binary::{I16Be, I32Be, I64Be, U16Be, U24Be, U32Be, I8, U8};
use crate::error::ParseError;
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReadEof {}

/// Font data that is either borrowed from the caller or was produced by decompression.
pub struct ReadBuf<'a> {
    data: Cow<'a, [u8]>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReadScope<'a> {
    base: usize,
    data: &'a [u8],
}

#[derive(Clone)]
pub struct ReadCtxt<'a> {
    scope: ReadScope<'a>,
    offset: usize,
}

pub trait ReadBinary {
    type HostType<'a>: Sized;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError>;
}

pub trait ReadBinaryDep {
    type Args<'a>: Copy;
    type HostType<'a>: Sized;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        args: Self::Args<'a>,
    ) -> Result<Self::HostType<'a>, ParseError>;
}

/// A value with a fixed encoded size.
///
/// `read_fixed` is only ever handed a slice of exactly `SIZE` bytes, so implementations index
/// it directly.
pub trait ReadFixed {
    type HostType: Sized;

    const SIZE: usize;

    fn read_fixed(bytes: &[u8]) -> Self::HostType;
}

/// Build a value from the host type of a fixed size read.
pub trait ReadFrom {
    type ReadType: ReadFixed;

    fn read_from(value: <Self::ReadType as ReadFixed>::HostType) -> Self;
}

impl<T> ReadFixed for T
where
    T: ReadFrom,
{
    type HostType = T;

    const SIZE: usize = T::ReadType::SIZE;

    fn read_fixed(bytes: &[u8]) -> T {
        T::read_from(T::ReadType::read_fixed(bytes))
    }
}

impl<T> ReadBinary for T
where
    T: ReadFixed,
{
    type HostType<'a> = T::HostType;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let bytes = ctxt.read_slice(T::SIZE)?;
        Ok(T::read_fixed(bytes))
    }
}

impl<T> ReadBinaryDep for T
where
    T: ReadBinary,
{
    type Args<'a> = ();
    type HostType<'a> = T::HostType<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (): Self::Args<'_>,
    ) -> Result<Self::HostType<'a>, ParseError> {
        T::read(ctxt)
    }
}

/// A contiguous run of fixed size values that is decoded lazily.
#[derive(Clone)]
pub struct ReadArray<'a, T: ReadFixed> {
    scope: ReadScope<'a>,
    length: usize,
    phantom: PhantomData<T>,
}

pub struct ReadArrayIter<'a, T: ReadFixed> {
    scope: ReadScope<'a>,
    index: usize,
    length: usize,
    phantom: PhantomData<T>,
}

impl<'a> ReadScope<'a> {
    pub fn new(data: &'a [u8]) -> ReadScope<'a> {
        ReadScope { base: 0, data }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The absolute position of this scope within the buffer it was created from.
    pub fn base(&self) -> usize {
        self.base
    }

    pub fn offset(&self, offset: usize) -> ReadScope<'a> {
        let data = self.data.get(offset..).unwrap_or(&[]);
        ReadScope {
            base: self.base + offset,
            data,
        }
    }

    pub fn offset_length(&self, offset: usize, length: usize) -> Result<ReadScope<'a>, ParseError> {
        if offset > self.data.len() && length != 0 {
            return Err(ParseError::BadOffset);
        }
        let end = offset.checked_add(length).ok_or(ParseError::BadOffset)?;
        match self.data.get(offset..end) {
            Some(data) => Ok(ReadScope {
                base: self.base + offset,
                data,
            }),
            None if length == 0 => Ok(ReadScope {
                base: self.base + offset,
                data: &[],
            }),
            None => Err(ParseError::BadEof),
        }
    }

    pub fn ctxt(&self) -> ReadCtxt<'a> {
        ReadCtxt {
            scope: *self,
            offset: 0,
        }
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&self) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read::<T>()
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read_dep::<T>(args)
    }
}

impl<'a> ReadCtxt<'a> {
    pub fn check(&self, cond: bool) -> Result<(), ParseError> {
        if cond {
            Ok(())
        } else {
            Err(ParseError::BadValue)
        }
    }

    /// Check a condition, returning `ParseError::BadIndex` if `false`.
    pub fn check_index(&self, cond: bool) -> Result<(), ParseError> {
        if cond {
            Ok(())
        } else {
            Err(ParseError::BadIndex)
        }
    }

    /// Check a condition, returning `ParseError::BadVersion` if `false`.
    ///
    /// ```
    /// use glyphmatch::binary::read::ReadScope;
    /// use glyphmatch::error::ParseError;
    ///
    /// let mut ctxt = ReadScope::new(&[0, 1]).ctxt();
    /// let major_version = ctxt.read_u16be().expect("unable to read version");
    ///
    /// assert!(ctxt.check_version(major_version == 1).is_ok());
    /// assert_eq!(ctxt.check_version(major_version == 2), Err(ParseError::BadVersion));
    /// ```
    pub fn check_version(&self, cond: bool) -> Result<(), ParseError> {
        if cond {
            Ok(())
        } else {
            Err(ParseError::BadVersion)
        }
    }

    /// The scope starting at the current position.
    pub fn scope(&self) -> ReadScope<'a> {
        self.scope.offset(self.offset)
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn bytes_available(&self) -> bool {
        self.offset < self.scope.data.len()
    }

    pub fn bytes_remaining(&self) -> usize {
        self.scope.data.len().saturating_sub(self.offset)
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&mut self) -> Result<T::HostType<'a>, ParseError> {
        T::read_dep(self, ())
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &mut self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        T::read_dep(self, args)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ReadEof> {
        let bytes = self.read_slice(N)?;
        let mut array = [0; N];
        array.copy_from_slice(bytes);
        Ok(array)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadEof> {
        self.take::<1>().map(|[b]| b)
    }

    pub fn read_i8(&mut self) -> Result<i8, ReadEof> {
        self.take::<1>().map(i8::from_be_bytes)
    }

    pub fn read_u16be(&mut self) -> Result<u16, ReadEof> {
        self.take::<2>().map(u16::from_be_bytes)
    }

    pub fn read_i16be(&mut self) -> Result<i16, ReadEof> {
        self.take::<2>().map(i16::from_be_bytes)
    }

    pub fn read_u32be(&mut self) -> Result<u32, ReadEof> {
        self.take::<4>().map(u32::from_be_bytes)
    }

    pub fn read_i32be(&mut self) -> Result<i32, ReadEof> {
        self.take::<4>().map(i32::from_be_bytes)
    }

    /// Read an unsigned big-endian integer of `size` bytes (1 to 4), as used by CFF offsets.
    pub fn read_uint(&mut self, size: u8) -> Result<u32, ParseError> {
        match size {
            1 => Ok(u32::from(self.read_u8()?)),
            2 => Ok(u32::from(self.read_u16be()?)),
            3 => self.read::<U24Be>(),
            4 => Ok(self.read_u32be()?),
            _ => Err(ParseError::BadValue),
        }
    }

    pub fn read_array<T: ReadFixed>(&mut self, length: usize) -> Result<ReadArray<'a, T>, ParseError> {
        let byte_len = length.checked_mul(T::SIZE).ok_or(ParseError::BadValue)?;
        let scope = self.read_scope(byte_len)?;
        Ok(ReadArray {
            scope,
            length,
            phantom: PhantomData,
        })
    }

    /// Read at most `length` items, stopping early if the data runs out.
    pub fn read_array_upto<T: ReadFixed>(&mut self, length: usize) -> Result<ReadArray<'a, T>, ParseError> {
        let available = self.bytes_remaining() / T::SIZE;
        self.read_array(length.min(available))
    }

    /// Read up to and including the byte containing the supplied nibble.
    pub fn read_until_nibble(&mut self, nibble: u8) -> Result<&'a [u8], ReadEof> {
        let rest = self.scope.data.get(self.offset..).unwrap_or(&[]);
        let end = rest
            .iter()
            .position(|&b| (b >> 4) == nibble || (b & 0xF) == nibble)
            .ok_or(ReadEof {})?;
        self.read_slice(end + 1)
    }

    pub fn read_scope(&mut self, length: usize) -> Result<ReadScope<'a>, ReadEof> {
        let scope = self
            .scope
            .offset_length(self.offset, length)
            .map_err(|_| ReadEof {})?;
        self.offset += length;
        Ok(scope)
    }

    pub fn read_slice(&mut self, length: usize) -> Result<&'a [u8], ReadEof> {
        self.read_scope(length).map(|scope| scope.data)
    }

    pub fn skip(&mut self, length: usize) -> Result<(), ReadEof> {
        self.read_scope(length).map(|_| ())
    }
}

impl<'a> ReadBuf<'a> {
    pub fn scope(&'a self) -> ReadScope<'a> {
        ReadScope::new(&self.data)
    }
}

impl<'a> From<&'a [u8]> for ReadBuf<'a> {
    fn from(data: &'a [u8]) -> ReadBuf<'a> {
        ReadBuf {
            data: Cow::Borrowed(data),
        }
    }
}

impl From<Vec<u8>> for ReadBuf<'_> {
    fn from(data: Vec<u8>) -> Self {
        ReadBuf {
            data: Cow::Owned(data),
        }
    }
}

impl<'a, T: ReadFixed> ReadArray<'a, T> {
    pub fn empty() -> ReadArray<'a, T> {
        ReadArray {
            scope: ReadScope::new(&[]),
            length: 0,
            phantom: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn get_item(&self, index: usize) -> Option<T::HostType> {
        if index >= self.length {
            return None;
        }
        let start = index * T::SIZE;
        self.scope
            .data
            .get(start..start + T::SIZE)
            .map(T::read_fixed)
    }

    pub fn read_item(&self, index: usize) -> Result<T::HostType, ParseError> {
        self.get_item(index).ok_or(ParseError::BadIndex)
    }

    pub fn last(&self) -> Option<T::HostType> {
        self.get_item(self.length.checked_sub(1)?)
    }

    pub fn iter(&self) -> ReadArrayIter<'a, T> {
        ReadArrayIter {
            scope: self.scope,
            index: 0,
            length: self.length,
            phantom: PhantomData,
        }
    }

    pub fn to_vec(&self) -> Vec<T::HostType> {
        self.iter().collect()
    }
}

impl<'a, 'b, T: ReadFixed> IntoIterator for &'b ReadArray<'a, T> {
    type Item = T::HostType;
    type IntoIter = ReadArrayIter<'a, T>;

    fn into_iter(self) -> ReadArrayIter<'a, T> {
        self.iter()
    }
}

impl<T: ReadFixed> Iterator for ReadArrayIter<'_, T> {
    type Item = T::HostType;

    fn next(&mut self) -> Option<T::HostType> {
        if self.index >= self.length {
            return None;
        }
        let start = self.index * T::SIZE;
        let item = self.scope.data.get(start..start + T::SIZE).map(T::read_fixed)?;
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.length - self.index;
        (remaining, Some(remaining))
    }
}

impl<T: ReadFixed> ExactSizeIterator for ReadArrayIter<'_, T> {}

impl<'a, T> fmt::Debug for ReadArray<'a, T>
where
    T: ReadFixed,
    T::HostType: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl ReadFixed for U8 {
    type HostType = u8;

    const SIZE: usize = 1;

    fn read_fixed(bytes: &[u8]) -> u8 {
        bytes[0]
    }
}

impl ReadFixed for I8 {
    type HostType = i8;

    const SIZE: usize = 1;

    fn read_fixed(bytes: &[u8]) -> i8 {
        bytes[0] as i8
    }
}

impl ReadFixed for U16Be {
    type HostType = u16;

    const SIZE: usize = 2;

    fn read_fixed(bytes: &[u8]) -> u16 {
        u16::from_be_bytes([bytes[0], bytes[1]])
    }
}

impl ReadFixed for I16Be {
    type HostType = i16;

    const SIZE: usize = 2;

    fn read_fixed(bytes: &[u8]) -> i16 {
        i16::from_be_bytes([bytes[0], bytes[1]])
    }
}

impl ReadFixed for U24Be {
    type HostType = u32;

    const SIZE: usize = 3;

    fn read_fixed(bytes: &[u8]) -> u32 {
        u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])
    }
}

impl ReadFixed for U32Be {
    type HostType = u32;

    const SIZE: usize = 4;

    fn read_fixed(bytes: &[u8]) -> u32 {
        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl ReadFixed for I32Be {
    type HostType = i32;

    const SIZE: usize = 4;

    fn read_fixed(bytes: &[u8]) -> i32 {
        i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl ReadFixed for I64Be {
    type HostType = i64;

    const SIZE: usize = 8;

    fn read_fixed(bytes: &[u8]) -> i64 {
        let mut array = [0; 8];
        array.copy_from_slice(&bytes[..8]);
        i64::from_be_bytes(array)
    }
}

impl<T1, T2> ReadFixed for (T1, T2)
where
    T1: ReadFixed,
    T2: ReadFixed,
{
    type HostType = (T1::HostType, T2::HostType);

    const SIZE: usize = T1::SIZE + T2::SIZE;

    fn read_fixed(bytes: &[u8]) -> Self::HostType {
        let (a, b) = bytes.split_at(T1::SIZE);
        (T1::read_fixed(a), T2::read_fixed(b))
    }
}

impl<T1, T2, T3> ReadFixed for (T1, T2, T3)
where
    T1: ReadFixed,
    T2: ReadFixed,
    T3: ReadFixed,
{
    type HostType = (T1::HostType, T2::HostType, T3::HostType);

    const SIZE: usize = T1::SIZE + T2::SIZE + T3::SIZE;

    fn read_fixed(bytes: &[u8]) -> Self::HostType {
        let (a, rest) = bytes.split_at(T1::SIZE);
        let (b, c) = rest.split_at(T2::SIZE);
        (T1::read_fixed(a), T2::read_fixed(b), T3::read_fixed(c))
    }
}
