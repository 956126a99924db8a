#![deny(missing_docs)]

//! Writing of big-endian binary data, used to reassemble sfnt fonts.

use std::marker::PhantomData;

use crate::binary::read::{ReadFixed, ReadScope};
use crate::binary::{I16Be, I32Be, I64Be, U16Be, U32Be, U8};
use crate::error::WriteError;

/// An in-memory buffer that implements `WriteContext`.
#[derive(Debug, Default, Clone)]
pub struct WriteBuffer {
    data: Vec<u8>,
}

/// A fixed window of a `WriteBuffer` that a placeholder is filled through.
struct WriteSlice<'a> {
    offset: usize,
    data: &'a mut [u8],
}

/// A reserved region for a value that will be filled in later using
/// `WriteContext::write_placeholder`.
#[derive(Debug)]
pub struct Placeholder<T, HostType>
where
    T: WriteBinary<HostType>,
{
    offset: usize,
    length: usize,
    marker: PhantomData<T>,
    host: PhantomData<HostType>,
}

/// Trait that describes a type that can be written to a `WriteContext` in binary form.
pub trait WriteBinary<HostType = Self> {
    /// The type of the value returned by `write`.
    type Output;

    /// Write the binary representation of `val` to `ctxt`.
    fn write<C: WriteContext>(ctxt: &mut C, val: HostType) -> Result<Self::Output, WriteError>;
}

/// Trait for types that can have binary data written to them.
pub trait WriteContext {
    /// Write a slice of bytes to a `WriteContext`.
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), WriteError>;

    /// Write the specified number of zero bytes to the `WriteContext`.
    fn write_zeros(&mut self, count: usize) -> Result<(), WriteError>;

    /// The total number of bytes written so far.
    fn bytes_written(&self) -> usize;

    /// Write each value produced by `iter` as a `T`.
    fn write_iter<T, HostType>(
        &mut self,
        iter: impl Iterator<Item = HostType>,
    ) -> Result<(), WriteError>
    where
        Self: Sized,
        T: WriteBinary<HostType>,
    {
        for val in iter {
            T::write(self, val)?;
        }
        Ok(())
    }

    /// Reserve zeroed space for a `T` to be filled in later.
    fn placeholder<T, HostType>(&mut self) -> Result<Placeholder<T, HostType>, WriteError>
    where
        T: WriteBinary<HostType> + ReadFixed,
    {
        let offset = self.bytes_written();
        self.write_zeros(T::SIZE)?;

        Ok(Placeholder {
            offset,
            length: T::SIZE,
            marker: PhantomData,
            host: PhantomData,
        })
    }

    /// Consume the placeholder and write the supplied value into it.
    fn write_placeholder<T, HostType>(
        &mut self,
        placeholder: Placeholder<T, HostType>,
        val: HostType,
    ) -> Result<T::Output, WriteError>
    where
        T: WriteBinary<HostType>;
}

impl<T> WriteBinary<T> for U8
where
    T: Into<u8>,
{
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, t: T) -> Result<(), WriteError> {
        ctxt.write_bytes(&[t.into()])
    }
}

impl<T> WriteBinary<T> for I16Be
where
    T: Into<i16>,
{
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, t: T) -> Result<(), WriteError> {
        ctxt.write_bytes(&t.into().to_be_bytes())
    }
}

impl<T> WriteBinary<T> for U16Be
where
    T: Into<u16>,
{
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, t: T) -> Result<(), WriteError> {
        ctxt.write_bytes(&t.into().to_be_bytes())
    }
}

impl<T> WriteBinary<T> for I32Be
where
    T: Into<i32>,
{
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, t: T) -> Result<(), WriteError> {
        ctxt.write_bytes(&t.into().to_be_bytes())
    }
}

impl<T> WriteBinary<T> for U32Be
where
    T: Into<u32>,
{
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, t: T) -> Result<(), WriteError> {
        ctxt.write_bytes(&t.into().to_be_bytes())
    }
}

impl<T> WriteBinary<T> for I64Be
where
    T: Into<i64>,
{
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, t: T) -> Result<(), WriteError> {
        ctxt.write_bytes(&t.into().to_be_bytes())
    }
}

impl<'a> WriteBinary for ReadScope<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, scope: Self) -> Result<(), WriteError> {
        ctxt.write_bytes(scope.data())
    }
}

impl WriteContext for WriteBuffer {
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), WriteError> {
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn write_zeros(&mut self, count: usize) -> Result<(), WriteError> {
        self.data.resize(self.data.len() + count, 0);
        Ok(())
    }

    fn bytes_written(&self) -> usize {
        self.data.len()
    }

    fn write_placeholder<T, HostType>(
        &mut self,
        placeholder: Placeholder<T, HostType>,
        val: HostType,
    ) -> Result<T::Output, WriteError>
    where
        T: WriteBinary<HostType>,
    {
        let end = placeholder.offset + placeholder.length;
        let data = self
            .data
            .get_mut(placeholder.offset..end)
            .ok_or(WriteError::PlaceholderMismatch)?;
        let mut slice = WriteSlice { offset: 0, data };
        let output = T::write(&mut slice, val)?;
        if slice.offset != placeholder.length {
            return Err(WriteError::PlaceholderMismatch);
        }
        Ok(output)
    }
}

impl WriteContext for WriteSlice<'_> {
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), WriteError> {
        let end = self.offset + data.len();
        let target = self
            .data
            .get_mut(self.offset..end)
            .ok_or(WriteError::PlaceholderMismatch)?;
        target.copy_from_slice(data);
        self.offset = end;
        Ok(())
    }

    fn write_zeros(&mut self, count: usize) -> Result<(), WriteError> {
        let end = self.offset + count;
        let target = self
            .data
            .get_mut(self.offset..end)
            .ok_or(WriteError::PlaceholderMismatch)?;
        target.fill(0);
        self.offset = end;
        Ok(())
    }

    fn bytes_written(&self) -> usize {
        self.offset
    }

    fn write_placeholder<T, HostType>(
        &mut self,
        _placeholder: Placeholder<T, HostType>,
        _val: HostType,
    ) -> Result<T::Output, WriteError>
    where
        T: WriteBinary<HostType>,
    {
        // Placeholders are only handed out by the enclosing buffer.
        Err(WriteError::PlaceholderMismatch)
    }
}

impl WriteBuffer {
    /// Create a new, empty `WriteBuffer`
    pub fn new() -> Self {
        WriteBuffer { data: Vec::new() }
    }

    /// Retrieve a slice of the data held by this buffer
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the current size of the data held by this buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Mutable access to the written bytes, for in-place fixups.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume `self` and return the inner buffer
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag;

    #[test]
    fn test_write_integers() {
        let mut ctxt = WriteBuffer::new();
        U32Be::write(&mut ctxt, tag::GLYF).unwrap();
        I16Be::write(&mut ctxt, -2i16).unwrap();
        U8::write(&mut ctxt, 7u8).unwrap();

        assert_eq!(ctxt.bytes(), b"glyf\xFF\xFE\x07");
    }

    #[test]
    fn test_write_placeholder() {
        let mut ctxt = WriteBuffer::new();
        U8::write(&mut ctxt, 1u8).unwrap();
        let placeholder = ctxt.placeholder::<U16Be, u16>().unwrap();
        U8::write(&mut ctxt, 3u8).unwrap();
        ctxt.write_placeholder(placeholder, 2).unwrap();
        assert_eq!(ctxt.bytes(), &[1, 0, 2, 3]);
    }

    #[test]
    fn test_write_placeholder_size_mismatch() {
        struct Wide;

        impl WriteBinary<u32> for Wide {
            type Output = ();

            fn write<C: WriteContext>(ctxt: &mut C, val: u32) -> Result<(), WriteError> {
                U32Be::write(ctxt, val)?;
                U32Be::write(ctxt, val)
            }
        }

        impl ReadFixed for Wide {
            type HostType = u32;
            const SIZE: usize = 4;

            fn read_fixed(bytes: &[u8]) -> u32 {
                U32Be::read_fixed(bytes)
            }
        }

        let mut ctxt = WriteBuffer::new();
        let placeholder = ctxt.placeholder::<Wide, u32>().unwrap();
        assert_eq!(
            ctxt.write_placeholder(placeholder, 1),
            Err(WriteError::PlaceholderMismatch)
        );
    }
}
