//! Byte-packed bit vectors.
//!
//! [`BitVector`] stores bits most-significant-first: bit `i` lives in byte `i / 8`
//! at bit `7 - i % 8`. Edges use a pair of these vectors to mark the positions of
//! their endpoints, which makes every edge a ready-made clause.
//!
//! Index operations never panic. Reading past the logical length yields `false`,
//! and writing past it does nothing; callers resize first when they need room.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Not};

/// A fixed-length bit array backed by a vector of bytes.
///
/// The logical length (in bits) is tracked separately from the storage, so a
/// vector may be widened with [`resize_bytes`][BitVector::resize_bytes] without
/// changing which bits are addressable. Bits of the storage beyond the logical
/// length are always zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BitVector {
    /// Storage, MSB-first within each byte.
    bytes: Vec<u8>,
    /// Logical length in bits.
    len: usize,
}

impl BitVector {
    /// Number of bits per storage byte.
    const BITS_PER_BYTE: usize = 8;

    /// Returns the number of bytes needed to hold `bits` bits.
    pub const fn calculate_bytes(bits: usize) -> usize {
        if bits == 0 {
            0
        } else {
            (bits - 1) / Self::BITS_PER_BYTE + 1
        }
    }

    /// Creates a zero-filled vector of the given length (in bits).
    pub fn new(bits: usize) -> Self {
        Self {
            bytes: vec![0; Self::calculate_bytes(bits)],
            len: bits,
        }
    }

    /// Creates a vector with no bits and no storage.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a string of bit digits, first character being bit 0.
    ///
    /// Every character other than `'0'` is a set bit. ASCII whitespace is
    /// skipped, so the output of [`Display`][fmt::Display] parses back.
    pub fn from_bit_string(s: &str) -> Self {
        let digits: Vec<bool> = s.chars().filter(|c| !c.is_ascii_whitespace()).map(|c| c != '0').collect();
        let mut vector = Self::new(digits.len());
        for (i, bit) in digits.into_iter().enumerate() {
            if bit {
                vector.set(i);
            }
        }
        vector
    }

    /// Returns the logical length in bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the vector has no addressable bits.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the storage width in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Gets the byte index and the in-byte mask for a given bit index.
    #[inline]
    fn byte_and_mask(index: usize) -> (usize, u8) {
        let byte = index / Self::BITS_PER_BYTE;
        let bit = Self::BITS_PER_BYTE - 1 - index % Self::BITS_PER_BYTE;
        (byte, 1u8 << bit)
    }

    /// Returns the bit at `index`, or false when out of range.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        let (byte, mask) = Self::byte_and_mask(index);
        self.bytes[byte] & mask != 0
    }

    /// Sets the bit at `index`. Does nothing when out of range.
    #[inline]
    pub fn set(&mut self, index: usize) {
        if index >= self.len {
            return;
        }
        let (byte, mask) = Self::byte_and_mask(index);
        self.bytes[byte] |= mask;
    }

    /// Clears the bit at `index`. Does nothing when out of range.
    #[inline]
    pub fn clear(&mut self, index: usize) {
        if index >= self.len {
            return;
        }
        let (byte, mask) = Self::byte_and_mask(index);
        self.bytes[byte] &= !mask;
    }

    /// Returns true if no bit is set.
    pub fn is_zero(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }

    /// Returns the number of set bits.
    pub fn count_ones(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Returns an iterator over the indices of set bits, in increasing order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        let len = self.len;
        self.bytes
            .iter()
            .enumerate()
            .filter(|&(_, &byte)| byte != 0)
            .flat_map(|(i, &byte)| {
                (0..Self::BITS_PER_BYTE)
                    .filter(move |bit| byte & (0x80 >> bit) != 0)
                    .map(move |bit| i * Self::BITS_PER_BYTE + bit)
            })
            .take_while(move |&index| index < len)
    }

    /// Changes the logical length, keeping the low-order bits.
    ///
    /// Growing zero-fills the new bits; shrinking truncates.
    pub fn resize(&mut self, bits: usize) {
        self.bytes.resize(Self::calculate_bytes(bits), 0);
        self.len = bits;
        self.mask_tail();
    }

    /// Changes the storage width to exactly `bytes` bytes.
    ///
    /// Growing only widens the storage, the logical length stays the same.
    /// Shrinking below the current content truncates it.
    pub fn resize_bytes(&mut self, bytes: usize) {
        self.bytes.resize(bytes, 0);
        self.len = self.len.min(bytes * Self::BITS_PER_BYTE);
        self.mask_tail();
    }

    /// Zeroes every stored bit at or beyond the logical length.
    fn mask_tail(&mut self) {
        let used = Self::calculate_bytes(self.len);
        for byte in self.bytes.iter_mut().skip(used) {
            *byte = 0;
        }
        let rem = self.len % Self::BITS_PER_BYTE;
        if rem != 0 {
            self.bytes[used - 1] &= 0xFF << (Self::BITS_PER_BYTE - rem);
        }
    }

    fn zip_with(&self, other: &Self, op: impl Fn(u8, u8) -> u8) -> Self {
        let mut result = Self::new(self.len.max(other.len));
        for (i, byte) in result.bytes.iter_mut().enumerate() {
            let a = self.bytes.get(i).copied().unwrap_or(0);
            let b = other.bytes.get(i).copied().unwrap_or(0);
            *byte = op(a, b);
        }
        result.mask_tail();
        result
    }

    /// Bitwise OR. The shorter operand is treated as zero-padded.
    pub fn or(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a | b)
    }

    /// Bitwise AND. The shorter operand is treated as zero-padded.
    pub fn and(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a & b)
    }

    /// Bitwise XOR. The shorter operand is treated as zero-padded.
    pub fn xor(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a ^ b)
    }

    /// Complements every addressable bit.
    pub fn invert(&mut self) {
        let used = Self::calculate_bytes(self.len);
        for byte in self.bytes.iter_mut().take(used) {
            *byte = !*byte;
        }
        self.mask_tail();
    }

    /// Moves every bit `n` places towards index 0. Bits shifted past 0 are lost.
    pub fn shift_left(&mut self, n: usize) {
        let ones: Vec<usize> = self.iter_ones().collect();
        self.bytes.fill(0);
        for i in ones.into_iter().filter(|&i| i >= n) {
            self.set(i - n);
        }
    }

    /// Moves every bit `n` places away from index 0. Bits shifted past the end are lost.
    pub fn shift_right(&mut self, n: usize) {
        let ones: Vec<usize> = self.iter_ones().collect();
        self.bytes.fill(0);
        for i in ones {
            self.set(i.saturating_add(n));
        }
    }

    /// Renders the logical bits as a string of `0`/`1`, bit 0 first.
    pub fn to_bit_string(&self) -> String {
        (0..self.len).map(|i| if self.get(i) { '1' } else { '0' }).collect()
    }
}

impl fmt::Display for BitVector {
    /// Prints every storage byte as eight digits, bytes separated by spaces.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.bytes.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:08b}", byte)?;
        }
        Ok(())
    }
}

impl BitOr for &BitVector {
    type Output = BitVector;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.or(rhs)
    }
}

impl BitAnd for &BitVector {
    type Output = BitVector;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.and(rhs)
    }
}

impl BitXor for &BitVector {
    type Output = BitVector;

    fn bitxor(self, rhs: Self) -> Self::Output {
        self.xor(rhs)
    }
}

impl Not for BitVector {
    type Output = BitVector;

    fn not(mut self) -> Self::Output {
        self.invert();
        self
    }
}
