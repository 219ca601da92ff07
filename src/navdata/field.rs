//! # NavData Field Primitives
//!
//! Little-endian scalar, vector and matrix fields that make up option
//! records. Every field has a statically known byte width, so a record's
//! width is the sum of its fields.

use bytes::Buf;

/// Fixed-width little-endian value readable from a byte buffer
pub trait Field: Sized {
    /// Width in bytes on the wire
    const SIZE: usize;

    /// Read one value, advancing `buf` by `SIZE` bytes.
    ///
    /// Callers guarantee at least `SIZE` bytes remain.
    fn read<B: Buf>(buf: &mut B) -> Self;
}

macro_rules! scalar_field {
    ($($ty:ty => $get:ident),* $(,)?) => {
        $(
            impl Field for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn read<B: Buf>(buf: &mut B) -> Self {
                    buf.$get()
                }
            }
        )*
    };
}

scalar_field! {
    u8 => get_u8,
    u16 => get_u16_le,
    i16 => get_i16_le,
    u32 => get_u32_le,
    i32 => get_i32_le,
    f32 => get_f32_le,
}

impl<T: Field, const N: usize> Field for [T; N] {
    const SIZE: usize = T::SIZE * N;

    fn read<B: Buf>(buf: &mut B) -> Self {
        std::array::from_fn(|_| T::read(buf))
    }
}

/// Three-component float vector (`vector31_t`)
pub type Vector31 = [f32; 3];

/// Two-component float vector (`vector21_t`)
pub type Vector21 = [f32; 2];

/// Row-major 3x3 float matrix (`matrix33_t`)
pub type Matrix33 = [[f32; 3]; 3];

/// Pixel coordinate pair (`screen_point_t`)
pub type ScreenPoint = [i32; 2];

/// Firmware boolean, four bytes wide
pub type Bool32 = u32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(<u8 as Field>::SIZE, 1);
        assert_eq!(<Vector31 as Field>::SIZE, 12);
        assert_eq!(<Matrix33 as Field>::SIZE, 36);
        assert_eq!(<[ScreenPoint; 30] as Field>::SIZE, 240);
    }

    #[test]
    fn test_read_little_endian() {
        let bytes = [0x88, 0x77, 0x66, 0x55, 0xFF, 0xFF];
        let mut buf = &bytes[..];
        assert_eq!(u32::read(&mut buf), 0x5566_7788);
        assert_eq!(i16::read(&mut buf), -1);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_read_matrix_row_major() {
        let mut bytes = Vec::new();
        for i in 0..9 {
            bytes.extend_from_slice(&(i as f32).to_le_bytes());
        }
        let m = <Matrix33 as Field>::read(&mut &bytes[..]);
        assert_eq!(m[0], [0.0, 1.0, 2.0]);
        assert_eq!(m[2], [6.0, 7.0, 8.0]);
    }
}
