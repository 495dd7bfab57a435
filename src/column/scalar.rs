use byteorder::{ByteOrder, LittleEndian};

use crate::types::ColumnKind;

/// A fixed-width value that can live in a typed column buffer.
pub trait Scalar: Copy + Default + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    const WIDTH: usize;
    /// Column kind this Rust type maps to by default.
    const KIND: ColumnKind;

    fn write_le(self, dst: &mut [u8]);
    fn read_le(src: &[u8]) -> Self;
}

impl Scalar for bool {
    const WIDTH: usize = 1;
    const KIND: ColumnKind = ColumnKind::Bool;

    fn write_le(self, dst: &mut [u8]) {
        dst[0] = self as u8;
    }

    fn read_le(src: &[u8]) -> Self {
        src[0] != 0
    }
}

impl Scalar for i8 {
    const WIDTH: usize = 1;
    const KIND: ColumnKind = ColumnKind::TinyInt;

    fn write_le(self, dst: &mut [u8]) {
        dst[0] = self as u8;
    }

    fn read_le(src: &[u8]) -> Self {
        src[0] as i8
    }
}

impl Scalar for u8 {
    const WIDTH: usize = 1;
    const KIND: ColumnKind = ColumnKind::UTinyInt;

    fn write_le(self, dst: &mut [u8]) {
        dst[0] = self;
    }

    fn read_le(src: &[u8]) -> Self {
        src[0]
    }
}

macro_rules! impl_scalar {
    ($($t:ty, $width:expr, $kind:ident, $write:ident, $read:ident);* $(;)?) => {
        $(
            impl Scalar for $t {
                const WIDTH: usize = $width;
                const KIND: ColumnKind = ColumnKind::$kind;

                fn write_le(self, dst: &mut [u8]) {
                    LittleEndian::$write(dst, self);
                }

                fn read_le(src: &[u8]) -> Self {
                    LittleEndian::$read(src)
                }
            }
        )*
    };
}

impl_scalar! {
    i16, 2, SmallInt, write_i16, read_i16;
    u16, 2, USmallInt, write_u16, read_u16;
    i32, 4, Int, write_i32, read_i32;
    u32, 4, UInt, write_u32, read_u32;
    i64, 8, BigInt, write_i64, read_i64;
    u64, 8, UBigInt, write_u64, read_u64;
    f32, 4, Float, write_f32, read_f32;
    f64, 8, Double, write_f64, read_f64;
}
