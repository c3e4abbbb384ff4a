//! Scalar element types and dynamically typed field values.

use std::fmt::Debug;

use bytemuck::Pod;
use smallvec::SmallVec;

use crate::schema::ScalarKind;

/// Inline storage for one field's lanes; a 4x4 matrix fits without spilling.
pub type Lanes<T> = SmallVec<[T; 16]>;

/// A numeric type that can back a column.
///
/// The `lane_*` operations never panic. Integer arithmetic wraps and integer
/// division by zero yields zero; floats follow IEEE 754.
pub trait Scalar: Pod + PartialEq + PartialOrd + Debug + Default + Send + Sync + 'static {
    /// Kind tag stored in the schema.
    const KIND: ScalarKind;

    /// Wrap lanes of this type in a [`Value`].
    fn into_value(lanes: Lanes<Self>) -> Value;

    /// Borrow the lanes of a [`Value`] if it holds this type.
    fn lanes(value: &Value) -> Option<&[Self]>;

    fn lane_add(self, rhs: Self) -> Self;

    fn lane_sub(self, rhs: Self) -> Self;

    fn lane_mul(self, rhs: Self) -> Self;

    fn lane_div(self, rhs: Self) -> Self;

    /// Division rounded toward negative infinity.
    fn lane_floor_div(self, rhs: Self) -> Self;
}

/// The value of one field of one row, tagged with its scalar kind.
///
/// Scalars hold one lane, vectors and matrices hold `width` lanes.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    F32(Lanes<f32>),
    F64(Lanes<f64>),
    I32(Lanes<i32>),
    I64(Lanes<i64>),
    U32(Lanes<u32>),
    U8(Lanes<u8>),
}

impl Value {
    /// Build a value from a slice of lanes.
    #[must_use]
    pub fn from_lanes<T: Scalar>(lanes: &[T]) -> Self {
        T::into_value(SmallVec::from_slice(lanes))
    }

    /// Scalar kind of the lanes.
    #[must_use]
    pub const fn kind(&self) -> ScalarKind {
        match self {
            Self::F32(_) => ScalarKind::F32,
            Self::F64(_) => ScalarKind::F64,
            Self::I32(_) => ScalarKind::I32,
            Self::I64(_) => ScalarKind::I64,
            Self::U32(_) => ScalarKind::U32,
            Self::U8(_) => ScalarKind::U8,
        }
    }

    /// Number of lanes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::U8(v) => v.len(),
        }
    }

    /// Check if the value has no lanes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the lanes as `T`, if the kinds match.
    #[must_use]
    pub fn as_slice<T: Scalar>(&self) -> Option<&[T]> {
        T::lanes(self)
    }

    /// Raw bytes of the lanes in native byte order.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::F32(v) => bytemuck::cast_slice(v),
            Self::F64(v) => bytemuck::cast_slice(v),
            Self::I32(v) => bytemuck::cast_slice(v),
            Self::I64(v) => bytemuck::cast_slice(v),
            Self::U32(v) => bytemuck::cast_slice(v),
            Self::U8(v) => v.as_slice(),
        }
    }

    /// Rebuild a value of `kind` from raw bytes.
    pub(crate) fn from_bytes(kind: ScalarKind, bytes: &[u8]) -> Self {
        match kind {
            ScalarKind::F32 => Self::F32(collect_lanes(bytes)),
            ScalarKind::F64 => Self::F64(collect_lanes(bytes)),
            ScalarKind::I32 => Self::I32(collect_lanes(bytes)),
            ScalarKind::I64 => Self::I64(collect_lanes(bytes)),
            ScalarKind::U32 => Self::U32(collect_lanes(bytes)),
            ScalarKind::U8 => Self::U8(SmallVec::from_slice(bytes)),
        }
    }
}

// Copies, so `bytes` need not be aligned for `T`.
fn collect_lanes<T: Scalar>(bytes: &[u8]) -> Lanes<T> {
    SmallVec::from_vec(bytemuck::pod_collect_to_vec(bytes))
}

macro_rules! lane_ops {
    (float) => {
        fn lane_add(self, rhs: Self) -> Self {
            self + rhs
        }

        fn lane_sub(self, rhs: Self) -> Self {
            self - rhs
        }

        fn lane_mul(self, rhs: Self) -> Self {
            self * rhs
        }

        fn lane_div(self, rhs: Self) -> Self {
            self / rhs
        }

        fn lane_floor_div(self, rhs: Self) -> Self {
            (self / rhs).floor()
        }
    };
    (signed) => {
        fn lane_add(self, rhs: Self) -> Self {
            self.wrapping_add(rhs)
        }

        fn lane_sub(self, rhs: Self) -> Self {
            self.wrapping_sub(rhs)
        }

        fn lane_mul(self, rhs: Self) -> Self {
            self.wrapping_mul(rhs)
        }

        fn lane_div(self, rhs: Self) -> Self {
            if rhs == 0 { 0 } else { self.wrapping_div(rhs) }
        }

        fn lane_floor_div(self, rhs: Self) -> Self {
            if rhs == 0 {
                return 0;
            }
            let quotient = self.wrapping_div(rhs);
            // Truncation rounds toward zero; step down when the signs differ.
            if self.wrapping_rem(rhs) != 0 && (self < 0) != (rhs < 0) {
                quotient - 1
            } else {
                quotient
            }
        }
    };
    (unsigned) => {
        fn lane_add(self, rhs: Self) -> Self {
            self.wrapping_add(rhs)
        }

        fn lane_sub(self, rhs: Self) -> Self {
            self.wrapping_sub(rhs)
        }

        fn lane_mul(self, rhs: Self) -> Self {
            self.wrapping_mul(rhs)
        }

        fn lane_div(self, rhs: Self) -> Self {
            if rhs == 0 { 0 } else { self.wrapping_div(rhs) }
        }

        fn lane_floor_div(self, rhs: Self) -> Self {
            self.lane_div(rhs)
        }
    };
}

macro_rules! impl_scalar {
    ($($ty:ty => $variant:ident, $ops:ident);* $(;)?) => {
        $(
            impl Scalar for $ty {
                const KIND: ScalarKind = ScalarKind::$variant;

                fn into_value(lanes: Lanes<Self>) -> Value {
                    Value::$variant(lanes)
                }

                fn lanes(value: &Value) -> Option<&[Self]> {
                    match value {
                        Value::$variant(lanes) => Some(lanes.as_slice()),
                        _ => None,
                    }
                }

                lane_ops!($ops);
            }

            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(smallvec::smallvec![value])
                }
            }

            impl<const N: usize> From<[$ty; N]> for Value {
                fn from(value: [$ty; N]) -> Self {
                    Value::$variant(SmallVec::from_slice(&value))
                }
            }

            impl From<&[$ty]> for Value {
                fn from(value: &[$ty]) -> Self {
                    Value::$variant(SmallVec::from_slice(value))
                }
            }
        )*
    };
}

impl_scalar! {
    f32 => F32, float;
    f64 => F64, float;
    i32 => I32, signed;
    i64 => I64, signed;
    u32 => U32, unsigned;
    u8 => U8, unsigned;
}
