//! Element types a tensor can carry.
use crate::ndarray_ext::NdArray;
use crate::tensor::TensorData;
use num_traits::AsPrimitive;
use std::fmt;

/// Runtime tag of a tensor's element type.
///
/// Kernels are registered per `(device, DataType)` pair, so this is also the
/// dtype half of a [crate::KernelKey].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int32,
    Int64,
    UInt8,
    Float32,
    Float64,
}

impl DataType {
    /// Every supported dtype, in registration order.
    pub const ALL: [DataType; 6] = [
        DataType::Int32,
        DataType::UInt8,
        DataType::Int64,
        DataType::Bool,
        DataType::Float32,
        DataType::Float64,
    ];

    /// Size of one element in bytes.
    pub fn size_of(&self) -> usize {
        match self {
            DataType::Bool | DataType::UInt8 => 1,
            DataType::Int32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::Float64 => 8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::UInt8 => "uint8",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Rust scalar types that can be stored in a [crate::Tensor].
///
/// Connects a concrete element type to its [DataType] tag and to the matching
/// variant of the type-erased [TensorData].
pub trait Element:
    Copy + Default + Send + Sync + PartialEq + fmt::Debug + serde::Serialize + 'static
{
    const DTYPE: DataType;

    /// Deterministic value derived from a flat index; used by `array_gen`.
    fn from_index(i: usize) -> Self;

    fn into_data(arr: NdArray<Self>) -> TensorData;

    fn data_ref(data: &TensorData) -> Option<&NdArray<Self>>;
}

macro_rules! impl_numeric_element {
    ($t:ty, $dtype:ident) => {
        impl Element for $t {
            const DTYPE: DataType = DataType::$dtype;

            #[inline]
            fn from_index(i: usize) -> Self {
                <usize as AsPrimitive<$t>>::as_(i)
            }

            #[inline]
            fn into_data(arr: NdArray<Self>) -> TensorData {
                TensorData::$dtype(arr)
            }

            #[inline]
            fn data_ref(data: &TensorData) -> Option<&NdArray<Self>> {
                match data {
                    TensorData::$dtype(arr) => Some(arr),
                    _ => None,
                }
            }
        }
    };
}

impl_numeric_element!(i32, Int32);
impl_numeric_element!(i64, Int64);
impl_numeric_element!(u8, UInt8);
impl_numeric_element!(f32, Float32);
impl_numeric_element!(f64, Float64);

impl Element for bool {
    const DTYPE: DataType = DataType::Bool;

    #[inline]
    fn from_index(i: usize) -> Self {
        i % 2 == 1
    }

    #[inline]
    fn into_data(arr: NdArray<Self>) -> TensorData {
        TensorData::Bool(arr)
    }

    #[inline]
    fn data_ref(data: &TensorData) -> Option<&NdArray<Self>> {
        match data {
            TensorData::Bool(arr) => Some(arr),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_of() {
        assert_eq!(DataType::Bool.size_of(), 1);
        assert_eq!(DataType::UInt8.size_of(), 1);
        assert_eq!(DataType::Int32.size_of(), 4);
        assert_eq!(DataType::Float64.size_of(), 8);
    }

    #[test]
    fn test_element_tags() {
        assert_eq!(<u8 as Element>::DTYPE, DataType::UInt8);
        assert_eq!(<bool as Element>::DTYPE, DataType::Bool);
        assert_eq!(u8::from_index(257), 1);
        assert!(bool::from_index(3));
        assert_eq!(DataType::Float32.to_string(), "float32");
    }
}
