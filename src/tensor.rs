//! Runtime values flowing through a graph: dense tensors and tensor lists.
use crate::dtype::{DataType, Element};
use crate::ndarray_ext::{NdArray, NdArrayView};
use ndarray::{Array, Dimension};
use std::fmt;

/// Level-of-detail metadata: per-level row offsets attached to a tensor.
///
/// Opaque to every op in this crate; it travels with the data unchanged.
pub type Lod = Vec<Vec<usize>>;

/// Type-erased dense storage, one variant per [DataType].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TensorData {
    Bool(NdArray<bool>),
    Int32(NdArray<i32>),
    Int64(NdArray<i64>),
    UInt8(NdArray<u8>),
    Float32(NdArray<f32>),
    Float64(NdArray<f64>),
}

// Evaluates `$body` with `$arr` bound to the typed array inside `$data`.
macro_rules! with_data {
    ($data:expr, $arr:ident => $body:expr) => {
        match $data {
            TensorData::Bool($arr) => $body,
            TensorData::Int32($arr) => $body,
            TensorData::Int64($arr) => $body,
            TensorData::UInt8($arr) => $body,
            TensorData::Float32($arr) => $body,
            TensorData::Float64($arr) => $body,
        }
    };
}

impl TensorData {
    #[inline]
    pub fn dtype(&self) -> DataType {
        match self {
            TensorData::Bool(_) => DataType::Bool,
            TensorData::Int32(_) => DataType::Int32,
            TensorData::Int64(_) => DataType::Int64,
            TensorData::UInt8(_) => DataType::UInt8,
            TensorData::Float32(_) => DataType::Float32,
            TensorData::Float64(_) => DataType::Float64,
        }
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        with_data!(self, arr => arr.shape())
    }

    #[inline]
    pub fn len(&self) -> usize {
        with_data!(self, arr => arr.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A dense tensor: optional storage plus level-of-detail metadata.
///
/// `Tensor::default()` holds no memory; such a tensor has a known kind but
/// neither dtype nor shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    data: Option<TensorData>,
    lod: Lod,
}

impl Tensor {
    /// Creates a tensor which holds no memory.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an ndarray of any dimensionality.
    pub fn from_array<T: Element, D: Dimension>(arr: Array<T, D>) -> Self {
        Tensor {
            data: Some(T::into_data(arr.into_dyn())),
            lod: Lod::new(),
        }
    }

    #[inline]
    pub fn from_data(data: TensorData) -> Self {
        Tensor {
            data: Some(data),
            lod: Lod::new(),
        }
    }

    /// Attaches level-of-detail metadata.
    #[inline]
    pub fn with_lod(mut self, lod: Lod) -> Self {
        self.lod = lod;
        self
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.data.is_some()
    }

    #[inline]
    pub fn data(&self) -> Option<&TensorData> {
        self.data.as_ref()
    }

    #[inline]
    pub fn dtype(&self) -> Option<DataType> {
        self.data.as_ref().map(|d| d.dtype())
    }

    /// Shape of the storage, or `None` if the tensor holds no memory.
    #[inline]
    pub fn shape(&self) -> Option<&[usize]> {
        self.data.as_ref().map(|d| d.shape())
    }

    /// Shape as signed dims, the representation shape inference works with.
    pub fn dims(&self) -> Option<Vec<i64>> {
        self.shape()
            .map(|s| s.iter().map(|&d| d as i64).collect())
    }

    #[inline]
    pub fn numel(&self) -> usize {
        self.data.as_ref().map(|d| d.len()).unwrap_or(0)
    }

    #[inline]
    pub fn lod(&self) -> &Lod {
        &self.lod
    }

    #[inline]
    pub fn set_lod(&mut self, lod: Lod) {
        self.lod = lod;
    }

    /// Typed read-only view; `None` on dtype mismatch or missing storage.
    #[inline]
    pub fn view<T: Element>(&self) -> Option<NdArrayView<'_, T>> {
        self.data.as_ref().and_then(T::data_ref).map(|a| a.view())
    }

    #[inline]
    pub fn to_array<T: Element>(&self) -> Option<NdArray<T>> {
        self.view::<T>().map(|v| v.to_owned())
    }
}

impl<T: Element, D: Dimension> From<Array<T, D>> for Tensor {
    fn from(arr: Array<T, D>) -> Self {
        Tensor::from_array(arr)
    }
}

/// An ordered sequence of independent tensors treated as a single value.
pub type TensorList = Vec<Tensor>;

/// Container kind of a graph variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarKind {
    Tensor,
    TensorList,
}

impl fmt::Display for VarKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VarKind::Tensor => write!(f, "Tensor"),
            VarKind::TensorList => write!(f, "TensorList"),
        }
    }
}

/// A runtime value bound to a graph variable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Tensor(Tensor),
    TensorList(TensorList),
}

impl Value {
    #[inline]
    pub fn kind(&self) -> VarKind {
        match self {
            Value::Tensor(_) => VarKind::Tensor,
            Value::TensorList(_) => VarKind::TensorList,
        }
    }

    #[inline]
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Value::Tensor(t) => Some(t),
            Value::TensorList(_) => None,
        }
    }

    #[inline]
    pub fn as_tensor_list(&self) -> Option<&TensorList> {
        match self {
            Value::TensorList(l) => Some(l),
            Value::Tensor(_) => None,
        }
    }

    /// Element type of the value.
    ///
    /// For a list this is the dtype of its first element holding memory.
    pub fn dtype(&self) -> Option<DataType> {
        match self {
            Value::Tensor(t) => t.dtype(),
            Value::TensorList(l) => l.iter().find_map(|t| t.dtype()),
        }
    }
}

impl From<Tensor> for Value {
    fn from(t: Tensor) -> Self {
        Value::Tensor(t)
    }
}

impl From<TensorList> for Value {
    fn from(l: TensorList) -> Self {
        Value::TensorList(l)
    }
}
