use crate::dtype::DataType;
use crate::op_desc::OpDesc;
use crate::tensor::VarKind;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::error::Error;
use std::fs::File;
use std::path::Path;
use uuid::Uuid;

/// Build-time metadata of a graph variable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VarDesc {
    name: String,
    kind: VarKind,
    dtype: Option<DataType>,
    /// `-1` marks an extent unknown until run time.
    dims: Vec<i64>,
}

impl VarDesc {
    /// A variable of `kind` with unknown dtype and no dims.
    ///
    /// No dims means rank 0: shape inference treats it as a scalar until
    /// [VarDesc::set_dims] gives it a shape.
    pub fn new(name: impl Into<String>, kind: VarKind) -> Self {
        VarDesc {
            name: name.into(),
            kind,
            dtype: None,
            dims: Vec::new(),
        }
    }

    pub fn tensor(name: impl Into<String>, dtype: DataType, dims: &[i64]) -> Self {
        VarDesc {
            name: name.into(),
            kind: VarKind::Tensor,
            dtype: Some(dtype),
            dims: dims.to_vec(),
        }
    }

    pub fn tensor_list(name: impl Into<String>, dtype: DataType, dims: &[i64]) -> Self {
        VarDesc {
            name: name.into(),
            kind: VarKind::TensorList,
            dtype: Some(dtype),
            dims: dims.to_vec(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> VarKind {
        self.kind
    }

    #[inline]
    pub fn dtype(&self) -> Option<DataType> {
        self.dtype
    }

    #[inline]
    pub fn dims(&self) -> &[i64] {
        &self.dims
    }

    #[inline]
    pub fn set_kind(&mut self, kind: VarKind) {
        self.kind = kind;
    }

    #[inline]
    pub fn set_dtype(&mut self, dtype: Option<DataType>) {
        self.dtype = dtype;
    }

    #[inline]
    pub fn set_dims(&mut self, dims: &[i64]) {
        self.dims = dims.to_vec();
    }

    /// Same metadata under another name.
    pub(crate) fn renamed(&self, name: impl Into<String>) -> Self {
        VarDesc {
            name: name.into(),
            ..self.clone()
        }
    }
}

/// An ordered list of ops plus the metadata of the variables they touch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockDesc {
    vars: BTreeMap<String, VarDesc>,
    ops: Vec<OpDesc>,
}

impl BlockDesc {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn var(&self, name: &str) -> Option<&VarDesc> {
        self.vars.get(name)
    }

    #[inline]
    pub fn var_mut(&mut self, name: &str) -> Option<&mut VarDesc> {
        self.vars.get_mut(name)
    }

    #[inline]
    pub fn has_var(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Adds `var`, replacing any variable of the same name.
    pub fn add_var(&mut self, var: VarDesc) -> &mut VarDesc {
        match self.vars.entry(var.name.clone()) {
            Entry::Occupied(mut e) => {
                e.insert(var);
                e.into_mut()
            }
            Entry::Vacant(e) => e.insert(var),
        }
    }

    pub fn remove_var(&mut self, name: &str) -> Option<VarDesc> {
        self.vars.remove(name)
    }

    /// Declares a fresh tensor variable named after `prefix` and returns its name.
    pub fn create_temp_var(&mut self, prefix: &str) -> String {
        let name = format!("{}.tmp_{}", prefix, Uuid::new_v4().simple());
        self.add_var(VarDesc::new(name.clone(), VarKind::Tensor));
        name
    }

    pub fn vars(&self) -> impl Iterator<Item = &VarDesc> {
        self.vars.values()
    }

    /// Appends `op` and returns its index.
    pub fn append_op(&mut self, op: OpDesc) -> usize {
        self.ops.push(op);
        self.ops.len() - 1
    }

    pub(crate) fn pop_op(&mut self) -> Option<OpDesc> {
        self.ops.pop()
    }

    #[inline]
    pub fn op(&self, i: usize) -> Option<&OpDesc> {
        self.ops.get(i)
    }

    #[inline]
    pub fn ops(&self) -> &[OpDesc] {
        &self.ops
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Saves this block to storage as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let f = File::create(path.as_ref())?;
        serde_json::to_writer(f, self)?;
        Ok(())
    }

    /// Loads a block previously written by [BlockDesc::save].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let f = File::open(path.as_ref())?;
        let ret = serde_json::from_reader(f)?;
        Ok(ret)
    }
}
