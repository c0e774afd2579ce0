//! Serializable descriptions of operators and their attributes.
use crate::op::OpError;
use std::collections::BTreeMap;

/// Suffix appended to a variable name to name its gradient.
pub const GRAD_SUFFIX: &str = "@GRAD";

/// Name of the gradient variable of `var`.
#[inline]
pub fn grad_var_name(var: &str) -> String {
    format!("{}{}", var, GRAD_SUFFIX)
}

/// A statically known operator attribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Attribute {
    Int(i32),
    Ints(Vec<i32>),
    Bool(bool),
    Float(f32),
    String(String),
}

impl Attribute {
    pub fn type_name(&self) -> &'static str {
        match self {
            Attribute::Int(_) => "int",
            Attribute::Ints(_) => "int list",
            Attribute::Bool(_) => "bool",
            Attribute::Float(_) => "float",
            Attribute::String(_) => "string",
        }
    }
}

impl From<i32> for Attribute {
    fn from(a: i32) -> Self {
        Attribute::Int(a)
    }
}

impl From<Vec<i32>> for Attribute {
    fn from(a: Vec<i32>) -> Self {
        Attribute::Ints(a)
    }
}

impl From<&[i32]> for Attribute {
    fn from(a: &[i32]) -> Self {
        Attribute::Ints(a.to_vec())
    }
}

impl From<bool> for Attribute {
    fn from(a: bool) -> Self {
        Attribute::Bool(a)
    }
}

impl From<f32> for Attribute {
    fn from(a: f32) -> Self {
        Attribute::Float(a)
    }
}

impl From<&str> for Attribute {
    fn from(a: &str) -> Self {
        Attribute::String(a.to_string())
    }
}

/// Attributes of one op, ordered by name.
pub type AttributeMap = BTreeMap<String, Attribute>;

/// Typed accessors over [AttributeMap].
pub trait AttrsExt {
    fn ints(&self, name: &str) -> Result<&[i32], OpError>;
}

impl AttrsExt for AttributeMap {
    fn ints(&self, name: &str) -> Result<&[i32], OpError> {
        match self.get(name) {
            Some(Attribute::Ints(v)) => Ok(v.as_slice()),
            Some(other) => Err(OpError::InvalidArgument(format!(
                "attribute `{}` must be an int list, but received {}",
                name,
                other.type_name()
            ))),
            None => Err(OpError::AttributeNotFound(name.to_string())),
        }
    }
}

/// Description of one op node: its type, named argument lists and attributes.
///
/// Setters return `&mut Self` so a description can be filled fluently:
///
/// ```
/// use reverse_op::OpDesc;
///
/// let mut op = OpDesc::default();
/// op.set_type("reverse")
///     .set_input("X", vec!["x".to_string()])
///     .set_output("Out", vec!["y".to_string()])
///     .set_attr("axis", vec![0, -1]);
/// assert_eq!(op.input("X"), &["x".to_string()]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OpDesc {
    #[serde(rename = "type")]
    op_type: String,
    inputs: BTreeMap<String, Vec<String>>,
    outputs: BTreeMap<String, Vec<String>>,
    attrs: AttributeMap,
}

impl OpDesc {
    pub fn new(op_type: impl Into<String>) -> Self {
        OpDesc {
            op_type: op_type.into(),
            ..Default::default()
        }
    }

    #[inline]
    pub fn op_type(&self) -> &str {
        &self.op_type
    }

    pub fn set_type(&mut self, op_type: impl Into<String>) -> &mut Self {
        self.op_type = op_type.into();
        self
    }

    pub fn set_input(&mut self, name: impl Into<String>, args: Vec<String>) -> &mut Self {
        self.inputs.insert(name.into(), args);
        self
    }

    pub fn set_output(&mut self, name: impl Into<String>, args: Vec<String>) -> &mut Self {
        self.outputs.insert(name.into(), args);
        self
    }

    pub fn set_attr(&mut self, name: impl Into<String>, attr: impl Into<Attribute>) -> &mut Self {
        self.attrs.insert(name.into(), attr.into());
        self
    }

    /// Arguments bound to input `name`; empty if unbound.
    #[inline]
    pub fn input(&self, name: &str) -> &[String] {
        self.inputs.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Arguments bound to output `name`; empty if unbound.
    #[inline]
    pub fn output(&self, name: &str) -> &[String] {
        self.outputs.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    #[inline]
    pub fn inputs(&self) -> &BTreeMap<String, Vec<String>> {
        &self.inputs
    }

    #[inline]
    pub fn outputs(&self) -> &BTreeMap<String, Vec<String>> {
        &self.outputs
    }

    #[inline]
    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attrs.get(name)
    }

    #[inline]
    pub fn attrs(&self) -> &AttributeMap {
        &self.attrs
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
