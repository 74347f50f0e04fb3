use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Stable identity of a live object. Zero is never handed out, so printed
/// sentinel entries can use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    pub id: usize,
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectId {
    pub fn new() -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(1);
        Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn as_usize(&self) -> usize {
        self.id
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// User-supplied `__repr__`. An `Err` is reported as an unrepresentable object.
pub type ReprHook = Arc<dyn Fn(&PyObject) -> Result<String, String> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct FrameInfo {
    pub filename: String,
    pub line: u32,
    pub back: Option<ObjectId>,
    pub locals: ObjectId,
    pub globals: ObjectId,
    pub builtins: ObjectId,
}

#[derive(Clone, Default)]
pub struct Instance {
    pub fields: Vec<ObjectId>,
    pub repr: Option<ReprHook>,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("fields", &self.fields)
            .field("repr", &self.repr.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum ObjectData {
    None,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<ObjectId>),
    Tuple(Vec<ObjectId>),
    Set(Vec<ObjectId>),
    Dict(Vec<(ObjectId, ObjectId)>),
    Frame(FrameInfo),
    Instance(Instance),
}

impl ObjectData {
    /// Default runtime type name for a payload.
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjectData::None => "NoneType",
            ObjectData::Bool(_) => "bool",
            ObjectData::Integer(_) => "int",
            ObjectData::Float(_) => "float",
            ObjectData::Str(_) => "str",
            ObjectData::Bytes(_) => "bytes",
            ObjectData::List(_) => "list",
            ObjectData::Tuple(_) => "tuple",
            ObjectData::Set(_) => "set",
            ObjectData::Dict(_) => "dict",
            ObjectData::Frame(_) => "frame",
            ObjectData::Instance(_) => "object",
        }
    }

    /// Objects directly held by this payload, in storage order.
    pub fn referents(&self) -> Vec<ObjectId> {
        match self {
            ObjectData::List(items) | ObjectData::Tuple(items) | ObjectData::Set(items) => {
                items.clone()
            }
            ObjectData::Dict(pairs) => pairs.iter().flat_map(|(k, v)| [*k, *v]).collect(),
            ObjectData::Frame(frame) => frame
                .back
                .into_iter()
                .chain([frame.locals, frame.globals, frame.builtins])
                .collect(),
            ObjectData::Instance(instance) => instance.fields.clone(),
            _ => Vec::new(),
        }
    }

    pub fn length(&self) -> Option<usize> {
        match self {
            ObjectData::Str(s) => Some(s.chars().count()),
            ObjectData::Bytes(b) => Some(b.len()),
            ObjectData::List(items) | ObjectData::Tuple(items) | ObjectData::Set(items) => {
                Some(items.len())
            }
            ObjectData::Dict(pairs) => Some(pairs.len()),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            ObjectData::List(_) | ObjectData::Tuple(_) | ObjectData::Set(_) | ObjectData::Dict(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct PyObject {
    pub id: ObjectId,
    pub type_name: String,
    pub data: ObjectData,
}

impl PyObject {
    pub fn new(data: ObjectData) -> Self {
        Self::with_type(data.type_name(), data)
    }

    pub fn with_type(type_name: impl Into<String>, data: ObjectData) -> Self {
        Self {
            id: ObjectId::new(),
            type_name: type_name.into(),
            data,
        }
    }

    pub fn none() -> Self {
        Self::new(ObjectData::None)
    }

    pub fn int(value: i64) -> Self {
        Self::new(ObjectData::Integer(value))
    }

    pub fn float(value: f64) -> Self {
        Self::new(ObjectData::Float(value))
    }

    pub fn str(value: impl Into<String>) -> Self {
        Self::new(ObjectData::Str(value.into()))
    }

    pub fn list(items: Vec<ObjectId>) -> Self {
        Self::new(ObjectData::List(items))
    }

    pub fn tuple(items: Vec<ObjectId>) -> Self {
        Self::new(ObjectData::Tuple(items))
    }

    pub fn set(items: Vec<ObjectId>) -> Self {
        Self::new(ObjectData::Set(items))
    }

    pub fn dict(pairs: Vec<(ObjectId, ObjectId)>) -> Self {
        Self::new(ObjectData::Dict(pairs))
    }

    pub fn instance(class: impl Into<String>, fields: Vec<ObjectId>) -> Self {
        Self::with_type(
            class,
            ObjectData::Instance(Instance {
                fields,
                repr: None,
            }),
        )
    }

    /// Instance whose repr is computed by `hook`.
    pub fn instance_with_repr<F>(class: impl Into<String>, fields: Vec<ObjectId>, hook: F) -> Self
    where
        F: Fn(&PyObject) -> Result<String, String> + Send + Sync + 'static,
    {
        Self::with_type(
            class,
            ObjectData::Instance(Instance {
                fields,
                repr: Some(Arc::new(hook)),
            }),
        )
    }

    pub fn referents(&self) -> Vec<ObjectId> {
        self.data.referents()
    }

    pub fn is_frame(&self) -> bool {
        matches!(self.data, ObjectData::Frame(_))
    }
}

impl Hash for PyObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialEq for PyObject {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PyObject {}
