//! Bounded, never-failing text summaries of live objects.

use crate::error::ReprError;
use crate::introspect::GraphIntrospector;
use crate::object::{ObjectData, ObjectId, PyObject, ReprHook};
use log::warn;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Default output limit, and the element budget for container summaries.
pub const MAX_REPR_LEN: usize = 250;

pub const UNREPRESENTABLE: &str = "unrepresentable object: ";

/// Closed summarization dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReprKind {
    Container,
    Text,
    Frame,
    Other,
}

impl ReprKind {
    pub fn classify(obj: &PyObject) -> Self {
        if obj.data.is_container() {
            return ReprKind::Container;
        }
        match obj.data {
            ObjectData::Str(_) | ObjectData::Bytes(_) => ReprKind::Text,
            ObjectData::Frame(_) => ReprKind::Frame,
            _ => ReprKind::Other,
        }
    }
}

/// Summarizes `id`, truncated to `limit` chars plus `...`.
///
/// Any failure, including a panicking repr hook, yields
/// `"unrepresentable object: <failure>"`.
pub fn get_repr<G: GraphIntrospector + ?Sized>(graph: &G, id: ObjectId, limit: usize) -> String {
    let result = match graph.object(id) {
        Some(obj) => summarize(graph, obj),
        None => Err(ReprError::DanglingReference(id)),
    };

    let text = result.unwrap_or_else(|err| {
        warn!("object {id} is unrepresentable: {err}");
        format!("{UNREPRESENTABLE}{err}")
    });

    truncate(text, limit)
}

/// Untruncated summary, surfacing the failure instead of replacing it.
pub fn summarize<G: GraphIntrospector + ?Sized>(
    graph: &G,
    obj: &PyObject,
) -> Result<String, ReprError> {
    match ReprKind::classify(obj) {
        ReprKind::Container => repr_container(graph, obj),
        ReprKind::Text => repr_text(obj),
        ReprKind::Frame => Ok(repr_frame(obj)),
        ReprKind::Other => repr(obj),
    }
}

fn repr_container<G: GraphIntrospector + ?Sized>(
    graph: &G,
    obj: &PyObject,
) -> Result<String, ReprError> {
    let items = match &obj.data {
        ObjectData::Dict(pairs) => accumulate(pairs.iter().map(|(k, v)| {
            Ok(format!("{}: {}", safe_repr(graph, *k)?, safe_repr(graph, *v)?))
        }))?,
        ObjectData::List(items) | ObjectData::Tuple(items) | ObjectData::Set(items) => {
            accumulate(items.iter().map(|item| safe_repr(graph, *item)))?
        }
        _ => Vec::new(),
    };

    Ok(format!(
        "{} of len {}: {}",
        obj.type_name,
        obj.data.length().unwrap_or(0),
        items.join(", ")
    ))
}

/// Pulls items until their combined length exceeds the budget. The item
/// crossing the budget is kept; later items are never rendered.
fn accumulate<I>(items: I) -> Result<Vec<String>, ReprError>
where
    I: Iterator<Item = Result<String, ReprError>>,
{
    let mut parts = Vec::new();
    let mut total_len = 0;
    for item in items {
        let item = item?;
        total_len += item.chars().count();
        parts.push(item);
        if total_len > MAX_REPR_LEN {
            break;
        }
    }
    Ok(parts)
}

fn repr_text(obj: &PyObject) -> Result<String, ReprError> {
    let literal = match &obj.data {
        ObjectData::Str(s) => quote_str(s),
        ObjectData::Bytes(b) => quote_bytes(b),
        _ => return Err(ReprError::Raised(format!("{} is not text", obj.type_name))),
    };
    Ok(format!(
        "{} of len {}: {}",
        obj.type_name,
        obj.data.length().unwrap_or(0),
        literal
    ))
}

fn repr_frame(obj: &PyObject) -> String {
    match &obj.data {
        ObjectData::Frame(frame) => format!("frame from {} line {}", frame.filename, frame.line),
        _ => format!("<{} object>", obj.type_name),
    }
}

/// One-level element repr: nested containers collapse to their size.
fn safe_repr<G: GraphIntrospector + ?Sized>(graph: &G, id: ObjectId) -> Result<String, ReprError> {
    let obj = graph.object(id).ok_or(ReprError::DanglingReference(id))?;
    repr(obj)
}

/// Generic repr.
fn repr(obj: &PyObject) -> Result<String, ReprError> {
    let text = match &obj.data {
        ObjectData::None => "None".to_string(),
        ObjectData::Bool(true) => "True".to_string(),
        ObjectData::Bool(false) => "False".to_string(),
        ObjectData::Integer(n) => n.to_string(),
        ObjectData::Float(f) => float_repr(*f),
        ObjectData::Str(s) => quote_str(s),
        ObjectData::Bytes(b) => quote_bytes(b),
        ObjectData::List(_) | ObjectData::Tuple(_) | ObjectData::Set(_) | ObjectData::Dict(_) => {
            format!("<{} of len {}>", obj.type_name, obj.data.length().unwrap_or(0))
        }
        ObjectData::Frame(frame) => format!(
            "<frame at {:#x}, file '{}', line {}>",
            obj.id.as_usize(),
            frame.filename,
            frame.line
        ),
        ObjectData::Instance(instance) => match &instance.repr {
            Some(hook) => call_hook(hook, obj)?,
            None => format!("<{} object at {:#x}>", obj.type_name, obj.id.as_usize()),
        },
    };
    Ok(text)
}

fn call_hook(hook: &ReprHook, obj: &PyObject) -> Result<String, ReprError> {
    match panic::catch_unwind(AssertUnwindSafe(|| (**hook)(obj))) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(msg)) if msg.is_empty() => Err(ReprError::Raised(format!(
            "{}.__repr__ failed without a message",
            obj.type_name
        ))),
        Ok(Err(msg)) => Err(ReprError::Raised(msg)),
        Err(payload) => Err(ReprError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn float_repr(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        let text = if f > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

fn quote_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn quote_bytes(bytes: &[u8]) -> String {
    let quote = if bytes.contains(&b'\'') && !bytes.contains(&b'"') {
        b'"'
    } else {
        b'\''
    };
    let mut out = String::with_capacity(bytes.len() + 3);
    out.push('b');
    out.push(quote as char);
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b if b == quote => {
                out.push('\\');
                out.push(b as char);
            }
            0x20..=0x7e => out.push(b as char),
            b => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out.push(quote as char);
    out
}

fn truncate(text: String, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => {
            let mut short = text[..cut].to_string();
            short.push_str("...");
            short
        }
        None => text,
    }
}
