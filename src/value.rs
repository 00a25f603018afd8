//! Property values and the ordered [`Props`] map shared by elements and component state.

use crate::{
	component::{EventHandler, RefTarget},
	element::Element,
};
use core::fmt::{self, Debug, Formatter};
use indexmap::IndexMap;
use std::rc::Rc;

/// Names with structural meaning that are never forwarded to the host as properties.
pub const RESERVED: [&str; 4] = ["key", "ref", "children", "xmlns"];

/// A single property value.
#[derive(Clone)]
pub enum Value {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(Rc<str>),
	List(Vec<Value>),
	Map(Props),
	/// An event handler, registered with the host when the property name starts with `on`.
	Handler(EventHandler),
	Ref(RefTarget),
	/// Normalized children passed to a composite element.
	Elements(Vec<Element>),
}

impl Value {
	#[must_use]
	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	#[must_use]
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Str(str) => Some(str),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_int(&self) -> Option<i64> {
		match *self {
			Self::Int(int) => Some(int),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_bool(&self) -> Option<bool> {
		match *self {
			Self::Bool(bool) => Some(bool),
			_ => None,
		}
	}

	/// Renders a value the way a host attribute would receive it.
	///
	/// Maps turn into `name: value;` declaration lists, which is what `style` expects.
	#[must_use]
	pub fn to_attribute(&self) -> Option<String> {
		match self {
			Self::Null | Self::Bool(false) | Self::Handler(_) | Self::Ref(_) | Self::Elements(_) => None,
			Self::Bool(true) => Some(String::new()),
			Self::Int(int) => Some(int.to_string()),
			Self::Float(float) => Some(float.to_string()),
			Self::Str(str) => Some(str.to_string()),
			Self::List(list) => Some(list.iter().filter_map(Self::to_attribute).collect::<Vec<_>>().join(" ")),
			Self::Map(map) => Some(
				map.iter()
					.filter_map(|(name, value)| value.to_attribute().map(|value| format!("{}: {};", name, value)))
					.collect::<Vec<_>>()
					.join(" "),
			),
		}
	}

	/// JSON view of this value, used to display plain data children.
	#[must_use]
	pub fn to_json(&self) -> serde_json::Value {
		use serde_json::Value as Json;
		match self {
			Self::Null => Json::Null,
			Self::Bool(bool) => Json::Bool(*bool),
			Self::Int(int) => Json::from(*int),
			Self::Float(float) => serde_json::Number::from_f64(*float).map_or(Json::Null, Json::Number),
			Self::Str(str) => Json::String(str.to_string()),
			Self::List(list) => Json::Array(list.iter().map(Self::to_json).collect()),
			Self::Map(map) => Json::Object(map.iter().map(|(name, value)| (name.to_string(), value.to_json())).collect()),
			Self::Handler(_) => Json::String("[handler]".to_owned()),
			Self::Ref(_) => Json::String("[ref]".to_owned()),
			Self::Elements(elements) => Json::String(format!("[{} element(s)]", elements.len())),
		}
	}
}

impl Default for Value {
	fn default() -> Self {
		Self::Null
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Null, Self::Null) => true,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			(Self::Int(a), Self::Int(b)) => a == b,
			#[allow(clippy::float_cmp)]
			(Self::Float(a), Self::Float(b)) => a == b,
			(Self::Str(a), Self::Str(b)) => a == b,
			(Self::List(a), Self::List(b)) => a == b,
			(Self::Map(a), Self::Map(b)) => a == b,
			(Self::Handler(a), Self::Handler(b)) => a == b,
			(Self::Ref(a), Self::Ref(b)) => a == b,
			(Self::Elements(a), Self::Elements(b)) => a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.ptr_eq(b)),
			_ => false,
		}
	}
}

impl Debug for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Null => f.write_str("Null"),
			Self::Bool(bool) => write!(f, "{:?}", bool),
			Self::Int(int) => write!(f, "{:?}", int),
			Self::Float(float) => write!(f, "{:?}", float),
			Self::Str(str) => write!(f, "{:?}", str),
			Self::List(list) => f.debug_list().entries(list).finish(),
			Self::Map(map) => map.fmt(f),
			Self::Handler(_) => f.write_str("Handler(..)"),
			Self::Ref(target) => target.fmt(f),
			Self::Elements(elements) => write!(f, "Elements({})", elements.len()),
		}
	}
}

macro_rules! value_from {
	($($ty:ty => |$v:ident| $e:expr),*$(,)?) => {$(
		impl From<$ty> for Value {
			fn from($v: $ty) -> Self {
				$e
			}
		}
	)*};
}

value_from! {
	bool => |v| Self::Bool(v),
	i32 => |v| Self::Int(v.into()),
	i64 => |v| Self::Int(v),
	u32 => |v| Self::Int(v.into()),
	f64 => |v| Self::Float(v),
	&str => |v| Self::Str(v.into()),
	String => |v| Self::Str(v.into()),
	Rc<str> => |v| Self::Str(v),
	Vec<Value> => |v| Self::List(v),
	Props => |v| Self::Map(v),
	EventHandler => |v| Self::Handler(v),
	RefTarget => |v| Self::Ref(v),
	Vec<Element> => |v| Self::Elements(v),
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Null, Into::into)
	}
}

/// An insertion-ordered property map.
///
/// Also used as component state, where [`merge`](`Props::merge`) is the shallow state merge.
#[derive(Clone, Default, PartialEq)]
pub struct Props(IndexMap<Rc<str>, Value>);

/// Component state shares the shape of props.
pub type State = Props;

impl Props {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, name: impl Into<Rc<str>>, value: impl Into<Value>) -> Option<Value> {
		self.0.insert(name.into(), value.into())
	}

	/// Builder form of [`insert`](`Props::insert`).
	#[must_use]
	pub fn with(mut self, name: impl Into<Rc<str>>, value: impl Into<Value>) -> Self {
		self.insert(name, value);
		self
	}

	/// Removes `name`, keeping the order of the remaining entries.
	pub fn remove(&mut self, name: &str) -> Option<Value> {
		self.0.shift_remove(name)
	}

	#[must_use]
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.0.get(name)
	}

	#[must_use]
	pub fn contains(&self, name: &str) -> bool {
		self.0.contains_key(name)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
		self.0.iter()
	}

	/// Shallow merge: entries of `other` overwrite existing ones.
	pub fn merge(&mut self, other: &Props) {
		for (name, value) in other.iter() {
			self.0.insert(name.clone(), value.clone());
		}
	}

	/// Fills in entries of `defaults` that are missing or `Null` here.
	pub fn merge_defaults(&mut self, defaults: &Props) {
		for (name, value) in defaults.iter() {
			match self.0.get(name.as_ref()) {
				Some(existing) if !existing.is_null() => (),
				_ => {
					self.0.insert(name.clone(), value.clone());
				}
			}
		}
	}

	/// The normalized children of a composite element, if any were passed.
	#[must_use]
	pub fn children(&self) -> &[Element] {
		match self.get("children") {
			Some(Value::Elements(children)) => children,
			_ => &[],
		}
	}

	/// Entries forwarded to the host, skipping [`RESERVED`] names.
	pub(crate) fn host_facing(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
		self.0.iter().filter(|(name, _)| !RESERVED.contains(&name.as_ref()))
	}
}

impl Debug for Props {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(self.0.iter()).finish()
	}
}

impl<N: Into<Rc<str>>, V: Into<Value>> FromIterator<(N, V)> for Props {
	fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
		Self(iter.into_iter().map(|(name, value)| (name.into(), value.into())).collect())
	}
}

/// Builds [`Props`] from `name => value` pairs, preserving their order.
///
/// ```
/// let props = cambium::props! { "id" => "greeting", "tabindex" => 1 };
/// assert_eq!(props.get("id").and_then(|id| id.as_str()), Some("greeting"));
/// ```
#[macro_export]
macro_rules! props {
	() => {
		$crate::value::Props::new()
	};
	($($name:expr => $value:expr),+ $(,)?) => {{
		let mut props = $crate::value::Props::new();
		$(props.insert($name, $value);)+
		props
	}};
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn merge_defaults_keeps_author_values() {
		let mut props = props! { "a" => 1, "b" => Value::Null };
		props.merge_defaults(&props! { "a" => 2, "b" => 3, "c" => 4 });
		assert_eq!(props, props! { "a" => 1, "b" => 3, "c" => 4 });
	}

	#[test]
	fn attributes() {
		assert_eq!(Value::from(true).to_attribute().as_deref(), Some(""));
		assert_eq!(Value::from(false).to_attribute(), None);
		assert_eq!(Value::from(vec![Value::from("a"), Value::from(2)]).to_attribute().as_deref(), Some("a 2"));
	}

	#[test]
	fn json() {
		let value = Value::Map(props! { "list" => vec![Value::from(1), Value::Null] });
		assert_eq!(value.to_json(), serde_json::json!({ "list": [1, null] }));
	}
}
