//! Building element trees from author input.

use crate::{
	component::{ComponentClass, FunctionComponent},
	element::{Element, ElementType, Inner, Key, Kind, PortalTarget},
	error::{report, Error},
	value::{Props, Value},
};
use hashbrown::HashSet;
use std::rc::Rc;
use tracing::warn;

/// Anything that can appear in a child list.
#[derive(Clone)]
pub enum Child {
	/// Renders as nothing.
	Null,
	Text(Rc<str>),
	Element(Element),
	/// Flattened into the surrounding list.
	List(Vec<Child>),
	/// Elevated into an element of that component.
	Function(FunctionComponent),
	/// Plain data, shown as formatted JSON.
	Data(Value),
}

macro_rules! child_from_display {
	($($ty:ty),*$(,)?) => {$(
		impl From<$ty> for Child {
			fn from(value: $ty) -> Self {
				Self::Text(value.to_string().into())
			}
		}
	)*};
}

child_from_display!(i32, i64, u32, u64, usize, f64, char);

impl From<&str> for Child {
	fn from(text: &str) -> Self {
		Self::Text(text.into())
	}
}
impl From<String> for Child {
	fn from(text: String) -> Self {
		Self::Text(text.into())
	}
}
impl From<Rc<str>> for Child {
	fn from(text: Rc<str>) -> Self {
		Self::Text(text)
	}
}
impl From<bool> for Child {
	/// Booleans render as nothing, which keeps `condition && element` style code simple.
	fn from(_: bool) -> Self {
		Self::Null
	}
}
impl From<()> for Child {
	fn from((): ()) -> Self {
		Self::Null
	}
}
impl From<Element> for Child {
	fn from(element: Element) -> Self {
		Self::Element(element)
	}
}
impl From<&Element> for Child {
	fn from(element: &Element) -> Self {
		Self::Element(element.clone())
	}
}
impl From<FunctionComponent> for Child {
	fn from(function: FunctionComponent) -> Self {
		Self::Function(function)
	}
}
impl From<Props> for Child {
	fn from(props: Props) -> Self {
		Self::Data(Value::Map(props))
	}
}
impl From<Value> for Child {
	fn from(value: Value) -> Self {
		match value {
			Value::Null | Value::Bool(_) | Value::Handler(_) | Value::Ref(_) => Self::Null,
			Value::Str(text) => Self::Text(text),
			Value::Int(int) => int.into(),
			Value::Float(float) => float.into(),
			Value::Elements(elements) => Self::List(elements.into_iter().map(Self::Element).collect()),
			data @ (Value::List(_) | Value::Map(_)) => Self::Data(data),
		}
	}
}
impl<T: Into<Child>> From<Option<T>> for Child {
	fn from(child: Option<T>) -> Self {
		child.map_or(Self::Null, Into::into)
	}
}
impl<T: Into<Child>> From<Vec<T>> for Child {
	fn from(children: Vec<T>) -> Self {
		Self::List(children.into_iter().map(Into::into).collect())
	}
}

/// Collects heterogeneous children into a `Vec<Child>`.
#[macro_export]
macro_rules! children {
	($($child:expr),*$(,)?) => {
		vec![$($crate::construct::Child::from($child)),*]
	};
}

/// The `type` argument of [`create_element`].
#[derive(Clone)]
pub enum Type {
	Tag(Rc<str>),
	Function(FunctionComponent),
	Class(ComponentClass),
	/// Clone of an existing element with props merged in.
	Element(Element),
	Fragment,
	Portal(PortalTarget),
}

impl From<&str> for Type {
	fn from(tag: &str) -> Self {
		Self::Tag(tag.into())
	}
}
impl From<String> for Type {
	fn from(tag: String) -> Self {
		Self::Tag(tag.into())
	}
}
impl From<FunctionComponent> for Type {
	fn from(function: FunctionComponent) -> Self {
		Self::Function(function)
	}
}
impl From<ComponentClass> for Type {
	fn from(class: ComponentClass) -> Self {
		Self::Class(class)
	}
}
impl From<Element> for Type {
	fn from(element: Element) -> Self {
		Self::Element(element)
	}
}
impl From<&Element> for Type {
	fn from(element: &Element) -> Self {
		Self::Element(element.clone())
	}
}
impl From<PortalTarget> for Type {
	fn from(target: PortalTarget) -> Self {
		Self::Portal(target)
	}
}

fn key_of(props: &Props) -> Option<Key> {
	match props.get("key")? {
		Value::Int(int) => Some(Key::Int(*int)),
		Value::Str(str) => Some(Key::Str(str.clone())),
		Value::Float(float) => Some(Key::Str(float.to_string().into())),
		_ => None,
	}
}

/// Creates an element.
///
/// Host tags and fragments keep their children. Components receive them as the `children` prop instead.
/// A `key` prop becomes the element's key. An empty tag name is reported and yields an empty element.
pub fn create_element(ty: impl Into<Type>, props: impl Into<Option<Props>>, children: Vec<Child>) -> Element {
	let mut props = props.into().unwrap_or_default();
	let key = key_of(&props);
	props.remove("key");

	let ty = match ty.into() {
		Type::Tag(tag) if tag.trim().is_empty() => {
			report("#construction".into(), "create_element".into(), Error::Construction("empty tag name".to_owned()));
			return Element::empty();
		}
		Type::Tag(tag) => ElementType::Node(tag),
		Type::Fragment => ElementType::Fragment,
		Type::Portal(target) => ElementType::Portal(target),
		Type::Function(function) => return composite(ElementType::Custom(function), key, props, children),
		Type::Class(class) => return composite(ElementType::Component(class), key, props, children),
		Type::Element(element) => return clone_element(&element, key, props, children),
	};

	let mut children = normalize(children);
	if children.is_empty() && ty == ElementType::Fragment {
		children.push(Element::empty());
	}
	let keyed = detect_keyed(&children);
	Element::from_inner(Inner {
		ty,
		key,
		props,
		text: None,
		children,
		keyed,
	})
}

/// Short alias of [`create_element`].
pub fn h(ty: impl Into<Type>, props: impl Into<Option<Props>>, children: Vec<Child>) -> Element {
	create_element(ty, props, children)
}

fn composite(ty: ElementType, key: Option<Key>, mut props: Props, children: Vec<Child>) -> Element {
	if !children.is_empty() {
		props.insert("children", normalize(children));
	}
	Element::from_inner(Inner {
		ty,
		key,
		props,
		text: None,
		children: Vec::new(),
		keyed: false,
	})
}

fn clone_element(element: &Element, key: Option<Key>, props: Props, children: Vec<Child>) -> Element {
	let mut merged = element.props().clone();
	merged.merge(&props);
	let key = key.or_else(|| element.key().cloned());

	if element.kind().is_composite() {
		if !children.is_empty() {
			merged.insert("children", normalize(children));
		}
		return Element::from_inner(Inner {
			ty: element.ty().clone(),
			key,
			props: merged,
			text: None,
			children: Vec::new(),
			keyed: false,
		});
	}

	let (children, keyed) = if children.is_empty() {
		(element.children().to_vec(), element.is_keyed())
	} else {
		let children = normalize(children);
		let keyed = detect_keyed(&children);
		(children, keyed)
	};
	Element::from_inner(Inner {
		ty: element.ty().clone(),
		key,
		props: merged,
		text: element.0.text.clone(),
		children,
		keyed,
	})
}

/// Flattens `children` depth-first into elements.
pub fn normalize(children: Vec<Child>) -> Vec<Element> {
	let mut elements = Vec::with_capacity(children.len());
	for child in children {
		push(&mut elements, child);
	}
	elements
}

fn push(elements: &mut Vec<Element>, child: Child) {
	match child {
		Child::Null => elements.push(Element::empty()),
		Child::Text(text) => elements.push(Element::text(text)),
		Child::Element(element) => elements.push(element),
		Child::List(children) => {
			for child in children {
				push(elements, child);
			}
		}
		Child::Function(function) => elements.push(create_element(function, None, Vec::new())),
		Child::Data(data) => elements.push(stringify(&data)),
	}
}

/// Shows plain data as a `pre` node of formatted JSON.
fn stringify(data: &Value) -> Element {
	let json = serde_json::to_string_pretty(&data.to_json()).unwrap_or_else(|error| {
		report("#construction".into(), "stringify".into(), Error::Construction(error.to_string()));
		String::new()
	});
	create_element("pre", None, vec![Child::Text(json.into())])
}

/// Turns rendered output into exactly one element. Lists become fragments.
pub(crate) fn shape(child: Child) -> Element {
	match child {
		Child::Element(element) => element,
		Child::Null => Element::empty(),
		Child::Text(text) => Element::text(text),
		Child::Function(function) => create_element(function, None, Vec::new()),
		Child::Data(data) => stringify(&data),
		Child::List(children) => fragment(children),
	}
}

/// A child list is keyed once any element child has a key.
pub(crate) fn detect_keyed(children: &[Element]) -> bool {
	let keyed = children.iter().any(|child| !matches!(child.kind(), Kind::Text | Kind::Empty) && child.key().is_some());
	if keyed {
		let mut seen = HashSet::new();
		for key in children.iter().filter_map(Element::key) {
			if !seen.insert(key) {
				warn!("Duplicate key {} in child list. The list will be diffed by position.", key);
			}
		}
	}
	keyed
}

/// Children without a wrapping host node. Empty fragments hold one empty element.
pub fn fragment(children: Vec<Child>) -> Element {
	create_element(Type::Fragment, None, children)
}

/// Children mounted into `target` instead of the surrounding host node.
pub fn portal<T: 'static>(target: T, children: Vec<Child>) -> Element {
	create_element(PortalTarget::new(target), None, children)
}

pub fn text(content: impl Into<Rc<str>>) -> Element {
	Element::text(content)
}

pub fn comment(content: impl Into<Rc<str>>) -> Element {
	Element::comment(content)
}
