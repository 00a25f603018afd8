//! The element tree model: immutable descriptions of what should be rendered.

use crate::{
	component::{ComponentClass, FunctionComponent, HookResult},
	value::Props,
};
use core::{
	any::Any,
	cell::{Cell, RefCell},
	fmt::{self, Debug, Display, Formatter},
	future::Future,
};
use futures_util::{future::LocalBoxFuture, FutureExt};
use std::rc::Rc;

/// Identity token of an element among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
	Int(i64),
	Str(Rc<str>),
}

impl Display for Key {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Int(int) => Display::fmt(int, f),
			Self::Str(str) => Display::fmt(str, f),
		}
	}
}

impl From<i64> for Key {
	fn from(int: i64) -> Self {
		Self::Int(int)
	}
}
impl From<i32> for Key {
	fn from(int: i32) -> Self {
		Self::Int(int.into())
	}
}
impl From<&str> for Key {
	fn from(str: &str) -> Self {
		Self::Str(str.into())
	}
}
impl From<String> for Key {
	fn from(str: String) -> Self {
		Self::Str(str.into())
	}
}

/// Structural category of an [`Element`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
	Text,
	Empty,
	Comment,
	Node,
	Custom,
	Component,
	Fragment,
	Portal,
	Promise,
}

impl Kind {
	/// Kinds realized as exactly one host node.
	#[must_use]
	pub fn is_primitive(self) -> bool {
		matches!(self, Self::Text | Self::Empty | Self::Comment | Self::Node)
	}

	#[must_use]
	pub fn is_composite(self) -> bool {
		matches!(self, Self::Custom | Self::Component)
	}
}

/// Whether a render step runs and how props and state flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
	Host,
	Function,
	Class,
}

/// A foreign mount target for portals, holding a host handle of any type.
#[derive(Clone)]
pub struct PortalTarget(Rc<dyn Any>);

impl PortalTarget {
	pub fn new<T: 'static>(handle: T) -> Self {
		Self(Rc::new(handle))
	}

	#[must_use]
	pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
		self.0.downcast_ref()
	}
}

impl PartialEq for PortalTarget {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

thread_local! {
	static NEXT_TICKET: Cell<u64> = Cell::new(1);
}

pub(crate) fn next_ticket() -> u64 {
	NEXT_TICKET.with(|next| {
		let ticket = next.get();
		next.set(ticket.wrapping_add(1));
		ticket
	})
}

/// The future behind a promise element.
///
/// The ticket identifies this particular future; a resolution only applies while the mounted element still waits on the same ticket.
#[derive(Clone)]
pub struct Suspense {
	ticket: u64,
	future: Rc<RefCell<Option<LocalBoxFuture<'static, HookResult<Element>>>>>,
}

impl Suspense {
	#[must_use]
	pub fn ticket(&self) -> u64 {
		self.ticket
	}

	/// Takes the future out. Only the first mount of a promise element drives it.
	pub(crate) fn take(&self) -> Option<LocalBoxFuture<'static, HookResult<Element>>> {
		self.future.borrow_mut().take()
	}
}

/// What an element renders as, and its identity across renders.
#[derive(Clone)]
pub enum ElementType {
	Text,
	Empty,
	Comment,
	Node(Rc<str>),
	Custom(FunctionComponent),
	Component(ComponentClass),
	Fragment,
	Portal(PortalTarget),
	Promise(Suspense),
}

impl ElementType {
	#[must_use]
	pub fn kind(&self) -> Kind {
		match self {
			Self::Text => Kind::Text,
			Self::Empty => Kind::Empty,
			Self::Comment => Kind::Comment,
			Self::Node(_) => Kind::Node,
			Self::Custom(_) => Kind::Custom,
			Self::Component(_) => Kind::Component,
			Self::Fragment => Kind::Fragment,
			Self::Portal(_) => Kind::Portal,
			Self::Promise(_) => Kind::Promise,
		}
	}

	#[must_use]
	pub fn group(&self) -> Group {
		match self {
			Self::Custom(_) => Group::Function,
			Self::Component(_) => Group::Class,
			_ => Group::Host,
		}
	}

	/// The host tag name, or a `#`-prefixed marker for other kinds.
	#[must_use]
	pub fn tag(&self) -> &str {
		match self {
			Self::Text => "#text",
			Self::Empty => "#empty",
			Self::Comment => "#comment",
			Self::Node(tag) => tag,
			Self::Custom(function) => function.name(),
			Self::Component(class) => class.name(),
			Self::Fragment => "#fragment",
			Self::Portal(_) => "#portal",
			Self::Promise(_) => "#promise",
		}
	}
}

impl PartialEq for ElementType {
	/// Promise types always compare equal; which future is awaited is tracked by ticket.
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Node(a), Self::Node(b)) => a == b,
			(Self::Custom(a), Self::Custom(b)) => a == b,
			(Self::Component(a), Self::Component(b)) => a == b,
			(Self::Portal(a), Self::Portal(b)) => a == b,
			(Self::Text, Self::Text)
			| (Self::Empty, Self::Empty)
			| (Self::Comment, Self::Comment)
			| (Self::Fragment, Self::Fragment)
			| (Self::Promise(_), Self::Promise(_)) => true,
			_ => false,
		}
	}
}

impl Debug for ElementType {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{:?}({})", self.kind(), self.tag())
	}
}

pub(crate) struct Inner {
	pub(crate) ty: ElementType,
	pub(crate) key: Option<Key>,
	pub(crate) props: Props,
	pub(crate) text: Option<Rc<str>>,
	pub(crate) children: Vec<Element>,
	pub(crate) keyed: bool,
}

/// One immutable node of an element tree.
///
/// Cloning is cheap. Clones share identity, which lets the reconciler skip subtrees that were handed back unchanged.
#[derive(Clone)]
pub struct Element(pub(crate) Rc<Inner>);

impl Element {
	pub(crate) fn from_inner(inner: Inner) -> Self {
		Self(Rc::new(inner))
	}

	fn leaf(ty: ElementType, text: Option<Rc<str>>) -> Self {
		Self::from_inner(Inner {
			ty,
			key: None,
			props: Props::new(),
			text,
			children: Vec::new(),
			keyed: false,
		})
	}

	#[must_use]
	pub fn text(content: impl Into<Rc<str>>) -> Self {
		Self::leaf(ElementType::Text, Some(content.into()))
	}

	#[must_use]
	pub fn empty() -> Self {
		Self::leaf(ElementType::Empty, None)
	}

	#[must_use]
	pub fn comment(content: impl Into<Rc<str>>) -> Self {
		Self::leaf(ElementType::Comment, Some(content.into()))
	}

	/// A placeholder that renders `placeholder` until `future` resolves, then renders its output in place.
	pub fn promise(future: impl Future<Output = HookResult<Element>> + 'static, placeholder: Vec<Element>) -> Self {
		let keyed = crate::construct::detect_keyed(&placeholder);
		Self::from_inner(Inner {
			ty: ElementType::Promise(Suspense {
				ticket: next_ticket(),
				future: Rc::new(RefCell::new(Some(future.boxed_local()))),
			}),
			key: None,
			props: Props::new(),
			text: None,
			children: placeholder,
			keyed,
		})
	}

	/// Returns a copy of this element with `key` set.
	#[must_use]
	pub fn with_key(&self, key: impl Into<Key>) -> Self {
		Self::from_inner(Inner {
			ty: self.0.ty.clone(),
			key: Some(key.into()),
			props: self.0.props.clone(),
			text: self.0.text.clone(),
			children: self.0.children.clone(),
			keyed: self.0.keyed,
		})
	}

	#[must_use]
	pub fn ty(&self) -> &ElementType {
		&self.0.ty
	}

	#[must_use]
	pub fn kind(&self) -> Kind {
		self.0.ty.kind()
	}

	#[must_use]
	pub fn group(&self) -> Group {
		self.0.ty.group()
	}

	#[must_use]
	pub fn tag(&self) -> &str {
		self.0.ty.tag()
	}

	#[must_use]
	pub fn key(&self) -> Option<&Key> {
		self.0.key.as_ref()
	}

	#[must_use]
	pub fn props(&self) -> &Props {
		&self.0.props
	}

	/// Content of text and comment elements.
	#[must_use]
	pub fn content(&self) -> Option<&str> {
		self.0.text.as_deref()
	}

	#[must_use]
	pub fn children(&self) -> &[Element] {
		&self.0.children
	}

	/// Whether the child list is diffed by key.
	#[must_use]
	pub fn is_keyed(&self) -> bool {
		self.0.keyed
	}

	/// Whether both handles describe the very same element.
	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl Debug for Element {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let mut debug = f.debug_struct("Element");
		debug.field("type", &self.0.ty);
		if let Some(key) = &self.0.key {
			debug.field("key", key);
		}
		if !self.0.props.is_empty() {
			debug.field("props", &self.0.props);
		}
		if cfg!(feature = "dangerous-logging") {
			if let Some(text) = &self.0.text {
				debug.field("text", text);
			}
		}
		if !self.0.children.is_empty() {
			debug.field("children", &self.0.children);
		}
		debug.finish()
	}
}
