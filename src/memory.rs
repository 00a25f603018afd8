//! A host that keeps its nodes in memory and logs every operation.
//!
//! Useful for headless rendering and for asserting exactly which mutations the reconciler performs.

use crate::{
	error::HostError,
	host::{Host, Listener},
	value::Value,
};
use core::{any::Any, cell::RefCell, fmt::Write as _};
use indexmap::IndexMap;
use std::rc::Rc;
use tracing::{error, warn};

/// Index of a node in a [`MemoryHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryHandle(usize);

/// One logged host operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
	CreateNode(String),
	CreateText,
	CreateComment,
	SetProperty(String),
	RemoveProperty(String),
	SetText,
	/// `moved` is set if the child was attached somewhere before.
	Append { moved: bool },
	InsertBefore { moved: bool },
	Replace,
	Remove,
	RemoveChildren,
	AddListener(String),
	RemoveListener(String),
}

impl Op {
	/// Whether this operation changes what is displayed.
	#[must_use]
	pub fn is_mutation(&self) -> bool {
		!matches!(self, Self::AddListener(_) | Self::RemoveListener(_))
	}

	#[must_use]
	pub fn is_move(&self) -> bool {
		matches!(self, Self::Append { moved: true } | Self::InsertBefore { moved: true })
	}
}

#[derive(Debug)]
enum Data {
	Element {
		tag: String,
		namespace: Option<String>,
		properties: IndexMap<String, Value>,
	},
	Text(String),
	Comment(String),
}

#[derive(Debug)]
struct Slot {
	data: Data,
	parent: Option<usize>,
	children: Vec<usize>,
	listeners: Vec<(String, Listener)>,
	attached_once: bool,
}

#[derive(Debug, Default)]
struct Document {
	slots: Vec<Slot>,
	log: Vec<Op>,
	body: Option<usize>,
}

impl Document {
	fn create(&mut self, data: Data) -> MemoryHandle {
		self.slots.push(Slot {
			data,
			parent: None,
			children: Vec::new(),
			listeners: Vec::new(),
			attached_once: false,
		});
		MemoryHandle(self.slots.len() - 1)
	}

	fn detach(&mut self, child: usize) {
		if let Some(parent) = self.slots[child].parent.take() {
			self.slots[parent].children.retain(|&c| c != child);
		}
	}

	/// Attaches `child` to `parent` at `index`, returning whether it was attached before.
	fn attach(&mut self, parent: usize, child: usize, index: Option<usize>) -> bool {
		let moved = self.slots[child].attached_once;
		self.detach(child);
		let children = &mut self.slots[parent].children;
		match index {
			Some(index) => children.insert(index, child),
			None => children.push(child),
		}
		let slot = &mut self.slots[child];
		slot.parent = Some(parent);
		slot.attached_once = true;
		moved
	}

	fn contains(&self, handle: MemoryHandle) -> bool {
		handle.0 < self.slots.len()
	}
}

/// An in-memory [`Host`]. Clones share the same document.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost(Rc<RefCell<Document>>);

fn valid_tag(tag: &str) -> bool {
	let mut chars = tag.chars();
	matches!(chars.next(), Some(first) if first.is_ascii_alphabetic()) && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == ':' || c == '_')
}

impl MemoryHost {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// A detached element to render into.
	#[must_use]
	pub fn root(&self) -> MemoryHandle {
		self.0.borrow_mut().create(Data::Element {
			tag: "root".to_owned(),
			namespace: None,
			properties: IndexMap::new(),
		})
	}

	#[must_use]
	pub fn ops(&self) -> Vec<Op> {
		self.0.borrow().log.clone()
	}

	/// Returns and clears the operation log.
	pub fn take_ops(&self) -> Vec<Op> {
		core::mem::take(&mut self.0.borrow_mut().log)
	}

	/// Number of logged operations that change what is displayed.
	#[must_use]
	pub fn mutation_count(&self) -> usize {
		self.0.borrow().log.iter().filter(|op| op.is_mutation()).count()
	}

	#[must_use]
	pub fn children(&self, handle: MemoryHandle) -> Vec<MemoryHandle> {
		self.0.borrow().slots.get(handle.0).map_or_else(Vec::new, |slot| slot.children.iter().copied().map(MemoryHandle).collect())
	}

	#[must_use]
	pub fn parent(&self, handle: MemoryHandle) -> Option<MemoryHandle> {
		self.0.borrow().slots.get(handle.0)?.parent.map(MemoryHandle)
	}

	#[must_use]
	pub fn tag(&self, handle: MemoryHandle) -> Option<String> {
		match &self.0.borrow().slots.get(handle.0)?.data {
			Data::Element { tag, .. } => Some(tag.clone()),
			_ => None,
		}
	}

	#[must_use]
	pub fn namespace(&self, handle: MemoryHandle) -> Option<String> {
		match &self.0.borrow().slots.get(handle.0)?.data {
			Data::Element { namespace, .. } => namespace.clone(),
			_ => None,
		}
	}

	#[must_use]
	pub fn property(&self, handle: MemoryHandle, name: &str) -> Option<Value> {
		match &self.0.borrow().slots.get(handle.0)?.data {
			Data::Element { properties, .. } => properties.get(name).cloned(),
			_ => None,
		}
	}

	/// Text content of a text or comment node.
	#[must_use]
	pub fn text(&self, handle: MemoryHandle) -> Option<String> {
		match &self.0.borrow().slots.get(handle.0)?.data {
			Data::Text(text) | Data::Comment(text) => Some(text.clone()),
			Data::Element { .. } => None,
		}
	}

	#[must_use]
	pub fn listener_count(&self, handle: MemoryHandle) -> usize {
		self.0.borrow().slots.get(handle.0).map_or(0, |slot| slot.listeners.len())
	}

	/// Serializes the children of `handle`, which is what tests usually compare against.
	///
	/// Empty text nodes don't show up, comments do.
	#[must_use]
	pub fn inner_markup(&self, handle: MemoryHandle) -> String {
		let document = self.0.borrow();
		let mut markup = String::new();
		if let Some(slot) = document.slots.get(handle.0) {
			for &child in &slot.children {
				write_markup(&document, child, &mut markup);
			}
		}
		markup
	}

	/// Dispatches `event` to the listeners registered for `name` on `handle`.
	///
	/// Listeners are collected first, so handlers may freely cause re-renders.
	pub fn dispatch(&self, handle: MemoryHandle, name: &str, event: &dyn Any) {
		let listeners: Vec<Listener> = match self.0.borrow().slots.get(handle.0) {
			Some(slot) => slot.listeners.iter().filter(|(n, _)| n == name).map(|(_, listener)| listener.clone()).collect(),
			None => return warn!("Dispatching {:?} to unknown node {:?}", name, handle),
		};
		for listener in listeners {
			listener.dispatch(event);
		}
	}

	/// Builds pre-existing markup to hydrate: an element under `parent`.
	pub fn prebuild_element(&self, parent: MemoryHandle, tag: &str) -> MemoryHandle {
		let mut document = self.0.borrow_mut();
		let handle = document.create(Data::Element {
			tag: tag.to_owned(),
			namespace: None,
			properties: IndexMap::new(),
		});
		document.attach(parent.0, handle.0, None);
		handle
	}

	/// Builds pre-existing markup to hydrate: a text node under `parent`.
	pub fn prebuild_text(&self, parent: MemoryHandle, text: &str) -> MemoryHandle {
		let mut document = self.0.borrow_mut();
		let handle = document.create(Data::Text(text.to_owned()));
		document.attach(parent.0, handle.0, None);
		handle
	}
}

fn escape(text: &str, attribute: bool, markup: &mut String) {
	for c in text.chars() {
		match c {
			'&' => markup.push_str("&amp;"),
			'<' => markup.push_str("&lt;"),
			'>' => markup.push_str("&gt;"),
			'"' if attribute => markup.push_str("&quot;"),
			c => markup.push(c),
		}
	}
}

fn write_markup(document: &Document, index: usize, markup: &mut String) {
	let slot = &document.slots[index];
	match &slot.data {
		Data::Text(text) => escape(text, false, markup),
		Data::Comment(text) => {
			let _ = write!(markup, "<!--{}-->", text);
		}
		Data::Element { tag, properties, .. } => {
			markup.push('<');
			markup.push_str(tag);
			for (name, value) in properties {
				match value.to_attribute() {
					Some(value) if value.is_empty() => {
						let _ = write!(markup, " {}", name);
					}
					Some(value) => {
						let _ = write!(markup, " {}=\"", name);
						escape(&value, true, markup);
						markup.push('"');
					}
					None => (),
				}
			}
			markup.push('>');
			for &child in &slot.children {
				write_markup(document, child, markup);
			}
			let _ = write!(markup, "</{}>", tag);
		}
	}
}

impl Host for MemoryHost {
	type Handle = MemoryHandle;

	fn create_node(&mut self, tag: &str, namespace: Option<&str>) -> Result<MemoryHandle, HostError> {
		if !valid_tag(tag) {
			return Err(HostError::InvalidTag(tag.to_owned()));
		}
		let mut document = self.0.borrow_mut();
		document.log.push(Op::CreateNode(tag.to_owned()));
		Ok(document.create(Data::Element {
			tag: tag.to_owned(),
			namespace: namespace.map(ToOwned::to_owned),
			properties: IndexMap::new(),
		}))
	}

	fn create_text(&mut self, content: &str) -> MemoryHandle {
		let mut document = self.0.borrow_mut();
		document.log.push(Op::CreateText);
		document.create(Data::Text(content.to_owned()))
	}

	fn create_comment(&mut self, content: &str) -> MemoryHandle {
		let mut document = self.0.borrow_mut();
		document.log.push(Op::CreateComment);
		document.create(Data::Comment(content.to_owned()))
	}

	fn set_property(&mut self, handle: &MemoryHandle, name: &str, value: &Value, _namespace: Option<&str>) {
		let mut document = self.0.borrow_mut();
		document.log.push(Op::SetProperty(name.to_owned()));
		match document.slots.get_mut(handle.0).map(|slot| &mut slot.data) {
			Some(Data::Element { properties, .. }) => {
				properties.insert(name.to_owned(), value.clone());
			}
			_ => error!("Cannot set property {:?} on non-element {:?}", name, handle),
		}
	}

	fn remove_property(&mut self, handle: &MemoryHandle, name: &str, _namespace: Option<&str>) {
		let mut document = self.0.borrow_mut();
		document.log.push(Op::RemoveProperty(name.to_owned()));
		if let Some(Data::Element { properties, .. }) = document.slots.get_mut(handle.0).map(|slot| &mut slot.data) {
			properties.shift_remove(name);
		}
	}

	fn set_text(&mut self, handle: &MemoryHandle, content: &str) {
		let mut document = self.0.borrow_mut();
		document.log.push(Op::SetText);
		match document.slots.get_mut(handle.0).map(|slot| &mut slot.data) {
			Some(Data::Text(text) | Data::Comment(text)) => *text = content.to_owned(),
			_ => error!("Cannot set text of {:?}", handle),
		}
	}

	fn append_child(&mut self, parent: &MemoryHandle, child: &MemoryHandle) {
		let mut document = self.0.borrow_mut();
		if !document.contains(*parent) || !document.contains(*child) {
			return error!("Failed to append {:?} to {:?}: no such node", child, parent);
		}
		let moved = document.attach(parent.0, child.0, None);
		document.log.push(Op::Append { moved });
	}

	fn insert_before(&mut self, parent: &MemoryHandle, child: &MemoryHandle, sibling: &MemoryHandle) {
		let mut document = self.0.borrow_mut();
		if !document.contains(*parent) || !document.contains(*child) {
			return error!("Failed to insert {:?} into {:?}: no such node", child, parent);
		}
		if child == sibling || !document.slots[parent.0].children.contains(&sibling.0) {
			return error!("Failed to insert {:?}: {:?} is not a child of {:?}", child, sibling, parent);
		}
		document.detach(child.0);
		let index = document.slots[parent.0].children.iter().position(|&c| c == sibling.0);
		let moved = document.attach(parent.0, child.0, index);
		document.log.push(Op::InsertBefore { moved });
	}

	fn replace_child(&mut self, parent: &MemoryHandle, new: &MemoryHandle, old: &MemoryHandle) {
		let mut document = self.0.borrow_mut();
		let Some(index) = document.slots.get(parent.0).and_then(|slot| slot.children.iter().position(|&c| c == old.0)) else {
			return error!("Failed to replace {:?}: not a child of {:?}", old, parent);
		};
		document.detach(old.0);
		document.attach(parent.0, new.0, Some(index));
		document.log.push(Op::Replace);
	}

	fn remove_child(&mut self, parent: &MemoryHandle, child: &MemoryHandle) {
		let mut document = self.0.borrow_mut();
		if document.slots.get(child.0).and_then(|slot| slot.parent) != Some(parent.0) {
			return error!("Failed to remove {:?}: not a child of {:?}", child, parent);
		}
		document.detach(child.0);
		document.log.push(Op::Remove);
	}

	fn remove_children(&mut self, parent: &MemoryHandle) {
		let mut document = self.0.borrow_mut();
		let children = match document.slots.get_mut(parent.0) {
			Some(slot) => core::mem::take(&mut slot.children),
			None => return error!("Failed to clear unknown node {:?}", parent),
		};
		for child in children {
			document.slots[child].parent = None;
		}
		document.log.push(Op::RemoveChildren);
	}

	fn add_event_listener(&mut self, handle: &MemoryHandle, name: &str, listener: &Listener) {
		let mut document = self.0.borrow_mut();
		document.log.push(Op::AddListener(name.to_owned()));
		match document.slots.get_mut(handle.0) {
			Some(slot) => slot.listeners.push((name.to_owned(), listener.clone())),
			None => error!("Failed to add event listener {:?}: no such node", name),
		}
	}

	fn remove_event_listener(&mut self, handle: &MemoryHandle, name: &str, listener: &Listener) {
		let mut document = self.0.borrow_mut();
		document.log.push(Op::RemoveListener(name.to_owned()));
		if let Some(slot) = document.slots.get_mut(handle.0) {
			slot.listeners.retain(|(n, l)| !(n == name && l == listener));
		}
	}

	fn query_existing(&mut self, parent: &MemoryHandle, previous: Option<&MemoryHandle>, _next: Option<&MemoryHandle>) -> Option<MemoryHandle> {
		let document = self.0.borrow();
		let children = &document.slots.get(parent.0)?.children;
		let index = match previous {
			Some(previous) => children.iter().position(|&c| c == previous.0)? + 1,
			None => 0,
		};
		children.get(index).copied().map(MemoryHandle)
	}

	fn parent_node(&self, handle: &MemoryHandle) -> Option<MemoryHandle> {
		self.parent(*handle)
	}

	/// A `body` element, created on first use.
	fn default_target(&mut self) -> Option<MemoryHandle> {
		let mut document = self.0.borrow_mut();
		let body = match document.body {
			Some(body) => body,
			None => {
				let body = document
					.create(Data::Element {
						tag: "body".to_owned(),
						namespace: None,
						properties: IndexMap::new(),
					})
					.0;
				document.body = Some(body);
				body
			}
		};
		Some(MemoryHandle(body))
	}
}
