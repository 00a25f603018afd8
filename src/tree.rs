//! Arena storage for mounted nodes.
//!
//! Nodes refer to each other by [`NodeId`]. Removing a node from the arena is what detaches it,
//! so a stale id simply fails to resolve.

use crate::{
	component::{Component, ComponentClass, Core, Resumable},
	element::{Element, ElementType, Key},
	host::Listener,
	value::Props,
};
use core::cell::Cell;
use slotmap::SlotMap;
use std::rc::Rc;

slotmap::new_key_type! {
	pub(crate) struct NodeId;
}

/// Re-entrancy flag of a mounted component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
	Ready,
	/// A render or patch pass of this component is running.
	Blocked,
	/// The rendered root is a promise that has not resolved yet.
	Pending,
}

pub(crate) struct Instance {
	pub(crate) component: Box<dyn Component>,
	pub(crate) class: ComponentClass,
	pub(crate) props: Props,
	pub(crate) core: Rc<Core>,
}

/// What a mounted node controls.
pub(crate) enum Owner<T> {
	/// Not realized yet.
	Vacant,
	/// A text, comment, empty or element host node.
	Host(T),
	/// The render target of a root.
	Container(T),
	Portal(T),
	Instance(Box<Instance>),
	Function,
	Fragment,
	Promise { ticket: u64, resolved: bool },
}

pub(crate) struct Node<T> {
	pub(crate) ty: ElementType,
	pub(crate) key: Option<Key>,
	pub(crate) props: Props,
	pub(crate) content: Option<Rc<str>>,
	pub(crate) children: Vec<NodeId>,
	/// Sticky once set.
	pub(crate) keyed: bool,
	pub(crate) owner: Owner<T>,
	/// Nearest composite ancestor.
	pub(crate) host: Option<NodeId>,
	pub(crate) parent: Option<NodeId>,
	pub(crate) status: Rc<Cell<Status>>,
	pub(crate) xmlns: Option<Rc<str>>,
	pub(crate) listeners: Vec<(Rc<str>, Listener)>,
	pub(crate) coroutine: Option<Resumable>,
	/// The description this node was last reconciled with.
	pub(crate) source: Option<Element>,
}

impl<T> Node<T> {
	pub(crate) fn new(element: &Element, parent: Option<NodeId>, host: Option<NodeId>, xmlns: Option<Rc<str>>) -> Self {
		Self {
			ty: element.ty().clone(),
			key: element.key().cloned(),
			props: element.props().clone(),
			content: element.0.text.clone(),
			children: Vec::new(),
			keyed: element.is_keyed(),
			owner: Owner::Vacant,
			host,
			parent,
			status: Rc::new(Cell::new(Status::Ready)),
			xmlns,
			listeners: Vec::new(),
			coroutine: None,
			source: Some(element.clone()),
		}
	}

	/// The handle this node realizes, if it is a host node.
	pub(crate) fn handle(&self) -> Option<&T> {
		match &self.owner {
			Owner::Host(handle) => Some(handle),
			_ => None,
		}
	}

	/// The handle children of this node are attached to, if it has its own.
	pub(crate) fn parent_handle(&self) -> Option<&T> {
		match &self.owner {
			Owner::Host(handle) | Owner::Container(handle) | Owner::Portal(handle) => Some(handle),
			_ => None,
		}
	}

	pub(crate) fn is_composite(&self) -> bool {
		matches!(self.owner, Owner::Instance(_) | Owner::Function)
	}

	pub(crate) fn instance(&self) -> Option<&Instance> {
		match &self.owner {
			Owner::Instance(instance) => Some(instance),
			_ => None,
		}
	}

	pub(crate) fn name(&self) -> Rc<str> {
		self.ty.tag().into()
	}
}

pub(crate) type Tree<T> = SlotMap<NodeId, Node<T>>;
