//! The contract between the reconciler and a concrete display surface.

use crate::{
	boundary::{self, Site},
	component::{Core, EventHandler},
	error::HostError,
	schedule::{Mailbox, Request},
	tree::NodeId,
	value::Value,
};
use core::{
	any::Any,
	cell::RefCell,
	fmt::{self, Debug, Formatter},
};
use std::rc::{Rc, Weak};
use tracing::{trace, trace_span};

pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
pub const MATHML_NAMESPACE: &str = "http://www.w3.org/1998/Math/MathML";

/// Primitive host mutations.
///
/// Operations other than node creation can't fail from the reconciler's point of view:
/// adapters log and skip what they can't apply.
pub trait Host {
	type Handle: Clone + PartialEq + Debug + 'static;

	/// # Errors
	///
	/// Iff the host can't create an element with this name, for example because it's not a valid tag name.
	fn create_node(&mut self, tag: &str, namespace: Option<&str>) -> Result<Self::Handle, HostError>;
	fn create_text(&mut self, content: &str) -> Self::Handle;
	fn create_comment(&mut self, content: &str) -> Self::Handle;

	fn set_property(&mut self, handle: &Self::Handle, name: &str, value: &Value, namespace: Option<&str>);
	fn remove_property(&mut self, handle: &Self::Handle, name: &str, namespace: Option<&str>);
	fn set_text(&mut self, handle: &Self::Handle, content: &str);

	fn append_child(&mut self, parent: &Self::Handle, child: &Self::Handle);
	fn insert_before(&mut self, parent: &Self::Handle, child: &Self::Handle, sibling: &Self::Handle);
	fn replace_child(&mut self, parent: &Self::Handle, new: &Self::Handle, old: &Self::Handle);
	fn remove_child(&mut self, parent: &Self::Handle, child: &Self::Handle);

	/// Removes all children of `parent` at once.
	fn remove_children(&mut self, parent: &Self::Handle);

	fn add_event_listener(&mut self, handle: &Self::Handle, name: &str, listener: &Listener);
	fn remove_event_listener(&mut self, handle: &Self::Handle, name: &str, listener: &Listener);

	/// Finds pre-existing markup to adopt while hydrating: the node after `previous` (or the first child) of `parent`.
	fn query_existing(&mut self, parent: &Self::Handle, previous: Option<&Self::Handle>, next: Option<&Self::Handle>) -> Option<Self::Handle>;

	fn parent_node(&self, handle: &Self::Handle) -> Option<Self::Handle>;

	/// Where [`Renderer::render_default`](`crate::Renderer::render_default`) mounts.
	fn default_target(&mut self) -> Option<Self::Handle> {
		None
	}
}

/// Where a newly realized node goes relative to its host parent.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation<T> {
	Append,
	InsertBefore(T),
	Replace(T),
}

impl<T> Operation<T> {
	pub(crate) fn before(sibling: Option<T>) -> Self {
		sibling.map_or(Self::Append, Self::InsertBefore)
	}
}

struct ListenerInner {
	id: u64,
	handler: RefCell<EventHandler>,
	node: NodeId,
	component: Option<Rc<Core>>,
	mailbox: Weak<Mailbox>,
}

/// Dispatches host events of one (node, event name) pair to the current handler.
///
/// Swapping the handler on update doesn't touch the host registration.
#[derive(Clone)]
pub struct Listener(Rc<ListenerInner>);

impl Listener {
	pub(crate) fn new(id: u64, handler: EventHandler, node: NodeId, component: Option<Rc<Core>>, mailbox: Weak<Mailbox>) -> Self {
		Self(Rc::new(ListenerInner {
			id,
			handler: RefCell::new(handler),
			node,
			component,
			mailbox,
		}))
	}

	/// Unique among live listeners of one renderer.
	#[must_use]
	pub fn id(&self) -> u64 {
		self.0.id
	}

	pub(crate) fn replace_handler(&self, handler: EventHandler) {
		*self.0.handler.borrow_mut() = handler;
	}

	/// Calls the handler with a host-specific `event`.
	pub fn dispatch(&self, event: &dyn Any) {
		let span = trace_span!("Dispatching event", listener = self.0.id);
		let _enter = span.enter();

		let handler = self.0.handler.borrow().clone();
		match boundary::invoke(|| handler.call(event)) {
			Ok(None) => (),
			Ok(Some(update)) => match &self.0.component {
				Some(core) => boundary::apply_returned(core, Site::Event, update),
				None => trace!("Dropping state returned by an event handler outside of any class component"),
			},
			Err(error) => {
				let Some(mailbox) = self.0.mailbox.upgrade() else { return };
				mailbox.post(Request::Fault {
					node: self.0.node,
					site: Site::Event,
					hook: "event handler".into(),
					error,
				});
				mailbox.flush();
			}
		}
	}
}

impl PartialEq for Listener {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl Debug for Listener {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Listener").field(&self.0.id).finish()
	}
}
