//! The public entry point: mounting element trees into host targets.

use crate::{
	boundary,
	component::{Core, HookResult, StateUpdate, Updater},
	construct::{shape, Child},
	element::Element,
	host::{Host, Operation},
	schedule::{Flush, Mailbox, Request, Scheduler},
	tree::{Node, NodeId, Owner, Status, Tree},
	value::State,
};
use core::cell::RefCell;
use hashbrown::HashMap;
use std::{
	collections::VecDeque,
	rc::{Rc, Weak},
};
use tracing::{error, instrument, trace, warn};

/// Renderer configuration.
#[derive(Debug, Clone)]
pub struct Options {
	/// How deep mount and patch may recurse. Deeper subtrees are replaced with empty nodes.
	pub depth_limit: usize,
}

impl Default for Options {
	fn default() -> Self {
		Self { depth_limit: 256 }
	}
}

/// How a first render treats its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
	/// Append after any existing content.
	#[default]
	Append,
	/// Replace the target node itself.
	Replace,
	/// Remove existing content, then mount.
	Destroy,
	/// Adopt existing content instead of creating host nodes.
	Hydrate,
}

/// Where a node goes: under `parent`, placed by `operation`.
#[derive(Debug, Clone)]
pub(crate) struct At<T> {
	pub(crate) parent: T,
	pub(crate) operation: Operation<T>,
}

/// Host removal waiting for a `component_will_unmount` future.
pub(crate) struct Release<T> {
	pub(crate) owner: NodeId,
	/// The parent is a render target or portal target, which stays valid on its own.
	pub(crate) external: bool,
	pub(crate) parent: T,
	pub(crate) handles: Vec<T>,
}

pub(crate) struct Engine<H: Host> {
	pub(crate) host: H,
	pub(crate) tree: Tree<H::Handle>,
	pub(crate) roots: Vec<(H::Handle, NodeId)>,
	pub(crate) mailbox: Rc<Mailbox>,
	pub(crate) options: Options,
	pub(crate) depth: usize,
	pub(crate) hydrating: bool,
	pub(crate) releases: HashMap<u64, Release<H::Handle>>,
	pub(crate) next_listener: u64,
}

impl<H: Host + 'static> Flush for RefCell<Engine<H>> {
	fn flush(&self) {
		match self.try_borrow_mut() {
			Ok(mut engine) => engine.drain(),
			Err(_) => trace!("Pass in flight, requests are picked up when it completes"),
		}
	}
}

/// Keeps mounted element trees in sync with a [`Host`].
///
/// All work happens on the calling thread. Asynchronous work goes through the [`Scheduler`].
pub struct Renderer<H: Host> {
	engine: Rc<RefCell<Engine<H>>>,
}

impl<H: Host + 'static> Renderer<H> {
	pub fn new(host: H, scheduler: Rc<dyn Scheduler>) -> Self {
		Self::with_options(host, scheduler, Options::default())
	}

	pub fn with_options(host: H, scheduler: Rc<dyn Scheduler>, options: Options) -> Self {
		let mailbox = Rc::new(Mailbox::new(scheduler));
		let engine = Rc::new(RefCell::new(Engine {
			host,
			tree: Tree::with_key(),
			roots: Vec::new(),
			mailbox: Rc::clone(&mailbox),
			options,
			depth: 0,
			hydrating: false,
			releases: HashMap::new(),
			next_listener: 0,
		}));
		let weak: Weak<RefCell<Engine<H>>> = Rc::downgrade(&engine);
		mailbox.bind(weak);
		Self { engine }
	}

	/// Renders `element` into `target`.
	///
	/// The first render into a target mounts according to `mode`. Later renders patch the existing tree if the root keys match,
	/// and replace it otherwise.
	pub fn render(&self, element: impl Into<Child>, target: &H::Handle, mode: Mode) {
		let element = shape(element.into());
		self.enter(|engine| engine.render(element, target, mode));
	}

	/// Renders into [`Host::default_target`]. Returns `false` if the host has none.
	pub fn render_default(&self, element: impl Into<Child>) -> bool {
		let element = shape(element.into());
		self.enter(|engine| match engine.host.default_target() {
			Some(target) => {
				engine.render(element, &target, Mode::Append);
				true
			}
			None => {
				warn!("Host has no default render target");
				false
			}
		})
		.unwrap_or(false)
	}

	/// Unmounts what was rendered into `target`. Returns `false` if nothing was.
	pub fn unmount(&self, target: &H::Handle) -> bool {
		self.enter(|engine| engine.unmount_root(target)).unwrap_or(false)
	}

	/// Processes queued updates.
	pub fn flush(&self) {
		self.enter(|_| ());
	}

	/// Runs `f` with access to the host, for example to inspect or prepare targets.
	pub fn with_host<R>(&self, f: impl FnOnce(&mut H) -> R) -> Option<R> {
		self.engine.try_borrow_mut().ok().map(|mut engine| f(&mut engine.host))
	}

	fn enter<R>(&self, f: impl FnOnce(&mut Engine<H>) -> R) -> Option<R> {
		if let Ok(mut engine) = self.engine.try_borrow_mut() {
			let result = f(&mut engine);
			engine.drain();
			Some(result)
		} else {
			error!("Renderer entered from within its own pass; call ignored");
			None
		}
	}
}

fn coalesce(batch: VecDeque<Request>) -> Vec<Request> {
	let mut requests = Vec::with_capacity(batch.len());
	let mut updates = HashMap::<NodeId, usize>::new();
	for request in batch {
		if let Request::Update { node, forced } = request {
			if let Some(&index) = updates.get(&node) {
				if let Some(Request::Update { forced: merged, .. }) = requests.get_mut(index) {
					*merged |= forced;
				}
				continue;
			}
			updates.insert(node, requests.len());
		}
		requests.push(request);
	}
	requests
}

impl<H: Host> Engine<H> {
	/// Processes queued requests until none are left.
	///
	/// Requests posted while processing form the next batch, so updates requested by hooks run after the pass that called them.
	pub(crate) fn drain(&mut self) {
		loop {
			let batch = self.mailbox.take();
			if batch.is_empty() {
				break;
			}
			for request in coalesce(batch) {
				self.process(request);
			}
		}
	}

	fn process(&mut self, request: Request) {
		match request {
			Request::Update { node, forced } => self.update(node, forced),
			Request::Transition { core, transition, callback } => self.transition(&core, transition, callback),
			Request::Resolve { node, ticket, result } => self.resolve(node, ticket, result),
			Request::Release { ticket } => self.release(ticket),
			Request::Fault { node, site, hook, error } => self.event_fault(node, site, hook, error),
		}
	}

	fn update(&mut self, id: NodeId, forced: bool) {
		let Some(node) = self.tree.get(id) else {
			return trace!("Dropping update of a detached component");
		};
		if node.status.get() != Status::Ready {
			return trace!("Dropping update of a component that is mid-pass");
		}
		let pending = node.instance().map_or(false, |instance| instance.core.has_pending());
		if forced || pending {
			self.patch_component(id, None, forced);
		} else {
			self.settle(id);
		}
	}

	fn transition(&mut self, core: &Rc<Core>, transition: Box<dyn FnOnce(&State) -> HookResult<Option<State>>>, callback: Option<Box<dyn FnOnce(&State) -> HookResult>>) {
		let Some(id) = core.node.get() else {
			return trace!("Dropping state transition of a detached component");
		};
		let current = core.next_state();
		match boundary::invoke(|| transition(&current)) {
			Ok(Some(state)) => Updater(Rc::clone(core)).submit(StateUpdate::Merge(state), callback),
			Ok(None) => {
				if let Some(callback) = callback {
					core.callbacks.borrow_mut().push(callback);
					self.settle(id);
				}
			}
			Err(error) => {
				self.fault(crate::boundary::Site::Callback, id, "set_state".into(), error);
			}
		}
	}

	fn root_of(&self, target: &H::Handle) -> Option<NodeId> {
		self.roots.iter().find(|(root, _)| root == target).map(|&(_, container)| container)
	}

	#[instrument(skip_all, fields(?mode))]
	pub(crate) fn render(&mut self, element: Element, target: &H::Handle, mode: Mode) {
		if let Some(container) = self.root_of(target) {
			let Some(parent) = self.list_parent(container) else { return };
			match self.children_of(container).first().copied() {
				Some(child) if self.tree.get(child).and_then(|node| node.key.as_ref()) == element.key() => {
					self.patch(child, &element);
				}
				Some(child) => {
					self.replace(child, &element);
				}
				None => {
					let at = At { parent, operation: Operation::Append };
					let child = self.mount(&element, &at, container, None);
					self.tree[container].children.push(child);
				}
			}
			return;
		}

		let (parent, operation) = match mode {
			Mode::Append | Mode::Hydrate => (target.clone(), Operation::Append),
			Mode::Destroy => {
				self.host.remove_children(target);
				(target.clone(), Operation::Append)
			}
			Mode::Replace => match self.host.parent_node(target) {
				Some(parent) => (parent, Operation::Replace(target.clone())),
				None => {
					warn!("Render target has no parent to replace it in. Appending instead.");
					(target.clone(), Operation::Append)
				}
			},
		};

		let mut node = Node::new(&Element::empty(), None, None, None);
		node.owner = Owner::Container(parent.clone());
		node.source = None;
		let container = self.tree.insert(node);
		self.roots.push((target.clone(), container));

		self.hydrating = mode == Mode::Hydrate;
		let child = self.mount(&element, &At { parent, operation }, container, None);
		self.hydrating = false;
		self.tree[container].children.push(child);
	}

	pub(crate) fn unmount_root(&mut self, target: &H::Handle) -> bool {
		let Some(index) = self.roots.iter().position(|(root, _)| root == target) else {
			return false;
		};
		let (_, container) = self.roots.remove(index);
		for child in self.children_of(container).to_vec() {
			self.remove(child);
		}
		self.tree.remove(container);
		true
	}
}
