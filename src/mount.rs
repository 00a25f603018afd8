//! Realizing elements as host nodes, and tearing them down again.

use crate::{
	boundary::{self, Site},
	component::{Component, Core, EventHandler, HookResult, Hooks, PropRule, RefTarget, Rendered, Resumable, Settle, StateUpdate, Updater},
	construct::shape,
	element::{next_ticket, Element, ElementType, Kind, Suspense},
	error::{report, Error, HookError, HostError},
	host::{Host, Listener, Operation, MATHML_NAMESPACE, SVG_NAMESPACE},
	renderer::{At, Engine, Release},
	schedule::Request,
	tree::{Instance, Node, NodeId, Owner, Status},
	value::{Props, State, Value},
};
use core::any::Any;
use futures_util::{future::join_all, FutureExt as _};
use std::{mem, rc::Rc};
use tracing::{error, instrument, trace, warn};

pub(crate) fn is_event(name: &str) -> bool {
	name.len() > 2 && name.starts_with("on")
}

fn event_name(prop: &str) -> Rc<str> {
	prop[2..].to_ascii_lowercase().into()
}

pub(crate) fn ref_of(props: &Props) -> Option<RefTarget> {
	match props.get("ref")? {
		Value::Ref(target) => Some(target.clone()),
		Value::Str(name) => Some(RefTarget::Named(name.clone())),
		_ => None,
	}
}

fn join(mut settles: Vec<Settle>) -> Option<Settle> {
	match settles.len() {
		0 => None,
		1 => settles.pop(),
		_ => Some(join_all(settles).map(drop).boxed_local()),
	}
}

/// A `Replace` placement becomes an insertion before the displaced node, which the caller removes afterwards.
fn split_replace<T: Clone>(at: &At<T>) -> (At<T>, Option<T>) {
	match &at.operation {
		Operation::Replace(old) => (
			At {
				parent: at.parent.clone(),
				operation: Operation::InsertBefore(old.clone()),
			},
			Some(old.clone()),
		),
		_ => (at.clone(), None),
	}
}

impl<H: Host> Engine<H> {
	/// Mounts `element` as a new child of `parent`, placing its host nodes as `at` says.
	///
	/// Returns the new node. Its caller is responsible for recording it in `parent`'s child list.
	pub(crate) fn mount(&mut self, element: &Element, at: &At<H::Handle>, parent: NodeId, host: Option<NodeId>) -> NodeId {
		if self.depth >= self.options.depth_limit {
			error!("Depth limit reached");
			return self.mount_primitive(&Element::empty(), at, parent, host);
		}
		self.depth += 1;
		let id = match element.kind() {
			Kind::Custom | Kind::Component => self.mount_composite(element, at, parent, host),
			Kind::Fragment => self.mount_fragment(element, at, parent, host),
			Kind::Portal => self.mount_portal(element, at, parent, host),
			Kind::Promise => self.mount_promise(element, at, parent, host),
			Kind::Text | Kind::Empty | Kind::Comment | Kind::Node => self.mount_primitive(element, at, parent, host),
		};
		self.depth -= 1;
		id
	}

	fn insert(&mut self, element: &Element, parent: NodeId, host: Option<NodeId>) -> NodeId {
		let inherited = self.tree.get(parent).and_then(|node| node.xmlns.clone());
		let xmlns = match element.ty() {
			ElementType::Node(tag) => element
				.props()
				.get("xmlns")
				.and_then(Value::as_str)
				.map(Rc::from)
				.or_else(|| match &**tag {
					"svg" => Some(SVG_NAMESPACE.into()),
					"math" => Some(MATHML_NAMESPACE.into()),
					_ => None,
				})
				.or(inherited),
			_ => inherited,
		};
		self.tree.insert(Node::new(element, Some(parent), host, xmlns))
	}

	pub(crate) fn attach(&mut self, at: &At<H::Handle>, handle: &H::Handle) {
		match &at.operation {
			Operation::Append => self.host.append_child(&at.parent, handle),
			Operation::InsertBefore(sibling) => self.host.insert_before(&at.parent, handle, sibling),
			Operation::Replace(old) => self.host.replace_child(&at.parent, handle, old),
		}
	}

	#[instrument(skip_all, fields(tag = element.tag()))]
	fn mount_primitive(&mut self, element: &Element, at: &At<H::Handle>, parent: NodeId, host: Option<NodeId>) -> NodeId {
		let id = self.insert(element, parent, host);

		let adopted = if self.hydrating && matches!(at.operation, Operation::Append) {
			let previous = self.previous_handle(parent);
			self.host.query_existing(&at.parent, previous.as_ref(), None)
		} else {
			None
		};

		let handle = if let Some(handle) = adopted {
			trace!("Adopting existing host node");
			handle
		} else {
			let namespace = self.tree[id].xmlns.clone();
			let handle = match element.ty() {
				ElementType::Comment => self.host.create_comment(element.content().unwrap_or_default()),
				ElementType::Node(tag) => match self.host.create_node(tag, namespace.as_deref()) {
					Ok(handle) => handle,
					Err(error) => {
						self.tree.remove(id);
						return self.mount_unrealizable(element, at, parent, host, error);
					}
				},
				_ => self.host.create_text(element.content().unwrap_or_default()),
			};
			self.attach(at, &handle);
			handle
		};
		self.tree[id].owner = Owner::Host(handle.clone());

		if element.kind() == Kind::Node {
			let inner = At {
				parent: handle.clone(),
				operation: Operation::Append,
			};
			self.mount_children(id, element.children(), &inner, host);
			self.apply_props(id, &handle, element.props());
		}
		id
	}

	fn mount_unrealizable(&mut self, element: &Element, at: &At<H::Handle>, parent: NodeId, host: Option<NodeId>, error: HostError) -> NodeId {
		let replacement = self
			.raise(
				Site::Render,
				host,
				element.tag().into(),
				"create_node".into(),
				Error::HostRealization {
					tag: element.tag().to_owned(),
					source: error.clone(),
				},
			)
			.unwrap_or_else(|| Element::comment(error.to_string()));
		self.mount(&replacement, at, parent, host)
	}

	pub(crate) fn mount_children(&mut self, id: NodeId, children: &[Element], at: &At<H::Handle>, host: Option<NodeId>) {
		for child in children {
			let child = self.mount(child, at, id, host);
			if let Some(node) = self.tree.get_mut(id) {
				node.children.push(child);
			}
		}
	}

	fn apply_props(&mut self, id: NodeId, handle: &H::Handle, props: &Props) {
		let namespace = self.tree.get(id).and_then(|node| node.xmlns.clone());
		for (name, value) in props.host_facing() {
			match value {
				Value::Handler(handler) if is_event(name) => self.listen(id, handle, name, handler.clone()),
				Value::Null => (),
				value => self.host.set_property(handle, name, value, namespace.as_deref()),
			}
		}
		if let Some(reference) = ref_of(props) {
			self.attach_ref(id, &reference, Rc::new(handle.clone()));
		}
	}

	pub(crate) fn listen(&mut self, id: NodeId, handle: &H::Handle, prop: &str, handler: EventHandler) {
		let event = event_name(prop);
		let component = self.tree.get(id).and_then(|node| node.host).and_then(|host| self.core_of(host));
		self.next_listener += 1;
		let listener = Listener::new(self.next_listener, handler, id, component, Rc::downgrade(&self.mailbox));
		self.host.add_event_listener(handle, &event, &listener);
		if let Some(node) = self.tree.get_mut(id) {
			node.listeners.push((event, listener));
		}
	}

	/// Points an existing listener at a new handler. Returns `false` if there is none for `prop`.
	pub(crate) fn swap_listener(&mut self, id: NodeId, prop: &str, handler: &EventHandler) -> bool {
		let event = event_name(prop);
		let Some(node) = self.tree.get(id) else { return false };
		match node.listeners.iter().find(|(name, _)| *name == event) {
			Some((_, listener)) => {
				listener.replace_handler(handler.clone());
				true
			}
			None => false,
		}
	}

	pub(crate) fn unlisten(&mut self, id: NodeId, handle: &H::Handle, prop: &str) {
		let event = event_name(prop);
		let Some(node) = self.tree.get_mut(id) else { return };
		let Some(index) = node.listeners.iter().position(|(name, _)| *name == event) else { return };
		let (name, listener) = node.listeners.remove(index);
		self.host.remove_event_listener(handle, &name, &listener);
	}

	pub(crate) fn attach_ref(&mut self, id: NodeId, reference: &RefTarget, value: Rc<dyn Any>) {
		match reference {
			RefTarget::Named(name) => match self.ref_owner(id) {
				Some(core) => {
					core.refs.borrow_mut().insert(name.clone(), value);
				}
				None => warn!("Named ref {:?} outside of any class component", name),
			},
			RefTarget::Callback(callback) => {
				let callback = Rc::clone(callback);
				if let Err(error) = boundary::invoke(|| callback(Some(&*value))) {
					self.fault(Site::Callback, id, "ref".into(), error);
				}
			}
		}
	}

	pub(crate) fn detach_ref(&mut self, id: NodeId, reference: &RefTarget) {
		match reference {
			RefTarget::Named(name) => {
				if let Some(core) = self.ref_owner(id) {
					core.refs.borrow_mut().remove(name);
				}
			}
			RefTarget::Callback(callback) => {
				let callback = Rc::clone(callback);
				if let Err(error) = boundary::invoke(|| callback(None)) {
					self.fault(Site::Callback, id, "ref".into(), error);
				}
			}
		}
	}

	/// The class component whose render produced `id`.
	fn ref_owner(&self, id: NodeId) -> Option<Rc<Core>> {
		let host = self.tree.get(id)?.host?;
		self.core_of(host)
	}

	pub(crate) fn core_of(&self, id: NodeId) -> Option<Rc<Core>> {
		self.tree.get(id)?.instance().map(|instance| Rc::clone(&instance.core))
	}

	pub(crate) fn hooks_of(&self, id: NodeId) -> Hooks {
		self.tree.get(id).and_then(Node::instance).map_or(Hooks::NONE, |instance| instance.class.hooks())
	}

	pub(crate) fn check_rules(&self, component: &str, rules: &[PropRule], props: &Props) {
		for rule in rules {
			if let Err(message) = rule.check(props) {
				report(component.into(), "prop_rules".into(), Error::Construction(message));
			}
		}
	}

	#[instrument(skip_all, fields(component = element.tag()))]
	fn mount_composite(&mut self, element: &Element, at: &At<H::Handle>, parent: NodeId, host: Option<NodeId>) -> NodeId {
		let id = self.insert(element, parent, host);
		let mut props = element.props().clone();

		match element.ty() {
			ElementType::Component(class) => {
				props.merge_defaults(class.defaults());
				self.check_rules(class.name(), class.rules(), &props);

				let status = Rc::clone(&self.tree[id].status);
				let core = Rc::new(Core::new(class.name().into(), id, status, Rc::downgrade(&self.mailbox)));
				let updater = Updater(Rc::clone(&core));
				let component = match boundary::invoke(|| Ok(class.construct(&props, updater))) {
					Ok(component) => component,
					Err(error) => {
						core.node.set(None);
						self.tree.remove(id);
						let replacement = self
							.raise(
								Site::Render,
								host,
								class.name().into(),
								"construct".into(),
								Error::LifecycleHook {
									site: Site::Render,
									hook: "construct".into(),
									source: error,
								},
							)
							.unwrap_or_else(Element::empty);
						return self.mount(&replacement, at, parent, host);
					}
				};
				self.tree[id].owner = Owner::Instance(Box::new(Instance {
					component,
					class: class.clone(),
					props,
					core,
				}));

				if class.hooks().contains(Hooks::GET_INITIAL_STATE) {
					if let Some(Some(update)) = self.dispatch(id, Site::DataReceive, "get_initial_state", |component, props, _| component.get_initial_state(props)) {
						self.initial_state(id, update);
					}
				}
			}
			ElementType::Custom(function) => {
				props.merge_defaults(function.defaults());
				self.check_rules(function.name(), function.rules(), &props);
				let node = &mut self.tree[id];
				node.props = props;
				node.owner = Owner::Function;
			}
			_ => (),
		}

		let status = Rc::clone(&self.tree[id].status);
		status.set(Status::Blocked);
		let rendered = self.render_node(id);
		let hooks = self.hooks_of(id);
		if hooks.contains(Hooks::WILL_MOUNT) {
			self.lifecycle(id, Site::Mount, "component_will_mount", |component, _, _| component.component_will_mount());
		}

		let child = self.mount(&rendered, at, id, Some(id));
		if let Some(node) = self.tree.get_mut(id) {
			node.children.push(child);
		}
		status.set(self.root_status(id));

		if hooks.contains(Hooks::DID_MOUNT) {
			let handle = self.first_handle(id);
			self.lifecycle(id, Site::Mount, "component_did_mount", move |component, _, _| {
				let node: &dyn Any = match &handle {
					Some(handle) => handle,
					None => &(),
				};
				component.component_did_mount(node)
			});
		}

		if let Some(reference) = ref_of(element.props()) {
			if let Some(core) = self.core_of(id) {
				self.attach_ref(id, &reference, Rc::new(Updater(core)));
			}
		}
		self.settle(id);
		id
	}

	fn initial_state(&mut self, id: NodeId, update: StateUpdate) {
		let Some(core) = self.core_of(id) else { return };
		match update {
			StateUpdate::Merge(state) => *core.state.borrow_mut() = state,
			update => Updater(core).submit(update, None),
		}
	}

	/// Calls a hook on the class instance at `id`, faulting on failure.
	pub(crate) fn dispatch<R>(&mut self, id: NodeId, site: Site, hook: &'static str, call: impl FnOnce(&mut dyn Component, &Props, &State) -> HookResult<R>) -> Option<R> {
		let outcome = {
			let Some(Node { owner: Owner::Instance(instance), .. }) = self.tree.get_mut(id) else {
				return None;
			};
			let Instance { component, props, core, .. } = &mut **instance;
			let state = core.state.borrow();
			boundary::invoke(|| call(component.as_mut(), props, &state))
		};
		match outcome {
			Ok(value) => Some(value),
			Err(error) => {
				self.fault(site, id, hook.into(), error);
				None
			}
		}
	}

	/// Like [`Engine::dispatch`], applying returned state.
	pub(crate) fn lifecycle(&mut self, id: NodeId, site: Site, hook: &'static str, call: impl FnOnce(&mut dyn Component, &Props, &State) -> HookResult<Option<StateUpdate>>) {
		if let Some(Some(update)) = self.dispatch(id, site, hook, call) {
			if let Some(core) = self.core_of(id) {
				boundary::apply_returned(&core, site, update);
			}
		}
	}

	/// Runs the render step of the composite at `id`.
	pub(crate) fn render_node(&mut self, id: NodeId) -> Element {
		let outcome = {
			let Some(node) = self.tree.get_mut(id) else {
				return Element::empty();
			};
			if let Some(resumable) = node.coroutine.as_mut() {
				boundary::invoke(|| resumable.resume()).map(Rendered::from)
			} else {
				match &mut node.owner {
					Owner::Instance(instance) => {
						let Instance { component, props, core, .. } = &mut **instance;
						let state = core.state.borrow();
						boundary::invoke(|| component.render(props, &state))
					}
					Owner::Function => match &node.ty {
						ElementType::Custom(function) => {
							let function = function.clone();
							let props = &node.props;
							boundary::invoke(|| function.call(props))
						}
						_ => Ok(Rendered::from(())),
					},
					_ => Ok(Rendered::from(())),
				}
			}
		};

		match outcome {
			Ok(Rendered::Child(child)) => shape(child),
			Ok(Rendered::Coroutine(coroutine)) => {
				let mut resumable = Resumable::new(coroutine);
				let step = boundary::invoke(|| resumable.resume());
				if let Some(node) = self.tree.get_mut(id) {
					node.coroutine = Some(resumable);
				}
				match step {
					Ok(element) => element,
					Err(error) => self.render_fault(id, error),
				}
			}
			Err(error) => self.render_fault(id, error),
		}
	}

	fn render_fault(&mut self, id: NodeId, error: HookError) -> Element {
		self.fault(Site::Render, id, "render".into(), error).unwrap_or_else(Element::empty)
	}

	/// `Pending` while the component's root is an unresolved promise.
	pub(crate) fn root_status(&self, id: NodeId) -> Status {
		let waiting = self
			.children_of(id)
			.first()
			.and_then(|&child| self.tree.get(child))
			.map_or(false, |child| matches!(child.owner, Owner::Promise { resolved: false, .. }));
		if waiting {
			Status::Pending
		} else {
			Status::Ready
		}
	}

	/// Ends a pass of the class component at `id`: schedules state that arrived mid-pass, or runs the queued callbacks.
	pub(crate) fn settle(&mut self, id: NodeId) {
		let Some(core) = self.core_of(id) else { return };
		if core.status.get() != Status::Ready {
			return;
		}
		if core.has_pending() {
			self.mailbox.post(Request::Update { node: id, forced: false });
			return;
		}
		let callbacks = core.callbacks.take();
		if callbacks.is_empty() {
			return;
		}
		let state = core.state.borrow().clone();
		for callback in callbacks {
			if let Err(error) = boundary::invoke(|| callback(&state)) {
				self.fault(Site::Callback, id, "callback".into(), error);
			}
		}
	}

	fn mount_fragment(&mut self, element: &Element, at: &At<H::Handle>, parent: NodeId, host: Option<NodeId>) -> NodeId {
		let id = self.insert(element, parent, host);
		self.tree[id].owner = Owner::Fragment;
		let (at, displaced) = split_replace(at);
		self.mount_children(id, element.children(), &at, host);
		if let Some(old) = displaced {
			self.host.remove_child(&at.parent, &old);
		}
		id
	}

	fn mount_portal(&mut self, element: &Element, at: &At<H::Handle>, parent: NodeId, host: Option<NodeId>) -> NodeId {
		let target = match element.ty() {
			ElementType::Portal(target) => target.downcast_ref::<H::Handle>().cloned(),
			_ => None,
		};
		let Some(target) = target else {
			let replacement = self
				.raise(
					Site::Render,
					host,
					"#portal".into(),
					"portal".into(),
					Error::HostRealization {
						tag: "#portal".to_owned(),
						source: HostError::Rejected("portal target is not a handle of this host".to_owned()),
					},
				)
				.unwrap_or_else(Element::empty);
			return self.mount(&replacement, at, parent, host);
		};

		let id = self.insert(element, parent, host);
		self.tree[id].owner = Owner::Portal(target.clone());
		let inner = At {
			parent: target,
			operation: Operation::Append,
		};
		let hydrating = mem::replace(&mut self.hydrating, false);
		self.mount_children(id, element.children(), &inner, host);
		self.hydrating = hydrating;
		if let Operation::Replace(old) = &at.operation {
			self.host.remove_child(&at.parent, old);
		}
		id
	}

	fn mount_promise(&mut self, element: &Element, at: &At<H::Handle>, parent: NodeId, host: Option<NodeId>) -> NodeId {
		let id = self.insert(element, parent, host);
		let ElementType::Promise(suspense) = element.ty() else { return id };
		let node = &mut self.tree[id];
		node.owner = Owner::Promise {
			ticket: suspense.ticket(),
			resolved: false,
		};
		node.status.set(Status::Pending);

		let (at, displaced) = split_replace(at);
		self.mount_children(id, element.children(), &at, host);
		if let Some(old) = displaced {
			self.host.remove_child(&at.parent, &old);
		}
		self.await_promise(id, suspense);
		id
	}

	pub(crate) fn await_promise(&mut self, id: NodeId, suspense: &Suspense) {
		let Some(future) = suspense.take() else {
			return warn!("Promise element mounted more than once. Only the first mount resolves.");
		};
		let ticket = suspense.ticket();
		let mailbox = Rc::downgrade(&self.mailbox);
		self.mailbox.scheduler().spawn(
			async move {
				let result = future.await;
				let Some(mailbox) = mailbox.upgrade() else { return };
				mailbox.post(Request::Resolve { node: id, ticket, result });
				mailbox.flush();
			}
			.boxed_local(),
		);
	}

	/// Swaps a promise node's placeholder for what its future produced.
	pub(crate) fn resolve(&mut self, id: NodeId, ticket: u64, result: HookResult<Element>) {
		match self.tree.get(id).map(|node| &node.owner) {
			Some(Owner::Promise { ticket: current, .. }) if *current == ticket => (),
			_ => return trace!(ticket, "Dropping stale promise resolution"),
		}

		let element = match result {
			Ok(element) => element,
			Err(error) => self.fault(Site::Render, id, "promise".into(), error).unwrap_or_else(Element::empty),
		};
		if let Some(node) = self.tree.get_mut(id) {
			node.owner = Owner::Promise { ticket, resolved: true };
			node.status.set(Status::Ready);
		}
		self.patch_children(id, std::slice::from_ref(&element), element.key().is_some());

		let waiting = self.tree.get(id).and_then(|node| node.parent).filter(|&parent| {
			self.tree
				.get(parent)
				.map_or(false, |node| node.is_composite() && node.status.get() == Status::Pending && node.children.first() == Some(&id))
		});
		if let Some(parent) = waiting {
			self.tree[parent].status.set(Status::Ready);
			self.settle(parent);
		}
	}

	/// Unmounts `id` and takes its host nodes out of their parent.
	///
	/// If a `component_will_unmount` hook in the subtree returned a future, the host nodes stay in place until it completes.
	pub(crate) fn remove(&mut self, id: NodeId) {
		let mut handles = Vec::new();
		self.top_handles(id, &mut handles);
		let container = self.host_parent(id);
		let settle = self.unmount(id);
		let Some((owner, parent)) = container else { return };
		let external = !matches!(self.tree.get(owner).map(|node| &node.owner), Some(Owner::Host(_)));
		self.take_out(owner, external, parent, handles, settle);
	}

	/// Removes `handles` from `parent` now, or once `settle` completes.
	///
	/// Deferred removal is dropped if `owner` is gone by then, unless `external` says `parent` outlives it.
	pub(crate) fn take_out(&mut self, owner: NodeId, external: bool, parent: H::Handle, handles: Vec<H::Handle>, settle: Option<Settle>) {
		let Some(settle) = settle else {
			for handle in &handles {
				self.host.remove_child(&parent, handle);
			}
			return;
		};

		trace!(count = handles.len(), "Keeping host nodes until unmount settles");
		let ticket = next_ticket();
		self.releases.insert(
			ticket,
			Release {
				owner,
				external,
				parent,
				handles,
			},
		);
		let mailbox = Rc::downgrade(&self.mailbox);
		self.mailbox.scheduler().spawn(
			async move {
				settle.await;
				let Some(mailbox) = mailbox.upgrade() else { return };
				mailbox.post(Request::Release { ticket });
				mailbox.flush();
			}
			.boxed_local(),
		);
	}

	pub(crate) fn release(&mut self, ticket: u64) {
		let Some(release) = self.releases.remove(&ticket) else { return };
		if release.external || self.tree.contains_key(release.owner) {
			for handle in &release.handles {
				self.host.remove_child(&release.parent, handle);
			}
		} else {
			trace!("Host parent was removed in the meantime");
		}
	}

	/// Runs unmount hooks and forgets `id` and its descendants. Host nodes are left attached, except those of portals.
	///
	/// Returns what the subtree's `component_will_unmount` hooks asked to wait for, if anything.
	pub(crate) fn unmount(&mut self, id: NodeId) -> Option<Settle> {
		let settle = if self.hooks_of(id).contains(Hooks::WILL_UNMOUNT) {
			let handle = self.first_handle(id);
			self.dispatch(id, Site::Mount, "component_will_unmount", move |component, _, _| {
				let node: &dyn Any = match &handle {
					Some(handle) => handle,
					None => &(),
				};
				component.component_will_unmount(node)
			})
			.flatten()
		} else {
			None
		};

		let Some(node) = self.tree.get(id) else { return settle };
		let children = node.children.clone();
		let portal = match &node.owner {
			Owner::Portal(target) => Some(target.clone()),
			_ => None,
		};
		let mut settles: Vec<Settle> = settle.into_iter().collect();
		for child in children {
			if let Some(target) = &portal {
				let mut handles = Vec::new();
				self.top_handles(child, &mut handles);
				let settle = self.unmount(child);
				self.take_out(id, true, target.clone(), handles, settle);
			} else {
				settles.extend(self.unmount(child));
			}
		}

		let reference = self
			.tree
			.get(id)
			.filter(|node| matches!(node.owner, Owner::Host(_) | Owner::Instance(_)))
			.and_then(|node| ref_of(&node.props));
		if let Some(reference) = reference {
			self.detach_ref(id, &reference);
		}
		if let Some(node) = self.tree.get_mut(id) {
			let listeners = mem::take(&mut node.listeners);
			if let Some(handle) = node.handle() {
				for (name, listener) in &listeners {
					self.host.remove_event_listener(handle, name, listener);
				}
			}
		}
		if let Some(Node { owner: Owner::Instance(instance), .. }) = self.tree.remove(id) {
			instance.core.node.set(None);
			instance.core.refs.borrow_mut().clear();
		}
		join(settles)
	}

	pub(crate) fn children_of(&self, id: NodeId) -> &[NodeId] {
		self.tree.get(id).map_or(&[], |node| &node.children)
	}

	/// Host nodes `id` contributes to its host parent, in order.
	pub(crate) fn top_handles(&self, id: NodeId, out: &mut Vec<H::Handle>) {
		let Some(node) = self.tree.get(id) else { return };
		match &node.owner {
			Owner::Host(handle) => out.push(handle.clone()),
			Owner::Portal(_) | Owner::Container(_) | Owner::Vacant => (),
			_ => {
				for &child in &node.children {
					self.top_handles(child, out);
				}
			}
		}
	}

	pub(crate) fn first_handle(&self, id: NodeId) -> Option<H::Handle> {
		let node = self.tree.get(id)?;
		match &node.owner {
			Owner::Host(handle) => Some(handle.clone()),
			Owner::Portal(_) | Owner::Container(_) | Owner::Vacant => None,
			_ => node.children.iter().find_map(|&child| self.first_handle(child)),
		}
	}

	fn last_handle(&self, id: NodeId) -> Option<H::Handle> {
		let node = self.tree.get(id)?;
		match &node.owner {
			Owner::Host(handle) => Some(handle.clone()),
			Owner::Portal(_) | Owner::Container(_) | Owner::Vacant => None,
			_ => node.children.iter().rev().find_map(|&child| self.last_handle(child)),
		}
	}

	/// The host node mounted right before new children of `parent` while hydrating.
	fn previous_handle(&self, parent: NodeId) -> Option<H::Handle> {
		let mut cursor = parent;
		loop {
			let node = self.tree.get(cursor)?;
			if let Some(handle) = node.children.iter().rev().find_map(|&child| self.last_handle(child)) {
				return Some(handle);
			}
			if node.parent_handle().is_some() {
				return None;
			}
			cursor = node.parent?;
		}
	}

	/// The nearest ancestor with its own host node, and that node.
	pub(crate) fn host_parent(&self, id: NodeId) -> Option<(NodeId, H::Handle)> {
		let mut cursor = self.tree.get(id)?.parent;
		while let Some(current) = cursor {
			let node = self.tree.get(current)?;
			if let Some(handle) = node.parent_handle() {
				return Some((current, handle.clone()));
			}
			cursor = node.parent;
		}
		None
	}

	/// The host node children of `id` are attached to.
	pub(crate) fn list_parent(&self, id: NodeId) -> Option<H::Handle> {
		match self.tree.get(id)?.parent_handle() {
			Some(handle) => Some(handle.clone()),
			None => self.host_parent(id).map(|(_, handle)| handle),
		}
	}

	/// The first host node after `id` under the same host parent.
	pub(crate) fn anchor_after(&self, id: NodeId) -> Option<H::Handle> {
		let parent_id = self.tree.get(id)?.parent?;
		let parent = self.tree.get(parent_id)?;
		let index = parent.children.iter().position(|&child| child == id)?;
		if let Some(handle) = parent.children[index + 1..].iter().find_map(|&sibling| self.first_handle(sibling)) {
			return Some(handle);
		}
		if parent.parent_handle().is_some() {
			None
		} else {
			self.anchor_after(parent_id)
		}
	}

	/// Where nodes appended to `id`'s child list go: before the returned handle, or at the end if `None`.
	pub(crate) fn end_of(&self, id: NodeId) -> Option<H::Handle> {
		if self.tree.get(id)?.parent_handle().is_some() {
			None
		} else {
			self.anchor_after(id)
		}
	}

	pub(crate) fn at_end(&self, id: NodeId) -> Option<At<H::Handle>> {
		Some(At {
			parent: self.list_parent(id)?,
			operation: Operation::before(self.end_of(id)),
		})
	}
}
