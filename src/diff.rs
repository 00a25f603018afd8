//! Reconciling mounted nodes with new element descriptions.

use crate::{
	boundary::Site,
	component::Hooks,
	element::{Element, ElementType, Key, Kind},
	host::{Host, Operation},
	mount::{is_event, ref_of},
	renderer::{At, Engine},
	tree::{NodeId, Owner, Status},
	value::{Props, Value},
};
use hashbrown::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{error, instrument, trace, trace_span, warn};

impl<H: Host> Engine<H> {
	/// Brings the node at `id` in line with `element`. Returns the node now standing in its place.
	#[instrument(skip_all, fields(tag = element.tag()))]
	pub(crate) fn patch(&mut self, id: NodeId, element: &Element) -> NodeId {
		let Some(node) = self.tree.get(id) else { return id };
		if node.source.as_ref().map_or(false, |source| source.ptr_eq(element)) {
			trace!("Same description as last time. Skipping.");
			return id;
		}
		if node.ty != *element.ty() {
			return self.replace(id, element);
		}
		if self.depth >= self.options.depth_limit {
			error!("Depth limit reached");
			return id;
		}

		self.depth += 1;
		match element.kind() {
			Kind::Custom | Kind::Component => self.patch_component(id, Some(element), false),
			Kind::Text | Kind::Comment => self.patch_text(id, element),
			Kind::Empty => (),
			Kind::Node => {
				self.patch_props(id, element.props());
				self.patch_children(id, element.children(), element.is_keyed());
			}
			Kind::Fragment | Kind::Portal => self.patch_children(id, element.children(), element.is_keyed()),
			Kind::Promise => self.patch_promise(id, element),
		}
		self.depth -= 1;

		if let Some(node) = self.tree.get_mut(id) {
			node.key = element.key().cloned();
			node.source = Some(element.clone());
			if let Owner::Instance(_) = node.owner {
				node.props = element.props().clone();
			}
		}
		id
	}

	fn patch_text(&mut self, id: NodeId, element: &Element) {
		let Some(node) = self.tree.get_mut(id) else { return };
		let content = element.content();
		if node.content.as_deref() != content {
			node.content = content.map(Rc::from);
			if let Some(handle) = node.handle() {
				self.host.set_text(handle, content.unwrap_or_default());
			}
		}
	}

	fn patch_props(&mut self, id: NodeId, next: &Props) {
		let Some(node) = self.tree.get(id) else { return };
		let Some(handle) = node.handle().cloned() else { return };
		let previous = node.props.clone();
		let namespace = node.xmlns.clone();

		for (name, value) in previous.host_facing() {
			if next.get(name).map_or(true, Value::is_null) {
				match value {
					Value::Handler(_) if is_event(name) => self.unlisten(id, &handle, name),
					Value::Null => (),
					_ => self.host.remove_property(&handle, name, namespace.as_deref()),
				}
			}
		}

		for (name, value) in next.host_facing() {
			let before = previous.get(name);
			if before == Some(value) {
				continue;
			}
			match value {
				Value::Handler(handler) if is_event(name) => {
					if !self.swap_listener(id, name, handler) {
						self.listen(id, &handle, name, handler.clone());
					}
				}
				Value::Null => (),
				value => self.host.set_property(&handle, name, value, namespace.as_deref()),
			}
		}

		let (before, after) = (ref_of(&previous), ref_of(next));
		if before != after {
			if let Some(reference) = &before {
				self.detach_ref(id, reference);
			}
			if let Some(reference) = &after {
				self.attach_ref(id, reference, Rc::new(handle.clone()));
			}
		}

		if let Some(node) = self.tree.get_mut(id) {
			node.props = next.clone();
		}
	}

	fn current_props(&self, id: NodeId) -> Props {
		match self.tree.get(id) {
			Some(node) => node.instance().map_or_else(|| node.props.clone(), |instance| instance.props.clone()),
			None => Props::new(),
		}
	}

	fn commit_props(&mut self, id: NodeId, props: Props) {
		let Some(node) = self.tree.get_mut(id) else { return };
		match &mut node.owner {
			Owner::Instance(instance) => instance.props = props,
			_ => node.props = props,
		}
	}

	/// Runs one update pass of the composite at `id`, with new props from `next` if given.
	///
	/// Does nothing if a pass of this component is already running or it waits on a promise.
	/// `forced` passes skip `should_component_update`.
	pub(crate) fn patch_component(&mut self, id: NodeId, next: Option<&Element>, forced: bool) {
		let Some(node) = self.tree.get(id) else { return };
		let status = Rc::clone(&node.status);
		if status.get() != Status::Ready {
			return trace!("Component is mid-pass or waiting. Skipping.");
		}
		status.set(Status::Blocked);
		let hooks = self.hooks_of(id);
		let core = self.core_of(id);

		let next_props = next.map(|element| {
			let mut props = element.props().clone();
			match element.ty() {
				ElementType::Component(class) => {
					props.merge_defaults(class.defaults());
					self.check_rules(class.name(), class.rules(), &props);
				}
				ElementType::Custom(function) => {
					props.merge_defaults(function.defaults());
					self.check_rules(function.name(), function.rules(), &props);
				}
				_ => (),
			}
			props
		});

		if let Some(props) = &next_props {
			if hooks.contains(Hooks::WILL_RECEIVE_PROPS) {
				self.lifecycle(id, Site::DataReceive, "component_will_receive_props", |component, _, _| component.component_will_receive_props(props));
			}
		}

		let props = next_props.unwrap_or_else(|| self.current_props(id));
		let state = core.as_ref().map(|core| core.next_state()).unwrap_or_default();

		if !forced && hooks.contains(Hooks::SHOULD_UPDATE) {
			let update = self
				.dispatch(id, Site::StateTransition, "should_component_update", |component, _, _| component.should_component_update(&props, &state))
				.unwrap_or(true);
			if !update {
				trace!("Update declined");
				self.commit_props(id, props);
				if let Some(core) = &core {
					core.commit_pending();
				}
				status.set(Status::Ready);
				return self.settle(id);
			}
		}

		if hooks.contains(Hooks::WILL_UPDATE) {
			self.lifecycle(id, Site::StateTransition, "component_will_update", |component, _, _| component.component_will_update(&props, &state));
		}

		let previous_props = self.current_props(id);
		let previous_state = core.as_ref().map(|core| core.state.borrow().clone()).unwrap_or_default();
		self.commit_props(id, props);
		if let Some(core) = &core {
			core.commit_pending();
		}

		let rendered = self.render_node(id);
		match self.children_of(id).first().copied() {
			Some(child) => {
				self.patch(child, &rendered);
			}
			None => {
				if let Some(at) = self.at_end(id) {
					let child = self.mount(&rendered, &at, id, Some(id));
					if let Some(node) = self.tree.get_mut(id) {
						node.children.push(child);
					}
				}
			}
		}

		if hooks.contains(Hooks::DID_UPDATE) {
			self.lifecycle(id, Site::StateTransition, "component_did_update", move |component, _, _| {
				component.component_did_update(&previous_props, &previous_state)
			});
		}
		status.set(self.root_status(id));
		self.settle(id);
	}

	/// Unmounts the node at `id` and mounts `element` in its place.
	pub(crate) fn replace(&mut self, id: NodeId, element: &Element) -> NodeId {
		let span = trace_span!("Replacing", tag = element.tag());
		let _enter = span.enter();

		let Some(node) = self.tree.get(id) else { return id };
		let (parent, host) = (node.parent, node.host);
		let Some(parent) = parent else { return id };
		let Some((owner, parent_handle)) = self.host_parent(id) else {
			error!("Node to replace has no host parent");
			return id;
		};

		let in_place = node.handle().cloned().filter(|_| element.kind().is_primitive());
		let anchor = self.first_handle(id).or_else(|| self.anchor_after(id));
		let mut handles = Vec::new();
		self.top_handles(id, &mut handles);

		let settle = self.unmount(id);
		let new = match (in_place, settle) {
			(Some(old), None) => {
				let at = At {
					parent: parent_handle,
					operation: Operation::Replace(old),
				};
				self.mount(element, &at, parent, host)
			}
			(_, settle) => {
				let at = At {
					parent: parent_handle.clone(),
					operation: Operation::before(anchor),
				};
				let new = self.mount(element, &at, parent, host);
				let external = !matches!(self.tree.get(owner).map(|node| &node.owner), Some(Owner::Host(_)));
				self.take_out(owner, external, parent_handle, handles, settle);
				new
			}
		};

		if let Some(parent) = self.tree.get_mut(parent) {
			if let Some(slot) = parent.children.iter_mut().find(|child| **child == id) {
				*slot = new;
			}
		}
		new
	}

	/// Reconciles the child list of `id` with `new`.
	///
	/// Once a list has been keyed, it is diffed by key whenever all keys are present and unique.
	pub(crate) fn patch_children(&mut self, id: NodeId, new: &[Element], keyed: bool) {
		let Some(node) = self.tree.get_mut(id) else { return };
		node.keyed |= keyed;
		let keyed = node.keyed;
		let old = node.children.clone();
		let host = if node.is_composite() { Some(id) } else { node.host };

		match (old.is_empty(), new.is_empty()) {
			(true, true) => (),
			(true, false) => {
				if let Some(at) = self.at_end(id) {
					self.mount_children(id, new, &at, host);
				}
			}
			(false, true) => self.clear_children(id, &old),
			(false, false) if keyed && self.keys_usable(&old, new) => self.diff_keyed(id, &old, new, host),
			(false, false) => self.diff_unkeyed(id, new, host),
		}
	}

	fn keys_usable(&self, old: &[NodeId], new: &[Element]) -> bool {
		if !old.iter().all(|&child| self.tree.get(child).map_or(false, |node| node.key.is_some())) {
			return false;
		}
		let mut seen = HashSet::with_capacity(new.len());
		for element in new {
			match element.key() {
				Some(key) if seen.insert(key) => (),
				Some(key) => {
					warn!("Duplicate key {}. Diffing by position instead.", key);
					return false;
				}
				None => return false,
			}
		}
		true
	}

	/// Removes all children of `id`, with a single host call if `id` is an element and none of them asks to linger.
	fn clear_children(&mut self, id: NodeId, old: &[NodeId]) {
		let handle = self.tree.get(id).and_then(|node| match (&node.owner, &node.ty) {
			(Owner::Host(handle), ElementType::Node(_)) => Some(handle.clone()),
			_ => None,
		});
		if let Some(handle) = handle {
			let mut detached = Vec::with_capacity(old.len());
			for &child in old {
				let mut handles = Vec::new();
				self.top_handles(child, &mut handles);
				detached.push((handles, self.unmount(child)));
			}
			if detached.iter().all(|(_, settle)| settle.is_none()) {
				self.host.remove_children(&handle);
			} else {
				trace!("Children linger on unmount. Removing them one by one.");
				for (handles, settle) in detached {
					self.take_out(id, false, handle.clone(), handles, settle);
				}
			}
		} else {
			for &child in old {
				self.remove(child);
			}
		}
		if let Some(node) = self.tree.get_mut(id) {
			node.children.clear();
		}
	}

	fn diff_unkeyed(&mut self, id: NodeId, new: &[Element], host: Option<NodeId>) {
		let span = trace_span!("Diffing by position", new = new.len());
		let _enter = span.enter();

		let old_len = self.children_of(id).len();
		for (index, element) in new.iter().enumerate().take(old_len) {
			let Some(&child) = self.children_of(id).get(index) else { break };
			self.patch(child, element);
		}

		while self.children_of(id).len() > new.len() {
			let Some(child) = self.tree.get_mut(id).and_then(|node| node.children.pop()) else { break };
			self.remove(child);
		}

		if new.len() > old_len {
			if let Some(at) = self.at_end(id) {
				self.mount_children(id, &new[old_len..], &at, host);
			}
		}
	}

	/// Moves the host nodes of `id` before `anchor`, or to the end of `parent`.
	fn relocate(&mut self, id: NodeId, parent: &H::Handle, anchor: Option<&H::Handle>) {
		let mut handles = Vec::new();
		self.top_handles(id, &mut handles);
		for handle in &handles {
			match anchor {
				Some(anchor) => self.host.insert_before(parent, handle, anchor),
				None => self.host.append_child(parent, handle),
			}
		}
	}

	/// First host node among the settled slots from `from` onwards, or the end of the list.
	fn anchor_in(&self, slots: &[Option<NodeId>], from: usize, id: NodeId) -> Option<H::Handle> {
		slots.iter().skip(from).flatten().find_map(|&child| self.first_handle(child)).or_else(|| self.end_of(id))
	}

	#[allow(clippy::too_many_lines)]
	fn diff_keyed(&mut self, id: NodeId, old: &[NodeId], new: &[Element], host: Option<NodeId>) {
		let span = trace_span!("Diffing keyed", old = old.len(), new = new.len());
		let _enter = span.enter();

		let Some(parent) = self.list_parent(id) else {
			return error!("Keyed list has no host parent");
		};
		let old_keys: Vec<Option<Key>> = old.iter().map(|&child| self.tree.get(child).and_then(|node| node.key.clone())).collect();

		// Final node of each new position, and the positions whose node is reused and still needs patching.
		let mut slots: Vec<Option<NodeId>> = vec![None; new.len()];
		let mut reused = Vec::with_capacity(new.len());
		let (mut old_start, mut old_end) = (0, old.len());
		let (mut new_start, mut new_end) = (0, new.len());

		loop {
			while old_start < old_end && new_start < new_end && old_keys[old_start].as_ref() == new[new_start].key() {
				slots[new_start] = Some(old[old_start]);
				reused.push(new_start);
				old_start += 1;
				new_start += 1;
			}
			while old_start < old_end && new_start < new_end && old_keys[old_end - 1].as_ref() == new[new_end - 1].key() {
				slots[new_end - 1] = Some(old[old_end - 1]);
				reused.push(new_end - 1);
				old_end -= 1;
				new_end -= 1;
			}
			if old_start >= old_end || new_start >= new_end {
				break;
			}

			if old_keys[old_end - 1].as_ref() == new[new_start].key() {
				trace!("Moving old tail to the front");
				let moving = old[old_end - 1];
				let anchor = old[old_start..old_end - 1]
					.iter()
					.find_map(|&child| self.first_handle(child))
					.or_else(|| self.anchor_in(&slots, new_end, id));
				self.relocate(moving, &parent, anchor.as_ref());
				slots[new_start] = Some(moving);
				reused.push(new_start);
				old_end -= 1;
				new_start += 1;
			} else if old_keys[old_start].as_ref() == new[new_end - 1].key() {
				trace!("Moving old head to the back");
				let moving = old[old_start];
				let anchor = self.anchor_in(&slots, new_end, id);
				self.relocate(moving, &parent, anchor.as_ref());
				slots[new_end - 1] = Some(moving);
				reused.push(new_end - 1);
				old_start += 1;
				new_end -= 1;
			} else {
				break;
			}
		}

		if old_start >= old_end {
			let anchor = self.anchor_in(&slots, new_end, id);
			let at = At {
				parent: parent.clone(),
				operation: Operation::before(anchor),
			};
			for index in new_start..new_end {
				slots[index] = Some(self.mount(&new[index], &at, id, host));
			}
		} else if new_start >= new_end {
			for &child in &old[old_start..old_end] {
				self.remove(child);
			}
		} else {
			let old_map: HashMap<&Key, usize> = (old_start..old_end).filter_map(|j| old_keys[j].as_ref().map(|key| (key, j))).collect();
			let new_keys: HashSet<&Key> = new[new_start..new_end].iter().filter_map(Element::key).collect();
			let untouched = old_start == 0 && old_end == old.len() && new_start == 0 && new_end == new.len();

			if untouched && !new_keys.iter().any(|key| old_map.contains_key(key)) {
				trace!("No keys in common. Clearing and refilling.");
				self.clear_children(id, old);
				if let Some(at) = self.at_end(id) {
					for (index, element) in new.iter().enumerate() {
						slots[index] = Some(self.mount(element, &at, id, host));
					}
				}
			} else {
				// Nodes at the same offset into the unsettled ranges stay where they are.
				for index in new_start..new_end {
					let Some(&j) = new[index].key().and_then(|key| old_map.get(key)) else { continue };
					if j - old_start == index - new_start {
						slots[index] = Some(old[j]);
						reused.push(index);
					}
				}

				for index in new_start..new_end {
					if new[index].key().map_or(false, |key| old_map.contains_key(key)) {
						continue;
					}
					let anchor = self.anchor_in(&slots, index + 1, id);
					let at = At {
						parent: parent.clone(),
						operation: Operation::before(anchor),
					};
					slots[index] = Some(self.mount(&new[index], &at, id, host));
				}

				for j in old_start..old_end {
					if !old_keys[j].as_ref().map_or(false, |key| new_keys.contains(key)) {
						self.remove(old[j]);
					}
				}

				for index in (new_start..new_end).rev() {
					if slots[index].is_some() {
						continue;
					}
					let Some(&j) = new[index].key().and_then(|key| old_map.get(key)) else { continue };
					let anchor = self.anchor_in(&slots, index + 1, id);
					self.relocate(old[j], &parent, anchor.as_ref());
					slots[index] = Some(old[j]);
					reused.push(index);
				}
			}
		}

		if let Some(node) = self.tree.get_mut(id) {
			node.children = slots.into_iter().flatten().collect();
		}
		reused.sort_unstable();
		for index in reused {
			let Some(&child) = self.children_of(id).get(index) else { continue };
			self.patch(child, &new[index]);
		}
	}

	fn patch_promise(&mut self, id: NodeId, element: &Element) {
		let ElementType::Promise(suspense) = element.ty() else { return };
		let Some(node) = self.tree.get_mut(id) else { return };
		let Owner::Promise { ticket, resolved } = node.owner else { return };

		if ticket != suspense.ticket() {
			trace!(ticket = suspense.ticket(), "Awaiting a different promise");
			node.owner = Owner::Promise {
				ticket: suspense.ticket(),
				resolved: false,
			};
			node.status.set(Status::Pending);
			self.patch_children(id, element.children(), element.is_keyed());
			self.await_promise(id, suspense);
		} else if !resolved {
			self.patch_children(id, element.children(), element.is_keyed());
		}
	}
}
