//! Routing failures to the nearest error boundary.

use crate::{
	boundary::{self, Site},
	component::Hooks,
	element::Element,
	error::{report, Error, Fault, HookError},
	host::Host,
	renderer::Engine,
	tree::{Node, NodeId, Owner},
};
use std::{borrow::Cow, rc::Rc};
use tracing::{debug, debug_span, trace};

impl<H: Host> Engine<H> {
	/// Offers `error` to the nearest class component at or above `scope` that handles failures.
	///
	/// Returns the replacement the handler rendered, if any. Unhandled errors are reported.
	pub(crate) fn raise(&mut self, site: Site, scope: Option<NodeId>, component: Rc<str>, hook: Cow<'static, str>, error: Error) -> Option<Element> {
		let span = debug_span!("Raising", %site, %hook, %component);
		let _enter = span.enter();

		let mut cursor = scope;
		while let Some(id) = cursor {
			let Some(node) = self.tree.get(id) else { break };
			cursor = node.host;
			if !node.instance().map_or(false, |instance| instance.class.hooks().contains(Hooks::DID_THROW)) {
				continue;
			}

			let fault = Fault {
				site,
				hook: hook.clone(),
				component: Rc::clone(&component),
				error: error.clone(),
			};
			let handled = {
				let Some(Node { owner: Owner::Instance(instance), .. }) = self.tree.get_mut(id) else { break };
				let handler = &mut instance.component;
				boundary::invoke(|| handler.component_did_throw(&fault))
			};
			return match handled {
				Ok(replacement) => {
					debug!(boundary = %self.tree.get(id).map_or_else(|| "#detached".into(), Node::name), "Error handled");
					replacement
				}
				Err(failure) => {
					let boundary = self.tree.get(id).map_or_else(|| "#detached".into(), Node::name);
					report(
						boundary,
						"component_did_throw".into(),
						Error::LifecycleHook {
							site,
							hook: "component_did_throw".into(),
							source: failure,
						},
					);
					report(component, hook, error);
					None
				}
			};
		}

		report(component, hook, error);
		None
	}

	/// Raises a hook failure that happened at the node `id`.
	pub(crate) fn fault(&mut self, site: Site, id: NodeId, hook: Cow<'static, str>, error: HookError) -> Option<Element> {
		let (scope, component) = match self.tree.get(id) {
			Some(node) if node.is_composite() => (Some(id), node.name()),
			Some(node) => (node.host, node.host.and_then(|host| self.tree.get(host)).map_or_else(|| node.name(), Node::name)),
			None => (None, "#detached".into()),
		};
		self.raise(site, scope, component, hook.clone(), Error::LifecycleHook { site, hook, source: error })
	}

	/// Handles a failure reported by an event listener after the fact.
	///
	/// A handler's replacement takes the place of what the handling component rendered.
	pub(crate) fn event_fault(&mut self, id: NodeId, site: Site, hook: Cow<'static, str>, error: HookError) {
		if !self.tree.contains_key(id) {
			return trace!("Dropping failure of a detached listener");
		}
		let scope = self.tree.get(id).and_then(|node| node.host);
		let Some(replacement) = self.fault(site, id, hook, error) else { return };
		let Some(boundary) = self.handling_boundary(scope) else { return };
		if let Some(&child) = self.children_of(boundary).first() {
			self.replace(child, &replacement);
		}
	}

	fn handling_boundary(&self, scope: Option<NodeId>) -> Option<NodeId> {
		let mut cursor = scope;
		while let Some(id) = cursor {
			let node = self.tree.get(id)?;
			if node.instance().map_or(false, |instance| instance.class.hooks().contains(Hooks::DID_THROW)) {
				return Some(id);
			}
			cursor = node.host;
		}
		None
	}
}
