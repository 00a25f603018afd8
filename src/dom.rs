//! [`Host`] for browser DOM trees.

use crate::{
	error::HostError,
	host::{Host, Listener},
	rc_hash_map::RcHashMap,
	value::Value,
};
use js_sys::Function;
use tracing::{error, instrument, trace, warn};
use wasm_bindgen::{closure::Closure, JsCast};

const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";

/// Mutates the DOM of one [***Document***](https://developer.mozilla.org/en-US/docs/Web/API/Document).
///
/// Event listeners are backed by [`Closure`]s owned by this instance. Dropping it makes remaining listeners
/// throw into JavaScript when their event fires.
#[derive(Debug)]
pub struct DomHost {
	document: web_sys::Document,
	handlers: RcHashMap<u64, u16, Closure<dyn Fn(web_sys::Event)>>,
}

impl DomHost {
	#[must_use]
	pub fn new(document: web_sys::Document) -> Self {
		Self {
			document,
			handlers: RcHashMap::default(),
		}
	}

	/// The host for the current window's document, if there is one.
	#[must_use]
	pub fn from_window() -> Option<Self> {
		web_sys::window()?.document().map(Self::new)
	}

	#[must_use]
	pub fn document(&self) -> &web_sys::Document {
		&self.document
	}
}

fn attribute_namespace<'a>(name: &str, namespace: Option<&'a str>) -> Option<&'a str> {
	match namespace {
		Some(_) if name.starts_with("xlink:") => Some(XLINK_NAMESPACE),
		_ => None,
	}
}

impl Host for DomHost {
	type Handle = web_sys::Node;

	#[instrument(skip(self))]
	fn create_node(&mut self, tag: &str, namespace: Option<&str>) -> Result<Self::Handle, HostError> {
		let element = match namespace {
			Some(namespace) => self.document.create_element_ns(Some(namespace), tag),
			None => self.document.create_element(tag),
		};
		element.map(Into::into).map_err(|error| {
			trace!("DOM rejected tag: {:?}", error);
			HostError::InvalidTag(tag.to_owned())
		})
	}

	fn create_text(&mut self, content: &str) -> Self::Handle {
		self.document.create_text_node(content).into()
	}

	fn create_comment(&mut self, content: &str) -> Self::Handle {
		self.document.create_comment(content).into()
	}

	fn set_property(&mut self, handle: &Self::Handle, name: &str, value: &Value, namespace: Option<&str>) {
		let Some(element) = handle.dyn_ref::<web_sys::Element>() else {
			return error!("Expected an element to set {:?} on, but found {:?}", name, handle);
		};
		let Some(text) = value.to_attribute() else {
			return self.remove_property(handle, name, namespace);
		};
		let result = match attribute_namespace(name, namespace) {
			Some(namespace) => element.set_attribute_ns(Some(namespace), name, &text),
			None => element.set_attribute(name, &text),
		};
		if let Err(error) = result {
			error!("Failed to set attribute {:?}: {:?}", name, error);
		}
	}

	fn remove_property(&mut self, handle: &Self::Handle, name: &str, namespace: Option<&str>) {
		let Some(element) = handle.dyn_ref::<web_sys::Element>() else {
			return error!("Expected an element to remove {:?} from, but found {:?}", name, handle);
		};
		let result = match attribute_namespace(name, namespace) {
			Some(namespace) => element.remove_attribute_ns(Some(namespace), name.split_once(':').map_or(name, |(_, local)| local)),
			None => element.remove_attribute(name),
		};
		if let Err(error) = result {
			error!("Failed to remove attribute {:?}: {:?}", name, error);
		}
	}

	fn set_text(&mut self, handle: &Self::Handle, content: &str) {
		match handle.dyn_ref::<web_sys::CharacterData>() {
			Some(data) => data.set_data(content),
			None => error!("Expected a text or comment node, but found {:?}", handle),
		}
	}

	fn append_child(&mut self, parent: &Self::Handle, child: &Self::Handle) {
		if let Err(error) = parent.append_child(child) {
			error!("Failed to append node: {:?}", error);
		}
	}

	fn insert_before(&mut self, parent: &Self::Handle, child: &Self::Handle, sibling: &Self::Handle) {
		if let Err(error) = parent.insert_before(child, Some(sibling)) {
			error!("Failed to insert node: {:?}", error);
		}
	}

	fn replace_child(&mut self, parent: &Self::Handle, new: &Self::Handle, old: &Self::Handle) {
		if let Err(error) = parent.replace_child(new, old) {
			error!("Failed to replace node: {:?}", error);
		}
	}

	fn remove_child(&mut self, parent: &Self::Handle, child: &Self::Handle) {
		if let Err(error) = parent.remove_child(child) {
			warn!("Failed to remove node, possibly because it was moved by other code: {:?}", error);
		}
	}

	fn remove_children(&mut self, parent: &Self::Handle) {
		parent.set_text_content(None);
	}

	fn add_event_listener(&mut self, handle: &Self::Handle, name: &str, listener: &Listener) {
		let closure = match self.handlers.acquire_with(listener.id(), |_| {
			let listener = listener.clone();
			Closure::wrap(Box::new(move |event: web_sys::Event| listener.dispatch(&event)) as Box<dyn Fn(web_sys::Event)>)
		}) {
			Ok(closure) => closure,
			Err(error) => return error!("Failed to register listener: {}", error),
		};
		if let Err(error) = handle.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref::<Function>()) {
			error!("Failed to add event listener {:?}: {:?}", name, error);
		}
	}

	fn remove_event_listener(&mut self, handle: &Self::Handle, name: &str, listener: &Listener) {
		match self.handlers.release(&listener.id()) {
			Ok(Some(closure)) => {
				if let Err(error) = handle.remove_event_listener_with_callback(name, closure.as_ref().unchecked_ref::<Function>()) {
					error!("Failed to remove event listener {:?}: {:?}", name, error);
				}
			}
			Ok(None) => warn!("Removed listener {:?} was never registered", listener),
			Err(error) => error!("Failed to unregister listener: {}", error),
		}
		let purged = self.handlers.purge_weak();
		trace!(purged, "Dropped unused handler closures");
	}

	fn query_existing(&mut self, parent: &Self::Handle, previous: Option<&Self::Handle>, next: Option<&Self::Handle>) -> Option<Self::Handle> {
		let candidate = match previous {
			Some(previous) => previous.next_sibling(),
			None => parent.first_child(),
		};
		candidate.filter(|candidate| Some(candidate) != next)
	}

	fn parent_node(&self, handle: &Self::Handle) -> Option<Self::Handle> {
		handle.parent_node()
	}

	fn default_target(&mut self) -> Option<Self::Handle> {
		self.document.body().map(Into::into)
	}
}
