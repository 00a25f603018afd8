//! Error taxonomy and the process-wide diagnostic sink.

use crate::boundary::Site;
use core::{any::Any, cell::RefCell, fmt::Display};
use std::{borrow::Cow, rc::Rc};
use thiserror::Error;
use tracing::error;

/// What author code reports from a hook, or a panic caught at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
	#[error("{0}")]
	Thrown(String),
	#[error("panicked: {0}")]
	Panicked(String),
}

impl HookError {
	pub fn new(message: impl Display) -> Self {
		Self::Thrown(message.to_string())
	}

	pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
		let message = match payload.downcast::<String>() {
			Ok(message) => *message,
			Err(payload) => payload.downcast_ref::<&str>().map_or_else(|| "non-string panic payload".to_owned(), |message| (*message).to_owned()),
		};
		Self::Panicked(message)
	}
}

impl From<&str> for HookError {
	fn from(message: &str) -> Self {
		Self::Thrown(message.to_owned())
	}
}

impl From<String> for HookError {
	fn from(message: String) -> Self {
		Self::Thrown(message)
	}
}

/// A host adapter rejected an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
	#[error("invalid tag name {0:?}")]
	InvalidTag(String),
	#[error("node not found")]
	NotFound,
	#[error("{0}")]
	Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
	/// A malformed element description, replaced with an empty node.
	#[error("malformed element: {0}")]
	Construction(String),
	#[error("`{hook}` failed during {site}: {source}")]
	LifecycleHook {
		site: Site,
		hook: Cow<'static, str>,
		#[source]
		source: HookError,
	},
	#[error("could not realize <{tag}>: {source}")]
	HostRealization {
		tag: String,
		#[source]
		source: HostError,
	},
	/// An update was requested while its component was mid-pass. Never reported.
	#[error("update requested while a pass is in flight")]
	ReentrancyViolation,
}

/// Handed to [`Component::component_did_throw`](`crate::component::Component::component_did_throw`).
#[derive(Debug, Clone)]
pub struct Fault {
	pub site: Site,
	pub hook: Cow<'static, str>,
	/// Name of the component the failure originated in.
	pub component: Rc<str>,
	pub error: Error,
}

/// An error no boundary handled.
#[derive(Debug, Clone)]
pub struct Diagnostic {
	pub component: Rc<str>,
	pub hook: Cow<'static, str>,
	pub message: String,
	pub error: Error,
}

type Sink = Rc<dyn Fn(&Diagnostic)>;

thread_local! {
	static SINK: RefCell<Option<Sink>> = RefCell::new(None);
}

/// Installs `sink` for this thread, returning the previous one.
///
/// Diagnostics are always logged through [`tracing`] as well.
pub fn set_diagnostic_sink(sink: impl Fn(&Diagnostic) + 'static) -> Option<Rc<dyn Fn(&Diagnostic)>> {
	SINK.with(|current| current.borrow_mut().replace(Rc::new(sink)))
}

pub fn take_diagnostic_sink() -> Option<Rc<dyn Fn(&Diagnostic)>> {
	SINK.with(|current| current.borrow_mut().take())
}

pub(crate) fn report(component: Rc<str>, hook: Cow<'static, str>, error: Error) {
	let message = error.to_string();
	error!(component = %component, hook = %hook, "Error caught in component: {}", message);
	let sink = SINK.with(|current| current.borrow().clone());
	if let Some(sink) = sink {
		sink(&Diagnostic { component, hook, message, error });
	}
}
