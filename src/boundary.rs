//! The single funnel through which author code is called.

use crate::{
	component::{Core, HookResult, StateUpdate, Updater},
	error::HookError,
};
use core::fmt::{self, Display, Formatter};
use std::{
	panic::{self, AssertUnwindSafe},
	rc::Rc,
};
use tracing::trace;

/// Call-site category of a hook invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Site {
	DataReceive,
	StateTransition,
	Render,
	Mount,
	Callback,
	Event,
}

impl Site {
	/// Sites whose failure still has to produce a tree.
	#[must_use]
	pub fn yields_tree(self) -> bool {
		matches!(self, Self::Render | Self::Event)
	}

	/// Sites whose returned state is applied from the idle queue instead of inline.
	#[must_use]
	pub fn defers_state(self) -> bool {
		matches!(self, Self::Event)
	}
}

impl Display for Site {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::DataReceive => "data receive",
			Self::StateTransition => "state transition",
			Self::Render => "render",
			Self::Mount => "mount",
			Self::Callback => "callback",
			Self::Event => "event",
		})
	}
}

/// Runs `call`, turning panics into [`HookError::Panicked`].
pub(crate) fn invoke<R>(call: impl FnOnce() -> HookResult<R>) -> HookResult<R> {
	panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| Err(HookError::from_panic(payload)))
}

/// Applies state returned from a hook as if the component had called `set_state` itself.
pub(crate) fn apply_returned(core: &Rc<Core>, site: Site, update: StateUpdate) {
	let updater = Updater(Rc::clone(core));
	if site.defers_state() {
		match core.mailbox.upgrade() {
			Some(mailbox) => mailbox.scheduler().request_idle(Box::new(move || updater.set_state(update))),
			None => trace!("Dropping returned state: renderer is gone"),
		}
	} else {
		updater.submit(update, None);
	}
}
