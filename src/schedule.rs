//! Deferred work: futures, the idle queue, and requests waiting for the reconciler.

use crate::{
	boundary::Site,
	component::{Core, HookResult},
	element::Element,
	error::HookError,
	tree::NodeId,
	value::State,
};
use core::cell::RefCell;
use futures_executor::{LocalPool, LocalSpawner};
use futures_util::{future::LocalBoxFuture, task::LocalSpawnExt};
use std::{
	borrow::Cow,
	collections::VecDeque,
	rc::{Rc, Weak},
};
use tracing::error;

/// Runs the renderer's asynchronous work.
///
/// Which queues back these is up to the implementation.
pub trait Scheduler {
	/// Drives `task` to completion.
	fn spawn(&self, task: LocalBoxFuture<'static, ()>);
	/// Runs `task` later, once more urgent work is done.
	fn request_idle(&self, task: Box<dyn FnOnce()>);
}

/// A single-threaded [`Scheduler`] that runs only when asked to.
pub struct LocalScheduler {
	pool: RefCell<LocalPool>,
	spawner: LocalSpawner,
	idle: RefCell<VecDeque<Box<dyn FnOnce()>>>,
}

impl Default for LocalScheduler {
	fn default() -> Self {
		let pool = LocalPool::new();
		let spawner = pool.spawner();
		Self {
			pool: RefCell::new(pool),
			spawner,
			idle: RefCell::new(VecDeque::new()),
		}
	}
}

impl LocalScheduler {
	#[must_use]
	pub fn new() -> Rc<Self> {
		Rc::new(Self::default())
	}

	/// Polls spawned tasks and runs idle callbacks until neither can make progress.
	pub fn run_until_stalled(&self) {
		loop {
			self.pool.borrow_mut().run_until_stalled();
			let next = self.idle.borrow_mut().pop_front();
			match next {
				Some(task) => task(),
				None => break,
			}
		}
	}

	#[must_use]
	pub fn idle_len(&self) -> usize {
		self.idle.borrow().len()
	}
}

impl Scheduler for LocalScheduler {
	fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
		if let Err(error) = self.spawner.spawn_local(task) {
			error!("Failed to spawn task: {}", error);
		}
	}

	fn request_idle(&self, task: Box<dyn FnOnce()>) {
		self.idle.borrow_mut().push_back(task);
	}
}

/// Runs tasks on the browser's microtask queue.
#[cfg(feature = "dom")]
#[derive(Debug, Default, Clone, Copy)]
pub struct DomScheduler;

#[cfg(feature = "dom")]
impl Scheduler for DomScheduler {
	fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
		wasm_bindgen_futures::spawn_local(task);
	}

	fn request_idle(&self, task: Box<dyn FnOnce()>) {
		wasm_bindgen_futures::spawn_local(async move { task() });
	}
}

pub(crate) enum Request {
	Update {
		node: NodeId,
		forced: bool,
	},
	Transition {
		core: Rc<Core>,
		transition: Box<dyn FnOnce(&State) -> HookResult<Option<State>>>,
		callback: Option<Box<dyn FnOnce(&State) -> HookResult>>,
	},
	Resolve {
		node: NodeId,
		ticket: u64,
		result: HookResult<Element>,
	},
	Release {
		ticket: u64,
	},
	Fault {
		node: NodeId,
		site: Site,
		hook: Cow<'static, str>,
		error: HookError,
	},
}

/// Implemented by the reconciler so the mailbox can run it without knowing the host type.
pub(crate) trait Flush {
	/// Processes queued requests unless a pass is already running, in which case that pass picks them up.
	fn flush(&self);
}

pub(crate) struct Mailbox {
	queue: RefCell<VecDeque<Request>>,
	scheduler: Rc<dyn Scheduler>,
	engine: RefCell<Option<Weak<dyn Flush>>>,
}

impl Mailbox {
	pub(crate) fn new(scheduler: Rc<dyn Scheduler>) -> Self {
		Self {
			queue: RefCell::new(VecDeque::new()),
			scheduler,
			engine: RefCell::new(None),
		}
	}

	pub(crate) fn bind(&self, engine: Weak<dyn Flush>) {
		*self.engine.borrow_mut() = Some(engine);
	}

	pub(crate) fn scheduler(&self) -> &Rc<dyn Scheduler> {
		&self.scheduler
	}

	pub(crate) fn post(&self, request: Request) {
		self.queue.borrow_mut().push_back(request);
	}

	pub(crate) fn take(&self) -> VecDeque<Request> {
		self.queue.take()
	}

	pub(crate) fn flush(&self) {
		let engine = self.engine.borrow().as_ref().and_then(Weak::upgrade);
		if let Some(engine) = engine {
			engine.flush();
		}
	}
}
