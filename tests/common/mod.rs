#![allow(dead_code)]

use cambium::{
	memory::{MemoryHandle, MemoryHost, Op},
	set_diagnostic_sink, Child, Diagnostic, LocalScheduler, Mode, Options, Renderer,
};
use std::{cell::RefCell, rc::Rc};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_test_writer().try_init();
}

/// A renderer over a [`MemoryHost`], with a detached root element and captured diagnostics.
pub struct Harness {
	pub host: MemoryHost,
	pub root: MemoryHandle,
	pub scheduler: Rc<LocalScheduler>,
	pub renderer: Renderer<MemoryHost>,
	diagnostics: Rc<RefCell<Vec<Diagnostic>>>,
}

impl Harness {
	pub fn new() -> Self {
		Self::with_options(Options::default())
	}

	pub fn with_options(options: Options) -> Self {
		init_tracing();
		let host = MemoryHost::new();
		let root = host.root();
		let scheduler = LocalScheduler::new();
		let renderer = Renderer::with_options(host.clone(), scheduler.clone(), options);

		let diagnostics = Rc::new(RefCell::new(Vec::new()));
		let sink = Rc::clone(&diagnostics);
		set_diagnostic_sink(move |diagnostic| sink.borrow_mut().push(diagnostic.clone()));

		Self {
			host,
			root,
			scheduler,
			renderer,
			diagnostics,
		}
	}

	pub fn render(&self, element: impl Into<Child>) {
		self.renderer.render(element, &self.root, Mode::Append);
	}

	pub fn markup(&self) -> String {
		self.host.inner_markup(self.root)
	}

	/// Runs spawned futures and idle callbacks.
	pub fn settle(&self) {
		self.scheduler.run_until_stalled();
	}

	pub fn diagnostics(&self) -> Vec<Diagnostic> {
		self.diagnostics.borrow().clone()
	}

	/// The node at `path` of child indices below the root.
	pub fn node(&self, path: &[usize]) -> MemoryHandle {
		path.iter().fold(self.root, |handle, &index| self.host.children(handle)[index])
	}

	pub fn take_ops(&self) -> Vec<Op> {
		self.host.take_ops()
	}
}

pub fn count(ops: &[Op], predicate: impl Fn(&Op) -> bool) -> usize {
	ops.iter().filter(|op| predicate(op)).count()
}

pub fn creates(ops: &[Op]) -> usize {
	count(ops, |op| matches!(op, Op::CreateNode(_) | Op::CreateText | Op::CreateComment))
}

pub fn moves(ops: &[Op]) -> usize {
	count(ops, Op::is_move)
}

pub fn removes(ops: &[Op]) -> usize {
	count(ops, |op| matches!(op, Op::Remove | Op::RemoveChildren))
}
