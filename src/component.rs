//! Components: the [`Component`] hook surface, class and function descriptors, and the [`Updater`] handle.

use crate::{
	construct::Child,
	element::Element,
	error::{Fault, HookError},
	schedule::{Mailbox, Request},
	tree::{NodeId, Status},
	value::{Props, State, Value},
};
use core::{
	any::{Any, TypeId},
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
	future::Future,
	ops::BitOr,
};
use futures_util::{future::LocalBoxFuture, FutureExt};
use hashbrown::HashMap;
use std::rc::{Rc, Weak};
use tracing::trace;

pub type HookResult<T = ()> = Result<T, HookError>;

/// Resolves when a component is done with its host nodes after `component_will_unmount`.
pub type Settle = LocalBoxFuture<'static, ()>;

pub(crate) type Callback = Box<dyn FnOnce(&State) -> HookResult>;

/// Which optional hooks a class implements. Resolved once per class.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Hooks(u16);

impl Hooks {
	pub const NONE: Self = Self(0);
	pub const GET_INITIAL_STATE: Self = Self(1);
	pub const WILL_RECEIVE_PROPS: Self = Self(1 << 1);
	pub const SHOULD_UPDATE: Self = Self(1 << 2);
	pub const WILL_UPDATE: Self = Self(1 << 3);
	pub const DID_UPDATE: Self = Self(1 << 4);
	pub const WILL_MOUNT: Self = Self(1 << 5);
	pub const DID_MOUNT: Self = Self(1 << 6);
	pub const WILL_UNMOUNT: Self = Self(1 << 7);
	pub const DID_THROW: Self = Self(1 << 8);
	pub const ALL: Self = Self((1 << 9) - 1);

	#[must_use]
	pub const fn union(self, other: Self) -> Self {
		Self(self.0 | other.0)
	}

	#[must_use]
	pub const fn contains(self, other: Self) -> bool {
		self.0 & other.0 == other.0
	}
}

impl BitOr for Hooks {
	type Output = Self;

	fn bitor(self, rhs: Self) -> Self {
		self.union(rhs)
	}
}

impl Debug for Hooks {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		const NAMES: [&str; 9] = [
			"GET_INITIAL_STATE",
			"WILL_RECEIVE_PROPS",
			"SHOULD_UPDATE",
			"WILL_UPDATE",
			"DID_UPDATE",
			"WILL_MOUNT",
			"DID_MOUNT",
			"WILL_UNMOUNT",
			"DID_THROW",
		];
		f.debug_set().entries(NAMES.iter().enumerate().filter(|(i, _)| self.0 & (1 << i) != 0).map(|(_, name)| name)).finish()
	}
}

/// The lifecycle surface of a stateful component.
///
/// Only `render` is required. The other hooks are called only if the class lists them in [`Class::HOOKS`].
/// Returning state from a hook applies it as if [`Updater::set_state`] had been called.
pub trait Component: 'static {
	fn render(&mut self, props: &Props, state: &State) -> HookResult<Rendered>;

	fn get_initial_state(&mut self, _props: &Props) -> HookResult<Option<StateUpdate>> {
		Ok(None)
	}

	fn component_will_receive_props(&mut self, _next_props: &Props) -> HookResult<Option<StateUpdate>> {
		Ok(None)
	}

	fn should_component_update(&mut self, _next_props: &Props, _next_state: &State) -> HookResult<bool> {
		Ok(true)
	}

	fn component_will_update(&mut self, _next_props: &Props, _next_state: &State) -> HookResult<Option<StateUpdate>> {
		Ok(None)
	}

	fn component_did_update(&mut self, _previous_props: &Props, _previous_state: &State) -> HookResult<Option<StateUpdate>> {
		Ok(None)
	}

	/// Runs before any of the component's host nodes are attached.
	fn component_will_mount(&mut self) -> HookResult<Option<StateUpdate>> {
		Ok(None)
	}

	/// `node` is the first host handle of the rendered output, or `()` if there is none.
	fn component_did_mount(&mut self, _node: &dyn Any) -> HookResult<Option<StateUpdate>> {
		Ok(None)
	}

	/// A returned [`Settle`] keeps the host nodes attached until it resolves.
	fn component_will_unmount(&mut self, _node: &dyn Any) -> HookResult<Option<Settle>> {
		Ok(None)
	}

	/// Handles a failure in this component or one of its descendants. A returned element replaces the failed subtree.
	fn component_did_throw(&mut self, _fault: &Fault) -> HookResult<Option<Element>> {
		Ok(None)
	}
}

/// Static description of a stateful component type.
pub trait Class: Component + Sized {
	const NAME: &'static str;
	const HOOKS: Hooks = Hooks::NONE;

	fn construct(props: &Props, updater: Updater) -> Self;

	fn default_props() -> Props {
		Props::new()
	}

	fn prop_rules() -> Vec<PropRule> {
		Vec::new()
	}
}

struct ClassInner {
	type_id: TypeId,
	name: &'static str,
	hooks: Hooks,
	construct: fn(&Props, Updater) -> Box<dyn Component>,
	defaults: Props,
	rules: Vec<PropRule>,
}

/// Type identity and capability table of a [`Class`].
#[derive(Clone)]
pub struct ComponentClass(Rc<ClassInner>);

fn construct<T: Class>(props: &Props, updater: Updater) -> Box<dyn Component> {
	Box::new(T::construct(props, updater))
}

impl ComponentClass {
	#[must_use]
	pub fn of<T: Class>() -> Self {
		Self(Rc::new(ClassInner {
			type_id: TypeId::of::<T>(),
			name: T::NAME,
			hooks: T::HOOKS,
			construct: construct::<T>,
			defaults: T::default_props(),
			rules: T::prop_rules(),
		}))
	}

	#[must_use]
	pub fn name(&self) -> &str {
		self.0.name
	}

	#[must_use]
	pub fn hooks(&self) -> Hooks {
		self.0.hooks
	}

	pub(crate) fn construct(&self, props: &Props, updater: Updater) -> Box<dyn Component> {
		(self.0.construct)(props, updater)
	}

	pub(crate) fn defaults(&self) -> &Props {
		&self.0.defaults
	}

	pub(crate) fn rules(&self) -> &[PropRule] {
		&self.0.rules
	}
}

impl PartialEq for ComponentClass {
	fn eq(&self, other: &Self) -> bool {
		self.0.type_id == other.0.type_id
	}
}

type RenderFn = Rc<dyn Fn(&Props) -> HookResult<Rendered>>;

#[derive(Clone)]
struct FunctionInner {
	name: Rc<str>,
	identity: usize,
	render: RenderFn,
	defaults: Props,
	rules: Vec<PropRule>,
}

/// A stateless component: a render function of props.
///
/// Identity across renders is the function itself, so create each closure-based component once and reuse it.
#[derive(Clone)]
pub struct FunctionComponent(Rc<FunctionInner>);

impl FunctionComponent {
	pub fn new(name: &str, render: impl Fn(&Props) -> HookResult<Rendered> + 'static) -> Self {
		let render: RenderFn = Rc::new(render);
		let identity = Rc::as_ptr(&render).cast::<()>() as usize;
		Self::with_identity(name, identity, render)
	}

	/// Function pointers are identified by address, so separate calls produce equal components.
	#[must_use]
	pub fn from_fn(name: &str, render: fn(&Props) -> HookResult<Rendered>) -> Self {
		Self::with_identity(name, render as usize, Rc::new(render))
	}

	fn with_identity(name: &str, identity: usize, render: RenderFn) -> Self {
		Self(Rc::new(FunctionInner {
			name: name.into(),
			identity,
			render,
			defaults: Props::new(),
			rules: Vec::new(),
		}))
	}

	#[must_use]
	pub fn with_defaults(self, defaults: Props) -> Self {
		let mut inner = (*self.0).clone();
		inner.defaults = defaults;
		Self(Rc::new(inner))
	}

	#[must_use]
	pub fn with_rules(self, rules: Vec<PropRule>) -> Self {
		let mut inner = (*self.0).clone();
		inner.rules = rules;
		Self(Rc::new(inner))
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.0.name
	}

	pub(crate) fn call(&self, props: &Props) -> HookResult<Rendered> {
		(self.0.render)(props)
	}

	pub(crate) fn defaults(&self) -> &Props {
		&self.0.defaults
	}

	pub(crate) fn rules(&self) -> &[PropRule] {
		&self.0.rules
	}
}

impl PartialEq for FunctionComponent {
	fn eq(&self, other: &Self) -> bool {
		self.0.identity == other.0.identity
	}
}

type Check = Rc<dyn Fn(Option<&Value>) -> Result<(), String>>;

/// A validation rule for one prop. Violations are reported, never fatal.
#[derive(Clone)]
pub struct PropRule {
	name: Rc<str>,
	check: Check,
}

impl PropRule {
	pub fn new(name: &str, check: impl Fn(Option<&Value>) -> Result<(), String> + 'static) -> Self {
		Self { name: name.into(), check: Rc::new(check) }
	}

	#[must_use]
	pub fn required(name: &str) -> Self {
		Self::new(name, |value| match value {
			Some(value) if !value.is_null() => Ok(()),
			_ => Err("is required".to_owned()),
		})
	}

	pub(crate) fn check(&self, props: &Props) -> Result<(), String> {
		(self.check)(props.get(&self.name)).map_err(|message| format!("invalid prop `{}`: {}", self.name, message))
	}
}

/// A pending change to component state.
pub enum StateUpdate {
	/// Shallow-merged into the pending state.
	Merge(State),
	/// A transition computed from the current state. `None` leaves the state alone.
	With(Box<dyn FnOnce(&State) -> HookResult<Option<State>>>),
	/// Awaited, then merged.
	Deferred(LocalBoxFuture<'static, State>),
}

impl StateUpdate {
	pub fn with(transition: impl FnOnce(&State) -> HookResult<Option<State>> + 'static) -> Self {
		Self::With(Box::new(transition))
	}

	pub fn deferred(state: impl Future<Output = State> + 'static) -> Self {
		Self::Deferred(state.boxed_local())
	}
}

impl From<State> for StateUpdate {
	fn from(state: State) -> Self {
		Self::Merge(state)
	}
}

impl Debug for StateUpdate {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Merge(state) => f.debug_tuple("Merge").field(state).finish(),
			Self::With(_) => f.write_str("With(..)"),
			Self::Deferred(_) => f.write_str("Deferred(..)"),
		}
	}
}

/// One step of an incremental render.
pub enum RenderStep {
	Yield(Element),
	/// The coroutine finished. `None` keeps showing the last yielded element.
	Done(Option<Element>),
}

/// Resumable render state, advanced once per render pass.
pub trait Coroutine: 'static {
	fn advance(&mut self) -> HookResult<RenderStep>;
}

/// The output of a render hook.
pub enum Rendered {
	Child(Child),
	Coroutine(Box<dyn Coroutine>),
}

impl Rendered {
	pub fn coroutine(coroutine: impl Coroutine) -> Self {
		Self::Coroutine(Box::new(coroutine))
	}
}

impl<T: Into<Child>> From<T> for Rendered {
	fn from(child: T) -> Self {
		Self::Child(child.into())
	}
}

pub(crate) struct Resumable {
	coroutine: Box<dyn Coroutine>,
	previous: Option<Element>,
	done: bool,
}

impl Resumable {
	pub(crate) fn new(coroutine: Box<dyn Coroutine>) -> Self {
		Self { coroutine, previous: None, done: false }
	}

	pub(crate) fn resume(&mut self) -> HookResult<Element> {
		if !self.done {
			let element = match self.coroutine.advance()? {
				RenderStep::Yield(element) => element,
				RenderStep::Done(element) => {
					self.done = true;
					match element.or_else(|| self.previous.take()) {
						Some(element) => element,
						None => Element::empty(),
					}
				}
			};
			self.previous = Some(element);
		}
		Ok(self.previous.clone().unwrap_or_else(Element::empty))
	}
}

type HandlerFn = Rc<dyn Fn(&dyn Any) -> HookResult<Option<StateUpdate>>>;

/// An event handler prop. Returned state is applied to the owning component from the idle queue.
#[derive(Clone)]
pub struct EventHandler(HandlerFn);

impl EventHandler {
	pub fn new(handler: impl Fn(&dyn Any) -> HookResult<Option<StateUpdate>> + 'static) -> Self {
		Self(Rc::new(handler))
	}

	pub(crate) fn call(&self, event: &dyn Any) -> HookResult<Option<StateUpdate>> {
		(self.0)(event)
	}
}

impl PartialEq for EventHandler {
	fn eq(&self, other: &Self) -> bool {
		Rc::as_ptr(&self.0).cast::<()>() == Rc::as_ptr(&other.0).cast::<()>()
	}
}

type RefFn = Rc<dyn Fn(Option<&dyn Any>) -> HookResult>;

/// The `ref` prop: a name in the owning class component's refs, or a callback.
///
/// Host elements expose their handle; class components expose their [`Updater`].
#[derive(Clone)]
pub enum RefTarget {
	Named(Rc<str>),
	Callback(RefFn),
}

impl RefTarget {
	pub fn named(name: &str) -> Self {
		Self::Named(name.into())
	}

	/// `callback` receives the value on mount and `None` on unmount.
	pub fn callback(callback: impl Fn(Option<&dyn Any>) -> HookResult + 'static) -> Self {
		Self::Callback(Rc::new(callback))
	}
}

impl PartialEq for RefTarget {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Named(a), Self::Named(b)) => a == b,
			(Self::Callback(a), Self::Callback(b)) => Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>(),
			_ => false,
		}
	}
}

impl Debug for RefTarget {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
			Self::Callback(_) => f.write_str("Callback(..)"),
		}
	}
}

/// State shared between a mounted class component and its [`Updater`]s.
pub(crate) struct Core {
	pub(crate) name: Rc<str>,
	/// Cleared at unmount, which makes every later update a no-op.
	pub(crate) node: Cell<Option<NodeId>>,
	pub(crate) status: Rc<Cell<Status>>,
	pub(crate) state: RefCell<State>,
	pub(crate) pending: RefCell<Option<State>>,
	pub(crate) callbacks: RefCell<Vec<Callback>>,
	pub(crate) refs: RefCell<HashMap<Rc<str>, Rc<dyn Any>>>,
	pub(crate) mailbox: Weak<Mailbox>,
}

impl Core {
	pub(crate) fn new(name: Rc<str>, node: NodeId, status: Rc<Cell<Status>>, mailbox: Weak<Mailbox>) -> Self {
		Self {
			name,
			node: Cell::new(Some(node)),
			status,
			state: RefCell::new(State::new()),
			pending: RefCell::new(None),
			callbacks: RefCell::new(Vec::new()),
			refs: RefCell::new(HashMap::new()),
			mailbox,
		}
	}

	pub(crate) fn merge_pending(&self, state: &State) {
		self.pending.borrow_mut().get_or_insert_with(State::new).merge(state);
	}

	pub(crate) fn has_pending(&self) -> bool {
		self.pending.borrow().is_some()
	}

	/// Current state with pending changes applied.
	pub(crate) fn next_state(&self) -> State {
		let mut state = self.state.borrow().clone();
		if let Some(pending) = &*self.pending.borrow() {
			state.merge(pending);
		}
		state
	}

	pub(crate) fn commit_pending(&self) {
		let pending = self.pending.borrow_mut().take();
		if let Some(pending) = pending {
			self.state.borrow_mut().merge(&pending);
		}
	}
}

/// Handle a class component uses to change its state.
///
/// Updates after unmount are ignored.
#[derive(Clone)]
pub struct Updater(pub(crate) Rc<Core>);

impl Updater {
	pub fn set_state(&self, update: impl Into<StateUpdate>) {
		self.submit(update.into(), None);
	}

	/// Like [`set_state`](`Updater::set_state`), running `callback` after the pass that applies the change.
	pub fn set_state_then(&self, update: impl Into<StateUpdate>, callback: impl FnOnce(&State) -> HookResult + 'static) {
		self.submit(update.into(), Some(Box::new(callback)));
	}

	/// Re-renders the component. Ignored while the component is mid-pass or detached.
	pub fn force_update(&self) {
		self.force(None);
	}

	pub fn force_update_then(&self, callback: impl FnOnce(&State) -> HookResult + 'static) {
		self.force(Some(Box::new(callback)));
	}

	#[must_use]
	pub fn state(&self) -> State {
		self.0.state.borrow().clone()
	}

	#[must_use]
	pub fn is_mounted(&self) -> bool {
		self.0.node.get().is_some()
	}

	/// Looks up a named ref, downcast to `T`.
	#[must_use]
	pub fn get_ref<T: Clone + 'static>(&self, name: &str) -> Option<T> {
		self.0.refs.borrow().get(name)?.downcast_ref::<T>().cloned()
	}

	pub(crate) fn submit(&self, update: StateUpdate, callback: Option<Callback>) {
		let Some(mailbox) = self.0.mailbox.upgrade() else {
			return trace!("Dropping state update: renderer is gone");
		};
		if !self.is_mounted() {
			return trace!(component = %self.0.name, "Dropping state update for detached component");
		}
		match update {
			StateUpdate::Merge(state) => {
				self.0.merge_pending(&state);
				if let Some(callback) = callback {
					self.0.callbacks.borrow_mut().push(callback);
				}
				self.request(&mailbox, false);
			}
			StateUpdate::With(transition) => {
				mailbox.post(Request::Transition {
					core: Rc::clone(&self.0),
					transition,
					callback,
				});
				mailbox.flush();
			}
			StateUpdate::Deferred(state) => {
				let updater = self.clone();
				mailbox.scheduler().spawn(
					async move {
						let state = state.await;
						updater.submit(StateUpdate::Merge(state), callback);
					}
					.boxed_local(),
				);
			}
		}
	}

	fn force(&self, callback: Option<Callback>) {
		let Some(mailbox) = self.0.mailbox.upgrade() else { return };
		if !self.is_mounted() || self.0.status.get() != Status::Ready {
			return trace!(component = %self.0.name, "Ignoring forced update of a component that is detached or mid-pass");
		}
		if let Some(callback) = callback {
			self.0.callbacks.borrow_mut().push(callback);
		}
		self.request(&mailbox, true);
	}

	fn request(&self, mailbox: &Mailbox, forced: bool) {
		let Some(node) = self.0.node.get() else { return };
		if self.0.status.get() != Status::Ready {
			return trace!(component = %self.0.name, "Pass in flight, pending state applies when it completes");
		}
		mailbox.post(Request::Update { node, forced });
		mailbox.flush();
	}
}

impl Debug for Updater {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Updater").field("component", &self.0.name).field("mounted", &self.is_mounted()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Countdown(u8);

	impl Coroutine for Countdown {
		fn advance(&mut self) -> HookResult<RenderStep> {
			self.0 = self.0.saturating_sub(1);
			Ok(match self.0 {
				0 => RenderStep::Done(None),
				n => RenderStep::Yield(Element::text(n.to_string())),
			})
		}
	}

	#[test]
	fn finished_coroutines_keep_their_last_step() {
		let mut resumable = Resumable::new(Box::new(Countdown(3)));
		let steps: Vec<_> = (0..4).map(|_| resumable.resume().map(|element| element.content().map(ToOwned::to_owned))).collect();
		assert_eq!(steps, [Ok(Some("2".to_owned())), Ok(Some("1".to_owned())), Ok(Some("1".to_owned())), Ok(Some("1".to_owned()))]);
	}

	#[test]
	fn hooks() {
		const BOTH: Hooks = Hooks::DID_MOUNT.union(Hooks::WILL_UNMOUNT);
		assert!(BOTH.contains(Hooks::DID_MOUNT));
		assert!(!BOTH.contains(Hooks::DID_THROW));
		assert!(Hooks::ALL.contains(BOTH));
		assert_eq!(format!("{:?}", BOTH), r#"{"DID_MOUNT", "WILL_UNMOUNT"}"#);
	}
}
