mod common;

use cambium::{
	children, create_element, h, props, text, Class, Component, ComponentClass, Coroutine, Element, HookError, HookResult, Hooks, Props, RenderStep, Rendered, Settle, State,
	StateUpdate, Updater, Value,
};
use common::Harness;
use core::any::Any;
use futures_channel::oneshot;
use std::cell::RefCell;

thread_local! {
	static UPDATER: RefCell<Option<Updater>> = RefCell::new(None);
	static PENDING: RefCell<Option<oneshot::Receiver<Element>>> = RefCell::new(None);
	static FADE: RefCell<Option<oneshot::Receiver<()>>> = RefCell::new(None);
}

fn updater() -> Updater {
	UPDATER.with(|updater| updater.borrow().clone()).expect("a component was constructed")
}

fn remember(updater: Updater) {
	UPDATER.with(|current| *current.borrow_mut() = Some(updater));
}

/// A promise element showing "loading" until `receiver` yields.
fn promise(receiver: oneshot::Receiver<Element>) -> Element {
	Element::promise(async move { receiver.await.map_err(|_| HookError::new("sender dropped")) }, vec![text("loading")])
}

#[test]
fn promises_show_their_placeholder_until_resolved() {
	let harness = Harness::new();
	let (sender, receiver) = oneshot::channel();
	harness.render(h("div", None, children![promise(receiver), "tail"]));
	assert_eq!(harness.markup(), "<div>loadingtail</div>");

	assert!(sender.send(h("b", None, children!["done"])).is_ok());
	assert_eq!(harness.markup(), "<div>loadingtail</div>");
	harness.settle();
	assert_eq!(harness.markup(), "<div><b>done</b>tail</div>");
}

#[test]
fn rejected_promises_are_reported() {
	let harness = Harness::new();
	let (sender, receiver) = oneshot::channel();
	harness.render(h("div", None, children![promise(receiver)]));
	drop(sender);
	harness.settle();
	assert_eq!(harness.markup(), "<div></div>");
	let diagnostics = harness.diagnostics();
	assert_eq!(diagnostics.len(), 1);
	assert_eq!(diagnostics[0].hook, "promise");
}

#[test]
fn stale_resolutions_are_dropped() {
	let harness = Harness::new();
	let (first_sender, first) = oneshot::channel();
	let (second_sender, second) = oneshot::channel();
	harness.render(h("div", None, children![promise(first)]));
	harness.render(h("div", None, children![promise(second)]));

	assert!(first_sender.send(text("first")).is_ok());
	harness.settle();
	assert_eq!(harness.markup(), "<div>loading</div>");

	assert!(second_sender.send(text("second")).is_ok());
	harness.settle();
	assert_eq!(harness.markup(), "<div>second</div>");
}

#[test]
fn resolved_promises_keep_their_content_on_rerender() {
	let harness = Harness::new();
	let (sender, receiver) = oneshot::channel();
	let element = h("div", None, children![promise(receiver)]);
	harness.render(element.clone());
	assert!(sender.send(text("kept")).is_ok());
	harness.settle();
	harness.render(element);
	assert_eq!(harness.markup(), "<div>kept</div>");
}

/// Shows a promise until its state has a `text`.
struct Loader;

impl Class for Loader {
	const NAME: &'static str = "Loader";

	fn construct(_: &Props, updater: Updater) -> Self {
		remember(updater);
		Self
	}
}

impl Component for Loader {
	fn render(&mut self, _: &Props, state: &State) -> HookResult<Rendered> {
		if let Some(text) = state.get("text").and_then(Value::as_str) {
			return Ok(text.to_owned().into());
		}
		match PENDING.with(RefCell::take) {
			Some(receiver) => Ok(promise(receiver).into()),
			None => Err("nothing to wait on".into()),
		}
	}
}

#[test]
fn updates_wait_for_the_pending_root() {
	let harness = Harness::new();
	let (sender, receiver) = oneshot::channel();
	PENDING.with(|pending| *pending.borrow_mut() = Some(receiver));
	harness.render(create_element(ComponentClass::of::<Loader>(), None, vec![]));
	assert_eq!(harness.markup(), "loading");

	updater().set_state(props! { "text" => "early" });
	assert_eq!(harness.markup(), "loading");

	assert!(sender.send(text("late")).is_ok());
	harness.settle();
	assert_eq!(harness.markup(), "early");
	assert!(harness.diagnostics().is_empty());
}

struct Plain;

impl Class for Plain {
	const NAME: &'static str = "Plain";

	fn construct(_: &Props, updater: Updater) -> Self {
		remember(updater);
		Self
	}
}

impl Component for Plain {
	fn render(&mut self, _: &Props, state: &State) -> HookResult<Rendered> {
		Ok(state.get("value").and_then(Value::as_int).unwrap_or_default().into())
	}
}

#[test]
fn deferred_state_applies_once_resolved() {
	let harness = Harness::new();
	harness.render(create_element(ComponentClass::of::<Plain>(), None, vec![]));
	let (sender, receiver) = oneshot::channel::<State>();
	updater().set_state_then(StateUpdate::deferred(async move { receiver.await.unwrap_or_default() }), |state| {
		assert_eq!(state.get("value"), Some(&Value::Int(7)));
		Ok(())
	});
	harness.settle();
	assert_eq!(harness.markup(), "0");

	assert!(sender.send(props! { "value" => 7 }).is_ok());
	harness.settle();
	assert_eq!(harness.markup(), "7");
	assert!(harness.diagnostics().is_empty());
}

struct Steps(u32);

impl Coroutine for Steps {
	fn advance(&mut self) -> HookResult<RenderStep> {
		let step = self.0;
		self.0 += 1;
		Ok(match step {
			0 | 1 => RenderStep::Yield(text(format!("step {}", step))),
			_ => RenderStep::Done(Some(text("done"))),
		})
	}
}

struct Stepper;

impl Class for Stepper {
	const NAME: &'static str = "Stepper";

	fn construct(_: &Props, updater: Updater) -> Self {
		remember(updater);
		Self
	}
}

impl Component for Stepper {
	fn render(&mut self, _: &Props, _: &State) -> HookResult<Rendered> {
		Ok(Rendered::coroutine(Steps(0)))
	}
}

#[test]
fn coroutines_advance_once_per_pass() {
	let harness = Harness::new();
	harness.render(create_element(ComponentClass::of::<Stepper>(), None, vec![]));
	let mut seen = vec![harness.markup()];
	for _ in 0..3 {
		updater().force_update();
		seen.push(harness.markup());
	}
	assert_eq!(seen, ["step 0", "step 1", "done", "done"]);
}

struct Lingering;

impl Class for Lingering {
	const NAME: &'static str = "Lingering";
	const HOOKS: Hooks = Hooks::WILL_UNMOUNT;

	fn construct(_: &Props, _: Updater) -> Self {
		Self
	}
}

impl Component for Lingering {
	fn render(&mut self, _: &Props, _: &State) -> HookResult<Rendered> {
		Ok(h("li", None, children!["fading"]).into())
	}

	fn component_will_unmount(&mut self, _: &dyn Any) -> HookResult<Option<Settle>> {
		let receiver = FADE.with(RefCell::take);
		Ok(receiver.map(|receiver| -> Settle {
			Box::pin(async move {
				let _ = receiver.await;
			})
		}))
	}
}

#[test]
fn unmount_can_be_deferred() {
	let harness = Harness::new();
	let (sender, receiver) = oneshot::channel();
	FADE.with(|fade| *fade.borrow_mut() = Some(receiver));
	let lingering = create_element(ComponentClass::of::<Lingering>(), props! { "key" => "a" }, vec![]);
	harness.render(h("ul", None, children![lingering, h("li", props! { "key" => "b" }, children!["b"])]));
	harness.render(h("ul", None, children![h("li", props! { "key" => "b" }, children!["b"])]));

	harness.settle();
	assert_eq!(harness.markup(), "<ul><li>fading</li><li>b</li></ul>");

	assert!(sender.send(()).is_ok());
	harness.settle();
	assert_eq!(harness.markup(), "<ul><li>b</li></ul>");
}

#[test]
fn deferred_unmount_of_a_whole_root() {
	let harness = Harness::new();
	let (sender, receiver) = oneshot::channel();
	FADE.with(|fade| *fade.borrow_mut() = Some(receiver));
	harness.render(create_element(ComponentClass::of::<Lingering>(), None, vec![]));
	assert!(harness.renderer.unmount(&harness.root));
	assert_eq!(harness.markup(), "<li>fading</li>");

	assert!(sender.send(()).is_ok());
	harness.settle();
	assert_eq!(harness.markup(), "");
}

fn lingering(key: &str) -> Element {
	create_element(ComponentClass::of::<Lingering>(), props! { "key" => key }, vec![])
}

/// Makes the next `Lingering` to unmount wait for the returned sender.
fn fade() -> oneshot::Sender<()> {
	let (sender, receiver) = oneshot::channel();
	FADE.with(|fade| *fade.borrow_mut() = Some(receiver));
	sender
}

#[test]
fn emptied_lists_keep_lingering_children() {
	let harness = Harness::new();
	let sender = fade();
	harness.render(h("ul", None, children![lingering("a")]));
	harness.render(h("ul", None, children![]));

	harness.settle();
	assert_eq!(harness.markup(), "<ul><li>fading</li></ul>");

	assert!(sender.send(()).is_ok());
	harness.settle();
	assert_eq!(harness.markup(), "<ul></ul>");
}

#[test]
fn nested_lingering_keeps_its_ancestors() {
	let harness = Harness::new();
	let sender = fade();
	harness.render(h("ul", None, children![h("div", None, children![lingering("a")])]));
	harness.render(h("ul", None, children![]));

	harness.settle();
	assert_eq!(harness.markup(), "<ul><div><li>fading</li></div></ul>");

	assert!(sender.send(()).is_ok());
	harness.settle();
	assert_eq!(harness.markup(), "<ul></ul>");
}

#[test]
fn disjoint_keys_keep_lingering_children() {
	let harness = Harness::new();
	let sender = fade();
	harness.render(h("ul", None, children![lingering("a")]));
	harness.render(h("ul", None, children![h("li", props! { "key" => "x" }, children!["x"])]));

	harness.settle();
	assert_eq!(harness.markup(), "<ul><li>fading</li><li>x</li></ul>");

	assert!(sender.send(()).is_ok());
	harness.settle();
	assert_eq!(harness.markup(), "<ul><li>x</li></ul>");
}

#[test]
fn replaced_subtrees_linger_behind_their_replacement() {
	let harness = Harness::new();
	let sender = fade();
	harness.render(h("section", None, children![h("div", None, children![lingering("a")]), "tail"]));
	harness.render(h("section", None, children![h("p", None, children!["new"]), "tail"]));

	harness.settle();
	assert_eq!(harness.markup(), "<section><p>new</p><div><li>fading</li></div>tail</section>");

	assert!(sender.send(()).is_ok());
	harness.settle();
	assert_eq!(harness.markup(), "<section><p>new</p>tail</section>");
}

#[test]
fn unmounted_promises_resolve_silently() {
	let harness = Harness::new();
	let (sender, receiver) = oneshot::channel();
	harness.render(h("div", None, children![promise(receiver)]));
	harness.render(h("div", None, children!["gone"]));
	harness.take_ops();

	assert!(sender.send(text("late")).is_ok());
	harness.settle();
	assert!(harness.take_ops().is_empty());
	assert_eq!(harness.markup(), "<div>gone</div>");
}

struct Prefetched;

impl Class for Prefetched {
	const NAME: &'static str = "Prefetched";
	const HOOKS: Hooks = Hooks::GET_INITIAL_STATE;

	fn construct(_: &Props, _: Updater) -> Self {
		Self
	}
}

impl Component for Prefetched {
	fn render(&mut self, _: &Props, state: &State) -> HookResult<Rendered> {
		Ok(state.get("value").and_then(Value::as_int).unwrap_or_default().into())
	}

	fn get_initial_state(&mut self, _: &Props) -> HookResult<Option<StateUpdate>> {
		Ok(Some(StateUpdate::deferred(async { props! { "value" => 5 } })))
	}
}

#[test]
fn initial_state_may_arrive_later() {
	let harness = Harness::new();
	harness.render(create_element(ComponentClass::of::<Prefetched>(), None, vec![]));
	assert_eq!(harness.markup(), "0");
	harness.settle();
	assert_eq!(harness.markup(), "5");
}
