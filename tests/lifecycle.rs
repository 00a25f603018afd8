mod common;

use cambium::{
	children, create_element, h, memory::MemoryHandle, props, Class, Component, ComponentClass, Error, FunctionComponent, HookResult, Hooks, PropRule, Props, RefTarget, Rendered,
	State, StateUpdate, Updater, Value,
};
use common::Harness;
use core::any::Any;
use std::{cell::RefCell, rc::Rc};

thread_local! {
	static LOG: RefCell<Vec<String>> = RefCell::new(Vec::new());
	static UPDATER: RefCell<Option<Updater>> = RefCell::new(None);
}

fn log(entry: impl Into<String>) {
	LOG.with(|log| log.borrow_mut().push(entry.into()));
}

fn take_log() -> Vec<String> {
	LOG.with(RefCell::take)
}

fn updater() -> Updater {
	UPDATER.with(|updater| updater.borrow().clone()).expect("a counter was constructed")
}

fn count(state: &State) -> i64 {
	state.get("count").and_then(Value::as_int).unwrap_or_default()
}

struct Counter;

impl Class for Counter {
	const NAME: &'static str = "Counter";
	const HOOKS: Hooks = Hooks::GET_INITIAL_STATE
		.union(Hooks::WILL_RECEIVE_PROPS)
		.union(Hooks::SHOULD_UPDATE)
		.union(Hooks::WILL_UPDATE)
		.union(Hooks::DID_UPDATE)
		.union(Hooks::WILL_MOUNT)
		.union(Hooks::DID_MOUNT)
		.union(Hooks::WILL_UNMOUNT);

	fn construct(_: &Props, updater: Updater) -> Self {
		log("construct");
		UPDATER.with(|current| *current.borrow_mut() = Some(updater));
		Self
	}

	fn default_props() -> Props {
		props! { "label" => "count" }
	}
}

impl Component for Counter {
	fn render(&mut self, props: &Props, state: &State) -> HookResult<Rendered> {
		log("render");
		let label = props.get("label").and_then(Value::as_str).unwrap_or_default();
		Ok(h("p", None, children![format!("{}: {}", label, count(state))]).into())
	}

	fn get_initial_state(&mut self, _: &Props) -> HookResult<Option<StateUpdate>> {
		log("get_initial_state");
		Ok(Some(props! { "count" => 0, "allow" => true }.into()))
	}

	fn component_will_receive_props(&mut self, next_props: &Props) -> HookResult<Option<StateUpdate>> {
		log(format!("component_will_receive_props {:?}", next_props.get("label").and_then(Value::as_str).unwrap_or_default()));
		Ok(None)
	}

	fn should_component_update(&mut self, _: &Props, next_state: &State) -> HookResult<bool> {
		log("should_component_update");
		Ok(next_state.get("allow").and_then(Value::as_bool).unwrap_or(true))
	}

	fn component_will_update(&mut self, _: &Props, next_state: &State) -> HookResult<Option<StateUpdate>> {
		log(format!("component_will_update {}", count(next_state)));
		Ok(None)
	}

	fn component_did_update(&mut self, _: &Props, previous_state: &State) -> HookResult<Option<StateUpdate>> {
		log(format!("component_did_update {}", count(previous_state)));
		Ok(None)
	}

	fn component_will_mount(&mut self) -> HookResult<Option<StateUpdate>> {
		log("component_will_mount");
		Ok(None)
	}

	fn component_did_mount(&mut self, node: &dyn Any) -> HookResult<Option<StateUpdate>> {
		log(format!("component_did_mount {}", node.is::<MemoryHandle>()));
		Ok(None)
	}

	fn component_will_unmount(&mut self, _: &dyn Any) -> HookResult<Option<cambium::Settle>> {
		log("component_will_unmount");
		Ok(None)
	}
}

fn counter(props: impl Into<Option<Props>>) -> cambium::Element {
	create_element(ComponentClass::of::<Counter>(), props, vec![])
}

fn mounted() -> Harness {
	let harness = Harness::new();
	harness.render(counter(None));
	take_log();
	harness
}

#[test]
fn mount_order() {
	let harness = Harness::new();
	take_log();
	harness.render(counter(None));
	assert_eq!(take_log(), ["construct", "get_initial_state", "render", "component_will_mount", "component_did_mount true"]);
	assert_eq!(harness.markup(), "<p>count: 0</p>");
	assert!(updater().is_mounted());
}

#[test]
fn state_update_order() {
	let harness = mounted();
	updater().set_state(props! { "count" => 1 });
	assert_eq!(take_log(), ["should_component_update", "component_will_update 1", "render", "component_did_update 0"]);
	assert_eq!(harness.markup(), "<p>count: 1</p>");
}

#[test]
fn state_merges_shallowly() {
	let _harness = mounted();
	updater().set_state(props! { "count" => 3 });
	let state = updater().state();
	assert_eq!(state.get("count"), Some(&Value::Int(3)));
	assert_eq!(state.get("allow"), Some(&Value::Bool(true)));
}

#[test]
fn props_update_order() {
	let harness = mounted();
	harness.render(counter(props! { "label" => "n" }));
	assert_eq!(
		take_log(),
		["component_will_receive_props \"n\"", "should_component_update", "component_will_update 0", "render", "component_did_update 0"]
	);
	assert_eq!(harness.markup(), "<p>n: 0</p>");
}

#[test]
fn declined_update_still_commits_state() {
	let harness = mounted();
	updater().set_state(props! { "allow" => false, "count" => 5 });
	assert_eq!(take_log(), ["should_component_update"]);
	assert_eq!(harness.markup(), "<p>count: 0</p>");
	assert_eq!(count(&updater().state()), 5);
}

#[test]
fn forced_update_skips_should_update() {
	let harness = mounted();
	updater().set_state(props! { "allow" => false, "count" => 5 });
	take_log();
	updater().force_update();
	assert_eq!(take_log(), ["component_will_update 5", "render", "component_did_update 5"]);
	assert_eq!(harness.markup(), "<p>count: 5</p>");
}

#[test]
fn callbacks_run_after_the_pass() {
	let harness = mounted();
	updater().set_state_then(props! { "count" => 2 }, |state| {
		log(format!("callback {}", count(state)));
		Ok(())
	});
	assert_eq!(take_log().last().map(String::as_str), Some("callback 2"));
	assert_eq!(harness.markup(), "<p>count: 2</p>");

	updater().force_update_then(|_| {
		log("forced callback");
		Ok(())
	});
	assert_eq!(take_log().last().map(String::as_str), Some("forced callback"));
}

#[test]
fn transitions_see_the_latest_state() {
	let harness = mounted();
	let increment = || StateUpdate::with(|state| Ok(Some(props! { "count" => count(state) + 1 })));
	updater().set_state(increment());
	updater().set_state(increment());
	assert_eq!(harness.markup(), "<p>count: 2</p>");

	updater().set_state(StateUpdate::with(|_| Ok(None)));
	assert_eq!(harness.markup(), "<p>count: 2</p>");
}

#[test]
fn unmount_detaches_the_updater() {
	let harness = mounted();
	let updater = updater();
	harness.render(h("div", None, vec![]));
	assert_eq!(take_log(), ["component_will_unmount"]);
	assert!(!updater.is_mounted());
	updater.set_state(props! { "count" => 9 });
	updater.force_update();
	assert!(take_log().is_empty());
	assert_eq!(harness.markup(), "<div></div>");
}

struct Eager {
	updater: Updater,
	via_return: bool,
}

impl Class for Eager {
	const NAME: &'static str = "Eager";
	const HOOKS: Hooks = Hooks::DID_MOUNT;

	fn construct(props: &Props, updater: Updater) -> Self {
		Self {
			updater,
			via_return: props.get("return").and_then(Value::as_bool).unwrap_or_default(),
		}
	}
}

impl Component for Eager {
	fn render(&mut self, _: &Props, state: &State) -> HookResult<Rendered> {
		let ready = state.get("ready").and_then(Value::as_bool).unwrap_or_default();
		Ok((if ready { "ready" } else { "loading" }).into())
	}

	fn component_did_mount(&mut self, _: &dyn Any) -> HookResult<Option<StateUpdate>> {
		if self.via_return {
			Ok(Some(props! { "ready" => true }.into()))
		} else {
			self.updater.set_state(props! { "ready" => true });
			Ok(None)
		}
	}
}

#[test]
fn state_set_in_did_mount_renders_before_returning() {
	for via_return in [false, true] {
		let harness = Harness::new();
		harness.render(create_element(ComponentClass::of::<Eager>(), props! { "return" => via_return }, vec![]));
		assert_eq!(harness.markup(), "ready");
	}
}

fn greet(props: &Props) -> HookResult<Rendered> {
	let name = props.get("name").and_then(Value::as_str).unwrap_or_default();
	Ok(h("span", None, children![format!("Hi {}", name)]).into())
}

#[test]
fn function_components() {
	let harness = Harness::new();
	let greeting = || FunctionComponent::from_fn("Greeting", greet).with_defaults(props! { "name" => "you" });
	harness.render(create_element(greeting(), None, vec![]));
	assert_eq!(harness.markup(), "<span>Hi you</span>");
	let span = harness.node(&[0]);

	harness.render(create_element(greeting(), props! { "name" => "there" }, vec![]));
	assert_eq!(harness.markup(), "<span>Hi there</span>");
	assert_eq!(harness.node(&[0]), span);
}

#[test]
fn distinct_closures_remount() {
	let harness = Harness::new();
	let make = || FunctionComponent::new("Box", |_| Ok(h("div", None, vec![]).into()));
	harness.render(create_element(make(), None, vec![]));
	let first = harness.node(&[0]);
	harness.render(create_element(make(), None, vec![]));
	assert_ne!(harness.node(&[0]), first);
}

#[test]
fn nested_components_receive_new_props() {
	let harness = Harness::new();
	let wrapper = FunctionComponent::new("Wrapper", |props| Ok(counter(props! { "label" => props.get("label").cloned().unwrap_or_default() }).into()));
	harness.render(create_element(wrapper.clone(), props! { "label" => "a" }, vec![]));
	assert_eq!(harness.markup(), "<p>a: 0</p>");
	harness.render(create_element(wrapper, props! { "label" => "b" }, vec![]));
	assert_eq!(harness.markup(), "<p>b: 0</p>");
}

#[test]
fn class_refs_expose_the_updater() {
	let harness = Harness::new();
	let seen = Rc::new(RefCell::new(Vec::new()));
	let sink = Rc::clone(&seen);
	let reference = RefTarget::callback(move |value| {
		sink.borrow_mut().push(value.map(|value| value.downcast_ref::<Updater>().map(Updater::is_mounted)));
		Ok(())
	});
	harness.render(counter(props! { "ref" => reference }));
	harness.render(h("div", None, vec![]));
	assert_eq!(*seen.borrow(), [Some(Some(true)), None]);
}

struct Form {
	updater: Updater,
}

impl Class for Form {
	const NAME: &'static str = "Form";
	const HOOKS: Hooks = Hooks::DID_MOUNT;

	fn construct(_: &Props, updater: Updater) -> Self {
		Self { updater }
	}
}

impl Component for Form {
	fn render(&mut self, _: &Props, _: &State) -> HookResult<Rendered> {
		Ok(h("form", None, children![h("input", props! { "ref" => "field" }, vec![])]).into())
	}

	fn component_did_mount(&mut self, node: &dyn Any) -> HookResult<Option<StateUpdate>> {
		let field = self.updater.get_ref::<MemoryHandle>("field");
		log(format!("field {}", field.is_some() && node.downcast_ref::<MemoryHandle>() != field.as_ref()));
		Ok(None)
	}
}

#[test]
fn named_refs_resolve_to_host_handles() {
	let harness = Harness::new();
	take_log();
	harness.render(create_element(ComponentClass::of::<Form>(), None, vec![]));
	assert_eq!(take_log(), ["field true"]);
	assert_eq!(harness.markup(), "<form><input></input></form>");
}

struct Strict;

impl Class for Strict {
	const NAME: &'static str = "Strict";

	fn construct(_: &Props, _: Updater) -> Self {
		Self
	}

	fn prop_rules() -> Vec<PropRule> {
		vec![PropRule::required("name")]
	}
}

impl Component for Strict {
	fn render(&mut self, _: &Props, _: &State) -> HookResult<Rendered> {
		Ok("strict".into())
	}
}

#[test]
fn prop_rule_violations_are_reported() {
	let harness = Harness::new();
	harness.render(create_element(ComponentClass::of::<Strict>(), None, vec![]));
	assert_eq!(harness.markup(), "strict");
	let diagnostics = harness.diagnostics();
	assert_eq!(diagnostics.len(), 1);
	assert_eq!(&*diagnostics[0].component, "Strict");
	assert_eq!(diagnostics[0].error, Error::Construction("invalid prop `name`: is required".to_owned()));

	harness.render(create_element(ComponentClass::of::<Strict>(), props! { "name" => "x" }, vec![]));
	assert_eq!(harness.diagnostics().len(), 1);
}

struct Reentrant {
	updater: Updater,
}

impl Class for Reentrant {
	const NAME: &'static str = "Reentrant";
	const HOOKS: Hooks = Hooks::WILL_UPDATE;

	fn construct(_: &Props, updater: Updater) -> Self {
		UPDATER.with(|current| *current.borrow_mut() = Some(updater.clone()));
		Self { updater }
	}
}

impl Component for Reentrant {
	fn render(&mut self, _: &Props, state: &State) -> HookResult<Rendered> {
		log("render");
		Ok(format!("{} {}", count(state), state.get("extra").and_then(Value::as_int).unwrap_or_default()).into())
	}

	fn component_will_update(&mut self, _: &Props, next_state: &State) -> HookResult<Option<StateUpdate>> {
		if count(next_state) == 1 {
			self.updater.set_state(props! { "extra" => 1 });
			self.updater.force_update();
		}
		Ok(None)
	}
}

#[test]
fn updates_from_inside_a_pass_are_applied_once() {
	let harness = Harness::new();
	harness.render(create_element(ComponentClass::of::<Reentrant>(), None, vec![]));
	take_log();

	updater().set_state(props! { "count" => 1 });
	assert_eq!(take_log(), ["render"]);
	assert_eq!(harness.markup(), "1 1");
}
