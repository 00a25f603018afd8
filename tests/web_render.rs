#![cfg(target_family = "wasm")]

use cambium::{children, dom::DomHost, h, props, DomScheduler, EventHandler, Mode, Renderer};
use std::{cell::Cell, rc::Rc, sync::Once};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{HtmlBodyElement, HtmlElement};

wasm_bindgen_test_configure!(run_in_browser);

static LOG_INITIALIZED: Once = Once::new();

fn setup() -> (Renderer<DomHost>, web_sys::Node) {
	LOG_INITIALIZED.call_once(tracing_wasm::set_as_global_default);
	let host = DomHost::from_window().unwrap();
	let target = host.document().create_element("div").unwrap();
	host.document().body().unwrap().dyn_into::<HtmlBodyElement>().unwrap().append_child(&target).unwrap();
	(Renderer::new(host, Rc::new(DomScheduler)), target.into())
}

fn inner_html(target: &web_sys::Node) -> String {
	target.dyn_ref::<web_sys::Element>().unwrap().inner_html()
}

#[wasm_bindgen_test]
fn mounts_and_patches() {
	let (renderer, target) = setup();
	renderer.render(h("p", props! { "class" => "a" }, children!["Hello ", h("b", None, children!["cambium"])]), &target, Mode::Append);
	assert_eq!(inner_html(&target), r#"<p class="a">Hello <b>cambium</b></p>"#);

	renderer.render(h("p", None, children!["Bye"]), &target, Mode::Append);
	assert_eq!(inner_html(&target), "<p>Bye</p>");

	assert!(renderer.unmount(&target));
	assert_eq!(inner_html(&target), "");
}

#[wasm_bindgen_test]
fn comments_and_svg() {
	let (renderer, target) = setup();
	renderer.render(h("div", None, children![cambium::comment("note"), h("svg", None, children![h("circle", None, vec![])])]), &target, Mode::Append);
	assert_eq!(inner_html(&target), "<div><!--note--><svg><circle></circle></svg></div>");
	let circle = target.dyn_ref::<web_sys::Element>().unwrap().query_selector("circle").unwrap().unwrap();
	assert_eq!(circle.namespace_uri().as_deref(), Some("http://www.w3.org/2000/svg"));
}

#[wasm_bindgen_test]
fn click() {
	let (renderer, target) = setup();
	let clicks = Rc::new(Cell::new(0));
	let counter = Rc::clone(&clicks);
	let handler = EventHandler::new(move |event| {
		assert!(event.downcast_ref::<web_sys::Event>().is_some());
		counter.set(counter.get() + 1);
		Ok(None)
	});
	renderer.render(h("button", props! { "onclick" => handler }, vec![]), &target, Mode::Append);

	let button: HtmlElement = target.first_child().unwrap().dyn_into().unwrap();
	button.click();
	assert_eq!(clicks.get(), 1);

	renderer.render(h("button", None, vec![]), &target, Mode::Append);
	button.click();
	assert_eq!(clicks.get(), 1);
}

#[wasm_bindgen_test]
fn invalid_tags_become_comments() {
	let (renderer, target) = setup();
	renderer.render(h("div", None, children![h("1bad", None, vec![])]), &target, Mode::Append);
	assert!(inner_html(&target).starts_with("<div><!--invalid tag name"));
}
