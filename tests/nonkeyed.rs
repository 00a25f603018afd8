mod common;

use cambium::{children, h, memory::Op, Element};
use common::{count, moves, removes, Harness};

fn list(items: &[&str]) -> Element {
	h("ul", None, items.iter().map(|&item| h("li", None, children![item]).into()).collect())
}

fn created_items(ops: &[Op]) -> usize {
	count(ops, |op| *op == Op::CreateNode("li".to_owned()))
}

#[test]
fn growing_mounts_the_tail() {
	let harness = Harness::new();
	harness.render(list(&["a", "b", "c"]));
	harness.take_ops();
	harness.render(list(&["a", "b", "c", "d", "e"]));
	let ops = harness.take_ops();
	assert_eq!(created_items(&ops), 2);
	assert_eq!(moves(&ops), 0);
	assert_eq!(harness.markup(), "<ul><li>a</li><li>b</li><li>c</li><li>d</li><li>e</li></ul>");
}

#[test]
fn shrinking_removes_the_tail() {
	let harness = Harness::new();
	harness.render(list(&["a", "b", "c", "d", "e"]));
	let kept = harness.node(&[0, 0]);
	harness.take_ops();
	harness.render(list(&["a", "b"]));
	let ops = harness.take_ops();
	assert_eq!(ops, [Op::Remove, Op::Remove, Op::Remove]);
	assert_eq!(harness.node(&[0, 0]), kept);
	assert_eq!(harness.markup(), "<ul><li>a</li><li>b</li></ul>");
}

#[test]
fn emptying_clears_in_one_call() {
	let harness = Harness::new();
	harness.render(list(&["a", "b", "c"]));
	harness.take_ops();
	harness.render(list(&[]));
	assert_eq!(harness.take_ops(), [Op::RemoveChildren]);
	assert_eq!(harness.markup(), "<ul></ul>");
}

#[test]
fn changed_text_is_set_in_place() {
	let harness = Harness::new();
	harness.render(list(&["a", "b"]));
	harness.take_ops();
	harness.render(list(&["a", "B"]));
	assert_eq!(harness.take_ops(), [Op::SetText]);
	assert_eq!(harness.markup(), "<ul><li>a</li><li>B</li></ul>");
}

#[test]
fn changed_tag_replaces_the_node() {
	let harness = Harness::new();
	harness.render(h("div", None, children![h("span", None, children!["x"]), "tail"]));
	harness.take_ops();
	harness.render(h("div", None, children![h("p", None, children!["x"]), "tail"]));
	let ops = harness.take_ops();
	assert_eq!(ops[0], Op::CreateNode("p".to_owned()));
	assert_eq!(ops[1], Op::Replace);
	assert_eq!(removes(&ops), 0);
	assert_eq!(harness.markup(), "<div><p>x</p>tail</div>");
}

#[test]
fn text_to_element_and_back() {
	let harness = Harness::new();
	harness.render(h("div", None, children!["plain", "end"]));
	harness.render(h("div", None, children![h("em", None, children!["rich"]), "end"]));
	assert_eq!(harness.markup(), "<div><em>rich</em>end</div>");
	harness.render(h("div", None, children!["plain", "end"]));
	assert_eq!(harness.markup(), "<div>plainend</div>");
}

#[test]
fn fragment_children_keep_their_place() {
	let harness = Harness::new();
	let view = |items: &[&str]| h("div", None, children![h("header", None, vec![]), cambium::fragment(items.iter().map(|&item| item.into()).collect()), h("footer", None, vec![])]);
	harness.render(view(&["a"]));
	harness.render(view(&["a", "b", "c"]));
	assert_eq!(harness.markup(), "<div><header></header>abc<footer></footer></div>");
	harness.render(view(&["c"]));
	assert_eq!(harness.markup(), "<div><header></header>c<footer></footer></div>");
}

#[test]
fn identical_lists_produce_no_operations() {
	let harness = Harness::new();
	harness.render(list(&["a", "b", "c"]));
	harness.take_ops();
	harness.render(list(&["a", "b", "c"]));
	assert!(harness.take_ops().is_empty());
}
