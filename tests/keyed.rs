mod common;

use cambium::{children, h, memory::Op, props, Element};
use common::{count, creates, moves, removes, Harness};

fn item(key: &str) -> Element {
	h("li", props! { "key" => key }, children![key])
}

fn list(keys: &[&str]) -> Element {
	h("ul", None, keys.iter().map(|&key| item(key).into()).collect())
}

fn markup(keys: &[&str]) -> String {
	format!("<ul>{}</ul>", keys.iter().map(|key| format!("<li>{}</li>", key)).collect::<String>())
}

/// Renders `from`, then `to`, returning the operations of the second render.
fn transition(from: &[&str], to: &[&str]) -> (Harness, Vec<Op>) {
	let harness = Harness::new();
	harness.render(list(from));
	harness.take_ops();
	harness.render(list(to));
	let ops = harness.take_ops();
	assert_eq!(harness.markup(), markup(to));
	(harness, ops)
}

#[test]
fn reversal() {
	let (_, ops) = transition(&["a", "b", "c", "d"], &["d", "c", "b", "a"]);
	assert_eq!(moves(&ops), 3);
	assert_eq!(creates(&ops), 0);
	assert_eq!(removes(&ops), 0);
}

#[test]
fn tail_to_front() {
	let (_, ops) = transition(&["a", "b", "c", "d"], &["d", "a", "b", "c"]);
	assert_eq!(ops, [Op::InsertBefore { moved: true }]);
}

#[test]
fn swap_ends() {
	let (_, ops) = transition(&["a", "b", "c", "d"], &["d", "b", "c", "a"]);
	assert_eq!(moves(&ops), 2);
	assert_eq!(ops.len(), 2);
}

#[test]
fn insert_in_the_middle() {
	let (_, ops) = transition(&["a", "b", "c"], &["a", "x", "b", "c"]);
	assert_eq!(count(&ops, |op| *op == Op::InsertBefore { moved: false }), 1);
	assert_eq!(count(&ops, |op| *op == Op::CreateNode("li".to_owned())), 1);
	assert_eq!(moves(&ops), 0);
}

#[test]
fn remove_from_the_middle() {
	let (_, ops) = transition(&["a", "b", "c", "d"], &["a", "d"]);
	assert_eq!(ops, [Op::Remove, Op::Remove]);
}

#[test]
fn disjoint_keys_clear_and_refill() {
	let (_, ops) = transition(&["a", "b"], &["x", "y"]);
	assert_eq!(ops[0], Op::RemoveChildren);
	assert_eq!(count(&ops, |op| *op == Op::CreateNode("li".to_owned())), 2);
	assert_eq!(moves(&ops), 0);
}

#[test]
fn mixed_changes() {
	let (_, ops) = transition(&["a", "b", "c", "d", "e"], &["a", "c", "x", "b", "e"]);
	assert_eq!(moves(&ops), 1);
	assert_eq!(count(&ops, |op| *op == Op::CreateNode("li".to_owned())), 1);
	assert_eq!(removes(&ops), 1);
}

#[test]
fn shuffle() {
	let (_, ops) = transition(&["a", "b", "c", "d"], &["c", "a", "d", "b"]);
	assert_eq!(creates(&ops), 0);
	assert_eq!(removes(&ops), 0);
}

#[test]
fn moved_nodes_keep_their_identity() {
	let harness = Harness::new();
	harness.render(list(&["a", "b", "c"]));
	let a = harness.node(&[0, 0]);
	let c = harness.node(&[0, 2]);
	harness.render(list(&["c", "b", "a"]));
	assert_eq!(harness.node(&[0, 0]), c);
	assert_eq!(harness.node(&[0, 2]), a);
}

#[test]
fn moved_nodes_are_patched() {
	let harness = Harness::new();
	harness.render(list(&["a", "b"]));
	harness.take_ops();
	harness.render(h("ul", None, children![h("li", props! { "key" => "b", "class" => "moved" }, children!["b"]), item("a")]));
	let ops = harness.take_ops();
	assert_eq!(moves(&ops), 1);
	assert_eq!(count(&ops, |op| *op == Op::SetProperty("class".to_owned())), 1);
	assert_eq!(harness.markup(), r#"<ul><li class="moved">b</li><li>a</li></ul>"#);
}

#[test]
fn duplicate_keys_fall_back_to_positions() {
	let harness = Harness::new();
	harness.render(list(&["a", "b"]));
	let first = harness.node(&[0, 0]);
	harness.take_ops();
	harness.render(list(&["b", "b"]));
	let ops = harness.take_ops();
	assert_eq!(moves(&ops), 0);
	assert_eq!(harness.node(&[0, 0]), first);
	assert_eq!(harness.markup(), markup(&["b", "b"]));
}

#[test]
fn keyed_fragments_move_as_a_whole() {
	let harness = Harness::new();
	let group = |key: &str| cambium::fragment(children![format!("{}1", key), format!("{}2", key)]).with_key(key);
	harness.render(h("div", None, children![group("a"), group("b")]));
	assert_eq!(harness.markup(), "<div>a1a2b1b2</div>");
	harness.render(h("div", None, children![group("b"), group("a")]));
	assert_eq!(harness.markup(), "<div>b1b2a1a2</div>");
}

#[test]
fn growing_an_empty_keyed_list() {
	let (_, ops) = transition(&[], &["a", "b"]);
	assert_eq!(count(&ops, |op| *op == Op::CreateNode("li".to_owned())), 2);
}
