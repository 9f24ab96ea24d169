//! Keyed and unkeyed list reconciliation.

mod common;

use common::{log, mount, take_log};
use spark_fiber::{
    Component, ComponentCx, MemoryHost, Node, OutputId, Props, Record, RenderResult, Root, class, element, list, text,
};

fn items(keys: &[&str]) -> Node {
    element("ul")
        .child(list(keys.iter().map(|k| element("li").key(*k).text(*k))))
        .build()
}

fn ul(root: &Root<MemoryHost>) -> OutputId {
    root.host().children(root.container())[0]
}

#[test]
fn test_keyed_reorder_moves_one_node() {
    let mut root = mount();
    root.render(items(&["a", "b", "c"])).expect("mount");
    let before = root.host().children(ul(&root));
    root.host_mut().reset_stats();

    root.render(items(&["c", "a", "b"])).expect("reorder");

    assert_eq!(
        root.host().markup(),
        "<ul><li>c</li><li>a</li><li>b</li></ul>"
    );
    let after = root.host().children(ul(&root));
    assert_eq!(after, vec![before[2], before[0], before[1]], "output nodes are reused");

    let stats = root.host().stats();
    assert_eq!(stats.created, 0);
    assert_eq!(stats.moved, 1, "only c moves");
    assert_eq!(stats.inserted, 0);
    assert_eq!(stats.removed, 0);
    assert_eq!(stats.text_updates, 0);
}

#[test]
fn test_items_at_the_same_index_stay_put() {
    let mut root = mount();
    root.render(items(&["a", "b", "c", "d"])).expect("mount");
    let before = root.host().children(ul(&root));
    root.host_mut().reset_stats();

    root.render(items(&["d", "b", "c", "a"])).expect("swap ends");

    assert_eq!(
        root.host().markup(),
        "<ul><li>d</li><li>b</li><li>c</li><li>a</li></ul>"
    );
    let after = root.host().children(ul(&root));
    assert_eq!(after, vec![before[3], before[1], before[2], before[0]]);
    assert_eq!(root.host().stats().moved, 2, "b and c keep their index");
}

#[test]
fn test_keyed_removal_and_insertion() {
    let mut root = mount();
    root.render(items(&["a", "b", "c"])).expect("mount");
    let b = root.host().children(ul(&root))[1];
    root.host_mut().reset_stats();

    root.render(items(&["b", "d"])).expect("update");

    assert_eq!(root.host().markup(), "<ul><li>b</li><li>d</li></ul>");
    assert_eq!(root.host().children(ul(&root))[0], b, "b keeps its node");
    let stats = root.host().stats();
    assert_eq!(stats.removed, 2);
    assert_eq!(stats.inserted, 2, "d and its text");
    assert_eq!(stats.moved, 0);
}

#[test]
fn test_insert_at_front() {
    let mut root = mount();
    root.render(items(&["b", "c"])).expect("mount");
    root.host_mut().reset_stats();

    root.render(items(&["a", "b", "c"])).expect("prepend");

    assert_eq!(
        root.host().markup(),
        "<ul><li>a</li><li>b</li><li>c</li></ul>"
    );
    let stats = root.host().stats();
    assert_eq!(stats.inserted, 2, "a and its text");
    assert_eq!(stats.moved, 0, "existing items already follow the new one");
}

#[test]
fn test_duplicate_keys_still_render() {
    let mut root = mount();
    root.render(items(&["a", "a", "b"])).expect("mount");
    assert_eq!(
        root.host().markup(),
        "<ul><li>a</li><li>a</li><li>b</li></ul>"
    );

    root.render(items(&["b", "a"])).expect("update");
    assert_eq!(root.host().markup(), "<ul><li>b</li><li>a</li></ul>");
}

#[test]
fn test_unkeyed_items_update_in_place() {
    let mut root = mount();
    let render = |root: &mut Root<MemoryHost>, words: &[&str]| {
        root.render(element("p").child(list(words.iter().map(|w| text(*w)))))
            .expect("render");
    };
    render(&mut root, &["one", "two"]);
    root.host_mut().reset_stats();

    render(&mut root, &["uno", "two", "three"]);

    assert_eq!(root.host().markup(), "<p>unotwothree</p>");
    let stats = root.host().stats();
    assert_eq!(stats.text_updates, 1, "only the changed text is patched");
    assert_eq!(stats.inserted, 1);
    assert_eq!(stats.moved, 0);
}

// =============================================================================
// Components as list items
// =============================================================================

struct Item;

impl Component for Item {
    fn new(_props: &Props) -> Self {
        Item
    }

    fn render(&self, cx: &ComponentCx<'_>) -> RenderResult {
        let label = cx.props().str("label").unwrap_or_default().to_string();
        Ok(Some(element("li").text(label).into()))
    }

    fn on_mount(&mut self, cx: &ComponentCx<'_>) {
        log(format!("mount {}", cx.props().str("label").unwrap_or_default()));
    }

    fn on_unmount(&mut self, cx: &ComponentCx<'_>) {
        log(format!("unmount {}", cx.props().str("label").unwrap_or_default()));
    }
}

fn component_items(labels: &[&str]) -> Node {
    element("ul")
        .child(list(
            labels
                .iter()
                .map(|l| class::<Item>(Record::new().with("label", *l)).with_key(*l)),
        ))
        .build()
}

#[test]
fn test_keyed_components_keep_their_instances() {
    let mut root = mount();
    root.render(component_items(&["a", "b", "c"])).expect("mount");
    assert_eq!(
        take_log(),
        ["mount c", "mount b", "mount a"],
        "lifecycles run in reverse commit order"
    );

    root.render(component_items(&["c", "b", "a"])).expect("reverse");
    assert_eq!(
        root.host().markup(),
        "<ul><li>c</li><li>b</li><li>a</li></ul>"
    );
    assert!(take_log().is_empty(), "no instance was replaced");

    root.render(component_items(&["b", "x"])).expect("replace");
    assert_eq!(root.host().markup(), "<ul><li>b</li><li>x</li></ul>");
    assert_eq!(take_log(), ["unmount c", "unmount a", "mount x"]);
}
