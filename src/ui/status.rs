//! Plain-text rendering of the tab state for the command line.

use std::fmt;

use ascii_tree::Tree;

use crate::model::server::{GroupData, TabData, WindowData};

/// Draws every window as a tree, with grouped tabs nested under their
/// group in strip order.
pub fn render(windows: &[WindowData]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    for window in windows {
        ascii_tree::write_tree(&mut out, &window_tree(window))?;
    }
    Ok(out)
}

fn window_tree(window: &WindowData) -> Tree {
    let mut label = format!("window {}", window.id);
    if window.focused {
        label.push_str(" (focused)");
    }

    let mut children = vec![];
    let mut tabs = window.tabs.iter().peekable();
    while let Some(tab) = tabs.next() {
        let Some(group_id) = tab.group_id else {
            children.push(Tree::Leaf(vec![tab_label(tab)]));
            continue;
        };
        let mut members = vec![tab_label(tab)];
        while let Some(next) = tabs.next_if(|t| t.group_id == Some(group_id)) {
            members.push(tab_label(next));
        }
        let label = match window.group(group_id) {
            Some(group) => group_label(group),
            None => format!("group {group_id}"),
        };
        children.push(Tree::Node(label, vec![Tree::Leaf(members)]));
    }
    Tree::Node(label, children)
}

fn group_label(group: &GroupData) -> String {
    let mut label = format!("group {} \"{}\"", group.id, group.title);
    if group.is_main {
        label.push_str(" [main]");
    }
    if group.collapsed {
        label.push_str(" [collapsed]");
    }
    label
}

fn tab_label(tab: &TabData) -> String {
    let mut label = format!("{}", tab.id);
    if let Some(title) = tab.title.as_deref().or(tab.url.as_deref()) {
        label.push(' ');
        label.push_str(title);
    }
    for (set, flag) in [(tab.active, "*"), (tab.pinned, "pinned"), (tab.discarded, "zzz")] {
        if set {
            label.push_str(&format!(" ({flag})"));
        }
    }
    label
}
