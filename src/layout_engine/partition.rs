use serde::{Deserialize, Serialize};

use crate::common::collections::HashSet;
use crate::model::tab::{GroupId, Tab, TabId};

/// Result of splitting a window's tabs around a switch target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Tabs that stay outside the main group, in the order they should end
    /// up at the right of the strip. The target is always last.
    pub ungrouped: Vec<TabId>,
    /// Tabs to move into the main group. Tabs already in it are left out.
    pub to_group: Vec<TabId>,
}

impl Partition {
    pub fn is_ungrouped(&self, tab: TabId) -> bool { self.ungrouped.contains(&tab) }
}

/// Splits `tabs` (one window, in the order the browser reported them) into
/// the `max_ungrouped` tabs that stay visible, target included, and the rest.
///
/// Recency ties keep the browser's order. A `max_ungrouped` of zero keeps
/// only the target.
pub fn partition(
    tabs: &[Tab],
    target: TabId,
    main_group: GroupId,
    max_ungrouped: usize,
) -> Partition {
    let mut by_recency: Vec<&Tab> = tabs.iter().collect();
    by_recency.sort_by_key(|t| std::cmp::Reverse(t.recency()));

    let keep = max_ungrouped.saturating_sub(1);
    let mut recent = HashSet::default();
    let mut to_group = vec![];
    for tab in by_recency.into_iter().filter(|t| !t.pinned && t.id != target) {
        if recent.len() < keep {
            recent.insert(tab.id);
        } else if tab.group_id != Some(main_group) {
            to_group.push(tab.id);
        }
    }

    let mut ungrouped: Vec<TabId> =
        tabs.iter().map(|t| t.id).filter(|id| recent.contains(id)).collect();
    ungrouped.push(target);

    Partition { ungrouped, to_group }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::fixtures::{TabFixture, tab};

    const MAIN: GroupId = GroupId::new(100);

    fn ids(raw: &[i64]) -> Vec<TabId> { raw.iter().copied().map(TabId::new).collect() }

    /// Ten tabs where tab `n` was last used at `n * 10`, shuffled in the
    /// strip so that strip order and recency disagree.
    fn ten_tabs() -> Vec<Tab> {
        [4, 9, 1, 7, 10, 2, 6, 3, 8, 5].iter().map(|&n| tab(n, 1).accessed(n as u64 * 10)).collect()
    }

    #[test]
    fn keeps_the_most_recent_tabs_around_the_target() {
        // Tab 8 is the third most recent.
        let p = partition(&ten_tabs(), TabId::new(8), MAIN, 5);

        assert_eq!(p.ungrouped, ids(&[9, 7, 10, 6, 8]));
        assert_eq!(p.to_group, ids(&[5, 4, 3, 2, 1]));
    }

    #[test]
    fn pinned_tabs_are_never_placed() {
        let mut tabs = ten_tabs();
        tabs[1] = tabs[1].clone().pinned(); // tab 9
        tabs[4] = tabs[4].clone().pinned(); // tab 10

        let p = partition(&tabs, TabId::new(8), MAIN, 5);

        assert_eq!(p.ungrouped, ids(&[4, 7, 6, 5, 8]));
        assert_eq!(p.to_group, ids(&[3, 2, 1]));
    }

    #[test]
    fn tabs_already_in_the_main_group_stay_put() {
        let tabs = vec![
            tab(1, 1).accessed(50),
            tab(2, 1).accessed(40).grouped(100),
            tab(3, 1).accessed(30).grouped(7),
            tab(4, 1).accessed(20),
        ];

        let p = partition(&tabs, TabId::new(4), MAIN, 2);

        assert_eq!(p.ungrouped, ids(&[1, 4]));
        assert_eq!(p.to_group, ids(&[3]));
    }

    #[test]
    fn a_grouped_recent_tab_is_pulled_out() {
        let tabs = vec![tab(1, 1).accessed(50).grouped(100), tab(2, 1).accessed(10)];

        let p = partition(&tabs, TabId::new(2), MAIN, 2);

        assert_eq!(p.ungrouped, ids(&[1, 2]));
        assert!(p.to_group.is_empty());
    }

    #[test]
    fn ties_and_missing_timestamps_keep_strip_order() {
        let tabs = vec![
            tab(1, 1),
            tab(2, 1).accessed(5),
            tab(3, 1).accessed(5),
            tab(4, 1),
            tab(5, 1).accessed(5),
        ];

        let p = partition(&tabs, TabId::new(4), MAIN, 3);

        assert_eq!(p.ungrouped, ids(&[2, 3, 4]));
        assert_eq!(p.to_group, ids(&[5, 1]));
    }

    #[test]
    fn empty_window_keeps_only_the_target() {
        let p = partition(&[], TabId::new(1), MAIN, 5);
        assert_eq!(p.ungrouped, ids(&[1]));
        assert!(p.to_group.is_empty());
    }

    #[test]
    fn zero_limit_behaves_like_one() {
        let tabs = vec![tab(1, 1).accessed(3), tab(2, 1).accessed(2), tab(3, 1).accessed(1)];

        let zero = partition(&tabs, TabId::new(2), MAIN, 0);
        assert_eq!(zero, partition(&tabs, TabId::new(2), MAIN, 1));
        assert_eq!(zero.ungrouped, ids(&[2]));
    }

    #[test]
    fn sets_are_disjoint_and_bounded_for_every_target_and_limit() {
        let mut tabs = ten_tabs();
        tabs[2] = tabs[2].clone().pinned();
        tabs[6] = tabs[6].clone().grouped(100);
        tabs[7] = tabs[7].clone().grouped(3);

        for target in tabs.iter().map(|t| t.id) {
            for max in 0..=12 {
                let p = partition(&tabs, target, MAIN, max);

                assert_eq!(p.ungrouped.last(), Some(&target));
                assert_eq!(p.ungrouped.iter().filter(|&&id| id == target).count(), 1);
                assert!(p.ungrouped.len() <= max.max(1), "{max}: {p:?}");
                assert!(!p.to_group.contains(&target));
                for id in &p.to_group {
                    assert!(!p.ungrouped.contains(id));
                }
                let pinned: Vec<TabId> = tabs.iter().filter(|t| t.pinned).map(|t| t.id).collect();
                for id in pinned.iter().filter(|&&id| id != target) {
                    assert!(!p.ungrouped.contains(id) && !p.to_group.contains(id));
                }
            }
        }
    }
}
