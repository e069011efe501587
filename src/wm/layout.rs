//! Layout - the binary pane tree of one tab.
//!
//! A node is either a `Leaf` holding a pane id or a `Split` with exactly
//! two children; every operation matches exhaustively on the two variants.
//! Split ratios are clamped to `[0.2, 0.8]` at every write so panes can
//! never degenerate.

use super::pane::PaneId;

/// Ratio bounds for any split
pub const MIN_RATIO: f32 = 0.2;
pub const MAX_RATIO: f32 = 0.8;

/// Direction of a split.
///
/// `Vertical` places children side by side (vertical divider);
/// `Horizontal` stacks them (horizontal divider).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SplitDirection {
    Vertical,
    Horizontal,
}

/// Direction for geometric pane navigation
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NavDirection {
    Left,
    Right,
    Up,
    Down,
}

/// A pane rectangle in the unit square, derived from ancestor ratios
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaneRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PaneRect {
    fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Outcome of closing a pane
#[derive(Debug, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The pane was the sole root leaf; the tab itself should close
    CloseTab,
    /// The pane was removed; focus should move to this leaf
    Closed { focus: PaneId },
    /// No such pane in this tree (defensive no-op)
    NotFound,
}

/// Layout node - binary tree of splits and leaves
#[derive(Clone, Debug)]
pub enum Layout {
    Leaf(PaneId),
    Split {
        direction: SplitDirection,
        /// Fraction of space given to `first`, always in `[0.2, 0.8]`
        ratio: f32,
        first: Box<Layout>,
        second: Box<Layout>,
    },
}

impl Layout {
    /// Create a layout with a single leaf
    pub fn new(pane_id: PaneId) -> Self {
        Layout::Leaf(pane_id)
    }

    /// Replace the target leaf in place with a Split holding the original
    /// leaf and the new one. Returns false if the target is not present.
    pub fn split(&mut self, target: PaneId, new_pane: PaneId, direction: SplitDirection) -> bool {
        match self {
            Layout::Leaf(id) => {
                if *id == target {
                    *self = Layout::Split {
                        direction,
                        ratio: 0.5,
                        first: Box::new(Layout::Leaf(target)),
                        second: Box::new(Layout::Leaf(new_pane)),
                    };
                    true
                } else {
                    false
                }
            }
            Layout::Split { first, second, .. } => {
                first.split(target, new_pane, direction)
                    || second.split(target, new_pane, direction)
            }
        }
    }

    /// Remove a leaf, collapsing its parent Split into the sibling.
    ///
    /// Each close removes exactly one tree level; closing the sole root
    /// leaf is signalled upward as `CloseTab`.
    pub fn close(&mut self, pane: PaneId) -> CloseOutcome {
        match self {
            Layout::Leaf(id) => {
                if *id == pane {
                    CloseOutcome::CloseTab
                } else {
                    CloseOutcome::NotFound
                }
            }
            Layout::Split { .. } => match self.collapse_parent_of(pane) {
                Some(focus) => CloseOutcome::Closed { focus },
                None => CloseOutcome::NotFound,
            },
        }
    }

    /// Find the Split whose direct child is the leaf, replace that Split
    /// with its other child, and return the nearest leaf to focus.
    fn collapse_parent_of(&mut self, pane: PaneId) -> Option<PaneId> {
        if let Layout::Split { first, second, .. } = self {
            let survivor = if matches!(first.as_ref(), Layout::Leaf(id) if *id == pane) {
                Some(std::mem::replace(second.as_mut(), Layout::Leaf(0)))
            } else if matches!(second.as_ref(), Layout::Leaf(id) if *id == pane) {
                Some(std::mem::replace(first.as_mut(), Layout::Leaf(0)))
            } else {
                None
            };
            if let Some(survivor) = survivor {
                let focus = survivor.first_leaf();
                *self = survivor;
                return Some(focus);
            }
            return first
                .collapse_parent_of(pane)
                .or_else(|| second.collapse_parent_of(pane));
        }
        None
    }

    /// First leaf in document order
    pub fn first_leaf(&self) -> PaneId {
        match self {
            Layout::Leaf(id) => *id,
            Layout::Split { first, .. } => first.first_leaf(),
        }
    }

    /// All pane ids in document order
    pub fn pane_ids(&self) -> Vec<PaneId> {
        match self {
            Layout::Leaf(id) => vec![*id],
            Layout::Split { first, second, .. } => {
                let mut ids = first.pane_ids();
                ids.extend(second.pane_ids());
                ids
            }
        }
    }

    pub fn contains(&self, pane: PaneId) -> bool {
        match self {
            Layout::Leaf(id) => *id == pane,
            Layout::Split { first, second, .. } => first.contains(pane) || second.contains(pane),
        }
    }

    /// On-screen rectangles for all leaves, in the unit square
    pub fn rects(&self) -> Vec<(PaneId, PaneRect)> {
        let mut out = Vec::new();
        self.collect_rects(
            PaneRect {
                x: 0.0,
                y: 0.0,
                width: 1.0,
                height: 1.0,
            },
            &mut out,
        );
        out
    }

    fn collect_rects(&self, rect: PaneRect, out: &mut Vec<(PaneId, PaneRect)>) {
        match self {
            Layout::Leaf(id) => out.push((*id, rect)),
            Layout::Split {
                direction,
                ratio,
                first,
                second,
            } => {
                let (a, b) = match direction {
                    SplitDirection::Vertical => {
                        let first_width = rect.width * ratio;
                        (
                            PaneRect {
                                width: first_width,
                                ..rect
                            },
                            PaneRect {
                                x: rect.x + first_width,
                                width: rect.width - first_width,
                                ..rect
                            },
                        )
                    }
                    SplitDirection::Horizontal => {
                        let first_height = rect.height * ratio;
                        (
                            PaneRect {
                                height: first_height,
                                ..rect
                            },
                            PaneRect {
                                y: rect.y + first_height,
                                height: rect.height - first_height,
                                ..rect
                            },
                        )
                    }
                };
                first.collect_rects(a, out);
                second.collect_rects(b, out);
            }
        }
    }

    /// Geometrically nearest leaf in the requested direction.
    ///
    /// Candidates are leaves whose center lies strictly beyond the focused
    /// pane's center along the axis; ties break by smallest Euclidean
    /// center-to-center distance. Sibling-order navigation is wrong once
    /// panes are nested, so geometry is authoritative here.
    pub fn navigate(&self, from: PaneId, direction: NavDirection) -> Option<PaneId> {
        let rects = self.rects();
        let (_, origin) = rects.iter().find(|(id, _)| *id == from)?;
        let (ox, oy) = origin.center();

        rects
            .iter()
            .filter(|(id, _)| *id != from)
            .filter(|(_, rect)| {
                let (cx, cy) = rect.center();
                match direction {
                    NavDirection::Left => cx < ox,
                    NavDirection::Right => cx > ox,
                    NavDirection::Up => cy < oy,
                    NavDirection::Down => cy > oy,
                }
            })
            .min_by(|(_, a), (_, b)| {
                let da = dist2(a.center(), (ox, oy));
                let db = dist2(b.center(), (ox, oy));
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(id, _)| *id)
    }

    /// Nudge the ratio of the nearest split containing the pane.
    ///
    /// Pure state mutation, idempotent under repeated events; out-of-range
    /// input is clamped, never an error.
    pub fn adjust_ratio(&mut self, pane: PaneId, delta: f32) -> bool {
        match self {
            Layout::Leaf(_) => false,
            Layout::Split {
                first,
                second,
                ratio,
                ..
            } => {
                if first.adjust_ratio(pane, delta) || second.adjust_ratio(pane, delta) {
                    return true;
                }
                if first.contains(pane) || second.contains(pane) {
                    *ratio = (*ratio + delta).clamp(MIN_RATIO, MAX_RATIO);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Set a divider position from a pointer location in the unit square.
    ///
    /// Finds the deepest split whose divider line lies within `tolerance`
    /// of the point and sets its ratio from the pointer position, clamped.
    pub fn drag_divider(&mut self, px: f32, py: f32, tolerance: f32) -> bool {
        self.drag_divider_in(
            PaneRect {
                x: 0.0,
                y: 0.0,
                width: 1.0,
                height: 1.0,
            },
            px,
            py,
            tolerance,
        )
    }

    fn drag_divider_in(&mut self, rect: PaneRect, px: f32, py: f32, tolerance: f32) -> bool {
        let Layout::Split {
            direction,
            ratio,
            first,
            second,
        } = self
        else {
            return false;
        };

        let (first_rect, second_rect, divider, pointer, origin, extent) = match direction {
            SplitDirection::Vertical => {
                let fw = rect.width * *ratio;
                (
                    PaneRect { width: fw, ..rect },
                    PaneRect {
                        x: rect.x + fw,
                        width: rect.width - fw,
                        ..rect
                    },
                    rect.x + fw,
                    px,
                    rect.x,
                    rect.width,
                )
            }
            SplitDirection::Horizontal => {
                let fh = rect.height * *ratio;
                (
                    PaneRect { height: fh, ..rect },
                    PaneRect {
                        y: rect.y + fh,
                        height: rect.height - fh,
                        ..rect
                    },
                    rect.y + fh,
                    py,
                    rect.y,
                    rect.height,
                )
            }
        };

        // Deepest split wins: try children before this divider
        if first.drag_divider_in(first_rect, px, py, tolerance)
            || second.drag_divider_in(second_rect, px, py, tolerance)
        {
            return true;
        }

        if (pointer - divider).abs() <= tolerance && extent > 0.0 {
            *ratio = ((pointer - origin) / extent).clamp(MIN_RATIO, MAX_RATIO);
            return true;
        }
        false
    }

    /// Check the ratio invariant over the whole tree (test support)
    #[cfg(test)]
    pub fn ratios_in_bounds(&self) -> bool {
        match self {
            Layout::Leaf(_) => true,
            Layout::Split {
                ratio,
                first,
                second,
                ..
            } => {
                (MIN_RATIO..=MAX_RATIO).contains(ratio)
                    && first.ratios_in_bounds()
                    && second.ratios_in_bounds()
            }
        }
    }
}

fn dist2(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_replaces_leaf_in_place() {
        let mut layout = Layout::new(1);
        assert!(layout.split(1, 2, SplitDirection::Vertical));
        match &layout {
            Layout::Split {
                direction,
                ratio,
                first,
                second,
            } => {
                assert_eq!(*direction, SplitDirection::Vertical);
                assert_eq!(*ratio, 0.5);
                assert!(matches!(first.as_ref(), Layout::Leaf(1)));
                assert!(matches!(second.as_ref(), Layout::Leaf(2)));
            }
            Layout::Leaf(_) => panic!("expected split"),
        }
    }

    #[test]
    fn test_split_missing_target_is_noop() {
        let mut layout = Layout::new(1);
        assert!(!layout.split(99, 2, SplitDirection::Vertical));
        assert!(matches!(layout, Layout::Leaf(1)));
    }

    #[test]
    fn test_scenario_b_split_then_close_new_leaf() {
        let mut layout = Layout::new(1);
        layout.split(1, 2, SplitDirection::Vertical);
        assert_eq!(layout.close(2), CloseOutcome::Closed { focus: 1 });
        assert!(matches!(layout, Layout::Leaf(1)));
    }

    #[test]
    fn test_close_sole_root_leaf_signals_close_tab() {
        let mut layout = Layout::new(1);
        assert_eq!(layout.close(1), CloseOutcome::CloseTab);
    }

    #[test]
    fn test_close_nonexistent_is_noop() {
        let mut layout = Layout::new(1);
        layout.split(1, 2, SplitDirection::Horizontal);
        assert_eq!(layout.close(99), CloseOutcome::NotFound);
        assert_eq!(layout.pane_ids(), vec![1, 2]);
    }

    #[test]
    fn test_structural_symmetry() {
        // Every split matched by closing one of its two children returns
        // the tree to a single leaf
        let mut layout = Layout::new(1);
        layout.split(1, 2, SplitDirection::Vertical);
        layout.split(2, 3, SplitDirection::Horizontal);
        layout.split(1, 4, SplitDirection::Horizontal);
        assert_eq!(layout.pane_ids().len(), 4);

        assert!(matches!(layout.close(4), CloseOutcome::Closed { .. }));
        assert!(matches!(layout.close(3), CloseOutcome::Closed { .. }));
        assert!(matches!(layout.close(2), CloseOutcome::Closed { .. }));
        assert!(matches!(layout, Layout::Leaf(1)));
    }

    #[test]
    fn test_close_transfers_focus_to_sibling_subtree() {
        let mut layout = Layout::new(1);
        layout.split(1, 2, SplitDirection::Vertical);
        layout.split(2, 3, SplitDirection::Horizontal);
        // Closing 1 collapses the root; focus goes to the first leaf of
        // the surviving subtree (2)
        assert_eq!(layout.close(1), CloseOutcome::Closed { focus: 2 });
        assert_eq!(layout.pane_ids(), vec![2, 3]);
    }

    #[test]
    fn test_ratio_clamped_under_any_resize() {
        let mut layout = Layout::new(1);
        layout.split(1, 2, SplitDirection::Vertical);
        layout.adjust_ratio(1, 100.0);
        assert!(layout.ratios_in_bounds());
        layout.adjust_ratio(1, -100.0);
        assert!(layout.ratios_in_bounds());
        for _ in 0..50 {
            layout.adjust_ratio(2, 0.07);
        }
        assert!(layout.ratios_in_bounds());
    }

    #[test]
    fn test_drag_divider_sets_and_clamps() {
        let mut layout = Layout::new(1);
        layout.split(1, 2, SplitDirection::Vertical);
        // Divider starts at x=0.5; drag it to 0.3
        assert!(layout.drag_divider(0.5, 0.4, 0.05));
        assert!(layout.drag_divider(0.3, 0.4, 0.25));
        if let Layout::Split { ratio, .. } = &layout {
            assert!((ratio - 0.3).abs() < 1e-6);
        }
        // Dragging past the bound clamps
        assert!(layout.drag_divider(0.05, 0.4, 0.4));
        if let Layout::Split { ratio, .. } = &layout {
            assert!((ratio - MIN_RATIO).abs() < 1e-6);
        }
        assert!(layout.ratios_in_bounds());
    }

    #[test]
    fn test_rects_cover_unit_square() {
        let mut layout = Layout::new(1);
        layout.split(1, 2, SplitDirection::Vertical);
        layout.split(2, 3, SplitDirection::Horizontal);
        let rects = layout.rects();
        assert_eq!(rects.len(), 3);
        let area: f32 = rects.iter().map(|(_, r)| r.width * r.height).sum();
        assert!((area - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_navigate_uses_geometry_not_sibling_order() {
        // 1 | (2 over 3): from 3 going left must reach 1, even though its
        // tree sibling is 2
        let mut layout = Layout::new(1);
        layout.split(1, 2, SplitDirection::Vertical);
        layout.split(2, 3, SplitDirection::Horizontal);

        assert_eq!(layout.navigate(3, NavDirection::Left), Some(1));
        assert_eq!(layout.navigate(3, NavDirection::Up), Some(2));
        assert_eq!(layout.navigate(2, NavDirection::Down), Some(3));
        assert_eq!(layout.navigate(1, NavDirection::Right), Some(2));
        assert_eq!(layout.navigate(1, NavDirection::Left), None);
    }

    #[test]
    fn test_navigate_nearest_by_center_distance() {
        // Left column stacked (1 over 3), right pane 2 centered: from 2
        // going left, 1 and 3 are equidistant horizontally; both are valid
        // but the nearest center must win deterministically
        let mut layout = Layout::new(1);
        layout.split(1, 2, SplitDirection::Vertical);
        layout.split(1, 3, SplitDirection::Horizontal);
        // Shrink the top-left pane so 3's center is nearer to 2's
        layout.adjust_ratio(1, -0.3);
        let target = layout.navigate(2, NavDirection::Left);
        assert_eq!(target, Some(3));
    }
}
