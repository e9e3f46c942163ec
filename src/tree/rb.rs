//! Red-black balancing: each node carries a color (`true` = red). A freshly
//! linked node is red unless it is the root.

use super::{NodeId, Strategy, Tree};

/// Red-black-balanced [`Tree`] strategy. See the module docs for the
/// invariant.
pub struct Rb;

impl Strategy for Rb {
    type Extra = bool;

    fn init_extra(has_parent: bool) -> bool {
        has_parent
    }

    fn repair_insert<K: Ord, V>(tree: &mut Tree<K, V, Self>, node: NodeId) {
        let mut node = node;
        loop {
            let Some(parent) = tree.node_parent(node) else {
                tree.set_extra(node, false);
                return;
            };
            if !tree.extra(parent) {
                return;
            }

            let uncle = tree.sibling(parent);
            let grandparent = tree.node_parent(parent).expect("a red node always has a parent");
            if let Some(u) = uncle {
                if tree.extra(u) {
                    tree.set_extra(parent, false);
                    tree.set_extra(u, false);
                    tree.set_extra(grandparent, true);
                    node = grandparent;
                    continue;
                }
            }

            let mut pivot = parent;
            if tree.is_left_child(node) != tree.is_left_child(parent) {
                Rb::rotate(tree, node);
                pivot = node;
            }
            Rb::rotate(tree, pivot);
            tree.set_extra(pivot, false);
            tree.set_extra(grandparent, true);
            return;
        }
    }

    fn repair_delete<K: Ord, V>(tree: &mut Tree<K, V, Self>, node: NodeId) {
        let mut node = node;
        loop {
            let Some(parent) = tree.node_parent(node) else {
                return;
            };
            let mut sibling = tree.sibling(node).expect("a double-black node always has a sibling");

            if tree.extra(sibling) {
                tree.set_extra(parent, true);
                tree.set_extra(sibling, false);
                Rb::rotate(tree, sibling);
                sibling = tree.sibling(node).expect("sibling persists across the rotation");
            }

            let sib_left = tree.node_left(sibling);
            let sib_right = tree.node_right(sibling);
            let sib_left_black = sib_left.is_none_or(|l| !tree.extra(l));
            let sib_right_black = sib_right.is_none_or(|r| !tree.extra(r));

            if !tree.extra(parent) && !tree.extra(sibling) && sib_left_black && sib_right_black {
                tree.set_extra(sibling, true);
                node = parent;
                continue;
            }

            if tree.extra(parent) && !tree.extra(sibling) && sib_left_black && sib_right_black {
                tree.set_extra(sibling, true);
                tree.set_extra(parent, false);
                return;
            }

            if !tree.extra(sibling) {
                let went_left = tree.is_left_child(node);
                if went_left && !sib_left_black && sib_right_black {
                    tree.set_extra(sibling, true);
                    let sl = sib_left.expect("checked above");
                    tree.set_extra(sl, false);
                    Rb::rotate(tree, sl);
                    sibling = tree.sibling(node).expect("sibling persists across the rotation");
                } else if !went_left && sib_left_black && !sib_right_black {
                    tree.set_extra(sibling, true);
                    let sr = sib_right.expect("checked above");
                    tree.set_extra(sr, false);
                    Rb::rotate(tree, sr);
                    sibling = tree.sibling(node).expect("sibling persists across the rotation");
                }
            }

            tree.set_extra(sibling, tree.extra(parent));
            tree.set_extra(parent, false);
            if tree.is_left_child(node) {
                let far = tree.node_right(sibling).expect("far nephew must exist after case analysis");
                tree.set_extra(far, false);
            } else {
                let far = tree.node_left(sibling).expect("far nephew must exist after case analysis");
                tree.set_extra(far, false);
            }
            Rb::rotate(tree, sibling);
            return;
        }
    }

    fn delete_single_child<K: Ord, V>(tree: &mut Tree<K, V, Self>, node: NodeId) {
        let mut replacement = None;
        if !tree.extra(node) {
            if let Some(l) = tree.node_left(node) {
                tree.set_extra(l, false);
                replacement = Some(l);
            } else if let Some(r) = tree.node_right(node) {
                tree.set_extra(r, false);
                replacement = Some(r);
            } else {
                Rb::repair_delete(tree, node);
            }
        }
        tree.unlink(node, replacement);
    }
}
