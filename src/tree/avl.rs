//! AVL balancing: each node tracks a balance factor (right subtree height
//! minus left subtree height) in `{-1, 0, 1}` while the tree is consistent,
//! transiently `{-2, 2}` mid-repair.

use super::{NodeId, Strategy, Tree};

/// AVL-balanced [`Tree`] strategy. See the module docs for the invariant.
pub struct Avl;

impl Strategy for Avl {
    type Extra = i8;

    fn init_extra(_has_parent: bool) -> i8 {
        0
    }

    fn rotate<K: Ord, V>(tree: &mut Tree<K, V, Self>, pivot: NodeId) {
        let parent = tree.node_parent(pivot).expect("rotate pivot must have a parent");
        let old_parent_bal = tree.extra(parent);
        let old_pivot_bal = tree.extra(pivot);
        let pivot_is_left = tree.is_left_child(pivot);

        let (new_parent_bal, new_pivot_bal) = if pivot_is_left {
            let mut npb = old_parent_bal + 1;
            if old_pivot_bal < 0 {
                npb -= old_pivot_bal;
            }
            let mut npv = old_pivot_bal + 1;
            if npb > 0 {
                npv += npb;
            }
            (npb, npv)
        } else {
            let mut npb = old_parent_bal - 1;
            if old_pivot_bal > 0 {
                npb -= old_pivot_bal;
            }
            let mut npv = old_pivot_bal - 1;
            if npb < 0 {
                npv += npb;
            }
            (npb, npv)
        };

        tree.set_extra(pivot, new_pivot_bal);
        tree.set_extra(parent, new_parent_bal);
        tree.pointer_rotate(pivot);
    }

    fn repair_insert<K: Ord, V>(tree: &mut Tree<K, V, Self>, node: NodeId) {
        let mut node = node;
        loop {
            let Some(parent) = tree.node_parent(node) else {
                return;
            };
            let old_bal = tree.extra(parent);
            if tree.is_left_child(node) {
                let new_bal = old_bal - 1;
                tree.set_extra(parent, new_bal);
                if old_bal < 0 {
                    rebalance(tree, parent);
                    return;
                } else if old_bal > 0 {
                    return;
                }
            } else {
                let new_bal = old_bal + 1;
                tree.set_extra(parent, new_bal);
                if old_bal > 0 {
                    rebalance(tree, parent);
                    return;
                } else if old_bal < 0 {
                    return;
                }
            }
            node = parent;
        }
    }

    fn repair_delete<K: Ord, V>(tree: &mut Tree<K, V, Self>, node: NodeId) {
        let mut node = node;
        loop {
            let Some(parent) = tree.node_parent(node) else {
                return;
            };
            let went_left = tree.is_left_child(node);
            let sibling = if went_left {
                tree.node_right(parent)
            } else {
                tree.node_left(parent)
            };
            let new_parent_bal = if went_left {
                tree.extra(parent) + 1
            } else {
                tree.extra(parent) - 1
            };
            tree.set_extra(parent, new_parent_bal);

            if new_parent_bal == 0 {
                node = parent;
                continue;
            }

            let rebalance_required = new_parent_bal == 2 || new_parent_bal == -2;
            if rebalance_required {
                let sibling_bal = tree.extra(sibling.expect("|balance|==2 implies a sibling subtree"));
                let pivot = rebalance(tree, parent);
                if sibling_bal != 0 {
                    node = pivot;
                    continue;
                }
            }
            return;
        }
    }
}

/// Re-balances the subtree rooted at `node` (whose balance factor is ±2),
/// performing one or two rotations as needed, and returns the new subtree
/// root.
fn rebalance<K: Ord, V>(tree: &mut Tree<K, V, Avl>, node: NodeId) -> NodeId {
    let bal = tree.extra(node);
    let mut child = if bal < 0 {
        tree.node_left(node).expect("negative balance implies a left child")
    } else {
        tree.node_right(node).expect("positive balance implies a right child")
    };

    if bal < 0 && tree.extra(child) > 0 {
        child = tree.node_right(child).expect("positive child balance implies a right grandchild");
        Avl::rotate(tree, child);
    } else if bal > 0 && tree.extra(child) < 0 {
        child = tree.node_left(child).expect("negative child balance implies a left grandchild");
        Avl::rotate(tree, child);
    }
    Avl::rotate(tree, child);
    child
}

#[cfg(test)]
mod tests {
    use super::*;

    fn height<K: Ord, V>(tree: &Tree<K, V, Avl>, id: Option<NodeId>) -> i32 {
        match id {
            None => 0,
            Some(id) => 1 + height(tree, tree.node_left(id)).max(height(tree, tree.node_right(id))),
        }
    }

    fn assert_avl_invariant<K: Ord, V>(tree: &Tree<K, V, Avl>, id: Option<NodeId>) {
        let Some(id) = id else { return };
        let lh = height(tree, tree.node_left(id));
        let rh = height(tree, tree.node_right(id));
        assert_eq!(tree.extra(id) as i32, rh - lh, "stored balance factor drifted from actual heights");
        assert!((lh - rh).abs() <= 1, "AVL height invariant violated");
        assert_avl_invariant(tree, tree.node_left(id));
        assert_avl_invariant(tree, tree.node_right(id));
    }

    #[test]
    fn ascending_insert_stays_balanced() {
        let mut t: Tree<i32, i32, Avl> = Tree::new();
        for k in 0..200 {
            t.insert(k, k);
        }
        assert_avl_invariant(&t, t.root_id());
    }

    #[test]
    fn descending_insert_stays_balanced() {
        let mut t: Tree<i32, i32, Avl> = Tree::new();
        for k in (0..200).rev() {
            t.insert(k, k);
        }
        assert_avl_invariant(&t, t.root_id());
    }

    #[test]
    fn random_removal_stays_balanced() {
        let mut t: Tree<i32, i32, Avl> = Tree::new();
        for k in 0..200 {
            t.insert(k, k);
        }
        for k in (0..200).step_by(3) {
            t.remove(&k).unwrap();
        }
        assert_avl_invariant(&t, t.root_id());
        assert_eq!(t.len(), 200 - (0..200).step_by(3).count());
    }
}
