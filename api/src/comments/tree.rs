use std::collections::HashMap;

use serde::Serialize;

use super::CommentView;

/// A comment with its replies attached. Leaves serialize without a
/// `children` key.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: CommentView,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CommentNode>,
}

/// Builds the reply forest for one post or project out of its flat comment
/// set in a single pass over an index map, instead of re-scanning the set
/// for children at every node.
///
/// Sibling order is `(created_at, id)` so the result does not depend on the
/// order the store returned the rows in.
pub fn build_forest(mut comments: Vec<CommentView>) -> Vec<CommentNode> {
    comments.sort_unstable_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

    let index: HashMap<i32, usize> = comments
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id, i))
        .collect();

    let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); comments.len()];
    let mut roots: Vec<usize> = Vec::new();

    for (i, comment) in comments.iter().enumerate() {
        match comment.parent_id {
            None => roots.push(i),
            Some(parent_id) => {
                if let Some(&p) = index.get(&parent_id) {
                    children_of[p].push(i);
                } else {
                    // A reply whose parent is not in the set has nowhere to
                    // attach. Comments are only ever removed together with
                    // their whole forest, so this points at corrupt data.
                    tracing::warn!(
                        comment_id = comment.id,
                        parent_id,
                        "dropping reply to a comment outside the set"
                    );
                }
            }
        }
    }

    let mut slots: Vec<Option<CommentView>> = comments.into_iter().map(Some).collect();

    roots
        .into_iter()
        .map(|r| assemble(r, &mut slots, &children_of))
        .collect()
}

fn assemble(i: usize, slots: &mut [Option<CommentView>], children_of: &[Vec<usize>]) -> CommentNode {
    // Each index is either a root or a child of exactly one parent, so every
    // slot is taken at most once.
    let comment = slots[i]
        .take()
        .expect("comment attached to more than one parent");

    let children = children_of[i]
        .iter()
        .map(|&c| assemble(c, slots, children_of))
        .collect();

    CommentNode { comment, children }
}

/// Ids of every comment sitting below `id`, in input order. This is what the
/// "hide replies" control collapses on the client.
pub fn descendant_ids(comments: &[CommentView], id: i32) -> Vec<i32> {
    comments
        .iter()
        .filter(|c| c.parent_path.contains(&id))
        .map(|c| c.id)
        .collect()
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("comment {comment_id} has parent_path {found:?}, expected {expected:?}")]
pub struct PathViolation {
    pub comment_id: i32,
    pub expected: Vec<i32>,
    pub found: Vec<i32>,
}

/// Checks the materialized-path invariant over a flat set: every comment's
/// `parent_path` must be its parent's path with the parent's id appended,
/// and roots must have an empty path. When this drifts, [`descendant_ids`]
/// silently under- or over-reports.
pub fn verify_parent_paths(comments: &[CommentView]) -> Result<(), PathViolation> {
    let by_id: HashMap<i32, &CommentView> = comments.iter().map(|c| (c.id, c)).collect();

    for comment in comments {
        let expected = match comment.parent_id {
            None => Vec::new(),
            Some(parent_id) => match by_id.get(&parent_id) {
                Some(parent) => {
                    let mut path = parent.parent_path.clone();
                    path.push(parent_id);
                    path
                }
                // Parent outside the set, nothing to check against
                None => continue,
            },
        };

        if comment.parent_path != expected {
            return Err(PathViolation {
                comment_id: comment.id,
                expected,
                found: comment.parent_path.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use chrono::NaiveDate;

    // Helper function to create a mock CommentView; `parent_path` is derived
    // from the (parent, grandparents...) chain passed in
    pub(crate) fn mock_comment(id: i32, parent_path: &[i32], minutes: i64) -> CommentView {
        CommentView {
            id,
            author_id: Some(1),
            author_name: Some(format!("Author {}", id)),
            body: format!("Content for comment {}", id),
            parent_id: parent_path.last().copied(),
            parent_path: parent_path.to_vec(),
            created_at: NaiveDate::from_ymd_opt(2023, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                + chrono::Duration::try_minutes(minutes).unwrap(),
            likes: 0,
            viewer_liked: false,
        }
    }

    #[test]
    fn test_build_forest_with_no_comments() {
        let result = build_forest(vec![]);
        assert!(result.is_empty(), "Expected no comments in the forest");
    }

    #[test]
    fn test_build_forest_with_nested_comments() {
        let comments = vec![
            mock_comment(1, &[], 0),
            mock_comment(2, &[1], 1),
            mock_comment(3, &[1, 2], 2),
            mock_comment(4, &[], 3),
        ];

        let result = build_forest(comments);
        assert_eq!(result.len(), 2, "Expected two root comments");

        let first_root = &result[0];
        assert_eq!(first_root.comment.id, 1);
        assert_eq!(first_root.children.len(), 1);
        assert_eq!(first_root.children[0].comment.id, 2);
        assert_eq!(first_root.children[0].children[0].comment.id, 3);
        assert!(result[1].children.is_empty());
    }

    #[test]
    fn test_build_forest_sibling_order_is_deterministic() {
        // Same comments handed over in two different storage orders
        let a = vec![
            mock_comment(1, &[], 0),
            mock_comment(2, &[1], 5),
            mock_comment(3, &[1], 1),
        ];
        let mut b = a.clone();
        b.reverse();

        let forest_a = build_forest(a);
        let forest_b = build_forest(b);
        assert_eq!(forest_a, forest_b);

        let sibling_ids: Vec<i32> = forest_a[0]
            .children
            .iter()
            .map(|c| c.comment.id)
            .collect();
        assert_eq!(sibling_ids, vec![3, 2], "siblings ordered by created_at");
    }

    #[test]
    fn test_build_forest_drops_reply_to_missing_parent() {
        let comments = vec![mock_comment(1, &[], 0), mock_comment(2, &[99], 1)];

        let result = build_forest(comments);
        assert_eq!(result.len(), 1);
        assert!(result[0].children.is_empty());
    }

    #[test]
    fn test_leaf_serializes_without_children_key() {
        let forest = build_forest(vec![mock_comment(1, &[], 0)]);
        let json = serde_json::to_string(&forest).unwrap();
        assert!(!json.contains("children"));
    }

    #[test]
    fn test_descendant_ids_spans_the_whole_subtree() {
        let comments = vec![
            mock_comment(1, &[], 0),
            mock_comment(2, &[1], 1),
            mock_comment(3, &[1, 2], 2),
            mock_comment(4, &[1], 3),
            mock_comment(5, &[], 4),
        ];

        assert_eq!(descendant_ids(&comments, 1), vec![2, 3, 4]);
        assert_eq!(descendant_ids(&comments, 2), vec![3]);
        assert!(descendant_ids(&comments, 5).is_empty());
    }

    #[test]
    fn test_verify_parent_paths_accepts_a_consistent_set() {
        let comments = vec![
            mock_comment(1, &[], 0),
            mock_comment(2, &[1], 1),
            mock_comment(3, &[1, 2], 2),
        ];
        assert_eq!(verify_parent_paths(&comments), Ok(()));
    }

    #[test]
    fn test_verify_parent_paths_rejects_a_drifted_chain() {
        let mut comments = vec![
            mock_comment(1, &[], 0),
            mock_comment(2, &[1], 1),
            mock_comment(3, &[1, 2], 2),
        ];
        // Simulate a caller that forgot to append the parent id
        comments[2].parent_path = vec![1];

        let violation = verify_parent_paths(&comments).unwrap_err();
        assert_eq!(violation.comment_id, 3);
        assert_eq!(violation.expected, vec![1, 2]);
        assert_eq!(violation.found, vec![1]);
    }

    #[test]
    fn test_verify_parent_paths_rejects_a_root_with_a_path() {
        let mut comments = vec![mock_comment(1, &[], 0)];
        comments[0].parent_path = vec![42];

        let violation = verify_parent_paths(&comments).unwrap_err();
        assert_eq!(violation.comment_id, 1);
        assert!(violation.expected.is_empty());
    }
}
