use crate::utils::{escape_html, render_template};

use super::{
    CommentView,
    tree::{CommentNode, descendant_ids},
};

/// Pixels of left margin added per reply level. Applied uniformly: a lone
/// trailing child indents exactly like any other child.
pub const INDENT_PX: usize = 24;

const COMMENT_TEMPLATE: &str = include_str!("comment.html");

const DELETED_AUTHOR_PLACEHOLDER: &str = "[deleted]";

pub struct RenderOptions {
    pub viewer_id: Option<i32>,
    pub owner_user_id: i32,
}

/// Depth-first walk over the forest, one fragment per comment. `all` is the
/// same flat set the forest was built from; it feeds the per-comment
/// descendant lists the "hide replies" control needs.
pub fn render_forest(forest: &[CommentNode], all: &[CommentView], opts: &RenderOptions) -> String {
    let mut out = String::new();
    for node in forest {
        render_node(node, 0, all, opts, &mut out);
    }
    out
}

fn render_node(
    node: &CommentNode,
    depth: usize,
    all: &[CommentView],
    opts: &RenderOptions,
    out: &mut String,
) {
    let c = &node.comment;

    let author = match &c.author_name {
        Some(name) => escape_html(name),
        None => DELETED_AUTHOR_PLACEHOLDER.to_string(),
    };

    let descendants = descendant_ids(all, c.id)
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(";");

    let (like_class, like_color) = if c.viewer_liked {
        ("icon solid fa-thumbs-up", "#F2A900")
    } else {
        ("icon fa-thumbs-up", "white")
    };

    let can_delete = opts
        .viewer_id
        .map(|viewer| Some(viewer) == c.author_id || viewer == opts.owner_user_id)
        .unwrap_or(false);

    let delete_control = if can_delete {
        format!(
            r#"<button id="delete_button{id}" class="icon fa-trash" onclick="deleteComment({id})"></button>"#,
            id = c.id
        )
    } else {
        String::new()
    };

    out.push_str(&render_template(
        COMMENT_TEMPLATE,
        &[
            ("{{id}}", &c.id.to_string()),
            ("{{margin}}", &(depth * INDENT_PX).to_string()),
            ("{{author}}", &author),
            ("{{created_at}}", &c.created_at.format("%B %d, %Y").to_string()),
            ("{{body}}", &escape_html(&c.body)),
            ("{{likes}}", &c.likes.to_string()),
            ("{{like_class}}", like_class),
            ("{{like_color}}", like_color),
            ("{{delete_control}}", &delete_control),
            ("{{descendants}}", &descendants),
        ],
    ));

    for child in &node.children {
        render_node(child, depth + 1, all, opts, out);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::comments::tree::{build_forest, test::mock_comment};

    fn render(comments: Vec<CommentView>, opts: &RenderOptions) -> String {
        let forest = build_forest(comments.clone());
        render_forest(&forest, &comments, opts)
    }

    fn default_opts() -> RenderOptions {
        RenderOptions {
            viewer_id: None,
            owner_user_id: 1,
        }
    }

    fn margins(html: &str) -> Vec<usize> {
        html.match_indices("margin-left: ")
            .map(|(i, marker)| {
                let rest = &html[i + marker.len()..];
                let px = rest.split("px").next().unwrap();
                px.parse().unwrap()
            })
            .collect()
    }

    #[test]
    fn test_chain_renders_with_strictly_increasing_indentation() {
        let html = render(
            vec![
                mock_comment(1, &[], 0),
                mock_comment(2, &[1], 1),
                mock_comment(3, &[1, 2], 2),
            ],
            &default_opts(),
        );

        let margins = margins(&html);
        assert_eq!(margins.len(), 3);
        assert!(margins[0] < margins[1] && margins[1] < margins[2]);
        assert_eq!(margins, vec![0, INDENT_PX, 2 * INDENT_PX]);
    }

    #[test]
    fn test_single_and_multi_child_branches_indent_the_same() {
        // 1 has two children (2, 3); 3 has a lone trailing child (4)
        let html = render(
            vec![
                mock_comment(1, &[], 0),
                mock_comment(2, &[1], 1),
                mock_comment(3, &[1], 2),
                mock_comment(4, &[1, 3], 3),
            ],
            &default_opts(),
        );

        assert_eq!(margins(&html), vec![0, INDENT_PX, INDENT_PX, 2 * INDENT_PX]);
    }

    #[test]
    fn test_deleted_author_renders_placeholder() {
        let mut comment = mock_comment(1, &[], 0);
        comment.author_id = None;
        comment.author_name = None;

        let html = render(vec![comment], &default_opts());
        assert!(html.contains("[deleted]"));
        assert!(!html.contains("Author 1"));
    }

    #[test]
    fn test_body_is_escaped() {
        let mut comment = mock_comment(1, &[], 0);
        comment.body = "<script>alert(1)</script>".into();

        let html = render(vec![comment], &default_opts());
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_like_control_reflects_viewer_state() {
        let mut liked = mock_comment(1, &[], 0);
        liked.viewer_liked = true;
        liked.likes = 3;

        let html = render(vec![liked], &default_opts());
        assert!(html.contains("icon solid fa-thumbs-up"));
        assert!(html.contains("+ 3 likes"));

        let html = render(vec![mock_comment(1, &[], 0)], &default_opts());
        assert!(html.contains(r#"class="icon fa-thumbs-up""#));
    }

    #[test]
    fn test_delete_control_visibility() {
        let comments = vec![mock_comment(1, &[], 0)]; // author_id = 1

        // anonymous viewer: no delete control
        let html = render(comments.clone(), &default_opts());
        assert!(!html.contains("delete_button1"));

        // the comment's author sees it
        let html = render(
            comments.clone(),
            &RenderOptions {
                viewer_id: Some(1),
                owner_user_id: 42,
            },
        );
        assert!(html.contains("delete_button1"));

        // the site owner sees it on someone else's comment
        let html = render(
            comments.clone(),
            &RenderOptions {
                viewer_id: Some(42),
                owner_user_id: 42,
            },
        );
        assert!(html.contains("delete_button1"));

        // any other account does not
        let html = render(
            comments,
            &RenderOptions {
                viewer_id: Some(7),
                owner_user_id: 42,
            },
        );
        assert!(!html.contains("delete_button1"));
    }

    #[test]
    fn test_hide_replies_control_lists_descendants() {
        let html = render(
            vec![
                mock_comment(1, &[], 0),
                mock_comment(2, &[1], 1),
                mock_comment(3, &[1, 2], 2),
            ],
            &default_opts(),
        );

        assert!(html.contains(r#"value="2;3""#));
    }
}
