// replace placeholder in template with data
pub fn render_template(template: &str, data: &[(&str, &str)]) -> String {
    let mut result = String::from(template);

    for (placeholder, value) in data {
        result = result.replace(placeholder, value);
    }

    result
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Strips anything that could escape the upload directory, keeping only the
/// final path component with a conservative character set.
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    base.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_render_template() {
        let out = render_template("a {{x}} b {{y}}", &[("{{x}}", "1"), ("{{y}}", "2")]);
        assert_eq!(out, "a 1 b 2");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("1&2")</script>"#),
            "&lt;script&gt;alert(&quot;1&amp;2&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_sanitize_filename_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename(r"C:\temp\face.png"), "face.png");
        assert_eq!(sanitize_filename("my photo (1).png"), "myphoto1.png");
    }
}
