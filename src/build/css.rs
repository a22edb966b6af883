use regex::Regex;
use std::sync::LazyLock;

static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("regex"));

/// Whitespace rewrites, applied in order after comments are gone.
static RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\s+", " "),
        (r";\s*", ";"),
        (r":\s+", ":"),
        (r"\s*\{\s*", "{"),
        (r"\s*\}\s*", "}"),
        (r"\s*,\s*", ","),
        (r"\s*>\s*", ">"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).expect("regex"), replacement))
    .collect()
});

/// Minify a stylesheet: drop comments, collapse whitespace and tighten
/// punctuation.
///
/// Removing a comment can splice a new `/*` together, so the pass repeats until
/// nothing changes. After the first pass every change shrinks the text, which
/// bounds the loop and makes the result idempotent.
pub fn transform_stylesheet(source: &str) -> String {
    let mut current = minify_pass(source);
    loop {
        let next = minify_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn minify_pass(css: &str) -> String {
    let mut out = COMMENT.replace_all(css, "").into_owned();
    for (re, replacement) in RULES.iter() {
        out = re.replace_all(&out, *replacement).into_owned();
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_comments_and_space_before_brace() {
        let out = transform_stylesheet("a { color: red; /* c */ }");
        assert!(!out.contains("/*"));
        assert!(!out.contains(" c "));
        assert!(!out.contains(" {"));
        assert_eq!(out, "a{color:red;}");
    }

    #[test]
    fn tightens_selectors_and_values() {
        let css = "/* header */\n.a > .b,\n.c {\n    margin: 0 auto;\n    box-shadow: 0 1px 2px rgba(0, 0, 0, 0.2);\n}\n";
        assert_eq!(
            transform_stylesheet(css),
            ".a>.b,.c{margin:0 auto;box-shadow:0 1px 2px rgba(0,0,0,0.2);}"
        );
    }

    #[test]
    fn is_idempotent() {
        let inputs = [
            "a { color: red; /* c */ }",
            "@media (max-width: 480px) {\n  .x { right: 8px; }\n}\n",
            "//* x */* y */ b { }",
            "/*/**/*/ c{}",
            "",
            "   \n\t ",
        ];
        for input in inputs {
            let once = transform_stylesheet(input);
            assert_eq!(transform_stylesheet(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn removes_comments_spliced_by_earlier_removal() {
        assert_eq!(transform_stylesheet("//* x */* y */ b { }"), "b{}");
    }

    #[test]
    fn minifies_bundled_stylesheet() {
        let css = include_str!("../../assets/widget.css");
        let out = transform_stylesheet(css);
        assert!(out.len() < css.len());
        assert!(out.contains(".civic-chat--hidden{display:none;}"));
        assert!(!out.contains('\n'));
    }
}
