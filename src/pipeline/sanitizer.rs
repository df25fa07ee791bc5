use regex::Regex;
use std::sync::LazyLock;

static UNSAFE_SCHEME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:javascript|vbscript|livescript|data)\s*:").unwrap()
});

static EVENT_HANDLER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bon[a-z]+\s*=").unwrap());

/// Entities this sanitizer emits. An `&` that already starts one of them is
/// left alone, which keeps `sanitize` idempotent.
const ENTITIES: [&str; 5] = ["amp;", "lt;", "gt;", "quot;", "#39;"];

/// Makes raw text safe for insertion into markup: unsafe URL schemes and
/// inline event-handler attributes are removed, then markup is escaped.
pub fn sanitize(raw: &str) -> String {
    escape_markup(&strip_unsafe_patterns(raw))
}

/// Removal can splice together a new match (`javajavascript:script:`), so
/// strip until nothing changes. Each pass only shortens the text.
fn strip_unsafe_patterns(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let without_schemes = UNSAFE_SCHEME.replace_all(&current, "");
        let next = EVENT_HANDLER.replace_all(&without_schemes, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (index, ch) in text.char_indices() {
        match ch {
            '&' => {
                let rest = &text[index + 1..];
                if ENTITIES.iter().any(|entity| rest.starts_with(entity)) {
                    out.push('&');
                } else {
                    out.push_str("&amp;");
                }
            }
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Reverses `escape_markup` for widgets that render plain text.
pub fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(sanitize("Hola"), "Hola");
        assert_eq!(sanitize("¿Cómo estás? Muy bien."), "¿Cómo estás? Muy bien.");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            sanitize("<b>\"hi\" & 'bye'</b>"),
            "&lt;b&gt;&quot;hi&quot; &amp; &#39;bye&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn strips_unsafe_schemes_in_any_case() {
        let cases = [
            ("JavaScript:alert(1)", "alert(1)"),
            ("see vbscript:msgbox", "see msgbox"),
            ("DATA:text/html;base64,xx", "text/html;base64,xx"),
            ("javascript :void(0)", "void(0)"),
            ("LiveScript:go", "go"),
        ];
        for (input, expected) in cases {
            assert_eq!(sanitize(input), expected, "{input}");
        }
    }

    #[test]
    fn strips_schemes_spliced_together_by_removal() {
        let out = sanitize("javajavascript:script:alert(1)");
        assert!(!out.to_lowercase().contains("javascript:"), "{out}");
    }

    #[test]
    fn strips_inline_event_handlers() {
        let out = sanitize("<img src=x onerror=alert(1)>");
        assert!(!out.to_lowercase().contains("onerror"), "{out}");
        assert_eq!(out, "&lt;img src=x alert(1)&gt;");

        let out = sanitize("<div ONMOUSEOVER = \"x\">");
        assert!(!out.to_lowercase().contains("onmouseover"), "{out}");
    }

    #[test]
    fn is_idempotent_on_hostile_inputs() {
        let inputs = [
            "Hola",
            "&",
            "&amp;",
            "&amp;amp;",
            "&#106;avascript:alert(1)",
            "<script>alert('x')</script>",
            "<a href=\"javascript:alert(1)\" onclick=\"go()\">x</a>",
            "javajavascript:script:",
            "data:data::",
            "on on= onx=onload=",
            "\"'<>&",
            "&lt;already&gt; escaped &quot;text&quot;",
            "",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn decode_restores_display_text() {
        let raw = "<b>\"tú\" & 'yo'</b>";
        assert_eq!(decode_entities(&sanitize(raw)), raw);
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        /// Fragments that combine into nested schemes, handlers and
        /// half-formed entities, mixed with arbitrary characters.
        fn hostile_text() -> impl Strategy<Value = String> {
            let fragment = prop_oneof![
                3 => prop::sample::select(vec![
                    "javascript:", "JaVaScRiPt :", "vbscript:", "LIVESCRIPT:", "data:",
                    "java", "script", "data", ":", "on", "ONload", "click", "=", " ",
                    "\t", "&", "amp;", "lt;", "#39;", "quot;", "<", ">", "\"", "'",
                ])
                .prop_map(String::from),
                1 => any::<char>().prop_map(String::from),
            ];
            prop::collection::vec(fragment, 0..48).prop_map(|parts| parts.concat())
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(2000))]

            #[test]
            fn sanitize_is_idempotent(raw in hostile_text()) {
                let once = sanitize(&raw);
                prop_assert_eq!(sanitize(&once), once);
            }

            #[test]
            fn output_has_no_scheme_or_handler(raw in hostile_text()) {
                let out = sanitize(&raw);
                prop_assert!(!UNSAFE_SCHEME.is_match(&out), "scheme left in {:?}", out);
                prop_assert!(!EVENT_HANDLER.is_match(&out), "handler left in {:?}", out);
            }

            #[test]
            fn output_has_no_raw_markup(raw in ".{0,200}") {
                let out = sanitize(&raw);
                prop_assert!(!out.contains(['<', '>', '"', '\'']), "{:?}", out);
            }
        }
    }
}
