//! XPath-like path parsing into `gnoi.types.Path`.
//!
//! Accepted syntax:
//!
//! ```text
//! [origin:]/elem/elem[key=value][key2=value2]/elem
//! ```
//!
//! Elements are separated by `/` outside of brackets, so key values may
//! contain slashes (`/interfaces/interface[name=Ethernet1/1]`). Inside a
//! value, `\` escapes the next character; `]` and `\` must be escaped.

use std::collections::BTreeMap;
use std::fmt::Write;

use gnoic_proto::types::{Path, PathElem};

use crate::error::{ApiError, Result};

/// Parses an XPath-like string into a [`Path`].
///
/// An empty string or a lone `/` yields the empty path. One leading and
/// one trailing `/` are optional; any other empty element is an error.
///
/// # Errors
///
/// Returns [`ApiError::PathParse`] on unbalanced brackets, missing `=`,
/// empty element names or keys, and duplicate keys within one element.
pub fn parse_path(input: &str) -> Result<Path> {
    let (origin, rest) = split_origin(input);
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    let mut elems = Vec::new();
    let mut chars = rest.chars().peekable();
    let mut name = String::new();
    let mut keys: BTreeMap<String, String> = BTreeMap::new();
    let mut in_keys = false;

    while let Some(c) = chars.next() {
        match c {
            '/' => {
                push_elem(input, &mut elems, &mut name, &mut keys, false)?;
                in_keys = false;
            }
            '[' => {
                if name.is_empty() {
                    return Err(ApiError::path(input, "key without element name"));
                }
                in_keys = true;
                let (key, value) = parse_key(input, &mut chars)?;
                if keys.insert(key.clone(), value).is_some() {
                    return Err(ApiError::path(input, format!("duplicate key {key:?}")));
                }
            }
            ']' => return Err(ApiError::path(input, "unexpected ']'")),
            _ => {
                if in_keys {
                    return Err(ApiError::path(input, "unexpected text after key"));
                }
                name.push(c);
            }
        }
    }
    push_elem(input, &mut elems, &mut name, &mut keys, true)?;

    Ok(Path {
        origin: origin.to_string(),
        elem: elems,
    })
}

/// Renders a [`Path`] back to its canonical XPath-like form.
///
/// Keys are emitted in sorted order; the empty path renders as `/`.
pub fn path_to_xpath(path: &Path) -> String {
    let mut out = String::new();
    if !path.origin.is_empty() {
        out.push_str(&path.origin);
        out.push(':');
    }
    if path.elem.is_empty() {
        out.push('/');
        return out;
    }
    for elem in &path.elem {
        out.push('/');
        out.push_str(&elem.name);
        for (key, value) in &elem.key {
            let _ = write!(out, "[{key}={}]", escape_value(value));
        }
    }
    out
}

fn split_origin(input: &str) -> (&str, &str) {
    if let Some((origin, _)) = input.split_once(":/") {
        if !origin.is_empty()
            && origin
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return (origin, &input[origin.len() + 1..]);
        }
    }
    ("", input)
}

fn push_elem(
    input: &str,
    elems: &mut Vec<PathElem>,
    name: &mut String,
    keys: &mut BTreeMap<String, String>,
    at_end: bool,
) -> Result<()> {
    if name.is_empty() {
        // Only the end of input may close an empty element.
        if at_end {
            return Ok(());
        }
        return Err(ApiError::path(input, "empty element name"));
    }
    elems.push(PathElem {
        name: std::mem::take(name),
        key: std::mem::take(keys),
    });
    Ok(())
}

fn parse_key(
    input: &str,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> Result<(String, String)> {
    let mut key = String::new();
    loop {
        match chars.next() {
            Some('=') => break,
            Some(']') | None => return Err(ApiError::path(input, "missing '=' in key")),
            Some(c) => key.push(c),
        }
    }
    if key.is_empty() {
        return Err(ApiError::path(input, "empty key name"));
    }
    let mut value = String::new();
    loop {
        match chars.next() {
            Some('\\') => match chars.next() {
                Some(c) => value.push(c),
                None => return Err(ApiError::path(input, "dangling escape")),
            },
            Some(']') => return Ok((key, value)),
            Some(c) => value.push(c),
            None => return Err(ApiError::path(input, "unterminated '['")),
        }
    }
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == ']' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test]
    fn parses_keys_and_elements() {
        let path = parse_path("/a/b[k1=v1][k2=v2]/c").unwrap();
        assert_eq!(path.elem.len(), 3);
        assert_eq!(path.elem[0].name, "a");
        assert_eq!(path.elem[1].name, "b");
        assert_eq!(path.elem[1].key.get("k1").map(String::as_str), Some("v1"));
        assert_eq!(path.elem[1].key.get("k2").map(String::as_str), Some("v2"));
        assert!(path.elem[2].key.is_empty());
    }

    #[test]
    fn slash_inside_key_value() {
        let path = parse_path("/interfaces/interface[name=Ethernet1/1]/state").unwrap();
        assert_eq!(path.elem.len(), 3);
        assert_eq!(
            path.elem[1].key.get("name").map(String::as_str),
            Some("Ethernet1/1")
        );
    }

    #[test]
    fn origin_prefix() {
        let path = parse_path("openconfig:/components/component[name=CPU0]").unwrap();
        assert_eq!(path.origin, "openconfig");
        assert_eq!(path.elem.len(), 2);
        assert_eq!(
            path_to_xpath(&path),
            "openconfig:/components/component[name=CPU0]"
        );
    }

    #[test_case(""; "empty")]
    #[test_case("/"; "root")]
    fn empty_inputs(input: &str) {
        assert!(parse_path(input).unwrap().elem.is_empty());
    }

    #[test_case("/a[k=v][k=w]"; "duplicate key")]
    #[test_case("/a[k=v"; "unterminated")]
    #[test_case("/a[kv]"; "missing equals")]
    #[test_case("/[k=v]"; "key without name")]
    #[test_case("/a//b"; "empty element")]
    #[test_case("/a//"; "double trailing slash")]
    #[test_case("//a"; "double leading slash")]
    #[test_case("//"; "double slash")]
    #[test_case("/a]"; "stray bracket")]
    #[test_case("/a[=v]"; "empty key")]
    fn rejects(input: &str) {
        assert!(matches!(
            parse_path(input),
            Err(ApiError::PathParse { .. })
        ));
    }

    #[test]
    fn relative_and_trailing_slash_normalize() {
        assert_eq!(path_to_xpath(&parse_path("a/b/").unwrap()), "/a/b");
        assert_eq!(path_to_xpath(&parse_path("/a/").unwrap()), "/a");
    }

    #[test]
    fn escaped_bracket_round_trips() {
        let input = r"/a[k=x\]y]";
        let path = parse_path(input).unwrap();
        assert_eq!(path.elem[0].key.get("k").map(String::as_str), Some("x]y"));
        assert_eq!(path_to_xpath(&path), input);
    }

    #[test]
    fn empty_path_renders_root() {
        assert_eq!(path_to_xpath(&Path::default()), "/");
    }

    fn canonical_xpath() -> impl Strategy<Value = String> {
        let name = "[a-z][a-z0-9-]{0,8}";
        let key = "[a-z][a-z0-9]{0,5}";
        let value = "[A-Za-z0-9/.:-]{0,8}";
        let elem = (name, prop::collection::btree_map(key, value, 0..3)).prop_map(|(n, keys)| {
            let mut s = n;
            for (k, v) in keys {
                s.push_str(&format!("[{k}={v}]"));
            }
            s
        });
        prop::collection::vec(elem, 1..5).prop_map(|elems| format!("/{}", elems.join("/")))
    }

    proptest! {
        #[test]
        fn canonical_round_trip(xpath in canonical_xpath()) {
            let path = parse_path(&xpath).unwrap();
            prop_assert_eq!(path_to_xpath(&path), xpath);
        }
    }
}
