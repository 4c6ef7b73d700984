use std::ops::Range;

use anyhow::Context;
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;

static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(lt|gt|quot|apos|amp|nbsp);").expect("entity regex"));

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^<(/?)([^\s/>]+)(.*?)(/?)>$").expect("tag regex"));

static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([^\s=/>]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("attr regex")
});

pub const TEXT_LEAF: &str = "w:t";
pub const DELETED_TEXT_LEAF: &str = "w:delText";

/// One lexical unit of a markup string, with its byte span in the source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Open {
        name: String,
        attrs: Vec<(String, String)>,
        span: Range<usize>,
    },
    Close {
        name: String,
        span: Range<usize>,
    },
    Empty {
        name: String,
        attrs: Vec<(String, String)>,
        span: Range<usize>,
    },
    Text {
        span: Range<usize>,
    },
}

impl Token {
    pub fn span(&self) -> Range<usize> {
        match self {
            Token::Open { span, .. }
            | Token::Close { span, .. }
            | Token::Empty { span, .. }
            | Token::Text { span } => span.clone(),
        }
    }

    pub fn is_open(&self, tag: &str) -> bool {
        matches!(self, Token::Open { name, .. } if name == tag)
    }

    pub fn is_close(&self, tag: &str) -> bool {
        matches!(self, Token::Close { name, .. } if name == tag)
    }

    pub fn is_empty_tag(&self, tag: &str) -> bool {
        matches!(self, Token::Empty { name, .. } if name == tag)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        match self {
            Token::Open { attrs, .. } | Token::Empty { attrs, .. } => find_attr(attrs, key),
            _ => None,
        }
    }
}

pub fn find_attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Splits `xml` into tags and text. Declarations, processing instructions, doctype and
/// XML comments are dropped; an unterminated tag ends the scan.
pub fn tokenize(xml: &str) -> Vec<Token> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos < xml.len() {
        let Some(rel) = xml[pos..].find('<') else {
            out.push(Token::Text {
                span: pos..xml.len(),
            });
            break;
        };
        let lt = pos + rel;
        if lt > pos {
            out.push(Token::Text { span: pos..lt });
        }
        let rest = &xml[lt..];
        if rest.starts_with("<!--") {
            pos = rest.find("-->").map(|i| lt + i + 3).unwrap_or(xml.len());
            continue;
        }
        if rest.starts_with("<![CDATA[") {
            pos = rest.find("]]>").map(|i| lt + i + 3).unwrap_or(xml.len());
            continue;
        }
        let Some(gt) = rest.find('>') else {
            break;
        };
        let end = lt + gt + 1;
        pos = end;
        let tag = &xml[lt..end];
        if tag.starts_with("<?") || tag.starts_with("<!") {
            continue;
        }
        let Some(caps) = TAG_RE.captures(tag) else {
            continue;
        };
        let closing = !caps[1].is_empty();
        let name = caps[2].to_string();
        let self_closing = !caps[4].is_empty();
        let span = lt..end;
        if closing {
            out.push(Token::Close { name, span });
            continue;
        }
        let attrs = parse_attrs(&caps[3]);
        if self_closing {
            out.push(Token::Empty { name, attrs, span });
        } else {
            out.push(Token::Open { name, attrs, span });
        }
    }
    out
}

fn parse_attrs(raw: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(raw)
        .map(|c| {
            let value = c.get(2).or_else(|| c.get(3)).map(|m| m.as_str()).unwrap_or("");
            (c[1].to_string(), decode_entities(value))
        })
        .collect()
}

/// An element located by [`find_elements`]. Offsets are byte offsets into the scanned string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element<'a> {
    pub start: usize,
    pub end: usize,
    pub open_tag: &'a str,
    pub inner: &'a str,
}

impl Element<'_> {
    pub fn contains(&self, offset: usize) -> bool {
        self.start < offset && offset < self.end
    }
}

/// Locates `<tag ...>...</tag>` pairs by literal search. Each element ends at the first
/// following `</tag>`; same-named nesting is not tracked. A self-closing `<tag/>` yields an
/// element with empty content. An opening tag without a closing tag ends the scan and is dropped.
pub fn find_elements<'a>(xml: &'a str, tag: &str) -> Vec<Element<'a>> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut out = Vec::new();
    let mut pos = 0usize;
    while let Some(rel) = xml[pos..].find(&open) {
        let start = pos + rel;
        let after_name = start + open.len();
        let next = xml[after_name..].chars().next();
        let boundary =
            matches!(next, Some('>') | Some('/')) || next.is_some_and(char::is_whitespace);
        if !boundary {
            pos = after_name;
            continue;
        }
        let Some(gt) = xml[after_name..].find('>') else {
            break;
        };
        let open_end = after_name + gt + 1;
        let open_tag = &xml[start..open_end];
        if open_tag.ends_with("/>") {
            out.push(Element {
                start,
                end: open_end,
                open_tag,
                inner: "",
            });
            pos = open_end;
            continue;
        }
        let Some(close_rel) = xml[open_end..].find(&close) else {
            break;
        };
        let inner_end = open_end + close_rel;
        let end = inner_end + close.len();
        out.push(Element {
            start,
            end,
            open_tag,
            inner: &xml[open_end..inner_end],
        });
        pos = end;
    }
    out
}

/// Text of every `w:t` leaf in document order, entity-decoded.
pub fn extract_text(xml: &str) -> String {
    extract_text_with(xml, &[TEXT_LEAF])
}

/// Text of every leaf whose tag is in `leaves`, in document order. A leaf that is never
/// closed contributes nothing.
pub fn extract_text_with(xml: &str, leaves: &[&str]) -> String {
    collect_leaf_text(xml, &tokenize(xml), leaves)
}

pub(crate) fn collect_leaf_text(xml: &str, tokens: &[Token], leaves: &[&str]) -> String {
    let mut out = String::new();
    let mut current: Option<(&str, String)> = None;
    for tok in tokens {
        match tok {
            Token::Open { name, .. } => {
                if let Some(leaf) = leaves.iter().copied().find(|l| *l == name.as_str()) {
                    current = Some((leaf, String::new()));
                }
            }
            Token::Text { span } => {
                if let Some((_, buf)) = current.as_mut() {
                    buf.push_str(&decode_entities(&xml[span.clone()]));
                }
            }
            Token::Close { name, .. } => {
                if current.as_ref().is_some_and(|(leaf, _)| *leaf == name.as_str()) {
                    if let Some((_, buf)) = current.take() {
                        out.push_str(&buf);
                    }
                }
            }
            Token::Empty { .. } => {}
        }
    }
    out
}

/// Decodes exactly `&lt; &gt; &quot; &apos; &amp; &nbsp;`; anything else stays literal.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures<'_>| match &caps[1] {
            "lt" => "<",
            "gt" => ">",
            "quot" => "\"",
            "apos" => "'",
            "amp" => "&",
            _ => "\u{a0}",
        })
        .into_owned()
}

/// Event form of a small XML part, for parts that are read whole (comment bodies).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlEvent {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Empty {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
}

pub fn parse_events(xml_bytes: &[u8]) -> anyhow::Result<Vec<XmlEvent>> {
    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let mut events: Vec<XmlEvent> = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let ev = reader.read_event_into(&mut buf).context("read xml event")?;
        match ev {
            Event::Eof => break,
            Event::Start(s) => {
                events.push(XmlEvent::Start {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(&s)?,
                });
            }
            Event::End(e) => {
                events.push(XmlEvent::End {
                    name: bytes_to_string(e.name().as_ref()),
                });
            }
            Event::Empty(s) => {
                events.push(XmlEvent::Empty {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(&s)?,
                });
            }
            Event::Text(t) => {
                let raw = bytes_to_string(&*t);
                // Word writes &nbsp; which is not a predefined XML entity.
                let text = match t.unescape() {
                    Ok(s) => s.into_owned(),
                    Err(_) => decode_entities(&raw),
                };
                events.push(XmlEvent::Text { text });
            }
            Event::CData(t) => {
                events.push(XmlEvent::Text {
                    text: bytes_to_string(t.into_inner()),
                });
            }
            _ => {}
        }
    }
    Ok(events)
}

fn collect_attrs(s: &BytesStart<'_>) -> anyhow::Result<Vec<(String, String)>> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for a in s.attributes() {
        let a = a.context("attr")?;
        let key = bytes_to_string(a.key.as_ref());
        let val = decode_entities(&bytes_to_string(a.value.as_ref()));
        attrs.push((key, val));
    }
    Ok(attrs)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_only_the_six_entities() {
        assert_eq!(
            decode_entities("&lt;a&gt; &quot;b&quot; &apos;c&apos; &amp;&nbsp;d"),
            "<a> \"b\" 'c' &\u{a0}d"
        );
        assert_eq!(decode_entities("&#169; &copy;"), "&#169; &copy;");
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn tokenizer_classifies_tags() {
        let xml = r#"<?xml version="1.0"?><w:p w:rsidR="00A"><!-- x > y --><w:r><w:t xml:space="preserve">a b</w:t></w:r><w:br/></w:p>"#;
        let toks = tokenize(xml);
        assert!(toks[0].is_open("w:p"));
        assert_eq!(toks[0].attr("w:rsidR"), Some("00A"));
        assert!(toks[1].is_open("w:r"));
        assert!(toks[2].is_open("w:t"));
        assert_eq!(&xml[toks[3].span()], "a b");
        assert!(toks[4].is_close("w:t"));
        assert!(toks[5].is_close("w:r"));
        assert!(toks[6].is_empty_tag("w:br"));
        assert!(toks[7].is_close("w:p"));
        assert_eq!(toks.len(), 8);
    }

    #[test]
    fn find_elements_matches_pairs_and_skips_prefixes() {
        let xml = "<w:p><w:pPr/><w:r><w:t>a</w:t></w:r></w:p><w:p/><w:p w:x=\"1\">b</w:p>";
        let found = find_elements(xml, "w:p");
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].inner, "<w:pPr/><w:r><w:t>a</w:t></w:r>");
        assert_eq!(found[1].inner, "");
        assert_eq!(found[2].inner, "b");
        assert_eq!(&xml[found[2].start..found[2].end], "<w:p w:x=\"1\">b</w:p>");
    }

    #[test]
    fn find_elements_drops_unclosed_tail() {
        let xml = "<w:ins>a</w:ins><w:ins>b";
        let found = find_elements(xml, "w:ins");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].inner, "a");
    }

    #[test]
    fn extract_text_reads_leaves_in_order() {
        let xml = "<w:r><w:t>x &amp; y</w:t><w:tab/><w:t xml:space=\"preserve\"> z</w:t></w:r>";
        assert_eq!(extract_text(xml), "x & y z");
        let del = "<w:r><w:delText>gone</w:delText></w:r>";
        assert_eq!(extract_text(del), "");
        assert_eq!(extract_text_with(del, &[DELETED_TEXT_LEAF]), "gone");
    }

    #[test]
    fn unclosed_leaf_contributes_nothing() {
        assert_eq!(extract_text("<w:t>kept</w:t><w:t>lost"), "kept");
    }

    #[test]
    fn events_fall_back_for_nbsp() {
        let events = parse_events("<a k=\"v &amp; w\">x&nbsp;y</a>".as_bytes()).expect("parse");
        assert_eq!(
            events[0],
            XmlEvent::Start {
                name: "a".into(),
                attrs: vec![("k".into(), "v & w".into())],
            }
        );
        assert_eq!(
            events[1],
            XmlEvent::Text {
                text: "x\u{a0}y".into()
            }
        );
    }
}
