//! Small `.docx` writer for tests and the `fixture` command. Produces just enough of a
//! package (content types, relationships, document and comments parts) for Word and for
//! this crate's reader.

use std::path::Path;

use crate::docx::package::{DocxPackage, COMMENTS_PART, DOCUMENT_PART};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const FIXTURE_DATE: &str = "2024-01-01T00:00:00Z";

const CONTENT_TYPES_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
"#;
const COMMENTS_OVERRIDE: &str = r#"<Override PartName="/word/comments.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.comments+xml"/>
"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>
"#;

const COMMENTS_REL: &str = r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments" Target="comments.xml"/>
"#;

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn text_run(text: &str, leaf: &str) -> String {
    format!(
        "<w:r><w:{leaf} xml:space=\"preserve\">{}</w:{leaf}></w:r>",
        escape_text(text)
    )
}

/// Body of one `<w:p>`, built piece by piece in reading order.
#[derive(Clone, Debug, Default)]
pub struct ParagraphBuilder {
    heading: Option<usize>,
    body: String,
    next_change_id: usize,
}

impl ParagraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn heading(mut self, level: usize) -> Self {
        self.heading = Some(level);
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.body.push_str(&text_run(text, "t"));
        self
    }

    pub fn insert(self, author: &str, text: &str) -> Self {
        self.change("w:ins", author, &text_run(text, "t"))
    }

    pub fn delete(self, author: &str, text: &str) -> Self {
        self.change("w:del", author, &text_run(text, "delText"))
    }

    fn change(mut self, tag: &str, author: &str, run: &str) -> Self {
        self.next_change_id += 1;
        self.body.push_str(&format!(
            "<{tag} w:id=\"{}\" w:author=\"{}\" w:date=\"{FIXTURE_DATE}\">{run}</{tag}>",
            self.next_change_id,
            escape_text(author)
        ));
        self
    }

    pub fn highlight(mut self, color: &str, text: &str) -> Self {
        self.body.push_str(&format!(
            "<w:r><w:rPr><w:highlight w:val=\"{}\"/></w:rPr><w:t xml:space=\"preserve\">{}</w:t></w:r>",
            escape_text(color),
            escape_text(text)
        ));
        self
    }

    pub fn comment_start(mut self, id: &str) -> Self {
        self.body
            .push_str(&format!("<w:commentRangeStart w:id=\"{}\"/>", escape_text(id)));
        self
    }

    /// Closes a range and places its reference run, the way Word writes it.
    pub fn comment_end(mut self, id: &str) -> Self {
        let id = escape_text(id);
        self.body.push_str(&format!(
            "<w:commentRangeEnd w:id=\"{id}\"/><w:r><w:commentReference w:id=\"{id}\"/></w:r>"
        ));
        self
    }

    /// `text` selected by comment `id`.
    pub fn commented(self, id: &str, text: &str) -> Self {
        self.comment_start(id).text(text).comment_end(id)
    }

    /// Comment attached at a position with no selection.
    pub fn comment_point(self, id: &str) -> Self {
        self.comment_start(id).comment_end(id)
    }

    fn to_xml(&self) -> String {
        let ppr = match self.heading {
            Some(level) => format!("<w:pPr><w:pStyle w:val=\"Heading{level}\"/></w:pPr>"),
            None => String::new(),
        };
        if ppr.is_empty() && self.body.is_empty() {
            return "<w:p/>".to_string();
        }
        format!("<w:p>{ppr}{}</w:p>", self.body)
    }
}

#[derive(Clone, Debug)]
struct FixtureComment {
    id: String,
    author: String,
    text: String,
}

#[derive(Clone, Debug, Default)]
pub struct FixtureBuilder {
    paragraphs: Vec<ParagraphBuilder>,
    comments: Vec<FixtureComment>,
}

impl FixtureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paragraph(mut self, paragraph: ParagraphBuilder) -> Self {
        self.paragraphs.push(paragraph);
        self
    }

    /// Comment body; `\n` in `text` starts a new comment paragraph.
    pub fn comment(mut self, id: &str, author: &str, text: &str) -> Self {
        self.comments.push(FixtureComment {
            id: id.to_string(),
            author: author.to_string(),
            text: text.to_string(),
        });
        self
    }

    pub fn document_xml(&self) -> String {
        let mut xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:document xmlns:w=\"{W_NS}\"><w:body>"
        );
        for p in &self.paragraphs {
            xml.push_str(&p.to_xml());
        }
        xml.push_str("</w:body></w:document>");
        xml
    }

    pub fn comments_xml(&self) -> String {
        let mut xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:comments xmlns:w=\"{W_NS}\">"
        );
        for c in &self.comments {
            let initials: String = c.author.chars().take(1).collect();
            xml.push_str(&format!(
                "<w:comment w:id=\"{}\" w:author=\"{}\" w:date=\"{FIXTURE_DATE}\" w:initials=\"{}\">",
                escape_text(&c.id),
                escape_text(&c.author),
                escape_text(&initials)
            ));
            for line in c.text.split('\n') {
                xml.push_str("<w:p>");
                if !line.is_empty() {
                    xml.push_str(&text_run(line, "t"));
                }
                xml.push_str("</w:p>");
            }
            xml.push_str("</w:comment>");
        }
        xml.push_str("</w:comments>");
        xml
    }

    pub fn build(&self) -> DocxPackage {
        let has_comments = !self.comments.is_empty();
        let mut content_types = String::from(CONTENT_TYPES_HEAD);
        if has_comments {
            content_types.push_str(COMMENTS_OVERRIDE);
        }
        content_types.push_str("</Types>\n");

        let mut document_rels = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\n",
        );
        if has_comments {
            document_rels.push_str(COMMENTS_REL);
        }
        document_rels.push_str("</Relationships>\n");

        let mut pkg = DocxPackage::new();
        pkg.insert("[Content_Types].xml", content_types);
        pkg.insert("_rels/.rels", PACKAGE_RELS);
        pkg.insert("word/_rels/document.xml.rels", document_rels);
        pkg.insert(DOCUMENT_PART, self.document_xml());
        if has_comments {
            pkg.insert(COMMENTS_PART, self.comments_xml());
        }
        pkg
    }

    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        self.build().to_bytes()
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        self.build().write(path)
    }

    /// A short reviewed memo touching every feature the reader understands.
    pub fn sample() -> Self {
        FixtureBuilder::new()
            .paragraph(ParagraphBuilder::new().heading(1).text("Quarterly memo"))
            .paragraph(
                ParagraphBuilder::new()
                    .text("Revenue ")
                    .delete("Ann", "grew")
                    .insert("Ann", "rose")
                    .text(" by 4% in the ")
                    .commented("0", "third quarter")
                    .text("."),
            )
            .paragraph(ParagraphBuilder::new())
            .paragraph(
                ParagraphBuilder::new()
                    .text("Costs stayed flat.")
                    .comment_point("1")
                    .insert("Bo", " Hiring resumes in May."),
            )
            .paragraph(
                ParagraphBuilder::new()
                    .text("Marked for follow-up: ")
                    .highlight("yellow", "vendor review"),
            )
            .comment("0", "Bo", "Fiscal or calendar?")
            .comment("1", "Ann", "Source for this?\nFinance dashboard only.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_text_and_attributes() {
        let p = ParagraphBuilder::new()
            .text("a < b & c")
            .insert("O\"Neil", "x");
        let xml = p.to_xml();
        assert!(xml.contains("a &lt; b &amp; c"));
        assert!(xml.contains("w:author=\"O&quot;Neil\""));
    }

    #[test]
    fn empty_paragraph_is_self_closing() {
        assert_eq!(ParagraphBuilder::new().to_xml(), "<w:p/>");
    }

    #[test]
    fn package_has_comments_only_when_needed() {
        let plain = FixtureBuilder::new()
            .paragraph(ParagraphBuilder::new().text("hi"))
            .build();
        assert!(plain.comments_xml().expect("stream").is_none());

        let sample = FixtureBuilder::sample().build();
        let comments = sample.comments_xml().expect("stream").expect("comments part");
        assert!(comments.contains("Fiscal or calendar?"));
        assert!(sample.names().any(|n| n == "[Content_Types].xml"));
    }
}
