use std::path::Path;

use crate::docx::changes::{extract_changes, ExtractOptions};
use crate::docx::comments::{parse_comment_bodies, resolve_comments};
use crate::docx::package::DocxPackage;
use crate::docx::structure::{structure_document, StructureOptions};
use crate::ir::{Comment, DiffOutput};
use crate::markup::render_markup;
use crate::progress::Observer;

#[derive(Clone, Copy, Debug)]
pub struct ConvertOptions {
    pub extract: ExtractOptions,
    /// Resolve `word/comments.xml` when the package has one.
    pub comments: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            extract: ExtractOptions::default(),
            comments: true,
        }
    }
}

pub fn convert_docx(
    path: &Path,
    opts: &ConvertOptions,
    observer: &dyn Observer,
) -> anyhow::Result<DiffOutput> {
    let pkg = DocxPackage::read(path)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    convert_package(&pkg, &filename, opts, observer)
}

pub fn convert_package(
    pkg: &DocxPackage,
    filename: &str,
    opts: &ConvertOptions,
    observer: &dyn Observer,
) -> anyhow::Result<DiffOutput> {
    let document_xml = pkg.document_xml()?;
    observer.info(&format!(
        "{filename}: document part {} bytes",
        document_xml.len()
    ));

    let (changes, full_text) = extract_changes(&document_xml, &opts.extract, observer);
    let comments = if opts.comments {
        collect_comments(pkg, &document_xml, observer)?
    } else {
        Vec::new()
    };
    observer.info(&format!(
        "{filename}: {} change(s), {} comment(s)",
        changes.len(),
        comments.len()
    ));

    Ok(DiffOutput {
        filename: filename.to_string(),
        changes,
        comments,
        full_text,
    })
}

fn collect_comments(
    pkg: &DocxPackage,
    document_xml: &str,
    observer: &dyn Observer,
) -> anyhow::Result<Vec<Comment>> {
    let Some(comments_xml) = pkg.comments_xml()? else {
        return Ok(Vec::new());
    };
    // A broken comments part loses the comments, not the tracked changes.
    let bodies = match parse_comment_bodies(&comments_xml) {
        Ok(bodies) => bodies,
        Err(err) => {
            observer.anomaly("comments part", &format!("{err:#}"));
            Vec::new()
        }
    };
    Ok(resolve_comments(document_xml, &bodies, observer))
}

/// The document with its tracked changes rendered as CriticMarkup.
pub fn docx_to_markup(
    path: &Path,
    opts: &StructureOptions,
    observer: &dyn Observer,
) -> anyhow::Result<String> {
    let pkg = DocxPackage::read(path)?;
    let document_xml = pkg.document_xml()?;
    let paragraphs = structure_document(&document_xml, opts, observer);
    observer.info(&format!("{} paragraph(s)", paragraphs.len()));
    Ok(render_markup(&paragraphs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::changes::ChangeFilter;
    use crate::docx::fixture::{FixtureBuilder, ParagraphBuilder};
    use crate::docx::package::COMMENTS_PART;
    use crate::ir::ChangeKind;
    use crate::progress::NullObserver;

    fn sample_package() -> DocxPackage {
        FixtureBuilder::sample().build()
    }

    #[test]
    fn converts_sample_package() {
        let out = convert_package(
            &sample_package(),
            "memo.docx",
            &ConvertOptions::default(),
            &NullObserver,
        )
        .expect("convert");
        assert_eq!(out.filename, "memo.docx");
        let texts: Vec<&str> = out.changes.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["grew", "rose", " Hiring resumes in May."]);
        assert_eq!(out.comments.len(), 2);
        assert_eq!(out.comments[0].anchored_text, "third quarter");
        assert!(out.comments[1].is_point());
        assert!(out.full_text.starts_with("Quarterly memo\nRevenue grewrose by 4%"));
    }

    #[test]
    fn filters_and_comment_switch_apply() {
        let opts = ConvertOptions {
            extract: ExtractOptions {
                filter: ChangeFilter::Deletions,
                ..ExtractOptions::default()
            },
            comments: false,
        };
        let out = convert_package(&sample_package(), "m", &opts, &NullObserver).expect("convert");
        assert_eq!(out.changes.len(), 1);
        assert_eq!(out.changes[0].kind, ChangeKind::Deletion);
        assert!(out.comments.is_empty());
    }

    #[test]
    fn broken_comments_part_keeps_changes() {
        let mut pkg = FixtureBuilder::new()
            .paragraph(ParagraphBuilder::new().insert("Ann", "x"))
            .build();
        pkg.insert(COMMENTS_PART, "<w:comments><w:comment w:id=\"0\"></w:oops>");
        let out = convert_package(&pkg, "m", &ConvertOptions::default(), &NullObserver)
            .expect("convert");
        assert_eq!(out.changes.len(), 1);
        assert!(out.comments.is_empty());
    }
}
