use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use anyhow::{anyhow, Context};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const DOCUMENT_PART: &str = "word/document.xml";
pub const COMMENTS_PART: &str = "word/comments.xml";

/// The named streams of a `.docx` package, in archive order.
pub struct DocxPackage {
    pub entries: Vec<DocxEntry>,
}

pub struct DocxEntry {
    pub name: String,
    pub data: Vec<u8>,
}

impl DocxPackage {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let f = File::open(path).with_context(|| format!("open docx: {}", path.display()))?;
        Self::from_reader(f).with_context(|| format!("read docx: {}", path.display()))
    }

    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }

    fn from_reader<R: Read + Seek>(reader: R) -> anyhow::Result<Self> {
        let mut zip = ZipArchive::new(reader).context("not a zip-based document package")?;
        let mut entries = Vec::new();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).context("zip entry")?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .with_context(|| format!("read zip entry: {}", file.name()))?;
            entries.push(DocxEntry {
                name: file.name().to_string(),
                data,
            });
        }
        Ok(Self { entries })
    }

    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        let name = name.into();
        let data = data.into();
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(ent) => ent.data = data,
            None => self.entries.push(DocxEntry { name, data }),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// A stream decoded as UTF-8 (a leading byte-order mark is dropped).
    pub fn stream(&self, name: &str) -> anyhow::Result<Option<String>> {
        let Some(ent) = self.entries.iter().find(|e| e.name == name) else {
            return Ok(None);
        };
        let bytes = ent.data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&ent.data);
        let text = String::from_utf8(bytes.to_vec())
            .with_context(|| format!("{name} is not valid utf-8"))?;
        Ok(Some(text))
    }

    pub fn document_xml(&self) -> anyhow::Result<String> {
        self.stream(DOCUMENT_PART)?.ok_or_else(|| {
            let names: Vec<&str> = self.names().collect();
            anyhow!(
                "{DOCUMENT_PART} not found in package (entries: {}); is this a Word document?",
                names.join(", ")
            )
        })
    }

    pub fn comments_xml(&self) -> anyhow::Result<Option<String>> {
        self.stream(COMMENTS_PART)
    }

    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
        for ent in &self.entries {
            let opts =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            zout.start_file(ent.name.as_str(), opts)
                .with_context(|| format!("start zip file: {}", ent.name))?;
            zout.write_all(&ent.data)
                .with_context(|| format!("write zip file: {}", ent.name))?;
        }
        let cursor = zout.finish().context("finish zip")?;
        Ok(cursor.into_inner())
    }

    pub fn write(&self, output_path: &Path) -> anyhow::Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(output_path, bytes)
            .with_context(|| format!("write docx: {}", output_path.display()))
    }
}

impl Default for DocxPackage {
    fn default() -> Self {
        Self::new()
    }
}
