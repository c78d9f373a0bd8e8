//! Markdown → `.docx` (WordprocessingML in a zip package).
//!
//! A minimal but valid package is written by hand: content types, the root
//! relationship, `word/document.xml` and a small `word/styles.xml` with the
//! paragraph styles the notes use. Word, LibreOffice and Google Docs all
//! open it; nothing else (numbering parts, themes, settings) is required.
//!
//! List items carry their marker as a literal prefix run ("• ", "3. ")
//! instead of a numbering definition, so the numbers in the document are
//! exactly the numbers the model wrote.

use crate::artifact::markdown::{self, Block, Run};
use crate::error::ArtifactError;
use quick_xml::escape::escape;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Renders Markdown into a document file on disk.
///
/// Implementations are synchronous; callers run them on a blocking thread.
pub trait DocumentWriter: Send + Sync {
    /// Short writer name used in logs.
    fn name(&self) -> &str;

    /// Render `markdown` into a new file at `dest`.
    fn write_document(&self, markdown: &str, dest: &Path) -> Result<(), ArtifactError>;
}

/// Office Open XML word-processing writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxWriter;

impl DocumentWriter for DocxWriter {
    fn name(&self) -> &str {
        "docx"
    }

    fn write_document(&self, markdown: &str, dest: &Path) -> Result<(), ArtifactError> {
        // Parse first: malformed input must not leave a half-written file.
        let blocks = markdown::parse(markdown)?;
        let document = render_document(&blocks);

        let package_err = |detail: String| ArtifactError::Package {
            path: dest.to_path_buf(),
            detail,
        };

        let file = File::create(dest).map_err(|source| ArtifactError::Write {
            path: dest.to_path_buf(),
            source,
        })?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let parts: [(&str, &str); 5] = [
            ("[Content_Types].xml", CONTENT_TYPES_XML),
            ("_rels/.rels", ROOT_RELS_XML),
            ("word/_rels/document.xml.rels", DOCUMENT_RELS_XML),
            ("word/styles.xml", STYLES_XML),
            ("word/document.xml", &document),
        ];
        for (name, body) in parts {
            zip.start_file(name, options)
                .map_err(|e| package_err(format!("{name}: {e}")))?;
            zip.write_all(body.as_bytes())
                .map_err(|e| package_err(format!("{name}: {e}")))?;
        }

        let mut inner = zip.finish().map_err(|e| package_err(e.to_string()))?;
        inner.flush().map_err(|source| ArtifactError::Write {
            path: dest.to_path_buf(),
            source,
        })?;

        debug!(
            "Wrote {} blocks ({} bytes document.xml) to {}",
            blocks.len(),
            document.len(),
            dest.display()
        );
        Ok(())
    }
}

// ── document.xml ─────────────────────────────────────────────────────────

fn render_document(blocks: &[Block]) -> String {
    let mut body = String::new();
    for block in blocks {
        match block {
            Block::Heading { level, runs } => {
                paragraph(&mut body, Some(&format!("Heading{level}")), None, runs)
            }
            Block::Paragraph { runs } => paragraph(&mut body, None, None, runs),
            Block::Bullet { runs } => paragraph(&mut body, Some("ListBullet"), Some("• "), runs),
            Block::Numbered { number, runs } => {
                paragraph(&mut body, Some("ListNumber"), Some(&format!("{number}. ")), runs)
            }
            Block::Quote { runs } => paragraph(&mut body, Some("Quote"), None, runs),
            Block::Code { lines } => {
                for line in lines {
                    let run = Run {
                        text: line.clone(),
                        ..Default::default()
                    };
                    paragraph(&mut body, Some("Code"), None, std::slice::from_ref(&run));
                }
            }
            Block::Rule => body.push_str(
                r#"<w:p><w:pPr><w:pBdr><w:bottom w:val="single" w:sz="6" w:space="1" w:color="auto"/></w:pBdr></w:pPr></w:p>"#,
            ),
        }
    }

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            "<w:body>{}",
            r#"<w:sectPr><w:pgSz w:w="12240" w:h="15840"/>"#,
            r#"<w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/>"#,
            "</w:sectPr></w:body></w:document>"
        ),
        body
    )
}

fn paragraph(out: &mut String, style: Option<&str>, prefix: Option<&str>, runs: &[Run]) {
    out.push_str("<w:p>");
    if let Some(style) = style {
        out.push_str(&format!(r#"<w:pPr><w:pStyle w:val="{style}"/></w:pPr>"#));
    }
    if let Some(prefix) = prefix {
        run(
            out,
            &Run {
                text: prefix.to_string(),
                ..Default::default()
            },
        );
    }
    for r in runs {
        run(out, r);
    }
    out.push_str("</w:p>");
}

fn run(out: &mut String, r: &Run) {
    let text = xml_text(&r.text);
    if text.is_empty() {
        return;
    }
    out.push_str("<w:r>");
    if r.bold || r.italic || r.code {
        out.push_str("<w:rPr>");
        if r.code {
            out.push_str(r#"<w:rFonts w:ascii="Courier New" w:hAnsi="Courier New" w:cs="Courier New"/>"#);
        }
        if r.bold {
            out.push_str("<w:b/>");
        }
        if r.italic {
            out.push_str("<w:i/>");
        }
        out.push_str("</w:rPr>");
    }
    out.push_str(r#"<w:t xml:space="preserve">"#);
    out.push_str(&text);
    out.push_str("</w:t></w:r>");
}

/// Escape `text` for an XML text node, dropping characters XML 1.0 forbids
/// (C0 controls other than tab/newline/CR, U+FFFE, U+FFFF).
fn xml_text(text: &str) -> String {
    let allowed: String = text
        .chars()
        .filter(|&c| {
            matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
        })
        .collect();
    escape(allowed.as_str()).into_owned()
}

// ── Static package parts ─────────────────────────────────────────────────

const CONTENT_TYPES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>"#,
    "</Types>"
);

const ROOT_RELS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    "</Relationships>"
);

const DOCUMENT_RELS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
    "</Relationships>"
);

const STYLES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    r#"<w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:cs="Calibri"/><w:sz w:val="22"/></w:rPr></w:rPrDefault>"#,
    r#"<w:pPrDefault><w:pPr><w:spacing w:after="120" w:line="276" w:lineRule="auto"/></w:pPr></w:pPrDefault></w:docDefaults>"#,
    r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>"#,
    r#"<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="360" w:after="120"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="36"/></w:rPr></w:style>"#,
    r#"<w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="1"/></w:pPr><w:rPr><w:b/><w:sz w:val="30"/></w:rPr></w:style>"#,
    r#"<w:style w:type="paragraph" w:styleId="Heading3"><w:name w:val="heading 3"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="200" w:after="80"/><w:outlineLvl w:val="2"/></w:pPr><w:rPr><w:b/><w:sz w:val="26"/></w:rPr></w:style>"#,
    r#"<w:style w:type="paragraph" w:styleId="Heading4"><w:name w:val="heading 4"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:outlineLvl w:val="3"/></w:pPr><w:rPr><w:b/><w:i/><w:sz w:val="24"/></w:rPr></w:style>"#,
    r#"<w:style w:type="paragraph" w:styleId="Heading5"><w:name w:val="heading 5"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:outlineLvl w:val="4"/></w:pPr><w:rPr><w:b/><w:sz w:val="22"/></w:rPr></w:style>"#,
    r#"<w:style w:type="paragraph" w:styleId="Heading6"><w:name w:val="heading 6"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:outlineLvl w:val="5"/></w:pPr><w:rPr><w:i/><w:sz w:val="22"/></w:rPr></w:style>"#,
    r#"<w:style w:type="paragraph" w:styleId="ListBullet"><w:name w:val="List Bullet"/><w:basedOn w:val="Normal"/><w:pPr><w:spacing w:after="60"/><w:ind w:left="720" w:hanging="360"/></w:pPr></w:style>"#,
    r#"<w:style w:type="paragraph" w:styleId="ListNumber"><w:name w:val="List Number"/><w:basedOn w:val="Normal"/><w:pPr><w:spacing w:after="60"/><w:ind w:left="720" w:hanging="360"/></w:pPr></w:style>"#,
    r#"<w:style w:type="paragraph" w:styleId="Quote"><w:name w:val="Quote"/><w:basedOn w:val="Normal"/><w:pPr><w:ind w:left="720"/></w:pPr><w:rPr><w:i/><w:color w:val="595959"/></w:rPr></w:style>"#,
    r#"<w:style w:type="paragraph" w:styleId="Code"><w:name w:val="Code"/><w:basedOn w:val="Normal"/><w:pPr><w:spacing w:after="0" w:line="240" w:lineRule="auto"/><w:shd w:val="clear" w:color="auto" w:fill="F2F2F2"/></w:pPr><w:rPr><w:rFonts w:ascii="Courier New" w:hAnsi="Courier New" w:cs="Courier New"/><w:sz w:val="20"/></w:rPr></w:style>"#,
    "</w:styles>"
);
