//! PDF engine wrapper: page access for viewing and the info-dictionary codec.

use std::path::Path;

use manuals_core::is_pdf;
use pdf::content::{Op, TextDrawAdjusted};
use pdf::file::FileOptions;

pub mod codec;

pub use codec::{LopdfCodec, PdfCodec, PdfInfo};

const TJ_INSERT_SPACE_THRESHOLD: f32 = -200.0;

/// Summary of an opened document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentInfo {
    pub num_pages: u32,
}

/// What a viewer needs from a PDF: open it, then get at individual pages.
pub trait PdfViewer {
    fn open(&self, path: &Path) -> anyhow::Result<DocumentInfo>;

    /// Render a zero-based page as plain text.
    fn render_page(&self, path: &Path, page_index: u32) -> anyhow::Result<String>;
}

#[derive(Debug, Default)]
pub struct Engine;

impl Engine {
    pub fn new() -> Self {
        Self
    }

    pub fn page_count(&self, path: &Path) -> anyhow::Result<u32> {
        let file = FileOptions::cached().open(path)?;
        Ok(file.num_pages())
    }

    pub fn render_page_text(&self, path: &Path, page_index: u32) -> anyhow::Result<String> {
        let file = FileOptions::cached().open(path)?;
        let resolver = file.resolver();
        let page = file.get_page(page_index)?;
        let Some(content) = &page.contents else {
            return Ok("no text found".to_string());
        };
        let ops = content.operations(&resolver)?;
        let text = ops_to_text(&ops);
        let text = text.trim().to_string();
        if text.is_empty() {
            Ok("no text found".to_string())
        } else {
            Ok(text)
        }
    }
}

impl PdfViewer for Engine {
    fn open(&self, path: &Path) -> anyhow::Result<DocumentInfo> {
        if !is_pdf(path) {
            anyhow::bail!("not a pdf: {}", path.display());
        }
        Ok(DocumentInfo {
            num_pages: self.page_count(path)?,
        })
    }

    fn render_page(&self, path: &Path, page_index: u32) -> anyhow::Result<String> {
        let num_pages = self.page_count(path)?;
        if page_index >= num_pages {
            anyhow::bail!(
                "page {} out of range (document has {num_pages} pages)",
                page_index + 1
            );
        }
        self.render_page_text(path, page_index)
    }
}

fn ops_to_text(ops: &[Op]) -> String {
    let mut pending_space = false;
    let mut out = String::new();

    for op in ops {
        match op {
            Op::TextDraw { text } => {
                append_text_piece(&mut out, &text.to_string_lossy(), &mut pending_space);
            }
            Op::TextDrawAdjusted { array } => {
                for item in array {
                    match item {
                        TextDrawAdjusted::Text(text) => {
                            append_text_piece(
                                &mut out,
                                &text.to_string_lossy(),
                                &mut pending_space,
                            );
                        }
                        TextDrawAdjusted::Spacing(spacing) => {
                            if *spacing <= TJ_INSERT_SPACE_THRESHOLD {
                                pending_space = true;
                            }
                        }
                    }
                }
            }
            Op::TextNewline => {
                out.push('\n');
                pending_space = false;
            }
            Op::MoveTextPosition { translation } => {
                if translation.y < 0.0 {
                    out.push('\n');
                    pending_space = false;
                }
            }
            _ => {}
        }
    }

    out
}

fn append_text_piece(out: &mut String, s: &str, pending_space: &mut bool) {
    let piece: String = s.chars().filter(|ch| !ch.is_control() || *ch == '\n').collect();
    if piece.is_empty() {
        return;
    }

    if *pending_space {
        let suppress_before = piece
            .chars()
            .next()
            .is_some_and(|ch| matches!(ch, ',' | '.' | ';' | ':' | '!' | '?' | ')' | ']' | '}'));
        if !out.is_empty() && !suppress_before && !out.ends_with([' ', '\n', '\t']) {
            out.push(' ');
        }
        *pending_space = false;
    }
    out.push_str(&piece);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf::primitive::PdfString;

    #[test]
    fn ops_to_text_does_not_insert_spaces_between_single_chars() {
        let ops = vec![
            Op::TextDraw {
                text: PdfString::from("M"),
            },
            Op::TextDraw {
                text: PdfString::from("a"),
            },
            Op::TextDraw {
                text: PdfString::from("t"),
            },
        ];
        assert_eq!(ops_to_text(&ops), "Mat");
    }

    #[test]
    fn ops_to_text_inserts_space_on_large_tj_spacing() {
        let ops = vec![Op::TextDrawAdjusted {
            array: vec![
                TextDrawAdjusted::Text(PdfString::from("Hello")),
                TextDrawAdjusted::Spacing(-300.0),
                TextDrawAdjusted::Text(PdfString::from("world")),
                TextDrawAdjusted::Spacing(-300.0),
                TextDrawAdjusted::Text(PdfString::from(".")),
            ],
        }];
        assert_eq!(ops_to_text(&ops), "Hello world.");
    }

    #[test]
    fn viewer_rejects_non_pdf_paths() {
        let engine = Engine::new();
        assert!(engine.open(Path::new("/tmp/manual.json")).is_err());
    }

    #[test]
    #[ignore]
    fn viewer_opens_generated_pdf() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("fixture.pdf");
        codec::tests::write_fixture_pdf(&path, Some("Fixture"))?;

        let engine = Engine::new();
        assert_eq!(engine.open(&path)?.num_pages, 1);
        assert!(engine.render_page(&path, 1).is_err());
        Ok(())
    }
}
