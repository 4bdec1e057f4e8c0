//! Reading and writing the PDF document information dictionary.

use std::path::Path;

use anyhow::Context as _;
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use tempfile::NamedTempFile;
use tracing::debug;

/// Standard info-dictionary fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub producer: Option<String>,
    pub creator: Option<String>,
    pub keywords: Vec<String>,
}

pub trait PdfCodec {
    fn read_metadata(&self, path: &Path) -> anyhow::Result<PdfInfo>;

    /// Write every field that is set; unset fields keep their current value.
    fn write_metadata(&self, path: &Path, info: &PdfInfo) -> anyhow::Result<()>;

    /// Replace only the `Producer` entry.
    fn set_producer(&self, path: &Path, producer: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfCodec;

impl LopdfCodec {
    pub fn new() -> Self {
        Self
    }
}

impl PdfCodec for LopdfCodec {
    fn read_metadata(&self, path: &Path) -> anyhow::Result<PdfInfo> {
        let doc = load(path)?;
        let Some(info) = info_dict(&doc) else {
            return Ok(PdfInfo::default());
        };

        let keywords = text_entry(info, "Keywords")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(PdfInfo {
            title: text_entry(info, "Title"),
            author: text_entry(info, "Author"),
            subject: text_entry(info, "Subject"),
            producer: text_entry(info, "Producer"),
            creator: text_entry(info, "Creator"),
            keywords,
        })
    }

    fn write_metadata(&self, path: &Path, info: &PdfInfo) -> anyhow::Result<()> {
        let mut doc = load(path)?;
        let dict = info_dict_mut(&mut doc)?;
        let fields = [
            ("Title", &info.title),
            ("Author", &info.author),
            ("Subject", &info.subject),
            ("Producer", &info.producer),
            ("Creator", &info.creator),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                dict.set(key, encode_text(value));
            }
        }
        if !info.keywords.is_empty() {
            dict.set("Keywords", encode_text(&info.keywords.join(", ")));
        }
        save_atomically(&mut doc, path)
    }

    fn set_producer(&self, path: &Path, producer: &str) -> anyhow::Result<()> {
        let mut doc = load(path)?;
        info_dict_mut(&mut doc)?.set("Producer", encode_text(producer));
        save_atomically(&mut doc, path)?;
        debug!("set producer of {}", path.display());
        Ok(())
    }
}

fn load(path: &Path) -> anyhow::Result<Document> {
    Document::load(path).map_err(|err| anyhow::anyhow!("load pdf {}: {err}", path.display()))
}

fn save_atomically(doc: &mut Document, path: &Path) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    doc.save_to(&mut temp)
        .map_err(|err| anyhow::anyhow!("write pdf {}: {err}", path.display()))?;
    let permissions = std::fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?
        .permissions();
    temp.as_file()
        .set_permissions(permissions)
        .with_context(|| format!("set permissions for {}", path.display()))?;
    temp.persist(path)
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

fn info_dict(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn info_dict_mut(doc: &mut Document) -> anyhow::Result<&mut Dictionary> {
    let existing: Option<ObjectId> = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| obj.as_reference().ok());
    let inline = matches!(doc.trailer.get(b"Info"), Ok(Object::Dictionary(_)));

    if inline {
        return doc
            .trailer
            .get_mut(b"Info")
            .and_then(Object::as_dict_mut)
            .map_err(|err| anyhow::anyhow!("inline Info dictionary: {err}"));
    }

    let id = match existing {
        Some(id) => id,
        None => {
            let id = doc.add_object(Dictionary::new());
            doc.trailer.set("Info", Object::Reference(id));
            id
        }
    };
    doc.get_object_mut(id)
        .and_then(Object::as_dict_mut)
        .map_err(|err| anyhow::anyhow!("Info dictionary {id:?}: {err}"))
}

fn text_entry(dict: &Dictionary, key: &str) -> Option<String> {
    let bytes = dict.get(key.as_bytes()).ok()?.as_str().ok()?;
    let text = decode_text(bytes);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE_u8, 0xFF]) {
        let units = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

fn encode_text(value: &str) -> Object {
    if value.is_ascii() {
        Object::string_literal(value)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in value.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}
