//! Office document readers (OOXML and OpenDocument text).
//!
//! Every format here is a zip archive of XML parts. Text is pulled from the
//! parts with `quick_xml` events; no layout is reconstructed.
//!
//! | Format | Units |
//! |--------|-------|
//! | pptx | one per slide, `page_number` = slide index |
//! | xlsx | one per worksheet, `page_number` = sheet index |
//! | docx, odt | one for the whole document |

use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use thiserror::Error;

use crate::classify::{MIME_DOCX, MIME_ODT, MIME_PPTX, MIME_XLSX};
use crate::models::ExtractedUnit;

/// Decompressed size cap for a single archive part (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
const XLSX_MAX_SHEETS: usize = 100;
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

#[derive(Error, Debug)]
pub enum OfficeError {
    #[error("invalid archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("invalid XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Malformed(String),
}

/// Extract the text units of an office document of the given media type.
pub fn extract_office(bytes: &[u8], mime_type: &str) -> Result<Vec<ExtractedUnit>, OfficeError> {
    match mime_type {
        MIME_DOCX => extract_docx(bytes),
        MIME_PPTX => extract_pptx(bytes),
        MIME_XLSX => extract_xlsx(bytes),
        MIME_ODT => extract_odt(bytes),
        other => Err(OfficeError::Malformed(format!(
            "not an office media type: {}",
            other
        ))),
    }
}

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, OfficeError> {
    Ok(zip::ZipArchive::new(Cursor::new(bytes))?)
}

fn read_part(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>, OfficeError> {
    let entry = archive.by_name(name)?;
    let mut out = Vec::new();
    entry.take(MAX_XML_ENTRY_BYTES).read_to_end(&mut out)?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(OfficeError::Malformed(format!(
            "{} exceeds size limit ({} bytes)",
            name, MAX_XML_ENTRY_BYTES
        )));
    }
    Ok(out)
}

/// Archive parts named `<prefix><n>.xml`, ordered by `n`.
fn numbered_parts(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .filter(|n| {
            n[prefix.len()..n.len() - 4]
                .chars()
                .all(|c| c.is_ascii_digit())
        })
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name[prefix.len()..name.len() - 4]
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Text of every `<*:t>` element, with a line break after each element
/// whose local name is `block`.
fn collect_runs(xml: &[u8], block: &[u8]) -> Result<String, OfficeError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_t = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_t = true,
            Event::End(e) => {
                let name = e.local_name();
                if name.as_ref() == b"t" {
                    in_t = false;
                } else if name.as_ref() == block && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::Text(te) if in_t => out.push_str(&te.unescape()?),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(out.trim_end().to_string())
}

fn extract_docx(bytes: &[u8]) -> Result<Vec<ExtractedUnit>, OfficeError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_part(&mut archive, "word/document.xml")?;
    let text = collect_runs(&xml, b"p")?;
    Ok(vec![ExtractedUnit::whole(text)])
}

fn extract_pptx(bytes: &[u8]) -> Result<Vec<ExtractedUnit>, OfficeError> {
    let mut archive = open_archive(bytes)?;
    let slides = numbered_parts(&archive, "ppt/slides/slide");
    if slides.is_empty() {
        return Err(OfficeError::Malformed("presentation has no slides".into()));
    }

    let mut units = Vec::with_capacity(slides.len());
    for (idx, name) in slides.iter().enumerate() {
        let xml = read_part(&mut archive, name)?;
        units.push(ExtractedUnit::page(collect_runs(&xml, b"p")?, idx as u32 + 1));
    }
    Ok(units)
}

fn extract_xlsx(bytes: &[u8]) -> Result<Vec<ExtractedUnit>, OfficeError> {
    let mut archive = open_archive(bytes)?;
    // Workbooks with only numbers or inline strings omit the shared table.
    let shared_strings = if archive.file_names().any(|n| n == "xl/sharedStrings.xml") {
        let xml = read_part(&mut archive, "xl/sharedStrings.xml")?;
        read_shared_strings(&xml)?
    } else {
        Vec::new()
    };

    let sheets = numbered_parts(&archive, "xl/worksheets/sheet");
    let mut units = Vec::new();
    for (idx, name) in sheets.iter().take(XLSX_MAX_SHEETS).enumerate() {
        let xml = read_part(&mut archive, name)?;
        let text = read_sheet_cells(&xml, &shared_strings)?;
        units.push(ExtractedUnit::page(text, idx as u32 + 1));
    }
    Ok(units)
}

fn read_shared_strings(xml: &[u8]) -> Result<Vec<String>, OfficeError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(te) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&te.unescape()?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"t" => in_t = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Cell values of one worksheet, space separated, rows on separate lines.
fn read_sheet_cells(xml: &[u8], shared_strings: &[String]) -> Result<String, OfficeError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rows: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell_type: Vec<u8> = Vec::new();
    let mut in_value = false;
    let mut cell_count = 0usize;

    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"c" => {
                    cell_type = e
                        .attributes()
                        .flatten()
                        .find(|a| a.key.as_ref() == b"t")
                        .map(|a| a.value.into_owned())
                        .unwrap_or_default();
                }
                // <v> holds a value or shared-string index; <t> holds an inline string.
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Event::Text(te) if in_value => {
                let raw = te.unescape()?;
                let value = raw.trim();
                let text = if value.is_empty() {
                    None
                } else if cell_type == b"s" {
                    value
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| shared_strings.get(i).cloned())
                } else {
                    Some(value.to_string())
                };
                if let Some(text) = text {
                    row.push(text);
                    cell_count += 1;
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => cell_type.clear(),
                b"row" if !row.is_empty() => rows.push(std::mem::take(&mut row).join(" ")),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    if !row.is_empty() {
        rows.push(row.join(" "));
    }
    Ok(rows.join("\n"))
}

fn extract_odt(bytes: &[u8]) -> Result<Vec<ExtractedUnit>, OfficeError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_part(&mut archive, "content.xml")?;

    let mut reader = Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut out = String::new();
    // Depth of open text:p / text:h elements.
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if matches!(e.local_name().as_ref(), b"p" | b"h") => depth += 1,
            Event::End(e) if matches!(e.local_name().as_ref(), b"p" | b"h") => {
                depth = depth.saturating_sub(1);
                if depth == 0 && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::Empty(e) if depth > 0 => match e.local_name().as_ref() {
                b"s" => out.push(' '),
                b"tab" => out.push('\t'),
                b"line-break" => out.push('\n'),
                _ => {}
            },
            Event::Text(te) if depth > 0 => out.push_str(&te.unescape()?),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(vec![ExtractedUnit::whole(out.trim_end())])
}
