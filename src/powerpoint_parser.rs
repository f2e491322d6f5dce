use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::Reader;
use quick_xml::events::Event;
use zip::ZipArchive;

/// Extract text from a PPTX file.
///
/// Slides are visited in slide-number order. Within each slide only runs
/// (`a:r/a:t`) inside shapes with a text body (`p:sp/p:txBody`) contribute,
/// concatenated without separators.
pub fn extract_presentation_text(file_path: impl AsRef<Path>) -> Result<String> {
    let file_path = file_path.as_ref();
    let file = File::open(file_path)
        .with_context(|| format!("Failed to open PowerPoint file: {}", file_path.display()))?;

    let mut archive = ZipArchive::new(file)
        .with_context(|| "Failed to read PowerPoint file as ZIP archive")?;

    let mut text = String::new();
    for slide_file in slide_file_names(&archive) {
        let mut entry = archive
            .by_name(&slide_file)
            .with_context(|| format!("Missing slide part: {}", slide_file))?;
        let mut contents = String::new();
        entry
            .read_to_string(&mut contents)
            .with_context(|| format!("Failed to read slide part: {}", slide_file))?;

        let slide_text = extract_text_from_slide_xml(&contents)
            .with_context(|| format!("Failed to parse slide part: {}", slide_file))?;
        log::debug!("{}: {} chars", slide_file, slide_text.chars().count());
        text.push_str(&slide_text);
    }

    Ok(text)
}

/// Number of slides in a PPTX file
pub fn get_presentation_slide_count(file_path: impl AsRef<Path>) -> Result<usize> {
    let file_path = file_path.as_ref();
    let file = File::open(file_path)
        .with_context(|| format!("Failed to open PowerPoint file: {}", file_path.display()))?;

    let archive = ZipArchive::new(file)
        .with_context(|| "Failed to read PowerPoint file as ZIP archive")?;

    Ok(slide_file_names(&archive).len())
}

/// Slide part names sorted by slide number
fn slide_file_names<R: Read + Seek>(archive: &ZipArchive<R>) -> Vec<String> {
    let mut slides: Vec<String> = archive
        .file_names()
        .filter(|name| is_slide_part(name))
        .map(str::to_string)
        .collect();
    slides.sort_by_key(|name| extract_slide_number(name));
    slides
}

fn is_slide_part(name: &str) -> bool {
    name.starts_with("ppt/slides/slide") && name.ends_with(".xml")
}

/// Extract slide number from "ppt/slides/slide12.xml"
fn extract_slide_number(filename: &str) -> usize {
    filename
        .strip_prefix("ppt/slides/slide")
        .and_then(|rest| rest.strip_suffix(".xml"))
        .and_then(|number| number.parse().ok())
        .unwrap_or(0)
}

/// Collect run text from the text bodies of a slide's shapes
pub fn extract_text_from_slide_xml(xml_content: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml_content);

    let mut text_content = String::new();
    let mut buf = Vec::new();

    // nesting depths; a shape may sit inside a group shape
    let mut shape_depth = 0usize;
    let mut body_depth = 0usize;
    let mut paragraph_depth = 0usize;
    let mut run_depth = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"sp" => shape_depth += 1,
                b"txBody" if shape_depth > 0 => body_depth += 1,
                b"p" if body_depth > 0 => paragraph_depth += 1,
                b"r" if paragraph_depth > 0 => run_depth += 1,
                b"t" if run_depth > 0 => in_text = true,
                _ => {}
            },
            Event::End(ref e) => match e.local_name().as_ref() {
                b"sp" => shape_depth = shape_depth.saturating_sub(1),
                b"txBody" if shape_depth > 0 => body_depth = body_depth.saturating_sub(1),
                b"p" if body_depth > 0 => paragraph_depth = paragraph_depth.saturating_sub(1),
                b"r" if paragraph_depth > 0 => run_depth = run_depth.saturating_sub(1),
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(e) if in_text => {
                text_content.push_str(std::str::from_utf8(&e)?);
            }
            Event::CData(e) if in_text => {
                text_content.push_str(std::str::from_utf8(&e)?);
            }
            Event::GeneralRef(e) if in_text => {
                if let Some(ch) = e.resolve_char_ref()? {
                    text_content.push(ch);
                } else {
                    let name = std::str::from_utf8(&e)?;
                    match quick_xml::escape::resolve_predefined_entity(name) {
                        Some(resolved) => text_content.push_str(resolved),
                        None => log::warn!("Unknown entity &{}; in slide text", name),
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(text_content)
}
