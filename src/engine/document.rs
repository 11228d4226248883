use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;

use super::{EngineError, EngineResult};

/// The in-memory XML document and the file it was loaded from.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    path: PathBuf,
    text: String,
}

impl XmlDocument {
    /// Read and well-formedness-check the document at `path`.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = read_checked(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            text,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the in-memory state with the current file contents.
    pub fn reload(&mut self) -> EngineResult<()> {
        self.text = read_checked(&self.path)?;
        Ok(())
    }

    /// Make `text` the document, on disk and in memory.
    ///
    /// The text must be well-formed. It goes to a sibling temp file that is
    /// renamed over the original; the in-memory text only changes once the
    /// rename has succeeded, so on error both stay as they were.
    pub fn commit(&mut self, text: String) -> EngineResult<()> {
        check_well_formed(&text).map_err(|message| EngineError::Document {
            message,
            path: self.path.clone(),
        })?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, text.as_bytes())?;
        tmp.persist(&self.path).map_err(|e| EngineError::Document {
            message: format!("cannot write document: {}", e.error),
            path: self.path.clone(),
        })?;

        self.text = text;
        Ok(())
    }

    pub fn summarize(&self, max_depth: u32) -> EngineResult<StructureSummary> {
        summarize(&self.text, max_depth).map_err(|message| EngineError::Document {
            message,
            path: self.path.clone(),
        })
    }
}

fn read_checked(path: &Path) -> EngineResult<String> {
    let text = std::fs::read_to_string(path).map_err(|e| EngineError::Document {
        message: e.to_string(),
        path: path.to_path_buf(),
    })?;
    check_well_formed(&text).map_err(|message| EngineError::Document {
        message,
        path: path.to_path_buf(),
    })?;
    Ok(text)
}

/// Element counts at one depth (the root is depth 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelSummary {
    pub depth: usize,
    pub element_count: usize,
    pub elements: BTreeMap<String, usize>,
}

/// Shape of a document, limited to `analyzed_depth` levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructureSummary {
    pub root: String,
    pub total_elements: usize,
    pub deepest_level: usize,
    pub analyzed_depth: u32,
    pub levels: Vec<LevelSummary>,
    pub attributes: BTreeMap<String, BTreeSet<String>>,
}

/// Check that `text` holds exactly one properly nested root element.
pub fn check_well_formed(text: &str) -> Result<(), String> {
    scan(text, 0).map(|_| ())
}

/// Summarize element names and attributes level by level.
pub fn summarize(text: &str, max_depth: u32) -> Result<StructureSummary, String> {
    scan(text, max_depth)
}

fn scan(text: &str, max_depth: u32) -> Result<StructureSummary, String> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().check_end_names = true;

    let mut summary = StructureSummary {
        root: String::new(),
        total_elements: 0,
        deepest_level: 0,
        analyzed_depth: max_depth,
        levels: Vec::new(),
        attributes: BTreeMap::new(),
    };
    let mut depth = 0usize;
    let mut roots = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("not well-formed at byte {}: {e}", reader.buffer_position()))?;
        match event {
            Event::Start(ref start) | Event::Empty(ref start) => {
                if depth == 0 {
                    roots += 1;
                    if roots > 1 {
                        return Err("document has more than one root element".into());
                    }
                }
                let level = depth + 1;
                record(&mut summary, start, level, max_depth)?;
                if matches!(event, Event::Start(_)) {
                    depth = level;
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
    }

    if depth > 0 {
        return Err("unexpected end of document: unclosed element".into());
    }
    if roots == 0 {
        return Err("document has no root element".into());
    }
    Ok(summary)
}

fn record(
    summary: &mut StructureSummary,
    start: &BytesStart<'_>,
    level: usize,
    max_depth: u32,
) -> Result<(), String> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let mut attribute_names = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| format!("malformed attribute on <{name}>: {e}"))?;
        attribute_names.push(String::from_utf8_lossy(attr.key.as_ref()).into_owned());
    }

    summary.total_elements += 1;
    summary.deepest_level = summary.deepest_level.max(level);
    if level == 1 {
        summary.root = name.clone();
    }

    if level > max_depth as usize {
        return Ok(());
    }
    if summary.levels.len() < level {
        summary.levels.push(LevelSummary {
            depth: level,
            element_count: 0,
            elements: BTreeMap::new(),
        });
    }
    let entry = &mut summary.levels[level - 1];
    entry.element_count += 1;
    *entry.elements.entry(name.clone()).or_default() += 1;

    if !attribute_names.is_empty() {
        summary
            .attributes
            .entry(name)
            .or_default()
            .extend(attribute_names);
    }
    Ok(())
}
