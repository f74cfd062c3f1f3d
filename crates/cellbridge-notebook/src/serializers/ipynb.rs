//! IPython notebook (nbformat 3) serializer.
//!
//! nbformat 3 has no notion of stable cell or worksheet ids, so those (and
//! non-numeric prompts) are stored under a `cellbridge` key in the matching
//! metadata object and stripped again on parse. Files written by other tools
//! parse fine: missing ids are generated and legacy flat output keys
//! (`text`, `html`, `png`, ...) are mapped to MIME types.

use cellbridge_core::notebook::{Cell, CellOutput, CellType, Metadata, MimetypeBundle, Notebook, Worksheet};
use cellbridge_core::{CellId, NotebookId, WorksheetId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{NotebookFormat, NotebookSerializer};
use crate::errors::{NotebookError, Result};

const NBFORMAT: u32 = 3;
const NBFORMAT_MINOR: u32 = 0;
const MARKER_KEY: &str = "cellbridge";
const DEFAULT_LANGUAGE: &str = "python";

/// Legacy nbformat 3 output keys and the MIME types they carry.
const LEGACY_OUTPUT_KEYS: &[(&str, &str)] = &[
    ("text", "text/plain"),
    ("html", "text/html"),
    ("latex", "text/latex"),
    ("png", "image/png"),
    ("jpeg", "image/jpeg"),
    ("svg", "image/svg+xml"),
    ("json", "application/json"),
    ("javascript", "application/javascript"),
];

/// Reads and writes `.ipynb` files in nbformat 3 layout.
#[derive(Clone, Copy, Debug, Default)]
pub struct IpynbSerializer;

impl NotebookSerializer for IpynbSerializer {
    fn format(&self) -> NotebookFormat {
        NotebookFormat::Ipynb
    }

    fn parse(&self, data: &[u8]) -> Result<Notebook> {
        let doc: IpynbDocument = serde_json::from_slice(data)?;
        if doc.nbformat != NBFORMAT {
            return Err(NotebookError::UnsupportedFormat(format!(
                "nbformat {}",
                doc.nbformat
            )));
        }
        Ok(from_ipynb(doc))
    }

    fn stringify(&self, notebook: &Notebook) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&to_ipynb(notebook))?)
    }
}

#[derive(Serialize, Deserialize)]
struct IpynbDocument {
    #[serde(default)]
    metadata: Metadata,
    nbformat: u32,
    #[serde(default)]
    nbformat_minor: u32,
    #[serde(default)]
    worksheets: Vec<IpynbWorksheet>,
}

#[derive(Serialize, Deserialize)]
struct IpynbWorksheet {
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    cells: Vec<IpynbCell>,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
enum IpynbCell {
    Code {
        #[serde(default)]
        input: Text,
        #[serde(default)]
        language: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt_number: Option<u64>,
        #[serde(default)]
        outputs: Vec<IpynbOutput>,
        #[serde(default)]
        metadata: Metadata,
    },
    Markdown {
        #[serde(default)]
        source: Text,
        #[serde(default)]
        metadata: Metadata,
    },
    Heading {
        #[serde(default)]
        source: Text,
        #[serde(default = "default_heading_level")]
        level: u8,
        #[serde(default)]
        metadata: Metadata,
    },
}

fn default_heading_level() -> u8 {
    1
}

#[derive(Serialize, Deserialize)]
struct IpynbOutput {
    output_type: String,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    data: MimetypeBundle,
    #[serde(flatten)]
    legacy: Map<String, Value>,
}

/// Source text stored either as one string or as a list of lines.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Text {
    One(String),
    Lines(Vec<String>),
}

impl Default for Text {
    fn default() -> Self {
        Self::One(String::new())
    }
}

impl Text {
    fn into_string(self) -> String {
        match self {
            Self::One(s) => s,
            // nbformat lines keep their trailing newlines
            Self::Lines(lines) => lines.concat(),
        }
    }
}

// ── Writing ─────────────────────────────────────────────────────────────────

fn to_ipynb(notebook: &Notebook) -> IpynbDocument {
    let mut marker = Map::new();
    let _ = marker.insert("id".into(), Value::String(notebook.id.to_string()));

    IpynbDocument {
        metadata: with_marker(&notebook.metadata, marker),
        nbformat: NBFORMAT,
        nbformat_minor: NBFORMAT_MINOR,
        worksheets: notebook.worksheets.iter().map(worksheet_to_ipynb).collect(),
    }
}

fn worksheet_to_ipynb(worksheet: &Worksheet) -> IpynbWorksheet {
    let mut marker = Map::new();
    let _ = marker.insert("id".into(), Value::String(worksheet.id.to_string()));
    let _ = marker.insert("name".into(), Value::String(worksheet.name.clone()));

    IpynbWorksheet {
        metadata: with_marker(&worksheet.metadata, marker),
        cells: worksheet.cells.iter().map(cell_to_ipynb).collect(),
    }
}

fn cell_to_ipynb(cell: &Cell) -> IpynbCell {
    let mut marker = Map::new();
    let _ = marker.insert("id".into(), Value::String(cell.id.to_string()));
    let source = Text::One(cell.source.clone());

    match cell.cell_type {
        CellType::Code => {
            let prompt_number = cell.prompt.as_deref().and_then(|p| p.parse().ok());
            if let (Some(prompt), None) = (&cell.prompt, prompt_number) {
                let _ = marker.insert("prompt".into(), Value::String(prompt.clone()));
            }
            IpynbCell::Code {
                input: source,
                language: Some(DEFAULT_LANGUAGE.to_string()),
                prompt_number,
                outputs: cell.outputs.iter().map(output_to_ipynb).collect(),
                metadata: with_marker(&cell.metadata, marker),
            }
        }
        CellType::Markdown => IpynbCell::Markdown {
            source,
            metadata: with_marker(&cell.metadata, marker),
        },
        CellType::Heading => IpynbCell::Heading {
            source,
            level: default_heading_level(),
            metadata: with_marker(&cell.metadata, marker),
        },
    }
}

fn output_to_ipynb(output: &CellOutput) -> IpynbOutput {
    IpynbOutput {
        output_type: output.output_type.clone(),
        metadata: Metadata::new(),
        data: output.mimetype_bundle.clone(),
        legacy: Map::new(),
    }
}

fn with_marker(metadata: &Metadata, marker: Map<String, Value>) -> Metadata {
    let mut metadata = metadata.clone();
    let _ = metadata.insert(MARKER_KEY.into(), Value::Object(marker));
    metadata
}

// ── Reading ─────────────────────────────────────────────────────────────────

fn from_ipynb(doc: IpynbDocument) -> Notebook {
    let mut metadata = doc.metadata;
    let marker = take_marker(&mut metadata);

    Notebook {
        id: marker_str(&marker, "id").map_or_else(NotebookId::new, NotebookId::from),
        metadata,
        worksheets: doc.worksheets.into_iter().map(worksheet_from_ipynb).collect(),
    }
}

fn worksheet_from_ipynb(worksheet: IpynbWorksheet) -> Worksheet {
    let mut metadata = worksheet.metadata;
    let marker = take_marker(&mut metadata);

    Worksheet {
        id: marker_str(&marker, "id").map_or_else(WorksheetId::new, WorksheetId::from),
        name: marker_str(&marker, "name").unwrap_or_default(),
        metadata,
        cells: worksheet.cells.into_iter().map(cell_from_ipynb).collect(),
    }
}

fn cell_from_ipynb(cell: IpynbCell) -> Cell {
    let (cell_type, source, prompt_number, outputs, mut metadata) = match cell {
        IpynbCell::Code {
            input,
            prompt_number,
            outputs,
            metadata,
            ..
        } => (CellType::Code, input, prompt_number, outputs, metadata),
        IpynbCell::Markdown { source, metadata } => {
            (CellType::Markdown, source, None, Vec::new(), metadata)
        }
        IpynbCell::Heading {
            source, metadata, ..
        } => (CellType::Heading, source, None, Vec::new(), metadata),
    };
    let marker = take_marker(&mut metadata);

    Cell {
        id: marker_str(&marker, "id").map_or_else(CellId::new, CellId::from),
        cell_type,
        source: source.into_string(),
        prompt: marker_str(&marker, "prompt").or_else(|| prompt_number.map(|n| n.to_string())),
        metadata,
        outputs: outputs.into_iter().map(output_from_ipynb).collect(),
    }
}

fn output_from_ipynb(output: IpynbOutput) -> CellOutput {
    let IpynbOutput {
        output_type,
        data,
        mut legacy,
        ..
    } = output;

    let output_type = match output_type.as_str() {
        "pyout" => "result".to_string(),
        "pyerr" => "error".to_string(),
        "stream" => legacy
            .remove("stream")
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or(output_type),
        _ => output_type,
    };

    let mut bundle = data;
    for (key, mimetype) in LEGACY_OUTPUT_KEYS {
        if let Some(value) = legacy.remove(*key) {
            let _ = bundle
                .entry((*mimetype).to_string())
                .or_insert_with(|| join_lines(value));
        }
    }
    if let (Some(name), Some(message)) = (legacy.get("ename"), legacy.get("evalue")) {
        let text = format!(
            "{}: {}",
            name.as_str().unwrap_or_default(),
            message.as_str().unwrap_or_default()
        );
        let _ = bundle
            .entry("text/plain".to_string())
            .or_insert(Value::String(text));
    }

    CellOutput {
        output_type,
        mimetype_bundle: bundle,
    }
}

fn join_lines(value: Value) -> Value {
    match value {
        Value::Array(lines) if lines.iter().all(Value::is_string) => Value::String(
            lines
                .iter()
                .filter_map(Value::as_str)
                .collect::<String>(),
        ),
        other => other,
    }
}

fn take_marker(metadata: &mut Metadata) -> Map<String, Value> {
    match metadata.remove(MARKER_KEY) {
        Some(Value::Object(marker)) => marker,
        _ => Map::new(),
    }
}

fn marker_str(marker: &Map<String, Value>, key: &str) -> Option<String> {
    marker.get(key).and_then(Value::as_str).map(str::to_owned)
}
