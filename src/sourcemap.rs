//! Source map decoding and source-mapped error enrichment
//!
//! Built modules run from bundled output, so failures report positions in
//! the bundle. [`ErrorSourceMapper`] rewrites those positions to the line and
//! column in the authored document using the build's source map
//! ([Source Map v3](https://sourcemaps.info/spec.html)).
//!
//! Enrichment never fails: frames that cannot be resolved are passed through
//! unmodified.

use crate::error::ErrorObject;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

static STACK_FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*at (?:.+? \()?)(.+?):(\d+):(\d+)(\)?)\s*$").expect("stack frame pattern is valid")
});

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap {
    version: u32,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    source_root: Option<String>,
    #[serde(default)]
    sources: Vec<Option<String>>,
    #[serde(default)]
    names: Vec<String>,
    mappings: String,
}

/// One decoded mapping segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    generated_column: u32,
    original: Option<OriginalRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OriginalRef {
    source: u32,
    line: u32,
    column: u32,
    name: Option<u32>,
}

/// Position in the authored source (1-based line and column)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalLocation {
    pub source: String,
    pub line: u32,
    pub column: u32,
    pub name: Option<String>,
}

/// Decoded source map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMap {
    file: Option<String>,
    sources: Vec<String>,
    names: Vec<String>,
    /// Segments per generated line, sorted by generated column
    lines: Vec<Vec<Segment>>,
}

impl SourceMap {
    /// Parse a version 3 source map from JSON text
    pub fn parse(json: &str) -> Result<Self, ErrorObject> {
        let raw: RawSourceMap = serde_json::from_str(json)?;

        if raw.version != 3 {
            return Err(ErrorObject::new(format!(
                "unsupported source map version {}",
                raw.version
            ))
            .with_name("SourceMapError"));
        }

        let root = raw
            .source_root
            .filter(|root| !root.is_empty())
            .map(|root| root.trim_end_matches('/').to_string());
        let sources = raw
            .sources
            .into_iter()
            .map(|source| {
                let source = source.unwrap_or_default();
                match &root {
                    Some(root) => format!("{}/{}", root, source),
                    None => source,
                }
            })
            .collect();

        Ok(Self {
            file: raw.file,
            sources,
            names: raw.names,
            lines: decode_mappings(&raw.mappings)?,
        })
    }

    /// Name of the generated file this map describes, if recorded
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Resolve a 1-based generated position to its original position
    pub fn lookup(&self, line: u32, column: u32) -> Option<OriginalLocation> {
        let segments = self.lines.get(line.checked_sub(1)? as usize)?;
        let column = column.saturating_sub(1);

        let index = segments.partition_point(|segment| segment.generated_column <= column);
        let segment = if index == 0 {
            segments.first()?
        } else {
            &segments[index - 1]
        };

        let original = segment.original?;
        Some(OriginalLocation {
            source: self.sources.get(original.source as usize)?.clone(),
            line: original.line + 1,
            column: original.column + 1,
            name: original
                .name
                .and_then(|name| self.names.get(name as usize).cloned()),
        })
    }
}

fn decode_mappings(mappings: &str) -> Result<Vec<Vec<Segment>>, ErrorObject> {
    let mut lines = Vec::new();
    let (mut source, mut original_line, mut original_column, mut name) = (0i64, 0i64, 0i64, 0i64);

    for line in mappings.split(';') {
        let mut segments = Vec::new();
        let mut generated_column = 0i64;

        for segment in line.split(',').filter(|s| !s.is_empty()) {
            let fields = decode_vlq(segment)?;

            generated_column += fields[0];
            let original = match fields.len() {
                1 => None,
                4 | 5 => {
                    source += fields[1];
                    original_line += fields[2];
                    original_column += fields[3];
                    let segment_name = if fields.len() == 5 {
                        name += fields[4];
                        Some(to_u32(name)?)
                    } else {
                        None
                    };
                    Some(OriginalRef {
                        source: to_u32(source)?,
                        line: to_u32(original_line)?,
                        column: to_u32(original_column)?,
                        name: segment_name,
                    })
                }
                n => {
                    return Err(ErrorObject::new(format!(
                        "invalid mapping segment {:?} with {} fields",
                        segment, n
                    ))
                    .with_name("SourceMapError"))
                }
            };

            segments.push(Segment {
                generated_column: to_u32(generated_column)?,
                original,
            });
        }

        segments.sort_by_key(|segment| segment.generated_column);
        lines.push(segments);
    }

    Ok(lines)
}

fn to_u32(value: i64) -> Result<u32, ErrorObject> {
    u32::try_from(value).map_err(|_| {
        ErrorObject::new(format!("mapping value out of range: {}", value)).with_name("SourceMapError")
    })
}

/// Decode one Base64 VLQ segment into its signed fields
fn decode_vlq(segment: &str) -> Result<Vec<i64>, ErrorObject> {
    let mut fields = Vec::with_capacity(5);
    let mut value: i64 = 0;
    let mut shift = 0u32;

    for byte in segment.bytes() {
        let digit = BASE64_ALPHABET
            .iter()
            .position(|&b| b == byte)
            .ok_or_else(|| {
                ErrorObject::new(format!("invalid base64 character {:?} in mappings", byte as char))
                    .with_name("SourceMapError")
            })? as i64;

        if shift > 60 {
            return Err(ErrorObject::new("VLQ value too large").with_name("SourceMapError"));
        }

        value += (digit & 0b11111) << shift;
        if digit & 0b100000 != 0 {
            shift += 5;
            continue;
        }

        let magnitude = value >> 1;
        fields.push(if value & 1 == 1 { -magnitude } else { magnitude });
        value = 0;
        shift = 0;
    }

    if shift != 0 {
        return Err(ErrorObject::new("truncated VLQ segment").with_name("SourceMapError"));
    }

    Ok(fields)
}

/// Rewrites failure locations from bundled output to the authored document
pub struct ErrorSourceMapper;

impl ErrorSourceMapper {
    /// Enrich `error` with original-source locations.
    ///
    /// Frames are resolved only when they point into the bundle: the frame's
    /// file is the document itself, or has the file name recorded in the map.
    pub fn enrich(error: ErrorObject, document_path: &Path, source_map: Option<&SourceMap>) -> ErrorObject {
        let Some(map) = source_map else {
            return error;
        };

        let mut first_resolved = None;
        let stack = error.stack.map(|stack| {
            stack
                .lines()
                .map(|line| match Self::rewrite_frame(line, document_path, map) {
                    Some((rewritten, location)) => {
                        first_resolved.get_or_insert(location);
                        rewritten
                    }
                    None => line.to_string(),
                })
                .collect::<Vec<_>>()
                .join("\n")
        });

        let message = match &first_resolved {
            Some(location) => {
                debug!("[sourcemap] Mapped error location to {}", location);
                format!("{} (at {})", error.message, location)
            }
            None => error.message,
        };

        ErrorObject {
            message,
            stack,
            name: error.name,
            cause: error
                .cause
                .map(|cause| Box::new(Self::enrich(*cause, document_path, Some(map)))),
        }
    }

    fn rewrite_frame(line: &str, document_path: &Path, map: &SourceMap) -> Option<(String, String)> {
        let caps = STACK_FRAME.captures(line)?;
        let file = &caps[2];
        if !Self::is_bundle_frame(file, document_path, map) {
            return None;
        }

        let generated_line: u32 = caps[3].parse().ok()?;
        let generated_column: u32 = caps[4].parse().ok()?;
        let original = map.lookup(generated_line, generated_column)?;

        let source = if file_name(Path::new(&original.source)) == file_name(document_path) {
            document_path.display().to_string()
        } else {
            original.source.clone()
        };
        let location = format!("{}:{}:{}", source, original.line, original.column);

        Some((format!("{}{}{}", &caps[1], location, &caps[5]), location))
    }

    fn is_bundle_frame(file: &str, document_path: &Path, map: &SourceMap) -> bool {
        if Path::new(file) == document_path {
            return true;
        }

        match map.file() {
            Some(bundle) => file_name(Path::new(file)) == file_name(Path::new(bundle)),
            None => false,
        }
    }
}

fn file_name(path: &Path) -> Option<&std::ffi::OsStr> {
    path.file_name()
}
