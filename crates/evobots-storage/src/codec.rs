//! Line-oriented text format shared by gene pool files and migration files.
//!
//! ```text
//! GENE_POOL            (gene pool files only)
//! FITNESS 123.5
//! GENES
//! <layer 0 weights, space separated>
//! ...                  (one line per layer)
//! BIASES
//! <layer 0 biases>
//! ...
//! END
//! ```

use evobots_brain::{Genome, LAYER_COUNT};
use evobots_core::GeneEntry;
use std::fmt::Write as _;
use std::iter::Enumerate;
use std::str::Lines;

use crate::StorageError;

pub const GENE_POOL_HEADER: &str = "GENE_POOL";

/// Which flavour of file is being read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Headed with `GENE_POOL`.
    GenePool,
    /// Bare entry blocks.
    Migrants,
}

fn push_floats(out: &mut String, values: &[f32]) {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{value}");
    }
    out.push('\n');
}

/// Render entries in the given order.
#[must_use]
pub fn encode_entries(entries: &[GeneEntry], kind: FileKind) -> String {
    let mut out = String::new();
    if kind == FileKind::GenePool {
        out.push_str(GENE_POOL_HEADER);
        out.push('\n');
    }
    for entry in entries {
        let _ = writeln!(out, "FITNESS {}", entry.fitness);
        out.push_str("GENES\n");
        for layer in entry.genome.layers() {
            push_floats(&mut out, layer.weights());
        }
        out.push_str("BIASES\n");
        for layer in entry.genome.layers() {
            push_floats(&mut out, layer.biases());
        }
        out.push_str("END\n");
    }
    out
}

/// Non-blank lines with 1-based line numbers.
struct ContentLines<'a> {
    inner: Enumerate<Lines<'a>>,
    last_line: usize,
}

impl<'a> ContentLines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.lines().enumerate(),
            last_line: 0,
        }
    }

    fn next_content(&mut self) -> Option<(usize, &'a str)> {
        for (idx, raw) in self.inner.by_ref() {
            self.last_line = idx + 1;
            let line = raw.trim();
            if !line.is_empty() {
                return Some((idx + 1, line));
            }
        }
        None
    }

    fn require(&mut self, what: &str) -> Result<(usize, &'a str), StorageError> {
        self.next_content().ok_or_else(|| StorageError::Parse {
            line: self.last_line + 1,
            message: format!("unexpected end of file, expected {what}"),
        })
    }

    fn keyword(&mut self, keyword: &str) -> Result<(), StorageError> {
        let (line, content) = self.require(keyword)?;
        if content == keyword {
            Ok(())
        } else {
            Err(StorageError::Parse {
                line,
                message: format!("expected `{keyword}`, found `{content}`"),
            })
        }
    }

    fn floats(&mut self, what: &str) -> Result<Vec<f32>, StorageError> {
        let (line, content) = self.require(what)?;
        content
            .split_whitespace()
            .map(|token| {
                token.parse::<f32>().map_err(|err| StorageError::Parse {
                    line,
                    message: format!("invalid float `{token}` in {what}: {err}"),
                })
            })
            .collect()
    }
}

fn parse_fitness(line: usize, content: &str) -> Result<f32, StorageError> {
    let value = content
        .strip_prefix("FITNESS")
        .map(str::trim)
        .ok_or_else(|| StorageError::Parse {
            line,
            message: format!("expected `FITNESS <value>`, found `{content}`"),
        })?;
    value.parse::<f32>().map_err(|err| StorageError::Parse {
        line,
        message: format!("invalid fitness `{value}`: {err}"),
    })
}

/// Parse every entry block. Entries come back in file order.
pub fn decode_entries(text: &str, kind: FileKind) -> Result<Vec<GeneEntry>, StorageError> {
    let mut lines = ContentLines::new(text);
    if kind == FileKind::GenePool {
        lines.keyword(GENE_POOL_HEADER)?;
    }
    let mut entries = Vec::new();
    while let Some((line, content)) = lines.next_content() {
        let fitness = parse_fitness(line, content)?;
        lines.keyword("GENES")?;
        let weights = (0..LAYER_COUNT)
            .map(|_| lines.floats("layer weights"))
            .collect::<Result<Vec<_>, _>>()?;
        lines.keyword("BIASES")?;
        let biases = (0..LAYER_COUNT)
            .map(|_| lines.floats("layer biases"))
            .collect::<Result<Vec<_>, _>>()?;
        lines.keyword("END")?;
        entries.push(GeneEntry::new(fitness, Genome::from_parts(weights, biases)?));
    }
    Ok(entries)
}
