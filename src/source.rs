// src/source.rs
use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// One match pattern for a watched source. A plain string matches literally
/// (case-insensitive, the way gazette headers vary between "EDIÇÃO:" and
/// "Edição:"); an explicit `{ regex = "..." }` entry is compiled as written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PatternSpec {
    Literal(String),
    Regex { regex: String },
}

impl PatternSpec {
    /// Human-readable label carried on each occurrence.
    pub fn label(&self) -> &str {
        match self {
            PatternSpec::Literal(s) => s,
            PatternSpec::Regex { regex } => regex,
        }
    }

    pub fn compile(&self) -> Result<Regex> {
        match self {
            PatternSpec::Literal(s) => RegexBuilder::new(&regex::escape(s))
                .case_insensitive(true)
                .build()
                .with_context(|| format!("compiling literal pattern {s:?}")),
            PatternSpec::Regex { regex } => Regex::new(regex)
                .with_context(|| format!("compiling regex pattern {regex:?}")),
        }
    }
}

/// Immutable descriptor for one watched document. Created at configuration
/// load and never mutated afterwards; identity is `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceSpec {
    /// Stable identity. Derived from `location` when left empty in config.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    pub location: String,
    pub patterns: Vec<PatternSpec>,
}

impl SourceSpec {
    /// Fill in `id` and `display_name` when the config omitted them.
    pub fn normalize(&mut self) {
        if self.id.trim().is_empty() {
            self.id = slug_from_location(&self.location);
        }
        if self.display_name.trim().is_empty() {
            self.display_name = self.id.clone();
        }
    }
}

/// A source with its patterns compiled, ready for the extractor.
#[derive(Debug, Clone)]
pub struct CompiledSource {
    pub spec: SourceSpec,
    pub patterns: Vec<CompiledPattern>,
}

#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub label: String,
    pub re: Regex,
}

impl CompiledSource {
    pub fn compile(spec: SourceSpec) -> Result<Self> {
        let patterns = spec
            .patterns
            .iter()
            .map(|p| {
                Ok(CompiledPattern {
                    label: p.label().to_string(),
                    re: p.compile()?,
                })
            })
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("compiling patterns for source {:?}", spec.id))?;
        Ok(Self { spec, patterns })
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }
}

/// Derive a stable id from a URL: host + path, lowercased, squeezed to
/// `[a-z0-9-]`. "https://consaude.org.br/diario-oficial/" becomes
/// "consaude-org-br-diario-oficial".
pub fn slug_from_location(location: &str) -> String {
    let stripped = location
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let mut slug = String::with_capacity(stripped.len());
    let mut last_dash = true;
    for c in stripped.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
