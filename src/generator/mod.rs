//! Code generation from a resolved [`Model`].
//!
//! Each target implements [`CodeGenerator`] and returns one or more files. The Rust
//! target is complete (types, wire encoding, client stubs, handler traits and dispatch);
//! the C target emits declarations only.

use crate::ast::Span;
use crate::model::Model;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub mod c;
pub mod rust;

/// A code generator for one target language.
pub trait CodeGenerator {
    /// Translate the model into target source files.
    fn generate(&mut self, model: &Model) -> Result<GeneratedSource, GenerationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("{span}: {target} target cannot represent {what}")]
    Unsupported {
        target: &'static str,
        what: String,
        span: Span,
    },
    #[error("{span}: {target} target would declare `{name}` twice (first for {first})")]
    NameClash {
        target: &'static str,
        name: String,
        span: Span,
        first: String,
    },
    #[error("invalid protocol name {0:?}: expected letters and underscores only")]
    InvalidName(String),
    #[error("writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    #[default]
    Rust,
    C,
}

impl Target {
    pub fn name(self) -> &'static str {
        match self {
            Target::Rust => "rust",
            Target::C => "c",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rust" | "rs" => Ok(Target::Rust),
            "c" => Ok(Target::C),
            other => Err(format!("unknown target `{}` (expected rust or c)", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Protocol name: prefixes C identifiers and names the output files.
    pub name: String,
    /// Path of the runtime crate used by generated Rust code.
    pub runtime_crate: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            name: "protocol".to_string(),
            runtime_crate: "vixrpcgen".to_string(),
        }
    }
}

impl GeneratorConfig {
    pub fn new(name: impl Into<String>) -> Self {
        GeneratorConfig {
            name: name.into(),
            ..GeneratorConfig::default()
        }
    }

    pub fn check_name(&self) -> Result<(), GenerationError> {
        if is_valid_name(&self.name) {
            Ok(())
        } else {
            Err(GenerationError::InvalidName(self.name.clone()))
        }
    }
}

/// `[A-Za-z_]+`
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic() || c == '_')
}

/// Generated files, as `(relative path, contents)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedSource {
    pub files: Vec<(PathBuf, String)>,
}

impl GeneratedSource {
    pub fn single(path: impl Into<PathBuf>, contents: String) -> Self {
        GeneratedSource {
            files: vec![(path.into(), contents)],
        }
    }

    /// Contents of the file at `path`, if generated.
    pub fn file(&self, path: impl AsRef<Path>) -> Option<&str> {
        self.files
            .iter()
            .find(|(p, _)| p == path.as_ref())
            .map(|(_, c)| c.as_str())
    }

    /// Write every file under `dir`, creating it if needed. Returns the written paths.
    pub fn write_to_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, GenerationError> {
        std::fs::create_dir_all(dir).map_err(|source| GenerationError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut written = Vec::with_capacity(self.files.len());
        for (rel, contents) in &self.files {
            let path = dir.join(rel);
            std::fs::write(&path, contents).map_err(|source| GenerationError::Io {
                path: path.clone(),
                source,
            })?;
            tracing::debug!(path = %path.display(), bytes = contents.len(), "wrote generated file");
            written.push(path);
        }
        Ok(written)
    }
}

/// Generate source for `target`.
pub fn generate(
    model: &Model,
    target: Target,
    config: &GeneratorConfig,
) -> Result<GeneratedSource, GenerationError> {
    config.check_name()?;
    tracing::debug!(%target, name = %config.name, "generating");
    match target {
        Target::Rust => rust::RustGenerator::new(config.clone()).generate(model),
        Target::C => c::CGenerator::new(config.clone()).generate(model),
    }
}

/// Names declared in one scope of the generated source, with what declared them.
pub(crate) struct NameTable {
    target: &'static str,
    seen: HashMap<String, String>,
}

impl NameTable {
    pub(crate) fn new(target: &'static str) -> Self {
        NameTable {
            target,
            seen: HashMap::new(),
        }
    }

    /// Names the generator itself declares in this scope.
    pub(crate) fn reserve(mut self, names: &[&str]) -> Self {
        for name in names {
            self.seen.insert(name.to_string(), "a generated item".to_string());
        }
        self
    }

    pub(crate) fn claim(&mut self, name: impl Into<String>, span: Span, owner: &str) -> Result<(), GenerationError> {
        let name = name.into();
        if let Some(first) = self.seen.get(&name) {
            return Err(GenerationError::NameClash {
                target: self.target,
                name,
                span,
                first: first.clone(),
            });
        }
        self.seen.insert(name, format!("{} at {}", owner, span));
        Ok(())
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.seen.contains_key(name)
    }
}

/// Line-oriented source builder with indentation.
pub(crate) struct SourceWriter {
    out: String,
    indent: usize,
    width: usize,
}

impl SourceWriter {
    pub(crate) fn new(width: usize) -> Self {
        SourceWriter {
            out: String::new(),
            indent: 0,
            width,
        }
    }

    pub(crate) fn line(&mut self, content: impl AsRef<str>) {
        let content = content.as_ref();
        if !content.is_empty() {
            self.out.push_str(&" ".repeat(self.indent * self.width));
            self.out.push_str(content);
        }
        self.out.push('\n');
    }

    pub(crate) fn blank(&mut self) {
        self.out.push('\n');
    }

    pub(crate) fn indent(&mut self) {
        self.indent += 1;
    }

    pub(crate) fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Write `open`, the indented body, then `close`.
    pub(crate) fn block(&mut self, open: impl AsRef<str>, close: &str, body: impl FnOnce(&mut Self)) {
        self.line(open);
        self.indent();
        body(self);
        self.dedent();
        self.line(close);
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }
}
