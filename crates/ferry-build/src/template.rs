//! Two ways of filling placeholders in manifests.
//!
//! - [`TemplateEngine`]: full template evaluation with configurable
//!   delimiters, conditionals, loops and helper filters. Files are rewritten
//!   in place.
//! - [`safe_substitute`]: literal `{{ .Field }}` replacement from a struct
//!   of strings, with no template logic at all. Used for documents that must
//!   not be able to run template code.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use ferry_core::{Task, TaskError};
use minijinja::syntax::SyntaxConfig;
use minijinja::{AutoEscape, Environment, ErrorKind, UndefinedBehavior, Value};
use regex::Regex;
use serde::Serialize;

/// Pre-template-era placeholder for the image tag, replaced after rendering.
pub const LEGACY_DOCKER_TAG: &str = "%%DOCKER_TAG%%";

/// Go-style `.Field` reference at the start of an expression or after an
/// operator.
static DOT_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[\s(|,!=<>+*/\[-])\.([A-Za-z_])").expect("static regex is valid")
});

/// Single- or double-quoted string literal inside an expression.
static STRING_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'"#).expect("static regex is valid")
});

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template not found: {path}")]
    NotFound { path: PathBuf },

    #[error("expected a file but {path} is a directory")]
    IsDirectory { path: PathBuf },

    #[error("expected a directory but {path} is not one")]
    NotADirectory { path: PathBuf },

    #[error("invalid template delimiters")]
    Syntax { source: minijinja::Error },

    #[error("failed to parse template {name}")]
    Parse {
        name: String,
        source: minijinja::Error,
    },

    #[error("failed to render template {name}")]
    Render {
        name: String,
        source: minijinja::Error,
    },

    #[error("template {name} is not valid UTF-8")]
    InvalidUtf8 {
        name: String,
        source: std::string::FromUtf8Error,
    },

    #[error("field {field} is not a string; safe substitution only accepts string fields")]
    TypeMismatch { field: String },

    #[error("safe substitution data must be a struct of string fields")]
    NotAStruct,

    #[error("failed to serialise substitution data")]
    Serialize { source: serde_json::Error },

    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl TemplateError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TemplateError::NotFound { .. })
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, TemplateError::TypeMismatch { .. })
    }
}

/// Start/end markers for expressions, blocks and comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub variable: (String, String),
    pub block: (String, String),
    pub comment: (String, String),
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            variable: ("[[".to_owned(), "]]".to_owned()),
            block: ("[%".to_owned(), "%]".to_owned()),
            comment: ("[#".to_owned(), "#]".to_owned()),
        }
    }
}

/// Full template evaluation over strings, files and directory trees.
pub struct TemplateEngine {
    env: Environment<'static>,
    expression: Regex,
    legacy: Vec<(String, String)>,
}

impl fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("legacy", &self.legacy)
            .finish_non_exhaustive()
    }
}

impl TemplateEngine {
    pub fn new(delimiters: &Delimiters) -> Result<Self, TemplateError> {
        let syntax = SyntaxConfig::builder()
            .variable_delimiters(delimiters.variable.0.clone(), delimiters.variable.1.clone())
            .block_delimiters(delimiters.block.0.clone(), delimiters.block.1.clone())
            .comment_delimiters(delimiters.comment.0.clone(), delimiters.comment.1.clone())
            .build()
            .map_err(|e| TemplateError::Syntax { source: e })?;

        let mut env = Environment::new();
        env.set_syntax(syntax);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.add_filter("short_duration", short_duration);
        env.add_filter("url_string", url_string);
        env.add_function("short_duration", short_duration);
        env.add_function("url_string", url_string);

        let expression = Regex::new(&format!(
            r"(?s)({}|{})(.*?)({}|{})",
            regex::escape(&delimiters.variable.0),
            regex::escape(&delimiters.block.0),
            regex::escape(&delimiters.variable.1),
            regex::escape(&delimiters.block.1),
        ))
        .expect("escaped delimiters form a valid regex");

        Ok(Self {
            env,
            expression,
            legacy: Vec::new(),
        })
    }

    /// Also replace the literal `token` with `value` after rendering.
    pub fn with_legacy_token(mut self, token: impl Into<String>, value: impl Into<String>) -> Self {
        self.legacy.push((token.into(), value.into()));
        self
    }

    /// Render `source` against `context`. `name` only labels errors.
    pub fn render_str<C: Serialize>(
        &self,
        name: &str,
        source: &str,
        context: &C,
    ) -> Result<String, TemplateError> {
        let source = self.normalise(source);
        let mut rendered = self
            .env
            .render_named_str(name, &source, context)
            .map_err(|e| {
                if e.kind() == ErrorKind::SyntaxError {
                    TemplateError::Parse {
                        name: name.to_owned(),
                        source: e,
                    }
                } else {
                    TemplateError::Render {
                        name: name.to_owned(),
                        source: e,
                    }
                }
            })?;
        for (token, value) in &self.legacy {
            rendered = rendered.replace(token.as_str(), value);
        }
        Ok(rendered)
    }

    pub fn render_bytes<C: Serialize>(
        &self,
        name: &str,
        input: &[u8],
        context: &C,
    ) -> Result<Vec<u8>, TemplateError> {
        let source = String::from_utf8(input.to_vec()).map_err(|e| TemplateError::InvalidUtf8 {
            name: name.to_owned(),
            source: e,
        })?;
        self.render_str(name, &source, context).map(String::into_bytes)
    }

    /// Render one file and overwrite it with the result.
    pub fn render_file<C: Serialize>(&self, path: &Path, context: &C) -> Result<(), TemplateError> {
        let metadata = metadata(path)?;
        if metadata.is_dir() {
            return Err(TemplateError::IsDirectory {
                path: path.to_path_buf(),
            });
        }

        let input = std::fs::read(path).map_err(|e| io(path, e))?;
        let output = self.render_bytes(&path.display().to_string(), &input, context)?;
        if output != input {
            std::fs::write(path, output).map_err(|e| io(path, e))?;
        }
        tracing::debug!(path = %path.display(), "rendered template");
        Ok(())
    }

    /// Render every regular file below `dir` in place. Symlinks and other
    /// special entries are skipped. Returns the rendered paths, sorted.
    pub fn render_dir<C: Serialize>(
        &self,
        dir: &Path,
        context: &C,
    ) -> Result<Vec<PathBuf>, TemplateError> {
        if !metadata(dir)?.is_dir() {
            return Err(TemplateError::NotADirectory {
                path: dir.to_path_buf(),
            });
        }

        let mut files = Vec::new();
        collect_files(dir, &mut files)?;
        files.sort();
        for file in &files {
            self.render_file(file, context)?;
        }
        Ok(files)
    }

    /// [`render_file`](Self::render_file) or [`render_dir`](Self::render_dir),
    /// depending on what `path` is.
    pub fn render_path<C: Serialize>(
        &self,
        path: &Path,
        context: &C,
    ) -> Result<Vec<PathBuf>, TemplateError> {
        if metadata(path)?.is_dir() {
            self.render_dir(path, context)
        } else {
            self.render_file(path, context)?;
            Ok(vec![path.to_path_buf()])
        }
    }

    /// Strip Go-style leading dots (`.SHA` → `SHA`) inside expressions and
    /// blocks.
    fn normalise(&self, source: &str) -> String {
        self.expression
            .replace_all(source, |caps: &regex::Captures<'_>| {
                let body = strip_dot_references(&caps[2]);
                format!("{}{}{}", &caps[1], body, &caps[3])
            })
            .into_owned()
    }
}

/// Drop the leading dot of Go field references, leaving string literals
/// untouched.
fn strip_dot_references(body: &str) -> String {
    let literals: Vec<_> = STRING_LITERAL.find_iter(body).map(|m| m.range()).collect();
    DOT_REFERENCE
        .replace_all(body, |caps: &regex::Captures<'_>| {
            let start = caps.get(0).map_or(0, |m| m.start());
            let dot = start + caps[1].len();
            if literals.iter().any(|literal| literal.contains(&dot)) {
                caps[0].to_owned()
            } else {
                format!("{}{}", &caps[1], &caps[2])
            }
        })
        .into_owned()
}

/// Copy a directory tree, skipping symlinks and other special entries.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<(), TemplateError> {
    if !metadata(src)?.is_dir() {
        return Err(TemplateError::NotADirectory {
            path: src.to_path_buf(),
        });
    }
    std::fs::create_dir_all(dst).map_err(|e| io(dst, e))?;

    for entry in std::fs::read_dir(src).map_err(|e| io(src, e))? {
        let entry = entry.map_err(|e| io(src, e))?;
        let path = entry.path();
        let target = dst.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| io(&path, e))?;
        if file_type.is_dir() {
            copy_dir(&path, &target)?;
        } else if file_type.is_file() {
            std::fs::copy(&path, &target).map_err(|e| io(&path, e))?;
        } else {
            tracing::debug!(path = %path.display(), "not a regular file, skipping");
        }
    }
    Ok(())
}

/// Replace `{{ .Field }}` tokens with the string fields of `data`.
///
/// Every field of `data` must serialise to a string; anything else is a
/// [`TemplateError::TypeMismatch`]. Nothing but exact tokens for known
/// fields is touched, and values are inserted verbatim in a single pass.
pub fn safe_substitute<T: Serialize>(input: &[u8], data: &T) -> Result<Vec<u8>, TemplateError> {
    let value = serde_json::to_value(data).map_err(|e| TemplateError::Serialize { source: e })?;
    let serde_json::Value::Object(fields) = value else {
        return Err(TemplateError::NotAStruct);
    };

    let mut values = std::collections::HashMap::with_capacity(fields.len());
    for (field, value) in fields {
        match value {
            serde_json::Value::String(s) => {
                values.insert(format!("{{{{ .{field} }}}}"), s);
            }
            _ => return Err(TemplateError::TypeMismatch { field }),
        }
    }
    if values.is_empty() {
        return Ok(input.to_vec());
    }

    let pattern = values
        .keys()
        .map(|token| regex::escape(token))
        .collect::<Vec<_>>()
        .join("|");
    let tokens = regex::bytes::Regex::new(&pattern).expect("escaped tokens form a valid regex");

    let output = tokens.replace_all(input, |caps: &regex::bytes::Captures<'_>| {
        let token = String::from_utf8_lossy(&caps[0]);
        values
            .get(token.as_ref())
            .map(|v| v.as_bytes().to_vec())
            .unwrap_or_else(|| caps[0].to_vec())
    });
    Ok(output.into_owned())
}

/// Renders files or directory trees in place as a workflow step.
pub struct TemplateTask<C> {
    name: String,
    paths: Vec<PathBuf>,
    engine: Arc<TemplateEngine>,
    context: C,
}

impl<C: Serialize + Send + Sync> TemplateTask<C> {
    pub fn new(
        name: impl Into<String>,
        engine: Arc<TemplateEngine>,
        paths: Vec<PathBuf>,
        context: C,
    ) -> Self {
        Self {
            name: name.into(),
            paths,
            engine,
            context,
        }
    }
}

impl<C> fmt::Display for TemplateTask<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("template")?;
        for path in &self.paths {
            write!(f, " {}", path.display())?;
        }
        Ok(())
    }
}

#[async_trait]
impl<C: Serialize + Send + Sync> Task for TemplateTask<C> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), TaskError> {
        for path in &self.paths {
            let rendered = self
                .engine
                .render_path(path, &self.context)
                .map_err(|e| TaskError::failed(&self.name, e))?;
            tracing::info!(path = %path.display(), files = rendered.len(), "templated");
        }
        Ok(())
    }
}

fn short_duration(value: Value) -> Result<String, minijinja::Error> {
    let duration = if let Some(raw) = value.as_str() {
        ferry_core::duration::parse_duration(raw).map_err(|e| {
            minijinja::Error::new(ErrorKind::InvalidOperation, e.to_string())
        })?
    } else if let Some(secs) = value.as_i64().filter(|s| *s >= 0) {
        std::time::Duration::from_secs(secs.unsigned_abs())
    } else {
        return Err(minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("short_duration expects a duration string or seconds, got {value}"),
        ));
    };
    Ok(ferry_core::duration::short_duration(duration))
}

fn url_string(value: Value) -> Result<String, minijinja::Error> {
    let raw = value.as_str().ok_or_else(|| {
        minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("url_string expects a string, got {value}"),
        )
    })?;
    reqwest::Url::parse(raw)
        .map(|url| url.to_string())
        .map_err(|e| minijinja::Error::new(ErrorKind::InvalidOperation, format!("{raw}: {e}")))
}

fn metadata(path: &Path) -> Result<std::fs::Metadata, TemplateError> {
    std::fs::metadata(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            TemplateError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            io(path, e)
        }
    })
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), TemplateError> {
    for entry in std::fs::read_dir(dir).map_err(|e| io(dir, e))? {
        let entry = entry.map_err(|e| io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| io(&path, e))?;
        if file_type.is_dir() {
            collect_files(&path, files)?;
        } else if file_type.is_file() {
            files.push(path);
        } else {
            tracing::debug!(path = %path.display(), "not a regular file, skipping");
        }
    }
    Ok(())
}

fn io(path: &Path, source: std::io::Error) -> TemplateError {
    TemplateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_strips_go_dots_inside_expressions_only() {
        let engine = TemplateEngine::new(&Delimiters::default()).unwrap();
        let out = engine.normalise(
            "a: [[ .SHA ]] b: {{ .Values.x }} c: [% if .Tag %]t[% endif %] d: [[ x | f(.Y) ]] e: 1.5",
        );
        assert_eq!(
            out,
            "a: [[ SHA ]] b: {{ .Values.x }} c: [% if Tag %]t[% endif %] d: [[ x | f(Y) ]] e: 1.5"
        );
    }

    #[test]
    fn normalise_handles_nested_references_and_trim_markers() {
        let engine = TemplateEngine::new(&Delimiters::default()).unwrap();
        assert_eq!(
            engine.normalise("[[- .Installation.Api.Address -]]"),
            "[[- Installation.Api.Address -]]"
        );
    }

    #[test]
    fn normalise_leaves_string_literals_alone() {
        let engine = TemplateEngine::new(&Delimiters::default()).unwrap();
        assert_eq!(
            engine.normalise(r#"[[ "see .Values" ]]"#),
            r#"[[ "see .Values" ]]"#
        );
        assert_eq!(
            engine.normalise(r#"[[ .SHA ~ " .x" ~ 'it\'s .y' ~ .Tag ]]"#),
            r#"[[ SHA ~ " .x" ~ 'it\'s .y' ~ Tag ]]"#
        );
    }

    #[test]
    fn url_string_canonicalises() {
        assert_eq!(
            url_string(Value::from("https://API.example.com")).unwrap(),
            "https://api.example.com/"
        );
        assert!(url_string(Value::from("not a url")).is_err());
    }

    #[test]
    fn short_duration_accepts_strings_and_seconds() {
        assert_eq!(short_duration(Value::from("5m0s")).unwrap(), "5m");
        assert_eq!(short_duration(Value::from(18_000)).unwrap(), "5h");
        assert_eq!(short_duration(Value::from("1.5s")).unwrap(), "1.5s");
        assert!(short_duration(Value::from(true)).is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn text_outside_delimiters_is_untouched(s in "[^\\[\\]%#]*") {
                let engine = TemplateEngine::new(&Delimiters::default()).unwrap();
                prop_assert_eq!(engine.normalise(&s), s);
            }

            #[test]
            fn safe_substitute_without_tokens_is_identity(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
                #[derive(Serialize)]
                struct Only {
                    #[serde(rename = "Name")]
                    name: String,
                }
                let data = Only { name: "widget".to_owned() };
                prop_assume!(!bytes.windows(11).any(|w| w == b"{{ .Name }}"));
                prop_assert_eq!(safe_substitute(&bytes, &data).unwrap(), bytes);
            }
        }
    }
}
