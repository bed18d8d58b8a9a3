//! Manifest templating, release-note rewriting and chart packaging for ferry.
//!
//! # Build pipeline
//!
//! ```text
//! ferry build
//!   1. Template   ── copy helm/<chart> → .ferry/charts/<chart>, render [[ ]] placeholders
//!   2. Image      ── docker build --tag <registry>/<org>/<project>:<sha> .
//!   3. Package    ── helm package .ferry/charts/<chart> --version <version>
//! ```
//!
//! # Template syntax
//!
//! ferry's own placeholders use `[[ ]]` so they never collide with Helm's
//! `{{ }}`, which passes through untouched:
//!
//! ```text
//! image: quay.io/acme/widget:[[ .SHA ]]
//! interval: [[ .Installation.Monitoring.AlertInterval | short_duration ]]
//! host: {{ .Values.host }}
//! ```

pub mod chart;
pub mod modifier;
pub mod template;

pub use chart::{ChartError, ChartMetadata, discover as discover_charts};
pub use modifier::{Modifier, ModifierError};
pub use template::{Delimiters, TemplateEngine, TemplateError, TemplateTask, safe_substitute};
