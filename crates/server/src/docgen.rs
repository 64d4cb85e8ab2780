//! Document generation for acts and requisites cards
//!
//! Renders typst markup from tera templates and converts it to PDF with the
//! external `typst` compiler. When the compiler is not installed the rendered
//! source file is kept and delivered as-is.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::Utc;
use tera::{Context, Tera};
use tokio::process::Command;
use tracing::{error, info, warn};
use uuid::Uuid;

use aktly_core::config::DocgenConfig;
use aktly_core::domain::act::ActData;
use aktly_core::domain::requisites::{RequisiteAnswers, BANK_SECTION_START, REQUISITE_FIELDS};
use aktly_core::errors::DomainError;

/// Register custom Tera filters used by document templates.
///
/// - `money`: 2-decimal rounding, e.g. `price | money`
pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("money", tera_money_filter);
}

/// Formats a number (or numeric string, as decimals serialize) to 2 decimals.
fn tera_money_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let num = match value {
        tera::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        tera::Value::String(s) => s.parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(tera::Value::String(format!("{num:.2}")))
}

#[derive(Debug, thiserror::Error)]
pub enum DocgenError {
    #[error("template error: {0}")]
    Template(String),
    #[error("typst compilation failed: {0}")]
    Compile(String),
    #[error("invalid document data: {0}")]
    InvalidData(#[from] DomainError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A produced file waiting for delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Pdf,
    TypstSource,
}

pub struct DocumentGenerator {
    tera: Tera,
    typst_path: Option<String>,
    output_dir: PathBuf,
}

impl DocumentGenerator {
    pub fn new(config: &DocgenConfig) -> Result<Self, DocgenError> {
        let mut tera = Tera::new(&format!("{}/**/*.tera", config.template_dir))
            .map_err(|e| DocgenError::Template(e.to_string()))?;
        register_template_filters(&mut tera);

        let typst_path = discover_typst(config.typst_bin.as_deref());
        match &typst_path {
            Some(path) => info!(path = %path, "typst compiler found"),
            None => {
                warn!("typst not found in PATH - documents will be delivered as typst source")
            }
        }

        Ok(Self { tera, typst_path, output_dir: PathBuf::from(&config.output_dir) })
    }

    /// Generator with compiled-in templates, for tests.
    pub fn with_embedded_templates(output_dir: &Path) -> Self {
        let mut tera = Tera::default();
        register_template_filters(&mut tera);

        tera.add_raw_template("act.typ.tera", include_str!("../../../templates/act.typ.tera"))
            .expect("act template should parse");
        tera.add_raw_template(
            "requisites.typ.tera",
            include_str!("../../../templates/requisites.typ.tera"),
        )
        .expect("requisites template should parse");

        Self {
            tera,
            typst_path: discover_typst(None),
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Disables the external compiler, forcing the source fallback.
    pub fn without_compiler(mut self) -> Self {
        self.typst_path = None;
        self
    }

    /// Per-chat directory all generated files land in before delivery.
    pub fn chat_output_dir(&self, chat_id: i64) -> PathBuf {
        self.output_dir.join(chat_id.to_string())
    }

    pub async fn generate_act(
        &self,
        chat_id: i64,
        act: &ActData,
    ) -> Result<GeneratedFile, DocgenError> {
        act.validate()?;

        let mut context = Context::new();
        context.insert("customer", &act.customer);
        context.insert("executor", &act.executor);
        context.insert("jobs", &act.jobs);
        context.insert("total", &act.total());
        context.insert("date", &Utc::now().format("%d.%m.%Y").to_string());

        self.render_and_compile(chat_id, "act.typ.tera", "act", &context).await
    }

    pub async fn generate_requisites_card(
        &self,
        chat_id: i64,
        answers: &RequisiteAnswers,
    ) -> Result<GeneratedFile, DocgenError> {
        let organization: Vec<serde_json::Value> = (0..BANK_SECTION_START)
            .map(|step| {
                serde_json::json!({
                    "label": REQUISITE_FIELDS[step],
                    "value": answers.get_or_empty(step),
                })
            })
            .collect();
        let bank: Vec<serde_json::Value> = (BANK_SECTION_START..REQUISITE_FIELDS.len() - 1)
            .map(|step| {
                serde_json::json!({
                    "label": REQUISITE_FIELDS[step],
                    "value": answers.get_or_empty(step),
                })
            })
            .collect();

        let mut context = Context::new();
        context.insert("organization", &organization);
        context.insert("bank", &bank);
        context.insert("signatory", answers.get_or_empty(REQUISITE_FIELDS.len() - 1));

        self.render_and_compile(chat_id, "requisites.typ.tera", "requisites", &context).await
    }

    async fn render_and_compile(
        &self,
        chat_id: i64,
        template: &str,
        stem: &str,
        context: &Context,
    ) -> Result<GeneratedFile, DocgenError> {
        let source = self
            .tera
            .render(template, context)
            .map_err(|e| DocgenError::Template(e.to_string()))?;

        let dir = self.chat_output_dir(chat_id);
        tokio::fs::create_dir_all(&dir).await?;

        let file_stem = format!("{stem}_{}", Uuid::new_v4());
        let typ_path = dir.join(format!("{file_stem}.typ"));
        tokio::fs::write(&typ_path, source).await?;

        let Some(typst) = self.typst_path.as_deref() else {
            return Ok(GeneratedFile { path: typ_path, format: OutputFormat::TypstSource });
        };

        let pdf_path = dir.join(format!("{file_stem}.pdf"));
        match compile_typst(typst, &dir, &typ_path, &pdf_path).await {
            Ok(()) => {
                let _ = tokio::fs::remove_file(&typ_path).await;
                info!(chat_id, path = %pdf_path.display(), "document compiled");
                Ok(GeneratedFile { path: pdf_path, format: OutputFormat::Pdf })
            }
            Err(e) => {
                warn!(chat_id, error = %e, "typst compilation failed, delivering source");
                Ok(GeneratedFile { path: typ_path, format: OutputFormat::TypstSource })
            }
        }
    }
}

fn discover_typst(configured: Option<&str>) -> Option<String> {
    match configured {
        Some(path) => Some(path.to_owned()),
        None => which::which("typst").ok().map(|p| p.to_string_lossy().to_string()),
    }
}

async fn compile_typst(
    typst: &str,
    root: &Path,
    input: &Path,
    output: &Path,
) -> Result<(), DocgenError> {
    let result = Command::new(typst)
        .arg("compile")
        .arg("--root")
        .arg(root)
        .arg(input)
        .arg(output)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        error!(stderr = %stderr, "typst failed");
        return Err(DocgenError::Compile(stderr.to_string()));
    }
    Ok(())
}
