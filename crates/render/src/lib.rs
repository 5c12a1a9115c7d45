//! Proposal document rendering.
//!
//! Proposals are rendered from an HTML template and converted to PDF with
//! wkhtmltopdf when it is available on `PATH`. Without it, the rendered HTML
//! is returned so the caller can print it from a browser.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use tera::{Context, Tera};
use tokio::process::Command;
use tracing::{error, info, warn};
use valuequote_core::domain::proposal::ProposalDocument;
use valuequote_core::render::{DocumentRenderer, RenderError, RenderedDocument};

const PROPOSAL_TEMPLATE: &str = "proposal.html.tera";
const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";

/// Register custom Tera filters used by proposal templates.
///
/// - `money`: thousands-grouped amount with 2 decimals, e.g. `fee | money`
/// - `date`:  RFC 3339 timestamp to calendar date, e.g. `issued_at | date(format="%Y-%m-%d")`
pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("money", tera_money_filter);
    tera.register_filter("date", tera_date_filter);
}

fn tera_money_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let amount = match value {
        tera::Value::String(raw) => Decimal::from_str(raw.trim())
            .map_err(|e| tera::Error::msg(format!("money filter: invalid amount `{raw}`: {e}")))?,
        tera::Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .map_err(|e| tera::Error::msg(format!("money filter: invalid amount `{n}`: {e}")))?,
        tera::Value::Null => Decimal::ZERO,
        other => {
            return Err(tera::Error::msg(format!(
                "money filter expects a number or numeric string, got {other}"
            )))
        }
    };
    Ok(tera::Value::String(format_money(amount)))
}

fn tera_date_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let raw = value.as_str().ok_or_else(|| tera::Error::msg("date filter expects a string input"))?;
    let format = args.get("format").and_then(|f| f.as_str()).unwrap_or(DEFAULT_DATE_FORMAT);

    let date = match DateTime::parse_from_rfc3339(raw) {
        Ok(timestamp) => timestamp.date_naive(),
        Err(_) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|e| tera::Error::msg(format!("date filter: cannot parse `{raw}`: {e}")))?,
    };
    Ok(tera::Value::String(date.format(format).to_string()))
}

/// `1234567.5` -> `1,234,567.50`
pub fn format_money(amount: Decimal) -> String {
    let fixed = format!("{:.2}", amount.round_dp(2));
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{sign}{grouped}.{fraction}")
}

/// Renders proposals through the embedded HTML template.
#[derive(Clone, Debug)]
pub struct ProposalRenderer {
    tera: Tera,
    wkhtmltopdf_path: Option<PathBuf>,
}

impl ProposalRenderer {
    /// Build a renderer with the embedded template, probing `PATH` for wkhtmltopdf.
    pub fn new() -> Result<Self, RenderError> {
        let wkhtmltopdf_path = which::which("wkhtmltopdf").ok();
        match &wkhtmltopdf_path {
            Some(path) => info!(
                event_name = "render.wkhtmltopdf.found",
                path = %path.display(),
                "wkhtmltopdf found"
            ),
            None => warn!(
                event_name = "render.wkhtmltopdf.missing",
                "wkhtmltopdf not found in PATH - proposals will be rendered as printable HTML"
            ),
        }
        Self::with_converter(wkhtmltopdf_path)
    }

    /// Build a renderer that never converts to PDF.
    pub fn html_only() -> Result<Self, RenderError> {
        Self::with_converter(None)
    }

    pub fn with_converter(wkhtmltopdf_path: Option<PathBuf>) -> Result<Self, RenderError> {
        Self::with_template(include_str!("../../../templates/proposal.html.tera"), wkhtmltopdf_path)
    }

    /// Build a renderer from a caller-provided template body.
    pub fn with_template(
        template: &str,
        wkhtmltopdf_path: Option<PathBuf>,
    ) -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![".html.tera"]);
        register_template_filters(&mut tera);
        tera.add_raw_template(PROPOSAL_TEMPLATE, template)
            .map_err(|e| RenderError::Template(e.to_string()))?;

        Ok(Self { tera, wkhtmltopdf_path })
    }

    pub fn converter(&self) -> Option<&Path> {
        self.wkhtmltopdf_path.as_deref()
    }

    /// Render the printable HTML for a proposal.
    pub fn render_html(&self, document: &ProposalDocument) -> Result<String, RenderError> {
        let mut context = Context::new();
        context.insert("document", document);
        context.insert("issuer", &document.issuer);
        context.insert("client", &document.client);
        context.insert("logo_src", &logo_src(document));

        self.tera.render(PROPOSAL_TEMPLATE, &context).map_err(|e| {
            let detail = template_error_chain(&e);
            error!(event_name = "render.template.failed", error = %detail, "proposal template failed");
            RenderError::Template(detail)
        })
    }

    async fn convert_html_to_pdf(
        &self,
        html: &str,
        wkhtmltopdf_path: &Path,
    ) -> Result<Vec<u8>, RenderError> {
        let temp_dir = std::env::temp_dir();
        let stem = uuid::Uuid::new_v4().simple().to_string();
        let html_path = temp_dir.join(format!("proposal_{stem}.html"));
        let pdf_path = temp_dir.join(format!("proposal_{stem}.pdf"));

        tokio::fs::write(&html_path, html).await.map_err(|e| RenderError::Io(e.to_string()))?;

        let result = run_wkhtmltopdf(wkhtmltopdf_path, &html_path, &pdf_path).await;

        let _ = tokio::fs::remove_file(&html_path).await;
        let _ = tokio::fs::remove_file(&pdf_path).await;

        let pdf_bytes = result?;
        info!(event_name = "render.pdf.generated", size = pdf_bytes.len(), "PDF generated");
        Ok(pdf_bytes)
    }
}

async fn run_wkhtmltopdf(
    wkhtmltopdf_path: &Path,
    html_path: &Path,
    pdf_path: &Path,
) -> Result<Vec<u8>, RenderError> {
    let output = Command::new(wkhtmltopdf_path)
        .args(["--page-size", "A4"])
        .args(["--margin-top", "10mm", "--margin-bottom", "10mm"])
        .args(["--margin-left", "10mm", "--margin-right", "10mm"])
        .args(["--encoding", "utf-8"])
        .arg("--enable-local-file-access")
        .arg(html_path)
        .arg(pdf_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| RenderError::Io(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(event_name = "render.pdf.failed", stderr = %stderr, "wkhtmltopdf failed");
        return Err(RenderError::Conversion(stderr.trim().to_string()));
    }

    tokio::fs::read(pdf_path).await.map_err(|e| RenderError::Io(e.to_string()))
}

/// Only inline image data URIs are embedded; anything else is dropped.
fn logo_src(document: &ProposalDocument) -> Option<&str> {
    document
        .issuer
        .logo_data_uri
        .as_deref()
        .map(str::trim)
        .filter(|uri| uri.starts_with("data:image/"))
        .filter(|uri| {
            !uri.contains(|c: char| matches!(c, '"' | '\'' | '<' | '>') || c.is_whitespace())
        })
}

fn template_error_chain(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[async_trait]
impl DocumentRenderer for ProposalRenderer {
    async fn render(&self, document: &ProposalDocument) -> Result<RenderedDocument, RenderError> {
        let html = self.render_html(document)?;

        let Some(wkhtmltopdf) = self.wkhtmltopdf_path.as_deref() else {
            return Ok(RenderedDocument::Html(html));
        };

        match self.convert_html_to_pdf(&html, wkhtmltopdf).await {
            Ok(bytes) => Ok(RenderedDocument::Pdf(bytes)),
            Err(e) => {
                warn!(
                    event_name = "render.pdf.fallback",
                    error = %e,
                    "PDF conversion failed, falling back to HTML"
                );
                Ok(RenderedDocument::Html(html))
            }
        }
    }
}
