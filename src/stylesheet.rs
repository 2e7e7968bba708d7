//! Stylesheet Bundler: concatenates every fragment's CSS asset content in
//! descriptor iteration order, minifies the result, hashes it with MD5 (kept
//! for compatibility with the sentinel-free static route scheme despite MD5
//! being cryptographically weak — see DESIGN.md), and registers a static
//! route for it.

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StylesheetError {
    #[error("failed to parse bundled css: {0}")]
    Parse(String),
    #[error("failed to minify bundled css: {0}")]
    Minify(String),
}

pub trait CssMinifier: Send + Sync {
    fn minify(&self, css: &str) -> Result<String, StylesheetError>;
}

/// Default minifier backed by `lightningcss`.
pub struct LightningCssMinifier;

impl CssMinifier for LightningCssMinifier {
    fn minify(&self, css: &str) -> Result<String, StylesheetError> {
        let mut stylesheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| StylesheetError::Parse(e.to_string()))?;
        stylesheet
            .minify(MinifyOptions::default())
            .map_err(|e| StylesheetError::Minify(e.to_string()))?;
        let printed = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..Default::default()
            })
            .map_err(|e| StylesheetError::Minify(e.to_string()))?;
        Ok(printed.code)
    }
}

#[derive(Debug, Clone)]
pub struct StylesheetBundle {
    pub route_path: String,
    pub content: String,
}

pub struct StylesheetBundler {
    minifier: std::sync::Arc<dyn CssMinifier>,
}

impl StylesheetBundler {
    pub fn new(minifier: std::sync::Arc<dyn CssMinifier>) -> Self {
        Self { minifier }
    }

    /// `css_chunks` is `(fragment_name, css_content)` in descriptor iteration
    /// order. A fragment with no config is skipped, never aborts the whole
    /// step (see spec.md's open question (i)).
    pub fn bundle(
        &self,
        template_name: &str,
        css_chunks: &[(String, String)],
    ) -> Result<Option<StylesheetBundle>, StylesheetError> {
        let concatenated: String = css_chunks
            .iter()
            .map(|(_, css)| css.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        if concatenated.trim().is_empty() {
            return Ok(None);
        }

        let minified = self.minifier.minify(&concatenated)?;
        if minified.is_empty() {
            return Ok(None);
        }

        let digest = md5::compute(minified.as_bytes());
        let hash = format!("{digest:x}");
        let route_path = format!("/static/{template_name}.min.css?v={hash}");

        Ok(Some(StylesheetBundle {
            route_path,
            content: minified,
        }))
    }
}

pub fn link_tag(bundle: &StylesheetBundle) -> String {
    format!("<link rel=\"stylesheet\" href=\"{}\">", bundle.route_path)
}
