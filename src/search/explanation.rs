//! Score explanations.

use std::fmt;

use serde::Serialize;

/// A tree describing how a score was computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub value: f32,
    pub description: String,
    pub details: Vec<Explanation>,
}

impl Explanation {
    pub fn new<S: Into<String>>(value: f32, description: S) -> Self {
        Explanation {
            value,
            description: description.into(),
            details: Vec::new(),
        }
    }

    pub fn add_detail(&mut self, detail: Explanation) {
        self.details.push(detail);
    }

    pub fn with_detail(mut self, detail: Explanation) -> Self {
        self.details.push(detail);
        self
    }

    /// Whether the explained document matched at all.
    pub fn is_match(&self) -> bool {
        self.value > 0.0
    }

    /// Render as nested HTML lists.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        out.push_str("<ul>\n");
        out.push_str(&format!("<li>{} = {}</li>\n", self.value, self.description));
        for detail in &self.details {
            detail.write_html(out);
        }
        out.push_str("</ul>\n");
    }

    fn write_text(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(
            f,
            "{:indent$}{} = {}",
            "",
            self.value,
            self.description,
            indent = depth * 2
        )?;
        for detail in &self.details {
            detail.write_text(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_text(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Explanation {
        Explanation::new(0.5, "product of:")
            .with_detail(Explanation::new(2.0, "boost"))
            .with_detail(Explanation::new(0.25, "query_norm"))
    }

    #[test]
    fn test_text_rendering() {
        assert_eq!(
            sample().to_string(),
            "0.5 = product of:\n  2 = boost\n  0.25 = query_norm\n"
        );
        assert!(sample().is_match());
        assert!(!Explanation::new(0.0, "no match").is_match());
    }

    #[test]
    fn test_html_rendering() {
        let html = Explanation::new(1.0, "boost").to_html();
        assert_eq!(html, "<ul>\n<li>1 = boost</li>\n</ul>\n");
        let nested = sample().to_html();
        assert!(nested.starts_with("<ul>\n<li>0.5 = product of:</li>\n<ul>\n"));
        assert_eq!(nested.matches("<ul>").count(), 3);
    }
}
