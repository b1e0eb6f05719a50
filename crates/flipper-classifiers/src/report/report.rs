use std::path::Path;

use maud::{html, Markup, PreEscaped, DOCTYPE};
use plotly::Plot;

use crate::error::{FlipperError, Result};

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.12.1.min.js";

const STYLE: &str = "
body { font-family: Helvetica, Arial, sans-serif; margin: 0 auto; max-width: 1100px; padding: 0 20px; color: #222; }
header { border-bottom: 2px solid #ddd; margin-bottom: 20px; display: flex; align-items: center; gap: 16px; }
header img { height: 60px; }
section { margin-bottom: 40px; }
table { border-collapse: collapse; margin: 10px 0 20px 0; }
th, td { border: 1px solid #ccc; padding: 4px 10px; text-align: right; }
th:first-child, td:first-child { text-align: left; }
th { background-color: #f0f0f0; }
.code-container { background-color: #f5f5f5; padding: 10px; border-radius: 5px; overflow-x: auto; font-family: monospace; white-space: pre-wrap; }
footer { color: #777; font-size: small; border-top: 1px solid #ddd; padding: 10px 0; }
";

enum Block {
    Content(Markup),
    Plot(Plot),
}

/// A titled block of markup and charts.
pub struct ReportSection {
    title: String,
    blocks: Vec<Block>,
}

impl ReportSection {
    pub fn new(title: &str) -> Self {
        ReportSection {
            title: title.to_string(),
            blocks: Vec::new(),
        }
    }

    pub fn add_content(&mut self, content: Markup) {
        self.blocks.push(Block::Content(content));
    }

    pub fn add_plot(&mut self, plot: Plot) {
        self.blocks.push(Block::Plot(plot));
    }

    fn render(&self, index: usize) -> Markup {
        html! {
            section {
                h2 { (self.title) }
                @for (i, block) in self.blocks.iter().enumerate() {
                    @match block {
                        Block::Content(markup) => { (markup) }
                        Block::Plot(plot) => {
                            (PreEscaped(plot.to_inline_html(Some(&format!("plot-{}-{}", index, i)))))
                        }
                    }
                }
            }
        }
    }
}

/// A self-contained HTML report. Charts load plotly.js from its CDN.
pub struct Report {
    software: String,
    version: String,
    logo: Option<String>,
    title: String,
    sections: Vec<ReportSection>,
}

impl Report {
    pub fn new(software: &str, version: &str, logo: Option<&str>, title: &str) -> Self {
        Report {
            software: software.to_string(),
            version: version.to_string(),
            logo: logo.map(str::to_string),
            title: title.to_string(),
            sections: Vec::new(),
        }
    }

    pub fn add_section(&mut self, section: ReportSection) {
        self.sections.push(section);
    }

    pub fn render(&self) -> String {
        let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="utf-8";
                    title { (self.title) }
                    script src=(PLOTLY_CDN) {}
                    style { (PreEscaped(STYLE)) }
                }
                body {
                    header {
                        @if let Some(logo) = &self.logo {
                            img src=(logo) alt=(self.software);
                        }
                        h1 { (self.title) }
                    }
                    @for (i, section) in self.sections.iter().enumerate() {
                        (section.render(i))
                    }
                    footer {
                        "Generated by " (self.software) " " (self.version) " on " (generated)
                    }
                }
            }
        }
        .into_string()
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.render()).map_err(|source| FlipperError::Report {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Report saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotly::Scatter;

    #[test]
    fn renders_sections_and_plots() {
        let mut report = Report::new("flipper", "0.1.0", None, "Test report");
        let mut section = ReportSection::new("Numbers");
        section.add_content(html! { p { "three < four" } });
        let mut plot = Plot::new();
        plot.add_trace(Scatter::new(vec![1.0, 2.0], vec![3.0, 4.0]));
        section.add_plot(plot);
        report.add_section(section);

        let out = report.render();
        assert!(out.starts_with("<!DOCTYPE html>"));
        assert!(out.contains("<h2>Numbers</h2>"));
        assert!(out.contains("three &lt; four"));
        assert!(out.contains("plot-0-1"));
        assert!(out.contains(PLOTLY_CDN));
    }

    #[test]
    fn save_reports_io_failures() {
        let report = Report::new("flipper", "0.1.0", None, "x");
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no_such_dir").join("r.html");
        assert!(matches!(
            report.save_to_file(&missing),
            Err(FlipperError::Report { .. })
        ));
    }
}
