//! HTML file report

use setupwatch_api::{FleetSnapshot, HostSnapshot};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::{ReportError, ReportResult, ReportSink};

const STYLE: &str = "\
body { background-color: black; text-align: center; font-family: sans-serif; }
table { width: 100%; border-collapse: collapse; }
h1 { color: orange; }
tr { height: 75px; }
th, td { border: 1px solid gray; color: white; font-size: 24px; }
thead tr { background-color: darkblue; }
thead th { font-size: 38px; }
td.offline { color: gray; }
p.footer { color: gray; }
";

/// Writes the fleet as a self-refreshing HTML table.
///
/// The page is rendered to a sibling temporary file and renamed over the
/// previous report, so readers never observe a partially written page.
pub struct HtmlFileSink {
    path: PathBuf,
    title: String,
    refresh: Duration,
}

impl HtmlFileSink {
    pub fn new(path: impl Into<PathBuf>, title: impl Into<String>, refresh: Duration) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            refresh,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render the full page for a snapshot
    pub fn render(&self, snapshot: &FleetSnapshot) -> String {
        let title = escape_html(&self.title);
        let refresh = self.refresh.as_secs().max(1);

        let mut page = String::new();
        let _ = writeln!(page, "<!DOCTYPE html>");
        let _ = writeln!(page, "<html>");
        let _ = writeln!(page, "<head>");
        let _ = writeln!(page, "<meta charset=\"utf-8\">");
        let _ = writeln!(page, "<meta http-equiv=\"refresh\" content=\"{}\">", refresh);
        let _ = writeln!(page, "<title>{}</title>", title);
        let _ = writeln!(page, "<style>\n{}</style>", STYLE);
        let _ = writeln!(page, "</head>");
        let _ = writeln!(page, "<body>");
        let _ = writeln!(page, "<h1>{}</h1>", title);
        let _ = writeln!(page, "<table>");
        let _ = writeln!(
            page,
            "<thead><tr><th>Setup</th><th>User</th><th style=\"width:15%\">Idle Time</th></tr></thead>"
        );
        let _ = writeln!(page, "<tbody>");
        for host in &snapshot.hosts {
            page.push_str(&render_row(host));
        }
        let _ = writeln!(page, "</tbody>");
        let _ = writeln!(page, "</table>");
        let _ = writeln!(
            page,
            "<p class=\"footer\">Updated {} ({} ms)</p>",
            setupwatch_util::format_datetime_full(&snapshot.started_at),
            snapshot.elapsed.as_millis()
        );
        let _ = writeln!(page, "</body>");
        let _ = writeln!(page, "</html>");
        page
    }

    fn temp_path(&self) -> ReportResult<PathBuf> {
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| ReportError::InvalidPath(self.path.display().to_string()))?;
        let mut temp_name = file_name.to_os_string();
        temp_name.push(".tmp");
        Ok(self.path.with_file_name(temp_name))
    }
}

impl ReportSink for HtmlFileSink {
    fn publish(&self, snapshot: &FleetSnapshot) -> ReportResult<()> {
        let page = self.render(snapshot);
        let temp = self.temp_path()?;

        std::fs::write(&temp, page.as_bytes())?;
        std::fs::rename(&temp, &self.path)?;

        debug!(
            path = %self.path.display(),
            rows = snapshot.len(),
            "Report written"
        );
        Ok(())
    }
}

fn render_row(host: &HostSnapshot) -> String {
    let class = if host.is_offline() { " class=\"offline\"" } else { "" };
    format!(
        "<tr><td{class}>{}</td><td{class}>{}</td><td{class}>{}</td></tr>\n",
        escape_html(host.display_name()),
        escape_html(&host.user.to_string()),
        escape_html(&host.idle.to_string()),
    )
}

/// Escape text for use inside HTML element content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
