//! HTML rendering for the browser UI.
//!
//! The UI is one static page ([`INDEX_HTML`]) that calls the JSON endpoints;
//! directory listings can also be fetched as ready-made HTML fragments.

use std::fmt::Write as _;

use crate::models::DirectoryListing;

pub const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Renders a listing as a `<table>` fragment. Directory rows link to
/// themselves via `data-path`; loadable files get a `data-load` marker the
/// page script hooks into.
pub fn render_listing(listing: &DirectoryListing) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<div class=\"listing\" data-path=\"{}\">",
        escape(&listing.path.to_string_lossy())
    );
    let _ = write!(
        html,
        "<h2 class=\"cwd\">{}</h2>",
        escape(&listing.path.to_string_lossy())
    );
    html.push_str("<table><thead><tr><th>Name</th><th>Size</th><th>Type</th></tr></thead><tbody>");

    if let Some(parent) = &listing.parent {
        let _ = write!(
            html,
            "<tr class=\"dir\" data-path=\"{}\"><td>..</td><td></td><td>dir</td></tr>",
            escape(&parent.to_string_lossy())
        );
    }

    for entry in &listing.entries {
        let path = escape(&entry.path.to_string_lossy());
        let name = escape(&entry.name);
        if entry.is_dir {
            let _ = write!(
                html,
                "<tr class=\"dir\" data-path=\"{}\"><td>{}/</td><td></td><td>dir</td></tr>",
                path, name
            );
        } else {
            let size = entry.size.map(human_size).unwrap_or_default();
            let ext = escape(entry.extension.as_deref().unwrap_or(""));
            let marker = if entry.loadable { " data-load=\"1\"" } else { "" };
            let _ = write!(
                html,
                "<tr class=\"file\" data-path=\"{}\"{}><td>{}</td><td>{}</td><td>{}</td></tr>",
                path, marker, name, size, ext
            );
        }
    }

    html.push_str("</tbody></table></div>");
    html
}

pub fn render_error(message: &str) -> String {
    format!("<div class=\"error\">{}</div>", escape(message))
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileSystemEntry;
    use std::path::PathBuf;

    fn file(name: &str, size: u64, loadable: bool) -> FileSystemEntry {
        FileSystemEntry {
            path: PathBuf::from("/data").join(name),
            name: name.to_string(),
            is_dir: false,
            size: Some(size),
            extension: name.rsplit_once('.').map(|(_, e)| e.to_string()),
            modified: None,
            loadable,
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(10), "10 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_render_listing() {
        let listing = DirectoryListing {
            path: PathBuf::from("/data"),
            parent: Some(PathBuf::from("/")),
            entries: vec![
                FileSystemEntry {
                    path: PathBuf::from("/data/sub"),
                    name: "sub".to_string(),
                    is_dir: true,
                    size: None,
                    extension: None,
                    modified: None,
                    loadable: false,
                },
                file("data.csv", 10, true),
                file("<script>.txt", 3, false),
            ],
        };

        let html = render_listing(&listing);
        assert!(html.contains("<td>..</td>"));
        assert!(html.contains("<td>sub/</td>"));
        assert!(html.contains("data-path=\"/data/data.csv\" data-load=\"1\""));
        assert!(html.contains("<td>10 B</td>"));
        assert!(html.contains("&lt;script&gt;.txt"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_render_error() {
        assert_eq!(
            render_error("not a directory: <x>"),
            "<div class=\"error\">not a directory: &lt;x&gt;</div>"
        );
    }
}
