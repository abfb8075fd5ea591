use crate::config::Layout;
use anyhow::Context;
use regex::Regex;
use std::path::Path;

/// Maps absolute asset paths to manifest keys.
///
/// `<anything>/<marker>/<rest>.png` becomes `<prefix>/<rest>`. Paths are
/// compared with forward slashes regardless of platform.
#[derive(Debug, Clone)]
pub struct IdMapper {
    pattern: Regex,
    prefix: String,
}

impl IdMapper {
    pub fn new(layout: &Layout) -> anyhow::Result<Self> {
        let marker = layout.marker.trim_matches('/');
        if marker.is_empty() {
            anyhow::bail!("layout.marker must not be empty");
        }

        let pattern = format!(r"(?:^|/){}/(.+)\.(?i:png)$", regex::escape(marker));
        let pattern = Regex::new(&pattern)
            .with_context(|| format!("Invalid identifier pattern for marker '{marker}'"))?;

        Ok(Self {
            pattern,
            prefix: layout.prefix.trim_end_matches('/').to_string(),
        })
    }

    /// Returns `None` when the path does not live under the marker directory.
    pub fn id_for(&self, path: &Path) -> Option<String> {
        let normalized = path.to_string_lossy().replace('\\', "/");
        let captures = self.pattern.captures(&normalized)?;
        let rest = captures.get(1)?.as_str();

        if self.prefix.is_empty() {
            Some(rest.to_string())
        } else {
            Some(format!("{}/{}", self.prefix, rest))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> IdMapper {
        IdMapper::new(&Layout::default()).unwrap()
    }

    #[test]
    fn test_id_from_marker_path() {
        let id = mapper().id_for(Path::new(
            "/home/ci/site/docs/.vuepress/public/images/foo/bar.png",
        ));
        assert_eq!(id.as_deref(), Some("docs/foo/bar"));
    }

    #[test]
    fn test_relative_marker_path() {
        let id = mapper().id_for(Path::new("docs/.vuepress/public/images/foo/bar.png"));
        assert_eq!(id.as_deref(), Some("docs/foo/bar"));
    }

    #[test]
    fn test_windows_separators() {
        let id = mapper().id_for(Path::new(
            r"C:\site\docs\.vuepress\public\images\guide\step.1.PNG",
        ));
        assert_eq!(id.as_deref(), Some("docs/guide/step.1"));
    }

    #[test]
    fn test_missing_marker_yields_none() {
        let m = mapper();
        assert_eq!(m.id_for(Path::new("/home/ci/site/assets/foo/bar.png")), None);
        assert_eq!(m.id_for(Path::new("/home/ci/site/docs/images/bar.png")), None);
        // Marker must start on a segment boundary.
        assert_eq!(
            m.id_for(Path::new("/x/mydocs/.vuepress/public/images/bar.png")),
            None
        );
        assert_eq!(
            m.id_for(Path::new("/x/docs/.vuepress/public/images/bar.jpg")),
            None
        );
    }

    #[test]
    fn test_custom_layout() {
        let layout = Layout {
            marker: "/site/static/img/".to_string(),
            prefix: String::new(),
        };
        let m = IdMapper::new(&layout).unwrap();

        assert_eq!(
            m.id_for(Path::new("/repo/site/static/img/a/b.png")).as_deref(),
            Some("a/b")
        );
    }

    #[test]
    fn test_empty_marker_is_rejected() {
        let layout = Layout {
            marker: "/".to_string(),
            prefix: "docs".to_string(),
        };
        assert!(IdMapper::new(&layout).is_err());
    }
}
