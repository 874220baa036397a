//! Published-file staging and build-marker injection.
//!
//! The published file is either the source verbatim or
//! `<!-- PAGES_BUILD_JST:<stamp> -->\n` followed by the source verbatim.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use pagepush_core::BuildMarker;
use regex::{NoExpand, Regex};

use crate::error::{io_err, PublishError};

/// Outcome of copying the source over the published file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSync {
    /// Published file was (re)written with the source content.
    Written { path: PathBuf },
    /// Published file already carries the source content; left untouched.
    Unchanged { path: PathBuf },
}

/// Split a leading marker line off `content`.
pub fn split_marker(content: &str) -> (Option<BuildMarker>, &str) {
    let (first, rest) = match content.split_once('\n') {
        Some((first, rest)) => (first, rest),
        None => (content, ""),
    };
    match BuildMarker::from_comment_line(first) {
        Some(marker) => (Some(marker), rest),
        None => (None, content),
    }
}

/// Marker currently embedded in the published file, if any.
pub fn current_marker(published: &Path) -> Result<Option<BuildMarker>, PublishError> {
    if !published.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(published).map_err(|e| io_err(published, e))?;
    Ok(split_marker(&content).0)
}

/// Copy `source` over `published`, overwriting.
///
/// When the published file's body (below any marker line) already equals the
/// source, nothing is written so an unchanged source stages no diff.
pub fn stage_source(source: &Path, published: &Path) -> Result<ContentSync, PublishError> {
    let wanted = std::fs::read_to_string(source).map_err(|e| io_err(source, e))?;

    if published.exists() {
        let current = std::fs::read_to_string(published).map_err(|e| io_err(published, e))?;
        if split_marker(&current).1 == wanted {
            tracing::debug!("unchanged: {}", published.display());
            return Ok(ContentSync::Unchanged {
                path: published.to_path_buf(),
            });
        }
    }

    atomic_write(published, &wanted)?;
    tracing::info!("copied {} -> {}", source.display(), published.display());
    Ok(ContentSync::Written {
        path: published.to_path_buf(),
    })
}

/// Rewrite `published` as `marker` line + `source` content.
pub fn embed_marker(
    source: &Path,
    published: &Path,
    marker: &BuildMarker,
) -> Result<(), PublishError> {
    let body = std::fs::read_to_string(source).map_err(|e| io_err(source, e))?;
    let content = format!("{}\n{body}", marker.comment_line());
    atomic_write(published, &content)?;
    tracing::info!(marker = %marker, "embedded build marker");
    Ok(())
}

/// Placeholder in the template replaced by the creation date.
pub const DATE_PLACEHOLDER: &str = "YYYY-MM-DD";

/// Label that the creation-date placeholder follows in the template.
pub const CREATED_LABEL: &str = "作成日";

static CREATED_DATE_RE: OnceLock<Regex> = OnceLock::new();

fn created_date_re() -> &'static Regex {
    CREATED_DATE_RE.get_or_init(|| {
        Regex::new(&format!(r"{CREATED_LABEL}\s*:\s*{DATE_PLACEHOLDER}"))
            .expect("creation-date pattern is a valid regex")
    })
}

/// Fill the first `作成日 : YYYY-MM-DD` with `date`. Other placeholders stay.
pub fn fill_created_date(template: &str, date: &str) -> String {
    created_date_re()
        .replacen(template, 1, NoExpand(&format!("{CREATED_LABEL} : {date}")))
        .into_owned()
}

/// Create `source` from `template`, filling the creation date.
///
/// An existing source is kept unless `force` is set.
pub fn scaffold_source(
    template: &Path,
    source: &Path,
    date: &str,
    force: bool,
) -> Result<ContentSync, PublishError> {
    if source.exists() && !force {
        return Err(PublishError::SourceExists {
            path: source.to_path_buf(),
        });
    }
    if !template.is_file() {
        return Err(PublishError::MissingTemplate {
            path: template.to_path_buf(),
        });
    }
    let raw = std::fs::read_to_string(template).map_err(|e| io_err(template, e))?;
    atomic_write(source, &fill_created_date(&raw, date))?;
    tracing::info!("created {} from {}", source.display(), template.display());
    Ok(ContentSync::Written {
        path: source.to_path_buf(),
    })
}

/// Write to `<path>.pagepush.tmp`, then rename over `path`.
pub(crate) fn atomic_write(path: &Path, content: &str) -> Result<(), PublishError> {
    let tmp = PathBuf::from(format!("{}.pagepush.tmp", path.display()));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::write(&tmp, content).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagepush_core::VersionStamp;
    use std::fs;
    use tempfile::TempDir;

    fn marker(stamp: &str) -> BuildMarker {
        BuildMarker::new(VersionStamp::parse(stamp).unwrap())
    }

    #[test]
    fn split_marker_recognises_only_a_leading_marker() {
        let m = marker("20260302-000405");
        let content = format!("{}\n<html></html>\n", m.comment_line());
        assert_eq!(split_marker(&content), (Some(m), "<html></html>\n"));

        let plain = "<!DOCTYPE html>\n<html></html>\n";
        assert_eq!(split_marker(plain), (None, plain));

        let buried = format!("<html>\n{}\n</html>", m.comment_line());
        assert_eq!(split_marker(&buried).0, None);
    }

    #[test]
    fn split_marker_handles_marker_only_and_crlf() {
        let m = marker("20260302-000405");
        assert_eq!(split_marker(&m.comment_line()), (Some(m), ""));
        let crlf = format!("{}\r\nbody", m.comment_line());
        assert_eq!(split_marker(&crlf), (Some(m), "body"));
    }

    #[test]
    fn first_copy_writes_published_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("event-summary.html");
        let published = dir.path().join("index.html");
        fs::write(&source, "<p>v1</p>\n").unwrap();

        let result = stage_source(&source, &published).unwrap();
        assert!(matches!(result, ContentSync::Written { .. }));
        assert_eq!(fs::read_to_string(&published).unwrap(), "<p>v1</p>\n");
    }

    #[test]
    fn marked_copy_of_same_source_is_unchanged() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("event-summary.html");
        let published = dir.path().join("index.html");
        fs::write(&source, "<p>v1</p>\n").unwrap();
        embed_marker(&source, &published, &marker("20260302-000405")).unwrap();
        let before = fs::read_to_string(&published).unwrap();

        let result = stage_source(&source, &published).unwrap();
        assert!(matches!(result, ContentSync::Unchanged { .. }));
        assert_eq!(fs::read_to_string(&published).unwrap(), before);
    }

    #[test]
    fn changed_source_overwrites_and_drops_old_marker() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("event-summary.html");
        let published = dir.path().join("index.html");
        fs::write(&source, "<p>v1</p>\n").unwrap();
        embed_marker(&source, &published, &marker("20260302-000405")).unwrap();

        fs::write(&source, "<p>v2</p>\n").unwrap();
        let result = stage_source(&source, &published).unwrap();
        assert!(matches!(result, ContentSync::Written { .. }));
        assert_eq!(fs::read_to_string(&published).unwrap(), "<p>v2</p>\n");
        assert_eq!(current_marker(&published).unwrap(), None);
    }

    #[test]
    fn embed_marker_prepends_comment_line() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("event-summary.html");
        let published = dir.path().join("site").join("index.html");
        fs::write(&source, "<!DOCTYPE html>\n").unwrap();

        let m = marker("20260302-000405");
        embed_marker(&source, &published, &m).unwrap();
        assert_eq!(
            fs::read_to_string(&published).unwrap(),
            "<!-- PAGES_BUILD_JST:20260302-000405 -->\n<!DOCTYPE html>\n"
        );
        assert_eq!(current_marker(&published).unwrap(), Some(m));
        assert!(!dir.path().join("site").join("index.html.pagepush.tmp").exists());
    }

    #[test]
    fn scaffold_fills_only_the_creation_date() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("event-summary.template.html");
        let source = dir.path().join("event-summary.html");
        fs::write(
            &template,
            "<p>format: YYYY-MM-DD</p>\n<p>作成日:YYYY-MM-DD</p>\n<p>作成日 : YYYY-MM-DD</p>\n",
        )
        .unwrap();

        scaffold_source(&template, &source, "2026-03-02", false).unwrap();
        assert_eq!(
            fs::read_to_string(&source).unwrap(),
            "<p>format: YYYY-MM-DD</p>\n<p>作成日 : 2026-03-02</p>\n<p>作成日 : YYYY-MM-DD</p>\n"
        );
    }

    #[test]
    fn template_without_creation_label_is_copied_verbatim() {
        assert_eq!(
            fill_created_date("<h1>YYYY-MM-DD</h1>", "2026-03-02"),
            "<h1>YYYY-MM-DD</h1>"
        );
    }

    #[test]
    fn scaffold_keeps_existing_source_unless_forced() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("event-summary.template.html");
        let source = dir.path().join("event-summary.html");
        fs::write(&template, "<h1>作成日 : YYYY-MM-DD</h1>").unwrap();
        fs::write(&source, "hand edited").unwrap();

        let err = scaffold_source(&template, &source, "2026-03-02", false).unwrap_err();
        assert!(matches!(err, PublishError::SourceExists { .. }), "got: {err}");
        assert_eq!(fs::read_to_string(&source).unwrap(), "hand edited");

        scaffold_source(&template, &source, "2026-03-02", true).unwrap();
        assert_eq!(fs::read_to_string(&source).unwrap(), "<h1>作成日 : 2026-03-02</h1>");
    }

    #[test]
    fn scaffold_without_template_names_the_path() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("missing.template.html");
        let err = scaffold_source(&template, &dir.path().join("s.html"), "2026-03-02", false)
            .unwrap_err();
        assert!(err.to_string().contains("missing.template.html"), "got: {err}");
    }

    #[test]
    fn current_marker_of_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(current_marker(&dir.path().join("nope.html")).unwrap(), None);
    }
}
