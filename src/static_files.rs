//! Static file service for everything that is not the summary endpoint.
use crate::errors::StaticError;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Served for `/`.
pub const INDEX_DOCUMENT: &str = "/index.html";

fn document_path(request_path: &str) -> &str {
    if request_path == "/" {
        INDEX_DOCUMENT
    } else {
        request_path
    }
}

/// Closed extension table. Anything unknown is served as plain text.
pub fn content_type_for(path: &str) -> &'static str {
    if path.ends_with(".html") {
        "text/html"
    } else if path.ends_with(".css") {
        "text/css"
    } else if path.ends_with(".js") {
        "text/javascript"
    } else {
        // .txt and the default share a type
        "text/plain"
    }
}

/// Maps a request path onto the static root.
///
/// Returns `None` for paths that would leave the root (`..`, absolute or prefixed segments).
pub fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = Path::new(document_path(request_path).trim_start_matches('/'));

    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => resolved.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}

/// A file read from the static root, with the content type to serve it under.
#[derive(Debug)]
pub struct StaticFile {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

pub async fn load(root: &Path, request_path: &str) -> Result<StaticFile, StaticError> {
    let path = resolve(root, request_path).ok_or_else(|| {
        debug!("Refusing path outside static root: {}", request_path);
        StaticError::NotFound
    })?;

    match tokio::fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => {}
        Ok(_) => return Err(StaticError::NotFound),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            return Err(StaticError::NotFound);
        }
        Err(e) => return Err(StaticError::Io(e)),
    }

    let bytes = tokio::fs::read(&path).await?;
    Ok(StaticFile {
        content_type: content_type_for(document_path(request_path)),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/index.html", "text/html")]
    #[case("/style.css", "text/css")]
    #[case("/app.js", "text/javascript")]
    #[case("/notes.txt", "text/plain")]
    #[case("/data.json", "text/plain")]
    #[case("/README", "text/plain")]
    fn test_content_type_table(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(content_type_for(path), expected);
    }

    #[test]
    fn test_resolve_maps_root_to_index() {
        let root = Path::new("/srv/www");
        assert_eq!(
            resolve(root, "/"),
            Some(PathBuf::from("/srv/www/index.html"))
        );
        assert_eq!(
            resolve(root, "/css/site.css"),
            Some(PathBuf::from("/srv/www/css/site.css"))
        );
    }

    #[rstest]
    #[case("/../etc/passwd")]
    #[case("/a/../../secret")]
    fn test_resolve_refuses_escape(#[case] path: &str) {
        assert_eq!(resolve(Path::new("/srv/www"), path), None);
    }

    #[tokio::test]
    async fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();

        let file = load(dir.path(), "/").await.unwrap();
        assert_eq!(file.content_type, "text/html");
        assert_eq!(file.bytes, b"<h1>hi</h1>");
    }

    #[tokio::test]
    async fn test_load_missing_and_directory_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("file.txt"), "x").unwrap();

        assert!(matches!(
            load(dir.path(), "/missing.xyz").await,
            Err(StaticError::NotFound)
        ));
        assert!(matches!(
            load(dir.path(), "/sub").await,
            Err(StaticError::NotFound)
        ));
        assert!(matches!(
            load(dir.path(), "/file.txt/inner").await,
            Err(StaticError::NotFound)
        ));
    }
}
