//! Static HTTP bridge for filesystem inputs.
//!
//! Local paths are never probed directly: the bridge serves the resolved
//! root over loopback HTTP and the crawl engine only ever sees
//! `http://localhost:<port>/...` URLs. Markdown conversion and directory
//! listings live here, outside the hot path.

use crate::config::ConfigError;
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use pulldown_cmark::{html, Options, Parser};
use rand::Rng;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use url::Url;

const PORT_RANGE_START: u16 = 5000;
const PORT_RANGE_END: u16 = 6000;
const PORT_PICK_ATTEMPTS: usize = 32;

struct BridgeState {
    root: PathBuf,
    markdown: bool,
    directory_listing: bool,
}

/// A running loopback server plus the base URL inputs are rewritten to.
pub struct ServerBridge {
    pub base_url: Url,
    handle: tokio::task::JoinHandle<()>,
}

impl ServerBridge {
    pub async fn start(
        root: PathBuf,
        port: Option<u16>,
        markdown: bool,
        directory_listing: bool,
    ) -> Result<Self, ConfigError> {
        let listener = bind_listener(port).await?;
        let addr = listener.local_addr().map_err(ConfigError::ServerBind)?;

        let state = Arc::new(BridgeState {
            root,
            markdown,
            directory_listing,
        });
        let app = Router::new().fallback(serve_path).with_state(state);

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("local server stopped: {}", e);
            }
        });

        let base_url = Url::parse(&format!("http://localhost:{}/", addr.port()))
            .expect("loopback base URL is always valid");

        tracing::debug!(base = %base_url, "local server bridge started");

        Ok(Self { base_url, handle })
    }

    /// Rewrite a root-relative file path into a bridge URL.
    pub fn url_for(&self, relative_path: &str) -> Result<Url, ConfigError> {
        self.base_url
            .join(relative_path)
            .map_err(|source| ConfigError::InvalidStartUrl {
                url: relative_path.to_string(),
                source,
            })
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}

async fn bind_listener(port: Option<u16>) -> Result<TcpListener, ConfigError> {
    if let Some(port) = port {
        return TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(ConfigError::ServerBind);
    }

    for _ in 0..PORT_PICK_ATTEMPTS {
        let candidate = rand::thread_rng().gen_range(PORT_RANGE_START..=PORT_RANGE_END);
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", candidate)).await {
            return Ok(listener);
        }
    }

    Err(ConfigError::ServerBind(io::Error::new(
        io::ErrorKind::AddrInUse,
        format!(
            "no free port in {}-{}",
            PORT_RANGE_START, PORT_RANGE_END
        ),
    )))
}

async fn serve_path(State(state): State<Arc<BridgeState>>, uri: Uri) -> Response {
    let relative = uri.path().trim_start_matches('/');

    // Keep requests inside the served root
    if Path::new(relative)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return (StatusCode::FORBIDDEN, "403 Forbidden").into_response();
    }

    let mut path = state.root.join(relative);

    if path.is_dir() {
        let index = path.join("index.html");
        if index.is_file() {
            path = index;
        } else if state.directory_listing {
            return render_listing(&state.root, &path, uri.path()).await;
        } else {
            return (StatusCode::NOT_FOUND, "404 Not Found").into_response();
        }
    }

    let is_markdown = state.markdown
        && path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("md"))
            .unwrap_or(false);

    if is_markdown {
        return match tokio::fs::read_to_string(&path).await {
            Ok(text) => (
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                render_markdown(&text),
            )
                .into_response(),
            Err(_) => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
        };
    }

    match tokio::fs::read(&path).await {
        Ok(content) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.as_ref())], content).into_response()
        }
        Err(_) => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

/// Convert a Markdown document into a minimal standalone HTML page.
fn render_markdown(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(text, options);
    let mut body = String::with_capacity(text.len() * 2);
    html::push_html(&mut body, parser);

    format!(
        "<!DOCTYPE html>\n<html>\n<body>\n{}</body>\n</html>\n",
        body
    )
}

async fn render_listing(root: &Path, dir: &Path, request_path: &str) -> Response {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    };

    let base = request_path.trim_end_matches('/');
    let mut names = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.path().is_dir() {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();

    let items = names
        .iter()
        .map(|name| format!("<li><a href=\"{}/{}\">{}</a></li>", base, name, name))
        .collect::<String>();
    let title = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string());
    let page = format!(
        "<!DOCTYPE html>\n<html>\n<body>\n<h1>Index of {}{}</h1>\n<ul>{}</ul>\n</body>\n</html>\n",
        title, request_path, items
    );

    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        page,
    )
        .into_response()
}

/// Expand the input globs against the server root and return the root
/// together with root-relative paths ready for URL rewriting.
///
/// With an explicit root the patterns are resolved beneath it; with a
/// derived root the patterns already carry their prefix and the root is
/// the deepest directory common to all of them.
pub fn resolve_local_inputs(
    paths: &[String],
    server_root: Option<&Path>,
) -> Result<(PathBuf, Vec<String>), ConfigError> {
    let (root, full_patterns): (PathBuf, Vec<String>) = match server_root {
        Some(root) => (
            root.to_path_buf(),
            paths
                .iter()
                .map(|p| root.join(p).to_string_lossy().into_owned())
                .collect(),
        ),
        None => (derive_root(paths), paths.to_vec()),
    };

    let mut relative = Vec::new();
    for (pattern, full) in paths.iter().zip(&full_patterns) {
        let walker = glob::glob(full).map_err(|source| ConfigError::InvalidGlob {
            pattern: pattern.clone(),
            source,
        })?;

        let mut matched = false;
        for entry in walker {
            let path = entry?;
            matched = true;

            let stripped = path.strip_prefix(&root).unwrap_or(&path);
            let mut rel = stripped.to_string_lossy().replace('\\', "/");
            if path.is_dir() && !rel.is_empty() && !rel.ends_with('/') {
                rel.push('/');
            }
            relative.push(rel);
        }

        if !matched {
            return Err(ConfigError::GlobNoMatches(pattern.clone()));
        }
    }

    Ok((root, relative))
}

/// Deepest directory shared by the non-glob prefixes of all patterns.
fn derive_root(paths: &[String]) -> PathBuf {
    let mut common: Option<PathBuf> = None;

    for pattern in paths {
        let prefix = static_prefix(pattern);
        common = Some(match common {
            None => prefix,
            Some(existing) => common_ancestor(&existing, &prefix),
        });
    }

    common
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// The directory components of a pattern before its first glob
/// metacharacter; for a plain file path, the containing directory.
fn static_prefix(pattern: &str) -> PathBuf {
    let path = Path::new(pattern);
    let mut prefix = PathBuf::new();

    for component in path.components() {
        let text = component.as_os_str().to_string_lossy();
        if text.contains('*') || text.contains('?') || text.contains('[') {
            break;
        }
        prefix.push(component);
    }

    if prefix == path && !prefix.is_dir() {
        prefix.pop();
    }

    if prefix.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        prefix
    }
}

fn common_ancestor(a: &Path, b: &Path) -> PathBuf {
    a.components()
        .zip(b.components())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        fs::write(dir.path().join("docs/a.html"), "<html></html>").unwrap();
        fs::write(dir.path().join("docs/b.md"), "# heading").unwrap();
        dir
    }

    #[test]
    fn test_resolve_with_explicit_root() {
        let dir = fixture();
        let paths = vec!["docs/*.html".to_string()];
        let (root, rel) = resolve_local_inputs(&paths, Some(dir.path())).unwrap();

        assert_eq!(root, dir.path());
        assert_eq!(rel, vec!["docs/a.html".to_string()]);
    }

    #[test]
    fn test_resolve_derives_root() {
        let dir = fixture();
        let pattern = dir
            .path()
            .join("docs/*.md")
            .to_string_lossy()
            .into_owned();
        let (root, rel) = resolve_local_inputs(&[pattern], None).unwrap();

        assert_eq!(root, dir.path().join("docs"));
        assert_eq!(rel, vec!["b.md".to_string()]);
    }

    #[test]
    fn test_zero_matches_is_config_error() {
        let dir = fixture();
        let paths = vec!["missing/*.html".to_string()];
        assert!(matches!(
            resolve_local_inputs(&paths, Some(dir.path())),
            Err(ConfigError::GlobNoMatches(_))
        ));
    }

    #[test]
    fn test_static_prefix() {
        assert_eq!(static_prefix("docs/**/*.html"), PathBuf::from("docs"));
        assert_eq!(static_prefix("*.html"), PathBuf::from("."));
        assert_eq!(static_prefix("a/b/c.html"), PathBuf::from("a/b"));
    }

    #[test]
    fn test_render_markdown() {
        let page = render_markdown("# Title\n\n[link](https://test.local/)");
        assert!(page.contains("<h1>Title</h1>"));
        assert!(page.contains("href=\"https://test.local/\""));
        assert!(page.starts_with("<!DOCTYPE html>"));
    }

    #[tokio::test]
    async fn test_bridge_serves_files() {
        let dir = fixture();
        let bridge = ServerBridge::start(dir.path().to_path_buf(), None, true, false)
            .await
            .unwrap();

        let port = bridge.base_url.port().unwrap();
        assert!((PORT_RANGE_START..=PORT_RANGE_END).contains(&port));

        let client = reqwest::Client::new();

        let resp = client
            .get(bridge.url_for("index.html").unwrap())
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        assert!(resp
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("text/html"));

        // Markdown converted on the fly
        let resp = client
            .get(bridge.url_for("docs/b.md").unwrap())
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let body = resp.text().await.unwrap();
        assert!(body.contains("<h1>heading</h1>"));

        // Unknown file
        let resp = client
            .get(bridge.url_for("nope.html").unwrap())
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 404);

        bridge.shutdown();
    }

    #[tokio::test]
    async fn test_directory_listing_toggle() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("only.txt"), "x").unwrap();

        let listing = ServerBridge::start(dir.path().to_path_buf(), None, false, true)
            .await
            .unwrap();
        let client = reqwest::Client::new();
        let resp = client
            .get(listing.base_url.clone())
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        assert!(resp.text().await.unwrap().contains("only.txt"));
        listing.shutdown();

        let bare = ServerBridge::start(dir.path().to_path_buf(), None, false, false)
            .await
            .unwrap();
        let resp = client.get(bare.base_url.clone()).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 404);
        bare.shutdown();
    }
}
