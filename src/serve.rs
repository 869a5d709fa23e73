//! Preview server for the generated site.
//!
//! A lightweight HTTP server built on `tiny_http`:
//!
//! - Static file serving from `site/`
//! - Automatic `index.html` resolution for directories
//! - Graceful shutdown on Ctrl+C
//!
//! It only reads `site/`. Nothing is rebuilt while serving.

use crate::{config::SiteConfig, log};
use anyhow::{Context, Result, anyhow, bail};
use std::{
    borrow::Cow,
    fs,
    io::Cursor,
    net::{IpAddr, SocketAddr},
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

/// Serve `site/` until Ctrl+C.
///
/// `interface` and `port` override the `serve` section of the config.
pub fn serve_site(config: &SiteConfig, interface: Option<&str>, port: Option<u16>) -> Result<()> {
    let site = config.site_dir();
    if !site.is_dir() {
        bail!(
            "Site directory `{}` does not exist. Run `snowman build` first.",
            site.display()
        );
    }

    let interface = interface.unwrap_or(config.serve.interface.as_str());
    let interface: IpAddr = interface
        .parse()
        .with_context(|| format!("Invalid interface `{interface}`"))?;
    let base_port = port.unwrap_or(config.serve.port);

    let (server, addr) = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    // Blocks until Ctrl+C
    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &site) {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                let addr = server.server_addr().to_ip().unwrap_or(addr);
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

/// Handle a single HTTP request.
///
/// Request resolution order:
/// 1. Exact file match → serve file
/// 2. Directory with index.html → serve index.html
/// 3. Nothing found → 404
fn handle_request(request: Request, site: &Path) -> Result<()> {
    match resolve_path(site, request.url()) {
        Some(path) => serve_file(request, &path),
        None => serve_not_found(request),
    }
}

/// Map a request URL onto a file inside `site`.
///
/// The URL is percent-decoded and stripped of its query string. URLs that
/// try to leave `site` never resolve.
fn resolve_path(site: &Path, url: &str) -> Option<PathBuf> {
    let url_path = urlencoding::decode(url).unwrap_or(Cow::Borrowed(url));
    let url_path = url_path.split(['?', '#']).next().unwrap_or_default();
    let request_path = Path::new(url_path.trim_matches('/'));

    if request_path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }

    let local_path = site.join(request_path);
    if local_path.is_file() {
        return Some(local_path);
    }

    let index_path = local_path.join("index.html");
    index_path.is_file().then_some(index_path)
}

/// Serve a file with appropriate content type.
fn serve_file(request: Request, path: &Path) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let response = Response::from_data(content).with_header(content_type_header(guess_content_type(path)));

    request.respond(response)?;
    Ok(())
}

/// Serve 404 Not Found response.
fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::new(
        StatusCode(404),
        vec![content_type_header("text/plain; charset=utf-8")],
        Cursor::new("404 Not Found"),
        Some(13),
        None,
    );
    request.respond(response)?;
    Ok(())
}

fn content_type_header(value: &'static str) -> Header {
    Header::from_bytes("Content-Type", value).unwrap()
}

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml" | "rdf") => "application/xml; charset=utf-8",

        // Linked data
        Some("ttl") => "text/turtle; charset=utf-8",
        Some("jsonld") => "application/ld+json; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        // Documents
        Some("txt") => "text/plain; charset=utf-8",

        _ => "application/octet-stream",
    }
}
