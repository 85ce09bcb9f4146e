//! Line-level playlist rewriting.

/// Content type used when the origin does not supply one
pub const DEFAULT_PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Route prefix under which the relay serves streams
pub const STREAM_ROUTE: &str = "/getStream/";

const NESTED_PLAYLIST_SUFFIX: &str = ".m3u8";

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

fn ends_with_ignore_case(s: &str, suffix: &str) -> bool {
    s.len() >= suffix.len()
        && s.as_bytes()[s.len() - suffix.len()..].eq_ignore_ascii_case(suffix.as_bytes())
}

/// Absolute http(s) URL naming a nested playlist
pub fn is_nested_playlist(line: &str) -> bool {
    (starts_with_ignore_case(line, "http://") || starts_with_ignore_case(line, "https://"))
        && ends_with_ignore_case(line, NESTED_PLAYLIST_SUFFIX)
}

/// Rewrite a playlist so nested playlists are fetched through the relay.
///
/// `relay_base` is the relay's scheme and authority (a trailing slash is
/// ignored). `query` is appended to every rewritten line when non-empty.
/// The input is split on CR and LF with empty segments discarded; every
/// output line ends with `\n`.
pub fn rewrite_playlist(content: &str, relay_base: &str, query: Option<&str>) -> String {
    let stream_base = format!("{}{}", relay_base.trim_end_matches('/'), STREAM_ROUTE);
    let query = query.filter(|q| !q.is_empty());

    let mut out = String::with_capacity(content.len());
    for line in content.split(|c: char| c == '\r' || c == '\n').filter(|l| !l.is_empty()) {
        // Lines already routed through this relay stay as they are.
        if is_nested_playlist(line) && !line.starts_with(&stream_base) {
            out.push_str(&stream_base);
            out.push_str(&urlencoding::encode(line));
            if let Some(q) = query {
                out.push('?');
                out.push_str(q);
            }
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}
