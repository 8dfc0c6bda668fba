use regex::Regex;
use std::sync::LazyLock;

pub const VIDEO_EXTENSION: &str = "mp4";

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("valid unsafe character class"));

/// Replace characters that are not allowed in file names with `_`.
pub fn sanitize_title(title: &str) -> String {
    UNSAFE_CHARS.replace_all(title, "_").into_owned()
}

/// `{position:02}_{title}.mp4`, or `{title}.mp4` without a position.
pub fn video_filename(title: &str, position: Option<usize>) -> String {
    let safe_title = sanitize_title(title);
    match position {
        Some(position) => format!("{:02}_{}.{}", position, safe_title, VIDEO_EXTENSION),
        None => format!("{}.{}", safe_title, VIDEO_EXTENSION),
    }
}
