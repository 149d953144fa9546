use url::Url;

const EMBED_BASE: &str = "https://www.youtube.com/embed/";
const EMBED_PARAMS: &str =
    "autoplay=1&mute=1&controls=0&rel=0&modestbranding=1&playsinline=1&enablejsapi=1";

/// Turns a share, watch or embed link into an autoplaying muted embed URL.
pub fn build_youtube_embed_url(youtube_url: Option<&str>) -> Option<String> {
    let raw = youtube_url?.trim();
    if raw.is_empty() {
        return None;
    }

    let parsed = Url::parse(raw).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let path = parsed.path().trim_matches('/');

    let video_id = if host.contains("youtu.be") {
        path.split('/').next().map(str::to_string)
    } else if host.contains("youtube.com") {
        if path == "watch" {
            parsed
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned())
        } else {
            match path.split('/').collect::<Vec<_>>().as_slice() {
                ["embed", id, ..] => Some(id.to_string()),
                _ => None,
            }
        }
    } else {
        None
    };

    video_id
        .filter(|id| !id.is_empty())
        .map(|id| format!("{EMBED_BASE}{id}?{EMBED_PARAMS}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embed(id: &str) -> Option<String> {
        Some(format!("{EMBED_BASE}{id}?{EMBED_PARAMS}"))
    }

    #[test]
    fn test_supported_forms() {
        assert_eq!(build_youtube_embed_url(Some("https://youtu.be/dQw4w9WgXcQ")), embed("dQw4w9WgXcQ"));
        assert_eq!(
            build_youtube_embed_url(Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42")),
            embed("dQw4w9WgXcQ")
        );
        assert_eq!(
            build_youtube_embed_url(Some("  https://YouTube.com/embed/abc123/  ")),
            embed("abc123")
        );
    }

    #[test]
    fn test_rejected_inputs() {
        assert_eq!(build_youtube_embed_url(None), None);
        assert_eq!(build_youtube_embed_url(Some("   ")), None);
        assert_eq!(build_youtube_embed_url(Some("not a url")), None);
        assert_eq!(build_youtube_embed_url(Some("https://vimeo.com/12345")), None);
        assert_eq!(build_youtube_embed_url(Some("https://youtu.be/")), None);
        assert_eq!(build_youtube_embed_url(Some("https://www.youtube.com/watch")), None);
        assert_eq!(build_youtube_embed_url(Some("https://www.youtube.com/channel/xyz")), None);
    }
}
