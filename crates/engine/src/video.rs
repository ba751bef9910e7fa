//! Video URL checks used by checkin validation.

use url::Url;

/// Decides whether a checkin video URL is acceptable.
pub trait VideoUrlValidator: Send + Sync {
    fn is_valid(&self, url: &str) -> bool;
}

/// Accepts links to a single YouTube video.
///
/// Recognized shapes: `youtube.com/watch?v=ID`, `youtube.com/embed/ID`,
/// `youtube.com/v/ID` and `youtu.be/ID`, with or without `www.`/`m.`.
#[derive(Clone, Copy, Debug, Default)]
pub struct YoutubeUrls;

impl YoutubeUrls {
    /// Extract the 11 character video id, if any.
    pub fn video_id(url: &str) -> Option<String> {
        let trimmed = url.trim();
        let parsed = Url::parse(trimmed)
            .or_else(|_| Url::parse(&format!("http://{trimmed}")))
            .ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        let host = parsed.host_str()?.to_ascii_lowercase();
        let host = host
            .strip_prefix("www.")
            .or_else(|| host.strip_prefix("m."))
            .unwrap_or(&host);

        let id = match host {
            "youtu.be" => parsed.path_segments()?.next().map(str::to_string),
            "youtube.com" => {
                let mut segments = parsed.path_segments()?;
                match segments.next() {
                    Some("watch") => parsed
                        .query_pairs()
                        .find(|(key, _)| key == "v")
                        .map(|(_, value)| value.into_owned()),
                    Some("embed") | Some("v") => segments.next().map(str::to_string),
                    _ => None,
                }
            }
            _ => None,
        }?;

        is_video_id(&id).then_some(id)
    }
}

impl VideoUrlValidator for YoutubeUrls {
    fn is_valid(&self, url: &str) -> bool {
        Self::video_id(url).is_some()
    }
}

fn is_video_id(id: &str) -> bool {
    id.len() == 11
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
