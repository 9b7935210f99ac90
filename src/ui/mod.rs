//! Chat-facing rendering: the persistent "now playing" status, player
//! buttons and message chunking.

pub mod buttons;

use std::time::Duration;

use crate::sources::Track;

/// Discord rejects message content longer than this.
pub const MESSAGE_LIMIT: usize = 2000;

/// State the player buttons are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerView {
    pub paused: bool,
    pub looping: bool,
}

/// A message the session asks the chat client to send or edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub content: String,
    /// Player buttons to attach, when the client has them enabled.
    pub controls: Option<PlayerView>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            controls: None,
        }
    }

    pub fn now_playing(track: &Track, position: Option<(usize, usize)>, view: PlayerView) -> Self {
        let mut content = format!("Now playing: {}", track.title());
        if let Some(duration) = track.duration() {
            content.push_str(&format!(" [{}]", format_duration(duration)));
        }
        if let Some((index, total)) = position {
            content.push_str(&format!(" ({index}/{total})"));
        }
        if view.paused {
            content.push_str(" - paused");
        }
        if view.looping {
            content.push_str(" - looping");
        }

        Self {
            content,
            controls: Some(view),
        }
    }
}

/// `m:ss`, or `h:mm:ss` from an hour up.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Splits `text` into chunks of at most `limit` bytes, breaking on line ends
/// where possible and never inside a UTF-8 character.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.split_inclusive('\n') {
        if current.len() + line.len() > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        let mut rest = line;
        while rest.len() > limit {
            let mut cut = limit;
            while !rest.is_char_boundary(cut) {
                cut -= 1;
            }
            chunks.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }
        current.push_str(rest);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(5)), "0:05");
        assert_eq!(format_duration(Duration::from_secs(212)), "3:32");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
    }

    #[test]
    fn test_now_playing_content() {
        let track = Track::new("Song", "https://cdn.example/song").with_duration(Duration::from_secs(212));
        let message = OutgoingMessage::now_playing(
            &track,
            Some((2, 5)),
            PlayerView {
                paused: true,
                looping: false,
            },
        );
        assert_eq!(message.content, "Now playing: Song [3:32] (2/5) - paused");
        assert_eq!(
            message.controls,
            Some(PlayerView {
                paused: true,
                looping: false
            })
        );
    }

    #[test]
    fn test_split_message_keeps_short_text_whole() {
        assert_eq!(split_message("\tPlaylist:\nA\nB\n", 2000), vec!["\tPlaylist:\nA\nB\n"]);
        assert!(split_message("", 2000).is_empty());
    }

    #[test]
    fn test_split_message_breaks_on_lines() {
        let chunks = split_message("aaaa\nbbbb\ncccc\n", 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n", "cccc\n"]);
    }

    #[test]
    fn test_split_message_cuts_long_lines_on_char_boundaries() {
        let chunks = split_message("ééééé", 4);
        assert_eq!(chunks, vec!["éé", "éé", "é"]);
        assert!(chunks.iter().all(|chunk| chunk.len() <= 4));
    }
}
