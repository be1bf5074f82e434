//! Plain-text formatting helpers for tool responses.

/// Human-readable byte count (bytes / KB / MB).
pub fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Truncate long snippet content for display, preferring a word boundary
/// when one falls reasonably close to the cap.
pub fn clip_content(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let mut clipped: String = content.chars().take(max_chars).collect();
    if let Some(last_space) = clipped.rfind(' ') {
        if last_space > max_chars * 3 / 4 {
            clipped.truncate(last_space);
        }
    }
    clipped.push_str("...");
    clipped
}

/// Truncate a description for listings.
pub fn clip_description(description: &str, max_chars: usize) -> String {
    if description.chars().count() <= max_chars {
        return description.to_string();
    }
    let clipped: String = content_prefix(description, max_chars);
    format!("{clipped}...")
}

fn content_prefix(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sizes_pick_the_right_unit() {
        assert_eq!(human_size(512), "512 bytes");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn short_content_passes_through() {
        assert_eq!(clip_content("short", 200), "short");
    }

    #[test]
    fn long_content_clips_at_word_boundary() {
        let text = "word ".repeat(60);
        let clipped = clip_content(&text, 200);
        assert!(clipped.ends_with("..."));
        // No mid-word cut: the character before the ellipsis ends a word.
        assert!(!clipped.trim_end_matches("...").ends_with(' '));
        assert!(clipped.chars().count() <= 203);
    }

    #[test]
    fn unbroken_content_clips_hard() {
        let text = "x".repeat(300);
        let clipped = clip_content(&text, 200);
        assert_eq!(clipped.chars().count(), 203);
    }

    #[test]
    fn descriptions_clip_with_ellipsis() {
        let long = "d".repeat(150);
        assert_eq!(clip_description(&long, 100).chars().count(), 103);
        assert_eq!(clip_description("fine", 100), "fine");
    }
}
