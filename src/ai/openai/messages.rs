//! Builds the single image-bearing user turn sent to the chat API.

use super::types::{ChatMessage, ContentBlock, Detail, MessageContent, SimplePart};
use crate::image::normalize;
use std::path::PathBuf;

/// Knobs for user-message construction.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Images get downsized if any dimension exceeds this.
    pub max_size_px: u32,
    /// True selects the API-reference content-array shape.
    pub tiled: bool,
    /// Images whose pre-resize longer side is below this get the LOW tier.
    pub detail_threshold: u32,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_size_px: 1024,
            tiled: false,
            detail_threshold: 700,
        }
    }
}

/// LOW below the threshold, HIGH at or above it.
pub fn detail_for(original_max: u32, detail_threshold: u32) -> Detail {
    if original_max < detail_threshold {
        Detail::Low
    } else {
        Detail::High
    }
}

/// Assemble one USER-role message carrying `user_text` plus the batch of
/// images, returned as a single-element list ready to splice into a request.
///
/// This is a best-effort batch: images that fail to load are logged and
/// dropped rather than aborting the whole request, and the survivors keep
/// their original order.
pub fn build_user_message(
    user_text: &str,
    file_paths: &[PathBuf],
    opts: &BuildOptions,
) -> Vec<ChatMessage> {
    // No files, no tiles.
    let tiled = opts.tiled && !file_paths.is_empty();

    let mut images = Vec::with_capacity(file_paths.len());
    for path in file_paths {
        match normalize(path, opts.max_size_px) {
            Ok(img) => images.push(img),
            Err(e) => tracing::warn!("Dropping image {}: {}", path.display(), e),
        }
    }

    let content = if tiled {
        let mut blocks = vec![ContentBlock::text(user_text)];
        blocks.extend(images.iter().map(|img| {
            ContentBlock::image(
                format!("data:image/png;base64,{}", img.base64),
                detail_for(img.original_max, opts.detail_threshold),
            )
        }));
        MessageContent::Tiled(blocks)
    } else {
        let mut parts = vec![SimplePart::Text(user_text.to_string())];
        parts.extend(
            images
                .into_iter()
                .map(|img| SimplePart::Image { image: img.base64 }),
        );
        MessageContent::Simple(parts)
    };

    vec![ChatMessage {
        role: "user".to_string(),
        content,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::path::Path;
    use tempfile::TempDir;

    fn save_png(dir: &Path, name: &str, side: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(side, side, image::Rgb([0, 200, 0]))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path
    }

    #[test]
    fn test_detail_threshold_is_strict_less_than() {
        assert_eq!(detail_for(699, 700), Detail::Low);
        assert_eq!(detail_for(700, 700), Detail::High);
        assert_eq!(detail_for(701, 700), Detail::High);
    }

    #[test]
    fn test_empty_batch_forces_untiled() {
        let opts = BuildOptions {
            tiled: true,
            ..Default::default()
        };
        let messages = build_user_message("hello", &[], &opts);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
        match &messages[0].content {
            MessageContent::Simple(parts) => assert_eq!(parts.len(), 1),
            other => panic!("expected simple content, got {:?}", other),
        }
    }

    #[test]
    fn test_tiled_batch_carries_detail_tiers() {
        let dir = TempDir::new().unwrap();
        let small = save_png(dir.path(), "small.png", 100);
        let large = save_png(dir.path(), "large.png", 900);

        let opts = BuildOptions {
            tiled: true,
            ..Default::default()
        };
        let messages = build_user_message("what happened?", &[small, large], &opts);

        let MessageContent::Tiled(blocks) = &messages[0].content else {
            panic!("expected tiled content");
        };
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].text.as_deref(), Some("what happened?"));

        let details: Vec<Detail> = blocks[1..]
            .iter()
            .map(|b| b.image_url.as_ref().unwrap().detail)
            .collect();
        assert_eq!(details, vec![Detail::Low, Detail::High]);

        let url = &blocks[1].image_url.as_ref().unwrap().url;
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_unreadable_image_is_dropped_preserving_order() {
        let dir = TempDir::new().unwrap();
        let first = save_png(dir.path(), "first.png", 10);
        let missing = dir.path().join("missing.png");
        let last = save_png(dir.path(), "last.png", 20);

        let messages =
            build_user_message("batch", &[first.clone(), missing, last.clone()], &BuildOptions::default());

        let MessageContent::Simple(parts) = &messages[0].content else {
            panic!("expected simple content");
        };
        // Text plus the two readable images, no placeholder for the missing one.
        assert_eq!(parts.len(), 3);

        let expected_first = normalize(&first, 1024).unwrap().base64;
        let expected_last = normalize(&last, 1024).unwrap().base64;
        match (&parts[1], &parts[2]) {
            (SimplePart::Image { image: a }, SimplePart::Image { image: b }) => {
                assert_eq!(a, &expected_first);
                assert_eq!(b, &expected_last);
            }
            other => panic!("expected two image markers, got {:?}", other),
        }
    }

    #[test]
    fn test_untiled_images_have_no_detail_tag() {
        let dir = TempDir::new().unwrap();
        let img = save_png(dir.path(), "one.png", 50);

        let messages = build_user_message("look", &[img], &BuildOptions::default());
        let json = serde_json::to_value(&messages[0]).unwrap();

        assert!(json["content"].is_array());
        assert!(json["content"][1]["image"].is_string());
        assert!(json["content"][1].get("detail").is_none());
    }
}
