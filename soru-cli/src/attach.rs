use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use image::ImageFormat;
use soru::ImageHandle;

/// MIME type of an image the vision model accepts, sniffed from its bytes.
pub fn mime_for(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}

/// `~/x` → `$HOME/x`. Quotes from drag-and-drop are stripped.
pub fn expand_path(raw: &str) -> PathBuf {
    let raw = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    if let Some(rest) = raw.strip_prefix("~/")
        && let Ok(home) = std::env::var("HOME")
    {
        return PathBuf::from(home).join(rest);
    }
    PathBuf::from(raw)
}

pub fn load_path(path: &Path) -> anyhow::Result<ImageHandle> {
    let bytes = std::fs::read(path).with_context(|| format!("{} okunamadı", path.display()))?;
    let mime = mime_for(&bytes)
        .ok_or_else(|| anyhow!("Desteklenmeyen resim biçimi: {}", path.display()))?;
    Ok(ImageHandle::new(bytes, mime))
}

/// Clipboard image, re-encoded as PNG.
pub fn from_clipboard() -> anyhow::Result<ImageHandle> {
    let mut clipboard = arboard::Clipboard::new().context("pano açılamadı")?;
    let img = clipboard
        .get_image()
        .map_err(|_| anyhow!("Panoda resim bulunamadı"))?;
    let w = img.width as u32;
    let h = img.height as u32;
    let rgba = image::RgbaImage::from_raw(w, h, img.bytes.into_owned())
        .ok_or_else(|| anyhow!("Panodaki resim okunamadı"))?;
    let mut png = std::io::Cursor::new(Vec::new());
    rgba.write_to(&mut png, ImageFormat::Png)?;
    Ok(ImageHandle::new(png.into_inner(), "image/png"))
}

/// Short label for the image badge.
pub fn label_for(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn sniffs_supported_formats() {
        assert_eq!(mime_for(PNG_MAGIC), Some("image/png"));
        assert_eq!(mime_for(JPEG_MAGIC), Some("image/jpeg"));
        assert_eq!(mime_for(b"plain text"), None);
    }

    #[test]
    fn loads_file_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soru.png");
        std::fs::write(&path, PNG_MAGIC).unwrap();
        let handle = load_path(&path).unwrap();
        assert_eq!(handle.mime_type(), "image/png");
        assert_eq!(handle.bytes(), PNG_MAGIC);
        assert_eq!(label_for(&path), "soru.png");
    }

    #[test]
    fn rejects_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notlar.txt");
        std::fs::write(&path, "merhaba").unwrap();
        assert!(load_path(&path).is_err());
        assert!(load_path(&dir.path().join("yok.png")).is_err());
    }

    #[test]
    fn strips_quotes() {
        assert_eq!(expand_path("'/tmp/a b.png'"), PathBuf::from("/tmp/a b.png"));
        assert_eq!(expand_path(" \"/tmp/x.jpg\" "), PathBuf::from("/tmp/x.jpg"));
    }
}
