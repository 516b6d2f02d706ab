// Copyright 2019 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Per-window clipboard.

use std::cell::RefCell;

/// An image on the clipboard: tightly packed, non-premultiplied RGBA rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClipboardImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ClipboardImage {
    /// Returns `None` if `pixels` does not hold exactly `width * height` RGBA pixels.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Option<ClipboardImage> {
        if pixels.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(ClipboardImage {
            width,
            height,
            pixels,
        })
    }

    /// The wire form: width and height as little endian `u32`s, then the pixels.
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + self.pixels.len());
        bytes.extend_from_slice(&self.width.to_le_bytes());
        bytes.extend_from_slice(&self.height.to_le_bytes());
        bytes.extend_from_slice(&self.pixels);
        bytes
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Option<ClipboardImage> {
        if bytes.len() < 8 {
            return None;
        }
        let (header, pixels) = bytes.split_at(8);
        let width = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let height = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        ClipboardImage::new(width, height, pixels.to_vec())
    }
}

/// What a window has put on the clipboard.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClipboardContents {
    pub text: Option<String>,
    pub image: Option<ClipboardImage>,
}

impl ClipboardContents {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.image.is_none()
    }
}

/// Format names used on the wire.
pub struct ClipboardFormat;

impl ClipboardFormat {
    pub const TEXT: &'static str = "UTF8_STRING";
    pub const IMAGE: &'static str = "image/x-glint-rgba";
}

/// The clipboard as seen from one window.
///
/// Contents put here are kept until another client takes the selection over; reads fall
/// through to the platform when this window no longer owns it.
#[derive(Debug, Default)]
pub struct Clipboard {
    owned: RefCell<Option<ClipboardContents>>,
}

impl Clipboard {
    pub(crate) fn new() -> Clipboard {
        Clipboard::default()
    }

    /// Contents this window still owns, if any.
    pub(crate) fn owned(&self) -> Option<ClipboardContents> {
        self.owned.borrow().clone()
    }

    pub(crate) fn put_text(&self, text: String) -> ClipboardContents {
        let mut owned = self.owned.borrow_mut();
        let contents = owned.get_or_insert_with(ClipboardContents::default);
        contents.text = Some(text);
        contents.clone()
    }

    pub(crate) fn put_image(&self, image: ClipboardImage) -> ClipboardContents {
        let mut owned = self.owned.borrow_mut();
        let contents = owned.get_or_insert_with(ClipboardContents::default);
        contents.image = Some(image);
        contents.clone()
    }

    /// Another client became the selection owner.
    pub(crate) fn lost(&self) {
        if self.owned.borrow_mut().take().is_some() {
            tracing::debug!("clipboard ownership lost");
        }
    }

    pub(crate) fn clear(&self) {
        self.owned.borrow_mut().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_size_is_checked() {
        assert!(ClipboardImage::new(2, 2, vec![0; 16]).is_some());
        assert!(ClipboardImage::new(2, 2, vec![0; 15]).is_none());
    }

    #[test]
    fn wire_form_rejects_truncated_pixels() {
        let image = ClipboardImage::new(1, 2, vec![9; 8]).unwrap();
        let bytes = image.to_bytes();
        assert_eq!(ClipboardImage::from_bytes(&bytes), Some(image));
        assert_eq!(ClipboardImage::from_bytes(&bytes[..bytes.len() - 1]), None);
        assert_eq!(ClipboardImage::from_bytes(&[0; 4]), None);
    }

    #[test]
    fn text_and_image_accumulate_until_lost() {
        let clipboard = Clipboard::new();
        clipboard.put_text("hello".into());
        let contents = clipboard.put_image(ClipboardImage::new(1, 1, vec![1, 2, 3, 4]).unwrap());
        assert_eq!(contents.text.as_deref(), Some("hello"));
        assert!(contents.image.is_some());

        clipboard.lost();
        assert!(clipboard.owned().is_none());
    }
}
