//! Decide which listed items are images.

use crate::api::data::field::{Resource, ResourceKind};

/// Extensions accepted regardless of the reported MIME type. Compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// The part after the last `.` of `name`, if any.
pub(crate) fn extension(name: &str) -> Option<&str> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

/// Whether the extension of `name` is in [`IMAGE_EXTENSIONS`].
pub fn has_image_extension(name: &str) -> bool {
    extension(name).is_some_and(|ext| {
        IMAGE_EXTENSIONS
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    })
}

/// Whether `mime_type` is an `image/*` type.
pub fn has_image_mime(mime_type: Option<&str>) -> bool {
    mime_type.is_some_and(|mime| mime.starts_with("image/"))
}

/// A file whose MIME type starts with `image/`, or whose extension is in [`IMAGE_EXTENSIONS`].
pub fn is_image(item: &Resource) -> bool {
    item.kind == ResourceKind::File
        && (has_image_mime(item.mime_type.as_deref()) || has_image_extension(&item.name))
}

/// Keep only the images, in listing order.
pub fn retain_images(items: Vec<Resource>) -> Vec<Resource> {
    items.into_iter().filter(is_image).collect()
}
