//! The decoded-but-still-compressed bitmap character payload. Actual pixel
//! decoding is delegated to the image-codec collaborators (`jpeg-decoder`,
//! `png`, `gif`); the core only needs their declared dimensions and the
//! still-compressed bytes to hand to a render backend.

#[derive(Clone, Debug)]
pub enum CompressedBitmap {
    Jpeg {
        data: Vec<u8>,
        alpha: Option<Vec<u8>>,
        width: u16,
        height: u16,
    },
    Lossless {
        format: LosslessFormat,
        width: u16,
        height: u16,
        /// zlib-compressed color-mapped or RGB(A) pixel data, as read
        /// straight off the wire; inflate is delegated to the `flate2`
        /// collaborator at decode time, not at parse time.
        data: Vec<u8>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LosslessFormat {
    ColorMap8,
    Rgb15,
    Rgb32,
}

impl CompressedBitmap {
    pub fn size(&self) -> BitmapSize {
        match self {
            CompressedBitmap::Jpeg { width, height, .. } => BitmapSize { width: *width, height: *height },
            CompressedBitmap::Lossless { width, height, .. } => BitmapSize { width: *width, height: *height },
        }
    }
}

pub struct BitmapSize {
    pub width: u16,
    pub height: u16,
}
