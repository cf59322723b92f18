use std::sync::Arc;

/// Encoded frame as handed over by the capture collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub bytes: Vec<u8>,
}

impl RawImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

/// Normalised JPEG produced by the image pipeline.
///
/// Immutable once built. Clones share the same buffer, so the inference and
/// persistence collaborators can read it concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    bytes: Arc<[u8]>,
    width: u32,
    height: u32,
    quality: u8,
}

impl ProcessedImage {
    pub fn new(bytes: Vec<u8>, width: u32, height: u32, quality: u8) -> Self {
        Self {
            bytes: bytes.into(),
            width,
            height,
            quality,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn size_kb(&self) -> usize {
        self.bytes.len() / 1024
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// JPEG quality the encoder settled on.
    pub fn quality(&self) -> u8 {
        self.quality
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_buffer() {
        let image = ProcessedImage::new(vec![0u8; 3000], 4, 2, 90);
        let copy = image.clone();
        assert!(std::ptr::eq(image.bytes().as_ptr(), copy.bytes().as_ptr()));
        assert_eq!(copy.size_kb(), 2);
        assert_eq!(copy.dimensions(), (4, 2));
    }
}
