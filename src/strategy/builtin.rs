use super::Strategy;
use crate::pipeline::OptimizeError;
use ::oxipng::{Options, StripChunks};
use fs_err as fs;
use std::{path::Path, process::ExitStatus};

/// Runs the oxipng library in-process, for machines without the binaries.
pub struct Builtin {
    options: Options,
}

impl Default for Builtin {
    fn default() -> Self {
        let mut options = Options::from_preset(2);
        options.strip = StripChunks::Safe;
        Self { options }
    }
}

impl Builtin {
    pub fn optimize_png(&self, data: &[u8]) -> Result<Vec<u8>, OptimizeError> {
        Ok(::oxipng::optimize_from_memory(data, &self.options)?)
    }
}

impl Strategy for Builtin {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn verifies_pixels(&self) -> bool {
        true
    }

    fn optimize(&self, path: &Path) -> Result<Option<ExitStatus>, OptimizeError> {
        let data = fs::read(path)?;
        let optimized = self.optimize_png(&data)?;

        if optimized.len() < data.len() {
            fs::write(path, &optimized)?;
        } else {
            log::debug!("oxipng found no savings for {}", path.display());
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::png::tests::chunk;

    fn noisy_png() -> Vec<u8> {
        use image::{ImageFormat, Rgba, RgbaImage};
        use std::io::Cursor;

        // Opaque and only a few colours, so oxipng can reduce it to a palette.
        let img = RgbaImage::from_fn(32, 32, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        let encoded = buffer.into_inner();

        let mut with_text = encoded[..33].to_vec();
        with_text.extend_from_slice(&chunk(b"tEXt", &[b'x'; 512]));
        with_text.extend_from_slice(&encoded[33..]);
        with_text
    }

    #[test]
    fn test_builtin_shrinks_and_keeps_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.png");
        let original = noisy_png();
        std::fs::write(&path, &original).unwrap();

        let status = Builtin::default().optimize(&path).unwrap();
        assert!(status.is_none());

        let after = std::fs::read(&path).unwrap();
        assert!(after.len() < original.len());

        let before = image::load_from_memory(&original).unwrap().to_rgba8();
        let after = image::load_from_memory(&after).unwrap().to_rgba8();
        assert_eq!(before, after);
    }

    #[test]
    fn test_builtin_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let err = Builtin::default().optimize(&path).unwrap_err();
        assert!(matches!(err, OptimizeError::Builtin(_)));
        assert_eq!(std::fs::read(&path).unwrap(), b"definitely not a png");
    }
}
