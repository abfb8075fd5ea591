use crate::{manifest, png, strategy::Strategy};
use fs_err as fs;
use image::GrayImage;
use std::{
    io,
    path::{Path, PathBuf},
    process::ExitStatus,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("malformed PNG: {0}")]
    Malformed(#[from] png::ChunkError),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}{}", format_stderr(.stderr))]
    ToolFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("built-in optimizer failed: {0}")]
    Builtin(#[from] oxipng::PngError),

    #[error("pixels of {} changed during optimization: {reason}", .path.display())]
    VerificationFailed { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn format_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

impl OptimizeError {
    /// A changed image means an asset may already be corrupted on disk, so
    /// the whole batch has to stop. Every other error only skips the file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OptimizeError::VerificationFailed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// The strategy is lossless by construction.
    Skipped,
    PixelsMatch,
}

/// What happened to one file.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub bytes_before: u64,
    pub bytes_after: u64,
    pub exit_status: Option<ExitStatus>,
    pub verification: Verification,
    /// SHA-256 of the optimized file.
    pub digest: String,
}

impl Outcome {
    pub fn bytes_saved(&self) -> i64 {
        self.bytes_before as i64 - self.bytes_after as i64
    }
}

pub struct Pipeline {
    strategy: Box<dyn Strategy>,
}

impl Pipeline {
    pub fn new(strategy: Box<dyn Strategy>) -> Self {
        Self { strategy }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn process(&self, path: &Path) -> Result<Outcome, OptimizeError> {
        let bytes_before = fs::metadata(path)?.len();

        if self.strategy.strips_chunks() {
            let removed = png::strip_file(path)?;
            log::debug!(
                "Stripped {removed} bytes of ancillary chunks from {}",
                path.display()
            );
        }

        let before = if self.strategy.verifies_pixels() {
            Some(luminance(path)?)
        } else {
            None
        };

        // A tool can rewrite the file and still exit nonzero, so the check
        // runs on whatever is on disk before the tool's own error surfaces.
        let result = self.strategy.optimize(path);

        let verification = match &before {
            Some(before) => {
                verify(path, before)?;
                Verification::PixelsMatch
            }
            None => Verification::Skipped,
        };

        let exit_status = result?;
        let bytes_after = fs::metadata(path)?.len();

        let digest = manifest::hash_file(path)?;

        Ok(Outcome {
            bytes_before,
            bytes_after,
            exit_status,
            verification,
            digest,
        })
    }
}

fn verify(path: &Path, before: &GrayImage) -> Result<(), OptimizeError> {
    let after = luminance(path).map_err(|err| OptimizeError::VerificationFailed {
        path: path.to_path_buf(),
        reason: format!("optimized file no longer decodes: {err}"),
    })?;
    compare_pixels(before, &after).map_err(|reason| OptimizeError::VerificationFailed {
        path: path.to_path_buf(),
        reason,
    })
}

fn luminance(path: &Path) -> Result<GrayImage, image::ImageError> {
    Ok(image::open(path)?.to_luma8())
}

fn compare_pixels(before: &GrayImage, after: &GrayImage) -> Result<(), String> {
    if before.dimensions() != after.dimensions() {
        let (bw, bh) = before.dimensions();
        let (aw, ah) = after.dimensions();
        return Err(format!("size changed from {bw}x{bh} to {aw}x{ah}"));
    }

    match before
        .enumerate_pixels()
        .zip(after.pixels())
        .find(|((_, _, a), b)| a != b)
    {
        Some(((x, y, a), b)) => Err(format!(
            "pixel ({x}, {y}) changed from {} to {}",
            a.0[0], b.0[0]
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::strategy::Builtin;
    use image::{ImageFormat, Luma};

    pub(crate) fn write_gray_png(
        path: &Path,
        width: u32,
        height: u32,
        shade: impl Fn(u32, u32) -> u8,
    ) {
        let img = GrayImage::from_fn(width, height, |x, y| Luma([shade(x, y)]));
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    /// Rewrites the image with one pixel brightened.
    pub(crate) struct Corrupting;

    impl Strategy for Corrupting {
        fn name(&self) -> &'static str {
            "corrupting"
        }

        fn verifies_pixels(&self) -> bool {
            true
        }

        fn optimize(&self, path: &Path) -> Result<Option<ExitStatus>, OptimizeError> {
            let mut img = luminance(path)?;
            let pixel = img.get_pixel_mut(0, 0);
            pixel.0[0] = pixel.0[0].wrapping_add(1);
            img.save_with_format(path, ImageFormat::Png)?;
            Ok(None)
        }
    }

    /// Brightens one pixel, then runs a tool that exits nonzero.
    #[cfg(unix)]
    struct CorruptingThenFailing;

    #[cfg(unix)]
    impl Strategy for CorruptingThenFailing {
        fn name(&self) -> &'static str {
            "corrupting-then-failing"
        }

        fn verifies_pixels(&self) -> bool {
            true
        }

        fn optimize(&self, path: &Path) -> Result<Option<ExitStatus>, OptimizeError> {
            Corrupting.optimize(path)?;
            crate::strategy::run_tool(Path::new("false"), &[], path, true).map(Some)
        }
    }

    /// Leaves the file alone and runs a tool that exits nonzero.
    #[cfg(unix)]
    struct Failing;

    #[cfg(unix)]
    impl Strategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn verifies_pixels(&self) -> bool {
            true
        }

        fn optimize(&self, path: &Path) -> Result<Option<ExitStatus>, OptimizeError> {
            crate::strategy::run_tool(Path::new("false"), &[], path, true).map(Some)
        }
    }

    /// Appends an ancillary chunk without touching pixels, and does not check.
    struct Growing;

    impl Strategy for Growing {
        fn name(&self) -> &'static str {
            "growing"
        }

        fn strips_chunks(&self) -> bool {
            true
        }

        fn optimize(&self, path: &Path) -> Result<Option<ExitStatus>, OptimizeError> {
            let mut data = fs::read(path)?;
            let iend = data.split_off(data.len() - 12);
            data.extend_from_slice(&crate::png::tests::chunk(b"tEXt", b"Comment\0grown"));
            data.extend_from_slice(&iend);
            fs::write(path, data)?;
            Ok(None)
        }
    }

    #[test]
    fn test_verification_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        write_gray_png(&path, 4, 4, |x, y| (x * 16 + y) as u8);

        let err = Pipeline::new(Box::new(Corrupting)).process(&path).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("pixel (0, 0) changed from 0 to 1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_changed_pixels_are_caught_when_tool_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        write_gray_png(&path, 4, 4, |_, _| 10);

        let err = Pipeline::new(Box::new(CorruptingThenFailing))
            .process(&path)
            .unwrap_err();
        assert!(matches!(err, OptimizeError::VerificationFailed { .. }));
        assert!(err.is_fatal());
        assert!(err.to_string().contains("pixel (0, 0) changed from 10 to 11"));
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_failure_with_intact_pixels_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        write_gray_png(&path, 4, 4, |_, _| 10);

        let err = Pipeline::new(Box::new(Failing)).process(&path).unwrap_err();
        assert!(matches!(err, OptimizeError::ToolFailed { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_builtin_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        write_gray_png(&path, 64, 64, |x, _| if x < 32 { 0 } else { 255 });

        let outcome = Pipeline::new(Box::new(Builtin::default()))
            .process(&path)
            .unwrap();

        assert_eq!(outcome.verification, Verification::PixelsMatch);
        assert!(outcome.exit_status.is_none());
        assert!(outcome.bytes_saved() >= 0);
        assert_eq!(outcome.bytes_after, std::fs::metadata(&path).unwrap().len());
        assert_eq!(outcome.digest, manifest::hash_file(&path).unwrap());
    }

    #[test]
    fn test_unverified_strategy_reports_growth() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        write_gray_png(&path, 2, 2, |_, _| 7);

        let outcome = Pipeline::new(Box::new(Growing)).process(&path).unwrap();
        assert_eq!(outcome.verification, Verification::Skipped);
        assert!(outcome.bytes_saved() < 0);
    }

    #[test]
    fn test_malformed_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        let mut data = crate::png::SIGNATURE.to_vec();
        data.extend_from_slice(&[0, 0, 0, 13, b'I', b'H']);
        std::fs::write(&path, &data).unwrap();

        let err = Pipeline::new(Box::new(Growing)).process(&path).unwrap_err();
        assert!(matches!(err, OptimizeError::Malformed(_)));
        assert!(!err.is_fatal());
        assert_eq!(std::fs::read(&path).unwrap(), data);
    }

    #[test]
    fn test_compare_pixels_dimension_change() {
        let a = GrayImage::new(2, 2);
        let b = GrayImage::new(2, 3);
        assert_eq!(
            compare_pixels(&a, &b).unwrap_err(),
            "size changed from 2x2 to 2x3"
        );
        assert!(compare_pixels(&a, &a.clone()).is_ok());
    }
}
