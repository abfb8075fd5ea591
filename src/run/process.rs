use super::collect::Candidate;
use crate::{
    manifest::Manifest, pipeline::Pipeline, progress_bar::ProgressBar, util::size::format_size,
};
use anyhow::Context;
use log::{debug, error, info, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub processed: usize,
    pub failed: usize,
    pub bytes_saved: i64,
}

/// Optimizes each candidate in turn, persisting the manifest after every
/// success. Stops at the first pixel verification failure.
pub fn process(
    candidates: &[Candidate],
    pipeline: &Pipeline,
    manifest: &mut Manifest,
    pb: &ProgressBar,
    quiet: bool,
) -> anyhow::Result<Summary> {
    let mut summary = Summary::default();
    let total = candidates.len();

    for (i, candidate) in candidates.iter().enumerate() {
        let path = &candidate.path;
        if !quiet {
            info!("updating {}", path.display());
        }

        match pipeline.process(path) {
            Ok(outcome) => {
                if !quiet {
                    info!(
                        "before: {} Bytes, after: {} Bytes, diff: {} Bytes",
                        outcome.bytes_before,
                        outcome.bytes_after,
                        outcome.bytes_saved()
                    );
                }

                debug!(
                    "{}: exit status {:?}, verification {:?}",
                    candidate.id, outcome.exit_status, outcome.verification
                );

                manifest.record(candidate.id.clone(), outcome.digest.clone());
                manifest.save().with_context(|| {
                    format!("Failed to record {} in the manifest", candidate.id)
                })?;

                if !quiet {
                    info!("updated {}", path.display());
                }
                summary.processed += 1;
                summary.bytes_saved += outcome.bytes_saved();
            }
            Err(err) if err.is_fatal() => {
                error!("{err}");
                pb.finish();
                return Err(err).with_context(|| {
                    format!(
                        "Aborting after {} of {total} files: {} must be restored before running again",
                        i + 1,
                        path.display()
                    )
                });
            }
            Err(err) => {
                warn!("Skipping {} because it failed processing: {err}", path.display());
                summary.failed += 1;
            }
        }

        pb.inc(candidate.size);
        let counts = format!(
            "{}/{total}, reduced pngs size: {}",
            i + 1,
            format_size(summary.bytes_saved)
        );
        if quiet {
            pb.set_msg(&format!("files {counts}"));
        } else {
            info!("file counts: {counts}");
        }
    }

    pb.finish();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        manifest::hash_file,
        pipeline::tests::{Corrupting, write_gray_png},
        strategy::Builtin,
    };
    use std::path::Path;

    fn candidate(path: &Path, id: &str) -> Candidate {
        Candidate {
            path: path.to_path_buf(),
            id: id.to_string(),
            size: std::fs::metadata(path).unwrap().len(),
        }
    }

    #[test]
    fn test_records_each_success_and_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        write_gray_png(&good, 16, 16, |x, y| ((x + y) % 2) as u8 * 255);
        let broken = dir.path().join("broken.png");
        std::fs::write(&broken, b"\x89PNG\r\n\x1a\ntruncated").unwrap();

        let manifest_path = dir.path().join("manifest.json");
        let mut manifest = Manifest::load(&manifest_path).unwrap();
        let pipeline = Pipeline::new(Box::new(Builtin::default()));

        let candidates = vec![candidate(&broken, "docs/broken"), candidate(&good, "docs/good")];
        let summary =
            process(&candidates, &pipeline, &mut manifest, &ProgressBar::hidden(), true).unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 1);
        assert!(summary.bytes_saved >= 0);

        let reloaded = Manifest::load(&manifest_path).unwrap();
        assert_eq!(reloaded.get("docs/good"), Some(hash_file(&good).unwrap().as_str()));
        assert_eq!(reloaded.get("docs/broken"), None);
    }

    #[test]
    fn test_verification_failure_stops_batch() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (0..3)
            .map(|i| {
                let path = dir.path().join(format!("{i}.png"));
                write_gray_png(&path, 4, 4, |x, _| x as u8 * 10);
                path
            })
            .collect();
        let second_before = std::fs::read(&paths[1]).unwrap();

        let manifest_path = dir.path().join("manifest.json");
        let mut manifest = Manifest::load(&manifest_path).unwrap();
        let pipeline = Pipeline::new(Box::new(Corrupting));

        let candidates: Vec<_> = paths
            .iter()
            .enumerate()
            .map(|(i, p)| candidate(p, &format!("docs/{i}")))
            .collect();
        let err = process(&candidates, &pipeline, &mut manifest, &ProgressBar::hidden(), false)
            .unwrap_err();

        assert!(format!("{err:#}").contains("changed during optimization"));
        assert!(manifest.is_empty());
        assert!(!manifest_path.exists());
        assert_eq!(std::fs::read(&paths[1]).unwrap(), second_before);
    }
}
