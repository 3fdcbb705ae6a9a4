use std::path::Path;
use log::{debug, info, warn};
use crate::error::{Error, Result};
use crate::ffprobe::{audio_stream_count, StreamProbe};

/// Audio streams a merged file must carry (original + dubbed)
pub const REQUIRED_AUDIO_STREAMS: usize = 2;

/// Validate the merged output, then delete the sources it replaces
///
/// Nothing is deleted unless the output probes with at least two audio streams.
/// The VO file is only removed when it is a different file from the output.
pub async fn finalize(
    probe: &dyn StreamProbe,
    output: &Path,
    es_path: &Path,
    vo_path: Option<&Path>,
) -> Result<()> {
    // Step 1: Validate
    if !output.exists() {
        return Err(Error::probe(output, "merged output does not exist"));
    }

    let streams = probe.streams(output).await?;
    let audio_streams = audio_stream_count(&streams);
    debug!("{} has {} stream(s), {} audio", output.display(), streams.len(), audio_streams);

    if audio_streams < REQUIRED_AUDIO_STREAMS {
        warn!(
            "❌ {} has {} audio stream(s), keeping source files",
            output.display(),
            audio_streams
        );
        return Err(Error::ValidationFailed {
            path: output.to_path_buf(),
            audio_streams,
        });
    }

    // Step 2: Delete sources
    remove_source(es_path)?;

    if let Some(vo) = vo_path {
        if same_file(vo, output) {
            debug!("VO path is the output itself, not deleting: {}", vo.display());
        } else {
            remove_source(vo)?;
        }
    }

    info!("✅ Validated {} ({} audio streams)", output.display(), audio_streams);
    Ok(())
}

fn remove_source(path: &Path) -> Result<()> {
    if !path.exists() {
        debug!("Source already gone: {}", path.display());
        return Ok(());
    }
    std::fs::remove_file(path).map_err(|source| Error::Cleanup {
        path: path.to_path_buf(),
        source,
    })?;
    info!("🗑️  Deleted {}", path.display());
    Ok(())
}

/// Remove container-normalization leftovers, never touching `keep`
pub fn discard_intermediates(paths: &[&Path], keep: &Path) {
    for path in paths {
        if same_file(path, keep) || !path.exists() {
            continue;
        }
        match std::fs::remove_file(path) {
            Ok(()) => debug!("Removed intermediate {}", path.display()),
            Err(e) => warn!("Failed to remove intermediate {}: {}", path.display(), e),
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
