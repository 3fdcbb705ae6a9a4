use std::path::{Path, PathBuf};
use log::info;
use crate::error::{Error, Result};
use crate::ffmpeg::Muxer;

const LANGUAGE_TAGS: [&str; 6] = ["en", "eng", "english", "es", "esp", "spanish"];
const COMBINED_TAG: &str = ".en.es";

/// Name of the merged file derived from the VO file name
///
/// An existing `.en.es` tag is kept as is; otherwise single-language tags are
/// dropped and `.en.es` appended, so repeated merges never stack tags.
pub fn output_file_name(vo_path: &Path) -> String {
    let stem = vo_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let lower = stem.to_lowercase();

    let base = if lower.ends_with(COMBINED_TAG) || lower.contains(".en.es.") {
        stem
    } else {
        let kept: Vec<&str> = stem
            .split('.')
            .enumerate()
            .filter(|(i, seg)| *i == 0 || !LANGUAGE_TAGS.contains(&seg.to_lowercase().as_str()))
            .map(|(_, seg)| seg)
            .collect();
        format!("{}{}", kept.join("."), COMBINED_TAG)
    };

    format!("{}.mkv", base)
}

/// Full output path: `destination` when given, else next to the VO file
pub fn output_path(vo_path: &Path, destination: Option<&Path>) -> PathBuf {
    let dir = destination
        .map(Path::to_path_buf)
        .or_else(|| vo_path.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(output_file_name(vo_path))
}

/// Mux the ES audio into the VO container; both inputs must already be MKV
pub async fn merge(
    muxer: &dyn Muxer,
    vo_mkv: &Path,
    es_mkv: &Path,
    destination: Option<&Path>,
) -> Result<PathBuf> {
    for input in [vo_mkv, es_mkv] {
        if !input.exists() {
            return Err(Error::merge(input, "input file does not exist"));
        }
    }

    if let Some(dir) = destination {
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::merge(dir, format!("could not create destination directory: {}", e)))?;
    }

    let output = output_path(vo_mkv, destination);
    if output == vo_mkv || output == es_mkv {
        return Err(Error::merge(&output, "output would overwrite an input file"));
    }
    if output.exists() {
        return Err(Error::merge(&output, "output already exists"));
    }

    info!("Merging {} + {} -> {}", vo_mkv.display(), es_mkv.display(), output.display());

    let result = muxer
        .mux_dubbed_audio(vo_mkv, es_mkv, &output)
        .await
        .map_err(|e| Error::merge(&output, format!("could not run mux: {}", e)))?;

    if !result.success() {
        return Err(Error::merge(
            &output,
            format!(
                "mux exited with code {}: {}",
                result.exit_code.unwrap_or(-1),
                result.stderr_tail(3)
            ),
        ));
    }

    match std::fs::metadata(&output) {
        Ok(meta) if meta.len() > 0 => {
            info!("✅ Merged into {}", output.display());
            Ok(output)
        }
        Ok(_) => Err(Error::merge(&output, "output is empty")),
        Err(_) => Err(Error::merge(&output, "output was not created")),
    }
}
