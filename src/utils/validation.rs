use std::collections::HashSet;
use std::path::{Path, PathBuf};
use crate::core::{MediaJob, OutputTarget, ToolKind, VideoContainer};
use crate::utils::{ValidationError, format_from_extension, same_file};

/// Validates a job before any worker is involved and resolves its outputs.
///
/// Returns one `(input, output)` pair per input, in submission order.
pub fn validate_job(job: &MediaJob) -> Result<Vec<(PathBuf, PathBuf)>, ValidationError> {
    if job.inputs.is_empty() {
        return Err(ValidationError::settings("No input files provided."));
    }
    if matches!(job.output, OutputTarget::File(_)) && job.inputs.len() > 1 {
        return Err(ValidationError::settings(
            "A single output file cannot receive several inputs; use an output directory",
        ));
    }

    job.tool.validate()?;

    let mut planned = Vec::with_capacity(job.inputs.len());
    let mut seen_outputs = HashSet::new();
    for input in &job.inputs {
        validate_input_path(input, &job.tool)?;

        let output = job.output_for(input)?;
        validate_output_path(&output, input, &job.tool)?;
        if job.inputs.iter().any(|other| same_file(&output, other)) {
            return Err(ValidationError::same_as_input(output));
        }
        if !seen_outputs.insert(output.clone()) {
            return Err(ValidationError::settings(format!(
                "Several inputs would be written to {}", output.display()
            )));
        }
        planned.push((input.clone(), output));
    }

    Ok(planned)
}

/// Validates the input file path and, for image tools, its format
pub fn validate_input_path(path: &Path, tool: &ToolKind) -> Result<(), ValidationError> {
    if !path.exists() {
        return Err(ValidationError::path_not_found(path));
    }

    if !path.is_file() {
        return Err(ValidationError::not_a_file(path));
    }

    // The encoder probes video containers itself
    if !tool.is_video() {
        format_from_extension(path)?;
    }
    Ok(())
}

/// Validates that the output extension agrees with what the tool will write
pub fn validate_output_path(
    output: &Path,
    input: &Path,
    tool: &ToolKind,
) -> Result<(), ValidationError> {
    if output.file_name().is_none() {
        return Err(ValidationError::settings(format!(
            "Output path has no file name: {}", output.display()
        )));
    }

    match tool {
        ToolKind::VideoCompress(settings) => {
            let container = output
                .extension()
                .and_then(|e| e.to_str())
                .and_then(VideoContainer::from_extension);
            if container != Some(settings.container) {
                return Err(ValidationError::settings(format!(
                    "Output {} does not match container .{}",
                    output.display(),
                    settings.container.extension()
                )));
            }
        }
        _ => {
            let written = tool.output_format(input)?;
            let named = format_from_extension(output)?;
            if written != Some(named) {
                return Err(ValidationError::settings(format!(
                    "Output {} does not match the {:?} format being written",
                    output.display(),
                    written
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CompressSettings, ConvertSettings, ResizeSettings, ResampleFilter, VideoSettings};
    use crate::utils::{ErrorKind, ImageFormat};

    fn compress() -> ToolKind {
        ToolKind::Compress(CompressSettings::default())
    }

    #[test]
    fn rejects_missing_input_as_invalid_input() {
        let job = MediaJob::single(compress(), "/definitely/missing.jpg", "/tmp/out.jpg");
        let err = validate_job(&job).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn rejects_out_of_range_options_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.jpg");
        std::fs::write(&input, b"not really a jpeg").unwrap();

        let job = MediaJob::single(
            ToolKind::Compress(CompressSettings { quality: 0, size_tolerance_percent: 1.0 }),
            &input,
            dir.path().join("b.jpg"),
        );
        assert_eq!(validate_job(&job).unwrap_err().kind(), ErrorKind::InvalidOptions);
    }

    #[test]
    fn rejects_output_equal_to_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.png");
        std::fs::write(&input, b"png").unwrap();

        let job = MediaJob::single(compress(), &input, &input);
        let err = validate_job(&job).unwrap_err();
        assert!(matches!(err, ValidationError::Path(crate::utils::PathError::SameAsInput(_))));
    }

    #[test]
    fn rejects_extension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.png");
        std::fs::write(&input, b"png").unwrap();

        let job = MediaJob::single(
            ToolKind::Convert(ConvertSettings { target_format: ImageFormat::JPEG, quality: None }),
            &input,
            dir.path().join("a.webp"),
        );
        assert_eq!(validate_job(&job).unwrap_err().kind(), ErrorKind::InvalidOptions);

        let video = MediaJob::single(
            ToolKind::VideoCompress(VideoSettings::default()),
            &input,
            dir.path().join("a.mkv"),
        );
        assert_eq!(validate_job(&video).unwrap_err().kind(), ErrorKind::InvalidOptions);
    }

    #[test]
    fn batch_resolves_one_output_per_input() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        let job = MediaJob::batch(
            ToolKind::Resize(ResizeSettings {
                width: Some(10),
                height: None,
                maintain_aspect: true,
                filter: ResampleFilter::Nearest,
            }),
            vec![a.clone(), b.clone()],
            dir.path().join("out"),
        );
        let planned = validate_job(&job).unwrap();
        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0].1, dir.path().join("out").join("a_resized.png"));
        assert_eq!(planned[1].0, b);
    }

    #[test]
    fn batch_rejects_colliding_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("a.jpg");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        let job = MediaJob::batch(
            ToolKind::Convert(ConvertSettings { target_format: ImageFormat::WebP, quality: None }),
            vec![a, b],
            dir.path().join("out"),
        );
        assert_eq!(validate_job(&job).unwrap_err().kind(), ErrorKind::InvalidOptions);
    }
}
