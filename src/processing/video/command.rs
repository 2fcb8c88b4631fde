//! ffmpeg argument construction.

use std::ffi::OsString;
use std::path::Path;
use crate::core::{VideoContainer, VideoSettings};

/// Video/audio codec pair for a container
fn codecs_for(container: VideoContainer) -> (&'static str, &'static str) {
    match container {
        VideoContainer::Webm => ("libvpx-vp9", "libopus"),
        VideoContainer::Mp4 | VideoContainer::Mkv | VideoContainer::Mov => ("libx264", "aac"),
    }
}

/// Builds the encoder argument vector writing `input` to `output`.
///
/// Progress goes to stdout as `key=value` blocks; stderr only carries
/// warnings and errors.
pub fn encoder_args(input: &Path, output: &Path, settings: &VideoSettings) -> Vec<OsString> {
    let (video_codec, audio_codec) = codecs_for(settings.container);
    let mut args: Vec<OsString> = [
        "-y", "-hide_banner", "-nostdin",
        "-loglevel", "warning",
        "-progress", "pipe:1",
        "-nostats",
        "-i",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(input.as_os_str().to_owned());

    args.extend(["-c:v", video_codec, "-crf"].map(OsString::from));
    args.push(settings.effective_crf().to_string().into());
    if let Some(rate) = &settings.video_bitrate {
        args.extend([OsString::from("-b:v"), OsString::from(rate)]);
    }
    if settings.container == VideoContainer::Webm {
        // VP9 has no x264 presets; map speed roughly onto -deadline
        let deadline = match settings.preset.as_str() {
            "ultrafast" | "superfast" | "veryfast" => "realtime",
            "slower" | "veryslow" => "best",
            _ => "good",
        };
        args.extend(["-deadline", deadline].map(OsString::from));
    } else {
        args.extend([OsString::from("-preset"), OsString::from(&settings.preset)]);
    }
    args.extend([
        OsString::from("-c:a"),
        OsString::from(audio_codec),
        OsString::from("-b:a"),
        OsString::from(&settings.audio_bitrate),
    ]);
    if settings.container == VideoContainer::Mp4 {
        args.extend(["-movflags", "+faststart"].map(OsString::from));
    }
    args.push(output.as_os_str().to_owned());
    args
}

/// Arguments for a duration probe of `input`, printing seconds on one line.
pub fn probe_args(input: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-v", "error",
        "-show_entries", "format=duration",
        "-of", "default=noprint_wrappers=1:nokey=1",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(input.as_os_str().to_owned());
    args
}
