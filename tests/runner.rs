use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use media_tasks_lib::core::{
    BackgroundSettings, CompressSettings, ConvertSettings, ResampleFilter, ResizeSettings,
};
use media_tasks_lib::utils::ImageFormat;
use media_tasks_lib::{
    EngineConfig, ErrorKind, EventPayload, JobHandle, JobResult, JobStatus, MediaJob, Segmenter,
    TaskResult, TaskRunner, ToolKind,
};

fn config(max_jobs: usize) -> EngineConfig {
    EngineConfig {
        max_concurrent_jobs: max_jobs,
        progress_interval_ms: 0,
        ..EngineConfig::default()
    }
}

fn gradient(w: u32, h: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| {
        Rgb([(x * 255 / w.max(1)) as u8, (y * 255 / h.max(1)) as u8, ((x + y) % 256) as u8])
    })
}

fn write_fixture(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
    let path = dir.join(name);
    gradient(w, h).save(&path).unwrap();
    path
}

/// Collects every event and checks the stream shape on the way.
async fn drain(mut handle: JobHandle) -> (Vec<u8>, JobResult) {
    let mut percents = Vec::new();
    let mut terminals = 0;
    while let Some(event) = handle.recv().await {
        match event.payload {
            EventPayload::Progress { percent } => {
                assert_eq!(terminals, 0, "progress after terminal event");
                percents.push(percent);
            }
            _ => terminals += 1,
        }
    }
    assert_eq!(terminals, 1, "exactly one terminal event");
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "non-decreasing: {percents:?}");
    (percents, handle.wait().await)
}

fn resize(width: u32) -> ToolKind {
    ToolKind::Resize(ResizeSettings {
        width: Some(width),
        height: None,
        maintain_aspect: true,
        filter: ResampleFilter::Lanczos,
    })
}

fn convert(to: ImageFormat) -> ToolKind {
    ToolKind::Convert(ConvertSettings { target_format: to, quality: None })
}

#[tokio::test]
async fn resize_keeps_aspect_and_reports_progress() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), "wide.png", 1000, 500);
    let output = dir.path().join("small.png");

    let runner = TaskRunner::new(config(2)).unwrap();
    let handle = runner.submit(MediaJob::single(resize(400), &input, &output)).unwrap();
    let (percents, result) = drain(handle).await;

    assert_eq!(result.status, JobStatus::Success);
    assert_eq!(result.output_path.as_deref(), Some(output.as_path()));
    assert!(!percents.is_empty());
    let resized = image::open(&output).unwrap();
    assert_eq!((resized.width(), resized.height()), (400, 200));
}

#[tokio::test]
async fn lossless_round_trip_preserves_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), "src.png", 37, 23);
    let bmp = dir.path().join("mid.bmp");
    let back = dir.path().join("back.png");

    let runner = TaskRunner::new(config(2)).unwrap();
    let first = runner.submit(MediaJob::single(convert(ImageFormat::BMP), &input, &bmp)).unwrap();
    assert!(first.wait().await.is_success());
    let second = runner.submit(MediaJob::single(convert(ImageFormat::PNG), &bmp, &back)).unwrap();
    assert!(second.wait().await.is_success());

    let original = image::open(&input).unwrap().to_rgb8();
    let restored = image::open(&back).unwrap().to_rgb8();
    assert_eq!(original, restored);
}

#[tokio::test]
async fn lossy_round_trip_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), "src.png", 64, 64);
    let jpeg = dir.path().join("mid.jpg");
    let back = dir.path().join("back.png");

    let runner = TaskRunner::new(config(2)).unwrap();
    let first = runner.submit(MediaJob::single(convert(ImageFormat::JPEG), &input, &jpeg)).unwrap();
    assert!(first.wait().await.is_success());
    let second = runner.submit(MediaJob::single(convert(ImageFormat::PNG), &jpeg, &back)).unwrap();
    assert!(second.wait().await.is_success());
    assert_eq!(image::open(&back).unwrap().width(), 64);
}

#[tokio::test]
async fn same_format_convert_copies_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), "a.png", 10, 10);
    let output = dir.path().join("b.png");

    let runner = TaskRunner::new(config(1)).unwrap();
    let result = runner
        .submit(MediaJob::single(convert(ImageFormat::PNG), &input, &output))
        .unwrap()
        .wait()
        .await;
    assert!(result.is_success());
    assert_eq!(std::fs::read(&input).unwrap(), std::fs::read(&output).unwrap());
}

#[tokio::test]
async fn compress_is_size_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let runner = TaskRunner::new(config(2)).unwrap();
    let compress = ToolKind::Compress(CompressSettings { quality: 80, size_tolerance_percent: 1.0 });

    // PNG re-optimisation is deterministic for identical pixels
    let png = write_fixture(dir.path(), "a.png", 96, 64);
    let once = dir.path().join("once.png");
    let twice = dir.path().join("twice.png");
    assert!(runner.submit(MediaJob::single(compress.clone(), &png, &once)).unwrap().wait().await.is_success());
    assert!(runner.submit(MediaJob::single(compress.clone(), &once, &twice)).unwrap().wait().await.is_success());
    assert_eq!(std::fs::metadata(&once).unwrap().len(), std::fs::metadata(&twice).unwrap().len());

    let jpeg = dir.path().join("a.jpg");
    DynamicImage::ImageRgb8(gradient(128, 128)).save(&jpeg).unwrap();
    let once = dir.path().join("once.jpg");
    let twice = dir.path().join("twice.jpg");
    assert!(runner.submit(MediaJob::single(compress.clone(), &jpeg, &once)).unwrap().wait().await.is_success());
    let result = runner.submit(MediaJob::single(compress, &once, &twice)).unwrap().wait().await;
    let report = result.size_report.unwrap();
    let drift = (report.output_size as f64 - report.original_size as f64).abs() / report.original_size as f64;
    assert!(drift < 0.10, "second pass drifted {:.1}%", drift * 100.0);
}

#[tokio::test]
async fn unwritable_destination_is_io_error_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), "a.png", 8, 8);
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"regular file").unwrap();
    let output = blocker.join("out.png");

    let runner = TaskRunner::new(config(1)).unwrap();
    let (_, result) = drain(runner.submit(MediaJob::single(resize(4), &input, &output)).unwrap()).await;
    assert_eq!(result.status, JobStatus::Failed);
    assert_eq!(result.error_kind, Some(ErrorKind::IoError));
    assert!(!output.exists());
}

#[tokio::test]
async fn corrupt_input_is_invalid_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.png");
    std::fs::write(&input, b"definitely not a png").unwrap();
    let output = dir.path().join("out.png");

    let runner = TaskRunner::new(config(1)).unwrap();
    let result = runner.submit(MediaJob::single(resize(4), &input, &output)).unwrap().wait().await;
    assert_eq!(result.error_kind, Some(ErrorKind::InvalidInput));
    assert!(!output.exists());
    // Only the input is left in the directory, no staging files
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn invalid_options_are_rejected_before_any_io() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), "a.png", 8, 8);
    let runner = TaskRunner::new(config(1)).unwrap();

    let err = runner.submit(MediaJob::single(resize(0), &input, dir.path().join("b.png"))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOptions);
    let err = runner.submit(MediaJob::single(resize(4), &input, &input)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOptions);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

/// Keeps pixels left of the middle
struct LeftHalf;

impl Segmenter for LeftHalf {
    fn segment(&self, image: &DynamicImage) -> TaskResult<RgbaImage> {
        let w = image.width();
        Ok(RgbaImage::from_fn(w, image.height(), |x, _| {
            image::Rgba([0, 0, 0, if x < w / 2 { 255 } else { 0 }])
        }))
    }
}

struct Panicking;

impl Segmenter for Panicking {
    fn segment(&self, _image: &DynamicImage) -> TaskResult<RgbaImage> {
        panic!("segmentation model exploded");
    }
}

#[tokio::test]
async fn background_removal_writes_transparency() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), "photo.jpg", 20, 10);

    let runner = TaskRunner::new(config(1)).unwrap().with_segmenter(Arc::new(LeftHalf));
    let job = MediaJob::batch(
        ToolKind::BackgroundRemove(BackgroundSettings::default()),
        vec![input],
        dir.path().join("out"),
    );
    let mut handles = runner.submit_batch(job).unwrap();
    let result = handles.remove(0).wait().await;

    let output = dir.path().join("out").join("photo_nobg.png");
    assert_eq!(result.output_path.as_deref(), Some(output.as_path()));
    let cut = image::open(&output).unwrap().to_rgba8();
    assert_eq!(cut.get_pixel(2, 5)[3], 255);
    assert_eq!(cut.get_pixel(17, 5)[3], 0);
}

#[tokio::test]
async fn panicking_worker_fails_only_its_own_job() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), "a.png", 8, 8);

    let runner = TaskRunner::new(config(1)).unwrap().with_segmenter(Arc::new(Panicking));
    let crashed = runner
        .submit(MediaJob::single(
            ToolKind::BackgroundRemove(BackgroundSettings::default()),
            &input,
            dir.path().join("cut.png"),
        ))
        .unwrap()
        .wait()
        .await;
    assert_eq!(crashed.error_kind, Some(ErrorKind::Internal));
    assert!(!dir.path().join("cut.png").exists());

    let next = runner
        .submit(MediaJob::single(resize(4), &input, dir.path().join("small.png")))
        .unwrap()
        .wait()
        .await;
    assert!(next.is_success());
    assert_eq!(runner.active_jobs(), 0);
}

/// Blocks until released, recording the width of each image it sees
struct Gate {
    release: Mutex<std::sync::mpsc::Receiver<()>>,
    seen: Mutex<Vec<u32>>,
}

impl Segmenter for Gate {
    fn segment(&self, image: &DynamicImage) -> TaskResult<RgbaImage> {
        self.seen.lock().unwrap().push(image.width());
        let _ = self.release.lock().unwrap().recv_timeout(Duration::from_secs(10));
        Ok(image.to_rgba8())
    }
}

fn gate() -> (Arc<Gate>, std::sync::mpsc::Sender<()>) {
    let (tx, rx) = std::sync::mpsc::channel();
    let gate = Arc::new(Gate { release: Mutex::new(rx), seen: Mutex::new(Vec::new()) });
    (gate, tx)
}

async fn wait_for_active(runner: &TaskRunner, n: usize) {
    for _ in 0..200 {
        if runner.active_jobs() == n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("never reached {n} active jobs");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn queued_job_cancelled_before_start_never_runs() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_fixture(dir.path(), "first.png", 11, 4);
    let second = write_fixture(dir.path(), "second.png", 12, 4);
    let (gate, release) = gate();

    let runner = TaskRunner::new(config(1)).unwrap().with_segmenter(gate.clone());
    let remove = ToolKind::BackgroundRemove(BackgroundSettings::default());
    let running = runner
        .submit(MediaJob::single(remove.clone(), &first, dir.path().join("first_out.png")))
        .unwrap();
    let queued = runner
        .submit(MediaJob::single(remove, &second, dir.path().join("second_out.png")))
        .unwrap();

    wait_for_active(&runner, 1).await;
    queued.cancel();
    queued.cancel();
    let (percents, cancelled) = drain(queued).await;
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert!(percents.is_empty());

    release.send(()).unwrap();
    let (_, done) = drain(running).await;
    assert!(done.is_success());
    assert_eq!(*gate.seen.lock().unwrap(), vec![11]);
    assert!(!dir.path().join("second_out.png").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn jobs_start_in_submission_order() {
    let dir = tempfile::tempdir().unwrap();
    let (gate, release) = gate();
    let runner = TaskRunner::new(config(1)).unwrap().with_segmenter(gate.clone());

    let inputs: Vec<PathBuf> = (1..=4)
        .map(|i| write_fixture(dir.path(), &format!("img{i}.png"), i * 10, 4))
        .collect();
    let handles = runner
        .submit_batch(MediaJob::batch(
            ToolKind::BackgroundRemove(BackgroundSettings::default()),
            inputs,
            dir.path().join("out"),
        ))
        .unwrap();
    for _ in 0..4 {
        release.send(()).unwrap();
    }
    for handle in handles {
        assert!(handle.wait().await.is_success());
    }
    assert_eq!(*gate.seen.lock().unwrap(), vec![10, 20, 30, 40]);
}

#[tokio::test]
async fn cancelling_a_finished_job_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), "a.png", 8, 8);
    let output = dir.path().join("b.png");

    let runner = TaskRunner::new(config(1)).unwrap();
    let mut handle = runner.submit(MediaJob::single(resize(4), &input, &output)).unwrap();
    while handle.recv().await.is_some() {}
    handle.cancel();
    assert_eq!(handle.result().map(|r| r.status), Some(JobStatus::Success));
    assert!(output.exists());
}

#[tokio::test]
async fn grey_alpha_png_converts_to_tiff() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("mask.png");
    image::GrayAlphaImage::from_fn(4, 4, |x, y| image::LumaA([(x * 60) as u8, (y * 80) as u8]))
        .save(&input)
        .unwrap();
    let output = dir.path().join("mask.tiff");

    let runner = TaskRunner::new(config(1)).unwrap();
    let result = runner
        .submit(MediaJob::single(convert(ImageFormat::TIFF), &input, &output))
        .unwrap()
        .wait()
        .await;
    assert_eq!(result.status, JobStatus::Success, "{result:?}");
    let written = image::open(&output).unwrap();
    assert_eq!((written.width(), written.height()), (4, 4));
    assert!(written.color().has_alpha());
}

/// Splices an EXIF block carrying only an Orientation tag right after SOI
fn with_orientation(jpeg: &[u8], orientation: u8) -> Vec<u8> {
    let mut app1 = vec![0xFF, 0xE1, 0x00, 0x22];
    app1.extend_from_slice(b"Exif\0\0");
    app1.extend_from_slice(&[b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08]);
    app1.extend_from_slice(&[0x00, 0x01]);
    app1.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    app1.extend_from_slice(&[0x00, orientation, 0x00, 0x00]);
    app1.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&app1);
    out.extend_from_slice(&jpeg[2..]);
    out
}

#[tokio::test]
async fn convert_bakes_exif_orientation_into_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let mut plain = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(gradient(4, 2))
        .write_to(&mut plain, image::ImageFormat::Jpeg)
        .unwrap();
    let input = dir.path().join("portrait.jpg");
    std::fs::write(&input, with_orientation(plain.get_ref(), 6)).unwrap();
    let output = dir.path().join("portrait.png");

    let runner = TaskRunner::new(config(1)).unwrap();
    let result = runner
        .submit(MediaJob::single(convert(ImageFormat::PNG), &input, &output))
        .unwrap()
        .wait()
        .await;
    assert!(result.is_success(), "{result:?}");
    let upright = image::open(&output).unwrap();
    assert_eq!((upright.width(), upright.height()), (2, 4));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn running_job_cancel_discards_staged_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), "busy.png", 9, 5);
    let out_dir = dir.path().join("out");
    let output = out_dir.join("busy_nobg.png");
    let (gate, release) = gate();

    let runner = TaskRunner::new(config(1)).unwrap().with_segmenter(gate.clone());
    let handle = runner
        .submit(MediaJob::single(
            ToolKind::BackgroundRemove(BackgroundSettings::default()),
            &input,
            &output,
        ))
        .unwrap();

    wait_for_active(&runner, 1).await;
    for _ in 0..200 {
        if !gate.seen.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(*gate.seen.lock().unwrap(), vec![9]);

    handle.cancel();
    release.send(()).unwrap();
    let (_, result) = drain(handle).await;
    assert_eq!(result.status, JobStatus::Cancelled);
    assert!(!output.exists());
    if out_dir.exists() {
        assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 0);
    }
    assert_eq!(runner.active_jobs(), 0);
}
