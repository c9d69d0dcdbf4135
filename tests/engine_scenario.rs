use fire_watch::core_modules::frame::NormalizedTensor;
use fire_watch::core_modules::pixel::pixel::Pixel;
use fire_watch::render::{CollectingRenderer, OverlayRenderer};
use fire_watch::source::{ImageDirectorySource, MemorySource};
use fire_watch::{
    ClassifierError, EngineError, FirePipeline, FnClassifier, Frame, PipelineConfig, StopReason,
    stop_channel,
};

fn flames() -> Frame {
    Frame::filled(64, 48, Pixel::new(200, 69, 43))
}

fn night() -> Frame {
    Frame::filled(64, 48, Pixel::new(5, 5, 20))
}

fn confident() -> FnClassifier<impl FnMut(&NormalizedTensor) -> Result<f32, ClassifierError>> {
    FnClassifier::new(|_: &NormalizedTensor| Ok(0.9))
}

#[test]
fn alert_rises_on_the_fifth_fire_frame_and_clears_after_five_quiet_ones() {
    let frames = std::iter::repeat_with(flames)
        .take(5)
        .chain(std::iter::repeat_with(night).take(5));
    let mut pipeline = FirePipeline::new(PipelineConfig::default(), confident()).unwrap();
    let mut renderer = CollectingRenderer::default();
    let (_stop_tx, stop_rx) = stop_channel();

    let summary = pipeline
        .run(&mut MemorySource::new(frames), &mut renderer, &stop_rx)
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::EndOfStream);
    assert_eq!(
        renderer.alerts(),
        vec![false, false, false, false, true, false, false, false, false, false]
    );
    let counters: Vec<u32> = renderer.results.iter().map(|r| r.hysteresis_counter).collect();
    assert_eq!(counters, vec![1, 2, 3, 4, 5, 4, 3, 2, 1, 0]);
}

#[test]
fn out_of_range_score_aborts_the_run_under_the_default_policy() {
    let classifier = FnClassifier::new(|_: &NormalizedTensor| Ok(1.7));
    let mut pipeline = FirePipeline::new(PipelineConfig::default(), classifier).unwrap();
    let mut renderer = CollectingRenderer::default();
    let (_stop_tx, stop_rx) = stop_channel();

    let error = pipeline
        .run(&mut MemorySource::new(vec![flames()]), &mut renderer, &stop_rx)
        .unwrap_err();

    assert!(matches!(
        error,
        EngineError::Classifier {
            frame_index: 0,
            source: ClassifierError::OutOfRange(_)
        }
    ));
    assert!(renderer.results.is_empty());
}

#[test]
fn directory_run_writes_annotated_frames() {
    let frames_dir = tempfile::tempdir().unwrap();
    for i in 0..6 {
        let path = frames_dir.path().join(format!("{i:03}.png"));
        flames().image().save(&path).unwrap();
    }
    let out_dir = tempfile::tempdir().unwrap();

    let mut pipeline = FirePipeline::new(PipelineConfig::default(), confident()).unwrap();
    let mut source = ImageDirectorySource::open(frames_dir.path()).unwrap();
    let mut renderer = (
        CollectingRenderer::default(),
        OverlayRenderer::new(out_dir.path()).unwrap(),
    );
    let (_stop_tx, stop_rx) = stop_channel();

    let summary = pipeline.run(&mut source, &mut renderer, &stop_rx).unwrap();

    assert_eq!(summary.frames_processed, 6);
    assert_eq!(summary.alert_frames, 2);
    assert!(out_dir.path().join("frame_000005.png").is_file());

    // The last frame is alerting, so its overlay carries the red grid.
    let annotated = image::open(out_dir.path().join("frame_000005.png")).unwrap().to_rgb8();
    assert_eq!(annotated.get_pixel(21, 30), &image::Rgb([255, 0, 0]));
}
