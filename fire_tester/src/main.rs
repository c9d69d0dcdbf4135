use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;
use opencv::{
    core::{self, Mat, Point, Scalar},
    highgui, imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use fire_watch::core_modules::onnx_classifier::OnnxClassifier;
use fire_watch::{
    FirePipeline, Flow, Frame, FrameResult, FrameSource, PipelineConfig, RenderError, Renderer,
    SourceError, stop_channel,
};

const WINDOW_NAME: &str = "Fire Detection";
const KEY_QUIT: i32 = 'q' as i32;

#[derive(Debug, Parser)]
#[command(name = "fire_tester", about = "Live fire detection on a camera feed")]
struct Args {
    #[arg(short, long, default_value = "fire_detection_model.onnx")]
    model: PathBuf,

    #[arg(long, default_value_t = 0)]
    camera: i32,

    #[arg(long, default_value_t = 640)]
    width: u32,

    #[arg(long, default_value_t = 480)]
    height: u32,

    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Reads BGR frames from a camera and keeps the latest one for display.
struct CameraSource {
    capture: VideoCapture,
    last: Rc<RefCell<Mat>>,
}

impl CameraSource {
    fn open(index: i32, width: u32, height: u32) -> opencv::Result<Self> {
        let mut capture = VideoCapture::new(index, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(opencv::Error::new(core::StsError, format!("camera {index} could not be opened")));
        }
        capture.set(videoio::CAP_PROP_FRAME_WIDTH, width as f64)?;
        capture.set(videoio::CAP_PROP_FRAME_HEIGHT, height as f64)?;
        Ok(Self {
            capture,
            last: Rc::new(RefCell::new(Mat::default())),
        })
    }

    fn read(&mut self) -> opencv::Result<Option<Frame>> {
        let mut mat = Mat::default();
        if !self.capture.read(&mut mat)? || mat.empty() {
            return Ok(None);
        }
        let frame = Frame::from_bgr(mat.cols() as u32, mat.rows() as u32, mat.data_bytes()?.to_vec());
        *self.last.borrow_mut() = mat;
        Ok(frame)
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        match self.read() {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) => Err(SourceError::Capture("failed to grab frame".into())),
            Err(e) => Err(SourceError::Capture(e.to_string())),
        }
    }
}

const LABEL_RED: [f64; 3] = [0.0, 0.0, 255.0];
const LABEL_GREEN: [f64; 3] = [0.0, 255.0, 0.0];
const SCORE_WHITE: [f64; 3] = [255.0, 255.0, 255.0];
const FPS_CYAN: [f64; 3] = [255.0, 255.0, 0.0];

/// One line of overlay text: content, baseline y, font scale, BGR color.
#[derive(Debug, PartialEq)]
struct TextLine {
    text: String,
    y: i32,
    scale: f64,
    bgr: [f64; 3],
}

/// Label and score on every frame; FPS only on frames that closed a rate window.
fn overlay_text(result: &FrameResult) -> Vec<TextLine> {
    let (label, bgr) = if result.alert {
        ("Fire Detected", LABEL_RED)
    } else {
        ("No Fire", LABEL_GREEN)
    };
    let mut lines = vec![
        TextLine { text: label.into(), y: 30, scale: 1.0, bgr },
        TextLine { text: format!("Score: {:.2}", result.confidence), y: 60, scale: 0.7, bgr: SCORE_WHITE },
    ];
    if let Some(fps) = result.fps {
        lines.push(TextLine { text: format!("FPS: {fps:.1}"), y: 90, scale: 0.7, bgr: FPS_CYAN });
    }
    lines
}

fn scalar([blue, green, red]: [f64; 3]) -> Scalar {
    Scalar::new(blue, green, red, 0.0)
}

/// Draws the overlay text and alert grid on the camera frame and shows it.
struct WindowRenderer {
    last: Rc<RefCell<Mat>>,
}

impl WindowRenderer {
    fn draw(&mut self, result: &FrameResult) -> opencv::Result<Flow> {
        let mut display = self.last.borrow().clone();

        if result.alert {
            draw_grid(&mut display, 3, 3, scalar(LABEL_RED))?;
        }
        for line in overlay_text(result) {
            put_line(&mut display, &line)?;
        }

        highgui::imshow(WINDOW_NAME, &display)?;
        if highgui::wait_key(1)? & 0xFF == KEY_QUIT {
            Ok(Flow::Stop)
        } else {
            Ok(Flow::Continue)
        }
    }
}

impl Renderer for WindowRenderer {
    fn render(&mut self, _frame: &Frame, result: &FrameResult) -> Result<Flow, RenderError> {
        self.draw(result).map_err(|e| RenderError::Display(e.to_string()))
    }
}

fn put_line(image: &mut Mat, line: &TextLine) -> opencv::Result<()> {
    imgproc::put_text(
        image,
        &line.text,
        Point::new(10, line.y),
        imgproc::FONT_HERSHEY_SIMPLEX,
        line.scale,
        scalar(line.bgr),
        2,
        imgproc::LINE_8,
        false,
    )
}

fn draw_grid(image: &mut Mat, columns: i32, rows: i32, color: Scalar) -> opencv::Result<()> {
    let (width, height) = (image.cols(), image.rows());
    for i in 1..columns {
        let x = i * width / columns;
        imgproc::line(image, Point::new(x, 0), Point::new(x, height), color, 2, imgproc::LINE_8, 0)?;
    }
    for i in 1..rows {
        let y = i * height / rows;
        imgproc::line(image, Point::new(0, y), Point::new(width, y), color, 2, imgproc::LINE_8, 0)?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(env_filter)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    let classifier = OnnxClassifier::load(&args.model).context("loading fire classifier")?;
    let mut pipeline = FirePipeline::new(config, classifier)?;

    let mut source = CameraSource::open(args.camera, args.width, args.height).context("opening camera")?;
    let mut renderer = WindowRenderer {
        last: Rc::clone(&source.last),
    };
    highgui::named_window(WINDOW_NAME, highgui::WINDOW_AUTOSIZE)?;
    info!("press 'q' in the window to quit");

    // Ctrl-C is watched on a background runtime; the camera loop stays on this thread.
    let runtime = tokio::runtime::Runtime::new().context("starting signal runtime")?;
    let (stop_tx, stop_rx) = stop_channel();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current frame");
            let _ = stop_tx.send(true);
        }
    });
    let summary = pipeline.run(&mut source, &mut renderer, &stop_rx);
    highgui::destroy_all_windows()?;

    let summary = summary?;
    info!(
        processed = summary.frames_processed,
        alert_frames = summary.alert_frames,
        "camera session finished"
    );
    Ok(())
}
