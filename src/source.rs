// THEORY:
// A frame source is the engine's only input. It hands over frames one at a time and
// must keep "no more frames" distinct from "something broke": `Ok(None)` ends the run
// cleanly, `Err` ends it with an error. The engine never retries a source and never
// skips past a failed read, since a hole in the sequence would bend both the
// hysteresis and the frame-rate readings.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core_modules::frame::Frame;
use crate::error::SourceError;

pub trait FrameSource {
    /// The next frame, `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        (**self).next_frame()
    }
}

/// Frames held in memory, yielded in order.
#[derive(Debug, Default)]
pub struct MemorySource {
    frames: VecDeque<Result<Frame, SourceError>>,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().map(Ok).collect(),
        }
    }

    /// Queues a failure to be returned once the frames before it are consumed.
    pub fn then_fail(mut self, error: SourceError) -> Self {
        self.frames.push_back(Err(error));
        self
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        self.frames.pop_front().transpose()
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// Image files in a directory, decoded lazily in file-name order.
#[derive(Debug)]
pub struct ImageDirectorySource {
    paths: VecDeque<PathBuf>,
}

impl ImageDirectorySource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SourceError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        paths.sort();

        debug!(dir = %dir.as_ref().display(), frames = paths.len(), "opened image directory");
        Ok(Self {
            paths: paths.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageDirectorySource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };
        let image = image::open(&path).map_err(|source| SourceError::Decode {
            path: path.clone(),
            source,
        })?;
        Ok(Some(Frame::new(image.to_rgb8())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::pixel::Pixel;
    use crate::core_modules::utils::image_helper::image_helper::save;

    #[test]
    fn memory_source_yields_frames_then_ends() {
        let mut source = MemorySource::new(vec![
            Frame::filled(2, 2, Pixel::new(1, 1, 1)),
            Frame::filled(2, 2, Pixel::new(2, 2, 2)),
        ]);

        assert_eq!(source.next_frame().unwrap().unwrap().pixels().next(), Some(Pixel::new(1, 1, 1)));
        assert_eq!(source.next_frame().unwrap().unwrap().pixels().next(), Some(Pixel::new(2, 2, 2)));
        assert!(source.next_frame().unwrap().is_none());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn memory_source_reports_queued_failure() {
        let mut source = MemorySource::new(vec![Frame::filled(2, 2, Pixel::default())])
            .then_fail(SourceError::Capture("camera unplugged".into()));

        assert!(source.next_frame().unwrap().is_some());
        assert!(matches!(source.next_frame(), Err(SourceError::Capture(_))));
    }

    #[test]
    fn directory_source_reads_images_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        save(&dir.path().join("b.png"), Frame::filled(4, 4, Pixel::new(0, 0, 255)).image()).unwrap();
        save(&dir.path().join("a.png"), Frame::filled(4, 4, Pixel::new(255, 0, 0)).image()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let mut source = ImageDirectorySource::open(dir.path()).unwrap();
        assert_eq!(source.len(), 2);

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.pixels().next(), Some(Pixel::new(255, 0, 0)));
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.pixels().next(), Some(Pixel::new(0, 0, 255)));
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn directory_source_fails_on_corrupt_image() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.png"), b"definitely not png").unwrap();

        let mut source = ImageDirectorySource::open(dir.path()).unwrap();
        assert!(matches!(source.next_frame(), Err(SourceError::Decode { .. })));
    }
}
