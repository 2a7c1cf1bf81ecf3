use std::sync::Arc;

use bevy::math::UVec2;
use image::RgbaImage;

use super::types::TileError;
use crate::canvas::{CanvasProvider, Snapshot};
use crate::multitasking::{constant, lazy, BoxedMicroTask, MicroTaskExt};
use crate::resources::constants::TILE_SIZE;

fn decode(bytes: &[u8]) -> Result<RgbaImage, TileError> {
    let image = image::load_from_memory(bytes).map_err(|err| TileError::Decode(err.to_string()))?;
    Ok(image.to_rgba8())
}

/// Decodes fetched image bytes, then draws them onto a tile canvas.
///
/// Takes two steps: one to decode and one to draw and snapshot.
pub fn raster_task(bytes: Vec<u8>, provider: Arc<dyn CanvasProvider>) -> BoxedMicroTask<Result<Snapshot, TileError>> {
    lazy(move || constant(decode(&bytes)))
        .flat_map(move |decoded| {
            lazy(move || {
                constant(decoded.map(|image| {
                    let mut canvas = provider.create_canvas(UVec2::splat(TILE_SIZE));
                    let size = canvas.size().as_dvec2();
                    canvas.context2d().draw_image(&image, 0.0, 0.0, size.x, size.y);
                    canvas.take_snapshot()
                }))
            })
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::recording::{DrawCommand, RecordingCanvasProvider};
    use crate::multitasking::MicroTask;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png() -> Vec<u8> {
        let image = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    fn run(task: &mut BoxedMicroTask<Result<Snapshot, TileError>>) -> (usize, Result<Snapshot, TileError>) {
        let mut steps = 0;
        while task.alive() {
            task.resume();
            steps += 1;
        }
        (steps, task.take_result().unwrap())
    }

    #[test]
    fn test_image_is_scaled_onto_tile() {
        let provider = Arc::new(RecordingCanvasProvider::default());
        let mut task = raster_task(png(), provider.clone());

        let (steps, result) = run(&mut task);
        assert_eq!(steps, 2);
        assert_eq!(result.unwrap().size(), UVec2::splat(TILE_SIZE));
        assert_eq!(
            provider.log.lock().as_slice(),
            &[DrawCommand::DrawImage { width: 256.0, height: 256.0 }]
        );
    }

    #[test]
    fn test_undecodable_bytes_become_decode_error() {
        let provider = Arc::new(RecordingCanvasProvider::default());
        let mut task = raster_task(b"<html>rate limited</html>".to_vec(), provider.clone());
        let (_, result) = run(&mut task);
        assert!(matches!(result, Err(TileError::Decode(_))));
        assert!(provider.log.lock().is_empty());
    }
}
