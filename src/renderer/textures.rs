use log::{info, warn};

use crate::document::{Document, Image};
use crate::renderer::gpu::{Gpu, GpuHandle};

/// Sampler name of each texture unit. Texture `i` of the asset goes to
/// unit `i`; the last slot is only used with displacement mapping enabled.
pub const TEXTURE_SLOTS: [&str; 4] = ["nor_tex", "diff_tex", "arm_tex", "disp_tex"];
pub const DISPLACEMENT_SLOT: usize = 3;

/// Texel sampled by a slot the asset has no texture for: a flat normal,
/// white albedo, full occlusion with rough non-metal, and no displacement.
const NEUTRAL_TEXELS: [[u8; 4]; 4] = [
    [128, 128, 255, 255],
    [255, 255, 255, 255],
    [255, 255, 0, 255],
    [0, 0, 0, 255],
];

/// A 1x1 image holding the neutral texel of `slot`.
pub fn neutral_image(slot: usize) -> Image {
    Image {
        name: format!("neutral {}", TEXTURE_SLOTS[slot]),
        width: 1,
        height: 1,
        pixels: NEUTRAL_TEXELS[slot].to_vec(),
    }
}

/// The uploaded textures of a document, one entry per glTF texture, plus
/// the neutral stand-ins for active slots the document leaves empty.
#[derive(Debug, Default)]
pub struct Textures {
    handles: Vec<Option<GpuHandle>>,
    /// What each active slot samples, in texture unit order.
    bound: Vec<GpuHandle>,
    neutral: Vec<GpuHandle>,
}

impl Textures {
    pub fn upload(gpu: &mut impl Gpu, document: &Document, displacement: bool) -> Textures {
        let handles = document
            .textures
            .iter()
            .enumerate()
            .map(|(i, texture)| match texture.source {
                Some(image) => Some(gpu.create_texture(&document.images[image])),
                None => {
                    warn!("texture {i} has no source image");
                    None
                }
            })
            .collect::<Vec<_>>();

        let mut bound = Vec::new();
        let mut neutral = Vec::new();
        for (slot, name) in TEXTURE_SLOTS
            .iter()
            .enumerate()
            .take(Textures::slot_count(displacement))
        {
            match handles.get(slot).copied().flatten() {
                Some(handle) => bound.push(handle),
                None => {
                    warn!("no texture for slot {slot} ({name}), using a neutral texel");
                    let handle = gpu.create_texture(&neutral_image(slot));
                    neutral.push(handle);
                    bound.push(handle);
                }
            }
        }
        info!(
            "Uploaded {} textures, {} neutral",
            handles.iter().flatten().count(),
            neutral.len()
        );
        Textures {
            handles,
            bound,
            neutral,
        }
    }

    pub fn slot_count(displacement: bool) -> usize {
        if displacement {
            DISPLACEMENT_SLOT + 1
        } else {
            DISPLACEMENT_SLOT
        }
    }

    /// Number of glTF textures, uploaded or not.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Handle of glTF texture `index`, if it had an image.
    pub fn get(&self, index: usize) -> Option<GpuHandle> {
        self.handles.get(index).copied().flatten()
    }

    /// Binds every active slot to its texture unit.
    pub fn bind(&self, gpu: &mut impl Gpu) {
        for (unit, &handle) in self.bound.iter().enumerate() {
            gpu.bind_texture(unit as u32, handle);
        }
    }

    pub fn release(&mut self, gpu: &mut impl Gpu) {
        for handle in self.handles.drain(..).flatten().chain(self.neutral.drain(..)) {
            gpu.delete_texture(handle);
        }
        self.bound.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::triangle;
    use crate::document::Texture;
    use crate::renderer::gpu::recording::{GpuCall, RecordingGpu};

    fn with_textures(count: usize) -> Document {
        let mut document = triangle();
        document.images.push(Image {
            name: "checker".to_string(),
            width: 1,
            height: 1,
            pixels: vec![255; 4],
        });
        for _ in 0..count {
            document.textures.push(Texture { source: Some(0) });
        }
        document
    }

    fn bindings(gpu: &RecordingGpu) -> Vec<(u32, GpuHandle)> {
        gpu.calls
            .iter()
            .filter_map(|call| match call {
                GpuCall::BindTexture(unit, handle) => Some((*unit, *handle)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn binds_three_slots_without_displacement() {
        let document = with_textures(4);
        let mut gpu = RecordingGpu::default();
        let textures = Textures::upload(&mut gpu, &document, false);
        assert_eq!(textures.len(), 4);
        textures.bind(&mut gpu);
        assert_eq!(bindings(&gpu), vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn displacement_enables_the_fourth_slot() {
        let document = with_textures(4);
        let mut gpu = RecordingGpu::default();
        let textures = Textures::upload(&mut gpu, &document, true);
        textures.bind(&mut gpu);
        assert_eq!(bindings(&gpu), vec![(0, 1), (1, 2), (2, 3), (3, 4)]);
    }

    #[test]
    fn missing_textures_fall_back_to_neutral_texels() {
        let mut document = with_textures(1);
        document.textures.push(Texture { source: None });
        let mut gpu = RecordingGpu::default();
        let textures = Textures::upload(&mut gpu, &document, true);
        assert_eq!(textures.get(0), Some(1));
        assert_eq!(textures.get(1), None);
        assert_eq!(textures.get(7), None);
        // Slots 1..4 each get their own 1x1 stand-in.
        assert_eq!(gpu.live_textures.len(), 4);
        textures.bind(&mut gpu);
        assert_eq!(bindings(&gpu), vec![(0, 1), (1, 2), (2, 3), (3, 4)]);
    }

    #[test]
    fn untextured_models_render_white_and_flat() {
        let mut gpu = RecordingGpu::default();
        let textures = Textures::upload(&mut gpu, &triangle(), false);
        assert!(textures.is_empty());
        textures.bind(&mut gpu);
        assert_eq!(bindings(&gpu).len(), 3);

        assert_eq!(neutral_image(0).pixels, vec![128, 128, 255, 255]);
        assert_eq!(neutral_image(1).pixels, vec![255; 4]);
        let arm = neutral_image(2);
        assert_eq!((arm.width, arm.height), (1, 1));
        assert_eq!(arm.pixels[..3], [255, 255, 0]);
        assert_eq!(neutral_image(DISPLACEMENT_SLOT).pixels[0], 0);
    }

    #[test]
    fn release_deletes_every_texture() {
        let document = with_textures(2);
        let mut gpu = RecordingGpu::default();
        let mut textures = Textures::upload(&mut gpu, &document, false);
        assert_eq!(gpu.live_textures.len(), 3);
        textures.release(&mut gpu);
        assert!(gpu.live_textures.is_empty());
        assert!(textures.is_empty());
    }
}
