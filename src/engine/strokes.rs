//! Stroke-to-mask controller
//!
//! Turns a scribble map into per-object probabilities. Each object is
//! predicted independently from the image, its previous mask, and positive
//! and negative stroke maps.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ndarray::{s, Array2, Array3, Array4, ArrayD, Ix2, Ix3};
use serde::Deserialize;
use tracing::debug;

use crate::dispatch::MethodTable;

use super::model::{first_output, sigmoid, Model};
use super::tensor::{expect_rank, Tensor};

/// Scribble value that belongs to no object and is never negative evidence
pub const DEFAULT_IGNORE_CLASS: u32 = 255;

pub struct StrokeController {
    network: Option<Arc<dyn Model>>,
    num_objects: usize,
    ignore_class: u32,
}

impl StrokeController {
    /// Create a controller. `network` is `None` when no checkpoint is configured.
    pub fn new(network: Option<Arc<dyn Model>>, num_objects: usize, ignore_class: u32) -> Self {
        Self {
            network,
            num_objects,
            ignore_class,
        }
    }

    pub fn has_network(&self) -> bool {
        self.network.is_some()
    }

    pub fn num_objects(&self) -> usize {
        self.num_objects
    }

    pub fn set_num_objects(&mut self, num_objects: usize) {
        self.num_objects = num_objects;
    }

    /// Predict `[num_objects, H, W]` probabilities.
    ///
    /// `image` is `[3, H, W]`, `prev_mask` and `scr_mask` are `[H, W]` label maps.
    pub fn interact(
        &self,
        image: ArrayD<f32>,
        prev_mask: ArrayD<f32>,
        scr_mask: ArrayD<f32>,
    ) -> Result<Array3<f32>> {
        let network = self
            .network
            .as_ref()
            .context("no stroke-to-mask network is loaded")?;

        let dims = expect_rank("image", &image, 3)?;
        if dims[0] != 3 {
            bail!("`image` must have 3 channels, got shape {:?}", dims);
        }
        let (h, w) = (dims[1], dims[2]);
        for (name, map) in [("prev_mask", &prev_mask), ("scr_mask", &scr_mask)] {
            let map_dims = expect_rank(name, map, 2)?;
            if map_dims != [h, w] {
                bail!("`{}` must have shape [{}, {}], got {:?}", name, h, w, map_dims);
            }
        }

        let image = image.into_dimensionality::<Ix3>()?;
        let prev_mask = prev_mask.into_dimensionality::<Ix2>()?;
        let scr_mask = scr_mask.into_dimensionality::<Ix2>()?;

        let mut out = Array3::<f32>::zeros((self.num_objects, h, w));
        for (index, object) in (1..=self.num_objects as u32).enumerate() {
            let input = self.network_input(&image, &prev_mask, &scr_mask, object).into_dyn();
            let logits = first_output(network.forward(&[("input", &input)])?)?;
            if logits.len() != h * w {
                bail!("network output shape {:?} does not match {}x{}", logits.shape(), h, w);
            }
            for (dst, src) in out
                .slice_mut(s![index, .., ..])
                .iter_mut()
                .zip(logits.iter())
            {
                *dst = sigmoid(*src);
            }
        }
        debug!("Stroke interaction produced {} object masks", self.num_objects);

        Ok(out)
    }

    /// Stack image, previous mask and stroke maps into `[1, 6, H, W]`
    fn network_input(
        &self,
        image: &Array3<f32>,
        prev_mask: &Array2<f32>,
        scr_mask: &Array2<f32>,
        object: u32,
    ) -> Array4<f32> {
        let (_, h, w) = image.dim();
        let is = |v: f32, label: u32| (v.round() as i64 == label as i64) as u8 as f32;

        let mut input = Array4::<f32>::zeros((1, 6, h, w));
        input.slice_mut(s![0, 0..3, .., ..]).assign(image);
        input
            .slice_mut(s![0, 3, .., ..])
            .assign(&prev_mask.mapv(|v| is(v, object)));
        input
            .slice_mut(s![0, 4, .., ..])
            .assign(&scr_mask.mapv(|v| is(v, object)));
        input.slice_mut(s![0, 5, .., ..]).assign(&scr_mask.mapv(|v| {
            let negative = is(v, object) == 0.0 && is(v, self.ignore_class) == 0.0;
            negative as u8 as f32
        }));
        input
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InteractParams {
    image: Tensor,
    prev_mask: Tensor,
    scr_mask: Tensor,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NumObjectsParams {
    num_objects: usize,
}

/// Methods exposed on the stroke endpoint
pub fn methods() -> MethodTable<StrokeController> {
    MethodTable::new()
        .method("interact", |ctrl: &mut StrokeController, p: InteractParams| {
            let prob = ctrl.interact(
                p.image.into_inner(),
                p.prev_mask.into_inner(),
                p.scr_mask.into_inner(),
            )?;
            Ok(Tensor(prob.into_dyn()))
        })
        .method("set_num_objects", |ctrl: &mut StrokeController, p: NumObjectsParams| {
            ctrl.set_num_objects(p.num_objects);
            Ok(())
        })
}
