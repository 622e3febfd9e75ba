//! Click-based mask refinement controller
//!
//! The first click after anchoring fixes the image; each further click is
//! appended and the whole click list is sent to the network. Results are
//! kept as a history so clicks can be undone.

use std::sync::Arc;

use anyhow::{bail, Result};
use ndarray::{arr1, s, Array2, Array3, ArrayD, Axis, Ix3};
use serde::Deserialize;
use tracing::debug;

use crate::dispatch::{MethodTable, NoArgs};

use super::model::{first_output, sigmoid, Model};
use super::tensor::{expect_rank, Tensor};

/// Probability above which a pixel belongs to the mask
const MASK_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Click {
    pub x: usize,
    pub y: usize,
    pub is_positive: bool,
}

pub struct ClickController {
    network: Arc<dyn Model>,
    anchored: bool,
    image: Option<Array3<f32>>,
    clicks: Vec<Click>,
    probs_history: Vec<Array2<f32>>,
}

impl ClickController {
    pub fn new(network: Arc<dyn Model>) -> Self {
        Self {
            network,
            anchored: false,
            image: None,
            clicks: Vec::new(),
            probs_history: Vec::new(),
        }
    }

    pub fn device(&self) -> &str {
        self.network.device()
    }

    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    pub fn clicks(&self) -> &[Click] {
        &self.clicks
    }

    /// Make the next interaction start over on a new image
    pub fn unanchor(&mut self) {
        self.anchored = false;
    }

    /// Add a click and return the refined binary mask `[H, W]`
    pub fn interact(&mut self, image: ArrayD<f32>, x: usize, y: usize, is_positive: bool) -> Result<Array2<f32>> {
        if !self.anchored {
            let dims = expect_rank("image", &image, 3)?;
            if dims[0] != 3 {
                bail!("`image` must have 3 channels, got shape {:?}", dims);
            }
            self.image = Some(image.into_dimensionality::<Ix3>()?);
            self.clicks.clear();
            self.probs_history.clear();
            self.anchored = true;
            debug!("Click controller anchored to a new image");
        }

        let Some(image) = self.image.as_ref() else {
            bail!("no image is anchored");
        };
        let (_, h, w) = image.dim();
        if x >= w || y >= h {
            bail!("click ({}, {}) is outside the {}x{} image", x, y, w, h);
        }

        self.clicks.push(Click { x, y, is_positive });
        let prob = match self.predict(image, h, w) {
            Ok(prob) => prob,
            Err(e) => {
                self.clicks.pop();
                return Err(e);
            }
        };

        let mask = binarize(&prob);
        self.probs_history.push(prob);
        Ok(mask)
    }

    /// Drop the last click, returning the previous mask if one remains
    pub fn undo(&mut self) -> Option<Array2<f32>> {
        if self.probs_history.pop().is_some() {
            self.clicks.pop();
        }
        self.probs_history.last().map(binarize)
    }

    fn predict(&self, image: &Array3<f32>, h: usize, w: usize) -> Result<Array2<f32>> {
        let input = image.clone().insert_axis(Axis(0)).into_dyn();
        let points = encode_points(&self.clicks).into_dyn();

        let logits = first_output(self.network.forward(&[("image", &input), ("points", &points)])?)?;
        if logits.len() != h * w {
            bail!("network output shape {:?} does not match {}x{}", logits.shape(), h, w);
        }
        let prob: Vec<f32> = logits.iter().map(|&v| sigmoid(v)).collect();
        Ok(Array2::from_shape_vec((h, w), prob)?)
    }
}

fn binarize(prob: &Array2<f32>) -> Array2<f32> {
    prob.mapv(|p| if p > MASK_THRESHOLD { 1.0 } else { 0.0 })
}

/// Encode clicks as `[1, 2N, 3]` rows of `(y, x, order)`: positive clicks in
/// the first half, negative in the second, unused rows filled with -1.
fn encode_points(clicks: &[Click]) -> Array3<f32> {
    let n = clicks
        .iter()
        .filter(|c| c.is_positive)
        .count()
        .max(clicks.iter().filter(|c| !c.is_positive).count())
        .max(1);

    let mut points = Array3::<f32>::from_elem((1, 2 * n, 3), -1.0);
    let (mut positive, mut negative) = (0, n);
    for (order, click) in clicks.iter().enumerate() {
        let row = if click.is_positive {
            positive += 1;
            positive - 1
        } else {
            negative += 1;
            negative - 1
        };
        points
            .slice_mut(s![0, row, ..])
            .assign(&arr1(&[click.y as f32, click.x as f32, order as f32]));
    }
    points
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InteractParams {
    image: Tensor,
    x: usize,
    y: usize,
    is_positive: bool,
}

/// Methods exposed on the click endpoint
pub fn methods() -> MethodTable<ClickController> {
    MethodTable::new()
        .method("unanchor", |ctrl: &mut ClickController, _: NoArgs| {
            ctrl.unanchor();
            Ok(())
        })
        .method("interact", |ctrl: &mut ClickController, p: InteractParams| {
            let mask = ctrl.interact(p.image.into_inner(), p.x, p.y, p.is_positive)?;
            Ok(Tensor(mask.into_dyn()))
        })
        .method("undo", |ctrl: &mut ClickController, _: NoArgs| {
            Ok(ctrl.undo().map(|mask| Tensor(mask.into_dyn())))
        })
}
