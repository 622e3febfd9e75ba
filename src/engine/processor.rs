//! Video object segmentation core
//!
//! Tracks objects frame by frame. Frames that carry a user mask, and every
//! `mem_every`-th frame, are committed to a memory bank; later frames are
//! segmented by the network against that memory.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ndarray::{s, Array3, Array4, Array5, ArrayD, Axis, Ix3};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::dispatch::{Attr, Inspect, MethodTable, NoArgs};

use super::model::{first_output, Model};
use super::tensor::{expect_rank, Tensor};

/// Spatial dimensions are padded to a multiple of this before inference
const PAD_DIVISOR: usize = 16;

/// Probabilities are clamped to this margin before converting to log-odds
const PROB_EPS: f32 = 1e-7;

/// Tunable behaviour of the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CoreConfig {
    /// Commit a frame to memory every this many frames
    pub mem_every: i64,
    /// Maximum number of frames kept in memory
    pub max_memory_frames: usize,
    /// Keep the first memory frame when evicting
    pub enable_long_term: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            mem_every: 5,
            max_memory_frames: 10,
            enable_long_term: true,
        }
    }
}

/// The segmentation network and where it was loaded from
pub struct Network {
    model: Arc<dyn Model>,
    checkpoint: PathBuf,
}

impl Network {
    pub fn new(model: Arc<dyn Model>, checkpoint: PathBuf) -> Self {
        Self { model, checkpoint }
    }
}

impl Inspect for Network {
    fn attr(&self, name: &str) -> Option<Attr<'_>> {
        match name {
            "device" => Some(Attr::Value(json!(self.model.device()))),
            "checkpoint" => Some(Attr::Value(json!(self.checkpoint.display().to_string()))),
            _ => None,
        }
    }
}

struct MemoryFrame {
    ti: i64,
    /// Padded image, `[3, H, W]`
    image: Array3<f32>,
    /// Padded object probabilities without background, `[K, H, W]`
    prob: Array3<f32>,
}

/// Frames the network segments against
pub struct MemoryBank {
    frames: Vec<MemoryFrame>,
    capacity: usize,
    pin_first: bool,
}

impl MemoryBank {
    fn new(config: &CoreConfig) -> Self {
        Self {
            frames: Vec::new(),
            capacity: config.max_memory_frames.max(1),
            pin_first: config.enable_long_term,
        }
    }

    fn configure(&mut self, config: &CoreConfig) {
        self.capacity = config.max_memory_frames.max(1);
        self.pin_first = config.enable_long_term;
        while self.frames.len() > self.capacity {
            self.evict();
        }
    }

    fn push(&mut self, frame: MemoryFrame) {
        if self.frames.len() >= self.capacity {
            self.evict();
        }
        self.frames.push(frame);
    }

    fn evict(&mut self) {
        let index = if self.pin_first && self.frames.len() > 1 { 1 } else { 0 };
        let frame = self.frames.remove(index);
        debug!("Evicted memory frame {}", frame.ti);
    }

    fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn spatial_size(&self) -> Option<(usize, usize)> {
        self.frames.first().map(|f| (f.image.dim().1, f.image.dim().2))
    }

    /// Stack memory into `[1, T, 3, H, W]` images and `[1, T, K, H, W]` masks.
    /// Frames recorded before labels were added get zero channels.
    fn stacked(&self, num_objects: usize) -> (Array5<f32>, Array5<f32>) {
        let t = self.frames.len();
        let (h, w) = self.spatial_size().unwrap_or((0, 0));
        let mut images = Array5::<f32>::zeros((1, t, 3, h, w));
        let mut masks = Array5::<f32>::zeros((1, t, num_objects, h, w));

        for (i, frame) in self.frames.iter().enumerate() {
            images.slice_mut(s![0, i, .., .., ..]).assign(&frame.image);
            let k = frame.prob.dim().0.min(num_objects);
            masks
                .slice_mut(s![0, i, ..k, .., ..])
                .assign(&frame.prob.slice(s![..k, .., ..]));
        }

        (images, masks)
    }
}

impl Inspect for MemoryBank {
    fn attr(&self, name: &str) -> Option<Attr<'_>> {
        match name {
            "size" => Some(Attr::Value(json!(self.frames.len()))),
            "frames" => Some(Attr::Value(json!(self
                .frames
                .iter()
                .map(|f| f.ti)
                .collect::<Vec<_>>()))),
            "capacity" => Some(Attr::Value(json!(self.capacity))),
            _ => None,
        }
    }
}

/// Padding applied to the last two axes: (top, bottom, left, right)
#[derive(Debug, Clone, Copy, PartialEq)]
struct Padding(usize, usize, usize, usize);

/// Pad height and width up to a multiple of `divisor`, centring the content
fn pad_divide_by(array: &Array3<f32>, divisor: usize) -> (Array3<f32>, Padding) {
    let (c, h, w) = array.dim();
    let new_h = h.div_ceil(divisor) * divisor;
    let new_w = w.div_ceil(divisor) * divisor;
    let top = (new_h - h) / 2;
    let left = (new_w - w) / 2;
    let pad = Padding(top, new_h - h - top, left, new_w - w - left);

    let mut padded = Array3::<f32>::zeros((c, new_h, new_w));
    padded
        .slice_mut(s![.., top..top + h, left..left + w])
        .assign(array);
    (padded, pad)
}

fn unpad(array: &Array3<f32>, pad: Padding) -> Array3<f32> {
    let (_, h, w) = array.dim();
    let Padding(top, bottom, left, right) = pad;
    array
        .slice(s![.., top..h - bottom, left..w - right])
        .to_owned()
}

/// Add a background channel and renormalize object probabilities so every
/// pixel sums to one.
pub fn aggregate(prob: &Array3<f32>) -> Array3<f32> {
    let (k, h, w) = prob.dim();
    let mut out = Array3::<f32>::zeros((k + 1, h, w));
    let odds = |p: f32| {
        let p = p.clamp(PROB_EPS, 1.0 - PROB_EPS);
        p / (1.0 - p)
    };

    for y in 0..h {
        for x in 0..w {
            let background: f32 = (0..k).map(|i| 1.0 - prob[[i, y, x]]).product();
            out[[0, y, x]] = odds(background);
            for i in 0..k {
                out[[i + 1, y, x]] = odds(prob[[i, y, x]]);
            }
            let total: f32 = (0..=k).map(|c| out[[c, y, x]]).sum();
            for c in 0..=k {
                out[[c, y, x]] /= total;
            }
        }
    }

    out
}

/// Stateful segmentation core
pub struct InferenceCore {
    network: Network,
    config: CoreConfig,
    all_labels: Option<Vec<u32>>,
    curr_ti: i64,
    last_mem_ti: i64,
    memory: MemoryBank,
}

impl InferenceCore {
    pub fn new(network: Network, config: CoreConfig) -> Self {
        let memory = MemoryBank::new(&config);
        Self {
            network,
            config,
            all_labels: None,
            curr_ti: -1,
            last_mem_ti: 0,
            memory,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn curr_ti(&self) -> i64 {
        self.curr_ti
    }

    pub fn memory(&self) -> &MemoryBank {
        &self.memory
    }

    pub fn set_all_labels(&mut self, labels: Vec<u32>) {
        self.all_labels = Some(labels);
    }

    /// Forget all frames and restart the frame counter
    pub fn clear_memory(&mut self) {
        self.curr_ti = -1;
        self.last_mem_ti = 0;
        self.memory.clear();
    }

    /// Overlay the given fields onto the current configuration
    pub fn update_config(&mut self, changes: serde_json::Map<String, Value>) -> Result<()> {
        let mut merged = match serde_json::to_value(&self.config)? {
            Value::Object(map) => map,
            _ => bail!("configuration is not an object"),
        };
        merged.extend(changes);

        let config: CoreConfig =
            serde_json::from_value(Value::Object(merged)).context("invalid configuration")?;
        self.memory.configure(&config);
        self.config = config;
        Ok(())
    }

    /// Process the next frame.
    ///
    /// `image` is `[3, H, W]`; `mask`, when given, is `[K, H, W]` for the
    /// `K` labels set with [`set_all_labels`](Self::set_all_labels). Returns
    /// probabilities `[K + 1, H, W]` with background first.
    pub fn step(
        &mut self,
        image: ArrayD<f32>,
        mask: Option<ArrayD<f32>>,
        valid_labels: Option<Vec<u32>>,
        end: bool,
    ) -> Result<Array3<f32>> {
        let num_objects = self
            .all_labels
            .as_ref()
            .map(Vec::len)
            .context("labels are not set; call set_all_labels first")?;

        let dims = expect_rank("image", &image, 3)?;
        if dims[0] != 3 {
            bail!("`image` must have 3 channels, got shape {:?}", dims);
        }
        let (h, w) = (dims[1], dims[2]);
        let image = image.into_dimensionality::<Ix3>()?;

        let mask = match mask {
            Some(mask) => {
                let mask_dims = expect_rank("mask", &mask, 3)?;
                if mask_dims != [num_objects, h, w] {
                    bail!(
                        "`mask` must have shape [{}, {}, {}], got {:?}",
                        num_objects,
                        h,
                        w,
                        mask_dims
                    );
                }
                Some(mask.into_dimensionality::<Ix3>()?)
            }
            None => None,
        };

        let (image, pad) = pad_divide_by(&image, PAD_DIVISOR);
        if let Some(size) = self.memory.spatial_size() {
            if size != (image.dim().1, image.dim().2) {
                bail!("frame size changed from the frames in memory; call clear_memory first");
            }
        }

        // Committed only once the frame succeeds
        let ti = self.curr_ti + 1;

        let is_mem_frame =
            (ti - self.last_mem_ti >= self.config.mem_every || mask.is_some()) && !end;
        let need_segment = ti > 0
            && !self.memory.is_empty()
            && valid_labels
                .as_ref()
                .map_or(true, |valid| valid.len() < num_objects);

        let mut predicted = if need_segment {
            Some(self.segment(&image, num_objects)?)
        } else {
            None
        };

        let prob_with_bg = match mask {
            Some(mask) => {
                let (mut mask, _) = pad_divide_by(&mask, PAD_DIVISOR);
                if let Some(predicted) = predicted.as_mut() {
                    // User-drawn regions override predictions of every object
                    let covered = mask.sum_axis(Axis(0)).mapv(|v| v > 0.5);
                    for mut channel in predicted.outer_iter_mut() {
                        ndarray::Zip::from(&mut channel)
                            .and(&covered)
                            .for_each(|p, &c| {
                                if c {
                                    *p = 0.0;
                                }
                            });
                    }
                    if let Some(valid) = valid_labels.as_ref() {
                        for i in 0..num_objects {
                            if !valid.contains(&(i as u32 + 1)) {
                                mask.index_axis_mut(Axis(0), i)
                                    .assign(&predicted.index_axis(Axis(0), i));
                            }
                        }
                    }
                }
                aggregate(&mask)
            }
            None => match predicted {
                Some(predicted) => aggregate(&predicted),
                None => bail!("memory is empty; provide a mask for frame {}", ti),
            },
        };

        self.curr_ti = ti;
        if is_mem_frame {
            self.memory.push(MemoryFrame {
                ti,
                image,
                prob: prob_with_bg.slice(s![1.., .., ..]).to_owned(),
            });
            self.last_mem_ti = ti;
            debug!("Frame {} committed to memory ({} frames)", ti, self.memory.len());
        }

        Ok(unpad(&prob_with_bg, pad))
    }

    /// Run the network against memory, returning `[K, H, W]` probabilities
    fn segment(&self, image: &Array3<f32>, num_objects: usize) -> Result<Array3<f32>> {
        if self.memory.is_empty() {
            bail!("memory is empty; provide a mask for an earlier frame");
        }

        let (_, h, w) = image.dim();
        let query: Array4<f32> = image.clone().insert_axis(Axis(0));
        let (memory_images, memory_masks) = self.memory.stacked(num_objects);

        let query = query.into_dyn();
        let memory_images = memory_images.into_dyn();
        let memory_masks = memory_masks.into_dyn();
        let output = first_output(self.network.model.forward(&[
            ("image", &query),
            ("memory_images", &memory_images),
            ("memory_masks", &memory_masks),
        ])?)?;

        if output.len() != num_objects * h * w {
            bail!(
                "network output shape {:?} does not match {} objects at {}x{}",
                output.shape(),
                num_objects,
                h,
                w
            );
        }
        let output: Vec<f32> = output.as_standard_layout().iter().copied().collect();
        Ok(Array3::from_shape_vec((num_objects, h, w), output)?)
    }
}

impl Inspect for InferenceCore {
    fn attr(&self, name: &str) -> Option<Attr<'_>> {
        match name {
            "network" => Some(Attr::Object(&self.network)),
            "memory" => Some(Attr::Object(&self.memory)),
            "config" => serde_json::to_value(&self.config).ok().map(Attr::Value),
            "all_labels" => Some(Attr::Value(json!(self.all_labels))),
            "curr_ti" => Some(Attr::Value(json!(self.curr_ti))),
            "last_mem_ti" => Some(Attr::Value(json!(self.last_mem_ti))),
            "mem_every" => Some(Attr::Value(json!(self.config.mem_every))),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SetLabelsParams {
    all_labels: Vec<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateConfigParams {
    config: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StepParams {
    image: Tensor,
    #[serde(default)]
    mask: Option<Tensor>,
    #[serde(default)]
    valid_labels: Option<Vec<u32>>,
    #[serde(default)]
    end: bool,
}

/// Methods exposed on the processor endpoint
pub fn methods() -> MethodTable<InferenceCore> {
    MethodTable::new()
        .method("set_all_labels", |core: &mut InferenceCore, p: SetLabelsParams| {
            core.set_all_labels(p.all_labels);
            Ok(())
        })
        .method("clear_memory", |core: &mut InferenceCore, _: NoArgs| {
            core.clear_memory();
            Ok(())
        })
        .method("update_config", |core: &mut InferenceCore, p: UpdateConfigParams| {
            core.update_config(p.config)
        })
        .method("step", |core: &mut InferenceCore, p: StepParams| {
            let prob = core.step(
                p.image.into_inner(),
                p.mask.map(Tensor::into_inner),
                p.valid_labels,
                p.end,
            )?;
            Ok(Tensor(prob.into_dyn()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::resolve_path;
    use crate::engine::model::testing::FnModel;
    use ndarray::IxDyn;

    /// Network that predicts a constant probability for every object
    fn constant_model(value: f32) -> Arc<FnModel> {
        Arc::new(FnModel::new(move |inputs| {
            let masks = inputs
                .iter()
                .find(|(name, _)| *name == "memory_masks")
                .map(|(_, t)| t.shape().to_vec())
                .unwrap();
            let (k, h, w) = (masks[2], masks[3], masks[4]);
            Ok(vec![ArrayD::from_elem(IxDyn(&[1, k, h, w]), value)])
        }))
    }

    fn core_with(model: Arc<FnModel>, config: CoreConfig) -> InferenceCore {
        InferenceCore::new(Network::new(model, PathBuf::from("saves/XMem.xml")), config)
    }

    fn image(h: usize, w: usize) -> ArrayD<f32> {
        ArrayD::from_elem(IxDyn(&[3, h, w]), 0.5)
    }

    fn mask(k: usize, h: usize, w: usize) -> ArrayD<f32> {
        let mut mask = ArrayD::zeros(IxDyn(&[k, h, w]));
        mask[[0, 0, 0]] = 1.0;
        mask
    }

    #[test]
    fn test_aggregate_sums_to_one() {
        let mut prob = Array3::<f32>::zeros((2, 1, 2));
        prob[[0, 0, 0]] = 0.9;
        prob[[1, 0, 1]] = 0.6;
        let out = aggregate(&prob);
        assert_eq!(out.dim(), (3, 1, 2));
        for x in 0..2 {
            let total: f32 = (0..3).map(|c| out[[c, 0, x]]).sum();
            assert!((total - 1.0).abs() < 1e-5);
        }
        assert!(out[[1, 0, 0]] > out[[0, 0, 0]]);
        assert!(out[[1, 0, 0]] > out[[2, 0, 0]]);
        assert!(out[[2, 0, 1]] > out[[1, 0, 1]]);
    }

    #[test]
    fn test_pad_round_trip() {
        let array = Array3::<f32>::from_elem((2, 5, 18), 1.0);
        let (padded, pad) = pad_divide_by(&array, 16);
        assert_eq!(padded.dim(), (2, 16, 32));
        assert_eq!(pad, Padding(5, 6, 7, 7));
        assert_eq!(unpad(&padded, pad), array);
    }

    #[test]
    fn test_step_requires_labels() {
        let mut core = core_with(constant_model(0.5), CoreConfig::default());
        let err = core.step(image(4, 4), None, None, false).unwrap_err();
        assert!(err.to_string().contains("set_all_labels"));
    }

    #[test]
    fn test_first_frame_with_mask_is_memorized() {
        let model = constant_model(0.5);
        let mut core = core_with(model.clone(), CoreConfig::default());
        core.set_all_labels(vec![1, 2]);

        let prob = core.step(image(20, 30), Some(mask(2, 20, 30)), None, false).unwrap();
        assert_eq!(prob.dim(), (3, 20, 30));
        assert!(prob[[1, 0, 0]] > 0.9);
        assert_eq!(core.curr_ti(), 0);
        assert_eq!(core.memory().len(), 1);
        assert_eq!(model.call_count(), 0);
    }

    #[test]
    fn test_following_frames_are_segmented() {
        let model = constant_model(0.8);
        let mut core = core_with(model.clone(), CoreConfig { mem_every: 2, ..CoreConfig::default() });
        core.set_all_labels(vec![1]);
        core.step(image(16, 16), Some(mask(1, 16, 16)), None, false).unwrap();

        let prob = core.step(image(16, 16), None, None, false).unwrap();
        assert_eq!(prob.dim(), (2, 16, 16));
        assert!(prob[[1, 5, 5]] > prob[[0, 5, 5]]);
        assert_eq!(core.memory().len(), 1);

        core.step(image(16, 16), None, None, false).unwrap();
        assert_eq!(core.memory().len(), 2);

        let calls = model.calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1][1], ("memory_images".to_string(), vec![1, 1, 3, 16, 16]));
        assert_eq!(calls[1][2], ("memory_masks".to_string(), vec![1, 1, 1, 16, 16]));
    }

    #[test]
    fn test_end_frame_not_memorized() {
        let mut core = core_with(constant_model(0.5), CoreConfig::default());
        core.set_all_labels(vec![1]);
        core.step(image(8, 8), Some(mask(1, 8, 8)), None, true).unwrap();
        assert!(core.memory().is_empty());

        let err = core.step(image(8, 8), None, None, false).unwrap_err();
        assert!(err.to_string().contains("memory is empty"));
        assert_eq!(core.curr_ti(), 0);
    }

    #[test]
    fn test_mask_frame_with_empty_memory_uses_mask() {
        let model = constant_model(0.5);
        let mut core = core_with(model.clone(), CoreConfig::default());
        core.set_all_labels(vec![1]);
        core.step(image(8, 8), Some(mask(1, 8, 8)), None, true).unwrap();

        let prob = core.step(image(8, 8), Some(mask(1, 8, 8)), None, false).unwrap();
        assert!(prob[[1, 0, 0]] > 0.9);
        assert_eq!(core.curr_ti(), 1);
        assert_eq!(core.memory().len(), 1);
        assert_eq!(resolve_path(&core, "last_mem_ti"), Some(json!(1)));
        assert_eq!(model.call_count(), 0);
    }

    #[test]
    fn test_failed_segmentation_keeps_counter() {
        let model = Arc::new(FnModel::new(|_| anyhow::bail!("device lost")));
        let mut core = core_with(model, CoreConfig::default());
        core.set_all_labels(vec![1]);
        core.step(image(16, 16), Some(mask(1, 16, 16)), None, false).unwrap();

        let err = core.step(image(16, 16), None, None, false).unwrap_err();
        assert!(err.to_string().contains("device lost"));
        assert_eq!(core.curr_ti(), 0);
        assert_eq!(core.memory().len(), 1);
        assert_eq!(resolve_path(&core, "last_mem_ti"), Some(json!(0)));
    }

    #[test]
    fn test_extra_valid_labels_skip_network() {
        let model = constant_model(0.7);
        let mut core = core_with(model.clone(), CoreConfig::default());
        core.set_all_labels(vec![1]);
        core.step(image(16, 16), Some(mask(1, 16, 16)), None, false).unwrap();
        core.step(image(16, 16), Some(mask(1, 16, 16)), Some(vec![1, 2]), false).unwrap();
        assert_eq!(model.call_count(), 0);
    }

    #[test]
    fn test_valid_labels_keep_other_predictions() {
        let model = constant_model(0.7);
        let mut core = core_with(model.clone(), CoreConfig::default());
        core.set_all_labels(vec![1, 2]);
        core.step(image(16, 16), Some(mask(2, 16, 16)), None, false).unwrap();

        // Only object 2 is re-annotated; object 1 comes from the network
        let mut update = ArrayD::zeros(IxDyn(&[2, 16, 16]));
        update[[1, 3, 3]] = 1.0;
        let prob = core.step(image(16, 16), Some(update), Some(vec![2]), false).unwrap();

        assert_eq!(model.call_count(), 1);
        assert!(prob[[2, 3, 3]] > 0.9);
        assert!(prob[[1, 8, 8]] > prob[[2, 8, 8]]);
    }

    #[test]
    fn test_all_labels_valid_skips_network() {
        let model = constant_model(0.7);
        let mut core = core_with(model.clone(), CoreConfig::default());
        core.set_all_labels(vec![1]);
        core.step(image(16, 16), Some(mask(1, 16, 16)), None, false).unwrap();
        core.step(image(16, 16), Some(mask(1, 16, 16)), Some(vec![1]), false).unwrap();
        assert_eq!(model.call_count(), 0);
    }

    #[test]
    fn test_memory_capacity_pins_first_frame() {
        let config = CoreConfig {
            mem_every: 1,
            max_memory_frames: 3,
            enable_long_term: true,
        };
        let mut core = core_with(constant_model(0.5), config);
        core.set_all_labels(vec![1]);
        core.step(image(16, 16), Some(mask(1, 16, 16)), None, false).unwrap();
        for _ in 0..4 {
            core.step(image(16, 16), None, None, false).unwrap();
        }
        assert_eq!(resolve_path(&core, "memory.frames"), Some(json!([0, 3, 4])));
    }

    #[test]
    fn test_clear_memory_resets_counter() {
        let mut core = core_with(constant_model(0.5), CoreConfig::default());
        core.set_all_labels(vec![1]);
        core.step(image(16, 16), Some(mask(1, 16, 16)), None, false).unwrap();
        core.clear_memory();
        assert_eq!(core.curr_ti(), -1);
        assert!(core.memory().is_empty());

        // A different resolution is accepted after clearing
        core.step(image(32, 32), Some(mask(1, 32, 32)), None, false).unwrap();
        assert_eq!(core.memory().len(), 1);
    }

    #[test]
    fn test_frame_size_change_rejected() {
        let mut core = core_with(constant_model(0.5), CoreConfig::default());
        core.set_all_labels(vec![1]);
        core.step(image(16, 16), Some(mask(1, 16, 16)), None, false).unwrap();
        assert!(core.step(image(48, 48), None, None, false).is_err());
        assert_eq!(core.curr_ti(), 0);
    }

    #[test]
    fn test_mask_shape_checked() {
        let mut core = core_with(constant_model(0.5), CoreConfig::default());
        core.set_all_labels(vec![1, 2]);
        let err = core.step(image(8, 8), Some(mask(1, 8, 8)), None, false).unwrap_err();
        assert!(err.to_string().contains("`mask` must have shape"));
    }

    #[test]
    fn test_update_config() {
        let mut core = core_with(constant_model(0.5), CoreConfig::default());
        let changes = json!({"mem_every": 2}).as_object().unwrap().clone();
        core.update_config(changes).unwrap();
        assert_eq!(core.config().mem_every, 2);
        assert_eq!(core.config().max_memory_frames, 10);

        let unknown = json!({"top_k": 30}).as_object().unwrap().clone();
        assert!(core.update_config(unknown).is_err());
        assert_eq!(core.config().mem_every, 2);
    }

    #[test]
    fn test_attributes() {
        let mut core = core_with(constant_model(0.5), CoreConfig::default());
        core.set_all_labels(vec![1, 3]);
        assert_eq!(resolve_path(&core, "network.device"), Some(json!("CPU")));
        assert_eq!(resolve_path(&core, "network.checkpoint"), Some(json!("saves/XMem.xml")));
        assert_eq!(resolve_path(&core, "all_labels"), Some(json!([1, 3])));
        assert_eq!(resolve_path(&core, "config.mem_every"), Some(json!(5)));
        assert_eq!(resolve_path(&core, "memory.size"), Some(json!(0)));
        assert_eq!(resolve_path(&core, "curr_ti"), Some(json!(-1)));
    }

    #[test]
    fn test_step_method_through_table() {
        let table = methods();
        let mut core = core_with(constant_model(0.5), CoreConfig::default());
        let args = |v: Value| v.as_object().unwrap().clone();

        table
            .call("network", &mut core, "set_all_labels", args(json!({"all_labels": [1]})))
            .unwrap();
        let mut data = vec![0.0; 4];
        data[0] = 1.0;
        let result = table
            .call(
                "network",
                &mut core,
                "step",
                args(json!({
                    "image": {"shape": [3, 2, 2], "data": vec![0.5; 12]},
                    "mask": {"shape": [1, 2, 2], "data": data},
                })),
            )
            .unwrap();
        assert_eq!(result["shape"], json!([2, 2, 2]));
        assert_eq!(result["data"].as_array().unwrap().len(), 8);
    }
}
