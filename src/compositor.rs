//! Edge masks and the final merge of antialiased and reference planes
//!
//! The luma edge mask is detected on the reference luma plane. Chroma planes
//! are merged with the same mask resampled to their size rather than with
//! masks of their own; planes that were not antialiased pass the reference
//! through untouched.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::algorithm::{Kernel, MaskAlgorithm};
use crate::error::ConfigError;
use crate::format::{ChromaSiting, PlaneKind};
use crate::graph::{GraphBuilder, NodeId, PlaneOutput, ResampleParams, Stage};
use crate::shift::{chroma_mask_shift, Axis};

/// How antialiased and reference planes are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MaskPolicy {
    /// Antialiased planes everywhere
    Replace,
    /// Antialiased samples where the mask is set
    #[default]
    AntialiasedInEdges,
    /// Reference samples where the mask is set
    OriginalInEdges,
    /// Half-and-half blend where the mask is set, for inspecting the mask
    Overlay,
}

impl MaskPolicy {
    pub fn name(self) -> &'static str {
        match self {
            MaskPolicy::Replace => "replace",
            MaskPolicy::AntialiasedInEdges => "antialiased-in-edges",
            MaskPolicy::OriginalInEdges => "original-in-edges",
            MaskPolicy::Overlay => "overlay",
        }
    }

    pub fn needs_mask(self) -> bool {
        self != MaskPolicy::Replace
    }
}

impl fmt::Display for MaskPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MaskPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <MaskPolicy as ValueEnum>::from_str(s, false).map_err(|_| {
            ConfigError::invalid_parameter(
                "mask",
                format!("'{}' is not one of replace, antialiased-in-edges, original-in-edges, overlay", s),
            )
        })
    }
}

/// Opt-in reuse of edge masks.
///
/// Masks are keyed on algorithm, effective threshold and the node they are
/// detected on. With the cache disabled every request builds a new mask.
#[derive(Debug, Default)]
pub struct MaskCache {
    enabled: bool,
    entries: HashMap<(MaskAlgorithm, u64, NodeId), NodeId>,
    hits: usize,
}

impl MaskCache {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, ..Self::default() }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of requests answered from the cache.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Edge mask of `input`, applying the algorithm's threshold convention.
    pub fn edge_mask(
        &mut self,
        builder: &mut GraphBuilder,
        input: NodeId,
        algorithm: MaskAlgorithm,
        threshold: f64,
    ) -> NodeId {
        let threshold = algorithm.effective_threshold(threshold);
        let key = (algorithm, threshold.to_bits(), input);
        if self.enabled {
            if let Some(&mask) = self.entries.get(&key) {
                self.hits += 1;
                tracing::debug!(mask = %mask, input = %input, "reusing {} mask", algorithm);
                return mask;
            }
        }
        let mask = builder.detect_edges(input, algorithm, threshold);
        if self.enabled {
            self.entries.insert(key, mask);
        }
        mask
    }
}

/// Final plane results handed to the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneInputs {
    pub plane: PlaneKind,
    /// Antialiased plane at output size; `None` when the plane was skipped
    pub antialiased: Option<NodeId>,
    /// Reference plane at output size
    pub reference: NodeId,
}

/// Merge settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Compositor {
    pub policy: MaskPolicy,
    pub algorithm: MaskAlgorithm,
    pub threshold: f64,
    pub siting: ChromaSiting,
}

impl Compositor {
    /// Produce one output per plane.
    ///
    /// `planes` must contain the luma plane; its reference is where the
    /// edge mask is detected.
    pub fn compose(
        &self,
        builder: &mut GraphBuilder,
        cache: &mut MaskCache,
        planes: &[PlaneInputs],
    ) -> Result<Vec<PlaneOutput>, ConfigError> {
        let luma_reference = planes
            .iter()
            .find(|p| p.plane == PlaneKind::Luma)
            .map(|p| p.reference)
            .ok_or_else(|| ConfigError::invalid_parameter("planes", "compositing needs the luma plane"))?;

        let needs_mask = self.policy.needs_mask() && planes.iter().any(|p| p.antialiased.is_some());
        let luma_mask = if needs_mask {
            builder.set_stage(Stage::Mask);
            Some(cache.edge_mask(builder, luma_reference, self.algorithm, self.threshold))
        } else {
            None
        };

        let mut outputs = Vec::with_capacity(planes.len());
        for inputs in planes {
            let node = match (inputs.antialiased, luma_mask) {
                (None, _) => inputs.reference,
                (Some(antialiased), None) => antialiased,
                (Some(antialiased), Some(luma_mask)) => {
                    builder.set_stage(Stage::Mask);
                    let mask = self.plane_mask(builder, luma_mask, inputs.reference);
                    builder.set_stage(Stage::Composite);
                    self.merge(builder, antialiased, inputs.reference, mask)?
                }
            };
            outputs.push(PlaneOutput { plane: inputs.plane, node });
        }
        Ok(outputs)
    }

    /// The luma mask at the size of `reference`.
    fn plane_mask(&self, builder: &mut GraphBuilder, luma_mask: NodeId, reference: NodeId) -> NodeId {
        let (width, height) = builder.dims(reference);
        if builder.dims(luma_mask) == (width, height) {
            return luma_mask;
        }
        let format = *builder.format();
        builder.resample(
            luma_mask,
            ResampleParams {
                width,
                height,
                src_left: chroma_mask_shift(Axis::Horizontal, &format, self.siting),
                src_top: chroma_mask_shift(Axis::Vertical, &format, self.siting),
                kernel: Kernel::Bicubic,
            },
        )
    }

    fn merge(
        &self,
        builder: &mut GraphBuilder,
        antialiased: NodeId,
        reference: NodeId,
        mask: NodeId,
    ) -> Result<NodeId, ConfigError> {
        match self.policy {
            MaskPolicy::Replace => Ok(antialiased),
            MaskPolicy::AntialiasedInEdges => builder.masked_merge(reference, antialiased, mask),
            MaskPolicy::OriginalInEdges => builder.masked_merge(antialiased, reference, mask),
            MaskPolicy::Overlay => {
                let blend = builder.average(reference, antialiased)?;
                builder.masked_merge(reference, blend, mask)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FrameFormat;
    use crate::graph::Op;

    fn compositor(policy: MaskPolicy) -> Compositor {
        Compositor {
            policy,
            algorithm: MaskAlgorithm::Sobel,
            threshold: 7.5,
            siting: ChromaSiting::LeftAligned,
        }
    }

    fn yuv420_planes(b: &mut GraphBuilder, antialias_chroma: bool) -> Vec<PlaneInputs> {
        let mut planes = Vec::new();
        for &plane in FrameFormat::yuv420(8).planes() {
            let (w, h) = FrameFormat::yuv420(8).plane_dims(plane, 32, 32);
            let reference = b.source(plane, w, h);
            let antialiased = if plane == PlaneKind::Luma || antialias_chroma {
                Some(b.transpose(reference))
            } else {
                None
            };
            // square planes keep their dims through a transpose
            planes.push(PlaneInputs { plane, antialiased, reference });
        }
        planes
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("overlay".parse::<MaskPolicy>().unwrap(), MaskPolicy::Overlay);
        assert_eq!("original-in-edges".parse::<MaskPolicy>().unwrap(), MaskPolicy::OriginalInEdges);
        assert!("edges".parse::<MaskPolicy>().is_err());
    }

    #[test]
    fn test_antialiased_in_edges_with_luma_only() {
        let mut b = GraphBuilder::new(FrameFormat::yuv420(8));
        let planes = yuv420_planes(&mut b, false);
        let mut cache = MaskCache::new(false);
        let outputs = compositor(MaskPolicy::AntialiasedInEdges).compose(&mut b, &mut cache, &planes).unwrap();
        let luma = b.node(outputs[0].node);
        match luma.op {
            Op::MaskedMerge { base, overlay, mask } => {
                assert_eq!(base, planes[0].reference);
                assert_eq!(Some(overlay), planes[0].antialiased);
                assert_eq!(b.node(mask).op, Op::DetectEdges {
                    input: planes[0].reference,
                    algorithm: MaskAlgorithm::Sobel,
                    threshold: 8.0,
                });
            }
            ref other => panic!("unexpected {:?}", other),
        }
        assert_eq!(outputs[1].node, planes[1].reference);
        assert_eq!(outputs[2].node, planes[2].reference);
    }

    #[test]
    fn test_chroma_uses_resampled_luma_mask() {
        let mut b = GraphBuilder::new(FrameFormat::yuv420(8));
        let planes = yuv420_planes(&mut b, true);
        let mut cache = MaskCache::new(false);
        let outputs = compositor(MaskPolicy::OriginalInEdges).compose(&mut b, &mut cache, &planes).unwrap();
        let Op::MaskedMerge { base, mask, .. } = b.node(outputs[1].node).op else {
            panic!("chroma should be merged");
        };
        assert_eq!(Some(base), planes[1].antialiased);
        let mask = b.node(mask);
        assert_eq!(mask.plane, PlaneKind::Luma);
        assert_eq!(mask.dims(), (16, 16));
        match mask.op {
            Op::Resample { params, .. } => {
                assert_eq!(params.src_left, -0.5);
                assert_eq!(params.src_top, 0.0);
            }
            ref other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_replace_builds_no_mask() {
        let mut b = GraphBuilder::new(FrameFormat::yuv420(8));
        let planes = yuv420_planes(&mut b, true);
        let before = b.len();
        let mut cache = MaskCache::new(false);
        let outputs = compositor(MaskPolicy::Replace).compose(&mut b, &mut cache, &planes).unwrap();
        assert_eq!(b.len(), before);
        assert_eq!(Some(outputs[0].node), planes[0].antialiased);
    }

    #[test]
    fn test_overlay_blends_under_mask() {
        let mut b = GraphBuilder::new(FrameFormat::gray(8));
        let reference = b.source(PlaneKind::Luma, 8, 8);
        let antialiased = b.transpose(reference);
        let planes = [PlaneInputs { plane: PlaneKind::Luma, antialiased: Some(antialiased), reference }];
        let mut cache = MaskCache::new(false);
        let outputs = compositor(MaskPolicy::Overlay).compose(&mut b, &mut cache, &planes).unwrap();
        let Op::MaskedMerge { base, overlay, .. } = b.node(outputs[0].node).op else {
            panic!("expected a merge");
        };
        assert_eq!(base, reference);
        assert_eq!(b.node(overlay).op, Op::Average { first: reference, second: antialiased });
    }

    #[test]
    fn test_mask_cache_is_opt_in() {
        let mut b = GraphBuilder::new(FrameFormat::gray(8));
        let src = b.source(PlaneKind::Luma, 8, 8);

        let mut off = MaskCache::new(false);
        let a = off.edge_mask(&mut b, src, MaskAlgorithm::TCanny, 4.0);
        let c = off.edge_mask(&mut b, src, MaskAlgorithm::TCanny, 4.0);
        assert_ne!(a, c);

        let mut on = MaskCache::new(true);
        let a = on.edge_mask(&mut b, src, MaskAlgorithm::Prewitt, 4.4);
        let c = on.edge_mask(&mut b, src, MaskAlgorithm::Prewitt, 4.0);
        let d = on.edge_mask(&mut b, src, MaskAlgorithm::TCanny, 4.0);
        assert_eq!(a, c);
        assert_ne!(a, d);
        assert_eq!(on.hits(), 1);
    }
}
