//! Power-of-two enlargement with an edge-directed interpolator
//!
//! Each level doubles the width (by transposing and doubling rows) and/or
//! the height, halving the remaining factor of every axis it touched. A
//! transposed plane stays transposed while further width doublings are
//! due, so repeated horizontal-only levels do not transpose back and forth.
//!
//! [`Doubler::enlarge`] leaves the half-sample bias of every doubling in
//! place; the node's grid records it so a later resample can fold it.
//! [`Doubler::enlarge_corrected`] removes it immediately with the closed-form
//! corrections from [`crate::shift`].

use serde::Serialize;

use crate::algorithm::{Guide, Interpolation, Kernel, Tuning, Upscaler};
use crate::error::ConfigError;
use crate::format::ScaleRequest;
use crate::graph::{EnlargeParams, GraphBuilder, NodeId, ResampleParams};
use crate::pad::doubler_border;
use crate::plane::Parity;
use crate::shift::{doubling_parity, Axis, ShiftCorrection};

/// Neural-network size used when the nnedi family upscales.
pub const UPSCALE_NNS: u8 = 3;

/// Power-of-two factor used to enlarge `from` samples towards `to`.
///
/// Factors overshoot slightly so a final reduction absorbs the rest.
pub fn doubling_factor(from: u32, to: u32) -> u32 {
    let (from, to) = (i64::from(from), i64::from(to));
    if to > from * 6 - 4 {
        8
    } else if to > from * 3 - 4 {
        4
    } else if to > from {
        2
    } else {
        1
    }
}

/// Where the recursion stands between levels.
#[derive(Debug, Clone, Copy)]
struct DoublingState {
    node: NodeId,
    /// Guide mask in the plane's natural orientation
    mask: Option<NodeId>,
    remaining_x: u32,
    remaining_y: u32,
    transposed: bool,
    level: u32,
}

/// An edge-directed doubler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Doubler {
    pub algorithm: Interpolation,
    /// Guide plane source; only eedi3 uses one
    pub guide: Option<Guide>,
    /// Keep parity 1 on every horizontal doubling
    pub align_chroma: bool,
    pub tuning: Tuning,
}

impl Doubler {
    /// The doubler for an edge-directed upscaler; `None` for kernels.
    pub fn from_upscaler(upscaler: Upscaler, align_chroma: bool, tuning: Tuning) -> Option<Self> {
        match upscaler {
            Upscaler::Kernel(_) => None,
            Upscaler::EdgeDirected { algorithm, guide } => Some(Self {
                algorithm,
                guide,
                align_chroma,
                tuning: Tuning { nns: UPSCALE_NNS, ..tuning },
            }),
        }
    }

    /// Enlarge `input` by `factors`, leaving the doubling bias in place.
    ///
    /// `mask` is an eedi3 guide mask with the input's dimensions; other
    /// algorithms ignore it.
    pub fn enlarge(
        &self,
        builder: &mut GraphBuilder,
        input: NodeId,
        mask: Option<NodeId>,
        factors: ScaleRequest,
    ) -> Result<NodeId, ConfigError> {
        factors.validate()?;
        if factors.is_identity() {
            return Ok(input);
        }

        let (sub_w, sub_h) = builder.format().plane_subsampling(builder.node(input).plane);
        let border = doubler_border(self.algorithm, factors.x > 1, factors.y > 1).subsampled(sub_w, sub_h);
        let mask = mask.filter(|_| self.algorithm.accepts_guide());

        tracing::debug!(
            algorithm = %self.algorithm,
            factors = %factors,
            border = border.left.max(border.top),
            "edge-directed enlarge of {}",
            input
        );

        let mut state = DoublingState {
            node: builder.pad(input, border),
            mask: mask.map(|m| builder.pad(m, border)),
            remaining_x: factors.x,
            remaining_y: factors.y,
            transposed: false,
            level: 0,
        };
        while state.remaining_x > 1 || state.remaining_y > 1 {
            state = self.level(builder, state)?;
        }

        builder.crop(state.node, border.scaled(factors.x, factors.y))
    }

    /// Enlarge `input` by `factors` and resample it to `width` x `height`
    /// with `correction` as source offsets.
    pub fn enlarge_corrected(
        &self,
        builder: &mut GraphBuilder,
        input: NodeId,
        mask: Option<NodeId>,
        factors: ScaleRequest,
        correction: ShiftCorrection,
        kernel: Kernel,
        width: u32,
        height: u32,
    ) -> Result<NodeId, ConfigError> {
        let doubled = self.enlarge(builder, input, mask, factors)?;
        if correction.is_zero() && builder.dims(doubled) == (width, height) {
            return Ok(doubled);
        }
        Ok(builder.resample(
            doubled,
            ResampleParams {
                width,
                height,
                src_left: correction.horizontal,
                src_top: correction.vertical,
                kernel,
            },
        ))
    }

    fn level(&self, builder: &mut GraphBuilder, mut s: DoublingState) -> Result<DoublingState, ConfigError> {
        let next_level_works = s.remaining_x / 2 > 1 || s.remaining_y / 2 > 1;

        if s.remaining_x > 1 {
            if !s.transposed {
                s.node = builder.transpose(s.node);
                s.transposed = true;
            }
            let parity = doubling_parity(s.level, Axis::Horizontal, self.align_chroma);
            let mask = s.mask.map(|m| builder.transpose(m));
            s.node = self.double_rows(builder, s.node, parity, mask)?;
            if s.remaining_y > 1 || next_level_works {
                s.mask = s.mask.map(|m| double_mask(builder, m, Axis::Horizontal, parity));
            }
        }

        if s.transposed && (s.remaining_y > 1 || s.remaining_x == 2) {
            s.node = builder.transpose(s.node);
            s.transposed = false;
        }

        if s.remaining_y > 1 {
            let parity = doubling_parity(s.level, Axis::Vertical, self.align_chroma);
            s.node = self.double_rows(builder, s.node, parity, s.mask)?;
            if next_level_works {
                s.mask = s.mask.map(|m| double_mask(builder, m, Axis::Vertical, parity));
            }
        }

        s.remaining_x = (s.remaining_x / 2).max(1);
        s.remaining_y = (s.remaining_y / 2).max(1);
        s.level += 1;
        Ok(s)
    }

    /// Double the node's rows, building the guide with the same parity.
    fn double_rows(
        &self,
        builder: &mut GraphBuilder,
        node: NodeId,
        parity: Parity,
        mask: Option<NodeId>,
    ) -> Result<NodeId, ConfigError> {
        let params = EnlargeParams {
            algorithm: self.algorithm,
            parity,
            double_height: true,
            tuning: self.tuning,
        };

        let guide = match self.guide.filter(|_| self.algorithm.accepts_guide()) {
            None => None,
            Some(Guide::Kernel(kernel)) => {
                let (w, h) = builder.dims(node);
                let target = builder.grid(node).map_rows(|g| g.enlarged(parity));
                Some(builder.resample_onto(node, w, h * 2, target, kernel))
            }
            Some(Guide::Interpolator(algorithm)) => {
                Some(builder.enlarge(node, EnlargeParams { algorithm, ..params }, None, None)?)
            }
        };

        builder.enlarge(node, params, guide, mask)
    }
}

/// Double an untransposed mask along `axis` and binarize it again.
fn double_mask(builder: &mut GraphBuilder, mask: NodeId, axis: Axis, parity: Parity) -> NodeId {
    let (w, h) = builder.dims(mask);
    let grid = builder.grid(mask);
    let (width, height, target) = match axis {
        Axis::Horizontal => (w * 2, h, grid.map_columns(|g| g.enlarged(parity))),
        Axis::Vertical => (w, h * 2, grid.map_rows(|g| g.enlarged(parity))),
    };
    let doubled = builder.resample_onto(mask, width, height, target, Kernel::Spline36);
    builder.binarize(doubled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::MaskAlgorithm;
    use crate::format::{ChromaSiting, FrameFormat, PlaneKind};
    use crate::graph::{Op, PlaneTransformGraph};
    use crate::shift::doubling_corrections;
    use crate::shift::grid::{AxisGrid, PlaneGrid};

    fn doubler(algorithm: Interpolation, align_chroma: bool) -> Doubler {
        Doubler { algorithm, guide: None, align_chroma, tuning: Tuning::default() }
    }

    fn count(graph: &PlaneTransformGraph, name: &str) -> usize {
        graph.nodes().iter().filter(|n| n.op.name() == name).count()
    }

    #[test]
    fn test_doubling_factor_thresholds() {
        assert_eq!(doubling_factor(100, 100), 1);
        assert_eq!(doubling_factor(100, 50), 1);
        assert_eq!(doubling_factor(100, 200), 2);
        assert_eq!(doubling_factor(100, 296), 2);
        assert_eq!(doubling_factor(100, 297), 4);
        assert_eq!(doubling_factor(100, 400), 4);
        assert_eq!(doubling_factor(100, 800), 8);
    }

    #[test]
    fn test_from_upscaler() {
        assert!(Doubler::from_upscaler(Upscaler::Kernel(Kernel::Lanczos), false, Tuning::default()).is_none());
        let d = Doubler::from_upscaler("eedi3 znedi3".parse().unwrap(), true, Tuning::default()).unwrap();
        assert_eq!(d.algorithm, Interpolation::Eedi3);
        assert_eq!(d.tuning.nns, UPSCALE_NNS);
        assert!(d.align_chroma);
    }

    #[test]
    fn test_uncorrected_keeps_bias() {
        let mut b = GraphBuilder::new(FrameFormat::gray(8));
        let src = b.source(PlaneKind::Luma, 64, 48);
        let out = doubler(Interpolation::Znedi3, false)
            .enlarge(&mut b, src, None, ScaleRequest::uniform(2).unwrap())
            .unwrap();
        assert_eq!(b.dims(out), (128, 96));
        let grid = b.grid(out);
        assert!(!grid.transposed);
        assert!(grid.horizontal.approx_eq(&AxisGrid { origin: 0.0, step: 0.5 }));
        assert!(grid.vertical.approx_eq(&AxisGrid { origin: 0.0, step: 0.5 }));
    }

    #[test]
    fn test_lazy_transposition() {
        let mut b = GraphBuilder::new(FrameFormat::gray(8));
        let src = b.source(PlaneKind::Luma, 32, 32);
        let out = doubler(Interpolation::Nnedi3cl, false)
            .enlarge(&mut b, src, None, ScaleRequest::new(4, 1).unwrap())
            .unwrap();
        assert_eq!(b.dims(out), (128, 32));
        let graph = b.finish((32, 32), (128, 32), Vec::new());
        assert_eq!(count(&graph, "transpose"), 2);
        assert_eq!(count(&graph, "enlarge"), 2);
        // second horizontal level runs with parity 0
        let parities: Vec<_> = graph
            .nodes()
            .iter()
            .filter_map(|n| match &n.op {
                Op::Enlarge { params, .. } => Some(params.parity),
                _ => None,
            })
            .collect();
        assert_eq!(parities, vec![Parity::Top, Parity::Bottom]);
    }

    #[test]
    fn test_border_padding_and_crop() {
        let mut b = GraphBuilder::new(FrameFormat::yuv420(8));
        let chroma = b.source(PlaneKind::ChromaU, 32, 32);
        let out = doubler(Interpolation::Znedi3, true)
            .enlarge(&mut b, chroma, None, ScaleRequest::new(1, 4).unwrap())
            .unwrap();
        assert_eq!(b.dims(out), (32, 128));
        let graph = b.finish((64, 64), (64, 256), Vec::new());
        let pad = graph.nodes().iter().find_map(|n| match &n.op {
            Op::Pad { padding, .. } => Some(*padding),
            _ => None,
        });
        assert_eq!(pad.map(|p| (p.left, p.top, p.bottom)), Some((0, 2, 2)));
        let crop = graph.nodes().iter().find_map(|n| match &n.op {
            Op::Crop { crop, .. } => Some(*crop),
            _ => None,
        });
        assert_eq!(crop.map(|c| (c.top, c.bottom)), Some((8, 8)));
    }

    #[test]
    fn test_eedi3_has_no_border() {
        let mut b = GraphBuilder::new(FrameFormat::gray(8));
        let src = b.source(PlaneKind::Luma, 32, 32);
        doubler(Interpolation::Eedi3, false)
            .enlarge(&mut b, src, None, ScaleRequest::uniform(2).unwrap())
            .unwrap();
        let graph = b.finish((32, 32), (64, 64), Vec::new());
        assert_eq!(count(&graph, "pad"), 0);
        assert_eq!(count(&graph, "crop"), 0);
    }

    #[test]
    fn test_corrected_round_trip_reaches_ideal_grid() {
        for format in [FrameFormat::yuv420(8), FrameFormat::yuv422(8), FrameFormat::yuv444(8)] {
            for siting in [ChromaSiting::LeftAligned, ChromaSiting::Centered] {
                for f in [2, 4, 8] {
                    let factors = ScaleRequest::uniform(f).unwrap();
                    let align = format.subsampling_w > 0;
                    let corrections = doubling_corrections(
                        &format,
                        factors,
                        align,
                        siting,
                        Kernel::Spline36,
                        64,
                        64 * f,
                    )
                    .unwrap();
                    let mut b = GraphBuilder::new(format);
                    for &plane in format.planes() {
                        let (w, h) = format.plane_dims(plane, 64, 64);
                        let src = b.source(plane, w, h);
                        let out = doubler(Interpolation::Znedi3, align)
                            .enlarge_corrected(
                                &mut b,
                                src,
                                None,
                                factors,
                                corrections.for_plane(plane),
                                Kernel::Spline36,
                                w * f,
                                h * f,
                            )
                            .unwrap();
                        let ideal = PlaneGrid::ideal(&format, plane, siting, (w, h), (w * f, h * f));
                        assert!(
                            b.grid(out).approx_eq(&ideal),
                            "{} {} {:?} f={}: {:?}",
                            format,
                            siting,
                            plane,
                            f,
                            b.grid(out)
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_kernel_guide_uses_parity_shift() {
        let mut b = GraphBuilder::new(FrameFormat::gray(8));
        let src = b.source(PlaneKind::Luma, 16, 16);
        let d = Doubler { guide: Some(Guide::Kernel(Kernel::Bicubic)), ..doubler(Interpolation::Eedi3, false) };
        d.enlarge(&mut b, src, None, ScaleRequest::new(1, 2).unwrap()).unwrap();
        let graph = b.finish((16, 16), (16, 32), Vec::new());
        let shifts: Vec<_> = graph
            .nodes()
            .iter()
            .filter_map(|n| match &n.op {
                Op::Resample { params, .. } => Some((params.kernel, params.src_top, params.height)),
                _ => None,
            })
            .collect();
        assert_eq!(shifts, vec![(Kernel::Bicubic, 0.25, 32)]);
        let enlarge = graph.nodes().iter().rev().find(|n| n.op.name() == "enlarge").unwrap();
        assert!(matches!(enlarge.op, Op::Enlarge { guide: Some(_), .. }));
    }

    #[test]
    fn test_mask_follows_each_level() {
        let mut b = GraphBuilder::new(FrameFormat::gray(8));
        let src = b.source(PlaneKind::Luma, 16, 16);
        let mask = b.detect_edges(src, MaskAlgorithm::default(), 4.0);
        let out = doubler(Interpolation::Eedi3, false)
            .enlarge(&mut b, src, Some(mask), ScaleRequest::uniform(4).unwrap())
            .unwrap();
        assert_eq!(b.dims(out), (64, 64));
        let graph = b.finish((16, 16), (64, 64), Vec::new());
        for node in graph.nodes() {
            if let Op::Enlarge { input, mask, .. } = &node.op {
                let mask = mask.expect("every eedi3 call gets the mask");
                assert_eq!(graph.node(*input).dims(), graph.node(mask).dims());
            }
        }
        // three of the four doublings need a re-doubled mask afterwards
        assert_eq!(count(&graph, "binarize"), 3);
    }

    #[test]
    fn test_mask_ignored_without_eedi3() {
        let mut b = GraphBuilder::new(FrameFormat::gray(8));
        let src = b.source(PlaneKind::Luma, 16, 16);
        let mask = b.detect_edges(src, MaskAlgorithm::Sobel, 4.0);
        doubler(Interpolation::Znedi3, false)
            .enlarge(&mut b, src, Some(mask), ScaleRequest::uniform(2).unwrap())
            .unwrap();
        let graph = b.finish((16, 16), (32, 32), Vec::new());
        assert!(graph.nodes().iter().all(|n| !matches!(n.op, Op::Enlarge { mask: Some(_), .. })));
    }
}
