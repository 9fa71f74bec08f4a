// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pairs each operation name with its typed parameters and routes it to the
// right transform.

use imgflow_core::error::Result;
use imgflow_core::types::{ContourRecord, OperationKind, Params};
use tracing::{debug, instrument};

use crate::buffer::PixelBuffer;
use crate::params::{
    BlankParams, BlendParams, BlurParams, CircleParams, CompositeParams, ContourParams,
    EdgeParams, LineParams, MaskParams, MorphParams, RectParams, ThresholdParams,
};
use crate::transform::composite::BlendMode;
use crate::transform::{
    blank, blur, composite, contours, drawing, edges, grayscale, morphology, threshold,
};

/// A fully parsed operation, ready to run.
#[derive(Debug, Clone)]
pub enum Operation {
    Binary(ThresholdParams),
    Grayscale,
    Blank(BlankParams),
    Contour(ContourParams),
    Blur(BlurParams),
    Erode(MorphParams),
    Dilate(MorphParams),
    Edge(EdgeParams),
    DrawRect(RectParams),
    DrawCircle(CircleParams),
    DrawLine(LineParams),
    Multiply(CompositeParams),
    Screen(CompositeParams),
    Overlay(CompositeParams),
    Blend(BlendParams),
    Mask(MaskParams),
    InvertMask(MaskParams),
}

/// What a transform hands back to the response assembler.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub buffer: PixelBuffer,
    /// Present only for `contour`.
    pub contours: Option<Vec<ContourRecord>>,
}

impl Outcome {
    pub fn image(buffer: PixelBuffer) -> Self {
        Self {
            buffer,
            contours: None,
        }
    }
}

impl Operation {
    /// Normalize `params` for `kind`. Layer images are decoded here, so a
    /// missing or broken `image2` fails before any pixel work starts.
    pub fn parse(kind: OperationKind, params: &Params) -> Result<Self> {
        let op = match kind {
            OperationKind::Binary => Self::Binary(ThresholdParams::from_params(params)?),
            OperationKind::Grayscale => Self::Grayscale,
            OperationKind::Blank => Self::Blank(BlankParams::from_params(params)?),
            OperationKind::Contour => Self::Contour(ContourParams::from_params(params)?),
            OperationKind::Blur => Self::Blur(BlurParams::from_params(params)?),
            OperationKind::Erode => Self::Erode(MorphParams::from_params(params)?),
            OperationKind::Dilate => Self::Dilate(MorphParams::from_params(params)?),
            OperationKind::Edge => Self::Edge(EdgeParams::from_params(params)?),
            OperationKind::DrawRect => Self::DrawRect(RectParams::from_params(params)?),
            OperationKind::DrawCircle => Self::DrawCircle(CircleParams::from_params(params)?),
            OperationKind::DrawLine => Self::DrawLine(LineParams::from_params(params)?),
            OperationKind::Multiply => Self::Multiply(CompositeParams::from_params(params)?),
            OperationKind::Screen => Self::Screen(CompositeParams::from_params(params)?),
            OperationKind::Overlay => Self::Overlay(CompositeParams::from_params(params)?),
            OperationKind::Blend => Self::Blend(BlendParams::from_params(params)?),
            OperationKind::Mask => Self::Mask(MaskParams::from_params(params)?),
            OperationKind::InvertMask => Self::InvertMask(MaskParams::from_params(params)?),
        };
        debug!(operation = %kind, "Parameters normalized");
        Ok(op)
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Binary(_) => OperationKind::Binary,
            Self::Grayscale => OperationKind::Grayscale,
            Self::Blank(_) => OperationKind::Blank,
            Self::Contour(_) => OperationKind::Contour,
            Self::Blur(_) => OperationKind::Blur,
            Self::Erode(_) => OperationKind::Erode,
            Self::Dilate(_) => OperationKind::Dilate,
            Self::Edge(_) => OperationKind::Edge,
            Self::DrawRect(_) => OperationKind::DrawRect,
            Self::DrawCircle(_) => OperationKind::DrawCircle,
            Self::DrawLine(_) => OperationKind::DrawLine,
            Self::Multiply(_) => OperationKind::Multiply,
            Self::Screen(_) => OperationKind::Screen,
            Self::Overlay(_) => OperationKind::Overlay,
            Self::Blend(_) => OperationKind::Blend,
            Self::Mask(_) => OperationKind::Mask,
            Self::InvertMask(_) => OperationKind::InvertMask,
        }
    }

    /// Run the transform on `input`. The input is never modified.
    #[instrument(skip(self, input), fields(operation = %self.kind()))]
    pub fn apply(&self, input: &PixelBuffer) -> Outcome {
        match self {
            Self::Binary(p) => Outcome::image(threshold::binary(input, p)),
            Self::Grayscale => Outcome::image(grayscale(input)),
            Self::Blank(p) => Outcome::image(blank(input, p)),
            Self::Contour(p) => {
                let set = contours::extract(input, p);
                Outcome {
                    buffer: set.canvas,
                    contours: Some(set.contours),
                }
            }
            Self::Blur(p) => Outcome::image(blur::gaussian_blur(input, p)),
            Self::Erode(p) => Outcome::image(morphology::erode(input, p)),
            Self::Dilate(p) => Outcome::image(morphology::dilate(input, p)),
            Self::Edge(p) => Outcome::image(edges::detect_edges(input, p)),
            Self::DrawRect(p) => Outcome::image(drawing::draw_rect(input, p)),
            Self::DrawCircle(p) => Outcome::image(drawing::draw_circle(input, p)),
            Self::DrawLine(p) => Outcome::image(drawing::draw_line(input, p)),
            Self::Multiply(p) => Outcome::image(composite::composite(input, p, BlendMode::Multiply)),
            Self::Screen(p) => Outcome::image(composite::composite(input, p, BlendMode::Screen)),
            Self::Overlay(p) => Outcome::image(composite::composite(input, p, BlendMode::Overlay)),
            Self::Blend(p) => Outcome::image(composite::blend(input, p)),
            Self::Mask(p) => Outcome::image(threshold::keep_mask(input, p, false)),
            Self::InvertMask(p) => Outcome::image(threshold::keep_mask(input, p, true)),
        }
    }
}

#[cfg(test)]
mod tests {
    use imgflow_core::error::ImgflowError;

    use super::*;

    #[test]
    fn parse_then_kind_is_stable_for_layerless_operations() {
        for kind in OperationKind::ALL.into_iter().filter(|k| !k.needs_layer()) {
            let op = Operation::parse(kind, &Params::new()).unwrap();
            assert_eq!(op.kind(), kind);
        }
    }

    #[test]
    fn layered_operations_require_image2() {
        for kind in OperationKind::ALL.into_iter().filter(OperationKind::needs_layer) {
            let err = Operation::parse(kind, &Params::new()).unwrap_err();
            assert!(matches!(err, ImgflowError::MissingLayer(_)), "{kind}: {err}");
        }
    }

    #[test]
    fn only_contour_reports_geometry() {
        let input = PixelBuffer::zeros(8, 8, 3);
        for kind in OperationKind::ALL.into_iter().filter(|k| !k.needs_layer()) {
            let outcome = Operation::parse(kind, &Params::new()).unwrap().apply(&input);
            assert_eq!(
                outcome.contours.is_some(),
                kind == OperationKind::Contour,
                "{kind}"
            );
        }
    }
}
