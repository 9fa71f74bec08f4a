// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transport-independent pipeline from request to response.

use imgflow_core::error::{ImgflowError, Result};
use imgflow_core::types::{ErrorClass, OperationKind, OperationRequest, Params, ProcessResponse};
use tracing::{error, info, instrument, warn};

use crate::buffer::PixelBuffer;
use crate::codec;
use crate::dispatch::{Operation, Outcome};
use crate::response;

/// Pure core: normalize `params` for `kind` and run it on `primary`.
pub fn run(kind: OperationKind, params: &Params, primary: &PixelBuffer) -> Result<Outcome> {
    let operation = Operation::parse(kind, params)?;
    Ok(operation.apply(primary))
}

/// Validate, decode, run and assemble one request.
///
/// Checks happen in a fixed order: operation name present, operation known,
/// image present, parameters valid (including the secondary layer). Only
/// then is any pixel work done.
#[instrument(skip(request), fields(operation = %request.operation, params = request.params.len()))]
pub fn process(request: &OperationRequest) -> Result<ProcessResponse> {
    let outcome = execute(request);
    match &outcome {
        Ok(_) => info!("Request processed"),
        Err(err) => match err.class() {
            ErrorClass::Client => warn!(error = %err, "Request rejected"),
            ErrorClass::Server => error!(error = %err, "Request failed"),
        },
    }
    outcome
}

fn execute(request: &OperationRequest) -> Result<ProcessResponse> {
    let name = request.operation.trim();
    if name.is_empty() {
        return Err(ImgflowError::InvalidRequest("operation type is empty".into()));
    }
    let kind: OperationKind = name.parse()?;

    if request.image.trim().is_empty() {
        return Err(ImgflowError::Decode("no image data supplied".into()));
    }
    let operation = Operation::parse(kind, &request.params)?;
    let primary = codec::decode(&request.image)?;

    response::assemble(operation.apply(&primary))
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use imgflow_core::types::ParamValue;

    use super::*;
    use crate::params::LAYER_KEY;

    fn photo(w: u32, h: u32) -> PixelBuffer {
        PixelBuffer::Color(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 9) as u8, (y * 11) as u8, ((x ^ y) * 7) as u8])
        }))
    }

    fn uri(buf: &PixelBuffer) -> String {
        codec::encode(buf).unwrap()
    }

    fn request(op: &str, image: &PixelBuffer, params: Params) -> OperationRequest {
        OperationRequest::new(op, uri(image), params)
    }

    fn flat(w: u32, h: u32, v: u8) -> PixelBuffer {
        PixelBuffer::Color(RgbImage::from_pixel(w, h, Rgb([v, v, v])))
    }

    fn decode_result(resp: &ProcessResponse) -> PixelBuffer {
        codec::decode(&resp.result).unwrap()
    }

    #[test]
    fn every_operation_preserves_shape_through_the_codec() {
        let input = photo(24, 16);
        let layer = uri(&photo(10, 10));
        for kind in OperationKind::ALL {
            let mut params = Params::new();
            if kind.needs_layer() {
                params.insert(LAYER_KEY, layer.as_str());
            }
            let resp = process(&request(kind.name(), &input, params)).unwrap();
            let out = if kind == OperationKind::Contour {
                codec::decode(&resp.contour_payload().unwrap().image).unwrap()
            } else {
                decode_result(&resp)
            };
            assert_eq!(out.dimensions(), (24, 16), "{kind}");
        }
    }

    #[test]
    fn kernel_size_is_rounded_up_to_odd() {
        // A 4 is run as a 5: a single dot dilates into a 5x5 block.
        let mut dot = GrayImage::new(11, 11);
        dot.put_pixel(5, 5, Luma([255]));
        let input = PixelBuffer::Gray(dot);
        let outcome = run(
            OperationKind::Dilate,
            &Params::new().with("kernelSize", 4),
            &input,
        )
        .unwrap();
        let lit = outcome.buffer.as_raw().iter().filter(|&&v| v == 255).count();
        assert_eq!(lit, 25);
    }

    #[test]
    fn binary_output_splits_at_threshold() {
        let ramp = PixelBuffer::Gray(GrayImage::from_fn(256, 1, |x, _| Luma([x as u8])));
        let params = Params::new().with("threshold", 90).with("maxValue", 200);
        let out = run(OperationKind::Binary, &params, &ramp).unwrap().buffer;
        for (x, &v) in out.as_raw().iter().enumerate() {
            assert_eq!(v, if x > 90 { 200 } else { 0 }, "x = {x}");
        }
    }

    #[test]
    fn blend_ratio_endpoints() {
        let primary = photo(12, 8);
        let secondary = photo(6, 4);
        let at = |ratio: f64| {
            let params = Params::new()
                .with(LAYER_KEY, uri(&secondary))
                .with("ratio", ratio);
            decode_result(&process(&request("blend", &primary, params)).unwrap())
        };
        assert_eq!(at(0.0), primary);

        let resized = PixelBuffer::Color(image::imageops::resize(
            &secondary.to_color(),
            12,
            8,
            image::imageops::FilterType::Triangle,
        ));
        assert_eq!(at(1.0), resized);
    }

    #[test]
    fn overlay_of_mid_gray_stays_mid_gray() {
        let gray = flat(6, 6, 128);
        let params = Params::new().with(LAYER_KEY, uri(&gray)).with("opacity", 1.0);
        let out = decode_result(&process(&request("overlay", &gray, params)).unwrap());
        assert!(out.as_raw().iter().all(|&v| (127..=129).contains(&v)));
    }

    #[test]
    fn contour_filter_keeps_only_in_range_squares() {
        // Square of side 21 traces to a 20x20 polygon (400); side 51 gives 2500.
        let img = RgbImage::from_fn(120, 80, |x, y| {
            let small = (10..31).contains(&x) && (10..31).contains(&y);
            let large = (50..101).contains(&x) && (10..61).contains(&y);
            if small || large { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
        });
        let params = Params::new().with("minArea", 100).with("maxArea", 1000);
        let resp = process(&request("contour", &PixelBuffer::Color(img), params)).unwrap();
        let payload = resp.contour_payload().unwrap();
        assert_eq!(payload.contours_count, 1);
        assert_eq!(payload.contours.len(), 1);
        assert!((payload.contours[0].area - 400.0).abs() < 1.0);
    }

    #[test]
    fn unknown_operation_is_a_client_error() {
        let err = process(&request("sharpen-xyz", &photo(4, 4), Params::new())).unwrap_err();
        assert!(matches!(err, ImgflowError::UnsupportedOperation(ref n) if n == "sharpen-xyz"));
        assert_eq!(err.class(), ErrorClass::Client);
    }

    #[test]
    fn multiply_without_layer_is_missing_layer() {
        let err = process(&request("multiply", &photo(4, 4), Params::new())).unwrap_err();
        assert!(matches!(err, ImgflowError::MissingLayer(_)));
        assert_eq!(err.class(), ErrorClass::Client);
    }

    #[test]
    fn empty_image_is_a_client_decode_error() {
        let req = OperationRequest::new("grayscale", "", Params::new());
        let err = process(&req).unwrap_err();
        assert!(matches!(err, ImgflowError::Decode(_)));
        assert_eq!(err.class(), ErrorClass::Client);
    }

    #[test]
    fn validation_order_is_type_then_image_then_params() {
        let err = process(&OperationRequest::new("", "", Params::new())).unwrap_err();
        assert!(matches!(err, ImgflowError::InvalidRequest(_)));

        let err = process(&OperationRequest::new("nope", "", Params::new())).unwrap_err();
        assert!(matches!(err, ImgflowError::UnsupportedOperation(_)));

        let err = process(&OperationRequest::new("multiply", "", Params::new())).unwrap_err();
        assert!(matches!(err, ImgflowError::Decode(_)));
    }

    #[test]
    fn malformed_enum_string_falls_back_instead_of_failing() {
        let params = Params::new().with("borderType", "BORDER_NONSENSE");
        let fallback = run(OperationKind::Blur, &params, &photo(9, 9)).unwrap();
        let default = run(OperationKind::Blur, &Params::new(), &photo(9, 9)).unwrap();
        assert_eq!(fallback, default);
    }

    #[test]
    fn structurally_bad_parameter_is_rejected() {
        let mut params = Params::new();
        params.insert("kernelSize", ParamValue::Point { x: 1.0, y: 2.0 });
        let err = run(OperationKind::Blur, &params, &photo(4, 4)).unwrap_err();
        assert!(matches!(err, ImgflowError::InvalidParameter { .. }));
    }

    #[test]
    fn input_buffer_is_not_mutated() {
        let input = photo(10, 10);
        let before = input.clone();
        let params = Params::new().with("filled", true);
        let _ = run(OperationKind::DrawRect, &params, &input).unwrap();
        assert_eq!(input, before);
    }
}
