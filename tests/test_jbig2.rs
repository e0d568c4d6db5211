//! JBIG2 region coding through the public API.

use std::cell::Cell;

use pdf_creator::jbig2::{
    ArithDecoder, ArithEncoder, ComposeOp, DecodeStatus, GenericRegionDecoder, GenericRegionEncoder,
    GenericRegionParams, HalftoneParams, HalftoneRegionDecoder, Image, RefinementParams, RefinementRegionDecoder,
};

/// Scanned-page lookalike: blocks of "text" lines separated by blank rows.
fn page(width: u32, height: u32) -> Image {
    let mut image = Image::new(width, height);
    let mut seed: u32 = 7;
    for y in 0..height as i32 {
        if y % 10 >= 7 {
            continue;
        }
        for x in 4..width as i32 - 4 {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            if seed >> 30 == 0 {
                image.set_pixel(x, y, 1);
            }
        }
    }
    image
}

fn decode(params: &GenericRegionParams, data: &[u8], fast: bool) -> Image {
    let mut decoder = GenericRegionDecoder::new(params.clone()).with_fast_path(fast);
    let mut contexts = params.new_contexts();
    let mut arith = ArithDecoder::new(data);
    decoder.decode_arith(&mut arith, &mut contexts).unwrap()
}

#[test]
fn test_every_template_round_trips() {
    let image = page(203, 61);
    for template in 0..4 {
        for tpgdon in [false, true] {
            let params = GenericRegionParams::new(203, 61, template).with_tpgdon(tpgdon);
            let data = GenericRegionEncoder::new(params.clone()).encode(&image).unwrap();
            let fast = decode(&params, &data, true);
            let slow = decode(&params, &data, false);
            assert_eq!(fast, image, "template {} tpgdon {}", template, tpgdon);
            assert_eq!(fast, slow, "template {} tpgdon {}", template, tpgdon);
        }
    }
}

#[test]
fn test_progressive_matches_one_shot() {
    let image = page(96, 80);
    let params = GenericRegionParams::new(96, 80, 1).with_tpgdon(true);
    let data = GenericRegionEncoder::new(params.clone()).encode(&image).unwrap();

    let rows = Cell::new(0);
    let pause = || {
        rows.set(rows.get() + 1);
        rows.get() % 5 == 0
    };
    let mut decoder = GenericRegionDecoder::new(params.clone());
    let mut contexts = params.new_contexts();
    let mut arith = ArithDecoder::new(&data);
    let mut status = decoder.start_decode_arith(&mut arith, &mut contexts, Some(&pause));
    let mut pauses = 0;
    while status == DecodeStatus::ToBeContinued {
        pauses += 1;
        // Rows decoded so far are final.
        let rect = decoder.replace_rect();
        assert!(rect.bottom <= 80);
        status = decoder.continue_decode(&mut arith, &mut contexts, Some(&pause));
    }
    assert_eq!(status, DecodeStatus::Finished);
    assert!(pauses >= 10);
    assert_eq!(decoder.take_image().unwrap(), image);
}

#[test]
fn test_oversized_region_is_empty() {
    let params = GenericRegionParams::new(70_000, 4, 0);
    let image = decode(&params, &[0x00, 0x00], true);
    assert!(!image.has_data());
}

#[test]
fn test_garbage_never_panics() {
    let data: Vec<u8> = (0..64u32).map(|i| (i.wrapping_mul(97) >> 1) as u8).collect();
    for template in 0..4 {
        let params = GenericRegionParams::new(40, 40, template).with_tpgdon(true);
        let mut decoder = GenericRegionDecoder::new(params.clone());
        let mut contexts = params.new_contexts();
        let mut arith = ArithDecoder::new(&data);
        let _ = decoder.decode_arith(&mut arith, &mut contexts);
    }

    let reference = page(30, 20);
    let params = RefinementParams::new(30, 20, 0).with_tpgron(true);
    let mut contexts = params.new_contexts();
    let mut arith = ArithDecoder::new(&data);
    let _ = RefinementRegionDecoder::new(params).decode(&reference, &mut arith, &mut contexts);
}

#[test]
fn test_halftone_region() {
    // Two 2x2 patterns: blank and solid.
    let blank = Image::new(2, 2);
    let mut solid = Image::new(2, 2);
    solid.fill(true);

    let params = HalftoneParams {
        width: 8,
        height: 2,
        mmr: false,
        template: 0,
        enable_skip: false,
        combine_op: ComposeOp::Or,
        default_pixel: false,
        grid_width: 4,
        grid_height: 1,
        grid_x: 0,
        grid_y: 0,
        grid_vector_x: 2 * 256,
        grid_vector_y: 0,
    };
    // One gray plane selecting solid, blank, solid, solid.
    let mut plane = Image::new(4, 1);
    for x in [0, 2, 3] {
        plane.set_pixel(x, 0, 1);
    }
    let plane_params = GenericRegionParams::new(4, 1, 0);
    let mut encoder = ArithEncoder::new();
    let mut contexts = plane_params.new_contexts();
    GenericRegionEncoder::new(plane_params.clone())
        .encode_into(&plane, &mut encoder, &mut contexts)
        .unwrap();
    let data = encoder.finish();

    let decoder = HalftoneRegionDecoder::new(params, vec![blank, solid]);
    let mut contexts = plane_params.new_contexts();
    let mut arith = ArithDecoder::new(&data);
    let region = decoder.decode_arith(&mut arith, &mut contexts, None).unwrap();
    assert_eq!(region.count_ones(), 12);
    assert_eq!(region.get_pixel(2, 0), 0);
    assert_eq!(region.get_pixel(4, 1), 1);
}
