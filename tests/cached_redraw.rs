mod common;

use std::rc::Rc;

use embedded_graphics_core::{draw_target::DrawTarget, pixelcolor::{Gray2, GrayColor}};
use test_log::test;

use common::*;
use pulp_image::ImageError;
use pulp_image::formats::RenderConfig;
use pulp_image::formats::pixel_cache::{CacheHeader, HEADER_LEN, render_cached};

#[test]
fn decode_writes_cache_that_redraws_identically() {
    let storage = MemStorage::default();
    storage.put("IMG/PIC.JPG", FakeImage::new(800, 600, Pattern::Ramp).encode());
    let stats = Rc::new(EngineStats::default());

    let cfg = RenderConfig {
        x: 30,
        y: 40,
        max_width: 400,
        max_height: 300,
        dithering: true,
        cache_path: Some("_PULP/PIC.PXC"),
        ..Default::default()
    };
    let mut fb = screen();
    let summary = converter(&storage, PLENTY, &stats)
        .decode_to_framebuffer("IMG/PIC.JPG", &mut fb, &cfg)
        .unwrap();
    assert!(summary.cache_written);

    let file = storage.get("_PULP/PIC.PXC").unwrap();
    assert_eq!(file.len(), HEADER_LEN + 100 * 300);
    let mut raw = [0u8; HEADER_LEN];
    raw.copy_from_slice(&file[..HEADER_LEN]);
    assert_eq!(
        CacheHeader::decode(&raw),
        CacheHeader {
            width: 400,
            height: 300,
            origin_x: 30,
            origin_y: 40,
        }
    );

    let mut redraw = screen();
    redraw.clear(Gray2::BLACK).unwrap();
    let header = render_cached(&storage, "_PULP/PIC.PXC", &mut redraw).unwrap();
    assert_eq!((header.width, header.height), (400, 300));
    assert_eq!(storage.open_handles.get(), 0);

    for y in 40..340 {
        for x in 30..430 {
            assert_eq!(redraw.level(x, y), fb.level(x, y), "pixel {},{}", x, y);
        }
    }
    // nothing drawn outside the recorded rectangle
    assert_eq!(redraw.level(29, 40), Some(0));
    assert_eq!(redraw.level(430, 339), Some(0));
}

#[test]
fn clipped_output_still_caches_full_rectangle() {
    let storage = MemStorage::default();
    storage.put("PIC.JPG", FakeImage::new(64, 64, Pattern::Flat(0)).encode());
    let stats = Rc::new(EngineStats::default());

    let cfg = RenderConfig {
        x: 780,
        y: 0,
        cache_path: Some("PIC.PXC"),
        ..Default::default()
    };
    let mut fb = screen();
    converter(&storage, PLENTY, &stats)
        .decode_to_framebuffer("PIC.JPG", &mut fb, &cfg)
        .unwrap();

    let file = storage.get("PIC.PXC").unwrap();
    // 64 px -> 16 bytes per row; the 44 off-screen columns stay white
    assert_eq!(file.len(), HEADER_LEN + 16 * 64);
    let row0 = &file[HEADER_LEN..HEADER_LEN + 16];
    assert!(row0[..5].iter().all(|&b| b == 0x00));
    assert!(row0[5..].iter().all(|&b| b == 0xFF));
}

#[test]
fn failed_cache_append_leaves_no_file() {
    let storage = MemStorage::default();
    storage.put("IMG/PIC.JPG", FakeImage::new(64, 64, Pattern::Flat(0)).encode());
    storage.fail_appends.set(true);
    let stats = Rc::new(EngineStats::default());

    let cfg = RenderConfig {
        cache_path: Some("_PULP/BOOK/P1.PXC"),
        ..Default::default()
    };
    let mut fb = screen();
    let summary = converter(&storage, PLENTY, &stats)
        .decode_to_framebuffer("IMG/PIC.JPG", &mut fb, &cfg)
        .unwrap();

    assert!(!summary.cache_written);
    assert!(storage.get("_PULP/BOOK/P1.PXC").is_none());
    assert_eq!(fb.level(63, 63), Some(0));
}

#[test]
fn off_screen_cache_redraws_nothing() {
    let storage = MemStorage::default();
    storage.put("PIC.JPG", FakeImage::new(64, 64, Pattern::Flat(0)).encode());
    let stats = Rc::new(EngineStats::default());

    for (x, y) in [(i32::MAX, 0), (0, i32::MAX), (i32::MIN, i32::MIN)] {
        let cfg = RenderConfig {
            x,
            y,
            cache_path: Some("PIC.PXC"),
            ..Default::default()
        };
        let mut fb = screen();
        let summary = converter(&storage, PLENTY, &stats)
            .decode_to_framebuffer("PIC.JPG", &mut fb, &cfg)
            .unwrap();
        assert!(summary.cache_written);

        let mut redraw = screen();
        redraw.clear(Gray2::BLACK).unwrap();
        let header = render_cached(&storage, "PIC.PXC", &mut redraw).unwrap();
        assert_eq!((header.origin_x, header.origin_y), (x, y));
        assert!(redraw.data().iter().all(|&b| b == 0x00), "origin {},{}", x, y);
    }
}

#[test]
fn missing_cache_is_open_failed() {
    let storage = MemStorage::default();
    let mut fb = screen();
    assert_eq!(
        render_cached(&storage, "NONE.PXC", &mut fb),
        Err(ImageError::OpenFailed)
    );
}

#[test]
fn truncated_or_empty_cache_is_rejected() {
    let storage = MemStorage::default();
    let header = CacheHeader {
        width: 10,
        height: 10,
        origin_x: 0,
        origin_y: 0,
    };
    let mut short = header.encode().to_vec();
    short.extend_from_slice(&[0u8; 29]);
    storage.put("SHORT.PXC", short);

    let empty = CacheHeader {
        width: 0,
        height: 10,
        origin_x: 0,
        origin_y: 0,
    };
    storage.put("EMPTY.PXC", empty.encode().to_vec());
    storage.put("TINY.PXC", vec![1, 2, 3]);

    let mut fb = screen();
    for path in ["SHORT.PXC", "EMPTY.PXC", "TINY.PXC"] {
        assert_eq!(
            render_cached(&storage, path, &mut fb),
            Err(ImageError::DecodeFailed),
            "{}",
            path
        );
        assert_eq!(storage.open_handles.get(), 0);
    }
    assert!(fb.data().iter().all(|&b| b == 0xFF));
}
