use image::{Rgb, RgbImage};

use crate::moderation::detectors::{
    AssetImage, CannabisColorDetector, CannabisColorParams, ClusteringDetector, ClusteringParams,
    Contour, Detector, DetectorError, Frame, Mask, ShapeDetector, ShapeParams,
    SkinExposureDetector, SkinExposureParams, TextureDetector, TextureParams, WhitePowderDetector,
    WhitePowderParams,
};

fn frame_of(image: &RgbImage) -> Frame {
    Frame::from_rgb(image, 512).expect("non-empty image")
}

fn score(detector: &dyn Detector, image: &RgbImage) -> f32 {
    let frame = frame_of(image);
    detector
        .score(&AssetImage {
            filename: "front.jpg",
            frame: &frame,
        })
        .expect("detector scores")
}

fn paint_disc(image: &mut RgbImage, cx: f64, cy: f64, radius: f64, colour: [u8; 3]) {
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let dx = f64::from(x) - cx;
        let dy = f64::from(y) - cy;
        if dx * dx + dy * dy <= radius * radius {
            *pixel = Rgb(colour);
        }
    }
}

#[test]
fn green_with_dried_brown_is_corroborated_vegetation() {
    let image = RgbImage::from_fn(64, 64, |x, _| {
        if x < 32 {
            Rgb([34, 139, 34])
        } else {
            Rgb([139, 69, 19])
        }
    });
    let detector = CannabisColorDetector::new(CannabisColorParams::default());
    assert_eq!(score(&detector, &image), 0.9);
}

#[test]
fn sparse_green_scores_proportionally() {
    let image = RgbImage::from_fn(100, 100, |x, _| {
        if x < 10 {
            Rgb([34, 139, 34])
        } else {
            Rgb([128, 128, 128])
        }
    });
    let detector = CannabisColorDetector::new(CannabisColorParams::default());
    let value = score(&detector, &image);
    assert!((value - 0.2).abs() < 1e-4, "score {value}");
}

#[test]
fn full_frame_skin_is_maximal_exposure() {
    let image = RgbImage::from_pixel(64, 64, Rgb([224, 172, 105]));
    let detector = SkinExposureDetector::new(SkinExposureParams::default());
    assert_eq!(score(&detector, &image), 1.0);
}

#[test]
fn scattered_skin_patches_on_vivid_blue_are_discounted() {
    let mut image = RgbImage::from_pixel(128, 128, Rgb([0, 0, 255]));
    for row in 0..6u32 {
        for column in 0..6u32 {
            for y in 0..10 {
                for x in 0..10 {
                    image.put_pixel(4 + column * 20 + x, 4 + row * 20 + y, Rgb([224, 172, 105]));
                }
            }
        }
    }
    let detector = SkinExposureDetector::new(SkinExposureParams::default());
    let value = score(&detector, &image);
    assert!(value < 0.05, "score {value}");
}

#[test]
fn little_skin_is_damped() {
    let image = RgbImage::from_fn(100, 100, |x, _| {
        if x < 10 {
            Rgb([224, 172, 105])
        } else {
            Rgb([128, 128, 128])
        }
    });
    let detector = SkinExposureDetector::new(SkinExposureParams::default());
    let value = score(&detector, &image);
    assert!((value - 0.03).abs() < 1e-4, "score {value}");
}

#[test]
fn two_large_skin_regions_on_a_neutral_backdrop_are_concentrated() {
    let mut image = RgbImage::from_pixel(100, 100, Rgb([200, 190, 150]));
    for left in [4u32, 54] {
        for y in 29..71 {
            for x in left..left + 42 {
                image.put_pixel(x, y, Rgb([224, 172, 105]));
            }
        }
    }
    let raw_ratio = 2.0 * 42.0 * 42.0 / 10_000.0;
    let detector = SkinExposureDetector::new(SkinExposureParams::default());
    let value = score(&detector, &image);
    assert!(value > raw_ratio, "score {value}");
    assert!(value > 0.9, "score {value}");
}

#[test]
fn striped_surfaces_excite_the_texture_bank() {
    let striped = RgbImage::from_fn(32, 32, |x, _| {
        if x % 4 < 2 {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    });
    let flat = RgbImage::from_pixel(32, 32, Rgb([90, 90, 90]));
    let detector = TextureDetector::new(TextureParams::default());

    assert!(score(&detector, &striped) > 0.01);
    assert_eq!(score(&detector, &flat), 0.0);
}

#[test]
fn white_surfaces_read_as_powder() {
    let image = RgbImage::from_pixel(32, 32, Rgb([250, 250, 250]));
    let detector = WhitePowderDetector::new(WhitePowderParams::default());
    assert_eq!(score(&detector, &image), 0.8);
}

#[test]
fn tall_narrow_silhouette_reads_as_a_bottle() {
    let mut mask = Mask::new(100, 200);
    for y in 20..170 {
        for x in 30..70 {
            mask.set(x, y, true);
        }
    }
    let contours = Contour::external(&mask, 100_000);
    assert_eq!(contours.len(), 1);

    let detector = ShapeDetector::new(ShapeParams::default());
    assert!((detector.score_contours(&contours) - 0.7).abs() < 1e-6);
}

#[test]
fn small_round_blobs_read_as_pills() {
    let mut image = RgbImage::from_pixel(60, 60, Rgb([0, 0, 0]));
    paint_disc(&mut image, 30.0, 30.0, 12.0, [255, 255, 255]);
    let frame = frame_of(&image);
    let mask = Mask::from_values(
        frame.width(),
        frame.height(),
        frame.gray().iter().map(|value| *value > 128),
    );
    let contours = Contour::external(&mask, 100_000);

    let detector = ShapeDetector::new(ShapeParams::default());
    assert!((detector.score_contours(&contours) - 0.2).abs() < 1e-6);
}

#[test]
fn evenly_spaced_dark_objects_cluster() {
    let mut image = RgbImage::from_pixel(128, 128, Rgb([220, 220, 220]));
    paint_disc(&mut image, 32.0, 32.0, 12.0, [40, 40, 40]);
    paint_disc(&mut image, 96.0, 32.0, 12.0, [40, 40, 40]);
    paint_disc(&mut image, 64.0, 87.0, 12.0, [40, 40, 40]);

    let detector = ClusteringDetector::new(ClusteringParams::default());
    let value = score(&detector, &image);
    assert!(value > 0.8, "score {value}");
}

#[test]
fn irregular_spacing_does_not_cluster() {
    let detector = ClusteringDetector::new(ClusteringParams::default());
    let value = detector
        .score_centroids(&[(0.0, 0.0), (1.0, 0.0), (100.0, 100.0)])
        .expect("distinct centroids");
    assert_eq!(value, 0.0);
}

#[test]
fn coincident_centroids_are_a_numeric_failure() {
    let detector = ClusteringDetector::new(ClusteringParams::default());
    assert!(matches!(
        detector.score_centroids(&[(5.0, 5.0), (5.0, 5.0), (5.0, 5.0)]),
        Err(DetectorError::Numeric(_))
    ));
}
