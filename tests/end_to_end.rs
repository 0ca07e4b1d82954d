use eclosion_detector::core_modules::exporter;
use eclosion_detector::core_modules::utils::image_helper::image_helper;
use eclosion_detector::{DetectorConfig, EclosionPipeline, ImageStack, Report, SizeBounds};
use image::{GrayImage, Luma};
use std::sync::Arc;

const BACKGROUND: u8 = 200;

/// Three dark pupae on a bright plate. The 10x10 pupa ecloses between the third
/// and fourth frame, the 6x17 pupa stays put, and the 20x20 blob is too large.
fn plate_frames() -> Vec<GrayImage> {
    let eclosing = [50u8, 50, 50, 62, 61, 60];
    eclosing
        .iter()
        .map(|&value| {
            let mut image = GrayImage::from_pixel(80, 40, Luma([BACKGROUND]));
            fill(&mut image, 10, 10, 10, 10, value);
            fill(&mut image, 30, 10, 6, 17, 50);
            fill(&mut image, 50, 10, 20, 20, 40);
            image
        })
        .collect()
}

fn fill(image: &mut GrayImage, x: u32, y: u32, w: u32, h: u32, value: u8) {
    for yy in y..y + h {
        for xx in x..x + w {
            image.put_pixel(xx, yy, Luma([value]));
        }
    }
}

fn config() -> DetectorConfig {
    DetectorConfig {
        reference_frame: 1,
        block_start: 1,
        block_end: 6,
        snapshot_window: 1,
        snapshot_size: 16,
        ..DetectorConfig::default()
    }
}

#[test]
fn detects_the_single_eclosion_on_the_plate() {
    let stack = ImageStack::from_images("plate", plate_frames()).unwrap();
    let pipeline = EclosionPipeline::new(config()).unwrap();
    let report = pipeline.run(&stack).unwrap();

    let summary = match &report {
        Report::EclosionDetected(summary) => summary,
        other => panic!("expected an eclosion, got {other:?}"),
    };
    assert_eq!(summary.detection.candidates.len(), 3);
    assert_eq!(summary.detection.size_range.min_area, 51.0);
    assert_eq!(summary.detection.size_range.max_area, 204.0);
    assert_eq!(summary.detection.valid_ids, vec![1, 2]);
    assert_eq!(summary.analysis.analyzed, 2);

    let events = report.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].object_id, 1);
    assert_eq!(events[0].frame_nr, 4);
    assert_eq!((events[0].x, events[0].y), (15, 15));
    assert!(summary.analysis.rejected.is_empty());
}

#[test]
fn manual_bounds_can_admit_the_large_blob() {
    let stack = ImageStack::from_images("plate", plate_frames()).unwrap();
    let config = DetectorConfig {
        size_bounds: SizeBounds::Manual {
            min_area: 50.0,
            max_area: 500.0,
        },
        ..config()
    };
    let report = EclosionPipeline::new(config).unwrap().run(&stack).unwrap();
    let summary = report.summary().unwrap();
    assert_eq!(summary.detection.valid_ids, vec![1, 2, 3]);
    assert_eq!(report.events().len(), 1);
}

#[test]
fn stack_on_disk_produces_mosaic_and_csv() {
    let root = tempfile::tempdir().unwrap();
    let stack_dir = root.path().join("plate_A");
    std::fs::create_dir(&stack_dir).unwrap();
    for (i, frame) in plate_frames().iter().enumerate() {
        frame.save(stack_dir.join(format!("frame_{:03}.png", i + 1))).unwrap();
    }
    let output = root.path().join("out");
    std::fs::create_dir(&output).unwrap();

    let stack = image_helper::load_stack(&stack_dir).unwrap();
    assert_eq!(stack.title(), "plate_A");

    let pipeline = EclosionPipeline::new(config()).unwrap();
    let report = pipeline.run(&stack).unwrap();
    let artifacts = pipeline
        .write_artifacts(&report, &output, stack.title())
        .unwrap();

    let mosaic = artifacts.mosaic.unwrap();
    assert_eq!(mosaic, output.join("Hatching_new_plate_A.gif"));
    assert!(mosaic.is_file());

    let csv = artifacts.csv.unwrap();
    assert_eq!(csv, output.join("plate_A.csv"));
    let records = exporter::read_csv(std::fs::File::open(&csv).unwrap()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].frame_id, "frame_004.png");
    assert_eq!(records[0].frame_nr, 4);
    assert_eq!(records[0].pupa_id, 1);
    assert_eq!((records[0].x, records[0].y), (15, 15));
}

#[test]
fn quiet_plate_writes_nothing() {
    let frames = vec![plate_frames()[0].clone(); 6];
    let stack = ImageStack::from_images("quiet", frames).unwrap();
    let pipeline = EclosionPipeline::new(config()).unwrap();
    let report = pipeline.run(&stack).unwrap();
    assert!(matches!(report, Report::NoEclosionDetected(_)));

    let out = tempfile::tempdir().unwrap();
    let artifacts = pipeline.write_artifacts(&report, out.path(), "quiet").unwrap();
    assert!(artifacts.mosaic.is_none());
    assert!(artifacts.csv.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn parallel_run_agrees_with_sequential_run() {
    let stack = ImageStack::from_images("plate", plate_frames()).unwrap();
    let pipeline = EclosionPipeline::new(config()).unwrap();
    let sequential = pipeline.run(&stack).unwrap();
    let parallel = pipeline.run_parallel(Arc::new(stack), 2).await.unwrap();
    assert_eq!(parallel.events(), sequential.events());
}
