// Scancam probe: headless diagnostics for the scanning engine.
//
// list-devices     enumerate cameras visible to the capture backend
// authorization    report camera permission state
// scan-demo        run the scan pipeline on synthetic frames until capture

use anyhow::{Context, Result};
use scancam::config::ScancamConfig;
use scancam::device::{DeviceProvider, NokhwaProvider};
use scancam::permissions::{Authorization, SystemAuthorization};
use scancam::scan::detector::DetectionError;
use scancam::scanner::DocumentScanner;
use scancam::testing::{shifted_corners, synthetic_frame, FakeAuthorization, FakeProvider, ScriptedDetector};
use scancam::types::ScanMode;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

fn main() -> Result<()> {
    scancam::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: scancam-probe <list-devices|authorization|scan-demo> [--json]");
        std::process::exit(1);
    }

    match args[1].as_str() {
        "list-devices" => cmd_list_devices(&args),
        "authorization" => cmd_authorization(&args),
        "scan-demo" => cmd_scan_demo(),
        other => {
            eprintln!("Unknown command: {}", other);
            std::process::exit(1);
        }
    }
}

fn cmd_list_devices(args: &[String]) -> Result<()> {
    let provider = NokhwaProvider::new(ScancamConfig::load_or_default().camera);
    let devices = provider
        .list_devices()
        .context("enumerating capture devices")?;

    if args.contains(&"--json".to_string()) {
        println!("{}", serde_json::to_string(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No cameras found");
        return Ok(());
    }
    for device in devices {
        let position = device
            .position
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("{}: {} (facing: {})", device.id, device.name, position);
    }
    Ok(())
}

fn cmd_authorization(args: &[String]) -> Result<()> {
    let info = SystemAuthorization::new().info();

    if args.contains(&"--json".to_string()) {
        println!("{}", serde_json::to_string(&info)?);
        return Ok(());
    }

    println!("Status:      {}", info.status);
    println!("Details:     {}", info.message);
    println!("Can request: {}", info.can_request);
    Ok(())
}

/// Drive the full pipeline on synthetic frames with a scripted detector:
/// a held document with sub-threshold jitter that triggers auto-capture.
fn cmd_scan_demo() -> Result<()> {
    println!("📄 Scancam synthetic scan demo");
    println!("==============================");

    let runtime = tokio::runtime::Runtime::new().context("creating tokio runtime")?;

    let keep_running = Arc::new(AtomicBool::new(true));
    let ctrlc_flag = Arc::clone(&keep_running);
    ctrlc::set_handler(move || {
        println!("\nInterrupted; shutting down");
        ctrlc_flag.store(false, Ordering::SeqCst);
    })
    .context("installing Ctrl-C handler")?;

    runtime.block_on(async move {
        // Sub-threshold jitter for 40 frames, then nothing.
        let mut outcomes: Vec<Result<_, DetectionError>> = Vec::new();
        for i in 0..40 {
            let jitter = (i % 3) as f32 * 0.004;
            outcomes.push(Ok(Some(shifted_corners(jitter, 0.0))));
        }
        let detector = Arc::new(ScriptedDetector::new(outcomes));

        let provider = FakeProvider::with_back_camera();
        let camera = provider
            .back_camera()
            .context("demo provider has no camera")?;

        let scanner = DocumentScanner::new(
            Arc::new(provider),
            Arc::new(FakeAuthorization::granted()),
            detector,
            &ScancamConfig::default(),
        );

        let mut states = scanner.subscribe();
        tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let s = states.borrow().clone();
                println!(
                    "  state: mode={} stable={} corners={}",
                    s.document_scanning_mode,
                    s.is_document_stable,
                    if s.detected_corners.is_some() { "yes" } else { "no" }
                );
            }
        });

        scanner.request_authorization().await;
        scanner
            .start_session()
            .await
            .context("starting capture session")?;
        println!("📷 Session running on fake back camera");

        let (captured_tx, captured_rx) = mpsc::channel();
        scanner
            .start_document_scanning(move |image| {
                let _ = captured_tx.send(image);
            })
            .await
            .context("starting document scanning")?;
        println!("🔍 Scanning; emitting synthetic frames at ~30fps");

        let mut frame_number = 0u64;
        loop {
            if !keep_running.load(Ordering::SeqCst) {
                break;
            }
            if let Ok(image) = captured_rx.try_recv() {
                println!(
                    "✅ Auto-captured document {} ({}x{}, {} bytes)",
                    image.id,
                    image.width,
                    image.height,
                    image.size_bytes()
                );
                break;
            }
            if scanner.scanning_mode() == ScanMode::Captured {
                break;
            }

            camera.emit_frame(synthetic_frame(frame_number, 320, 240));
            frame_number += 1;
            tokio::time::sleep(Duration::from_millis(33)).await;
        }

        println!(
            "Frames emitted: {}, dropped by backpressure: {}",
            frame_number,
            scanner.frames_dropped()
        );

        scanner.stop_document_scanning();
        scanner.stop_session().await;
        println!("Session stopped");
        Ok(())
    })
}
