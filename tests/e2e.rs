//! End-to-end tests against the live generative API.
//!
//! These make real network calls and need a valid key. They are gated behind
//! the `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 GEMINI_API_KEY=... cargo test --test e2e -- --nocapture
//!
//! Point `E2E_IMAGE` at a real scan to test with it; otherwise a synthetic
//! trace is generated.

use image::{ImageFormat, Rgb, RgbImage};
use scanreport::{
    analyze_file, parse, write_document, AnalysisConfig, ImageAsset, ReportBlock, RequestOrchestrator,
    Session,
};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("target/e2e-output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test unless E2E_ENABLED and an API key are both set.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        match AnalysisConfig::from_env() {
            Ok(c) => c,
            Err(e) => {
                println!("SKIP — {e}");
                return;
            }
        }
    }};
}

/// A grid with a sawtooth trace, loosely resembling an ECG strip.
fn synthetic_trace() -> Vec<u8> {
    let (w, h) = (600u32, 200u32);
    let mut img = RgbImage::from_pixel(w, h, Rgb([255, 240, 240]));
    for x in 0..w {
        for y in 0..h {
            if x % 20 == 0 || y % 20 == 0 {
                img.put_pixel(x, y, Rgb([240, 180, 180]));
            }
        }
        let phase = x % 100;
        let y = match phase {
            40..=44 => 100 - (phase - 39) * 15,
            45..=49 => 25 + (phase - 44) * 20,
            _ => 100,
        };
        img.put_pixel(x, y.min(h - 1), Rgb([0, 0, 0]));
    }
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn test_image() -> ImageAsset {
    match std::env::var("E2E_IMAGE") {
        Ok(path) => ImageAsset::from_path(path).unwrap(),
        Err(_) => ImageAsset::from_bytes(synthetic_trace())
            .unwrap()
            .with_name("synthetic_ecg.png"),
    }
}

/// Assert the report passes basic quality checks.
fn assert_report_quality(text: &str, blocks: &[ReportBlock]) {
    assert!(!text.trim().is_empty(), "Response text is empty");
    assert!(!blocks.is_empty(), "No blocks transcribed");
    assert_eq!(blocks, parse(text).as_slice(), "Blocks must be parse(text)");
    for block in blocks {
        assert_eq!(block.text(), block.text().trim(), "Block text not trimmed");
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_live_analysis_and_export() {
    let config = e2e_skip_unless_ready!();

    let orchestrator = Arc::new(RequestOrchestrator::new(config).unwrap());
    let mut session = Session::new(orchestrator);
    session.upload(test_image());

    let result = session.analyze().await.unwrap().clone();
    assert!(result.is_success(), "analysis failed: {:?}", result.error);
    println!("── {} chars in {}ms", result.text.len(), result.duration_ms);

    let report = session.report().unwrap();
    assert_report_quality(&result.text, report.blocks());

    let headings = report
        .blocks()
        .iter()
        .filter(|b| matches!(b, ReportBlock::Heading { .. }))
        .count();
    println!("── {} blocks, {} headings", report.blocks().len(), headings);

    let doc = session.export_docx().unwrap();
    let out = output_dir().join(&doc.filename);
    write_document(&out, &doc.bytes).unwrap();
    println!("── wrote {}", out.display());

    // Second call is served from memory.
    let again = session.analyze().await.unwrap();
    assert!(again.from_cache);
}

#[tokio::test]
async fn test_live_analyze_file() {
    let config = e2e_skip_unless_ready!();

    let path = output_dir().join("e2e_input.png");
    std::fs::write(&path, synthetic_trace()).unwrap();

    let outcome = analyze_file(&path, &config).await.unwrap();
    assert!(outcome.result.is_success(), "analysis failed: {:?}", outcome.result.error);
    assert!(outcome.document.unwrap().bytes.starts_with(b"PK"));
}
