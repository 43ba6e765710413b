// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the overlay editor: a single amount edit on the
// invoice fixture, and one edit per page on a longer document.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use retouch_core::config::OverlayConfig;
use retouch_core::types::{Edit, NoEmbeddedFonts, Rect, Rgb, StyleFlags};
use retouch_document::OverlayEditor;
use retouch_document::pdf::fixtures;

fn edit(page: usize, rect: Rect, text: &str) -> Edit {
    Edit {
        page,
        rect,
        new_text: text.to_string(),
        font: "Helvetica".into(),
        font_size: 11.0,
        color: Rgb::BLACK,
        style: StyleFlags::empty(),
        baseline: None,
    }
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_single_edit(c: &mut Criterion) {
    let document = fixtures::invoice();
    let edits = [edit(0, fixtures::INVOICE_AMOUNT, "36500001")];
    let editor = OverlayEditor::new(&NoEmbeddedFonts, OverlayConfig::default());

    c.bench_function("overlay_apply (1 edit)", |b| {
        b.iter(|| black_box(editor.apply(black_box(&document), &edits)));
    });
}

/// One edit on each of 20 pages, so the per-page isolation and font
/// registration run once per page.
fn bench_edit_per_page(c: &mut Criterion) {
    let document = fixtures::multi_page(20);
    let edits: Vec<Edit> = (0..20)
        .map(|page| edit(page, Rect::new(72.0, 60.0, 200.0, 75.0), "Replaced heading"))
        .collect();
    let editor = OverlayEditor::new(&NoEmbeddedFonts, OverlayConfig::default());

    c.bench_function("overlay_apply (20 pages)", |b| {
        b.iter(|| black_box(editor.apply(black_box(&document), &edits)));
    });
}

criterion_group!(benches, bench_single_edit, bench_edit_per_page);
criterion_main!(benches);
