//! Criterion benchmarks for recipe generation.
//!
//! Run with: `cargo bench`

use criterion::{criterion_group, criterion_main, Criterion};
use recipe_engine::catalog::MemoryCatalog;
use recipe_engine::ledger::Ledger;
use recipe_engine::prng::Pcg32;
use recipe_engine::rules::RuleBook;
use recipe_engine::types::{CatalogConventions, GenerationParams, StreamFallback};
use recipe_engine::walker::Walker;
use recipe_engine::Engine;

/// Eight layers of ten variants with a handful of leaves each, plus
/// skins, mouths, hands and head accessories so every rule fires.
fn synthetic_catalog() -> MemoryCatalog {
    let mut files = Vec::new();
    for skin in ["gold", "silver", "zombie", "tiger_zebra"] {
        files.push(format!("01_body/02_body_skins/body_skin_{skin}.png"));
        files.push(format!("03_head/head_skins/head_01_{skin}.png"));
    }
    for hat in ["hat", "crown", "devil", "bandana"] {
        files.push(format!("00_heads_assets/hats/head_gadget_{hat}.png"));
    }
    for extra in ["gadget_ears_cat", "gadget_earrings_ring", "gadget_earrings_peace"] {
        files.push(format!("09_head_gadget_plus_eyes/{extra}.png"));
    }
    for m in 1..=7 {
        files.push(format!("05_mouth/mouth_0{m}/mouth_0{m}.png"));
        files.push(format!("05_mouth/mouth_0{m}_gadget/mouth_0{m}_gadget_pipe.png"));
    }
    for h in 1..=7 {
        files.push(format!("07_hands/hand_{h}/hand_{h}.png"));
    }
    for e in 1..=12 {
        files.push(format!("04_eyes/eyes_{e}/eyes_{e}.png"));
        files.push(format!("06_eyelashes/eyelashes/eyelashes_eyes_{e}.png"));
    }
    files.push("06_eyelashes/eyelashes/eyelashes_no.png".into());
    for layer in 10..18 {
        for v in 0..10 {
            let rarity = match v {
                0 => "legendary_",
                1 | 2 => "epic_",
                3..=5 => "uncommon_",
                _ => "",
            };
            for leaf in 0..4 {
                files.push(format!("{layer}_layer/{rarity}variant_{v}/leaf_{leaf}.png"));
            }
        }
    }
    MemoryCatalog::with_files("program", files)
}

fn bench_single_walk(c: &mut Criterion) {
    let catalog = synthetic_catalog();
    let rules = RuleBook::standard().unwrap();
    let conventions = CatalogConventions::default();
    let walker = Walker::new(&catalog, &rules, &conventions, StreamFallback::Terminate);
    let mut seq = 0u64;
    c.bench_function("single_walk", |b| {
        b.iter(|| {
            seq += 1;
            walker.walk(&mut Pcg32::new(42, seq)).unwrap()
        })
    });
}

fn bench_unique_batch(c: &mut Criterion) {
    c.bench_function("unique_batch_100", |b| {
        b.iter(|| {
            let mut params = GenerationParams::new("/bench");
            params.seed = Some(42);
            let mut engine =
                Engine::with_parts(synthetic_catalog(), Ledger::default(), params).unwrap();
            for _ in 0..100 {
                engine.next_unique().unwrap();
            }
        })
    });
}

criterion_group!(benches, bench_single_walk, bench_unique_batch);
criterion_main!(benches);
