use linearblock::avgstd::AvgStd;
use linearblock::benchmark::Stats;
use linearblock::cancel::CancelToken;
use linearblock::gce;
use linearblock::hamming;
use linearblock::linearblock::LinearBlock;
use linearblock::simulation::{self, DecoderKind, SimulationStats};
use linearblock::sparse::SparseVector;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::env;
use std::fs;
use uuid::Uuid;

fn assert_serde_identical(block: &LinearBlock) {
    let bytes = block.to_bytes().unwrap();
    let restored = LinearBlock::from_bytes(&bytes).unwrap();
    assert_eq!(&restored, block);
    assert!(restored.validate());

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(101);
    let k = block.message_length();
    for _ in 0..1000 {
        let bits: Vec<u8> = (0..k).map(|_| rng.gen_range(0..2)).collect();
        let message = SparseVector::from_bits(&bits);
        let codeword = block.encode(&message);
        assert_eq!(restored.encode(&message), codeword);
        assert_eq!(restored.decode(&codeword), message);
    }
}

#[test]
fn hamming_code_round_trips_through_bytes() {
    let block = hamming::new(&CancelToken::new(), 4, 0).unwrap();
    assert_serde_identical(&block);
}

#[test]
fn gce_code_round_trips_through_bytes() {
    let block = gce::search(&CancelToken::new(), 6, 12, 6, 3, 1, true, None)
        .unwrap()
        .expect("small forced search must produce a code");
    assert_serde_identical(&block);
}

#[test]
fn result_files_resume_and_refuse_mismatches() {
    let block = hamming::new(&CancelToken::new(), 3, 0).unwrap();
    let path = env::temp_dir().join(format!("results-{}.json", Uuid::new_v4()));

    let mut results = SimulationStats::new(DecoderKind::BecPeeling, &block);
    let mut stats = Stats::default();
    for sample in [0.0, 0.0, 0.5, 0.0, 0.25] {
        stats.codeword_errors.update(sample);
    }
    results.set_stats(0.2, stats);
    simulation::save_results(&path, &results).unwrap();

    let loaded = simulation::load_results(&path).unwrap().unwrap();
    assert_eq!(loaded, results);
    let restored = loaded.stats_for(0.2).unwrap();
    assert_eq!(restored.codeword_errors.count, 5);
    assert!((restored.codeword_errors.mean - 0.15).abs() < 1e-12);
    assert!(loaded
        .validate_against(DecoderKind::BecPeeling, block.parity())
        .is_ok());
    assert!(loaded
        .validate_against(DecoderKind::BscGallager, block.parity())
        .is_err());

    fs::remove_file(&path).ok();
}

#[test]
fn avgstd_survives_serialization() {
    let mut agg = AvgStd::default();
    for sample in [0.1, 0.9, 0.4] {
        agg.update(sample);
    }
    let json = serde_json::to_string(&agg).unwrap();
    let back: AvgStd = serde_json::from_str(&json).unwrap();
    assert_eq!(agg, back);
    assert_eq!(back.count, 3);
}

#[test]
fn backup_is_created_before_overwriting() {
    let dir = env::temp_dir().join(format!("codes-{}", Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("code.json");
    let block = hamming::new(&CancelToken::new(), 3, 0).unwrap();

    simulation::save_code(&path, &block, false).unwrap();
    simulation::save_code(&path, &block, false).unwrap();
    let backups = fs::read_dir(&dir)
        .unwrap()
        .filter(|entry| {
            entry
                .as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .contains("backup")
        })
        .count();
    assert_eq!(backups, 1);

    fs::remove_dir_all(&dir).ok();
}
