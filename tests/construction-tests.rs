use linearblock::cancel::CancelToken;
use linearblock::gallager;
use linearblock::gce;
use linearblock::girth::calculate_girth;
use linearblock::hamming;
use linearblock::linearblock::{systematic, LinearBlock};
use linearblock::rcj;
use linearblock::sparse::SparseVector;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

fn round_trips(block: &LinearBlock, rng: &mut Xoshiro256PlusPlus, messages: usize) {
    let k = block.message_length();
    for _ in 0..messages {
        let bits: Vec<u8> = (0..k).map(|_| rng.gen_range(0..2)).collect();
        let message = SparseVector::from_bits(&bits);
        let codeword = block.encode(&message);
        assert!(block.syndrome(&codeword).is_zero());
        assert_eq!(block.decode(&codeword), message);
    }
}

#[test]
fn gallager_search_produces_a_valid_code() {
    let cancel = CancelToken::new();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(31);
    let block = gallager::search(&cancel, 21, 3, 7, 4, 4000, 1, &mut rng)
        .unwrap()
        .expect("a (3,7) code of this size should be found quickly");
    assert_eq!(block.parity_symbols(), 21);
    assert_eq!(block.codeword_length(), 49);
    assert!(block.validate());
    round_trips(&block, &mut rng, 200);
}

#[test]
fn gallager_success_respects_the_cycle_floor() {
    let cancel = CancelToken::new();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(37);
    let girth = 6;
    if let Some(block) = gallager::search(&cancel, 24, 3, 4, girth, 5000, 1, &mut rng).unwrap() {
        assert!(block.validate());
        let found = calculate_girth(&cancel, block.parity(), 1);
        assert!(
            found.map_or(true, |g| g >= girth),
            "found a cycle of length {found:?} below the floor {girth}"
        );
    }
}

#[test]
fn gce_reaches_the_requested_girth() {
    let cancel = CancelToken::new();
    let girth = 22;
    let mut checkpoints = 0;
    let mut checkpoint = |_: &LinearBlock| checkpoints += 1;
    match gce::search(&cancel, 102, 204, girth, 1, 0, false, Some(&mut checkpoint)).unwrap() {
        Some(block) => {
            // An unforced success finished cleanly, so every extension kept
            // the girth target.
            assert!(checkpoints > 0);
            assert!(block.validate());
            if block.parity_symbols() == 102 {
                // Full rank: the stored parity matrix is the constructed graph.
                assert_eq!(calculate_girth(&cancel, block.parity(), 0), Some(girth));
            }
        }
        None => {
            // The clean search exhausted its budget; forcing must complete.
            let block = gce::search(&cancel, 102, 204, girth, 1, 0, true, None)
                .unwrap()
                .expect("forced search must produce a code");
            assert!(block.validate());
        }
    }
}

#[test]
fn gce_code_encodes_and_decodes() {
    let cancel = CancelToken::new();
    let block = gce::search(&cancel, 6, 12, 6, 3, 1, true, None)
        .unwrap()
        .expect("small forced search must produce a code");
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(41);
    round_trips(&block, &mut rng, 100);
}

#[test]
fn rcj_graph_becomes_a_valid_code() {
    let cancel = CancelToken::new();
    let graph = rcj::build(&cancel, 6, 8).unwrap();
    let h = graph.parity_check_matrix();
    let found = calculate_girth(&cancel, &h, 1);
    assert!(found.map_or(false, |g| g >= 6), "girth {found:?} below 6");
    let block = systematic(&cancel, &h, 0).unwrap();
    assert!(block.validate());
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(43);
    round_trips(&block, &mut rng, 50);
}

#[test]
fn hamming_codes_validate_and_round_trip() {
    let cancel = CancelToken::new();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(47);
    for parity in [3, 4, 5] {
        let block = hamming::new(&cancel, parity, 0).unwrap();
        assert_eq!(block.codeword_length(), (1 << parity) - 1);
        assert!(block.validate());
        round_trips(&block, &mut rng, 100);
    }
}
