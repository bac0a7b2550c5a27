use linearblock::bec::{self, ErasureBit, Peeling};
use linearblock::cancel::CancelToken;
use linearblock::hamming;
use linearblock::harddecision::{bit_flipping, BitFlip, Dwbf, Gallager};
use linearblock::linearblock::systematic;
use linearblock::sparse::{SparseMatrix, SparseVector};

fn hamming_7_4_parity() -> SparseMatrix {
    SparseMatrix::from_dense(
        3,
        7,
        &[1, 0, 0, 1, 1, 1, 0, 0, 1, 0, 1, 1, 0, 1, 0, 0, 1, 0, 1, 1, 1],
    )
}

#[test]
fn single_flip_is_repaired_and_decoded() {
    let cancel = CancelToken::new();
    let block = systematic(&cancel, &hamming_7_4_parity(), 0).unwrap();
    assert_eq!(block.message_length(), 4);
    assert_eq!(block.codeword_length(), 7);

    let message = SparseVector::from_bits(&[1, 0, 1, 1]);
    let codeword = block.encode(&message);
    let mut received = codeword.clone();
    received.flip(2);
    assert!(!block.syndrome(&received).is_zero());

    let mut alg = Gallager::new(block.parity());
    let repaired = bit_flipping(&mut alg, block.parity(), &received, 20);
    assert_eq!(repaired, codeword);
    assert_eq!(block.decode(&repaired), message);
}

#[test]
fn gallager_repairs_every_single_flip_of_every_message() {
    let cancel = CancelToken::new();
    let block = hamming::new(&cancel, 3, 0).unwrap();
    for value in 0u32..16 {
        let message = SparseVector::from_bits(&[
            (value & 1) as u8,
            ((value >> 1) & 1) as u8,
            ((value >> 2) & 1) as u8,
            ((value >> 3) & 1) as u8,
        ]);
        let codeword = block.encode(&message);
        for flipped in 0..block.codeword_length() {
            let mut alg = Gallager::new(block.parity());
            let mut received = codeword.clone();
            received.flip(flipped);
            let repaired = bit_flipping(&mut alg, block.parity(), &received, 20);
            assert_eq!(repaired, codeword, "message {value}, flipped bit {flipped}");
            assert_eq!(block.decode(&repaired), message);
        }
    }
}

#[test]
fn dwbf_repairs_every_single_flip() {
    let cancel = CancelToken::new();
    let block = hamming::new(&cancel, 3, 0).unwrap();
    let message = SparseVector::from_bits(&[1, 0, 1, 1]);
    let codeword = block.encode(&message);
    let mut alg = Dwbf::new(block.parity(), 0.5, 0.0);
    for flipped in 0..block.codeword_length() {
        alg.reset();
        let mut received = codeword.clone();
        received.flip(flipped);
        let repaired = bit_flipping(&mut alg, block.parity(), &received, 20);
        assert_eq!(repaired, codeword, "flipped bit {flipped}");
    }
}

#[test]
fn dwbf_leaves_codewords_alone() {
    let cancel = CancelToken::new();
    let block = hamming::new(&cancel, 3, 0).unwrap();
    let codeword = block.encode(&SparseVector::from_bits(&[0, 1, 1, 0]));
    let mut alg = Dwbf::new(block.parity(), 0.25, 0.0);
    assert_eq!(bit_flipping(&mut alg, block.parity(), &codeword, 20), codeword);
}

#[test]
fn peeling_recovers_known_erasure_pattern() {
    use ErasureBit::{Erased, One, Zero};
    let h = SparseMatrix::from_dense(
        4,
        6,
        &[
            1, 1, 0, 1, 0, 0, 0, 1, 1, 0, 1, 0, 1, 0, 0, 0, 1, 1, 0, 0, 1, 1, 0, 1,
        ],
    );
    let mut alg = Peeling::new(&h);
    let received = [Zero, Zero, One, Erased, Erased, Erased];
    let repaired = bec::flipping(&mut alg, &received);
    assert_eq!(repaired, vec![Zero, Zero, One, Zero, One, One]);
}

#[test]
fn peeling_recovers_any_two_erasures_on_hamming() {
    let cancel = CancelToken::new();
    let block = hamming::new(&cancel, 3, 0).unwrap();
    let message = SparseVector::from_bits(&[1, 1, 0, 1]);
    let codeword = block.encode_erasure(&message);
    for a in 0..codeword.len() {
        for b in (a + 1)..codeword.len() {
            let mut received = codeword.clone();
            received[a] = ErasureBit::Erased;
            received[b] = ErasureBit::Erased;
            let mut alg = Peeling::new(block.parity());
            let repaired = bec::flipping(&mut alg, &received);
            assert_eq!(repaired, codeword, "erased bits {a} and {b}");
            let decoded = block.decode_erasure(&repaired);
            for (i, bit) in decoded.iter().enumerate() {
                assert_eq!(*bit, ErasureBit::from_bit(message.at(i)));
            }
        }
    }
}
