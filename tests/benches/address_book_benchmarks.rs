//! # Address Book Benchmarks
//!
//! Hot paths of a busy seed:
//!
//! | Operation | Called on |
//! |-----------|-----------|
//! | `add_address` | every address in every PEX response |
//! | `get_selection` | every PEX request answered |
//! | `pick_dial_candidate` | every dial slot filled |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use seed_peer_exchange::{
    AddressBook, AddressBookConfig, BucketKey, NetAddress, NodeIdentity, PeerId, Timestamp,
};

fn random_addr(rng: &mut StdRng) -> NetAddress {
    let hash: [u8; PeerId::KEY_HASH_LEN] = rng.gen();
    // Public ranges only, so strict mode accepts every address.
    let ip = Ipv4Addr::new(rng.gen_range(11..=99), rng.gen(), rng.gen(), rng.gen_range(1..=254));
    NetAddress::from_socket(
        PeerId::from_key_hash(&hash),
        SocketAddr::new(IpAddr::V4(ip), 26656),
    )
}

fn populated_book(size: usize, rng: &mut StdRng) -> AddressBook {
    let identity = NodeIdentity::new(random_addr(rng));
    let mut book = AddressBook::new(identity, AddressBookConfig::default(), BucketKey::random(rng));
    let sources: Vec<NetAddress> = (0..32).map(|_| random_addr(rng)).collect();
    let mut added = Vec::with_capacity(size);
    while added.len() < size {
        let addr = random_addr(rng);
        let source = &sources[rng.gen_range(0..sources.len())];
        if book.add_address(addr.clone(), source) {
            added.push(addr);
        }
    }
    // A quarter of the book has been connected to.
    for addr in added.iter().step_by(4) {
        book.mark_good(&addr.id, Timestamp::new(1_700_000_000));
    }
    book
}

fn bench_add_address(c: &mut Criterion) {
    let mut group = c.benchmark_group("address-book-add");
    group.measurement_time(Duration::from_secs(5));

    for size in [100usize, 1_000, 5_000] {
        let mut rng = StdRng::seed_from_u64(7);
        let book = populated_book(size, &mut rng);
        let batch: Vec<NetAddress> = (0..250).map(|_| random_addr(&mut rng)).collect();
        let source = random_addr(&mut rng);

        group.throughput(Throughput::Elements(batch.len() as u64));
        group.bench_with_input(BenchmarkId::new("pex_response", size), &batch, |b, batch| {
            b.iter_batched(
                || book.clone(),
                |mut book| {
                    for addr in batch {
                        black_box(book.add_address(addr.clone(), &source));
                    }
                    book
                },
                criterion::BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

fn bench_get_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("address-book-selection");

    for size in [100usize, 1_000, 5_000] {
        let mut rng = StdRng::seed_from_u64(11);
        let book = populated_book(size, &mut rng);
        group.bench_with_input(BenchmarkId::new("get_selection", size), &book, |b, book| {
            b.iter(|| black_box(book.get_selection(250, &mut rng)))
        });
    }

    group.finish();
}

fn bench_pick_dial_candidate(c: &mut Criterion) {
    let mut group = c.benchmark_group("address-book-dial");

    for size in [100usize, 1_000, 5_000] {
        let mut rng = StdRng::seed_from_u64(13);
        let book = populated_book(size, &mut rng);
        group.bench_with_input(
            BenchmarkId::new("pick_dial_candidate", size),
            &book,
            |b, book| b.iter(|| black_box(book.pick_dial_candidate(&mut rng, |_| false))),
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_add_address,
    bench_get_selection,
    bench_pick_dial_candidate
);
criterion_main!(benches);
