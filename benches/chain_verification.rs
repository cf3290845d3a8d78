use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use daga_server::bootstrap::generate_group;
use daga_server::protocol::{authenticate_client, VerificationChain};
use daga_server::{Scalar, SecureRng};

const CLIENTS: usize = 16;

fn full_chain(servers: usize) -> (daga_server::AuthenticationContext, VerificationChain) {
    let mut rng = SecureRng::new();
    let group = generate_group(CLIENTS, servers, &mut rng).unwrap();
    let ac = group.context().unwrap();
    let pending = group.client_secret(3).unwrap().begin(&ac, &mut rng).unwrap();
    let challenge = Scalar::random(&mut rng);
    let mut chain = VerificationChain::new(
        challenge,
        pending.client_data().clone(),
        pending.respond(&challenge),
    );
    for j in 0..servers {
        let server = group.server_secret(j).unwrap();
        authenticate_client(&ac, &server, &mut chain, &mut rng).unwrap();
    }
    (ac, chain)
}

fn bench_client_begin(c: &mut Criterion) {
    let mut rng = SecureRng::new();
    let group = generate_group(CLIENTS, 3, &mut rng).unwrap();
    let ac = group.context().unwrap();
    let client = group.client_secret(0).unwrap();

    c.bench_function("client_begin", |b| {
        b.iter(|| client.begin(black_box(&ac), &mut rng).unwrap())
    });
}

fn bench_client_proof_verification(c: &mut Criterion) {
    let (ac, chain) = full_chain(3);

    c.bench_function("client_proof_verification", |b| {
        b.iter(|| chain.verify_client_proof(black_box(&ac)).unwrap())
    });
}

fn bench_chain_verification(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_verification");
    for servers in [1, 3, 5, 9] {
        let (ac, chain) = full_chain(servers);
        group.bench_with_input(BenchmarkId::from_parameter(servers), &servers, |b, _| {
            b.iter(|| chain.verify_all(black_box(&ac)).unwrap())
        });
    }
    group.finish();
}

fn bench_server_link(c: &mut Criterion) {
    let mut rng = SecureRng::new();
    let group = generate_group(CLIENTS, 3, &mut rng).unwrap();
    let ac = group.context().unwrap();
    let pending = group.client_secret(0).unwrap().begin(&ac, &mut rng).unwrap();
    let challenge = Scalar::random(&mut rng);
    let server = group.server_secret(0).unwrap();

    c.bench_function("server_link", |b| {
        b.iter(|| {
            let mut chain = VerificationChain::new(
                challenge,
                pending.client_data().clone(),
                pending.respond(&challenge),
            );
            authenticate_client(&ac, &server, &mut chain, &mut rng).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_client_begin,
    bench_client_proof_verification,
    bench_chain_verification,
    bench_server_link
);
criterion_main!(benches);
