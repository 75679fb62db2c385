use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use secure_protocol::{
    KeyPair, PublicKey, Result, SecureComparator, SecureSession, Unwrapped,
    crypto::{Authentication, KeyExchange},
};
use std::collections::HashMap;

type Peers = HashMap<Vec<u8>, PublicKey>;

fn new_pair() -> Result<(SecureSession<Peers>, SecureSession<Peers>)> {
    let client_keys = KeyPair::generate();
    let server_keys = KeyPair::generate();

    let mut client_peers = Peers::new();
    client_peers.insert(b"server".to_vec(), server_keys.public_key());
    let mut server_peers = Peers::new();
    server_peers.insert(b"client".to_vec(), client_keys.public_key());

    Ok((
        SecureSession::new("client", client_keys, client_peers)?,
        SecureSession::new("server", server_keys, server_peers)?,
    ))
}

fn run_handshake(client: &mut SecureSession<Peers>, server: &mut SecureSession<Peers>) -> Result<()> {
    let mut frame = client.connect_request()?;
    let mut to_server = true;
    loop {
        let receiver = if to_server { &mut *server } else { &mut *client };
        match receiver.unwrap(&frame)? {
            Unwrapped::Reply(next) => frame = next,
            _ => return Ok(()),
        }
        to_server = !to_server;
    }
}

fn setup_secure_session() -> Result<(SecureSession<Peers>, SecureSession<Peers>)> {
    let (mut client, mut server) = new_pair()?;
    run_handshake(&mut client, &mut server)?;
    Ok((client, server))
}

fn benchmark_handshake(c: &mut Criterion) {
    let mut group = c.benchmark_group("handshake");

    group.bench_function("connect_request", |b| {
        b.iter_with_setup(
            || new_pair().unwrap(),
            |(mut client, _)| {
                black_box(client.connect_request().unwrap());
            },
        );
    });

    group.bench_function("accept_request", |b| {
        b.iter_with_setup(
            || {
                let (mut client, server) = new_pair().unwrap();
                let request = client.connect_request().unwrap();
                (server, request)
            },
            |(mut server, request)| {
                black_box(server.unwrap(&request).unwrap());
            },
        );
    });

    group.bench_function("complete_handshake", |b| {
        b.iter_with_setup(
            || new_pair().unwrap(),
            |(mut client, mut server)| {
                run_handshake(&mut client, &mut server).unwrap();
                black_box(client.session_id());
            },
        );
    });

    group.finish();
}

fn benchmark_wrap_unwrap(c: &mut Criterion) {
    let mut group = c.benchmark_group("wrap_unwrap");

    for size in [64, 256, 1024, 4096, 16384].iter() {
        let data = vec![0x42u8; *size];

        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::new("wrap", size), &data, |b, data| {
            let (mut client, _) = setup_secure_session().unwrap();
            b.iter(|| black_box(client.wrap(data).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("roundtrip", size), &data, |b, data| {
            let (mut client, mut server) = setup_secure_session().unwrap();
            b.iter(|| {
                let wrapped = client.wrap(data).unwrap();
                black_box(server.unwrap(&wrapped).unwrap());
            });
        });
    }

    group.finish();
}

fn benchmark_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives");

    group.bench_function("x25519_agreement", |b| {
        b.iter_with_setup(
            || {
                let ours = KeyExchange::generate_ephemeral();
                let theirs = KeyExchange::generate_ephemeral().public_bytes();
                (ours, theirs)
            },
            |(ours, theirs)| {
                black_box(KeyExchange::derive_shared_secret(&ours, &theirs).unwrap());
            },
        );
    });

    let key_pair = KeyPair::generate();
    let message = [0x42u8; 128];
    let signature = Authentication::sign(&key_pair, &message).to_bytes();

    group.bench_function("ed25519_sign", |b| {
        b.iter(|| black_box(Authentication::sign(&key_pair, &message)));
    });

    group.bench_function("ed25519_verify", |b| {
        let public_key = key_pair.public_key();
        b.iter(|| Authentication::verify(&public_key, &message, &signature).unwrap());
    });

    group.finish();
}

fn benchmark_comparator(c: &mut Criterion) {
    let mut group = c.benchmark_group("comparator");

    group.bench_function("full_comparison", |b| {
        b.iter_with_setup(
            || {
                (
                    SecureComparator::new(b"shared secret").unwrap(),
                    SecureComparator::new(b"shared secret").unwrap(),
                )
            },
            |(mut alice, mut bob)| {
                let step1 = alice.begin_compare().unwrap();
                let step2 = bob.proceed_compare(&step1).unwrap().unwrap();
                let step3 = alice.proceed_compare(&step2).unwrap().unwrap();
                let step4 = bob.proceed_compare(&step3).unwrap().unwrap();
                alice.proceed_compare(&step4).unwrap();
                black_box(alice.is_match().unwrap());
            },
        );
    });

    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = benchmark_handshake, benchmark_wrap_unwrap, benchmark_primitives, benchmark_comparator
);
criterion_main!(benches);
