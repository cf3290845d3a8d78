use daga_server::bootstrap::generate_group;
use daga_server::protocol::{authenticate_client, VerificationChain};
use daga_server::{Scalar, SecureRng};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn chain_of_any_size_yields_tag_of_signer(
        clients in 1usize..5,
        servers in 1usize..5,
        pick in any::<prop::sample::Index>(),
    ) {
        let mut rng = SecureRng::new();
        let group = generate_group(clients, servers, &mut rng).unwrap();
        let ac = group.context().unwrap();
        let i = pick.index(clients);

        let pending = group.client_secret(i).unwrap().begin(&ac, &mut rng).unwrap();
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

        prop_assert!(chain.verify_all(&ac).is_ok());

        let product = group
            .servers
            .iter()
            .fold(Scalar::ONE, |acc, server| acc * server.secret);
        prop_assert_eq!(chain.linkage_tag(), Some(ac.generators()[i] * product));
    }

    #[test]
    fn challenge_is_order_independent_sum(shares in prop::collection::vec(any::<u64>(), 1..8)) {
        let forward: Scalar = shares.iter().map(|&n| Scalar::from_u64(n)).sum();
        let backward: Scalar = shares.iter().rev().map(|&n| Scalar::from_u64(n)).sum();
        prop_assert_eq!(forward, backward);

        let total: u128 = shares.iter().map(|&n| u128::from(n)).sum();
        let low = Scalar::from_u64(total as u64);
        let high = Scalar::from_u64((total >> 64) as u64);
        let two_64 = Scalar::from_u64(u64::MAX) + Scalar::ONE;
        prop_assert_eq!(forward, high * two_64 + low);
    }

    #[test]
    fn swapping_any_two_links_breaks_chain(
        servers in 2usize..5,
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>(),
    ) {
        let (a, b) = (a.index(servers), b.index(servers));
        prop_assume!(a != b);

        let mut rng = SecureRng::new();
        let group = generate_group(2, servers, &mut rng).unwrap();
        let ac = group.context().unwrap();
        let pending = group.client_secret(0).unwrap().begin(&ac, &mut rng).unwrap();
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

        let mut proofs = chain.into_server_proofs();
        proofs.swap(a, b);
        let swapped = VerificationChain::new(
            challenge,
            pending.client_data().clone(),
            pending.respond(&challenge),
        )
        .with_server_proofs(proofs);

        prop_assert!(swapped.verify_all(&ac).is_err());
    }

    #[test]
    fn response_to_other_challenge_is_rejected(offset in 1u64..u64::MAX) {
        let mut rng = SecureRng::new();
        let group = generate_group(3, 2, &mut rng).unwrap();
        let ac = group.context().unwrap();
        let pending = group.client_secret(1).unwrap().begin(&ac, &mut rng).unwrap();
        let challenge = Scalar::random(&mut rng);

        let chain = VerificationChain::new(
            challenge,
            pending.client_data().clone(),
            pending.respond(&(challenge + Scalar::from_u64(offset))),
        );
        prop_assert!(chain.verify_client_proof(&ac).is_err());
    }
}
