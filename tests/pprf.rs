use std::sync::{Arc, Mutex};

use ggm_dpprf::{
    Block, Error, Leaf, PprfConfig, PprfReceiver, PprfSender, ReceiverOutput, SenderOutput,
    channel::{Channel, SimpleChannel, Stats},
    config::{OtRoleMapping, RootMode},
    cot::{self, CotReceiver, CotSender, OtRole, ideal::ideal_cot},
    error::{Abort, Precondition},
};
use proptest::prelude::*;
use rand::random_range;

fn configs() -> [PprfConfig; 4] {
    [
        PprfConfig::naive(),
        PprfConfig::naive().with_root(RootMode::Delta),
        PprfConfig::half_tree(),
        PprfConfig::half_tree().with_parallel(false),
    ]
}

struct Run {
    sent: SenderOutput,
    received: ReceiverOutput,
    sender_stats: Stats,
    receiver_stats: Stats,
}

async fn run(
    config: PprfConfig,
    batch_num: usize,
    each_num: usize,
    alphas: &[usize],
) -> Result<Run, Error> {
    let channels = SimpleChannel::channels(2);
    let (cot_sender, cot_receiver) = ideal_cot(b"pprf tests");
    let mut sender = PprfSender::new(cot_sender, 1, config);
    let mut receiver = PprfReceiver::new(cot_receiver, 0, config);
    tokio::try_join!(sender.init(&channels[0]), receiver.init(&channels[1]))?;
    let (sent, received) = tokio::try_join!(
        sender.puncture(&channels[0], batch_num, each_num),
        receiver.puncture(&channels[1], batch_num, each_num, alphas),
    )?;
    Ok(Run {
        sent,
        received,
        sender_stats: channels[0].stats(),
        receiver_stats: channels[1].stats(),
    })
}

fn assert_punctured_agreement(sent: &SenderOutput, received: &ReceiverOutput) {
    assert_eq!(sent.each_num, received.each_num);
    assert_eq!(sent.trees.len(), received.trees.len());
    for (s, r) in sent.trees.iter().zip(&received.trees) {
        assert_eq!(sent.each_num, s.leaves.len());
        assert_eq!(sent.each_num, r.leaves.len());
        for (i, (s_leaf, r_leaf)) in s.leaves.iter().zip(&r.leaves).enumerate() {
            if i == r.alpha {
                assert_eq!(Leaf::Punctured, *r_leaf);
            } else {
                assert_eq!(Leaf::Present(*s_leaf), *r_leaf, "leaf {i} of α = {}", r.alpha);
            }
        }
    }
}

#[tokio::test]
async fn all_leaves_but_alpha_agree() -> Result<(), Error> {
    for config in configs() {
        for each_num in [1, 2, 3, 5, 8, 100] {
            // one tree per puncture index
            let alphas: Vec<usize> = (0..each_num).collect();
            for _ in 0..2 {
                let run = run(config, each_num, each_num, &alphas).await?;
                assert_punctured_agreement(&run.sent, &run.received);
            }
        }
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn large_trees_agree() -> Result<(), Error> {
    let each_num = 4096;
    let alphas = [0, each_num - 1, random_range(0..each_num), random_range(0..each_num)];
    for config in configs() {
        let run = run(config, alphas.len(), each_num, &alphas).await?;
        assert_punctured_agreement(&run.sent, &run.received);
    }
    Ok(())
}

#[tokio::test]
async fn eight_leaves_punctured_at_five() -> Result<(), Error> {
    for config in configs() {
        let channels = SimpleChannel::channels(2);
        let (cot_sender, cot_receiver) = ideal_cot(b"eight leaves");
        let mut sender = PprfSender::new(cot_sender, 1, config);
        let mut receiver = PprfReceiver::new(cot_receiver, 0, config);
        tokio::try_join!(sender.init(&channels[0]), receiver.init(&channels[1]))?;
        let (sent, received) = tokio::try_join!(
            sender.puncture(&channels[0], 1, 8),
            receiver.puncture(&channels[1], 1, 8, &[5]),
        )?;

        assert_eq!(&[false, true, false], receiver.cot().last_choices());
        let leaves = &received.trees[0].leaves;
        assert_eq!(None, leaves[5].value());
        for i in [0, 1, 2, 3, 4, 6, 7] {
            assert_eq!(Some(sent.trees[0].leaves[i]), leaves[i].value());
        }
    }
    Ok(())
}

#[tokio::test]
async fn transcript_does_not_depend_on_alpha() -> Result<(), Error> {
    for config in configs() {
        for each_num in [3, 8, 100] {
            let first = run(config, 3, each_num, &[0; 3]).await?;
            let last = run(config, 3, each_num, &[each_num - 1; 3]).await?;
            let mixed = run(config, 3, each_num, &[1, each_num / 2, each_num - 2]).await?;
            for other in [&last, &mixed] {
                assert_eq!(first.sender_stats, other.sender_stats);
                assert_eq!(first.receiver_stats, other.receiver_stats);
            }
        }
    }
    Ok(())
}

#[tokio::test]
async fn half_tree_sends_fewer_corrections() -> Result<(), Error> {
    let alphas = [3; 4];
    let naive = run(PprfConfig::naive(), 4, 64, &alphas).await?;
    let half_tree = run(PprfConfig::half_tree(), 4, 64, &alphas).await?;
    assert_eq!(1, naive.sender_stats.send_count);
    assert_eq!(1, half_tree.sender_stats.send_count);
    // 2·h versus h - 1 blocks per tree
    assert!(2 * half_tree.sender_stats.send_size < naive.sender_stats.send_size);
    assert_eq!(
        naive.receiver_stats.send_size,
        half_tree.receiver_stats.send_size
    );
    Ok(())
}

#[tokio::test]
async fn single_leaf_uses_one_ot_and_no_corrections() -> Result<(), Error> {
    for config in configs() {
        let channels = SimpleChannel::channels(2);
        let (cot_sender, cot_receiver) = ideal_cot(b"single leaf");
        let mut sender = PprfSender::new(cot_sender, 1, config);
        let mut receiver = PprfReceiver::new(cot_receiver, 0, config);
        tokio::try_join!(sender.init(&channels[0]), receiver.init(&channels[1]))?;
        let (sent, received) = tokio::try_join!(
            sender.puncture(&channels[0], 1, 1),
            receiver.puncture(&channels[1], 1, 1, &[0]),
        )?;

        assert_eq!(1, sender.cot().calls());
        assert_eq!(1, sender.cot().ots());
        assert_eq!(&[true], receiver.cot().last_choices());
        assert_eq!(0, channels[0].stats().send_count);
        assert_eq!(vec![Leaf::Punctured], received.trees[0].leaves);
        assert_eq!(1, sent.trees[0].leaves.len());
        if config.is_correlated() {
            let delta = sender.delta()?;
            assert_eq!(delta, sent.trees[0].root);
            assert_eq!(
                Some(sent.trees[0].leaves[0] ^ delta),
                received.trees[0].complement_sum()
            );
        } else {
            assert_eq!(None, received.trees[0].complement_sum());
        }
    }
    Ok(())
}

#[tokio::test]
async fn single_leaves_come_from_fresh_ots() -> Result<(), Error> {
    for config in configs().into_iter().filter(PprfConfig::is_correlated) {
        let run = run(config, 3, 1, &[0; 3]).await?;
        let delta = run.sent.delta.expect("trees are rooted at Δ");
        let leaves: Vec<Block> = run.sent.trees.iter().map(|t| t.leaves[0]).collect();
        assert!(!leaves.contains(&delta));
        assert_ne!(leaves[0], leaves[1]);
        assert_ne!(leaves[1], leaves[2]);
        for (sent, received) in run.sent.trees.iter().zip(&run.received.trees) {
            let chosen = received.complement_sum().expect("correlated");
            assert_ne!(Block::ZERO, chosen);
            assert_eq!(delta, sent.leaves[0] ^ chosen);
        }
    }
    Ok(())
}

#[tokio::test]
async fn trees_are_independent() -> Result<(), Error> {
    for config in configs() {
        let channels = SimpleChannel::channels(2);
        let (cot_sender, cot_receiver) = ideal_cot(b"independent trees");
        let mut sender = PprfSender::new(cot_sender, 1, config);
        let mut receiver = PprfReceiver::new(cot_receiver, 0, config);
        tokio::try_join!(sender.init(&channels[0]), receiver.init(&channels[1]))?;

        let mut trees = vec![];
        for _ in 0..2 {
            let (sent, received) = tokio::try_join!(
                sender.puncture(&channels[0], 3, 16),
                receiver.puncture(&channels[1], 3, 16, &[0, 1, 15]),
            )?;
            assert_punctured_agreement(&sent, &received);
            trees.extend(sent.trees);
        }
        // within a batch and across calls
        for (i, a) in trees.iter().enumerate() {
            for b in &trees[i + 1..] {
                assert_ne!(a.leaves, b.leaves);
                assert!(a.leaves.iter().all(|leaf| !b.leaves.contains(leaf)));
            }
        }
    }
    Ok(())
}

#[tokio::test]
async fn delta_rooted_trees() -> Result<(), Error> {
    for config in [
        PprfConfig::half_tree(),
        PprfConfig::naive().with_root(RootMode::Delta),
    ] {
        let run = run(config, 2, 16, &[4, 9]).await?;
        let delta = run.sent.delta.expect("trees are rooted at Δ");
        for tree in &run.sent.trees {
            assert_eq!(delta, tree.root);
            assert_eq!(delta, Block::xor_all(&tree.leaves));
        }
    }
    let run = run(PprfConfig::naive(), 2, 16, &[4, 9]).await?;
    assert_eq!(None, run.sent.delta);
    assert_ne!(run.sent.trees[0].root, run.sent.trees[1].root);
    Ok(())
}

#[tokio::test]
async fn every_level_xors_to_root() -> Result<(), Error> {
    for config in configs() {
        let levels = Arc::new(Mutex::new(vec![]));
        let channels = SimpleChannel::channels(2);
        let (cot_sender, cot_receiver) = ideal_cot(b"inspector");
        let seen = Arc::clone(&levels);
        let mut sender = PprfSender::new(cot_sender, 1, config).with_level_inspector(
            move |tree, level, nodes| {
                assert_eq!(1 << level, nodes.len());
                seen.lock().unwrap().push((tree, level, Block::xor_all(nodes)));
            },
        );
        let mut receiver = PprfReceiver::new(cot_receiver, 0, config);
        tokio::try_join!(sender.init(&channels[0]), receiver.init(&channels[1]))?;
        let (sent, _) = tokio::try_join!(
            sender.puncture(&channels[0], 3, 100),
            receiver.puncture(&channels[1], 3, 100, &[0, 50, 99]),
        )?;

        let levels = levels.lock().unwrap();
        // levels 0..=7 of 3 trees
        assert_eq!(3 * 8, levels.len());
        for (tree, _, sum) in levels.iter() {
            assert_eq!(sent.trees[*tree].root, *sum);
        }
    }
    Ok(())
}

#[tokio::test]
async fn sequential_single_trees_match_batches() -> Result<(), Error> {
    let alphas = [2, 7, 0, 5];
    for config in configs() {
        let batch = run(config, alphas.len(), 8, &alphas).await?;
        assert_punctured_agreement(&batch.sent, &batch.received);

        let channels = SimpleChannel::channels(2);
        let (cot_sender, cot_receiver) = ideal_cot(b"sequential");
        let mut sender = PprfSender::new(cot_sender, 1, config);
        let mut receiver = PprfReceiver::new(cot_receiver, 0, config);
        tokio::try_join!(sender.init(&channels[0]), receiver.init(&channels[1]))?;
        for i in 0..alphas.len() {
            let (sent, received) = tokio::try_join!(
                sender.puncture(&channels[0], 1, 8),
                receiver.puncture(&channels[1], 1, 8, &alphas[i..=i]),
            )?;
            assert_punctured_agreement(&sent, &received);
        }
        assert_eq!(batch.sent.trees.len() * 3, sender.cot().ots());
    }
    Ok(())
}

fn precondition(result: Result<ReceiverOutput, Error>) -> Precondition {
    match result {
        Err(Error::Precondition(p)) => p,
        other => panic!("expected a precondition violation, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_arguments_fail_before_any_message() -> Result<(), Error> {
    let channels = SimpleChannel::channels(2);
    let (cot_sender, cot_receiver) = ideal_cot(b"preconditions");
    let config = PprfConfig::half_tree();
    let mut sender = PprfSender::new(cot_sender, 1, config);
    let mut receiver = PprfReceiver::new(cot_receiver, 0, config);

    assert_eq!(
        Precondition::NotInitialized,
        precondition(receiver.puncture(&channels[1], 1, 8, &[0]).await)
    );
    assert!(matches!(
        sender.puncture(&channels[0], 1, 8).await,
        Err(Error::Precondition(Precondition::NotInitialized))
    ));
    tokio::try_join!(sender.init(&channels[0]), receiver.init(&channels[1]))?;

    assert_eq!(
        Precondition::AlphaOutOfRange {
            tree: 1,
            alpha: 8,
            each_num: 8
        },
        precondition(receiver.puncture(&channels[1], 2, 8, &[7, 8]).await)
    );
    assert_eq!(
        Precondition::AlphaCount {
            expected: 3,
            actual: 2
        },
        precondition(receiver.puncture(&channels[1], 3, 8, &[0, 1]).await)
    );
    assert_eq!(
        Precondition::EmptyBatch,
        precondition(receiver.puncture(&channels[1], 0, 8, &[]).await)
    );
    assert_eq!(
        Precondition::EmptyTree,
        precondition(receiver.puncture(&channels[1], 1, 0, &[0]).await)
    );
    assert!(matches!(
        sender.puncture(&channels[0], 0, 8).await,
        Err(Error::Precondition(Precondition::EmptyBatch))
    ));

    for stats in [channels[0].stats(), channels[1].stats()] {
        assert_eq!(Stats::default(), stats);
    }
    assert_eq!(0, sender.cot().calls());
    assert_eq!(0, receiver.cot().calls());
    Ok(())
}

#[tokio::test]
async fn unsupported_configs_are_rejected_on_init() {
    let channels = SimpleChannel::channels(2);
    let (cot_sender, cot_receiver) = ideal_cot(b"configs");
    let mut sender = PprfSender::new(
        cot_sender,
        1,
        PprfConfig::half_tree().with_root(RootMode::Random),
    );
    assert!(matches!(
        sender.init(&channels[0]).await,
        Err(Error::Precondition(Precondition::HalfTreeNeedsDelta))
    ));
    let swapped = OtRoleMapping {
        pprf_sender: OtRole::Receiver,
    };
    let mut receiver = PprfReceiver::new(
        cot_receiver,
        0,
        PprfConfig::naive().with_ot_roles(swapped),
    );
    assert!(matches!(
        receiver.init(&channels[1]).await,
        Err(Error::Precondition(Precondition::RoleMapping {
            pprf_sender: OtRole::Receiver
        }))
    ));
}

#[tokio::test]
async fn mismatched_tree_sizes_abort() -> Result<(), Error> {
    for (config, expected, actual) in [
        (PprfConfig::naive(), 6, 8),
        (PprfConfig::half_tree(), 2, 3),
    ] {
        let channels = SimpleChannel::channels(2);
        let (cot_sender, cot_receiver) = ideal_cot(b"mismatch");
        let mut sender = PprfSender::new(cot_sender, 1, config);
        let mut receiver = PprfReceiver::new(cot_receiver, 0, config);
        tokio::try_join!(sender.init(&channels[0]), receiver.init(&channels[1]))?;
        let (_, received) = tokio::join!(
            sender.puncture(&channels[0], 1, 16),
            receiver.puncture(&channels[1], 1, 8, &[3]),
        );
        assert!(matches!(
            received,
            Err(Error::Abort(Abort::CorrectionLength { expected: e, actual: a }))
                if e == expected && a == actual
        ));
    }
    Ok(())
}

/// Fails every OT after a successful init.
struct FailingCot;

impl CotReceiver for FailingCot {
    async fn init(&mut self, _: &impl Channel, _: usize) -> Result<(), cot::Error> {
        Ok(())
    }

    async fn receive(
        &mut self,
        _: &impl Channel,
        _: usize,
        _: &[bool],
    ) -> Result<Vec<Block>, cot::Error> {
        Err(cot::Error::Primitive("connection reset".to_string()))
    }
}

/// Returns one key pair less than requested.
struct ShortCot;

impl CotSender for ShortCot {
    async fn init(&mut self, _: &impl Channel, _: usize) -> Result<(), cot::Error> {
        Ok(())
    }

    fn delta(&self) -> Result<Block, cot::Error> {
        Ok(Block::ONES)
    }

    async fn send(
        &mut self,
        _: &impl Channel,
        _: usize,
        n: usize,
    ) -> Result<Vec<[Block; 2]>, cot::Error> {
        Ok(vec![[Block::ZERO, Block::ONES]; n - 1])
    }
}

/// Returns key pairs that are not correlated.
struct UncorrelatedCot;

impl CotSender for UncorrelatedCot {
    async fn init(&mut self, _: &impl Channel, _: usize) -> Result<(), cot::Error> {
        Ok(())
    }

    fn delta(&self) -> Result<Block, cot::Error> {
        Ok(Block::ONES)
    }

    async fn send(
        &mut self,
        _: &impl Channel,
        _: usize,
        n: usize,
    ) -> Result<Vec<[Block; 2]>, cot::Error> {
        Ok(vec![[Block::ZERO, Block::ONE]; n])
    }
}

#[tokio::test]
async fn cot_failures_are_propagated() -> Result<(), Error> {
    let channels = SimpleChannel::channels(2);

    let mut receiver = PprfReceiver::new(FailingCot, 0, PprfConfig::naive());
    receiver.init(&channels[1]).await?;
    let err = receiver
        .puncture(&channels[1], 2, 8, &[1, 2])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cot(cot::Error::Primitive(_))));

    let mut sender = PprfSender::new(ShortCot, 1, PprfConfig::naive());
    sender.init(&channels[0]).await?;
    let err = sender.puncture(&channels[0], 2, 8).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Abort(Abort::CotCount {
            expected: 6,
            actual: 5
        })
    ));

    let mut sender = PprfSender::new(UncorrelatedCot, 1, PprfConfig::half_tree());
    sender.init(&channels[0]).await?;
    let err = sender.puncture(&channels[0], 1, 8).await.unwrap_err();
    assert!(matches!(err, Error::Abort(Abort::CotCorrelation)));

    // no corrections were sent after any of the failures
    assert_eq!(0, channels[0].stats().send_count);
    Ok(())
}

fn tree_and_alpha() -> impl Strategy<Value = (usize, usize)> {
    (1_usize..300).prop_flat_map(|each_num| (Just(each_num), 0..each_num))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn random_trees_agree((each_num, alpha) in tree_and_alpha(), half_tree in any::<bool>()) {
        let config = if half_tree { PprfConfig::half_tree() } else { PprfConfig::naive() };
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let run = rt.block_on(run(config, 1, each_num, &[alpha])).unwrap();
        let (sent, received) = (&run.sent.trees[0], &run.received.trees[0]);
        for (i, leaf) in received.leaves.iter().enumerate() {
            if i == alpha {
                prop_assert!(leaf.is_punctured());
            } else {
                prop_assert_eq!(Some(sent.leaves[i]), leaf.value());
            }
        }
    }
}
