//! Property-based tests for Registry
//!
//! Random sequences of register / identify / unregister are applied to the
//! registry and to a plain vector model; every query must agree with the model
//! after every step.

use std::net::SocketAddr;

use proptest::{prelude::*, test_runner::TestCaseError};
use quicchat_proto::Message;
use quicchat_server::{Registry, StreamId};
use tokio::io::{AsyncReadExt, DuplexStream, duplex};

/// Remote addresses the generated streams are spread across.
const ADDRESSES: u8 = 3;

#[derive(Debug, Clone)]
enum Op {
    Register(u8),
    Identify(usize, String),
    Unregister(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..ADDRESSES).prop_map(Op::Register),
        (any::<usize>(), "[a-z]{0,6}").prop_map(|(i, name)| Op::Identify(i, name)),
        any::<usize>().prop_map(Op::Unregister),
    ]
}

fn addr(index: u8) -> SocketAddr {
    SocketAddr::from(([192, 168, 0, index], 4000 + u16::from(index)))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

struct Entry {
    id: StreamId,
    addr: SocketAddr,
    username: String,
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: registry queries always match a registration-ordered model
    #[test]
    fn prop_registry_matches_model(ops in prop::collection::vec(op(), 1..40)) {
        runtime().block_on(async {
            let registry: Registry<DuplexStream> = Registry::new();
            let mut model: Vec<Entry> = Vec::new();
            let mut peers = Vec::new();

            for op in ops {
                match op {
                    Op::Register(a) => {
                        let (writer, peer) = duplex(1024);
                        peers.push(peer);
                        let id = registry.register(writer, addr(a)).await;
                        prop_assert!(model.iter().all(|e| e.id != id), "id {} reused", id);
                        model.push(Entry { id, addr: addr(a), username: String::new() });
                    },
                    Op::Identify(i, name) => {
                        if model.is_empty() {
                            continue;
                        }
                        let idx = i % model.len();
                        let entry = &mut model[idx];
                        prop_assert!(registry.update_identity(entry.id, &name).await);
                        entry.username = name;
                    },
                    Op::Unregister(i) => {
                        if model.is_empty() {
                            continue;
                        }
                        let idx = i % model.len();
                        let entry = model.remove(idx);
                        let removed = registry.unregister(entry.id).await;
                        prop_assert_eq!(removed.map(|p| p.username), Some(entry.username));
                        prop_assert!(registry.unregister(entry.id).await.is_none());
                        prop_assert!(!registry.update_identity(entry.id, "ghost").await);
                    },
                }

                prop_assert_eq!(registry.len().await, model.len());

                let named: Vec<String> = model
                    .iter()
                    .filter(|e| !e.username.is_empty())
                    .map(|e| e.username.clone())
                    .collect();
                prop_assert_eq!(registry.list_active_users().await, named);

                for a in 0..ADDRESSES {
                    let at: Vec<String> = model
                        .iter()
                        .filter(|e| e.addr == addr(a) && !e.username.is_empty())
                        .map(|e| e.username.clone())
                        .collect();
                    prop_assert_eq!(registry.users_at(addr(a)).await, at);
                }
            }

            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Property: one broadcast reaches every registered stream with identical bytes
    #[test]
    fn prop_broadcast_reaches_everyone(
        streams in 1usize..8,
        text in "[ -~]{0,200}",
    ) {
        runtime().block_on(async {
            let registry: Registry<DuplexStream> = Registry::new();
            let mut peers = Vec::new();
            for i in 0..streams {
                let (writer, peer) = duplex(4096);
                registry.register(writer, addr((i % 3) as u8)).await;
                peers.push(peer);
            }

            let message = Message::content(text.clone());
            let report = registry.broadcast(&message).await.unwrap();
            prop_assert_eq!(report.delivered, streams);
            prop_assert_eq!(report.failed, 0);

            let expected = message.encode_frame().unwrap();
            for peer in &mut peers {
                let mut buf = vec![0u8; expected.len()];
                peer.read_exact(&mut buf).await.unwrap();
                prop_assert_eq!(buf.as_slice(), expected.as_ref());
            }

            Ok::<(), TestCaseError>(())
        })?;
    }
}
