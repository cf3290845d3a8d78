//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use daga_server::bootstrap::{generate_group, GroupMaterial};
use daga_server::coordinator::{
    AuthenticateRequest, AuthenticationResult, ChallengeGrant, Coordinator, Dispatcher,
    Operation, PeerRequest, PeerResponse, PeerService, PeerTransport, SessionStore, StoreConfig,
};
use daga_server::error::ServerIndex;
use daga_server::{
    AuthenticationContext, ClientSecret, Element, Error, RandomShares, Result, Scalar, SecureRng,
    ShareSource,
};
use tokio::time::Duration;
use uuid::Uuid;

/// Initialize test tracing (call once at the beginning of tests).
///
/// Subsequent calls are safe and will be ignored.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new("daga_server=debug");

    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(filter)
        .try_init();
}

/// Always draws the same share.
pub struct FixedShares(pub Scalar);

impl ShareSource for FixedShares {
    fn draw(&self) -> Scalar {
        self.0
    }
}

/// Fault injected into calls to one server.
#[derive(Clone, Copy, Debug)]
pub enum Fault {
    /// The call never reaches the server.
    Unreachable,
    /// The call is delayed before being delivered.
    Delay(Duration),
    /// A challenge reply comes back with a different challenge.
    AlterChallenge,
    /// A binding reply comes back with a different tag.
    AlterTag,
}

/// In-process transport that pushes every call through the JSON wire encoding.
pub struct LoopbackTransport {
    services: Vec<Arc<PeerService>>,
    group_services: HashMap<Uuid, Vec<Arc<PeerService>>>,
    calls: AtomicUsize,
    faults: Mutex<HashMap<ServerIndex, Fault>>,
}

impl LoopbackTransport {
    pub fn new(services: Vec<Arc<PeerService>>) -> Self {
        Self {
            services,
            group_services: HashMap::new(),
            calls: AtomicUsize::new(0),
            faults: Mutex::new(HashMap::new()),
        }
    }

    /// Routes calls for `group` to `services` in index order.
    pub fn with_group(mut self, group: Uuid, services: Vec<Arc<PeerService>>) -> Self {
        self.group_services.insert(group, services);
        self
    }

    /// Number of calls made through this transport.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inject(&self, server: ServerIndex, fault: Fault) {
        self.faults.lock().unwrap().insert(server, fault);
    }

    pub fn clear_faults(&self) {
        self.faults.lock().unwrap().clear();
    }
}

#[async_trait]
impl PeerTransport for LoopbackTransport {
    async fn call(
        &self,
        group: &Uuid,
        target: ServerIndex,
        request: &PeerRequest,
    ) -> Result<PeerResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let op: Operation = request.operation();

        let fault = self.faults.lock().unwrap().get(&target).copied();
        match fault {
            Some(Fault::Unreachable) => {
                return Err(Error::PeerUnreachable {
                    server: target,
                    reason: "connection refused".to_string(),
                })
            }
            Some(Fault::Delay(delay)) => tokio::time::sleep(delay).await,
            _ => {}
        }

        let service = self
            .group_services
            .get(group)
            .unwrap_or(&self.services)
            .get(target)
            .ok_or_else(|| Error::PeerUnreachable {
                server: target,
                reason: "no such server".to_string(),
            })?;

        let decoded = PeerRequest::decode(op, &request.to_json()?)?;
        let reply = match service.handle(decoded).await {
            Ok(reply) => PeerResponse::decode(op, target, &reply.to_json()?)?,
            Err(e) => {
                return Err(Error::Peer {
                    server: target,
                    kind: e.kind(),
                    message: e.to_string(),
                })
            }
        };

        Ok(match (fault, reply) {
            (Some(Fault::AlterChallenge), PeerResponse::Challenge(mut signed)) => {
                signed.challenge = signed.challenge + Scalar::ONE;
                PeerResponse::Challenge(signed)
            }
            (Some(Fault::AlterTag), PeerResponse::Binding(mut binding)) => {
                binding.tag = binding.tag + Element::generator();
                PeerResponse::Binding(binding)
            }
            (_, reply) => reply,
        })
    }
}

/// A group whose servers all run in this process.
pub struct LocalCluster {
    pub group: GroupMaterial,
    pub context: AuthenticationContext,
    pub services: Vec<Arc<PeerService>>,
    pub coordinators: Vec<Coordinator>,
    pub transport: Arc<LoopbackTransport>,
}

impl LocalCluster {
    /// Cluster with random shares and default store settings.
    pub fn new(clients: usize, servers: usize) -> Self {
        Self::build(clients, servers, StoreConfig::default(), |_| {
            Arc::new(RandomShares)
        })
    }

    /// Cluster where server `j` always draws `shares[j]`.
    pub fn with_fixed_shares(clients: usize, shares: &[u64]) -> Self {
        let shares = shares.to_vec();
        Self::build(clients, shares.len(), StoreConfig::default(), move |j| {
            Arc::new(FixedShares(Scalar::from_u64(shares[j])))
        })
    }

    /// Cluster with random shares and the given store settings.
    pub fn with_store_config(clients: usize, servers: usize, config: StoreConfig) -> Self {
        Self::build(clients, servers, config, |_| Arc::new(RandomShares))
    }

    fn build(
        clients: usize,
        servers: usize,
        config: StoreConfig,
        shares: impl Fn(ServerIndex) -> Arc<dyn ShareSource>,
    ) -> Self {
        let group = generate_group(clients, servers, &mut SecureRng::new()).unwrap();
        let context = group.context().unwrap();

        let services: Vec<Arc<PeerService>> = (0..servers)
            .map(|j| {
                let service = PeerService::new(SessionStore::new(config.clone()), shares(j))
                    .with_group(context.clone(), group.server_secret(j).unwrap())
                    .unwrap();
                Arc::new(service)
            })
            .collect();

        let transport = Arc::new(LoopbackTransport::new(services.clone()));
        let coordinators = services
            .iter()
            .map(|service| {
                Coordinator::new(Dispatcher::new(
                    service.clone(),
                    transport.clone(),
                    Duration::from_secs(5),
                ))
            })
            .collect();

        Self {
            group,
            context,
            services,
            coordinators,
            transport,
        }
    }

    pub fn client(&self, index: usize) -> ClientSecret {
        self.group.client_secret(index).unwrap()
    }

    pub fn leader(&self) -> &Coordinator {
        &self.coordinators[0]
    }

    /// Coordinator for server `me` with a custom peer timeout.
    pub fn coordinator_with_timeout(&self, me: ServerIndex, timeout: Duration) -> Coordinator {
        Coordinator::new(Dispatcher::new(
            self.services[me].clone(),
            self.transport.clone(),
            timeout,
        ))
    }

    /// Tag client `index` must end up with: `h_index` raised to every server's secret.
    pub fn expected_tag(&self, index: usize) -> Element {
        let product = self
            .group
            .servers
            .iter()
            .fold(Scalar::ONE, |acc, server| acc * server.secret);
        self.context.generators()[index] * product
    }

    /// Runs both client-facing rounds with server `leader` leading.
    pub async fn authenticate(
        &self,
        leader: ServerIndex,
        client: &ClientSecret,
        bind: &str,
    ) -> Result<(ChallengeGrant, AuthenticationResult)> {
        let coordinator = &self.coordinators[leader];
        let pending = client.begin(&self.context, &mut SecureRng::new())?;
        let grant = coordinator
            .request_challenge(pending.client_data().clone())
            .await?;
        let result = coordinator
            .authenticate(AuthenticateRequest {
                auth_id: grant.auth_id.clone(),
                response: pending.respond(&grant.challenge),
                bind: bind.to_string(),
            })
            .await?;
        Ok((grant, result))
    }
}
