//! Descriptor files a node and its clients start from.
//!
//! Three JSON documents describe a deployment: the public authentication context
//! shared by everyone, one private descriptor per server and one per client.

use std::fs;
use std::path::Path;

use rand_core::CryptoRngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::ClientSecret;
use crate::error::ServerIndex;
use crate::primitives::{Element, Scalar, ServerSigningKey, ServerVerifyingKey};
use crate::protocol::{AuthenticationContext, ServerSecret};
use crate::{Error, Result};

const GENERATOR_LABEL: &[u8] = b"daga/client-generator";

/// Public authentication-context descriptor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextDescriptor {
    pub uuid: Uuid,
    pub client_public_keys: Vec<Element>,
    pub server_public_keys: Vec<ServerVerifyingKey>,
    pub server_randomness: Vec<Element>,
    pub generators: Vec<Element>,
}

impl ContextDescriptor {
    /// Validates the descriptor and builds the context.
    pub fn to_context(&self) -> Result<AuthenticationContext> {
        AuthenticationContext::new(
            self.uuid,
            self.client_public_keys.clone(),
            self.generators.clone(),
            self.server_public_keys.clone(),
            self.server_randomness.clone(),
        )
    }
}

/// Private descriptor of one server.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerDescriptor {
    /// Server index.
    pub n: ServerIndex,
    pub private_key: ServerSigningKey,
    /// Randomness secret `r_j`.
    pub secret: Scalar,
}

impl ServerDescriptor {
    /// Builds the server secret, checking it against the context.
    pub fn into_secret(self, ac: &AuthenticationContext) -> Result<ServerSecret> {
        let secret = ServerSecret::new(self.n, self.private_key, self.secret);
        secret.check_against(ac)?;
        Ok(secret)
    }
}

/// Private descriptor of one client.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientDescriptor {
    pub uuid: Uuid,
    pub index: usize,
    pub private_key: Scalar,
}

impl ClientDescriptor {
    /// Builds the client secret, checking it against the context.
    pub fn into_secret(self, ac: &AuthenticationContext) -> Result<ClientSecret> {
        if self.uuid != ac.group_id() {
            return Err(Error::InvalidParams(format!(
                "Client belongs to group {}, context is {}",
                self.uuid,
                ac.group_id()
            )));
        }
        let secret = ClientSecret::new(self.index, self.private_key);
        secret.check_against(ac)?;
        Ok(secret)
    }
}

/// Every descriptor of a freshly generated group.
#[derive(Clone)]
pub struct GroupMaterial {
    pub context: ContextDescriptor,
    pub servers: Vec<ServerDescriptor>,
    pub clients: Vec<ClientDescriptor>,
}

impl GroupMaterial {
    /// The public context.
    pub fn context(&self) -> Result<AuthenticationContext> {
        self.context.to_context()
    }

    /// Secret of server `index`.
    pub fn server_secret(&self, index: ServerIndex) -> Result<ServerSecret> {
        let descriptor = self.servers.get(index).cloned().ok_or_else(|| {
            Error::InvalidParams(format!("No server descriptor at index {index}"))
        })?;
        descriptor.into_secret(&self.context()?)
    }

    /// Secret of client `index`.
    pub fn client_secret(&self, index: usize) -> Result<ClientSecret> {
        let descriptor = self.clients.get(index).cloned().ok_or_else(|| {
            Error::InvalidParams(format!("No client descriptor at index {index}"))
        })?;
        descriptor.into_secret(&self.context()?)
    }
}

/// Generates keys for `clients` clients and `servers` servers under a fresh group id.
pub fn generate_group<R: CryptoRngCore>(
    clients: usize,
    servers: usize,
    rng: &mut R,
) -> Result<GroupMaterial> {
    if clients == 0 || servers == 0 {
        return Err(Error::InvalidParams(
            "A group needs at least one client and one server".to_string(),
        ));
    }
    let uuid = Uuid::new_v4();

    let client_keys: Vec<Scalar> = (0..clients).map(|_| Scalar::random(rng)).collect();
    let generators = (0..clients)
        .map(|k| {
            let mut data = uuid.as_bytes().to_vec();
            data.extend_from_slice(&(k as u64).to_be_bytes());
            Element::hash_from(GENERATOR_LABEL, &data)
        })
        .collect();

    let servers: Vec<ServerDescriptor> = (0..servers)
        .map(|n| ServerDescriptor {
            n,
            private_key: ServerSigningKey::generate(rng),
            secret: Scalar::random(rng),
        })
        .collect();

    let context = ContextDescriptor {
        uuid,
        client_public_keys: client_keys.iter().map(Element::mul_base).collect(),
        server_public_keys: servers
            .iter()
            .map(|s| s.private_key.verifying_key())
            .collect(),
        server_randomness: servers
            .iter()
            .map(|s| Element::mul_base(&s.secret))
            .collect(),
        generators,
    };

    let clients = client_keys
        .into_iter()
        .enumerate()
        .map(|(index, private_key)| ClientDescriptor {
            uuid,
            index,
            private_key,
        })
        .collect();

    Ok(GroupMaterial {
        context,
        servers,
        clients,
    })
}

/// Reads a JSON descriptor.
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let data = fs::read(path.as_ref())?;
    Ok(serde_json::from_slice(&data)?)
}

/// Writes a JSON descriptor.
pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let data = serde_json::to_vec_pretty(value)?;
    fs::write(path.as_ref(), data)?;
    Ok(())
}

/// Loads the context and this node's secret from their descriptor files.
pub fn load_node(
    context_path: impl AsRef<Path>,
    private_path: impl AsRef<Path>,
) -> Result<(AuthenticationContext, ServerSecret)> {
    let ac = read_json::<ContextDescriptor>(context_path)?.to_context()?;
    let secret = read_json::<ServerDescriptor>(private_path)?.into_secret(&ac)?;
    Ok((ac, secret))
}
