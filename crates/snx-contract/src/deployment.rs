//! Synthetix deployment registry files: `versions.json` (every release and the contract
//! addresses it introduced) and `deployment.json` (the current target of every contract name).

use std::{collections::BTreeMap, fmt, fs, path::Path};

use alloy_primitives::{address, Address};
use clap::ValueEnum;
use serde::{de::DeserializeOwned, Deserialize};

use crate::{ChainError, ChainResult};

pub const VERSIONS_FILE: &str = "versions.json";
pub const DEPLOYMENT_FILE: &str = "deployment.json";

/// Placeholder in the RPC endpoint template that is replaced with the network name.
const NETWORK_PLACEHOLDER: &str = "network";

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, ValueEnum)]
pub enum Network {
    #[default]
    Mainnet,
    Goerli,
    Kovan,
    Local,
}

impl Network {
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Goerli => "goerli",
            Network::Kovan => "kovan",
            Network::Local => "local",
        }
    }

    /// Name of the network's directory in the deployment data (`mainnet`, `mainnet-ovm`, ...).
    pub fn deployment_dir_name(&self, use_ovm: bool) -> String {
        match use_ovm {
            true => format!("{}-ovm", self.name()),
            false => self.name().to_string(),
        }
    }

    /// Expand an RPC endpoint template such as `https://network.infura.io/v3/<key>`.
    pub fn provider_url_from_template(&self, template: &str) -> String {
        template.replace(NETWORK_PLACEHOLDER, self.name())
    }

    /// Public L2 endpoint, if there is one for this network.
    pub fn public_ovm_provider_url(&self) -> Option<&'static str> {
        match self {
            Network::Mainnet => Some("https://mainnet.optimism.io"),
            Network::Kovan => Some("https://kovan.optimism.io"),
            Network::Goerli | Network::Local => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A deployment the jobs are hard-wired to scan, together with its deployment block.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct KnownDeployment {
    pub address: Address,
    pub from_block: u64,
}

/// Every `SynthetixBridgeToOptimism` ever deployed on mainnet, oldest first.
pub const KNOWN_MAINNET_BRIDGES_TO_OPTIMISM: [KnownDeployment; 2] = [
    KnownDeployment {
        address: address!("045e507925d2e05D114534D0810a1abD94aca8d6"),
        from_block: 11_656_238,
    },
    KnownDeployment {
        address: address!("Cd9D4988C0AE61887B075bA77f08cbFAd2b65068"),
        from_block: 12_409_013,
    },
];

#[derive(Clone, Debug, Deserialize)]
struct ReleaseEntry {
    tag: String,
    #[serde(default)]
    release: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    commit: Option<String>,
    #[serde(default)]
    contracts: BTreeMap<String, ReleasedContract>,
}

#[derive(Clone, Debug, Deserialize)]
struct ReleasedContract {
    address: Address,
}

/// One deployed version of a contract, as recorded in `versions.json`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractVersion {
    pub address: Address,
    pub tag: String,
    pub release: Option<String>,
    pub date: Option<String>,
    pub commit: Option<String>,
}

/// Parsed `versions.json`.
#[derive(Clone, Debug)]
pub struct VersionRegistry {
    releases: Vec<ReleaseEntry>,
}

impl VersionRegistry {
    pub fn load(deployment_dir: &Path) -> ChainResult<Self> {
        let releases: BTreeMap<String, ReleaseEntry> =
            read_json(&deployment_dir.join(VERSIONS_FILE))?;
        Ok(Self::from_releases(releases.into_values().collect()))
    }

    fn from_releases(mut releases: Vec<ReleaseEntry>) -> Self {
        // JSON object order is not preserved, release dates are (ISO 8601 sorts lexically).
        releases.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.tag.cmp(&b.tag)));
        Self { releases }
    }

    /// All versions of `contract`, oldest first.
    pub fn versions_of(&self, contract: &str) -> Vec<ContractVersion> {
        self.releases
            .iter()
            .filter_map(|release| {
                release
                    .contracts
                    .get(contract)
                    .map(|deployed| ContractVersion {
                        address: deployed.address,
                        tag: release.tag.clone(),
                        release: release.release.clone(),
                        date: release.date.clone(),
                        commit: release.commit.clone(),
                    })
            })
            .collect()
    }
}

#[derive(Clone, Debug, Deserialize)]
struct Target {
    address: Address,
}

/// Parsed `deployment.json`: the current address of every contract name.
#[derive(Clone, Debug, Deserialize)]
pub struct Deployment {
    targets: BTreeMap<String, Target>,
}

impl Deployment {
    pub fn load(deployment_dir: &Path) -> ChainResult<Self> {
        read_json(&deployment_dir.join(DEPLOYMENT_FILE))
    }

    pub fn target(&self, contract: &str) -> ChainResult<Address> {
        self.targets
            .get(contract)
            .map(|target| target.address)
            .ok_or_else(|| {
                ChainError::Deployment(format!("Contract `{contract}` is not in the deployment"))
            })
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> ChainResult<T> {
    let content = fs::read_to_string(path).map_err(|source| ChainError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&content)
        .map_err(|e| ChainError::Deployment(format!("Malformed {}: {e}", path.display())))
}
