use std::{env, path::PathBuf, str::FromStr, time::Duration};

use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{anyhow, bail, Result};
pub use cli::{
    ActiveHoldersCmd, AirdropCmd, CliConfig, Command, DebtsCmd, DeploymentArgs,
    DistributeRewardsCmd, EscrowMigrationCmd, IssuerBalancesCmd, RevertReasonCmd,
    TransferListCmd, TrialScoresCmd, WriteArgs,
};
pub use defaults::DEFAULT_HEAD_MARGIN;
use defaults::{DEFAULT_LOCAL_PROVIDER_URL, DEFAULT_LOGGING_FORMAT};
pub use enums::LoggingFormat;
use inquire::Password;
use snx_contract::{
    deployment::{Deployment, Network},
    providers::parse_signer,
};

mod cli;
mod defaults;
mod enums;
#[cfg(test)]
mod tests;

pub const LOGGING_FORMAT_ENV: &str = "LOGGING_FORMAT";
/// RPC endpoint template; the word `network` in it is replaced by the network name.
pub const PROVIDER_URL_ENV: &str = "PROVIDER_URL";
/// Hex private key of the account that signs transfers.
pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";

/// Which chain a job talks to.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ChainConfig {
    pub network: Network,
    pub use_ovm: bool,
    pub provider_url: String,
}

impl CliConfig {
    pub fn logging_format(&self) -> Result<LoggingFormat> {
        resolve_value(
            self.logging_format,
            LOGGING_FORMAT_ENV,
            Some(DEFAULT_LOGGING_FORMAT),
        )
    }

    /// Resolved chain access. Order of precedence for the endpoint is:
    /// 1. `--provider-url`.
    /// 2. The `PROVIDER_URL` template, expanded with the network name.
    /// 3. A default, available only for L2 networks with a public endpoint and for `local`.
    pub fn chain(&self) -> Result<ChainConfig> {
        Ok(ChainConfig {
            network: self.network,
            use_ovm: self.use_ovm,
            provider_url: resolve_provider_url(
                self.provider_url.clone(),
                env::var(PROVIDER_URL_ENV).ok(),
                self.network,
                self.use_ovm,
            )?,
        })
    }

    /// The job's ledger file, if it keeps one.
    pub fn data_file(&self) -> Option<PathBuf> {
        self.data_file
            .clone()
            .or_else(|| self.command.default_data_file())
    }
}

impl WriteArgs {
    pub fn gas_price_wei(&self) -> Result<Option<u128>> {
        self.gas_price
            .map(|price| {
                u128::try_from(price.as_u256())
                    .map_err(|_| anyhow!("Gas price {price} wei does not fit in 128 bits"))
            })
            .transpose()
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout)
    }

    /// The signing key: `PRIVATE_KEY`, or prompted for when it is not set. A dry run does not
    /// need one and gets `None` instead of a prompt.
    pub fn signer(&self) -> Result<Option<PrivateKeySigner>> {
        let private_key = match env::var(PRIVATE_KEY_ENV) {
            Ok(private_key) => private_key,
            Err(_) if self.dry_run => return Ok(None),
            Err(_) => Password::new("Private key of the signer:")
                .without_confirmation()
                .prompt()?,
        };
        Ok(Some(parse_signer(&private_key)?))
    }
}

impl DeploymentArgs {
    /// Address of `contract` in the `network` deployment, or in its L2 variant with `use_ovm`.
    pub fn target(&self, network: Network, use_ovm: bool, contract: &str) -> Result<Address> {
        let deployment_dir = self
            .deployment_dir
            .join(network.deployment_dir_name(use_ovm));
        Ok(Deployment::load(&deployment_dir)?.target(contract)?)
    }
}

fn default_provider_url(network: Network, use_ovm: bool) -> Option<String> {
    match (network, use_ovm) {
        (Network::Local, _) => Some(DEFAULT_LOCAL_PROVIDER_URL.to_string()),
        (network, true) => network.public_ovm_provider_url().map(str::to_string),
        (_, false) => None,
    }
}

fn resolve_provider_url(
    value: Option<String>,
    template: Option<String>,
    network: Network,
    use_ovm: bool,
) -> Result<String> {
    if let Some(url) = value {
        return Ok(url);
    }
    if let Some(template) = template {
        return Ok(network.provider_url_from_template(&template));
    }
    default_provider_url(network, use_ovm).ok_or_else(|| {
        anyhow!(
            "No provider for `{}`: pass `--provider-url` or set `{PROVIDER_URL_ENV}`",
            network.deployment_dir_name(use_ovm)
        )
    })
}

fn resolve_value<T: FromStr>(value: Option<T>, env_var: &str, default: Option<T>) -> Result<T> {
    if let Some(value) = value {
        return Ok(value);
    }
    match env::var(env_var) {
        Ok(raw) => T::from_str(&raw).map_err(|_| anyhow!("Invalid value `{raw}` in `{env_var}`")),
        Err(_) => match default {
            Some(default) => Ok(default),
            None => bail!("Missing required configuration: `{env_var}`"),
        },
    }
}

pub mod parsing {
    use std::{path::PathBuf, str::FromStr};

    use anyhow::{anyhow, Result};
    use batch_ledger::Amount;

    pub fn parse_path(path: &str) -> Result<PathBuf> {
        let expanded_path =
            shellexpand::full(path).map_err(|e| anyhow!("Failed to expand path: {e:?}"))?;
        PathBuf::from_str(expanded_path.as_ref())
            .map_err(|e| anyhow!("Failed to interpret path: {e:?}"))
    }

    /// Decimal amount of an 18-decimals token, e.g. `0.05`.
    pub fn parse_ether(value: &str) -> Result<Amount> {
        Ok(Amount::from_ether(value)?)
    }

    pub fn parse_gwei(value: &str) -> Result<Amount> {
        Ok(Amount::from_gwei(value)?)
    }
}
