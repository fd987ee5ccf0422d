//! Network discovery
//!
//! Probes every address the network map knows about, keeps the ones that
//! answer, and decides which deployment system is cabled up. The sweep runs
//! on tokio with a bounded number of probes in flight.

use async_trait::async_trait;
use fabkit_core::{DeploymentSystem, DiscoveryError, HostInfo, NetworkMap, Result};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Decides whether an address answers
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// `Ok(false)` for silence; `Err` only when the probe itself broke
    async fn probe(&self, ip: Ipv4Addr) -> std::result::Result<bool, DiscoveryError>;
}

/// ICMP echo through the platform `ping` binary
#[derive(Debug, Clone)]
pub struct PingProbe {
    timeout: Duration,
}

impl Default for PingProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl PingProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn command(&self, ip: Ipv4Addr) -> Command {
        let mut command = Command::new("ping");
        if cfg!(windows) {
            command
                .arg("-n")
                .arg("1")
                .arg("-w")
                .arg(self.timeout.as_millis().max(1).to_string());
        } else {
            command
                .arg("-c")
                .arg("1")
                .arg("-W")
                .arg(self.timeout.as_secs().max(1).to_string());
        }
        command
            .arg(ip.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl ReachabilityProbe for PingProbe {
    async fn probe(&self, ip: Ipv4Addr) -> std::result::Result<bool, DiscoveryError> {
        let limit = self.timeout + Duration::from_secs(1);
        match timeout(limit, self.command(ip).status()).await {
            Ok(Ok(status)) => Ok(status.success()),
            Ok(Err(e)) => Err(DiscoveryError::ProbeFailed {
                reason: format!("could not run ping: {}", e),
            }),
            Err(_) => Ok(false),
        }
    }
}

/// Sweep parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Probes in flight at once
    pub max_parallel: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { max_parallel: 32 }
    }
}

/// Result of a sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    /// Addresses that answered, in network map order
    pub reachable: Vec<Ipv4Addr>,
    /// Deployment system evidenced by the reachable addresses
    pub system: DeploymentSystem,
    /// Map entry for every reachable address
    pub hosts: Vec<HostInfo>,
}

impl DiscoveryReport {
    /// Reachable role slots of a layout
    pub fn devices(&self) -> impl Iterator<Item = &HostInfo> {
        self.hosts.iter().filter(|host| host.is_device)
    }
}

/// Decide the deployment system from the reachable addresses
///
/// Evidence for two layouts at once is an error; no evidence at all is
/// `Unknown`.
pub fn classify(
    map: &NetworkMap,
    reachable: &[Ipv4Addr],
) -> std::result::Result<DeploymentSystem, DiscoveryError> {
    let evidenced: Vec<DeploymentSystem> = map
        .systems
        .iter()
        .filter(|layout| reachable.iter().any(|ip| layout.subnet.contains(ip)))
        .map(|layout| layout.system)
        .collect();

    match evidenced.as_slice() {
        [] => Ok(DeploymentSystem::Unknown),
        [system] => Ok(*system),
        [first, second, ..] => Err(DiscoveryError::AmbiguousDeployment {
            first: first.to_string(),
            second: second.to_string(),
        }),
    }
}

/// Sweeps the addresses of a network map
pub struct Discovery<'a> {
    map: &'a NetworkMap,
    probe: Arc<dyn ReachabilityProbe>,
    config: DiscoveryConfig,
}

impl<'a> Discovery<'a> {
    /// Discovery with the ping probe and default limits
    pub fn new(map: &'a NetworkMap) -> Self {
        Self::with_probe(map, Arc::new(PingProbe::default()), DiscoveryConfig::default())
    }

    pub fn with_probe(
        map: &'a NetworkMap,
        probe: Arc<dyn ReachabilityProbe>,
        config: DiscoveryConfig,
    ) -> Self {
        Self { map, probe, config }
    }

    /// Probe all candidates, then classify
    pub async fn discover(&self) -> Result<DiscoveryReport> {
        let candidates = self.map.candidates();
        info!(
            "Probing {} addresses ({} at a time)",
            candidates.len(),
            self.config.max_parallel
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel.max(1)));
        let mut set = JoinSet::new();

        for (index, ip) in candidates.iter().copied().enumerate() {
            let probe = Arc::clone(&self.probe);
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => probe.probe(ip).await,
                    Err(_) => Err(DiscoveryError::ProbeFailed {
                        reason: "probe limiter closed".to_string(),
                    }),
                };
                (index, ip, outcome)
            });
        }

        let mut answered = Vec::new();
        let mut failures = 0usize;
        let mut last_failure = None;

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, ip, Ok(true))) => {
                    debug!("{} is reachable", ip);
                    answered.push((index, ip));
                }
                Ok((_, ip, Ok(false))) => debug!("{} did not answer", ip),
                Ok((_, ip, Err(err))) => {
                    warn!("Probe of {} failed: {}", ip, err);
                    failures += 1;
                    last_failure = Some(err);
                }
                Err(err) => {
                    warn!("Probe task failed: {}", err);
                    failures += 1;
                }
            }
        }

        if !candidates.is_empty() && failures == candidates.len() {
            let err = last_failure.unwrap_or(DiscoveryError::ProbeFailed {
                reason: "every probe task failed".to_string(),
            });
            return Err(err.into());
        }

        answered.sort_by_key(|(index, _)| *index);
        let reachable: Vec<Ipv4Addr> = answered.into_iter().map(|(_, ip)| ip).collect();

        let system = classify(self.map, &reachable)?;
        let hosts = reachable.iter().map(|ip| self.map.lookup(*ip)).collect();
        info!("Found {} reachable hosts, system {}", reachable.len(), system);

        Ok(DiscoveryReport {
            reachable,
            system,
            hosts,
        })
    }
}
