use async_trait::async_trait;
use fabkit_communication::{Discovery, DiscoveryConfig, ReachabilityProbe};
use fabkit_core::{DeploymentSystem, DiscoveryError, Error, ErrorKind, NetworkMap};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Answers for a fixed set of addresses
struct ScriptedProbe {
    up: HashSet<Ipv4Addr>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedProbe {
    fn new(up: &[[u8; 4]]) -> Arc<Self> {
        Arc::new(Self {
            up: up.iter().map(|ip| Ipv4Addr::from(*ip)).collect(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ReachabilityProbe for ScriptedProbe {
    async fn probe(&self, ip: Ipv4Addr) -> Result<bool, DiscoveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.up.contains(&ip))
    }
}

/// Fails every probe
struct BrokenProbe;

#[async_trait]
impl ReachabilityProbe for BrokenProbe {
    async fn probe(&self, _ip: Ipv4Addr) -> Result<bool, DiscoveryError> {
        Err(DiscoveryError::ProbeFailed {
            reason: "ping not installed".to_string(),
        })
    }
}

#[tokio::test]
async fn test_discover_wmc() {
    let map = NetworkMap::default();
    let probe = ScriptedProbe::new(&[[192, 168, 30, 20], [192, 168, 30, 70], [192, 168, 30, 1]]);
    let discovery = Discovery::with_probe(&map, probe.clone(), DiscoveryConfig::default());

    let report = discovery.discover().await.unwrap();

    assert_eq!(report.system, DeploymentSystem::Wmc);
    assert_eq!(
        report.reachable,
        vec![
            Ipv4Addr::new(192, 168, 30, 20),
            Ipv4Addr::new(192, 168, 30, 70),
            Ipv4Addr::new(192, 168, 30, 1),
        ]
    );
    let devices: Vec<&str> = report.devices().map(|host| host.label.as_str()).collect();
    assert_eq!(devices, vec!["Robot", "Prealigner"]);
    assert_eq!(report.hosts[2].label, "WMC Software PC");
    assert!(!report.hosts[2].is_device);
    assert_eq!(probe.calls.load(Ordering::SeqCst), map.candidates().len());
}

#[tokio::test]
async fn test_unconfigured_units_only() {
    let map = NetworkMap::default();
    let probe = ScriptedProbe::new(&[[172, 20, 9, 150]]);
    let report = Discovery::with_probe(&map, probe, DiscoveryConfig::default())
        .discover()
        .await
        .unwrap();

    assert_eq!(report.system, DeploymentSystem::Unknown);
    assert_eq!(report.hosts[0].label, "Robot (Unconfigured)");
    assert_eq!(report.devices().count(), 0);
}

#[tokio::test]
async fn test_nothing_reachable() {
    let map = NetworkMap::default();
    let report = Discovery::with_probe(&map, ScriptedProbe::new(&[]), DiscoveryConfig::default())
        .discover()
        .await
        .unwrap();

    assert!(report.reachable.is_empty());
    assert_eq!(report.system, DeploymentSystem::Unknown);
}

#[tokio::test]
async fn test_both_layouts_is_ambiguous() {
    let map = NetworkMap::default();
    let probe = ScriptedProbe::new(&[[192, 168, 0, 1], [192, 168, 30, 20]]);
    let err = Discovery::with_probe(&map, probe, DiscoveryConfig::default())
        .discover()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AmbiguousDeployment);
    assert_eq!(err.to_string(), "Both SEMDEX and WMC configurations found");
}

#[tokio::test]
async fn test_parallelism_is_bounded() {
    let map = NetworkMap::default();
    let probe = ScriptedProbe::new(&[]);
    let config = DiscoveryConfig { max_parallel: 4 };
    Discovery::with_probe(&map, probe.clone(), config)
        .discover()
        .await
        .unwrap();

    assert!(probe.peak.load(Ordering::SeqCst) <= 4);
    assert_eq!(probe.calls.load(Ordering::SeqCst), map.candidates().len());
}

#[tokio::test]
async fn test_all_probes_failing() {
    let map = NetworkMap::default();
    let err = Discovery::with_probe(&map, Arc::new(BrokenProbe), DiscoveryConfig::default())
        .discover()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Discovery(DiscoveryError::ProbeFailed { .. })
    ));
}
