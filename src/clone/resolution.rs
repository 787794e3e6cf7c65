// dbclonetool/src/clone/resolution.rs
use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use std::fmt;
use tracing::{info, warn};

use crate::errors::{CloneError, Result};
use crate::platform::{BackupPlatform, DatabaseMetadata, ResolvedTarget};

/// Numeric `major.minor.patch` of the backup platform. Build suffixes
/// (`5.1.2-p3-2319`) are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PlatformVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// First version with the unified host-or-cluster target lookup.
pub const UNIFIED_TARGET_SINCE: PlatformVersion = PlatformVersion { major: 5, minor: 2, patch: 1 };

impl PlatformVersion {
    pub fn parse(version: &str) -> Result<Self> {
        let numeric = version.split('-').next().unwrap_or_default();
        if numeric.trim().is_empty() {
            return Err(CloneError::Resolution("The platform reported an empty version".to_string()));
        }
        let mut parts = numeric.split('.').map(|part| part.trim().parse::<u32>());
        let mut next = |name: &str| -> Result<u32> {
            match parts.next() {
                Some(Ok(value)) => Ok(value),
                Some(Err(_)) => Err(CloneError::Resolution(format!(
                    "The {} component of platform version '{}' is not a number",
                    name, version
                ))),
                None => Ok(0),
            }
        };
        let major = next("major")?;
        let minor = next("minor")?;
        let patch = next("patch")?;
        Ok(Self { major, minor, patch })
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// How the mount target is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStrategy {
    Rac,
    Host,
    Unified,
}

pub fn target_strategy(version: PlatformVersion, clustered: bool) -> TargetStrategy {
    if version >= UNIFIED_TARGET_SINCE {
        TargetStrategy::Unified
    } else if clustered {
        TargetStrategy::Rac
    } else {
        TargetStrategy::Host
    }
}

pub async fn resolve_target(
    platform: &dyn BackupPlatform,
    version: PlatformVersion,
    metadata: &DatabaseMetadata,
    target_host: &str,
) -> Result<ResolvedTarget> {
    let strategy = target_strategy(version, metadata.is_clustered());
    if version < UNIFIED_TARGET_SINCE {
        info!("Cluster version {} is pre {}", version, UNIFIED_TARGET_SINCE);
    } else {
        info!("Cluster version {} is post {}", version, UNIFIED_TARGET_SINCE);
    }
    let target = match strategy {
        TargetStrategy::Rac => platform.resolve_rac_target(target_host).await,
        TargetStrategy::Host => platform.resolve_host_target(target_host).await,
        TargetStrategy::Unified => platform.resolve_target(target_host).await,
    }
    .map_err(|e| match e {
        CloneError::Resolution(_) => e,
        other => CloneError::Resolution(format!(
            "Unable to resolve the mount target for {}: {}",
            target_host, other
        )),
    })?;
    info!("Resolved target {} for host {} using {:?} lookup", target, target_host, strategy);
    Ok(target)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryTimeSource {
    Requested,
    LatestRecoveryPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTime {
    pub epoch_ms: i64,
    pub source: RecoveryTimeSource,
}

fn parse_timezone(timezone: &str) -> Result<Tz> {
    timezone.parse::<Tz>().map_err(|e| {
        CloneError::Resolution(format!("Unknown platform timezone '{}': {}", timezone, e))
    })
}

/// A wall-clock time in the platform's timezone, as typed by the operator.
pub fn local_time_to_epoch_ms(time: NaiveDateTime, tz: Tz) -> Result<i64> {
    tz.from_local_datetime(&time)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| {
            CloneError::Resolution(format!("The time {} does not exist in timezone {}", time, tz))
        })
}

/// A timestamp reported by the platform. Carries its own offset when it has
/// one, otherwise it is read in the platform's timezone.
pub fn platform_time_to_epoch_ms(value: &str, tz: Tz) -> Result<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value.trim()) {
        return Ok(dt.timestamp_millis());
    }
    let naive = NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%dT%H:%M:%S%.f").map_err(|e| {
        CloneError::Resolution(format!("Unrecognised platform timestamp '{}': {}", value, e))
    })?;
    local_time_to_epoch_ms(naive, tz)
}

/// Uses the requested time, or falls back to the source's latest recovery point.
pub fn resolve_time(
    requested: Option<NaiveDateTime>,
    latest_recovery_point: Option<&str>,
    timezone: &str,
) -> Result<ResolvedTime> {
    let tz = parse_timezone(timezone)?;
    match requested {
        Some(time) => {
            warn!("Materializing backup set from time {} for mount.", time.format("%Y-%m-%dT%H:%M:%S"));
            Ok(ResolvedTime {
                epoch_ms: local_time_to_epoch_ms(time, tz)?,
                source: RecoveryTimeSource::Requested,
            })
        }
        None => {
            let latest = latest_recovery_point.ok_or_else(|| {
                CloneError::Resolution(
                    "No restore time was given and the source database has no recovery point".to_string(),
                )
            })?;
            warn!("Using most recent recovery point for mount.");
            Ok(ResolvedTime {
                epoch_ms: platform_time_to_epoch_ms(latest, tz)?,
                source: RecoveryTimeSource::LatestRecoveryPoint,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clone::fakes::FakePlatform;

    fn v(major: u32, minor: u32, patch: u32) -> PlatformVersion {
        PlatformVersion { major, minor, patch }
    }

    #[test]
    fn test_version_parse_strips_build_suffix() -> anyhow::Result<()> {
        assert_eq!(PlatformVersion::parse("5.1.2-p3-2319")?, v(5, 1, 2));
        assert_eq!(PlatformVersion::parse("6.0")?, v(6, 0, 0));
        assert!(PlatformVersion::parse("five.1").is_err());
        assert!(PlatformVersion::parse("").is_err());
        Ok(())
    }

    #[test]
    fn test_version_comparison_is_numeric() {
        // "5.10.0" sorts before "5.2.1" as a string.
        assert!(v(5, 10, 0) > UNIFIED_TARGET_SINCE);
        assert!(v(5, 2, 0) < UNIFIED_TARGET_SINCE);
        assert!(v(4, 9, 9) < UNIFIED_TARGET_SINCE);
    }

    #[test]
    fn test_target_strategy_gates_on_version() {
        assert_eq!(target_strategy(v(5, 2, 0), true), TargetStrategy::Rac);
        assert_eq!(target_strategy(v(5, 1, 9), false), TargetStrategy::Host);
        assert_eq!(target_strategy(v(5, 2, 1), true), TargetStrategy::Unified);
        assert_eq!(target_strategy(v(5, 3, 0), false), TargetStrategy::Unified);
        assert_eq!(target_strategy(v(6, 0, 0), true), TargetStrategy::Unified);
    }

    #[tokio::test]
    async fn test_resolve_target_uses_rac_lookup_before_unified_version() -> anyhow::Result<()> {
        let platform = FakePlatform::new();
        let metadata = DatabaseMetadata { rac_name: Some("jz-rac-1".to_string()), ..platform.metadata.clone() };
        let target = resolve_target(&platform, v(5, 1, 0), &metadata, "jz-targethost-1").await?;
        assert_eq!(target, ResolvedTarget("OracleRac:::jz-targethost-1".to_string()));

        let target = resolve_target(&platform, v(5, 3, 0), &metadata, "jz-targethost-1").await?;
        assert_eq!(target, ResolvedTarget("OracleTarget:::jz-targethost-1".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_unresolved_target_is_resolution_error() {
        let platform = FakePlatform::new();
        platform.fail_target_lookup();
        let result = resolve_target(&platform, v(5, 3, 0), &platform.metadata, "jz-targethost-1").await;
        assert!(matches!(result, Err(CloneError::Resolution(_))));
    }

    #[test]
    fn test_requested_time_is_read_in_platform_timezone() -> anyhow::Result<()> {
        let time = crate::config::parse_restore_time("2020-11-06T00:06:00")?;
        let resolved = resolve_time(Some(time), Some("2021-01-01T00:00:00.000Z"), "America/Chicago")?;
        assert_eq!(resolved.source, RecoveryTimeSource::Requested);
        // 00:06 CST is 06:06 UTC.
        assert_eq!(resolved.epoch_ms, 1_604_642_760_000);
        Ok(())
    }

    #[test]
    fn test_latest_recovery_point_used_when_no_time_requested() -> anyhow::Result<()> {
        let resolved = resolve_time(None, Some("2020-11-06T06:06:00.000Z"), "America/Chicago")?;
        assert_eq!(resolved.source, RecoveryTimeSource::LatestRecoveryPoint);
        assert_eq!(resolved.epoch_ms, 1_604_642_760_000);
        Ok(())
    }

    #[test]
    fn test_missing_recovery_point_and_bad_timezone_fail() {
        assert!(matches!(resolve_time(None, None, "UTC"), Err(CloneError::Resolution(_))));
        assert!(matches!(
            resolve_time(None, Some("2020-11-06T06:06:00Z"), "Mars/Olympus"),
            Err(CloneError::Resolution(_))
        ));
    }
}
