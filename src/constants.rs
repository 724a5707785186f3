//! # Constants
//!
//! Shared constants used throughout the controller and the admission webhook.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

use std::time::Duration;

/// API group of the `Executer` custom resource
pub const API_GROUP: &str = "apps.mohammadne.me";

/// Plural resource name of the `Executer` custom resource
pub const EXECUTER_RESOURCE: &str = "executers";

/// Finalizer owned by the Executer controller.
///
/// Scoped to the (controller, kind) pair so that other controllers sharing the
/// same cluster never remove it by accident.
pub const EXECUTER_FINALIZER: &str = "executers.apps.mohammadne.me/deployment-cleanup";

/// Field manager / controller name used for writes and events
pub const CONTROLLER_NAME: &str = "sanjagh-executer-controller";

/// Delay before re-checking a freshly created Deployment
pub const ARTIFACT_CREATED_REQUEUE: Duration = Duration::from_secs(60);

/// Delay before retrying after an optimistic-concurrency conflict
pub const CONFLICT_REQUEUE: Duration = Duration::from_millis(500);

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default listen address of the admission webhook (TLS only)
pub const DEFAULT_WEBHOOK_LISTEN_ADDR: &str = "0.0.0.0:8443";

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default minimum error backoff (seconds)
pub const DEFAULT_ERROR_BACKOFF_MIN_SECS: u64 = 1;

/// Default maximum error backoff (seconds)
pub const DEFAULT_ERROR_BACKOFF_MAX_SECS: u64 = 300;

/// Default maximum number of concurrent reconciliations
pub const DEFAULT_MAX_CONCURRENT_RECONCILES: u16 = 10;

/// Default lower replica bound enforced by the admission webhook
pub const DEFAULT_MIN_REPLICATION: i32 = 1;

/// Default upper replica bound enforced by the admission webhook
pub const DEFAULT_MAX_REPLICATION: i32 = 10;

/// Prefix of environment variables that override configuration
pub const ENV_PREFIX: &str = "SANJAGH";

/// Separator between nested configuration keys in environment variables
pub const ENV_SEPARATOR: &str = "__";

/// Configuration file mounted from the ConfigMap when running in a pod
pub const IN_POD_CONFIG_PATH: &str = "/tmp/sanjagh/config.yaml";
