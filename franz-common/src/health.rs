use std::collections::HashMap;
use std::ops::Add;
use std::sync::{Arc, RwLock};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

/// Liveness reporting for the long-running loops of a service.
///
/// A consumer process can only be trusted to make progress on the topic if every loop it
/// runs keeps reporting. Each loop registers itself once and gets a [`HealthHandle`]; the
/// process is healthy when every registered component has reported healthy within its own
/// deadline. A registry with no components is unhealthy.

#[derive(Default, Debug)]
pub struct HealthStatus {
    /// True when every component is healthy
    pub healthy: bool,
    /// Current status of each registered component, for display
    pub components: HashMap<String, ComponentStatus>,
}

impl IntoResponse for HealthStatus {
    fn into_response(self) -> Response {
        let body = format!("{:?}", self);
        match self.healthy {
            true => (StatusCode::OK, body),
            false => (StatusCode::INTERNAL_SERVER_ERROR, body),
        }
        .into_response()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ComponentStatus {
    /// Registered, has not reported yet
    Starting,
    /// Must report again before the deadline
    HealthyUntil(OffsetDateTime),
    /// Reported unhealthy, or stopped on purpose
    Unhealthy,
    /// The HealthyUntil deadline passed without a new report
    Stalled,
}

type Components = Arc<RwLock<HashMap<String, ComponentStatus>>>;

#[derive(Clone)]
pub struct HealthHandle {
    component: String,
    deadline: Duration,
    components: Components,
}

impl HealthHandle {
    /// Report healthy until `now + deadline`. Must be called more often than the deadline.
    pub fn report_healthy(&self) {
        self.report_status(ComponentStatus::HealthyUntil(
            OffsetDateTime::now_utc().add(self.deadline),
        ))
    }

    pub fn report_status(&self, status: ComponentStatus) {
        match self.components.write() {
            Ok(mut map) => {
                map.insert(self.component.clone(), status);
            }
            // Probes will fail and the process restart
            Err(_) => warn!("poisoned HealthRegistry lock"),
        }
    }
}

#[derive(Clone)]
pub struct HealthRegistry {
    name: String,
    components: Components,
}

impl HealthRegistry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            components: Default::default(),
        }
    }

    /// Registers a component in `Starting` state. The handle is passed to the component so it
    /// can report on every iteration of its loop.
    pub fn register(&self, component: String, deadline: Duration) -> HealthHandle {
        let handle = HealthHandle {
            component,
            deadline,
            components: self.components.clone(),
        };
        handle.report_status(ComponentStatus::Starting);
        handle
    }

    /// Overall status computed from every registered component. Can be used as an axum handler.
    pub fn get_status(&self) -> HealthStatus {
        let Ok(components) = self.components.read() else {
            warn!("poisoned HealthRegistry lock");
            return HealthStatus::default();
        };

        let now = OffsetDateTime::now_utc();
        let mut result = HealthStatus {
            healthy: !components.is_empty(),
            components: HashMap::with_capacity(components.len()),
        };

        for (name, status) in components.iter() {
            let status = match status {
                ComponentStatus::HealthyUntil(until) if *until > now => status.clone(),
                ComponentStatus::HealthyUntil(_) => ComponentStatus::Stalled,
                other => other.clone(),
            };
            if !matches!(status, ComponentStatus::HealthyUntil(_)) {
                result.healthy = false;
            }
            result.components.insert(name.clone(), status);
        }

        match result.healthy {
            true => debug!("{} health check ok", self.name),
            false => warn!("{} health check failed: {:?}", self.name, result.components),
        }
        result
    }
}
