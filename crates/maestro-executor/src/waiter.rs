//! Health waiters (C5): instance-health and ELB-health synchronization
//! tasks share one poll-loop shape — fixed period, attempt budget, no
//! partial credit across cycles.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use maestro_core::collaborators::{CloudFacade, InstanceDescriptor, InstanceHealth, InstanceHealthCheck};
use maestro_core::Result;

/// A fixed-period poll with an attempt budget. Every cycle re-evaluates the
/// whole target set; a single unhealthy target fails the cycle and consumes
/// one attempt, even if every other target was healthy.
pub struct PollWaiter {
    poll_interval: Duration,
}

impl PollWaiter {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Run `poll_once` every tick until it reports the cycle healthy or the
    /// attempt budget is exhausted.
    pub async fn run<F, Fut>(&self, attempts: u32, mut poll_once: F) -> Result<bool>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let mut remaining = attempts;
        loop {
            tokio::time::sleep(self.poll_interval).await;
            if poll_once().await? {
                return Ok(true);
            }
            if remaining == 0 {
                return Ok(false);
            }
            remaining -= 1;
        }
    }
}

/// Polls every instance in the new ASG at `http://<ip>:<port><path>` until
/// all respond 200.
pub struct InstanceHealthWaiter {
    check: Arc<dyn InstanceHealthCheck>,
    poll_interval: Duration,
}

impl InstanceHealthWaiter {
    pub fn new(check: Arc<dyn InstanceHealthCheck>, poll_interval: Duration) -> Self {
        Self { check, poll_interval }
    }

    pub async fn wait(&self, instances: &[InstanceDescriptor], port: u16, path: &str, attempts: u32) -> Result<bool> {
        let waiter = PollWaiter::new(self.poll_interval);
        waiter
            .run(attempts, || async {
                for instance in instances {
                    if !self.check.check(&instance.private_ip, port, path).await? {
                        return Ok(false);
                    }
                }
                Ok(true)
            })
            .await
    }
}

/// Polls each named load balancer until every instance in the new ASG is
/// reported healthy on all of them.
pub struct ElbHealthWaiter {
    cloud: Arc<dyn CloudFacade>,
    poll_interval: Duration,
}

impl ElbHealthWaiter {
    pub fn new(cloud: Arc<dyn CloudFacade>, poll_interval: Duration) -> Self {
        Self { cloud, poll_interval }
    }

    pub async fn wait(&self, region: &str, load_balancers: &[String], asg_name: &str, instances: &[InstanceDescriptor], attempts: u32) -> Result<bool> {
        let waiter = PollWaiter::new(self.poll_interval);
        waiter
            .run(attempts, || async {
                for load_balancer in load_balancers {
                    let health = self.cloud.instance_health_from_load_balancer(region, load_balancer, asg_name).await?;
                    for instance in instances {
                        if !matches!(health.get(&instance.instance_id), Some(InstanceHealth::Healthy)) {
                            return Ok(false);
                        }
                    }
                }
                Ok(true)
            })
            .await
    }
}
