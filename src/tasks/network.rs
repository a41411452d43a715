//! VPC network.

use crate::cloud::utils::safe_object_name;
use crate::cloud::{found, NetworkRequest};
use crate::error::{ConvergeError, ConvergeResult};
use crate::target::{ApiTarget, ConfigTarget};
use crate::task::{
    ensure_unchanged, DeltaTask, Lifecycle, NoChanges, Phase, RenderApi, RenderConfig,
    RunContext, TaskId, TaskOutputs,
};
use async_trait::async_trait;
use serde::Serialize;

/// A VPC network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub name: String,
    pub lifecycle: Lifecycle,
    /// Fixed at creation.
    pub auto_create_subnetworks: Option<bool>,
    /// Observed only.
    pub self_link: Option<String>,
}

impl Network {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lifecycle: Lifecycle::Normal,
            auto_create_subnetworks: None,
            self_link: None,
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    fn cloud_name(&self) -> String {
        safe_object_name(&self.name)
    }
}

#[async_trait]
impl DeltaTask for Network {
    const KIND: &'static str = "Network";

    type Changes = NoChanges;

    fn name(&self) -> &str {
        &self.name
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn phase(&self) -> Phase {
        Phase::Network
    }

    fn outputs(&self) -> TaskOutputs {
        TaskOutputs::new()
            .with("name", self.cloud_name())
            .with_optional("self_link", self.self_link.as_deref())
    }

    async fn find(&self, ctx: &RunContext<'_>) -> ConvergeResult<Option<Self>> {
        let cloud = ctx.cloud();
        let info = found(
            cloud
                .compute()
                .get_network(cloud.project(), &self.cloud_name())
                .await,
        )?;

        Ok(info.map(|info| Network {
            name: self.name.clone(),
            lifecycle: self.lifecycle,
            auto_create_subnetworks: Some(info.auto_create_subnetworks),
            self_link: Some(info.self_link),
        }))
    }

    fn check_changes(
        actual: Option<&Self>,
        desired: &Self,
        _changes: &mut NoChanges,
    ) -> ConvergeResult<()> {
        let id = TaskId::of(desired);
        match actual {
            None if desired.name.is_empty() => Err(ConvergeError::RequiredField {
                task: id,
                field: "name",
            }),
            None => Ok(()),
            Some(actual) => ensure_unchanged(
                &id,
                "auto_create_subnetworks",
                &actual.auto_create_subnetworks,
                &desired.auto_create_subnetworks,
            ),
        }
    }

    fn api_renderer(&self) -> Option<&dyn RenderApi<Self>> {
        Some(self)
    }

    fn config_renderer(&self) -> Option<&dyn RenderConfig<Self>> {
        Some(self)
    }
}

#[async_trait]
impl RenderApi<Network> for Network {
    async fn render_api(
        &self,
        target: &ApiTarget,
        _ctx: &RunContext<'_>,
        actual: Option<&Network>,
        _changes: &NoChanges,
    ) -> ConvergeResult<()> {
        if actual.is_some() {
            return Ok(());
        }
        let cloud = target.cloud();
        let request = NetworkRequest {
            name: self.cloud_name(),
            auto_create_subnetworks: self.auto_create_subnetworks.unwrap_or(false),
        };
        let operation = cloud.compute().create_network(cloud.project(), request).await?;
        target.wait_for(operation).await?;
        Ok(())
    }
}

#[derive(Serialize)]
struct TerraformNetwork {
    name: String,
    auto_create_subnetworks: bool,
}

impl RenderConfig<Network> for Network {
    fn render_config(
        &self,
        target: &ConfigTarget,
        _ctx: &RunContext<'_>,
        _actual: Option<&Network>,
        _changes: &NoChanges,
    ) -> ConvergeResult<()> {
        let name = self.cloud_name();
        let body = TerraformNetwork {
            name: name.clone(),
            auto_create_subnetworks: self.auto_create_subnetworks.unwrap_or(false),
        };
        target.render_resource(&TaskId::of(self), "google_compute_network", &name, &body)
    }
}
