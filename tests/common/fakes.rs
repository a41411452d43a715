use async_trait::async_trait;
use clusterup_core::cloud::MemoryCloud;
use clusterup_core::error::ConvergeResult;
use clusterup_core::model::ClusterSpec;
use clusterup_core::staging::{
    AssetTransferer, ContainerRuntime, InventoryAsset, RuntimeError, TransferError,
};
use clusterup_core::target::{ApiTarget, ConfigTarget, Target};
use clusterup_core::task::{
    require, updated, ChangeSet, DeltaTask, LazyLink, Lifecycle, Phase, RenderApi, RenderConfig,
    RunContext, TaskId, TaskOutputs,
};
use clusterup_core::{CloudClientFactory, Context, OperationPoller};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared state behind every [`FakeResource`]: what exists and what was
/// called, in order.
#[derive(Debug, Clone, Default)]
pub struct FakeWorld {
    existing: Arc<Mutex<HashMap<String, String>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: &str, value: &str) {
        self.existing
            .lock()
            .insert(name.to_string(), value.to_string());
    }

    pub fn value(&self, name: &str) -> Option<String> {
        self.existing.lock().get(name).cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Names rendered, in order.
    pub fn renders(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| call.strip_prefix("render:").map(str::to_string))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

/// A resource holding one mutable string value. Rendering resolves every
/// link, so running before a referent fails the task.
#[derive(Debug, Clone)]
pub struct FakeResource {
    pub name: String,
    pub lifecycle: Lifecycle,
    pub phase: Phase,
    pub value: Option<String>,
    pub links: Vec<LazyLink>,
    pub assets: Vec<InventoryAsset>,
    pub renders_config: bool,
    world: FakeWorld,
}

#[derive(Debug, Default)]
pub struct FakeChanges {
    pub value: Option<String>,
}

impl ChangeSet for FakeChanges {
    fn changed_fields(&self) -> Vec<&'static str> {
        match self.value {
            Some(_) => vec!["value"],
            None => Vec::new(),
        }
    }
}

impl FakeResource {
    pub fn new(world: &FakeWorld, name: &str) -> Self {
        Self {
            name: name.to_string(),
            lifecycle: Lifecycle::Normal,
            phase: Phase::Cluster,
            value: Some(format!("{name}-value")),
            links: Vec::new(),
            assets: Vec::new(),
            renders_config: true,
            world: world.clone(),
        }
    }

    pub fn linked_to(mut self, referent: &str) -> Self {
        self.links
            .push(LazyLink::to::<FakeResource>(referent, "value"));
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn in_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_value(mut self, value: Option<&str>) -> Self {
        self.value = value.map(str::to_string);
        self
    }

    pub fn with_assets(mut self, assets: Vec<InventoryAsset>) -> Self {
        self.assets = assets;
        self
    }

    pub fn api_only(mut self) -> Self {
        self.renders_config = false;
        self
    }

    pub fn id(name: &str) -> TaskId {
        TaskId::new(<FakeResource as DeltaTask>::KIND, name)
    }
}

#[async_trait]
impl DeltaTask for FakeResource {
    const KIND: &'static str = "FakeResource";

    type Changes = FakeChanges;

    fn name(&self) -> &str {
        &self.name
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn links(&self) -> Vec<LazyLink> {
        self.links.clone()
    }

    fn assets(&self) -> Vec<InventoryAsset> {
        self.assets.clone()
    }

    fn outputs(&self) -> TaskOutputs {
        TaskOutputs::new()
            .with("name", self.name.clone())
            .with_optional("value", self.value.as_deref())
    }

    async fn find(&self, _ctx: &RunContext<'_>) -> ConvergeResult<Option<Self>> {
        self.world.record(format!("find:{}", self.name));
        Ok(self.world.value(&self.name).map(|value| FakeResource {
            value: Some(value),
            ..self.clone()
        }))
    }

    fn check_changes(
        actual: Option<&Self>,
        desired: &Self,
        changes: &mut FakeChanges,
    ) -> ConvergeResult<()> {
        match actual {
            None => {
                require(&TaskId::of(desired), "value", &desired.value)?;
            }
            Some(actual) => changes.value = updated(&actual.value, &desired.value),
        }
        Ok(())
    }

    fn api_renderer(&self) -> Option<&dyn RenderApi<Self>> {
        Some(self)
    }

    fn config_renderer(&self) -> Option<&dyn RenderConfig<Self>> {
        if self.renders_config {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl RenderApi<FakeResource> for FakeResource {
    async fn render_api(
        &self,
        _target: &ApiTarget,
        ctx: &RunContext<'_>,
        _actual: Option<&FakeResource>,
        _changes: &FakeChanges,
    ) -> ConvergeResult<()> {
        for link in &self.links {
            ctx.resolve(link)?;
        }
        self.world.record(format!("render:{}", self.name));
        if let Some(value) = &self.value {
            self.world.insert(&self.name, value);
        }
        Ok(())
    }
}

impl RenderConfig<FakeResource> for FakeResource {
    fn render_config(
        &self,
        target: &ConfigTarget,
        _ctx: &RunContext<'_>,
        _actual: Option<&FakeResource>,
        _changes: &FakeChanges,
    ) -> ConvergeResult<()> {
        let references = self
            .links
            .iter()
            .map(|link| target.reference(link))
            .collect::<ConvergeResult<Vec<_>>>()?;
        self.world.record(format!("render:{}", self.name));
        target.render_resource(
            &TaskId::of(self),
            "fake_resource",
            &self.name,
            &serde_json::json!({ "value": self.value, "references": references }),
        )
    }
}

/// A context over the in-memory cloud with an API target and no tasks.
pub fn api_context(cloud: &MemoryCloud) -> Context {
    let clients = cloud
        .clients("my-project", "us-central1", "us-central1-a")
        .unwrap();
    let poller = OperationPoller::new(clients.operations(), CancellationToken::new());
    let target = Target::Api(ApiTarget::new(clients.clone(), poller));
    Context::new(
        clients,
        ClusterSpec::new("fake", "my-project", "us-central1-a", "1.9.7"),
        target,
    )
}

pub fn config_context(cloud: &MemoryCloud, output_dir: &Path) -> Context {
    let clients = cloud
        .clients("my-project", "us-central1", "us-central1-a")
        .unwrap();
    Context::new(
        clients,
        ClusterSpec::new("fake", "my-project", "us-central1-a", "1.9.7"),
        Target::Config(ConfigTarget::new(output_dir)),
    )
}

/// Records each transfer and fails for data listed in `failing`.
#[derive(Debug, Default)]
pub struct RecordingTransferer {
    label: &'static str,
    log: Arc<Mutex<Vec<String>>>,
    failing: Vec<String>,
}

impl RecordingTransferer {
    pub fn new(label: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            label,
            log: Arc::clone(log),
            failing: Vec::new(),
        }
    }

    pub fn failing_on(mut self, data: &str) -> Self {
        self.failing.push(data.to_string());
        self
    }
}

#[async_trait]
impl AssetTransferer for RecordingTransferer {
    async fn transfer(&self, asset: &InventoryAsset) -> Result<(), TransferError> {
        self.log.lock().push(format!("{}:{}", self.label, asset.data));
        if self.failing.contains(&asset.data) {
            return Err(TransferError::Runtime(RuntimeError::CommandFailed {
                command: format!("push {}", asset.data),
                code: Some(1),
                stderr: "denied: requested access to the resource is denied".to_string(),
            }));
        }
        Ok(())
    }
}

/// Container runtime that records invocations and keeps a set of local
/// images.
#[derive(Debug, Default)]
pub struct FakeRuntime {
    pub calls: Mutex<Vec<String>>,
    pub images: Mutex<Vec<String>>,
    pub fail_push: bool,
    /// Text `load` prints.
    pub load_output: String,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            load_output: "Loaded image: protokube:1.8.1\n".to_string(),
            ..Self::default()
        }
    }

    pub fn failing_push() -> Self {
        Self {
            fail_push: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn images(&self) -> Vec<String> {
        self.images.lock().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn pull(&self, image: &str) -> Result<(), RuntimeError> {
        self.record(format!("pull {image}"));
        self.images.lock().push(image.to_string());
        Ok(())
    }

    async fn tag(&self, source: &str, target: &str) -> Result<(), RuntimeError> {
        self.record(format!("tag {source} {target}"));
        self.images.lock().push(target.to_string());
        Ok(())
    }

    async fn push(&self, image: &str) -> Result<(), RuntimeError> {
        self.record(format!("push {image}"));
        if self.fail_push {
            return Err(RuntimeError::CommandFailed {
                command: format!("docker push {image}"),
                code: Some(1),
                stderr: "unauthorized".to_string(),
            });
        }
        Ok(())
    }

    async fn load(&self, archive: &Path) -> Result<String, RuntimeError> {
        self.record(format!("load {}", archive.display()));
        if !archive.exists() {
            return Err(RuntimeError::CommandFailed {
                command: "docker load".to_string(),
                code: Some(1),
                stderr: "no such file".to_string(),
            });
        }
        if let Some(image) = self.load_output.split("Loaded image: ").nth(1) {
            self.images.lock().push(image.trim().to_string());
        }
        Ok(self.load_output.clone())
    }

    async fn remove(&self, image: &str) -> Result<(), RuntimeError> {
        self.record(format!("rmi {image}"));
        self.images.lock().retain(|existing| existing != image);
        Ok(())
    }
}
