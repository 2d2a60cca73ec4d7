//! Simulate one page load: run the bridge, then activate every enabled
//! module in a fresh page realm.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;

use patchbay_core::{ModuleId, Origin};
use patchbay_page::{
    Activation, ActivationOutcome, BridgedSettings, CapabilityModule, ModuleResult, ModuleRuntime,
    PageRealm,
};

use crate::app::App;
use crate::theme::Theme;

/// Stand-in for a capability module: reads what it was configured to read
/// and remembers it.
struct InspectModule {
    id: ModuleId,
    activation: Activation,
    seen: Mutex<Option<BridgedSettings>>,
}

impl InspectModule {
    fn seen(&self) -> Option<BridgedSettings> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CapabilityModule for InspectModule {
    fn id(&self) -> &ModuleId {
        &self.id
    }

    fn activation(&self) -> Activation {
        self.activation.clone()
    }

    fn install(&self, _realm: &PageRealm, settings: &BridgedSettings) -> ModuleResult<()> {
        *self.seen.lock().unwrap_or_else(PoisonError::into_inner) = Some(settings.clone());
        Ok(())
    }
}

pub(crate) async fn run(app: &App, url: &str) -> Result<()> {
    let realm = Arc::new(PageRealm::new(Origin::parse(url)?));
    let runtime = ModuleRuntime::new(Arc::clone(&realm), app.bridge.keys().clone());

    let outcome = app.bridge.on_navigation(&realm).await;

    println!("\n{}", Theme::header(&format!("Navigation to {}", realm.origin())));
    println!("{}", Theme::separator());
    let Some(scope) = &outcome.scope else {
        println!(
            "{}",
            Theme::warning("desired state unavailable; page loads unpatched")
        );
        return Ok(());
    };
    println!("  Scope:     {scope}");
    println!("  Enabled:   {}", join(&outcome.enabled));
    println!("  Delivered: {}", join(&outcome.delivered));
    if !outcome.skipped.is_empty() {
        println!(
            "{}",
            Theme::warning(&format!("  Skipped:   {}", join(&outcome.skipped)))
        );
    }

    let mut inspectors = Vec::new();
    for id in realm.enabled_modules(app.bridge.keys()) {
        let activation = match app.store.module_config(&id).await {
            Ok(Some(config)) if config.is_deliverable() => {
                Activation::configured(config.bridge_fields().into_iter().map(|f| f.name))
            },
            _ => Activation::Immediate,
        };
        inspectors.push(Arc::new(InspectModule {
            id,
            activation,
            seen: Mutex::new(None),
        }));
    }
    let candidates: Vec<Arc<dyn CapabilityModule>> = inspectors
        .iter()
        .map(|m| Arc::clone(m) as Arc<dyn CapabilityModule>)
        .collect();
    let modules = runtime.discoverable(&candidates);

    // The bridge has run; anything it did not announce will never be.
    realm.unload();
    let results = runtime.activate_all(&modules).await;

    println!("\n{}", Theme::header("Activation"));
    for (id, result) in &results {
        match result {
            ActivationOutcome::Activated => {
                let fields = inspectors
                    .iter()
                    .find(|m| &m.id == id)
                    .and_then(|m| m.seen().map(|s| describe(&s, &m.activation)))
                    .unwrap_or_default();
                println!("{}", Theme::success(&format!("{id} activated {fields}")));
            },
            ActivationOutcome::NotSignalled => {
                println!("{}", Theme::warning(&format!("{id} was never signalled")));
            },
            ActivationOutcome::AlreadyActive => {
                println!("{}", Theme::dimmed(&format!("{id} already active")));
            },
            ActivationOutcome::Failed { reason } => {
                println!("{}", Theme::error(&format!("{id} failed: {reason}")));
            },
        }
    }

    let leftover = realm.storage().keys();
    println!("\n{}", Theme::header("Page-visible keys after activation"));
    for key in leftover {
        println!(
            "  {key} = {}",
            realm.storage().get(&key).unwrap_or_default()
        );
    }
    println!();
    Ok(())
}

fn join(ids: &[ModuleId]) -> String {
    if ids.is_empty() {
        return "(none)".to_owned();
    }
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe(settings: &BridgedSettings, activation: &Activation) -> String {
    let Activation::Configured { fields } = activation else {
        return "(immediate)".to_owned();
    };
    let read: Vec<String> = fields
        .iter()
        .map(|f| format!("{f}={}", settings.get(f).unwrap_or("∅")))
        .collect();
    format!("with {}", read.join(" "))
}
