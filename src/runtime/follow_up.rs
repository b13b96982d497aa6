use std::collections::HashMap;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use kuchiki::NodeRef;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error};

use super::{ElementOptions, Frontend, Outcome};
use crate::attrs;
use crate::bus::BusEvent;
use crate::dom::element::attr_list;
use crate::net::BackendError;

#[derive(Debug, Error)]
pub enum FollowUpError {
    #[error("no behavior module named '{0}' is registered")]
    UnknownModule(String),
    #[error("behavior module '{0}' provides no reload target handler")]
    MissingHandler(String),
    #[error("behavior module failed: {0}")]
    Failed(String),
    #[error("sign-out failed: {0}")]
    SignOut(#[from] BackendError),
}

/// One entry of a success/failure target list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUpTarget {
    Module { name: String, suffix: String },
    None,
    SignOut,
    Selector(String),
}

impl FollowUpTarget {
    pub fn parse(entry: &str) -> Self {
        let entry = entry.trim();
        if let Some((name, suffix)) = entry.split_once(':') {
            return FollowUpTarget::Module {
                name: name.trim().to_string(),
                suffix: suffix.trim().to_string(),
            };
        }
        match entry {
            "none" => FollowUpTarget::None,
            "sign-out" => FollowUpTarget::SignOut,
            selector => FollowUpTarget::Selector(selector.to_string()),
        }
    }
}

/// What a behavior module is asked to handle.
pub struct FollowUp<'a> {
    /// The part of the entry after `module:`.
    pub target: &'a str,
    pub element: &'a NodeRef,
    pub parameters: &'a Value,
    pub status: u16,
    pub options: &'a ElementOptions,
}

pub trait ReloadTargetHandler {
    fn handle_reload_target<'a>(
        &'a self,
        follow_up: FollowUp<'a>,
    ) -> LocalBoxFuture<'a, Result<(), FollowUpError>>;
}

/// A named, pluggable behavior. Its handler is instantiated per use with a
/// reference to the runtime.
pub trait BehaviorModule {
    fn handler(&self, frontend: Rc<Frontend>) -> Option<Box<dyn ReloadTargetHandler>>;
}

#[derive(Default, Clone)]
pub struct ModuleRegistry {
    modules: HashMap<String, Rc<dyn BehaviorModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, module: Rc<dyn BehaviorModule>) {
        self.modules.insert(name.into(), module);
    }

    pub fn resolve(&self, name: &str) -> Result<Rc<dyn BehaviorModule>, FollowUpError> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| FollowUpError::UnknownModule(name.to_string()))
    }
}

impl Frontend {
    /// Walk the success or failure target list of `element`.
    ///
    /// A failing entry is logged and reported on the bus; the remaining
    /// entries still run. `none` ends the walk.
    pub async fn process_follow_up_actions(
        &self,
        element: &NodeRef,
        parameters: &Value,
        status: u16,
        options: &ElementOptions,
    ) {
        let list = match Outcome::classify(status) {
            Some(Outcome::Success) => attrs::SUCCESS_TARGET,
            Some(Outcome::Failure) => attrs::FAILURE_TARGET,
            None => return,
        };

        for entry in attr_list(element, list) {
            debug!(target: "follow_up", %entry, "processing");
            let result = match FollowUpTarget::parse(&entry) {
                FollowUpTarget::None => return,
                FollowUpTarget::Module { name, suffix } => {
                    self.delegate_to_module(&name, &suffix, element, parameters, status, options)
                        .await
                }
                FollowUpTarget::SignOut => self.sign_out().await,
                FollowUpTarget::Selector(selector) => {
                    self.reload_partial(&selector, Some(parameters), element, false)
                        .await;
                    Ok(())
                }
            };

            if let Err(err) = result {
                error!(target: "follow_up", %entry, error = %err, "follow-up action failed");
                self.bus.fire_event(
                    BusEvent::Error,
                    &json!({ "target": entry, "message": err.to_string() }),
                );
            }
        }
    }

    async fn delegate_to_module(
        &self,
        name: &str,
        suffix: &str,
        element: &NodeRef,
        parameters: &Value,
        status: u16,
        options: &ElementOptions,
    ) -> Result<(), FollowUpError> {
        let module = self.modules.resolve(name)?;
        let this = self
            .this()
            .ok_or_else(|| FollowUpError::Failed("runtime is shutting down".to_string()))?;
        let handler = module
            .handler(this)
            .ok_or_else(|| FollowUpError::MissingHandler(name.to_string()))?;
        handler
            .handle_reload_target(FollowUp {
                target: suffix,
                element,
                parameters,
                status,
                options,
            })
            .await
    }

    async fn sign_out(&self) -> Result<(), FollowUpError> {
        self.backend.sign_out().await?;
        self.shell.reload();
        Ok(())
    }
}
