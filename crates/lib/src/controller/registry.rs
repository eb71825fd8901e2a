//! Controllers (named bundles of actions) and the registry that resolves them by name.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use super::handler::{AsyncHandler, BoxedHandler, Handler};

/// A localized phrase matcher paired with the handler it triggers.
#[derive(Debug, Clone)]
pub struct Action {
    path: String,
    handler: BoxedHandler,
}

impl Action {
    /// Localization path (e.g. `lobby.start`) whose phrases trigger this action.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn handler(&self) -> &BoxedHandler {
        &self.handler
    }
}

/// One "place" in the conversation. Actions are tried in the order they were added.
pub struct Controller {
    name: String,
    actions: Vec<Action>,
    default_handler: Option<BoxedHandler>,
    targets: Vec<String>,
}

impl Controller {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
            default_handler: None,
            targets: Vec::new(),
        }
    }

    pub fn action<H, Args>(self, path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<Args>,
    {
        self.push_action(path.into(), BoxedHandler::from_sync(handler))
    }

    pub fn action_async<H, Args>(self, path: impl Into<String>, handler: H) -> Self
    where
        H: AsyncHandler<Args>,
    {
        self.push_action(path.into(), BoxedHandler::from_async(handler))
    }

    /// Handler used when no action matched. Replaces any earlier default.
    pub fn default_handler<H, Args>(mut self, handler: H) -> Self
    where
        H: Handler<Args>,
    {
        self.default_handler = Some(BoxedHandler::from_sync(handler));
        self
    }

    pub fn default_handler_async<H, Args>(mut self, handler: H) -> Self
    where
        H: AsyncHandler<Args>,
    {
        self.default_handler = Some(BoxedHandler::from_async(handler));
        self
    }

    /// Declare a controller this one's handlers may push onto the navigation stack.
    /// Checked when the registry is built.
    pub fn navigates_to(mut self, target: impl Into<String>) -> Self {
        self.targets.push(target.into());
        self
    }

    fn push_action(mut self, path: String, handler: BoxedHandler) -> Self {
        self.actions.push(Action { path, handler });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn fallback(&self) -> Option<&BoxedHandler> {
        self.default_handler.as_ref()
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("name", &self.name)
            .field(
                "actions",
                &self.actions.iter().map(Action::path).collect::<Vec<_>>(),
            )
            .field("has_default", &self.default_handler.is_some())
            .field("targets", &self.targets)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("controller {0} is not registered")]
pub struct NotFoundError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("main controller {0} is not registered")]
    MainNotRegistered(String),
    #[error("controller {0} is registered twice")]
    Duplicate(String),
    #[error("controller {controller} navigates to unregistered controller {target}")]
    UnknownTarget { controller: String, target: String },
}

/// Immutable set of controllers, built and validated once at startup.
#[derive(Debug)]
pub struct ControllerRegistry {
    main: String,
    controllers: HashMap<String, Controller>,
}

impl ControllerRegistry {
    pub fn builder(main_controller: impl Into<String>) -> RegistryBuilder {
        RegistryBuilder {
            main: main_controller.into(),
            controllers: Vec::new(),
        }
    }

    pub fn resolve(&self, name: &str) -> Result<&Controller, NotFoundError> {
        self.controllers
            .get(name)
            .ok_or_else(|| NotFoundError(name.to_string()))
    }

    /// Controller used when a player's navigation stack is empty.
    pub fn main_controller_name(&self) -> &str {
        &self.main
    }

    pub fn contains(&self, name: &str) -> bool {
        self.controllers.contains_key(name)
    }

    pub fn names(&self) -> BTreeSet<&str> {
        self.controllers.keys().map(String::as_str).collect()
    }

    /// Every action localization path across all controllers.
    pub fn localization_paths(&self) -> BTreeSet<&str> {
        self.controllers
            .values()
            .flat_map(|c| c.actions.iter().map(Action::path))
            .collect()
    }
}

pub struct RegistryBuilder {
    main: String,
    controllers: Vec<Controller>,
}

impl RegistryBuilder {
    pub fn controller(mut self, controller: Controller) -> Self {
        self.controllers.push(controller);
        self
    }

    pub fn build(self) -> Result<ControllerRegistry, RegistryError> {
        let mut controllers = HashMap::with_capacity(self.controllers.len());
        for c in self.controllers {
            if controllers.contains_key(&c.name) {
                return Err(RegistryError::Duplicate(c.name));
            }
            controllers.insert(c.name.clone(), c);
        }
        if !controllers.contains_key(&self.main) {
            return Err(RegistryError::MainNotRegistered(self.main));
        }
        for c in controllers.values() {
            if let Some(target) = c.targets.iter().find(|t| !controllers.contains_key(*t)) {
                return Err(RegistryError::UnknownTarget {
                    controller: c.name.clone(),
                    target: target.clone(),
                });
            }
        }
        log::debug!(
            "controller registry built: {} controller(s), main {}",
            controllers.len(),
            self.main
        );
        Ok(ControllerRegistry {
            main: self.main,
            controllers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::ControllerAnswer;

    fn hello() -> ControllerAnswer {
        ControllerAnswer::new("hello")
    }

    #[test]
    fn actions_keep_declaration_order() {
        let c = Controller::new("Lobby")
            .action("lobby.b", hello)
            .action("lobby.a", hello)
            .action("lobby.c", hello);
        let paths: Vec<&str> = c.actions().iter().map(Action::path).collect();
        assert_eq!(paths, vec!["lobby.b", "lobby.a", "lobby.c"]);
        assert!(c.fallback().is_none());
    }

    #[test]
    fn resolve_unknown_is_not_found() {
        let registry = ControllerRegistry::builder("Lobby")
            .controller(Controller::new("Lobby"))
            .build()
            .unwrap();
        assert_eq!(registry.main_controller_name(), "Lobby");
        assert!(registry.resolve("Lobby").is_ok());
        let err = registry.resolve("Shop").unwrap_err();
        assert_eq!(err.0, "Shop");
    }

    #[test]
    fn build_requires_main_controller() {
        let err = ControllerRegistry::builder("Lobby")
            .controller(Controller::new("Shop"))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::MainNotRegistered(name) if name == "Lobby"));
    }

    #[test]
    fn build_rejects_duplicates() {
        let err = ControllerRegistry::builder("Lobby")
            .controller(Controller::new("Lobby"))
            .controller(Controller::new("Lobby"))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(_)));
    }

    #[test]
    fn build_rejects_unknown_navigation_target() {
        let err = ControllerRegistry::builder("Lobby")
            .controller(Controller::new("Lobby").navigates_to("Shop"))
            .build()
            .unwrap_err();
        assert!(
            matches!(err, RegistryError::UnknownTarget { ref target, .. } if target == "Shop")
        );
    }

    #[test]
    fn localization_paths_cover_all_controllers() {
        let registry = ControllerRegistry::builder("Lobby")
            .controller(Controller::new("Lobby").action("lobby.start", hello).navigates_to("Shop"))
            .controller(Controller::new("Shop").action("shop.buy", hello).action("lobby.start", hello))
            .build()
            .unwrap();
        let paths: Vec<&str> = registry.localization_paths().into_iter().collect();
        assert_eq!(paths, vec!["lobby.start", "shop.buy"]);
        assert_eq!(registry.names().into_iter().collect::<Vec<_>>(), vec!["Lobby", "Shop"]);
    }
}
